//! Thin CLI driver: parses `argv`, wires together the secure-memory,
//! random-source, header, and codec facilities, and maps the first
//! error encountered to a process exit code.
//!
//! ```text
//! boxstream <infile> <p1> <p2> <p3>   # encrypt; passphrase on stdin, ciphertext on stdout
//! boxstream <infile> -d               # decrypt; passphrase on stdin, plaintext on stdout
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use boxstream::error::{Error, Result};
use boxstream::kdf::{ActiveParams, Params};
use boxstream::random::RandomSource;
use boxstream::securemem::{lock_process_memory, Passphrase};
use boxstream::{random, Decryptor, Encryptor};

/// Encrypts or decrypts a file, streaming ciphertext through standard
/// output. The passphrase is read from standard input.
#[derive(Parser)]
#[command(name = "boxstream", version, about)]
struct Cli {
    /// Path to the input file; must be a regular, seekable file.
    infile: PathBuf,

    /// Decrypt instead of encrypt. KDF parameters are recovered from
    /// the stream's header rather than taken from argv.
    #[arg(short = 'd', long = "decrypt")]
    decrypt: bool,

    /// KDF parameters (encrypt only): three positional integers whose
    /// meaning depends on which KDF was compiled in (scrypt: logN r p;
    /// Argon2: logM t parallelism).
    #[arg(value_name = "PARAM")]
    params: Vec<String>,
}

fn parse_u8(name: &str, s: &str) -> Result<u8> {
    s.parse()
        .map_err(|_| Error::Usage(format!("{name} must be an integer in [0, 256): {s:?}")))
}

fn parse_u32(name: &str, s: &str) -> Result<u32> {
    s.parse()
        .map_err(|_| Error::Usage(format!("{name} must be a non-negative 32-bit integer: {s:?}")))
}

fn open_input(path: &PathBuf) -> Result<File> {
    let file = File::open(path)?;
    let meta = file.metadata().map_err(|e| Error::Stat {
        path: path.clone(),
        source: e,
    })?;
    if !meta.is_file() {
        return Err(Error::NotRegularFile(path.clone()));
    }
    Ok(file)
}

fn run(cli: Cli) -> Result<()> {
    // Parameter ranges are checked before anything else touches the
    // filesystem or the KDF: an out-of-range encrypt parameter is a
    // usage error, not a reason to open the input or burn CPU/memory
    // on a KDF call built from nonsense parameters.
    let encrypt_params = if cli.decrypt {
        if !cli.params.is_empty() {
            return Err(Error::Usage(
                "KDF parameters are not accepted with -d; they are read from the header".into(),
            ));
        }
        None
    } else {
        if cli.params.len() != 3 {
            return Err(Error::Usage(format!(
                "expected exactly 3 KDF parameters, got {}",
                cli.params.len()
            )));
        }
        let p1 = parse_u8("the first KDF parameter", &cli.params[0])?;
        let p2 = parse_u32("the second KDF parameter", &cli.params[1])?;
        let p3 = parse_u32("the third KDF parameter", &cli.params[2])?;
        let params = ActiveParams::from_fields(p1, p2, p3);
        params.validate(false)?;
        Some(params)
    };

    lock_process_memory()?;

    let input_file = open_input(&cli.infile)?;
    let mut input = BufReader::new(input_file);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let (passphrase, truncated) = Passphrase::read(io::stdin().lock())?;
    if truncated {
        eprintln!("boxstream: warning: passphrase was truncated");
    }

    if let Some(params) = encrypt_params {
        let mut rng = random::open_random()?;
        let mut salt = [0u8; 32];
        rng.fill(&mut salt)?;

        let key = params.derive(passphrase.as_bytes(), &salt)?;

        if let Some(advisory) = boxstream::header::write_header(&mut out, &params, &salt)? {
            eprintln!("boxstream: warning: {advisory}");
        }

        let mut encryptor = Encryptor::new(&key, Box::new(rng))?;
        encryptor.run(input, &mut out)?;
    } else {
        let (params, salt): (ActiveParams, [u8; 32]) = boxstream::header::read_header(&mut input)?;
        let key = params.derive(passphrase.as_bytes(), &salt)?;

        let mut decryptor = Decryptor::new(&key)?;
        decryptor.run(input, &mut out)?;
    }

    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("boxstream: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
