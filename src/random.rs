//! The byte source used for salts and nonce prefixes.
//!
//! The contract is stricter than "give me some random bytes": the
//! source must be verified to be the thing we think it is before a
//! single byte is trusted. On Linux that means opening
//! `/dev/urandom` and checking it is really the kernel's non-blocking
//! random character device (major 1, minor 9) rather than, say, a
//! same-named regular file planted by a hostile container image.

use std::fs::File;
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{Error, Result};

const URANDOM_PATH: &str = "/dev/urandom";
const URANDOM_MAJOR: u64 = 1;
const URANDOM_MINOR: u64 = 9;

fn major(rdev: u64) -> u64 {
    ((rdev >> 8) & 0xfff) | ((rdev >> 32) & !0xfff)
}

fn minor(rdev: u64) -> u64 {
    (rdev & 0xff) | ((rdev >> 12) & !0xff)
}

/// A validated source of cryptographically secure random bytes.
pub trait RandomSource {
    /// Fills `buf` entirely or fails; short reads are never reported
    /// as success.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// `/dev/urandom`, opened and identity-checked once at startup.
pub struct Urandom {
    file: File,
}

impl Urandom {
    /// Opens and validates [`URANDOM_PATH`].
    ///
    /// Refuses to proceed if the path isn't a character device with
    /// the kernel random device's major/minor numbers.
    pub fn open() -> Result<Self> {
        let path = Path::new(URANDOM_PATH);
        let file = File::open(path).map_err(|e| {
            Error::RandomDevice(format!("couldn't open {}: {e}", URANDOM_PATH))
        })?;
        let meta = file.metadata().map_err(|e| Error::Stat {
            path: path.to_path_buf(),
            source: e,
        })?;
        use std::os::unix::fs::FileTypeExt;
        let rdev = meta.rdev();
        if !meta.file_type().is_char_device()
            || major(rdev) != URANDOM_MAJOR
            || minor(rdev) != URANDOM_MINOR
        {
            return Err(Error::RandomDevice(format!(
                "{URANDOM_PATH} looks invalid, refusing to use it"
            )));
        }
        Ok(Urandom { file })
    }
}

impl RandomSource for Urandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut n = 0;
        while n < buf.len() {
            let m = self.file.read(&mut buf[n..]).map_err(|_| {
                Error::RandomDevice(format!("{URANDOM_PATH} failed to provide"))
            })?;
            if m == 0 {
                return Err(Error::RandomDevice(format!(
                    "{URANDOM_PATH} failed to provide"
                )));
            }
            n += m;
        }
        Ok(())
    }
}

/// A vetted CSPRNG fallback for platforms without the `/dev/urandom`
/// major/minor convention.
///
/// Still required to report success only for the exact byte count
/// requested, matching [`RandomSource::fill`]'s contract.
pub struct OsRandom;

impl OsRandom {
    pub fn open() -> Result<Self> {
        Ok(OsRandom)
    }
}

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buf)
            .map_err(|e| Error::RandomDevice(format!("OS CSPRNG failed to provide: {e}")))
    }
}

/// Opens the platform's validated random source.
#[cfg(target_os = "linux")]
pub fn open_random() -> Result<Urandom> {
    Urandom::open()
}

#[cfg(not(target_os = "linux"))]
pub fn open_random() -> Result<OsRandom> {
    OsRandom::open()
}
