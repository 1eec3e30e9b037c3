//! The error type shared by every core module.
//!
//! Each variant maps to exactly one process exit code (see
//! [`Error::exit_code`]); `main.rs` is the only place that reads that
//! mapping, so the codes stay in one spot instead of being duplicated
//! at every call site.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building or driving a stream.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad `argv`: wrong arity, unparsable number, etc.
    #[error("{0}")]
    Usage(String),

    /// A KDF parameter was outside its valid range.
    ///
    /// On encrypt this is a usage error (exit 2); on decrypt, a
    /// corrupt or hostile header produced it, so it is a hard
    /// decode failure (exit 1).
    #[error("invalid KDF parameter: {message}")]
    ParamOutOfRange { message: String, decrypting: bool },

    /// The random device could not be opened or failed its identity
    /// check.
    #[error("{0}")]
    RandomDevice(String),

    /// `fstat` on the input (or random device) failed.
    #[error("couldn't fstat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    /// The input path is not a regular file.
    #[error("input file looks like a directory or special file: {0}")]
    NotRegularFile(PathBuf),

    /// Buffer allocation failed.
    #[error("couldn't allocate a {0}-byte buffer")]
    Alloc(usize),

    /// `mlockall` (or the per-buffer equivalent) failed.
    #[error("couldn't lock process memory: {0}")]
    MemoryLock(io::Error),

    /// The KDF itself reported a failure.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// The AEAD primitive reported an encryption failure (practically
    /// unreachable for secretbox, but the API is fallible).
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The header's obfuscated primitive tag didn't match.
    #[error("bad magic (maybe bad secretbox primitive)")]
    BadMagic,

    /// The header was shorter than the fixed preamble.
    #[error("invalid input: couldn't read {0}")]
    TruncatedHeader(&'static str),

    /// Any other I/O failure: a short write, or a read/write error
    /// not otherwise classified above.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// The final chunk was shorter than the mandatory zero/tag
    /// prefix, so it cannot possibly be authenticated.
    #[error(
        "invalid input: expected at least {expected} octets after {at:#x}, got only {got}"
    )]
    ShortChunk {
        expected: usize,
        at: u64,
        got: usize,
    },

    /// A byte that the protocol requires to be zero was not.
    #[error(
        "invalid input: octet {at:#x} should have been zero, not {value:#x}"
    )]
    NonZeroWhereZeroExpected { at: u64, value: u8 },

    /// A detached-tag AEAD open failed.
    ///
    /// Only produced when the `strict-auth` feature is enabled; the
    /// default build zero-fills the chunk instead (see DESIGN.md).
    #[error("authentication failed: wrong passphrase or tampered ciphertext")]
    Authentication,

    /// The per-stream chunk counter would have wrapped.
    #[error("counter overflow: stream is too large for a single nonce epoch")]
    CounterOverflow,
}

impl Error {
    /// The process exit code this error corresponds to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => 2,
            Error::ParamOutOfRange { decrypting, .. } => {
                if *decrypting {
                    1
                } else {
                    2
                }
            }
            Error::RandomDevice(_) | Error::Stat { .. } | Error::NotRegularFile(_) => 3,
            Error::Alloc(_) => 4,
            Error::MemoryLock(_) => 5,
            Error::Kdf(_) => 6,
            Error::BadMagic | Error::TruncatedHeader(_) | Error::Io(_) => 1,
            Error::ShortChunk { .. }
            | Error::NonZeroWhereZeroExpected { .. }
            | Error::Authentication
            | Error::CounterOverflow => 11,
        }
    }
}

/// Specialized [`Result`](std::result::Result) for this crate.
pub type Result<T> = std::result::Result<T, Error>;
