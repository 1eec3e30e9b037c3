//! Turns a passphrase, a salt, and a parameter triple into the
//! 32-octet symmetric key used for every chunk of a stream.
//!
//! Exactly one KDF is compiled into a given binary, selected by a
//! Cargo feature: `kdf-argon2` (Argon2i) or `kdf-scrypt`. The three
//! on-wire parameter fields (1 + 4 + 4 octets) are the same shape for
//! both; only their *meaning* — and therefore their valid ranges and
//! the work they command — depends on which one was compiled in.

#[cfg(all(feature = "kdf-argon2", feature = "kdf-scrypt"))]
compile_error!("features `kdf-argon2` and `kdf-scrypt` are mutually exclusive");

#[cfg(not(any(feature = "kdf-argon2", feature = "kdf-scrypt")))]
compile_error!("enable exactly one of the `kdf-argon2` or `kdf-scrypt` features");

use crate::error::{Error, Result};
use crate::securemem::DerivedKey;

/// The three on-wire parameter fields, with KDF-specific validation
/// and key derivation.
pub trait Params: Sized + Copy {
    /// Reassembles parameters read off the wire.
    fn from_fields(p1: u8, p2: u32, p3: u32) -> Self;

    /// Splits parameters back into their wire fields.
    fn fields(&self) -> (u8, u32, u32);

    /// Validates the parameter ranges.
    ///
    /// `decrypting` only affects which exit code the caller will map
    /// the resulting [`Error::ParamOutOfRange`] to.
    fn validate(&self, decrypting: bool) -> Result<()>;

    /// A non-fatal advisory, if any (only scrypt has one).
    fn advisory(&self) -> Option<String> {
        None
    }

    /// Runs the KDF, producing a 32-octet key.
    ///
    /// `passphrase` is not consumed here; callers are expected to
    /// zeroize it immediately afterward via [`crate::securemem::Passphrase`]'s
    /// `Drop` impl.
    fn derive(&self, passphrase: &[u8], salt: &[u8; 32]) -> Result<DerivedKey>;
}

/// Argon2i parameters: `logM` (memory as a power of two, in KiB),
/// `t` (iterations), `parallelism` (lanes).
#[cfg(feature = "kdf-argon2")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Argon2Params {
    pub log_m: u8,
    pub t: u32,
    pub parallelism: u32,
}

#[cfg(feature = "kdf-argon2")]
impl Params for Argon2Params {
    fn from_fields(p1: u8, p2: u32, p3: u32) -> Self {
        Argon2Params {
            log_m: p1,
            t: p2,
            parallelism: p3,
        }
    }

    fn fields(&self) -> (u8, u32, u32) {
        (self.log_m, self.t, self.parallelism)
    }

    fn validate(&self, decrypting: bool) -> Result<()> {
        if !(2..32).contains(&self.log_m) {
            return Err(Error::ParamOutOfRange {
                message: format!("logM {} should be in [2, 32)", self.log_m),
                decrypting,
            });
        }
        if self.t == 0 {
            return Err(Error::ParamOutOfRange {
                message: "t should be in [1, 2^32)".into(),
                decrypting,
            });
        }
        if self.parallelism == 0 || self.parallelism >= 1 << 24 {
            return Err(Error::ParamOutOfRange {
                message: format!(
                    "parallelism {} should be in [1, 2^24)",
                    self.parallelism
                ),
                decrypting,
            });
        }
        // 8 KiB is needed for each level of parallelism.
        if (1u64 << self.log_m) < (self.parallelism as u64) * 8 {
            return Err(Error::ParamOutOfRange {
                message: format!(
                    "logM {} and parallelism {}: 8 KiB is needed for each level of parallelism",
                    self.log_m, self.parallelism
                ),
                decrypting,
            });
        }
        Ok(())
    }

    fn derive(&self, passphrase: &[u8], salt: &[u8; 32]) -> Result<DerivedKey> {
        use argon2::{Algorithm, Argon2, Params as A2Params, Version};

        let params = A2Params::new(1u32 << self.log_m, self.t, self.parallelism, Some(32))
            .map_err(|e| Error::Kdf(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2i, Version::V0x13, params);
        let mut out = DerivedKey::zero();
        argon2
            .hash_password_into(passphrase, salt, &mut out.0)
            .map_err(|e| Error::Kdf(e.to_string()))?;
        Ok(out)
    }
}

/// scrypt parameters: `logN`, `r` (block size), `p` (parallelization).
#[cfg(feature = "kdf-scrypt")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScryptParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

#[cfg(feature = "kdf-scrypt")]
impl Params for ScryptParams {
    fn from_fields(p1: u8, p2: u32, p3: u32) -> Self {
        ScryptParams {
            log_n: p1,
            r: p2,
            p: p3,
        }
    }

    fn fields(&self) -> (u8, u32, u32) {
        (self.log_n, self.r, self.p)
    }

    fn validate(&self, decrypting: bool) -> Result<()> {
        if !(2..64).contains(&self.log_n) {
            return Err(Error::ParamOutOfRange {
                message: format!("logN {} should be in [2, 64)", self.log_n),
                decrypting,
            });
        }
        if self.r == 0 || self.r >= 1 << 30 {
            return Err(Error::ParamOutOfRange {
                message: format!("r {} should be in [1, 2^30)", self.r),
                decrypting,
            });
        }
        if self.p == 0 || self.p >= 1 << 30 {
            return Err(Error::ParamOutOfRange {
                message: format!("p {} should be in [1, 2^30)", self.p),
                decrypting,
            });
        }
        if (self.r as u64) * (self.p as u64) >= 1 << 30 {
            return Err(Error::ParamOutOfRange {
                message: format!("r*p ({}) should be less than 2^30", self.r as u64 * self.p as u64),
                decrypting,
            });
        }
        Ok(())
    }

    fn advisory(&self) -> Option<String> {
        let n = 1u64 << self.log_n;
        let memory_cost = 128u64 * self.r as u64 * (n + self.p as u64);
        if memory_cost < 16 * 1024 * 1024 {
            Some(format!(
                "scrypt memory cost is only {memory_cost} bytes; 16 MiB or more is recommended"
            ))
        } else {
            None
        }
    }

    fn derive(&self, passphrase: &[u8], salt: &[u8; 32]) -> Result<DerivedKey> {
        use scrypt::{scrypt, Params as ScryptLibParams};

        let params = ScryptLibParams::new(self.log_n, self.r, self.p, 32)
            .map_err(|e| Error::Kdf(e.to_string()))?;
        let mut out = DerivedKey::zero();
        scrypt(passphrase, salt, &params, &mut out.0).map_err(|e| Error::Kdf(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(feature = "kdf-argon2")]
pub type ActiveParams = Argon2Params;
#[cfg(feature = "kdf-scrypt")]
pub type ActiveParams = ScryptParams;
