//! Locks the process's address space against swapping and holds the
//! two pieces of secret material (the passphrase and the derived
//! key) in buffers that are zeroized when they go out of scope.

use std::io::{self, Read};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Upper bound on the passphrase read from standard input.
pub const PASSPHRASE_MAX: usize = 16 * 1024;

/// Locks the entire process address space (current and future
/// allocations) so secret material is never swapped to disk.
///
/// Must be called before any sensitive buffer (passphrase, derived
/// key) is allocated. On platforms without `mlockall` this is a
/// best-effort no-op; the buffers are still zeroized on drop.
pub fn lock_process_memory() -> Result<()> {
    #[cfg(unix)]
    {
        // SAFETY: mlockall has no preconditions beyond a valid flag
        // bitmask; it mutates kernel-side page tables, not memory we
        // hold a reference to.
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc != 0 {
            return Err(Error::MemoryLock(io::Error::last_os_error()));
        }
    }
    Ok(())
}

/// The passphrase read from standard input.
///
/// Bytes beyond [`PASSPHRASE_MAX`] are discarded; [`Passphrase::read`]
/// reports whether that happened so the caller can print the warning
/// mandated by the data model (truncation is not an error).
pub struct Passphrase {
    buf: Box<[u8; PASSPHRASE_MAX]>,
    len: usize,
}

impl Passphrase {
    /// Reads up to [`PASSPHRASE_MAX`] octets from `r`.
    ///
    /// Returns the passphrase and whether it was truncated.
    pub fn read<R: Read>(mut r: R) -> Result<(Self, bool)> {
        let mut buf = Box::new([0u8; PASSPHRASE_MAX]);
        let mut n = 0;
        while n < buf.len() {
            let m = r.read(&mut buf[n..])?;
            if m == 0 {
                break;
            }
            n += m;
        }
        // A passphrase that exactly fills the buffer is ambiguous
        // with one that was truncated; treat it the same way the
        // original tool does and warn.
        let truncated = n == buf.len();
        Ok((Passphrase { buf, len: n }, truncated))
    }

    /// The passphrase bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Drop for Passphrase {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

/// A 32-octet key derived by the KDF, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey(pub [u8; 32]);

impl DerivedKey {
    pub fn zero() -> Self {
        DerivedKey([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for DerivedKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
