//! The streaming encrypt/decrypt loop: chunks a reader into fixed-size
//! pieces, wraps each in a detached-tag secretbox frame, and drives
//! the nonce scheduler across chunk and epoch boundaries.
//!
//! Wire layout per chunk: `[16-octet nonce-random-or-zero][16-octet
//! tag][ciphertext payload]`. The first 16 octets carry the fresh
//! random nonce prefix on the chunk that starts a new epoch, and are
//! all-zero on every other chunk (mirroring the secretbox's own
//! `BOXZEROBYTES` zero region, which this crate reuses as the epoch
//! announcement slot instead of wasting it).

use std::io::{Read, Write};

use crypto_secretbox::aead::{AeadInPlace, KeyInit};
use crypto_secretbox::{Key, Nonce, Tag, XSalsa20Poly1305};

use crate::error::{Error, Result};
use crate::nonce::{NonceScheduler, BOXZEROBYTES, NONCE_RANDOMS};
use crate::random::RandomSource;
use crate::securemem::DerivedKey;

/// Size of the per-chunk frame header: the random-or-zero prefix plus
/// the detached tag. Equal to the secretbox's `ZEROBYTES`.
const FRAME: usize = NONCE_RANDOMS + BOXZEROBYTES;

/// Size of the buffer used to stage one chunk, frame included.
pub const BUFLEN: usize = 8 * 1024 * 1024;

fn cipher_from(key: &DerivedKey) -> XSalsa20Poly1305 {
    let key_bytes: Key = (*key.as_bytes()).into();
    XSalsa20Poly1305::new(&key_bytes)
}

/// Allocates a chunk buffer directly on the heap (a stack-allocated
/// `[0u8; BUFLEN]` temporary would risk overflowing the stack in
/// debug builds before the move into the `Box`), reporting
/// [`Error::Alloc`] rather than aborting if the allocator can't
/// satisfy it.
fn alloc_buf() -> Result<Box<[u8; BUFLEN]>> {
    vec![0u8; BUFLEN]
        .into_boxed_slice()
        .try_into()
        .map_err(|_| Error::Alloc(BUFLEN))
}

fn read_full(r: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        let m = r.read(&mut buf[n..])?;
        if m == 0 {
            break;
        }
        n += m;
    }
    Ok(n)
}

/// Encrypts a stream chunk by chunk, writing framed ciphertext as it
/// goes.
pub struct Encryptor {
    cipher: XSalsa20Poly1305,
    nonce: NonceScheduler,
    random: Box<dyn RandomSource>,
    buf: Box<[u8; BUFLEN]>,
}

impl Encryptor {
    pub fn new(key: &DerivedKey, random: Box<dyn RandomSource>) -> Result<Self> {
        Ok(Encryptor {
            cipher: cipher_from(key),
            nonce: NonceScheduler::new(),
            random,
            buf: alloc_buf()?,
        })
    }

    /// Reads `input` to EOF, writing the framed ciphertext to `out`.
    /// Returns the number of plaintext octets processed.
    pub fn run<R: Read, W: Write>(&mut self, mut input: R, mut out: W) -> Result<u64> {
        let payload_cap = BUFLEN - FRAME;
        let mut total: u64 = 0;

        loop {
            let r = read_full(&mut input, &mut self.buf[FRAME..FRAME + payload_cap])?;
            if r == 0 {
                break;
            }

            let starting_epoch = self.nonce.needs_new_epoch();
            if starting_epoch {
                self.nonce.refresh(self.random.as_mut())?;
            }

            let tag = self
                .cipher
                .encrypt_in_place_detached(
                    Nonce::from_slice(self.nonce.bytes()),
                    b"",
                    &mut self.buf[FRAME..FRAME + r],
                )
                .map_err(|_| Error::Encryption("secretbox seal failed".into()))?;

            if starting_epoch {
                let prefix = self.nonce.random_prefix();
                self.buf[..NONCE_RANDOMS].copy_from_slice(&prefix);
            } else {
                self.buf[..NONCE_RANDOMS].fill(0);
            }
            self.buf[NONCE_RANDOMS..FRAME].copy_from_slice(tag.as_slice());

            self.nonce.advance(r)?;
            if starting_epoch {
                self.nonce.mark_epoch_started();
            }

            out.write_all(&self.buf[..FRAME + r])?;
            total += r as u64;
        }

        Ok(total)
    }
}

/// Decrypts a stream chunk by chunk, writing recovered plaintext as
/// it goes.
pub struct Decryptor {
    cipher: XSalsa20Poly1305,
    nonce: NonceScheduler,
    buf: Box<[u8; BUFLEN]>,
}

impl Decryptor {
    pub fn new(key: &DerivedKey) -> Result<Self> {
        Ok(Decryptor {
            cipher: cipher_from(key),
            nonce: NonceScheduler::new(),
            buf: alloc_buf()?,
        })
    }

    /// Reads framed ciphertext from `input` to EOF, writing recovered
    /// plaintext to `out`. Returns the number of plaintext octets
    /// recovered.
    ///
    /// On an authentication failure, the default build zero-fills the
    /// affected chunk and continues (matching the documented "wrong
    /// passphrase or tampering" signal); with the `strict-auth`
    /// feature enabled, it instead aborts with [`Error::Authentication`].
    pub fn run<R: Read, W: Write>(&mut self, mut input: R, mut out: W) -> Result<u64> {
        let mut total: u64 = 0;

        loop {
            let r = read_full(&mut input, &mut self.buf[..])?;
            if r == 0 {
                break;
            }
            if r <= FRAME {
                return Err(Error::ShortChunk {
                    expected: FRAME + 1,
                    at: self.nonce.total_read(),
                    got: r,
                });
            }

            let starting_epoch = self.nonce.needs_new_epoch();
            if starting_epoch {
                self.nonce.recover(&self.buf[..NONCE_RANDOMS]);
            } else {
                for (i, &b) in self.buf[..NONCE_RANDOMS].iter().enumerate() {
                    if b != 0 {
                        return Err(Error::NonZeroWhereZeroExpected {
                            at: self.nonce.total_read() + i as u64,
                            value: b,
                        });
                    }
                }
            }

            let tag = *Tag::from_slice(&self.buf[NONCE_RANDOMS..FRAME]);
            let payload_len = r - FRAME;

            let opened = self.cipher.decrypt_in_place_detached(
                Nonce::from_slice(self.nonce.bytes()),
                b"",
                &mut self.buf[FRAME..r],
                &tag,
            );
            if opened.is_err() {
                self.buf[FRAME..r].fill(0);
                #[cfg(feature = "strict-auth")]
                return Err(Error::Authentication);
            }

            self.nonce.advance(payload_len)?;
            if starting_epoch {
                self.nonce.mark_epoch_started();
            }

            out.write_all(&self.buf[FRAME..r])?;
            total += payload_len as u64;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomSource;

    struct Counter(u8);
    impl RandomSource for Counter {
        fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
            for b in buf.iter_mut() {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
            Ok(())
        }
    }

    fn key() -> DerivedKey {
        DerivedKey([0x11u8; 32])
    }

    #[test]
    fn round_trips_a_small_plaintext() {
        let plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();

        let mut enc = Encryptor::new(&key(), Box::new(Counter(0))).unwrap();
        let mut ciphertext = Vec::new();
        let n = enc.run(&plaintext[..], &mut ciphertext).unwrap();
        assert_eq!(n, plaintext.len() as u64);
        assert_ne!(&ciphertext[FRAME..], &plaintext[..]);

        let mut dec = Decryptor::new(&key()).unwrap();
        let mut recovered = Vec::new();
        let n = dec.run(&ciphertext[..], &mut recovered).unwrap();
        assert_eq!(n, plaintext.len() as u64);
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let mut enc = Encryptor::new(&key(), Box::new(Counter(0))).unwrap();
        let mut ciphertext = Vec::new();
        let n = enc.run(&b""[..], &mut ciphertext).unwrap();
        assert_eq!(n, 0);
        assert!(ciphertext.is_empty());

        let mut dec = Decryptor::new(&key()).unwrap();
        let mut recovered = Vec::new();
        let n = dec.run(&ciphertext[..], &mut recovered).unwrap();
        assert_eq!(n, 0);
        assert!(recovered.is_empty());
    }

    #[test]
    fn wrong_key_zero_fills_by_default() {
        let plaintext = b"top secret payload".to_vec();
        let mut enc = Encryptor::new(&key(), Box::new(Counter(5))).unwrap();
        let mut ciphertext = Vec::new();
        enc.run(&plaintext[..], &mut ciphertext).unwrap();

        let wrong_key = DerivedKey([0x22u8; 32]);
        let mut dec = Decryptor::new(&wrong_key).unwrap();
        let mut recovered = Vec::new();
        let n = dec.run(&ciphertext[..], &mut recovered).unwrap();
        assert_eq!(n, plaintext.len() as u64);
        assert!(recovered.iter().all(|&b| b == 0));
    }

    #[test]
    fn truncated_frame_is_a_short_chunk_error() {
        let plaintext = b"abc".to_vec();
        let mut enc = Encryptor::new(&key(), Box::new(Counter(9))).unwrap();
        let mut ciphertext = Vec::new();
        enc.run(&plaintext[..], &mut ciphertext).unwrap();
        ciphertext.truncate(FRAME);

        let mut dec = Decryptor::new(&key()).unwrap();
        let mut recovered = Vec::new();
        let err = dec.run(&ciphertext[..], &mut recovered).unwrap_err();
        assert!(matches!(err, Error::ShortChunk { .. }));
    }

    #[test]
    fn tampered_ciphertext_byte_zero_fills_by_default() {
        let plaintext = b"do not trust this byte".to_vec();
        let mut enc = Encryptor::new(&key(), Box::new(Counter(3))).unwrap();
        let mut ciphertext = Vec::new();
        enc.run(&plaintext[..], &mut ciphertext).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xff;

        let mut dec = Decryptor::new(&key()).unwrap();
        let mut recovered = Vec::new();
        let n = dec.run(&ciphertext[..], &mut recovered).unwrap();
        assert_eq!(n, plaintext.len() as u64);
        assert!(recovered.iter().all(|&b| b == 0));
    }

    #[test]
    fn multiple_chunks_stay_byte_identical_on_round_trip() {
        let mut plaintext = Vec::new();
        for i in 0..5000u32 {
            plaintext.extend_from_slice(&i.to_le_bytes());
        }

        let mut enc = Encryptor::new(&key(), Box::new(Counter(0))).unwrap();
        let mut ciphertext = Vec::new();
        enc.run(&plaintext[..], &mut ciphertext).unwrap();

        let mut dec = Decryptor::new(&key()).unwrap();
        let mut recovered = Vec::new();
        dec.run(&ciphertext[..], &mut recovered).unwrap();
        assert_eq!(recovered, plaintext);
    }
}
