//! **boxstream** encrypts a regular file into a stream of
//! independently authenticated chunks and decrypts it back.
//!
//! Each chunk is sealed with XSalsa20-Poly1305 (libsodium's
//! `crypto_secretbox`) under a 24-octet nonce built from a per-stream
//! random prefix and a running counter of plaintext octets processed.
//! The random prefix is drawn once per stream and carried in the
//! first chunk's frame; every later chunk reuses it, so the counter
//! alone has to stay unique, which it does as long as a single stream
//! stays under the counter's range.
//!
//! The symmetric key is never handled directly: it is derived from a
//! passphrase and a random salt by a memory-hard KDF, selected at
//! compile time by a Cargo feature (`kdf-argon2`, the default, or
//! `kdf-scrypt`). The KDF parameters and the salt are stored
//! plaintext in a fixed-layout header at the front of the stream, so
//! a stream decrypts with nothing but the original passphrase.
//!
//! This crate is organized the way the on-disk format is laid out,
//! front to back:
//!
//! - [`header`] — the fixed preamble: obfuscated primitive tag, KDF
//!   parameters, salt.
//! - [`kdf`] — turns a passphrase and salt into a key.
//! - [`nonce`] — the per-chunk nonce schedule.
//! - [`codec`] — the chunked encrypt/decrypt loop itself.
//! - [`random`] — the validated `/dev/urandom` (or OS CSPRNG) source
//!   used for salts and nonce prefixes.
//! - [`securemem`] — memory locking and zeroize-on-drop buffers for
//!   the passphrase and derived key.
//! - [`error`] — the single error type and its process exit code
//!   mapping.

#![warn(rust_2018_idioms)]

pub mod codec;
pub mod error;
pub mod header;
pub mod kdf;
pub mod nonce;
pub mod random;
pub mod securemem;

pub use codec::{Decryptor, Encryptor, BUFLEN};
pub use error::{Error, Result};
pub use kdf::{ActiveParams, Params};
pub use random::RandomSource;
pub use securemem::{DerivedKey, Passphrase, PASSPHRASE_MAX};
