//! The fixed-layout preamble written once at the start of every
//! stream: an obfuscated primitive tag, the three KDF parameter
//! fields, and the salt.

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::kdf::Params;

/// The AEAD primitive's name, as libsodium's `crypto_secretbox_PRIMITIVE`
/// spells it, including the trailing NUL.
pub const PRIMITIVE_NAME: &[u8] = b"xsalsa20poly1305\0";

/// Obfuscates (or, applied twice, de-obfuscates) the primitive tag.
///
/// This is a compatibility probe, not a security boundary: it just
/// keeps the raw primitive name from acting as a recognizable file
/// signature. Each compiled-in KDF uses its own pattern so builds
/// stay distinguishable the way the two original C variants were.
fn pattern_byte(i: usize) -> u8 {
    #[cfg(feature = "kdf-argon2")]
    {
        (0xeeu32 + ((i as u32) << 5)) as u8
    }
    #[cfg(feature = "kdf-scrypt")]
    {
        (0xffu32.wrapping_sub((i as u32) << 5)) as u8
    }
}

fn obfuscated_tag() -> Vec<u8> {
    PRIMITIVE_NAME
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ pattern_byte(i))
        .collect()
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

fn read_exact_named(name: &'static str, r: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    let n = read_full(r, buf)?;
    if n != buf.len() {
        return Err(Error::TruncatedHeader(name));
    }
    Ok(())
}

/// Writes the header and returns a non-fatal advisory (if the KDF
/// produced one) for the caller to print.
pub fn write_header<W: Write, P: Params>(
    out: &mut W,
    params: &P,
    salt: &[u8; 32],
) -> Result<Option<String>> {
    params.validate(false)?;
    let advisory = params.advisory();

    out.write_all(&obfuscated_tag())?;
    let (p1, p2, p3) = params.fields();
    let mut fields = [0u8; 8];
    BigEndian::write_u32(&mut fields[..4], p2);
    BigEndian::write_u32(&mut fields[4..], p3);
    out.write_all(&[p1])?;
    out.write_all(&fields)?;
    out.write_all(salt)?;
    Ok(advisory)
}

/// Reads and validates the header, returning the parameters and salt.
pub fn read_header<R: Read, P: Params>(input: &mut R) -> Result<(P, [u8; 32])> {
    let mut tag = vec![0u8; PRIMITIVE_NAME.len()];
    read_exact_named("magic", input, &mut tag)?;
    if tag != obfuscated_tag() {
        return Err(Error::BadMagic);
    }

    let mut p1 = [0u8; 1];
    read_exact_named("KDF parameter 1", input, &mut p1)?;

    let mut fields = [0u8; 8];
    read_exact_named("KDF parameters 2 and 3", input, &mut fields)?;

    let params = P::from_fields(
        p1[0],
        BigEndian::read_u32(&fields[..4]),
        BigEndian::read_u32(&fields[4..]),
    );
    params.validate(true)?;

    let mut salt = [0u8; 32];
    read_exact_named("salt", input, &mut salt)?;

    Ok((params, salt))
}
