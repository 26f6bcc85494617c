//! Signature trailer appended to a signed image.
//!
//! Layout, from the end of the file backwards:
//!
//! ```text
//! [payload][signature][sig_len: u32 LE][algorithm: u8][magic: 8 bytes]
//! ```

use super::key::{Algorithm, VerifyingKeyType};
use crate::{Error, Result};

/// Trailer magic, last eight bytes of every signed image.
pub const TRAILER_MAGIC: [u8; 8] = *b"PLYSIG01";

/// Fixed part of the trailer: length, algorithm, magic.
pub const TRAILER_FIXED_LEN: usize = 4 + 1 + TRAILER_MAGIC.len();

/// A signed image split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedImage<'a> {
    pub payload: &'a [u8],
    pub signature: &'a [u8],
    pub algorithm: Algorithm,
}

/// Build the trailer bytes for `signature`.
pub fn encode(algorithm: Algorithm, signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(signature.len() + TRAILER_FIXED_LEN);
    out.extend_from_slice(signature);
    out.extend_from_slice(&(signature.len() as u32).to_le_bytes());
    out.push(algorithm.tag());
    out.extend_from_slice(&TRAILER_MAGIC);
    out
}

/// Split a signed image, or `None` if it carries no well-formed trailer.
pub fn split(data: &[u8]) -> Option<SignedImage<'_>> {
    let fixed_start = data.len().checked_sub(TRAILER_FIXED_LEN)?;
    let fixed = &data[fixed_start..];

    if fixed[5..] != TRAILER_MAGIC {
        return None;
    }

    let algorithm = Algorithm::from_tag(fixed[4])?;
    let sig_len = u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]) as usize;
    let sig_start = fixed_start.checked_sub(sig_len)?;

    Some(SignedImage {
        payload: &data[..sig_start],
        signature: &data[sig_start..fixed_start],
        algorithm,
    })
}

/// Whether `data` ends with a signature trailer.
pub fn is_signed(data: &[u8]) -> bool {
    split(data).is_some()
}

/// Verify a signed image against a PEM public key.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the trailer is missing or the signature does
/// not match, and [`Error::Key`] if the public key cannot be parsed.
pub fn verify(data: &[u8], public_key_pem: &str) -> Result<()> {
    let signed = split(data).ok_or_else(|| Error::Signing("Image carries no signature".into()))?;
    let key = VerifyingKeyType::from_public_key_pem(public_key_pem)?;
    key.verify(signed.algorithm, signed.payload, signed.signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_split() {
        let mut data = b"image bytes".to_vec();
        data.extend(encode(Algorithm::EcdsaP256Sha256, &[0xaa; 64]));

        let signed = split(&data).unwrap();
        assert_eq!(signed.payload, b"image bytes");
        assert_eq!(signed.signature, &[0xaa; 64][..]);
        assert_eq!(signed.algorithm, Algorithm::EcdsaP256Sha256);
    }

    #[test]
    fn test_split_unsigned() {
        assert!(split(b"plain image without trailer").is_none());
        assert!(!is_signed(b"tiny"));
        assert!(split(b"").is_none());
    }

    #[test]
    fn test_split_rejects_oversized_length() {
        let mut data = Vec::new();
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.push(Algorithm::RsaPkcs1Sha256.tag());
        data.extend_from_slice(&TRAILER_MAGIC);
        assert!(split(&data).is_none());
    }

    #[test]
    fn test_split_rejects_unknown_algorithm() {
        let mut data = b"payload".to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(9);
        data.extend_from_slice(&TRAILER_MAGIC);
        assert!(split(&data).is_none());
    }

    #[test]
    fn test_verify_unsigned_image() {
        let result = verify(b"unsigned", "irrelevant");
        if let Err(Error::Signing(msg)) = result {
            assert!(msg.contains("no signature"));
        } else {
            panic!("expected signing error");
        }
    }
}
