//! Private and public key handling for image signatures.
//!
//! Keys are PKCS#8 (or PKCS#1 for RSA) in PEM or DER form. Both RSA and
//! ECDSA P-256 are accepted; the algorithm is recorded in the signature
//! trailer so verification knows which one to use.

use std::path::Path;

use p256::ecdsa::{SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::{Error, Result};

/// Signature algorithm tag stored in the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 over SHA-256.
    RsaPkcs1Sha256 = 1,
    /// ECDSA P-256 over SHA-256, fixed 64-byte `r || s` encoding.
    EcdsaP256Sha256 = 2,
}

impl Algorithm {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Algorithm::RsaPkcs1Sha256),
            2 => Some(Algorithm::EcdsaP256Sha256),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Private key used to sign a patched image.
#[allow(clippy::large_enum_variant)]
pub enum SigningKeyType {
    Rsa(RsaPrivateKey),
    Ecdsa(EcdsaSigningKey),
}

impl SigningKeyType {
    /// Load a key file, trying PEM first and DER second.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_pem(&data).or_else(|_| Self::from_der(&data))
    }

    /// Parse a PEM-encoded PKCS#8 key, or a PKCS#1 RSA key.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        use pkcs8::DecodePrivateKey;
        use rsa::pkcs1::DecodeRsaPrivateKey;

        let pem = std::str::from_utf8(pem)
            .map_err(|e| Error::Key(format!("Invalid UTF-8 in key PEM: {}", e)))?;

        if let Ok(rsa_key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(SigningKeyType::Rsa(rsa_key))
        } else if let Ok(rsa_key) = RsaPrivateKey::from_pkcs1_pem(pem) {
            Ok(SigningKeyType::Rsa(rsa_key))
        } else if let Ok(ecdsa_key) = EcdsaSigningKey::from_pkcs8_pem(pem) {
            Ok(SigningKeyType::Ecdsa(ecdsa_key))
        } else {
            Err(Error::Key("Failed to parse private key as RSA or ECDSA".into()))
        }
    }

    /// Parse a DER-encoded PKCS#8 key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        use pkcs8::DecodePrivateKey;

        if let Ok(rsa_key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(SigningKeyType::Rsa(rsa_key));
        }

        if let Ok(ecdsa_key) = EcdsaSigningKey::from_pkcs8_der(der) {
            return Ok(SigningKeyType::Ecdsa(ecdsa_key));
        }

        Err(Error::Key("Failed to parse private key as RSA or ECDSA".into()))
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            SigningKeyType::Rsa(_) => Algorithm::RsaPkcs1Sha256,
            SigningKeyType::Ecdsa(_) => Algorithm::EcdsaP256Sha256,
        }
    }

    /// Sign `payload`, hashing it with SHA-256.
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match self {
            SigningKeyType::Rsa(key) => {
                use rsa::signature::{SignatureEncoding, Signer};

                let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let signature = signer
                    .try_sign(payload)
                    .map_err(|e| Error::Signing(format!("RSA signing failed: {}", e)))?;
                Ok(signature.to_vec())
            }
            SigningKeyType::Ecdsa(key) => {
                use p256::ecdsa::signature::Signer;

                let signature: p256::ecdsa::Signature = key
                    .try_sign(payload)
                    .map_err(|e| Error::Signing(format!("ECDSA signing failed: {}", e)))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

/// Public key used to check a signed image.
pub enum VerifyingKeyType {
    Rsa(RsaPublicKey),
    Ecdsa(EcdsaVerifyingKey),
}

impl VerifyingKeyType {
    /// Parse a PEM-encoded SubjectPublicKeyInfo.
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        use pkcs8::DecodePublicKey;

        if let Ok(rsa_key) = RsaPublicKey::from_public_key_pem(pem) {
            Ok(VerifyingKeyType::Rsa(rsa_key))
        } else if let Ok(ecdsa_key) = EcdsaVerifyingKey::from_public_key_pem(pem) {
            Ok(VerifyingKeyType::Ecdsa(ecdsa_key))
        } else {
            Err(Error::Key("Failed to parse public key as RSA or ECDSA".into()))
        }
    }

    /// Check `signature` over `payload` for the given algorithm.
    pub fn verify(&self, algorithm: Algorithm, payload: &[u8], signature: &[u8]) -> Result<()> {
        match (self, algorithm) {
            (VerifyingKeyType::Rsa(key), Algorithm::RsaPkcs1Sha256) => {
                use rsa::signature::Verifier;

                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|e| Error::Signing(format!("Malformed RSA signature: {}", e)))?;
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
                    .verify(payload, &signature)
                    .map_err(|_| Error::Signing("RSA signature does not verify".into()))
            }
            (VerifyingKeyType::Ecdsa(key), Algorithm::EcdsaP256Sha256) => {
                use p256::ecdsa::signature::Verifier;

                let signature = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|e| Error::Signing(format!("Malformed ECDSA signature: {}", e)))?;
                key.verify(payload, &signature)
                    .map_err(|_| Error::Signing("ECDSA signature does not verify".into()))
            }
            _ => Err(Error::Signing(format!(
                "Key type does not match signature algorithm {:?}",
                algorithm
            ))),
        }
    }
}
