//! Signing collaborator invoked after every marker has been patched.
//!
//! The pipeline only depends on the [`Signer`] trait. [`KeyFileSigner`] is
//! the stock implementation; closures of the right shape also implement the
//! trait, which keeps tests and alternative toolchains simple.

pub mod key;
pub mod trailer;

pub use key::{Algorithm, SigningKeyType, VerifyingKeyType};
pub use trailer::{is_signed, split, verify, SignedImage};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::{Error, Result};

/// Signs an image file in place with a private key file.
///
/// On success the target carries a verifiable signature. On failure the
/// target must be left as it was.
pub trait Signer {
    fn sign(&self, target: &Path, key: &Path) -> Result<()>;
}

impl<F> Signer for F
where
    F: Fn(&Path, &Path) -> Result<()>,
{
    fn sign(&self, target: &Path, key: &Path) -> Result<()> {
        self(target, key)
    }
}

/// Appends an RSA or ECDSA signature trailer to the image.
///
/// See [`trailer`] for the on-disk layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFileSigner;

impl Signer for KeyFileSigner {
    fn sign(&self, target: &Path, key: &Path) -> Result<()> {
        let key = SigningKeyType::load(key)?;
        let payload = std::fs::read(target)?;

        if trailer::is_signed(&payload) {
            return Err(Error::Signing(format!(
                "[{}] is already signed",
                target.display()
            )));
        }

        let signature = key.sign(&payload)?;
        let encoded = trailer::encode(key.algorithm(), &signature);

        let mut file = OpenOptions::new().append(true).open(target)?;
        file.write_all(&encoded)?;
        file.sync_all()?;

        tracing::debug!(
            target_file = %target.display(),
            algorithm = ?key.algorithm(),
            signature_len = signature.len(),
            "signature appended"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use tempfile::TempDir;

    fn write_key(dir: &TempDir) -> (std::path::PathBuf, String) {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let path = dir.path().join("key.pem");
        std::fs::write(&path, key.to_pkcs8_pem(LineEnding::LF).unwrap().as_bytes()).unwrap();
        let public = key.verifying_key().to_public_key_pem(LineEnding::LF).unwrap();
        (path, public)
    }

    #[test]
    fn test_key_file_signer_appends_verifiable_trailer() {
        let dir = TempDir::new().unwrap();
        let (key_path, public_pem) = write_key(&dir);
        let target = dir.path().join("image.bin");
        std::fs::write(&target, b"patched image").unwrap();

        KeyFileSigner.sign(&target, &key_path).unwrap();

        let signed = std::fs::read(&target).unwrap();
        let parts = split(&signed).unwrap();
        assert_eq!(parts.payload, b"patched image");
        assert!(verify(&signed, &public_pem).is_ok());
    }

    #[test]
    fn test_key_file_signer_bad_key_leaves_target() {
        let dir = TempDir::new().unwrap();
        let key_path = dir.path().join("key.pem");
        std::fs::write(&key_path, b"garbage").unwrap();
        let target = dir.path().join("image.bin");
        std::fs::write(&target, b"patched image").unwrap();

        let result = KeyFileSigner.sign(&target, &key_path);
        assert!(matches!(result, Err(Error::Key(_))));
        assert_eq!(std::fs::read(&target).unwrap(), b"patched image");
    }

    #[test]
    fn test_key_file_signer_refuses_double_sign() {
        let dir = TempDir::new().unwrap();
        let (key_path, _) = write_key(&dir);
        let target = dir.path().join("image.bin");
        std::fs::write(&target, b"patched image").unwrap();

        KeyFileSigner.sign(&target, &key_path).unwrap();
        let once = std::fs::read(&target).unwrap();

        let result = KeyFileSigner.sign(&target, &key_path);
        assert!(matches!(result, Err(Error::Signing(_))));
        assert_eq!(std::fs::read(&target).unwrap(), once);
    }

    #[test]
    fn test_closure_signer() {
        let signer = |_: &Path, _: &Path| -> Result<()> { Err(Error::Signing("nope".into())) };
        let result = signer.sign(Path::new("a"), Path::new("b"));
        assert!(matches!(result, Err(Error::Signing(_))));
    }
}
