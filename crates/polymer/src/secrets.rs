//! Caller-supplied secret material and its encoding into replacement bytes.

use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::layout::{MarkerLayout, SecretEncoding, Slot, SlotSpec};
use crate::{Error, Result};

/// Length of the password digest embedded in digest slots.
pub const DIGEST_LEN: usize = 16;

/// The values embedded into one personalized image.
///
/// Passwords are held as [`SecretString`] and zeroized when dropped.
pub struct Secrets {
    pub identifier: String,
    pub log_password: SecretString,
    pub conf_password: SecretString,
    pub channel_password: SecretString,
}

impl Secrets {
    pub fn new(
        identifier: impl Into<String>,
        log_password: impl Into<String>,
        conf_password: impl Into<String>,
        channel_password: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            log_password: SecretString::new(log_password.into()),
            conf_password: SecretString::new(conf_password.into()),
            channel_password: SecretString::new(channel_password.into()),
        }
    }

    /// Check minimum lengths in order: identifier, log, conf, channel.
    ///
    /// Lengths are counted in bytes. Only the first violation is reported.
    pub fn validate(&self, layout: &MarkerLayout) -> Result<()> {
        let checks = [
            ("Identifier", self.identifier.len(), layout.min_identifier_len),
            (
                "Log password",
                self.log_password.expose_secret().len(),
                layout.min_password_len,
            ),
            (
                "Conf password",
                self.conf_password.expose_secret().len(),
                layout.min_password_len,
            ),
            (
                "Channel password",
                self.channel_password.expose_secret().len(),
                layout.min_channel_len,
            ),
        ];

        for (field, actual, min) in checks {
            if actual < min {
                return Err(Error::Validation { field, min, actual });
            }
        }
        Ok(())
    }

    /// Bytes to write over `spec`'s marker.
    pub fn replacement_for(&self, spec: &SlotSpec, config_name: &str) -> Zeroizing<Vec<u8>> {
        let value: &str = match spec.slot {
            Slot::LogPassword => self.log_password.expose_secret().as_str(),
            Slot::ConfPassword => self.conf_password.expose_secret().as_str(),
            Slot::ChannelPassword => self.channel_password.expose_secret().as_str(),
            Slot::Identifier => self.identifier.as_str(),
            Slot::ConfigName => config_name,
        };

        match spec.encoding {
            SecretEncoding::Digest => Zeroizing::new(digest(value.as_bytes()).to_vec()),
            SecretEncoding::Raw => {
                let bytes = value.as_bytes();
                let len = bytes.len().min(spec.marker_len());
                Zeroizing::new(bytes[..len].to_vec())
            }
            SecretEncoding::Utf16Le => Zeroizing::new(
                value
                    .encode_utf16()
                    .flat_map(|unit| unit.to_le_bytes())
                    .collect(),
            ),
        }
    }
}

/// MD5 digest of a password.
pub fn digest(bytes: &[u8]) -> Zeroizing<[u8; DIGEST_LEN]> {
    let mut hasher = Md5::new();
    hasher.update(bytes);

    let mut out = Zeroizing::new([0u8; DIGEST_LEN]);
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Secrets {
        Secrets::new(
            "RCS_1234567890",
            "0123456789abcdef",
            "fedcba9876543210",
            "chan-key",
        )
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate(&MarkerLayout::default()).is_ok());
    }

    #[test]
    fn test_validate_identifier_first() {
        let secrets = Secrets::new("RCS_1", "short", "short", "x");
        let result = secrets.validate(&MarkerLayout::default());
        if let Err(Error::Validation { field, min, actual }) = result {
            assert_eq!(field, "Identifier");
            assert_eq!(min, 14);
            assert_eq!(actual, 5);
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_validate_order_after_identifier() {
        let layout = MarkerLayout::default();

        let secrets = Secrets::new("RCS_1234567890", "short", "short", "x");
        assert!(matches!(
            secrets.validate(&layout),
            Err(Error::Validation { field: "Log password", .. })
        ));

        let secrets = Secrets::new("RCS_1234567890", "0123456789abcdef", "short", "x");
        assert!(matches!(
            secrets.validate(&layout),
            Err(Error::Validation { field: "Conf password", .. })
        ));

        let secrets = Secrets::new(
            "RCS_1234567890",
            "0123456789abcdef",
            "fedcba9876543210",
            "x",
        );
        assert!(matches!(
            secrets.validate(&layout),
            Err(Error::Validation {
                field: "Channel password",
                min: 8,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_digest_known_value() {
        // RFC 1321 test vector.
        assert_eq!(
            hex::encode(*digest(b"abc")),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_replacement_digest() {
        let layout = MarkerLayout::default();
        let spec = layout.slot(Slot::LogPassword).unwrap();
        let bytes = valid().replacement_for(spec, &layout.config_name);
        assert_eq!(bytes.as_slice(), &digest(b"0123456789abcdef")[..]);
    }

    #[test]
    fn test_replacement_raw_truncates_to_marker() {
        let layout = MarkerLayout::default();
        let secrets = Secrets::new(
            "RCS_1234567890XYZ",
            "0123456789abcdef",
            "fedcba9876543210",
            "chan-key-longer",
        );

        let id = secrets.replacement_for(layout.slot(Slot::Identifier).unwrap(), "");
        assert_eq!(id.as_slice(), b"RCS_1234567890");

        let chan = secrets.replacement_for(layout.slot(Slot::ChannelPassword).unwrap(), "");
        assert_eq!(chan.as_slice(), b"chan-key");
    }

    #[test]
    fn test_replacement_config_name_utf16() {
        let layout = MarkerLayout::default();
        let spec = layout.slot(Slot::ConfigName).unwrap();
        let bytes = valid().replacement_for(spec, "cfg.dat");
        assert_eq!(
            bytes.as_slice(),
            b"c\0f\0g\0.\0d\0a\0t\0"
        );
    }
}
