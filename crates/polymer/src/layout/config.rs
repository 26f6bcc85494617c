//! TOML overrides for the marker layout.
//!
//! Every field is optional; anything left out keeps the built-in value.
//! Markers are hex-encoded.
//!
//! ```toml
//! config_name = "settings.bin"
//!
//! [min_lengths]
//! identifier = 14
//! password = 16
//! channel = 8
//!
//! [markers]
//! identifier = "6176337056636b316762346552"
//! ```

use std::path::Path;

use serde::Deserialize;

use super::{MarkerLayout, Slot};
use crate::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LayoutFile {
    config_name: Option<String>,
    min_lengths: MinLengths,
    markers: Markers,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MinLengths {
    identifier: Option<usize>,
    password: Option<usize>,
    channel: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Markers {
    log_password: Option<String>,
    conf_password: Option<String>,
    channel_password: Option<String>,
    identifier: Option<String>,
    config_name: Option<String>,
}

impl MarkerLayout {
    /// Parse a layout from TOML text, starting from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML is malformed, a marker is not
    /// valid hex, or the resulting layout fails [`MarkerLayout::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: LayoutFile = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse layout: {}", e)))?;

        let mut layout = MarkerLayout::default();

        if let Some(name) = file.config_name {
            layout.config_name = name;
        }
        if let Some(min) = file.min_lengths.identifier {
            layout.min_identifier_len = min;
        }
        if let Some(min) = file.min_lengths.password {
            layout.min_password_len = min;
        }
        if let Some(min) = file.min_lengths.channel {
            layout.min_channel_len = min;
        }

        let overrides = [
            (Slot::LogPassword, file.markers.log_password),
            (Slot::ConfPassword, file.markers.conf_password),
            (Slot::ChannelPassword, file.markers.channel_password),
            (Slot::Identifier, file.markers.identifier),
            (Slot::ConfigName, file.markers.config_name),
        ];
        for (slot, marker) in overrides {
            if let Some(encoded) = marker {
                let bytes = hex::decode(encoded.trim()).map_err(|e| {
                    Error::Config(format!("Invalid hex marker for {}: {}", slot, e))
                })?;
                layout = layout.with_marker(slot, bytes);
            }
        }

        layout.validate()?;
        Ok(layout)
    }

    /// Read and parse a layout file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let layout = MarkerLayout::from_toml_str("").unwrap();
        assert_eq!(layout, MarkerLayout::default());
    }

    #[test]
    fn test_overrides_applied() {
        let text = r#"
            config_name = "a.bin"

            [min_lengths]
            identifier = 10
            channel = 4

            [markers]
            channel_password = "deadbeef"
        "#;
        let layout = MarkerLayout::from_toml_str(text).unwrap();

        assert_eq!(layout.config_name, "a.bin");
        assert_eq!(layout.min_identifier_len, 10);
        assert_eq!(layout.min_password_len, 16);
        assert_eq!(layout.min_channel_len, 4);
        assert_eq!(
            layout.slot(Slot::ChannelPassword).unwrap().marker,
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(layout.slots()[2].slot, Slot::ChannelPassword);
    }

    #[test]
    fn test_invalid_hex() {
        let text = "[markers]\nidentifier = \"zz\"\n";
        let result = MarkerLayout::from_toml_str(text);
        if let Err(Error::Config(msg)) = result {
            assert!(msg.contains("identifier"));
        } else {
            panic!("expected config error");
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = MarkerLayout::from_toml_str("colour = \"blue\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_override_must_still_validate() {
        let text = "[markers]\nlog_password = \"00ff\"\n";
        assert!(matches!(
            MarkerLayout::from_toml_str(text),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("layout.toml");
        std::fs::write(&path, "config_name = \"x.dat\"\n").unwrap();

        let layout = MarkerLayout::from_file(&path).unwrap();
        assert_eq!(layout.config_name, "x.dat");
    }
}
