//! Marker layout: which placeholder receives which secret, and how.
//!
//! A [`MarkerLayout`] is the ordered table the embedding pipeline walks. Each
//! [`SlotSpec`] pairs a [`Slot`] with its marker bytes and the encoding used
//! to turn the caller's value into replacement bytes. The default layout
//! matches the stock core images; a TOML file can override any part of it
//! (see [`config`]).

pub mod config;
pub mod markers;

use std::fmt;

use crate::{Error, Result};

use markers::{
    AES_PASS_LEN, CHANNEL_PASSWORD_MARKER, CHAN_PASS_LEN, CONFIG_NAME_MARKER,
    CONF_PASSWORD_MARKER, DEFAULT_CONFIG_NAME, IDENTIFIER_LEN, IDENTIFIER_MARKER,
    LOG_PASSWORD_MARKER,
};

/// A secret slot in the image, listed in embedding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    LogPassword,
    ConfPassword,
    ChannelPassword,
    Identifier,
    ConfigName,
}

impl Slot {
    /// All slots in the order they are patched.
    pub const ALL: [Slot; 5] = [
        Slot::LogPassword,
        Slot::ConfPassword,
        Slot::ChannelPassword,
        Slot::Identifier,
        Slot::ConfigName,
    ];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Slot::LogPassword => "log password",
            Slot::ConfPassword => "conf password",
            Slot::ChannelPassword => "channel password",
            Slot::Identifier => "identifier",
            Slot::ConfigName => "config name",
        };
        f.write_str(label)
    }
}

/// How a slot's value becomes replacement bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    /// MD5 digest of the value (16 bytes).
    Digest,
    /// Leading bytes of the value, truncated to the marker width.
    Raw,
    /// UTF-16LE encoding of the value.
    Utf16Le,
}

/// One row of the layout table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    pub slot: Slot,
    pub marker: Vec<u8>,
    pub encoding: SecretEncoding,
}

impl SlotSpec {
    pub fn new(slot: Slot, marker: impl Into<Vec<u8>>, encoding: SecretEncoding) -> Self {
        Self {
            slot,
            marker: marker.into(),
            encoding,
        }
    }

    /// Width of the marker region, which bounds the replacement.
    pub fn marker_len(&self) -> usize {
        self.marker.len()
    }
}

/// Ordered slot table plus the minimum-length policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLayout {
    slots: Vec<SlotSpec>,
    /// Minimum identifier length.
    pub min_identifier_len: usize,
    /// Minimum log and conf password length.
    pub min_password_len: usize,
    /// Minimum channel password length.
    pub min_channel_len: usize,
    /// Configuration filename written into the config-name slot.
    pub config_name: String,
}

impl Default for MarkerLayout {
    fn default() -> Self {
        Self {
            slots: vec![
                SlotSpec::new(Slot::LogPassword, LOG_PASSWORD_MARKER, SecretEncoding::Digest),
                SlotSpec::new(Slot::ConfPassword, CONF_PASSWORD_MARKER, SecretEncoding::Digest),
                SlotSpec::new(Slot::ChannelPassword, CHANNEL_PASSWORD_MARKER, SecretEncoding::Raw),
                SlotSpec::new(Slot::Identifier, IDENTIFIER_MARKER, SecretEncoding::Raw),
                SlotSpec::new(Slot::ConfigName, CONFIG_NAME_MARKER, SecretEncoding::Utf16Le),
            ],
            min_identifier_len: IDENTIFIER_LEN,
            min_password_len: AES_PASS_LEN,
            min_channel_len: CHAN_PASS_LEN,
            config_name: DEFAULT_CONFIG_NAME.to_string(),
        }
    }
}

impl MarkerLayout {
    /// Slots in embedding order.
    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    pub fn slot(&self, slot: Slot) -> Option<&SlotSpec> {
        self.slots.iter().find(|spec| spec.slot == slot)
    }

    /// Replace the marker for `slot`, keeping its position and encoding.
    pub fn with_marker(mut self, slot: Slot, marker: impl Into<Vec<u8>>) -> Self {
        if let Some(spec) = self.slots.iter_mut().find(|spec| spec.slot == slot) {
            spec.marker = marker.into();
        }
        self
    }

    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = name.into();
        self
    }

    /// Check that every replacement can fit its marker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a marker is empty, a digest slot's marker
    /// is narrower than the digest, or the encoded config name is wider than
    /// its marker.
    pub fn validate(&self) -> Result<()> {
        for spec in &self.slots {
            if spec.marker.is_empty() {
                return Err(Error::Config(format!("Empty marker for {}", spec.slot)));
            }

            let needed = match spec.encoding {
                SecretEncoding::Digest => crate::secrets::DIGEST_LEN,
                SecretEncoding::Raw => 0,
                SecretEncoding::Utf16Le if spec.slot == Slot::ConfigName => {
                    self.config_name.encode_utf16().count() * 2
                }
                SecretEncoding::Utf16Le => 0,
            };

            if needed > spec.marker_len() {
                return Err(Error::Config(format!(
                    "{} needs {} bytes but its marker is {} bytes",
                    spec.slot,
                    needed,
                    spec.marker_len()
                )));
            }
        }
        Ok(())
    }
}
