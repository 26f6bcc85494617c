//! Marker lookup over an in-memory image.
//!
//! The scan range is derived from the slice length before the search starts,
//! so no window ever extends past the end of the buffer. A truncated or
//! malformed image simply yields no match.

/// Find the first offset at which `marker` occurs in `image`.
///
/// Offsets are tried in ascending order and compared byte for byte. An empty
/// image, an empty marker, or a marker longer than the image returns `None`.
///
/// # Examples
///
/// ```
/// use polymer::image::find;
///
/// assert_eq!(find(b"xxMARKyy", b"MARK"), Some(2));
/// assert_eq!(find(b"short", b"much longer marker"), None);
/// ```
pub fn find(image: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || marker.len() > image.len() {
        return None;
    }

    image.windows(marker.len()).position(|window| window == marker)
}
