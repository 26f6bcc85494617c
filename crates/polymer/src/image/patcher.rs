//! In-place overwrite of a located marker region.

use crate::{Error, Result};

/// Overwrite the marker region `[offset, offset + marker_len)` with `replacement`.
///
/// The whole region is zeroed first, then the leading `replacement.len()`
/// bytes are copied in, so any tail the replacement does not cover stays
/// zero. Reapplying the same patch leaves the bytes unchanged.
///
/// # Errors
///
/// Returns [`Error::PatchBounds`] if the replacement is longer than the
/// marker or the region runs past the end of the image. The image is not
/// modified in that case.
pub fn apply(image: &mut [u8], offset: usize, marker_len: usize, replacement: &[u8]) -> Result<()> {
    let end = offset.checked_add(marker_len);

    let region = match end {
        Some(end) if replacement.len() <= marker_len && end <= image.len() => {
            &mut image[offset..end]
        }
        _ => {
            return Err(Error::PatchBounds {
                offset,
                marker_len,
                replacement_len: replacement.len(),
                image_len: image.len(),
            })
        }
    };

    region.fill(0);
    region[..replacement.len()].copy_from_slice(replacement);

    Ok(())
}
