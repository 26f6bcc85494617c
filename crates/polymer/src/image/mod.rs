//! Binary image buffer, marker scanning and in-place patching.
//!
//! An [`Image`] is the whole output file held in memory. Markers are located
//! with [`find`] and overwritten with [`apply`]; [`Image::persist`] writes the
//! patched bytes back to disk.

pub mod patcher;
pub mod scanner;

pub use patcher::apply;
pub use scanner::find;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use crate::{Error, Result};

/// Outcome of pairing one marker with one replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchResult {
    /// The marker was found and fully overwritten.
    Applied { offset: usize },
    /// The marker does not occur in the image; nothing was written.
    NotFound,
}

impl PatchResult {
    /// Whether the patch was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, PatchResult::Applied { .. })
    }
}

/// An owned, mutable binary image.
///
/// The buffer is zeroized on drop since it holds embedded secrets once
/// patched.
pub struct Image {
    data: Vec<u8>,
}

impl Image {
    /// Read an entire file into memory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { data })
    }

    /// Wrap an existing buffer.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Length recorded at load time.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// First offset of `marker`, if any.
    pub fn find(&self, marker: &[u8]) -> Option<usize> {
        find(&self.data, marker)
    }

    /// Overwrite `marker_len` bytes at `offset` with a zero-padded replacement.
    pub fn patch(&mut self, offset: usize, marker_len: usize, replacement: &[u8]) -> Result<()> {
        apply(&mut self.data, offset, marker_len, replacement)
    }

    /// Locate `marker` and overwrite it with `replacement`.
    ///
    /// Returns [`PatchResult::NotFound`] without touching the image when the
    /// marker is absent.
    pub fn locate_and_patch(&mut self, marker: &[u8], replacement: &[u8]) -> Result<PatchResult> {
        match self.find(marker) {
            Some(offset) => {
                self.patch(offset, marker.len(), replacement)?;
                Ok(PatchResult::Applied { offset })
            }
            None => Ok(PatchResult::NotFound),
        }
    }

    /// Write the buffer to `path`, replacing its contents, and sync it to disk.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let persist_err = |source| Error::PersistFailed {
            path: PathBuf::from(path),
            source,
        };

        let mut file = File::create(path).map_err(persist_err)?;
        file.write_all(&self.data).map_err(persist_err)?;
        file.sync_all().map_err(persist_err)?;
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image").field("len", &self.data.len()).finish()
    }
}
