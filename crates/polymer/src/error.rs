//! Error types for polymer operations.
//!
//! This module defines the [`enum@Error`] enum covering every way an embedding
//! run can fail, from input validation through marker lookup to signing.
//! Each variant maps onto an [`ErrorCategory`], which the command-line front
//! end turns into a process exit status.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;

use thiserror::Error;

use crate::layout::Slot;

/// Coarse failure class used to pick an exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Validation, key, marker or signing failure.
    Embedding,
    /// The output artifact could not be created, read back or written.
    Output,
}

/// Error type for polymer operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Match on variants to handle specific failure cases.
///
/// # Examples
///
/// ```no_run
/// use polymer::{Error, Polymer, Secrets};
///
/// let secrets = Secrets::new("RCS_1234567890", "0123456789abcdef", "fedcba9876543210", "chan-key");
/// match Polymer::new().embed(&secrets, "key.pem", "core.bin", "out.bin") {
///     Ok(report) => println!("Embedded {} slots", report.outcomes.len()),
///     Err(Error::MarkerNotFound { slot }) => eprintln!("Image has no {slot} marker"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// A secret is shorter than the layout's minimum.
    ///
    /// Reported before any file is touched.
    #[error("{field} should be at least {min} characters (got {actual})")]
    Validation {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    /// The private key file does not exist or cannot be opened.
    #[error("Cannot find key file [{}]", .0.display())]
    MissingKeyFile(PathBuf),

    /// The output path is occupied and the policy forbids replacing it.
    #[error("Output file [{}] already exists", .0.display())]
    OutputExists(PathBuf),

    /// Copying the source image to the output path failed.
    #[error("Cannot create output file [{}]: {source}", path.display())]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the output image back into memory failed.
    #[error("Cannot load image [{}]: {source}", path.display())]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Flushing the patched image to the output path failed.
    #[error("Cannot write patched image [{}]: {source}", path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The marker for a slot does not occur in the image.
    #[error("Cannot embed {slot}: marker not found")]
    MarkerNotFound { slot: Slot },

    /// A patch request falls outside the image or overflows its marker.
    #[error("Patch out of bounds: offset {offset}, marker {marker_len} bytes, replacement {replacement_len} bytes, image {image_len} bytes")]
    PatchBounds {
        offset: usize,
        marker_len: usize,
        replacement_len: usize,
        image_len: usize,
    },

    /// The signing collaborator refused or failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The private or public key could not be parsed.
    #[error("Invalid key: {0}")]
    Key(String),

    /// The marker layout is inconsistent or could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failure class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::OutputExists(_)
            | Error::CopyFailed { .. }
            | Error::LoadFailed { .. }
            | Error::PersistFailed { .. } => ErrorCategory::Output,
            _ => ErrorCategory::Embedding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_category() {
        let err = Error::CopyFailed {
            path: PathBuf::from("out.bin"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.category(), ErrorCategory::Output);
        assert_eq!(
            Error::OutputExists(PathBuf::from("out.bin")).category(),
            ErrorCategory::Output
        );
    }

    #[test]
    fn test_embedding_category() {
        let err = Error::MarkerNotFound {
            slot: Slot::ConfigName,
        };
        assert_eq!(err.category(), ErrorCategory::Embedding);
        assert_eq!(
            Error::Signing("refused".into()).category(),
            ErrorCategory::Embedding
        );
        assert_eq!(
            Error::MissingKeyFile(PathBuf::from("key.pem")).category(),
            ErrorCategory::Embedding
        );
    }

    #[test]
    fn test_validation_message() {
        let err = Error::Validation {
            field: "Identifier",
            min: 14,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Identifier should be at least 14 characters (got 3)"
        );
    }

    #[test]
    fn test_marker_not_found_names_slot() {
        let err = Error::MarkerNotFound {
            slot: Slot::ConfigName,
        };
        assert!(err.to_string().contains("config name"));
    }
}
