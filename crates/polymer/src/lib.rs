//! Marker-based secret embedding for prebuilt binary images.
//!
//! A stock core image is compiled with fixed placeholder byte patterns
//! (markers). [`Polymer`] copies the image, overwrites each marker with the
//! caller's secret material in a fixed order, writes the result back and
//! hands it to a [`Signer`]. Any failure removes the output again.

pub mod builder;
pub mod error;
pub mod image;
pub mod layout;
pub mod secrets;
pub mod signing;

pub use builder::{failed_stage, EmbedReport, ExistingOutput, Polymer, Stage};
pub use error::{Error, ErrorCategory};
pub use image::{Image, PatchResult};
pub use layout::{MarkerLayout, SecretEncoding, Slot, SlotSpec};
pub use secrets::Secrets;
pub use signing::{KeyFileSigner, Signer};

pub type Result<T> = std::result::Result<T, Error>;
