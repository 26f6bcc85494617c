//! Polymer builder API
//!
//! Provides a builder pattern interface for embedding secrets into a
//! prebuilt core image and signing the result. A run either leaves a fully
//! patched, signed output file behind or no output file at all.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::image::{Image, PatchResult};
use crate::layout::{MarkerLayout, Slot};
use crate::secrets::Secrets;
use crate::signing::{KeyFileSigner, Signer};
use crate::{Error, Result};

/// Step of an embedding run, used in logs and failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Copying,
    Loading,
    Patching(Slot),
    Persisting,
    Signing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validating => f.write_str("validating"),
            Stage::Copying => f.write_str("copying"),
            Stage::Loading => f.write_str("loading"),
            Stage::Patching(slot) => write!(f, "patching {}", slot),
            Stage::Persisting => f.write_str("persisting"),
            Stage::Signing => f.write_str("signing"),
        }
    }
}

/// What to do when the output path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingOutput {
    /// Replace it.
    #[default]
    Overwrite,
    /// Fail before anything is written.
    Reject,
    /// Rename it to `<output>.bak`, then proceed.
    ///
    /// If the run fails afterwards the backup is renamed back to `<output>`.
    Backup,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    /// The signed output file.
    pub output: PathBuf,
    /// Where a pre-existing output was moved, under [`ExistingOutput::Backup`].
    pub backup: Option<PathBuf>,
    /// Per-slot outcome, in embedding order.
    pub outcomes: Vec<(Slot, PatchResult)>,
    /// Size of the patched image before signing.
    pub image_len: usize,
}

/// Secret embedding tool with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use polymer::{ExistingOutput, Polymer, Secrets};
///
/// let secrets = Secrets::new("RCS_1234567890", "0123456789abcdef", "fedcba9876543210", "chan-key");
///
/// let report = Polymer::new()
///     .existing_output(ExistingOutput::Reject)
///     .embed(&secrets, "signing-key.pem", "core.bin", "core-personalized.bin")?;
/// println!("wrote {}", report.output.display());
/// # Ok::<(), polymer::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Polymer<S = KeyFileSigner> {
    layout: MarkerLayout,
    existing_output: ExistingOutput,
    signer: S,
}

impl Polymer<KeyFileSigner> {
    /// Create a builder with the default layout and the key-file signer.
    pub fn new() -> Self {
        Self {
            layout: MarkerLayout::default(),
            existing_output: ExistingOutput::default(),
            signer: KeyFileSigner,
        }
    }
}

impl Default for Polymer<KeyFileSigner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signer> Polymer<S> {
    /// Set the marker layout.
    pub fn layout(mut self, layout: MarkerLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the policy for a pre-existing output file.
    pub fn existing_output(mut self, policy: ExistingOutput) -> Self {
        self.existing_output = policy;
        self
    }

    /// Replace the signing collaborator.
    pub fn signer<T: Signer>(self, signer: T) -> Polymer<T> {
        Polymer {
            layout: self.layout,
            existing_output: self.existing_output,
            signer,
        }
    }

    /// Embed `secrets` into a copy of `source` written to `output`, then sign it.
    ///
    /// # Arguments
    ///
    /// * `secrets` - Values to embed
    /// * `key` - Private key handed to the signer
    /// * `source` - Stock core image containing every marker
    /// * `output` - Path of the personalized image
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The layout or a secret fails validation (nothing is written)
    /// - The key is not a readable regular file (nothing is written)
    /// - The source image cannot be opened (nothing is written)
    /// - The output exists and the policy is [`ExistingOutput::Reject`]
    /// - The copy, load or write-back of the output fails
    /// - A marker is missing from the image
    /// - Signing fails
    ///
    /// Every failure after the output has been created removes it again, and
    /// a backup made under [`ExistingOutput::Backup`] is moved back.
    pub fn embed(
        &self,
        secrets: &Secrets,
        key: impl AsRef<Path>,
        source: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<EmbedReport> {
        self.embed_with_progress(secrets, key, source, output, |_, _| {})
    }

    /// Like [`Polymer::embed`], reporting each slot's outcome as it happens.
    ///
    /// `progress` sees every applied slot in order and, on a missing marker,
    /// the failing slot with [`PatchResult::NotFound`] before the error is
    /// returned.
    pub fn embed_with_progress(
        &self,
        secrets: &Secrets,
        key: impl AsRef<Path>,
        source: impl AsRef<Path>,
        output: impl AsRef<Path>,
        mut progress: impl FnMut(Slot, PatchResult),
    ) -> Result<EmbedReport> {
        let (key, source, output) = (key.as_ref(), source.as_ref(), output.as_ref());

        tracing::debug!(stage = %Stage::Validating);
        self.layout.validate()?;
        secrets.validate(&self.layout)?;

        let key_is_file = std::fs::metadata(key).map(|m| m.is_file()).unwrap_or(false);
        if !key_is_file || File::open(key).is_err() {
            return Err(Error::MissingKeyFile(key.to_path_buf()));
        }

        if same_file(source, output) {
            return Err(Error::Config(format!(
                "Output [{}] is the source image",
                output.display()
            )));
        }

        tracing::debug!(stage = %Stage::Copying);
        let mut core = File::open(source).map_err(|source_err| Error::CopyFailed {
            path: output.to_path_buf(),
            source: source_err,
        })?;

        let backup = self.prepare_output(output)?;

        if let Err(e) = copy_core(&mut core, output) {
            abandon(output, e.created, backup.as_deref());
            return Err(Error::CopyFailed {
                path: output.to_path_buf(),
                source: e.source,
            });
        }
        drop(core);
        tracing::info!(source = %source.display(), output = %output.display(), "core copied");

        match self.patch_and_sign(secrets, key, output, &mut progress) {
            Ok((outcomes, image_len)) => Ok(EmbedReport {
                output: output.to_path_buf(),
                backup,
                outcomes,
                image_len,
            }),
            Err(e) => {
                abandon(output, true, backup.as_deref());
                Err(e)
            }
        }
    }

    /// Apply the existing-output policy; returns the backup path if one was made.
    fn prepare_output(&self, output: &Path) -> Result<Option<PathBuf>> {
        if !output.exists() {
            return Ok(None);
        }

        match self.existing_output {
            ExistingOutput::Overwrite => Ok(None),
            ExistingOutput::Reject => Err(Error::OutputExists(output.to_path_buf())),
            ExistingOutput::Backup => {
                let backup = backup_path(output);

                std::fs::rename(output, &backup).map_err(|source| Error::CopyFailed {
                    path: output.to_path_buf(),
                    source,
                })?;
                tracing::info!(backup = %backup.display(), "existing output moved aside");
                Ok(Some(backup))
            }
        }
    }

    fn patch_and_sign(
        &self,
        secrets: &Secrets,
        key: &Path,
        output: &Path,
        progress: &mut impl FnMut(Slot, PatchResult),
    ) -> Result<(Vec<(Slot, PatchResult)>, usize)> {
        tracing::debug!(stage = %Stage::Loading);
        let mut image = Image::load(output)?;
        let image_len = image.len();

        let plan: Vec<(Slot, &[u8], Zeroizing<Vec<u8>>)> = self
            .layout
            .slots()
            .iter()
            .map(|spec| {
                (
                    spec.slot,
                    spec.marker.as_slice(),
                    secrets.replacement_for(spec, &self.layout.config_name),
                )
            })
            .collect();

        let mut outcomes = Vec::with_capacity(plan.len());
        for (slot, marker, replacement) in &plan {
            tracing::debug!(stage = %Stage::Patching(*slot));
            match image.locate_and_patch(marker, replacement)? {
                PatchResult::Applied { offset } => {
                    tracing::info!(slot = %slot, offset, "embedded");
                    progress(*slot, PatchResult::Applied { offset });
                    outcomes.push((*slot, PatchResult::Applied { offset }));
                }
                PatchResult::NotFound => {
                    progress(*slot, PatchResult::NotFound);
                    return Err(Error::MarkerNotFound { slot: *slot });
                }
            }
        }

        tracing::debug!(stage = %Stage::Persisting);
        image.persist(output)?;
        drop(image);

        tracing::debug!(stage = %Stage::Signing);
        self.signer.sign(output, key).map_err(|e| match e {
            Error::Signing(_) => e,
            other => Error::Signing(other.to_string()),
        })?;
        tracing::info!(key = %key.display(), "image signed");

        Ok((outcomes, image_len))
    }
}

/// Step at which `error` stops a run, when it can be attributed to one.
pub fn failed_stage(error: &Error) -> Option<Stage> {
    match error {
        Error::Validation { .. } | Error::MissingKeyFile(_) | Error::Config(_) => {
            Some(Stage::Validating)
        }
        Error::OutputExists(_) | Error::CopyFailed { .. } => Some(Stage::Copying),
        Error::LoadFailed { .. } => Some(Stage::Loading),
        Error::MarkerNotFound { slot } => Some(Stage::Patching(*slot)),
        Error::PersistFailed { .. } => Some(Stage::Persisting),
        Error::Signing(_) | Error::Key(_) => Some(Stage::Signing),
        Error::PatchBounds { .. } | Error::Io(_) => None,
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copy failure, noting whether the output was already created or truncated.
struct CopyError {
    created: bool,
    source: std::io::Error,
}

/// Stream the opened core into a fresh `output`, keeping its permissions.
fn copy_core(core: &mut File, output: &Path) -> std::result::Result<(), CopyError> {
    let mut writer = File::create(output).map_err(|source| CopyError {
        created: false,
        source,
    })?;

    let copied = std::io::copy(core, &mut writer)
        .and_then(|_| core.metadata())
        .and_then(|meta| writer.set_permissions(meta.permissions()))
        .and_then(|_| writer.sync_all());

    copied.map_err(|source| CopyError {
        created: true,
        source,
    })
}

fn backup_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Undo a failed run: drop what this run wrote, then put a backup back.
fn abandon(output: &Path, created: bool, backup: Option<&Path>) {
    if created {
        remove_artifact(output);
    }

    if let Some(backup) = backup {
        match std::fs::rename(backup, output) {
            Ok(()) => tracing::info!(output = %output.display(), "previous output restored"),
            Err(e) => tracing::warn!(
                backup = %backup.display(),
                error = %e,
                "could not restore previous output"
            ),
        }
    }
}

fn remove_artifact(output: &Path) {
    match std::fs::remove_file(output) {
        Ok(()) => tracing::warn!(output = %output.display(), "output removed after failure"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(output = %output.display(), error = %e, "could not remove output")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polymer_builder_default() {
        let polymer: Polymer = Polymer::default();
        assert_eq!(polymer.layout, MarkerLayout::default());
        assert_eq!(polymer.existing_output, ExistingOutput::Overwrite);
    }

    #[test]
    fn test_polymer_builder_chain() {
        let layout = MarkerLayout::default().with_config_name("x.dat");
        let polymer = Polymer::new()
            .layout(layout.clone())
            .existing_output(ExistingOutput::Backup);

        assert_eq!(polymer.layout, layout);
        assert_eq!(polymer.existing_output, ExistingOutput::Backup);
    }

    #[test]
    fn test_signer_swap_keeps_settings() {
        let polymer = Polymer::new()
            .existing_output(ExistingOutput::Reject)
            .signer(|_: &Path, _: &Path| -> Result<()> { Ok(()) });
        assert_eq!(polymer.existing_output, ExistingOutput::Reject);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Copying.to_string(), "copying");
        assert_eq!(
            Stage::Patching(Slot::Identifier).to_string(),
            "patching identifier"
        );
    }

    #[test]
    fn test_failed_stage() {
        assert_eq!(
            failed_stage(&Error::MarkerNotFound {
                slot: Slot::ConfigName
            }),
            Some(Stage::Patching(Slot::ConfigName))
        );
        assert_eq!(
            failed_stage(&Error::Signing("x".into())),
            Some(Stage::Signing)
        );
        assert_eq!(
            failed_stage(&Error::OutputExists(PathBuf::from("o"))),
            Some(Stage::Copying)
        );
    }
}
