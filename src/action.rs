//! The steps a [`Transaction`](crate::Transaction) can run on a book.
//!
//! Each action receives the current file and returns the path of its result.
//! Returning the input path unchanged means the action had nothing to do.

use crate::book::{BookFormat, BookMetadata};
use crate::config::Config;
use crate::drm::{self, DrmDetector, EpubDrmDetector};
use crate::naming::target_file_name;
use crate::pdf::PdfAnalyzer;
use crate::tools::{ExternalConverter, K2pdfopt};
use crate::{EbookError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Output name of the PDF once the marker has been embedded.
const REFORMATTED_NAME: &str = "post_reformat_pdf_metadata.pdf";

/// Something to do with a book.
///
/// Variants are declared in execution order: however the actions are
/// requested, DRM removal runs first and `none` last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Remove DRM (backs up the original).
    Drm,
    /// Rename to "<author> - <title>.<ext>".
    Rename,
    /// Reformat a PDF for e-readers with k2pdfopt (backs up the original).
    Pdf,
    /// Print metadata.
    Print,
    /// Print metadata as JSON.
    Json,
    /// Do nothing; useful to check that files can be processed at all.
    None,
}

impl ActionKind {
    /// Sort and deduplicate into execution order.
    pub fn canonical_order(actions: &[ActionKind]) -> Vec<ActionKind> {
        let mut ordered = actions.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drm => "drm",
            Self::Rename => "rename",
            Self::Pdf => "pdf",
            Self::Print => "print",
            Self::Json => "json",
            Self::None => "none",
        }
    }

    /// Run this action on `context.file`.
    pub fn perform(self, context: &mut ActionContext<'_>) -> Result<PathBuf> {
        match self {
            Self::Drm => remove_drm(context),
            Self::Rename => rename(context),
            Self::Pdf => reformat_pdf(context),
            Self::Print => {
                let original = context.original;
                let text = format!("Metadata for {}:\n{}", original.display(), context.metadata()?);
                print!("{text}");
                Ok(context.file.to_path_buf())
            }
            Self::Json => {
                let json = context.metadata()?.to_json_pretty()?;
                println!("{json}");
                Ok(context.file.to_path_buf())
            }
            Self::None => Ok(context.file.to_path_buf()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ActionContext ─────────────────────────────────────────────────────────────

/// What an action may look at and where it may write.
pub struct ActionContext<'a> {
    /// The file as found in the folder, for messages.
    pub original: &'a Path,
    /// The file to act on; the original or an intermediate result.
    pub file: &'a Path,
    /// Directory for intermediate results.
    pub scratch: &'a Path,
    pub config: &'a Config,
    pub dry_run: bool,
    /// Metadata shared between the actions of one transaction.
    pub metadata: &'a mut Option<BookMetadata>,
}

impl ActionContext<'_> {
    /// Cached metadata, loaded from `file` on first use.
    pub fn metadata(&mut self) -> Result<&BookMetadata> {
        let metadata = match self.metadata.take() {
            Some(metadata) => metadata,
            None => BookMetadata::load(self.file)?,
        };
        Ok(self.metadata.insert(metadata))
    }

    fn unchanged(&self) -> Result<PathBuf> {
        Ok(self.file.to_path_buf())
    }
}

// ── Actions ───────────────────────────────────────────────────────────────────

fn remove_drm(context: &mut ActionContext<'_>) -> Result<PathBuf> {
    if BookFormat::detect(context.file)? != BookFormat::Epub {
        return Err(EbookError::UnsupportedFormat {
            path: context.original.to_path_buf(),
            format: BookFormat::Pdf.extension().into(),
        });
    }

    let encryption = EpubDrmDetector.detect(context.file)?;
    log::debug!("Encryption of {}: {encryption}", context.original.display());

    if context.dry_run {
        if encryption.is_encrypted() {
            log::info!("Would remove {encryption} DRM from {}", context.original.display());
        }
        return context.unchanged();
    }

    match drm::remove_drm(context.file, &encryption, context.config, context.scratch)? {
        Some(decrypted) => Ok(decrypted),
        None => context.unchanged(),
    }
}

fn rename(context: &mut ActionContext<'_>) -> Result<PathBuf> {
    let extension = BookFormat::detect(context.file)?.extension();
    let metadata = context.metadata()?;
    let Some(title) = metadata.title() else {
        log::warn!("Not renaming {} because it has no title", context.original.display());
        return context.unchanged();
    };
    let new_name = target_file_name(metadata.first_creator(), title, extension);

    let current_name = context.file.file_name().and_then(|n| n.to_str());
    if current_name == Some(new_name.as_str()) {
        log::debug!("Skipping {} because it's already named correctly.", context.original.display());
        return context.unchanged();
    }

    if context.dry_run {
        log::info!("Would rename {} to {new_name}", context.original.display());
        return context.unchanged();
    }

    let renamed = context.scratch.join(&new_name);
    std::fs::copy(context.file, &renamed)?;
    log::info!("Renamed {} to {new_name}", context.original.display());
    Ok(renamed)
}

fn reformat_pdf(context: &mut ActionContext<'_>) -> Result<PathBuf> {
    if BookFormat::from_path(context.file) != Some(BookFormat::Pdf) {
        log::debug!("Skipping {} because it's not a PDF.", context.original.display());
        return context.unchanged();
    }
    let already_done = match context.metadata()? {
        BookMetadata::Pdf(metadata) => metadata.is_reformatted,
        BookMetadata::Epub(_) => false,
    };
    if already_done {
        log::debug!("Skipping {} because it's already reformatted.", context.original.display());
        return context.unchanged();
    }

    if context.dry_run {
        log::info!("Would reformat {} with k2pdfopt", context.original.display());
        return context.unchanged();
    }

    let k2pdfopt = context
        .config
        .k2pdfopt
        .as_deref()
        .map(K2pdfopt::new)
        .unwrap_or_default();
    k2pdfopt.ensure_available()?;
    let reflowed = k2pdfopt.run(context.file, context.scratch)?;

    let mut pdf = PdfAnalyzer::from_path(&reflowed)?;
    pdf.set_marker(&serde_json::json!({ "k2pdfopt_version": true }))?;
    let marked = context.scratch.join(REFORMATTED_NAME);
    pdf.save(&marked)?;
    log::debug!("Added marker to {} and saved to {}", reflowed.display(), marked.display());

    if let Some(BookMetadata::Pdf(metadata)) = context.metadata.as_mut() {
        metadata.is_reformatted = true;
    }
    log::info!("Reformatted {} with k2pdfopt", context.original.display());
    Ok(marked)
}
