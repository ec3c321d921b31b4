//! # ebookfoldermanager
//!
//! A Rust library (and the `efm` command-line tool) for keeping a folder of
//! e-books tidy.
//!
//! ## What this crate does
//!
//! 1. **Read EPUB metadata.** Opens the zip container, follows
//!    `META-INF/container.xml` to the package document, detects the schema
//!    version (EPUB 2 or 3) and extracts title, creators, identifiers,
//!    language, publication date and publisher into a [`NormalizedMetadata`].
//! 2. **Read PDF metadata** from the `/Info` dictionary, plus the reformat
//!    marker embedded by this tool.
//! 3. **Detect and remove DRM.** The DRM scheme of an EPUB is classified
//!    here; decryption is handed to an external tool.
//! 4. **Rename** files to `"<first creator> - <title>.<ext>"`.
//! 5. **Reformat PDFs** for small e-reader screens with `k2pdfopt`.
//!
//! ## Quick example
//!
//! ```no_run
//! use ebookfoldermanager::EpubAnalyzer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let book = EpubAnalyzer::from_path("WorldUnbound.epub")?;
//! let metadata = book.metadata()?;
//!
//! println!("Title    : {}", metadata.title());
//! println!("Language : {}", metadata.primary_language());
//! println!("{}", metadata.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod action;
pub mod book;
pub mod config;
pub mod drm;
pub mod epub;
pub mod folder;
pub mod metadata;
pub mod naming;
pub mod pdf;
pub mod tools;
pub mod transaction;
pub mod xml;

pub use action::ActionKind;
pub use book::{BookFormat, BookMetadata};
pub use config::Config;
pub use drm::{DrmDetector, Encryption, EpubDrmDetector};
pub use epub::{get_metadata, EpubAnalyzer, MetadataError};
pub use folder::{find_books, process_folder, Report};
pub use metadata::{Identifier, NormalizedMetadata, PublicationDate};
pub use pdf::{PdfAnalyzer, PdfMetadata};
pub use tools::{CommandConverter, ExternalConverter, K2pdfopt};
pub use transaction::{Outcome, Transaction};

// ── Run options ──────────────────────────────────────────────────────────────

/// Options for one run over a set of books.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Log what each action would do without touching any file.
    pub dry_run: bool,

    /// Actions requested on the command line. When `None`, the `actions` of
    /// the closest config file apply, and failing that just
    /// [`ActionKind::Print`].
    pub actions: Option<Vec<ActionKind>>,

    /// Adobe key file tried before the ones listed in the config file.
    pub adobe_key_file: Option<PathBuf>,
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum EbookError {
    /// EPUB metadata extraction failed; the message ends with the file path.
    #[error("{source} ({})", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    /// A filesystem I/O error occurred (e.g. when loading or saving a file).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    PdfParse(#[from] lopdf::Error),

    /// The PDF parsed but lacks a structure this crate relies on.
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("Unsupported format '{format}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Couldn't detect DRM type of {}: {message}", path.display())]
    DetectEncryption { path: PathBuf, message: String },

    /// DRM removal needs a key file that is not configured or does not exist.
    #[error("Missing required key for {scheme} to remove DRM from {}: {message}", path.display())]
    MissingDrmKeyFile {
        path: PathBuf,
        scheme: String,
        message: String,
    },

    #[error("{encryption} encryption is not supported ({})", path.display())]
    UnsupportedEncryption { path: PathBuf, encryption: String },

    #[error("Couldn't remove DRM from {}: {message}", path.display())]
    RemoveDrm { path: PathBuf, message: String },

    /// A required external program could not be started.
    #[error("{tool} not found. {instructions}")]
    ToolNotFound { tool: String, instructions: String },

    /// An external program ran but reported failure.
    #[error("{tool} failed: {status}")]
    ToolFailed { tool: String, status: String },

    #[error("Invalid config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EbookError {
    /// The EPUB metadata failure behind this error, if that is what it is.
    pub fn metadata_error(&self) -> Option<&MetadataError> {
        match self {
            Self::Metadata { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, EbookError>;
