//! EPUB metadata extraction.
//!
//! ```text
//! bytes ─► EpubArchive ─► META-INF/container.xml ─► rootfile path
//!        ─► package document ─► schema version ─► Extractor(V2 | V3)
//!        ─► NormalizedMetadata
//! ```
//!
//! Everything here works on an in-memory byte buffer and performs no I/O
//! other than [`EpubAnalyzer::from_path`] reading the file once.

use crate::drm::{Encryption, EpubDrmDetector};
use crate::metadata::NormalizedMetadata;
use crate::{xml, EbookError, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod archive;
mod container;
mod extractor;
mod package;

pub use archive::EpubArchive;
pub use container::{resolve_rootfile_path, CONTAINER_PATH};
pub use extractor::{Extractor, ExtractorProfile};
pub use package::{detect_version, package_element, PackageDescriptor};

/// Suffix of the conventional package document name, used to locate the
/// package when the declared rootfile is missing.
pub const CONTENT_OPF_SUFFIX: &str = "content.opf";

// ── MetadataError ─────────────────────────────────────────────────────────────

/// Why metadata could not be extracted from an EPUB.
///
/// None of these are transient: they all describe malformed or unsupported
/// input. [`get_metadata`] wraps them in [`EbookError::Metadata`] together
/// with the file path.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The bytes are not a readable zip archive.
    #[error("invalid zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An archive entry is not valid UTF-8.
    #[error("entry '{entry}' is not valid UTF-8: {message}")]
    Encoding { entry: String, message: String },

    #[error("missing {}", CONTAINER_PATH)]
    MissingContainer,

    #[error("container.xml declares no rootfile full-path")]
    MissingRootfile,

    /// The rootfile named in container.xml is not in the archive.
    #[error("package document '{0}' not found in archive")]
    MissingPackageDocument(String),

    #[error("malformed XML in '{document}': {message}")]
    MalformedXml { document: String, message: String },

    #[error("package document declares no version")]
    MissingVersion,

    #[error("invalid package version '{0}'")]
    InvalidVersion(String),

    #[error("unsupported EPUB version '{0}'")]
    UnsupportedVersion(String),

    #[error("no title in package metadata")]
    MissingTitle,

    #[error("no language in package metadata")]
    MissingLanguage,
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Extract normalized metadata from the EPUB in `bytes`.
///
/// `path` is only used for diagnostics: every error is returned as
/// [`EbookError::Metadata`] whose message ends with the path.
///
/// ```
/// let err = ebookfoldermanager::epub::get_metadata(b"not a zip", "broken.epub").unwrap_err();
/// assert!(err.to_string().ends_with("(broken.epub)"));
/// ```
pub fn get_metadata<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<NormalizedMetadata> {
    let path = path.as_ref();
    extract(bytes).map_err(|source| EbookError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

fn extract(bytes: &[u8]) -> std::result::Result<NormalizedMetadata, MetadataError> {
    let archive = EpubArchive::open(bytes)?;
    let rootfile = resolve_rootfile_path(&archive)?;

    let (document_path, document) = match parse_entry(&archive, &rootfile)? {
        Some(document) => (rootfile, document),
        None => locate_fallback_package(&archive, &rootfile)?,
    };

    let version = detect_version(&document)?;
    let profile = ExtractorProfile::for_version(version).ok_or_else(|| {
        MetadataError::UnsupportedVersion(version.to_string())
    })?;
    log::debug!("{document_path}: package version {version}");

    let descriptor = PackageDescriptor::from_document(&document)?;
    let empty = xml::XmlNode::default();
    let metadata = descriptor.metadata.unwrap_or(&empty);

    Extractor::new(profile).extract(metadata)
}

/// Parse the archive entry at `name`, or `Ok(None)` when it does not exist.
fn parse_entry(
    archive: &EpubArchive,
    name: &str,
) -> std::result::Result<Option<xml::XmlNode>, MetadataError> {
    let Some(text) = archive.read_text(name)? else {
        return Ok(None);
    };
    xml::parse(&text)
        .map(Some)
        .map_err(|e| MetadataError::MalformedXml {
            document: name.to_string(),
            message: e.to_string(),
        })
}

/// Some producers declare a rootfile path that does not exist while shipping
/// the package as `.../content.opf`. That layout is only accepted for
/// version 3 packages.
fn locate_fallback_package(
    archive: &EpubArchive,
    declared: &str,
) -> std::result::Result<(String, xml::XmlNode), MetadataError> {
    let missing = || MetadataError::MissingPackageDocument(declared.to_string());

    let candidate = archive.find_by_suffix(CONTENT_OPF_SUFFIX).ok_or_else(missing)?;
    let document = parse_entry(archive, candidate)?.ok_or_else(missing)?;

    let accepts_fallback = detect_version(&document)
        .ok()
        .and_then(ExtractorProfile::for_version)
        .is_some_and(|profile| profile.content_opf_fallback);
    if !accepts_fallback {
        return Err(missing());
    }

    log::warn!("rootfile '{declared}' not found, using '{candidate}'");
    Ok((candidate.to_string(), document))
}

// ── EpubAnalyzer ──────────────────────────────────────────────────────────────

/// Entry point for working with one EPUB file.
///
/// ```no_run
/// use ebookfoldermanager::EpubAnalyzer;
///
/// let book = EpubAnalyzer::from_path("1Q84.epub").unwrap();
/// let metadata = book.metadata().unwrap();
/// println!("{} by {:?}", metadata.title(), metadata.creators());
/// ```
#[derive(Debug, Clone)]
pub struct EpubAnalyzer {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl EpubAnalyzer {
    /// Load an EPUB from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            path: path.to_path_buf(),
            bytes: std::fs::read(path)?,
        })
    }

    /// Wrap an in-memory EPUB; `path` is used for error messages.
    pub fn from_bytes<P: AsRef<Path>>(bytes: Vec<u8>, path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn metadata(&self) -> Result<NormalizedMetadata> {
        get_metadata(&self.bytes, &self.path)
    }

    /// Which DRM scheme, if any, protects this book.
    pub fn encryption(&self) -> Result<Encryption> {
        EpubDrmDetector.detect_bytes(&self.bytes, &self.path)
    }
}
