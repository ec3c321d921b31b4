//! Format-independent view of a book file.

use crate::epub::EpubAnalyzer;
use crate::metadata::NormalizedMetadata;
use crate::pdf::{PdfAnalyzer, PdfMetadata};
use crate::{EbookError, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// File formats this tool handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFormat {
    Epub,
    Pdf,
}

impl BookFormat {
    /// Detect the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("epub") {
            Some(Self::Epub)
        } else if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    /// Like [`BookFormat::from_path`], but an unknown extension is an error.
    pub fn detect(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| EbookError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Epub => "EPUB",
            Self::Pdf => "PDF",
        })
    }
}

/// Metadata of either format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BookMetadata {
    Epub(NormalizedMetadata),
    Pdf(PdfMetadata),
}

impl BookMetadata {
    /// Read the metadata of the book at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        match BookFormat::detect(path)? {
            BookFormat::Epub => Ok(Self::Epub(EpubAnalyzer::from_path(path)?.metadata()?)),
            BookFormat::Pdf => Ok(Self::Pdf(PdfAnalyzer::from_path(path)?.metadata())),
        }
    }

    pub fn format(&self) -> BookFormat {
        match self {
            Self::Epub(_) => BookFormat::Epub,
            Self::Pdf(_) => BookFormat::Pdf,
        }
    }

    /// The title; PDFs without a `/Title` have none.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Epub(m) => Some(m.title()),
            Self::Pdf(m) => m.title.as_deref(),
        }
    }

    pub fn first_creator(&self) -> Option<&str> {
        match self {
            Self::Epub(m) => m.first_creator(),
            Self::Pdf(m) => m.author.as_deref(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for BookMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epub(m) => {
                writeln!(f, "Title:      {}", m.title())?;
                writeln!(f, "Creators:   {}", m.creators().join(", "))?;
                for identifier in m.identifiers() {
                    match &identifier.scheme {
                        Some(scheme) => writeln!(f, "Identifier: {} ({scheme})", identifier.id)?,
                        None => writeln!(f, "Identifier: {}", identifier.id)?,
                    }
                }
                writeln!(f, "Language:   {}", m.primary_language())?;
                if let Some(date) = m.date_of_publication() {
                    writeln!(f, "Published:  {date}")?;
                }
                if let Some(publisher) = m.publisher() {
                    writeln!(f, "Publisher:  {publisher}")?;
                }
            }
            Self::Pdf(m) => {
                let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
                writeln!(f, "Title:      {}", field(&m.title))?;
                writeln!(f, "Author:     {}", field(&m.author))?;
                writeln!(f, "Keywords:   {}", m.keywords.join(", "))?;
                writeln!(f, "Producer:   {}", field(&m.producer))?;
                writeln!(f, "Encrypted:  {}", m.encrypted)?;
                writeln!(f, "Reformatted: {}", m.is_reformatted)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Identifier;

    #[test]
    fn format_from_extension() {
        assert_eq!(BookFormat::from_path(Path::new("a/b.EPUB")), Some(BookFormat::Epub));
        assert_eq!(BookFormat::from_path(Path::new("b.pdf")), Some(BookFormat::Pdf));
        assert_eq!(BookFormat::from_path(Path::new("b.mobi")), None);
        assert_eq!(BookFormat::from_path(Path::new("README")), None);
        assert!(matches!(
            BookFormat::detect(Path::new("b.mobi")),
            Err(EbookError::UnsupportedFormat { format, .. }) if format == "mobi"
        ));
    }

    #[test]
    fn accessors_cover_both_formats() {
        let epub = BookMetadata::Epub(
            NormalizedMetadata::new(
                "1Q84",
                vec!["Haruki Murakami".into()],
                vec![Identifier::new("9780307593313", Some("ISBN".into()))],
                "en",
                None,
                None,
            )
            .unwrap(),
        );
        assert_eq!(epub.title(), Some("1Q84"));
        assert_eq!(epub.first_creator(), Some("Haruki Murakami"));
        assert!(epub.to_string().contains("Identifier: 9780307593313 (ISBN)"));

        let pdf = BookMetadata::Pdf(PdfMetadata {
            author: Some("A".into()),
            ..Default::default()
        });
        assert_eq!(pdf.format(), BookFormat::Pdf);
        assert_eq!(pdf.title(), None);
        assert_eq!(pdf.first_creator(), Some("A"));
        assert!(pdf.to_string().contains("Title:      -"));
    }
}
