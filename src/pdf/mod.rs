//! PDF metadata and the reformat marker, on top of `lopdf`.

pub mod discovery;
pub mod marker;

use crate::Result;
use discovery::Attachments;
use lopdf::{Dictionary, Document};
use serde::Serialize;
use std::path::Path;

// ── PdfMetadata ───────────────────────────────────────────────────────────────

/// The document information dictionary of a PDF, plus what this tool knows
/// about the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// Raw PDF date string, e.g. `D:20230101120000+01'00'`.
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    pub encrypted: bool,
    /// The file already went through the `pdf` action.
    pub is_reformatted: bool,
}

// ── PdfAnalyzer ───────────────────────────────────────────────────────────────

/// A loaded PDF document.
///
/// ```no_run
/// use ebookfoldermanager::PdfAnalyzer;
///
/// let pdf = PdfAnalyzer::from_path("paper.pdf").unwrap();
/// if !pdf.is_reformatted() {
///     println!("{:?}", pdf.metadata().title);
/// }
/// ```
pub struct PdfAnalyzer {
    document: Document,
}

impl PdfAnalyzer {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            document: Document::load(path)?,
        })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            document: Document::load_mem(data)?,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Read the trailer's `/Info` dictionary. A document without one yields
    /// empty metadata.
    pub fn metadata(&self) -> PdfMetadata {
        let info = self.info_dictionary();
        let text = |key: &[u8]| info.and_then(|dict| text_string(dict, key));

        PdfMetadata {
            title: text(b"Title"),
            author: text(b"Author"),
            subject: text(b"Subject"),
            keywords: text(b"Keywords")
                .map(|k| split_keywords(&k))
                .unwrap_or_default(),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
            creation_date: text(b"CreationDate"),
            mod_date: text(b"ModDate"),
            encrypted: self.document.trailer.get(b"Encrypt").is_ok(),
            is_reformatted: self.is_reformatted(),
        }
    }

    /// Whether the document carries the marker file embedded by the `pdf`
    /// action.
    pub fn is_reformatted(&self) -> bool {
        Attachments::new(&self.document)
            .find(marker::MARKER_NAME)
            .is_some()
    }

    /// The decoded content of the marker file, if there is one.
    pub fn marker(&self) -> Result<Option<serde_json::Value>> {
        marker::read(&self.document)
    }

    /// Embed `value` as the marker file, replacing an existing marker.
    pub fn set_marker(&mut self, value: &serde_json::Value) -> Result<()> {
        marker::embed(&mut self.document, value)
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.document.save(path)?;
        Ok(())
    }

    /// Serialize the document into memory.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.document.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        match info.as_reference() {
            Ok(id) => self.document.get_object(id).ok()?.as_dict().ok(),
            Err(_) => info.as_dict().ok(),
        }
    }
}

// ── Text strings ──────────────────────────────────────────────────────────────

/// Decode a PDF text string: UTF-16BE or UTF-8 when it starts with a byte
/// order mark, otherwise PDFDocEncoding read as Latin-1.
pub fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// A non-empty, trimmed text string stored under `key`.
pub(crate) fn text_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|v| v.as_str().ok())
        .map(|s| decode_text_string(s).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn split_keywords(keywords: &str) -> Vec<String> {
    keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}
