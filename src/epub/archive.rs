use super::MetadataError;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

const MAX_SIZE_HINT: u64 = 1 << 20;

/// The fully-read contents of an EPUB zip container.
///
/// Entries are keyed by their exact, case-sensitive path inside the archive.
/// The map is ordered so scans over it visit paths in the same order every
/// time.
#[derive(Debug, Clone, Default)]
pub struct EpubArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl EpubArchive {
    /// Read every file entry of the zip archive in `bytes`.
    pub fn open(bytes: &[u8]) -> Result<Self, MetadataError> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = BTreeMap::new();

        for index in 0..zip.len() {
            let mut file = zip.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            // The declared size is untrusted; read_to_end grows past the hint.
            let hint = file.size().min(MAX_SIZE_HINT);
            let mut data = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
            file.read_to_end(&mut data)
                .map_err(|e| MetadataError::Archive(zip::result::ZipError::Io(e)))?;
            entries.insert(name, data);
        }

        Ok(Self { entries })
    }

    /// Build an archive from already-decoded entries.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Raw bytes of the entry at `name`.
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry paths in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The first entry path (in sorted order) ending with `suffix`.
    pub fn find_by_suffix(&self, suffix: &str) -> Option<&str> {
        self.names().find(|name| name.ends_with(suffix))
    }

    /// Decode the entry at `name` as UTF-8, dropping a leading byte-order mark.
    ///
    /// Returns `Ok(None)` when the entry does not exist.
    pub fn read_text(&self, name: &str) -> Result<Option<String>, MetadataError> {
        let Some(bytes) = self.entry(name) else {
            return Ok(None);
        };
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| MetadataError::Encoding {
                entry: name.to_string(),
                message: e.utf8_error().to_string(),
            })
    }
}
