use super::MetadataError;
use crate::metadata::{Identifier, NormalizedMetadata, PublicationDate};
use crate::xml::{self, XmlNode};

/// Dublin Core elements are looked up with this prefix first.
const DC: &str = "dc";
/// Attributes qualifying Dublin Core elements (`opf:scheme`, `opf:event`, ...).
const OPF: &str = "opf";

// ── ExtractorProfile ──────────────────────────────────────────────────────────

/// Per-schema-version knobs for the metadata [`Extractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorProfile {
    /// Major schema version this profile handles.
    pub version: u32,
    /// Also accept Dublin Core elements under an unexpected prefix
    /// (e.g. `opf:title`).
    pub any_prefix: bool,
    /// Read `dc:publisher`.
    pub publisher: bool,
    /// When the declared rootfile is missing, accept any `content.opf` entry.
    pub content_opf_fallback: bool,
}

impl ExtractorProfile {
    pub const V2: Self = Self {
        version: 2,
        any_prefix: false,
        publisher: false,
        content_opf_fallback: false,
    };

    pub const V3: Self = Self {
        version: 3,
        any_prefix: true,
        publisher: true,
        content_opf_fallback: true,
    };

    /// The profile for a major schema version, if supported.
    pub fn for_version(version: u32) -> Option<Self> {
        match version {
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Walks a package `metadata` element and builds a [`NormalizedMetadata`].
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    profile: ExtractorProfile,
}

impl Extractor {
    pub fn new(profile: ExtractorProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> ExtractorProfile {
        self.profile
    }

    pub fn extract(&self, metadata: &XmlNode) -> Result<NormalizedMetadata, MetadataError> {
        let title = self.title(metadata)?;
        let creators = self.creators(metadata);
        let identifiers = self.identifiers(metadata);
        let language = self.language(metadata)?;
        let date = self.date(metadata);
        let publisher = if self.profile.publisher {
            self.publisher(metadata)
        } else {
            None
        };

        NormalizedMetadata::new(title, creators, identifiers, language, date, publisher)
    }

    fn lookup<'a>(&self, metadata: &'a XmlNode, bare: &str) -> Option<&'a [XmlNode]> {
        if self.profile.any_prefix {
            xml::lookup_any_prefix(metadata, bare, DC)
        } else {
            xml::lookup(metadata, bare, DC)
        }
    }

    /// First title; picking a title by language is not attempted.
    fn title(&self, metadata: &XmlNode) -> Result<String, MetadataError> {
        self.lookup(metadata, "title")
            .and_then(<[_]>::first)
            .map(|node| node.text.clone())
            .filter(|text| !text.is_empty())
            .ok_or(MetadataError::MissingTitle)
    }

    fn creators(&self, metadata: &XmlNode) -> Vec<String> {
        self.lookup(metadata, "creator")
            .unwrap_or_default()
            .iter()
            .filter(|node| !node.text.is_empty())
            .map(|node| node.text.clone())
            .collect()
    }

    fn identifiers(&self, metadata: &XmlNode) -> Vec<Identifier> {
        self.lookup(metadata, "identifier")
            .unwrap_or_default()
            .iter()
            .map(|node| {
                let scheme = node
                    .attr_prefixed("scheme", OPF)
                    .filter(|scheme| !scheme.is_empty())
                    .map(str::to_string);
                Identifier::new(node.text.clone(), scheme)
            })
            .collect()
    }

    /// The language flagged `opf:primary="true"`, else the first declared.
    fn language(&self, metadata: &XmlNode) -> Result<String, MetadataError> {
        let nodes = self.lookup(metadata, "language").unwrap_or_default();
        select(nodes, "primary", "true")
            .map(|node| node.text.clone())
            .filter(|text| !text.is_empty())
            .ok_or(MetadataError::MissingLanguage)
    }

    /// The date with `opf:event="publication"`, else the first declared.
    fn date(&self, metadata: &XmlNode) -> Option<PublicationDate> {
        let nodes = self.lookup(metadata, "date")?;
        select(nodes, "event", "publication").map(|node| PublicationDate::parse(&node.text))
    }

    fn publisher(&self, metadata: &XmlNode) -> Option<String> {
        self.lookup(metadata, "publisher")
            .and_then(<[_]>::first)
            .map(|node| node.text.clone())
            .filter(|text| !text.is_empty())
    }
}

/// The node whose `opf:<attr>` equals `value`, falling back to the first node.
fn select<'a>(nodes: &'a [XmlNode], attr: &str, value: &str) -> Option<&'a XmlNode> {
    nodes
        .iter()
        .find(|node| node.attr_prefixed(attr, OPF) == Some(value))
        .or_else(|| nodes.first())
}
