use super::MetadataError;
use crate::xml::{self, XmlNode};

/// Schema major versions this crate can extract metadata from.
pub const SUPPORTED_MAJOR_VERSIONS: [u32; 2] = [2, 3];

/// A view over a parsed package (`.opf`) document.
#[derive(Debug, Clone, Copy)]
pub struct PackageDescriptor<'a> {
    /// Dotted version string as declared, e.g. `"2.0"`.
    pub version: &'a str,
    /// Value of the `unique-identifier` attribute, when declared.
    pub unique_identifier: Option<&'a str>,
    /// The `metadata` element, or `None` when the package has none.
    pub metadata: Option<&'a XmlNode>,
}

impl<'a> PackageDescriptor<'a> {
    /// Build the descriptor from the document node returned by [`xml::parse`].
    pub fn from_document(document: &'a XmlNode) -> Result<Self, MetadataError> {
        let package = package_element(document).ok_or(MetadataError::MissingVersion)?;
        let version = package.attr("version").ok_or(MetadataError::MissingVersion)?;
        let metadata = xml::lookup(package, "metadata", "opf").and_then(<[_]>::first);

        Ok(Self {
            version,
            unique_identifier: package.attr("unique-identifier"),
            metadata,
        })
    }
}

/// The `package` root element, written with or without the `opf:` prefix.
pub fn package_element(document: &XmlNode) -> Option<&XmlNode> {
    xml::lookup(document, "package", "opf").and_then(<[_]>::first)
}

/// Major schema version of the package document.
///
/// Only versions 2 and 3 are accepted; the error for any other value carries
/// the version string exactly as declared.
pub fn detect_version(document: &XmlNode) -> Result<u32, MetadataError> {
    let raw = package_element(document)
        .and_then(|package| package.attr("version"))
        .ok_or(MetadataError::MissingVersion)?;

    let major = parse_major(raw)?;
    if SUPPORTED_MAJOR_VERSIONS.contains(&major) {
        Ok(major)
    } else {
        Err(MetadataError::UnsupportedVersion(raw.to_string()))
    }
}

fn parse_major(raw: &str) -> Result<u32, MetadataError> {
    raw.trim()
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok())
        .ok_or_else(|| MetadataError::InvalidVersion(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(package: &str) -> XmlNode {
        xml::parse(package).unwrap()
    }

    #[test]
    fn detects_supported_versions() {
        assert_eq!(detect_version(&doc(r#"<package version="2.0"/>"#)).unwrap(), 2);
        assert_eq!(detect_version(&doc(r#"<package version="3.0"/>"#)).unwrap(), 3);
        assert_eq!(detect_version(&doc(r#"<opf:package version="3.1"/>"#)).unwrap(), 3);
        assert_eq!(detect_version(&doc(r#"<package version="2"/>"#)).unwrap(), 2);
    }

    #[test]
    fn rejects_unsupported_version_with_literal() {
        match detect_version(&doc(r#"<package version="4.0"/>"#)) {
            Err(MetadataError::UnsupportedVersion(v)) => assert_eq!(v, "4.0"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_and_invalid_versions() {
        assert!(matches!(
            detect_version(&doc("<package/>")),
            Err(MetadataError::MissingVersion)
        ));
        assert!(matches!(
            detect_version(&doc(r#"<notapackage version="3.0"/>"#)),
            Err(MetadataError::MissingVersion)
        ));
        assert!(matches!(
            detect_version(&doc(r#"<package version="three"/>"#)),
            Err(MetadataError::InvalidVersion(_))
        ));
        assert!(matches!(
            detect_version(&doc(r#"<package version=""/>"#)),
            Err(MetadataError::InvalidVersion(_))
        ));
    }

    #[test]
    fn descriptor_exposes_metadata_and_identifier_ref() {
        let document = doc(
            r#"<package version="2.0" unique-identifier="BookId"><opf:metadata><dc:title>T</dc:title></opf:metadata></package>"#,
        );
        let descriptor = PackageDescriptor::from_document(&document).unwrap();
        assert_eq!(descriptor.version, "2.0");
        assert_eq!(descriptor.unique_identifier, Some("BookId"));
        assert!(descriptor.metadata.unwrap().first("dc:title").is_some());
    }
}
