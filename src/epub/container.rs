use super::{EpubArchive, MetadataError};
use crate::xml;

/// Fixed location of the container descriptor in every EPUB.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Read `META-INF/container.xml` and return the `full-path` of the first
/// `container/rootfiles/rootfile` element, i.e. the package document path.
pub fn resolve_rootfile_path(archive: &EpubArchive) -> Result<String, MetadataError> {
    let text = archive
        .read_text(CONTAINER_PATH)?
        .ok_or(MetadataError::MissingContainer)?;

    let document = xml::parse(&text).map_err(|e| MetadataError::MalformedXml {
        document: CONTAINER_PATH.to_string(),
        message: e.to_string(),
    })?;

    // The OCF namespace is occasionally bound to a prefix; accept any.
    let rootfile = xml::lookup_any_prefix(&document, "container", "")
        .and_then(<[_]>::first)
        .and_then(|container| xml::lookup_any_prefix(container, "rootfiles", ""))
        .and_then(<[_]>::first)
        .and_then(|rootfiles| xml::lookup_any_prefix(rootfiles, "rootfile", ""))
        .and_then(<[_]>::first)
        .ok_or(MetadataError::MissingRootfile)?;

    match rootfile.attr("full-path") {
        Some(path) if !path.trim().is_empty() => Ok(path.trim().to_string()),
        _ => Err(MetadataError::MissingRootfile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_with_container(xml: &str) -> EpubArchive {
        EpubArchive::from_entries([(CONTAINER_PATH, xml.as_bytes().to_vec())])
    }

    #[test]
    fn resolves_first_rootfile() {
        let archive = archive_with_container(
            r#"<?xml version="1.0"?>
            <container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
              <rootfiles>
                <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
                <rootfile full-path="other.opf" media-type="application/oebps-package+xml"/>
              </rootfiles>
            </container>"#,
        );
        assert_eq!(resolve_rootfile_path(&archive).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn missing_container_entry() {
        let archive = EpubArchive::from_entries([("mimetype", b"application/epub+zip".to_vec())]);
        assert!(matches!(
            resolve_rootfile_path(&archive),
            Err(MetadataError::MissingContainer)
        ));
    }

    #[test]
    fn missing_full_path_attribute() {
        let archive = archive_with_container(
            "<container><rootfiles><rootfile media-type=\"x\"/></rootfiles></container>",
        );
        assert!(matches!(
            resolve_rootfile_path(&archive),
            Err(MetadataError::MissingRootfile)
        ));

        let archive = archive_with_container("<container><rootfiles/></container>");
        assert!(matches!(
            resolve_rootfile_path(&archive),
            Err(MetadataError::MissingRootfile)
        ));
    }

    #[test]
    fn malformed_container_names_the_document() {
        let archive = archive_with_container("<container><rootfiles></container>");
        match resolve_rootfile_path(&archive) {
            Err(MetadataError::MalformedXml { document, .. }) => assert_eq!(document, CONTAINER_PATH),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
