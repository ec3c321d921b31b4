//! The JSON file this tool embeds into PDFs it has reformatted.

use super::discovery::Attachments;
use crate::{EbookError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde_json::Value;

/// Name of the embedded marker file.
pub const MARKER_NAME: &str = "__ebooks-folder-manager.json";

/// Decode the marker file of `document`.
pub fn read(document: &Document) -> Result<Option<Value>> {
    let Some(attachment) = Attachments::new(document).find(MARKER_NAME) else {
        return Ok(None);
    };
    let data = embedded_data(document, attachment.spec_id)?;
    Ok(Some(serde_json::from_slice(&data)?))
}

/// Content of the embedded file stream behind a file specification.
///
/// ```text
/// << /Type /Filespec /F (name) /UF (name)
///    /EF << /F 12 0 R /UF 12 0 R >> >>
/// ```
pub fn embedded_data(document: &Document, spec_id: ObjectId) -> Result<Vec<u8>> {
    let invalid = |message: &str| EbookError::InvalidPdf(format!("embedded file {spec_id:?}: {message}"));

    let spec = document
        .get_object(spec_id)?
        .as_dict()
        .map_err(|_| invalid("file specification is not a dictionary"))?;

    // /EF is normally inline, but some producers store a reference.
    let ef = spec.get(b"EF").map_err(|_| invalid("missing /EF entry"))?;
    let ef = match ef.as_reference() {
        Ok(id) => document.get_object(id)?,
        Err(_) => ef,
    };
    let ef = ef.as_dict().map_err(|_| invalid("/EF is not a dictionary"))?;

    let stream_id = ef
        .get(b"UF")
        .or_else(|_| ef.get(b"F"))
        .and_then(Object::as_reference)
        .map_err(|_| invalid("/EF has no stream reference"))?;
    let stream = document
        .get_object(stream_id)?
        .as_stream()
        .map_err(|_| invalid("embedded file is not a stream"))?;

    Ok(stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone()))
}

/// Embed `value` as the marker, replacing any marker already in the
/// `/EmbeddedFiles` name tree. Other embedded files are kept.
pub fn embed(document: &mut Document, value: &Value) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    let size = content.len() as i64;

    let stream_id = document.add_object(Stream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Params" => dictionary! { "Size" => size },
        },
        content,
    ));
    let spec_id = document.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(MARKER_NAME),
        "UF" => Object::string_literal(MARKER_NAME),
        "EF" => dictionary! { "F" => stream_id, "UF" => stream_id },
    });

    let mut entries: Vec<(Vec<u8>, ObjectId)> = Attachments::new(document)
        .from_name_tree()
        .into_iter()
        .filter(|a| a.file_name != MARKER_NAME)
        .map(|a| (a.key, a.spec_id))
        .collect();
    entries.push((MARKER_NAME.as_bytes().to_vec(), spec_id));
    // name tree keys must be sorted
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let names: Vec<Object> = entries
        .into_iter()
        .flat_map(|(key, id)| [Object::String(key, StringFormat::Literal), Object::Reference(id)])
        .collect();
    write_embedded_files(document, dictionary! { "Names" => names })?;

    log::debug!("Embedded {MARKER_NAME} as object {spec_id:?}");
    Ok(())
}

/// Replace `/Names/EmbeddedFiles` in the catalog with a single leaf node.
fn write_embedded_files(document: &mut Document, embedded: Dictionary) -> Result<()> {
    let root_id = document.trailer.get(b"Root")?.as_reference()?;
    let names_ref = document
        .get_object(root_id)?
        .as_dict()?
        .get(b"Names")
        .and_then(Object::as_reference)
        .ok();

    match names_ref {
        Some(names_id) => {
            document
                .get_object_mut(names_id)?
                .as_dict_mut()?
                .set("EmbeddedFiles", embedded);
        }
        None => {
            let catalog = document.get_object_mut(root_id)?.as_dict_mut()?;
            let mut names = catalog
                .get(b"Names")
                .and_then(Object::as_dict)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new());
            names.set("EmbeddedFiles", embedded);
            catalog.set("Names", names);
        }
    }
    Ok(())
}
