use super::{decode_text_string, text_string};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Name trees deeper than this are treated as corrupt (or cyclic).
const MAX_NAME_TREE_DEPTH: usize = 32;

/// Where an embedded file specification was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSource {
    NameTree,
    Annotation,
}

/// An embedded file specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Raw key bytes: the name tree key, or the annotation's `/Contents`.
    pub key: Vec<u8>,
    /// `/UF` or `/F` of the specification, falling back to the decoded key.
    pub file_name: String,
    pub spec_id: ObjectId,
    pub source: AttachmentSource,
}

/// Finds embedded file specifications in two places:
///
/// 1. the `/Names/EmbeddedFiles` name tree in the catalog, and
/// 2. `/FileAttachment` annotations on every page.
pub struct Attachments<'a> {
    document: &'a Document,
}

impl<'a> Attachments<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn collect(&self) -> Vec<Attachment> {
        let mut found = self.from_name_tree();
        found.extend(self.from_annotations());
        found
    }

    /// The first attachment whose file name is `file_name`.
    pub fn find(&self, file_name: &str) -> Option<Attachment> {
        self.collect().into_iter().find(|a| a.file_name == file_name)
    }

    /// Only the name tree entries, which is what gets rewritten when a file
    /// is embedded.
    pub fn from_name_tree(&self) -> Vec<Attachment> {
        let mut found = Vec::new();
        let Some(root) = self.embedded_files_root() else {
            return found;
        };
        self.walk_name_tree(root, 0, &mut found);
        found
    }

    fn embedded_files_root(&self) -> Option<&'a Dictionary> {
        let catalog = self.document.catalog().ok()?;
        let names = self.resolve(catalog.get(b"Names").ok()?).as_dict().ok()?;
        self.resolve(names.get(b"EmbeddedFiles").ok()?).as_dict().ok()
    }

    fn walk_name_tree(&self, node: &'a Dictionary, depth: usize, out: &mut Vec<Attachment>) {
        if depth > MAX_NAME_TREE_DEPTH {
            log::warn!("Ignoring embedded files name tree nested deeper than {MAX_NAME_TREE_DEPTH}");
            return;
        }

        // leaf: [key value key value ...]
        if let Ok(names) = self.resolve_array(node, b"Names") {
            for pair in names.chunks_exact(2) {
                let (Ok(key), Ok(spec_id)) = (pair[0].as_str(), pair[1].as_reference()) else {
                    continue;
                };
                out.push(self.attachment(key.to_vec(), spec_id, AttachmentSource::NameTree));
            }
        }

        if let Ok(kids) = self.resolve_array(node, b"Kids") {
            for kid in kids {
                if let Ok(kid) = self.resolve(kid).as_dict() {
                    self.walk_name_tree(kid, depth + 1, out);
                }
            }
        }
    }

    fn from_annotations(&self) -> Vec<Attachment> {
        let mut found = Vec::new();
        for page_id in self.document.get_pages().values() {
            let Ok(page) = self.document.get_object(*page_id).and_then(Object::as_dict) else {
                continue;
            };
            let Ok(annotations) = self.resolve_array(page, b"Annots") else {
                continue;
            };
            for annotation in annotations {
                let Ok(dict) = self.resolve(annotation).as_dict() else {
                    continue;
                };
                if !matches!(dict.get(b"Subtype").and_then(Object::as_name), Ok(b"FileAttachment")) {
                    continue;
                }
                let Ok(spec_id) = dict.get(b"FS").and_then(Object::as_reference) else {
                    continue;
                };
                let key = [b"Contents" as &[u8], b"T"]
                    .iter()
                    .find_map(|k| dict.get(k).and_then(Object::as_str).ok())
                    .map_or_else(|| b"attachment".to_vec(), <[u8]>::to_vec);
                found.push(self.attachment(key, spec_id, AttachmentSource::Annotation));
            }
        }
        found
    }

    fn attachment(&self, key: Vec<u8>, spec_id: ObjectId, source: AttachmentSource) -> Attachment {
        let spec_name = self
            .document
            .get_object(spec_id)
            .and_then(Object::as_dict)
            .ok()
            .and_then(|spec| text_string(spec, b"UF").or_else(|| text_string(spec, b"F")));
        Attachment {
            file_name: spec_name.unwrap_or_else(|| decode_text_string(&key)),
            key,
            spec_id,
            source,
        }
    }

    /// Follow `value` when it is an indirect reference.
    fn resolve(&self, value: &'a Object) -> &'a Object {
        match value.as_reference() {
            Ok(id) => self.document.get_object(id).unwrap_or(value),
            Err(_) => value,
        }
    }

    fn resolve_array(&self, dict: &'a Dictionary, key: &[u8]) -> lopdf::Result<&'a Vec<Object>> {
        self.resolve(dict.get(key)?).as_array()
    }
}
