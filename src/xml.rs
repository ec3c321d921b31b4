//! A small element tree built on top of `quick-xml`.
//!
//! EPUB producers disagree on namespace prefixes (`dc:title`, `opf:metadata`,
//! or no prefix at all) and on which elements repeat. The tree therefore keeps
//! every name exactly as written and stores each child slot as a sequence in
//! document order; callers pick "the first" or "all" explicitly.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use thiserror::Error;

// ── XmlError ──────────────────────────────────────────────────────────────────

/// The input could not be parsed as a well-formed XML document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at byte {position})")]
pub struct XmlError {
    pub message: String,
    pub position: usize,
}

impl XmlError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

// ── XmlNode ───────────────────────────────────────────────────────────────────

/// One XML element.
///
/// `text` is always present: an element without character data has an empty
/// string, which keeps "element present but empty" apart from "element
/// absent" (the latter simply has no slot in the parent's `children`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Qualified name as written in the source, e.g. `"dc:title"`.
    /// Empty for the synthetic document node returned by [`parse`].
    pub name: String,

    /// Attributes keyed by their qualified name, values unescaped verbatim.
    pub attributes: BTreeMap<String, String>,

    /// Direct character data (text and CDATA) with surrounding whitespace
    /// trimmed.
    pub text: String,

    /// Child elements grouped by qualified name, each group in document order.
    pub children: BTreeMap<String, Vec<XmlNode>>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attribute value by exact qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value trying `prefix:bare` first, then `bare`.
    pub fn attr_prefixed(&self, bare: &str, prefix: &str) -> Option<&str> {
        self.attr(&qualify(prefix, bare)).or_else(|| self.attr(bare))
    }

    /// All children with exactly this qualified name.
    pub fn get(&self, name: &str) -> Option<&[XmlNode]> {
        self.children
            .get(name)
            .map(Vec::as_slice)
            .filter(|nodes| !nodes.is_empty())
    }

    /// The first child with exactly this qualified name.
    pub fn first(&self, name: &str) -> Option<&XmlNode> {
        self.get(name).and_then(<[XmlNode]>::first)
    }

    /// The name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Depth-first search for the first descendant whose local name is
    /// `local`, visiting child slots in name order.
    pub fn find_descendant(&self, local: &str) -> Option<&XmlNode> {
        self.children.values().flatten().find_map(|child| {
            if child.local_name() == local {
                Some(child)
            } else {
                child.find_descendant(local)
            }
        })
    }

    /// Append a child, merging it into an existing same-named slot.
    pub fn push_child(&mut self, child: XmlNode) {
        self.children
            .entry(child.name.clone())
            .or_default()
            .push(child);
    }

    /// Builder-style helper used when assembling trees by hand.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder-style helper used when assembling trees by hand.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder-style helper used when assembling trees by hand.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.push_child(child);
        self
    }
}

// ── Prefix-tolerant lookup ────────────────────────────────────────────────────

/// Children of `node` named `prefix:bare`, or `bare` when the prefixed form is
/// absent.
pub fn lookup<'a>(node: &'a XmlNode, bare: &str, prefix: &str) -> Option<&'a [XmlNode]> {
    node.get(&qualify(prefix, bare)).or_else(|| node.get(bare))
}

/// Like [`lookup`], then falls back to the first child slot (in name order)
/// whose local name is `bare` under any other prefix.
pub fn lookup_any_prefix<'a>(node: &'a XmlNode, bare: &str, prefix: &str) -> Option<&'a [XmlNode]> {
    lookup(node, bare, prefix).or_else(|| {
        node.children
            .iter()
            .find(|(name, nodes)| local_name(name) == bare && !nodes.is_empty())
            .map(|(_, nodes)| nodes.as_slice())
    })
}

fn qualify(prefix: &str, bare: &str) -> String {
    if prefix.is_empty() {
        bare.to_string()
    } else {
        format!("{prefix}:{bare}")
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse `text` into a tree.
///
/// The returned node is a synthetic document node (empty name) whose children
/// contain the root element, so the root is found with the same lookup
/// functions as any other element.
pub fn parse(text: &str) -> Result<XmlNode, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.check_end_names(true);

    // stack[0] is the document node; the last entry is the open element.
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let node = element(&e, reader.buffer_position())?;
                stack.push(node);
            }
            Ok(Event::Empty(e)) => {
                let node = element(&e, reader.buffer_position())?;
                attach(&mut stack, node);
            }
            Ok(Event::End(e)) => {
                if stack.len() < 2 {
                    return Err(XmlError::new(
                        format!(
                            "closing tag </{}> without an open element",
                            String::from_utf8_lossy(e.name().as_ref())
                        ),
                        reader.buffer_position(),
                    ));
                }
                if let Some(mut node) = stack.pop() {
                    node.text = node.text.trim().to_string();
                    attach(&mut stack, node);
                }
            }
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| XmlError::new(err.to_string(), reader.buffer_position()))?;
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions and DOCTYPE
            // carry nothing the metadata model needs.
            Ok(_) => {}
            Err(err) => return Err(XmlError::new(err.to_string(), reader.buffer_position())),
        }
    }

    if stack.len() > 1 {
        let open = stack.last().map(|n| n.name.clone()).unwrap_or_default();
        return Err(XmlError::new(
            format!("unexpected end of document inside <{open}>"),
            reader.buffer_position(),
        ));
    }

    let mut document = stack.pop().unwrap_or_default();
    if document.children.is_empty() {
        return Err(XmlError::new("document has no root element", reader.buffer_position()));
    }
    document.text.clear();
    Ok(document)
}

fn element(start: &BytesStart<'_>, position: usize) -> Result<XmlNode, XmlError> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|err| XmlError::new(err.to_string(), position))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::new(err.to_string(), position))?
            .into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(node);
    }
}
