//! In-memory page document.
//!
//! The lightbox core never talks to a live browser. A page is ingested once
//! from HTML into an arena-backed element tree, and every effect the core
//! produces (promoting a lazy image, opening the overlay, locking scroll,
//! moving focus) is a mutation of that tree. Elements are addressed by
//! [`NodeId`], an opaque copyable handle that stays valid for the lifetime of
//! the document.
//!
//! ## Tolerant Parsing
//!
//! HTML is tokenized with `quick-xml` configured for leniency:
//!
//! - end-tag names are not checked, and stray end tags are ignored
//! - void elements (`img`, `br`, `input`, ...) never take children, whether
//!   written as `<img>` or `<img/>`
//! - value-less and unquoted attributes (`hidden`, `tabindex=0`) are accepted
//! - attribute values resolve the full HTML5 entity table (`&nbsp;`,
//!   `&eacute;`) and numeric references; a reference nothing resolves
//!   (`&bogus;`) keeps its raw text while the rest of the value is decoded
//!
//! Text is stored raw (still escaped) so that [`Document::to_html`] writes it
//! back untouched. Raw-text elements (`script`, `style`) must not contain `<`.
//!
//! ## Image Fetch Model
//!
//! Image fetching belongs to the host platform. The document only records
//! whether an image's current source has completed: assigning a source with
//! [`Document::set_image_source`] marks it incomplete unless the same URL has
//! already completed elsewhere on the page (the platform cache), and
//! [`Document::mark_loaded`] records completion.

use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Markup syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },
}

/// Opaque handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const ROOT_TAG: &str = "#document";

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<NodeId>,
    /// Whether the element's current image source has finished fetching.
    complete: bool,
}

#[derive(Debug, Clone)]
enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    data: NodeData,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    doctype: Option<String>,
    focused: Option<NodeId>,
    fetched: HashSet<String>,
}

impl Document {
    /// Parse an HTML page into a document tree.
    pub fn parse(html: &str) -> Result<Document, MarkupError> {
        let mut doc = Document {
            nodes: vec![Node {
                parent: None,
                data: NodeData::Element(Element {
                    tag: ROOT_TAG.to_string(),
                    attrs: Vec::new(),
                    children: Vec::new(),
                    complete: true,
                }),
            }],
            doctype: None,
            focused: None,
            fetched: HashSet::new(),
        };

        let mut reader = Reader::from_str(html);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        // Open elements; the root is never popped.
        let mut stack = vec![doc.root()];

        loop {
            let event = reader.read_event().map_err(|e| MarkupError::Syntax {
                position: reader.error_position() as u64,
                message: e.to_string(),
            })?;
            let parent = *stack.last().unwrap_or(&NodeId(0));
            match event {
                Event::Start(start) => {
                    let id = doc.push_element(parent, &start);
                    if !is_void(doc.tag(id)) {
                        stack.push(id);
                    }
                }
                Event::Empty(start) => {
                    doc.push_element(parent, &start);
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                    // Close up to the nearest matching open element; ignore strays.
                    if let Some(pos) = stack.iter().skip(1).rposition(|id| doc.tag(*id) == name) {
                        stack.truncate(pos + 1);
                    }
                }
                Event::Text(text) => {
                    doc.push_text(parent, String::from_utf8_lossy(&text).into_owned());
                }
                Event::CData(data) => {
                    doc.push_text(parent, String::from_utf8_lossy(&data).into_owned());
                }
                Event::DocType(text) => {
                    doc.doctype = Some(String::from_utf8_lossy(&text).trim().to_string());
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(doc)
    }

    /// Read and parse an HTML file.
    pub fn read(path: &Path) -> Result<Document, MarkupError> {
        let html = fs::read_to_string(path)?;
        Document::parse(&html)
    }

    fn push_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            data,
        });
        if let NodeData::Element(el) = &mut self.nodes[parent.0].data {
            el.children.push(id);
        }
        id
    }

    fn push_element(&mut self, parent: NodeId, start: &BytesStart<'_>) -> NodeId {
        let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut iter = start.html_attributes();
        iter.with_checks(false);
        for attr in iter.flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let value = match attr.unescape_value_with(resolve_html5_entity) {
                Ok(v) => v.into_owned(),
                Err(_) => decode_known_references(&String::from_utf8_lossy(&attr.value)),
            };
            // First occurrence wins, as in browsers.
            if !attrs.iter().any(|(k, _)| *k == key) {
                attrs.push((key, value));
            }
        }
        let complete = !attrs.iter().any(|(k, v)| k == "src" && !v.is_empty());
        self.push_node(
            parent,
            NodeData::Element(Element {
                tag,
                attrs,
                children: Vec::new(),
                complete,
            }),
        )
    }

    fn push_text(&mut self, parent: NodeId, text: String) {
        if !text.is_empty() {
            self.push_node(parent, NodeData::Text(text));
        }
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The synthetic document root. Top-level markup hangs off it.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn body(&self) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.tag(*id) == "body")
    }

    /// Lower-cased tag name, or `""` for text nodes and unknown handles.
    pub fn tag(&self, id: NodeId) -> &str {
        self.element(id).map(|el| el.tag.as_str()).unwrap_or("")
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Element children in document order (text nodes skipped).
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.element(id)
            .map(|el| {
                el.children
                    .iter()
                    .copied()
                    .filter(|c| self.element(*c).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All element descendants of `id` in document (pre-)order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    pub fn element_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.attr(*id, "id") == Some(element_id))
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    /// Descendants of `scope` carrying `class`, in document order.
    pub fn elements_with_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    /// Descendants of `scope` with the given tag, in document order.
    pub fn elements_with_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.tag(*id) == tag)
            .collect()
    }

    /// Nearest of `id` and its ancestors matching `pred`.
    pub fn closest(&self, id: NodeId, mut pred: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if node != self.root() && pred(node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.closest(node, |n| n == ancestor).is_some()
    }

    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        parse_style(self.attr(id, "style")?)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Whether the element's current image source has finished fetching.
    pub fn is_complete(&self, id: NodeId) -> bool {
        self.element(id).map(|el| el.complete).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        match el.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(k, _)| k != name);
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.element(id).is_none() || self.has_class(id, class) {
            return;
        }
        let mut classes: Vec<String> = self.classes(id).map(str::to_string).collect();
        classes.push(class.to_string());
        self.set_attr(id, "class", &classes.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let classes: Vec<String> = self
            .classes(id)
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        if classes.is_empty() {
            self.remove_attr(id, "class");
        } else {
            self.set_attr(id, "class", &classes.join(" "));
        }
    }

    /// Set (`Some`) or clear (`None`) a single inline style declaration.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: Option<&str>) {
        let mut decls = parse_style(self.attr(id, "style").unwrap_or(""));
        decls.retain(|(k, _)| k != property);
        if let Some(value) = value {
            decls.push((property.to_string(), value.to_string()));
        }
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            let style = decls
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attr(id, "style", &style);
        }
    }

    pub fn focus(&mut self, id: NodeId) {
        if self.element(id).is_some() {
            self.focused = Some(id);
        }
    }

    /// Point an image at a new source.
    ///
    /// The image counts as complete straight away only when that URL has
    /// already finished loading somewhere on the page.
    pub fn set_image_source(&mut self, id: NodeId, url: &str) {
        let cached = url.is_empty() || self.fetched.contains(url);
        self.set_attr(id, "src", url);
        if let Some(el) = self.element_mut(id) {
            el.complete = cached;
        }
    }

    /// Remove an image's source entirely.
    pub fn clear_image_source(&mut self, id: NodeId) {
        self.remove_attr(id, "src");
        if let Some(el) = self.element_mut(id) {
            el.complete = true;
        }
    }

    /// Record that the element's current source finished fetching.
    pub fn mark_loaded(&mut self, id: NodeId) {
        if let Some(src) = self.attr(id, "src").map(str::to_string) {
            self.fetched.insert(src);
        }
        if let Some(el) = self.element_mut(id) {
            el.complete = true;
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(doctype) = &self.doctype {
            out.push_str(&format!("<!DOCTYPE {doctype}>"));
        }
        if let Some(root) = self.element(self.root()) {
            for child in &root.children {
                self.write_node(*child, &mut out);
            }
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (k, v) in &el.attrs {
                    out.push_str(&format!(" {k}=\"{}\"", quick_xml::escape::escape(v.as_str())));
                }
                out.push('>');
                if is_void(&el.tag) {
                    return;
                }
                for child in &el.children {
                    self.write_node(*child, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Split an inline `style` attribute into `(property, value)` pairs.
fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim().to_ascii_lowercase();
            (!k.is_empty()).then(|| (k, v.trim().to_string()))
        })
        .collect()
}

/// Decode each character reference in `raw` on its own, leaving any that
/// neither the HTML5 table nor numeric syntax resolves as written.
fn decode_known_references(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let body = &tail[1..];
        match body.find(|c: char| c == ';' || c == '&' || c.is_whitespace()) {
            Some(end) if body[end..].starts_with(';') => {
                let reference = &tail[..end + 2];
                match unescape_with(reference, resolve_html5_entity) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(reference),
                }
                rest = &tail[end + 2..];
            }
            _ => {
                out.push('&');
                rest = body;
            }
        }
    }
    out.push_str(rest);
    out
}
