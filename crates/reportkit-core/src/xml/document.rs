//! Arena-backed XML document model
//!
//! Documents are parsed once into a flat arena of nodes. Node ids are
//! allocated in document order (an element's attribute nodes directly follow
//! it, then its descendants), so comparing two [`NodeId`]s compares their
//! document order.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::encoding::decode_document;
use crate::error::{Position, Result, XmlError};

/// Namespace bound to the `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Index of a node inside an [`XmlDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Index of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// A qualified XML name with its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Prefix as written in the document
    pub prefix: Option<String>,
    /// Local part of the name
    pub local: String,
    /// Namespace URI the prefix resolved to
    pub namespace: Option<String>,
}

impl QName {
    /// The name as written: `prefix:local` or `local`
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }

    /// Check namespace and local name
    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == namespace
    }
}

/// Element payload
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Element name
    pub name: QName,
    /// Attribute node ids, in document order
    pub attributes: Vec<NodeId>,
    /// Namespace declarations made on this element (`prefix`, `uri`);
    /// the default namespace uses an empty prefix
    pub namespace_decls: Vec<(String, String)>,
}

/// Attribute payload
#[derive(Debug, Clone)]
pub struct AttributeData {
    /// Attribute name
    pub name: QName,
    /// Unescaped value
    pub value: String,
}

/// The kind of a node and its payload
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node
    Root,
    /// An element
    Element(ElementData),
    /// An attribute of an element
    Attribute(AttributeData),
    /// Character data (text and CDATA sections, merged)
    Text(String),
    /// A comment
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    position: Option<Position>,
}

/// A parsed XML document
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

impl XmlDocument {
    /// Parse a document from text, dropping whitespace-only text nodes
    pub fn parse(text: &str) -> Result<Self> {
        DocumentParser::new(text, false).parse()
    }

    /// Parse a document from text, keeping whitespace-only text nodes inside
    /// elements
    pub fn parse_preserving_whitespace(text: &str) -> Result<Self> {
        DocumentParser::new(text, true).parse()
    }

    /// Read and parse a document from a file
    ///
    /// The bytes are decoded according to the byte order mark or the
    /// `encoding` of the XML declaration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&read_document(path.as_ref())?)
    }

    /// Read and parse a document from a file, keeping whitespace-only text
    pub fn from_file_preserving_whitespace(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse_preserving_whitespace(&read_document(path.as_ref())?)
    }

    /// Remove the whitespace-only text children of every element `strip`
    /// selects
    ///
    /// Elements in the scope of `xml:space="preserve"` keep their whitespace.
    pub fn strip_whitespace(&mut self, strip: impl Fn(&QName) -> bool) {
        let targets: Vec<NodeId> = (0..self.nodes.len())
            .map(NodeId)
            .filter(|&id| match &self.nodes[id.0].kind {
                NodeKind::Element(element) => strip(&element.name) && !self.preserves_space(id),
                _ => false,
            })
            .collect();
        for id in targets {
            let nodes = &self.nodes;
            let kept: Vec<NodeId> = nodes[id.0]
                .children
                .iter()
                .copied()
                .filter(|child| !matches!(&nodes[child.0].kind, NodeKind::Text(text) if is_whitespace(text)))
                .collect();
            self.nodes[id.0].children = kept;
        }
    }

    fn preserves_space(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            match self.attribute(node, "xml:space") {
                Some("preserve") => return true,
                Some(_) => return false,
                None => current = self.parent(node),
            }
        }
        false
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The single top-level element
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena only holds the document node
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Kind and payload of a node
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Parent of a node (attributes report their owner element)
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Child nodes (elements, text, comments)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Child elements only
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    /// Attribute nodes of an element
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => &element.attributes,
            _ => &[],
        }
    }

    /// Element payload, if the node is an element
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Name of an element or attribute
    pub fn name(&self, id: NodeId) -> Option<&QName> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(&element.name),
            NodeKind::Attribute(attr) => Some(&attr.name),
            _ => None,
        }
    }

    /// Check whether a node is an element
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element(_))
    }

    /// Look up an attribute value by its name as written (`name`, `xml:lang`)
    pub fn attribute(&self, id: NodeId, qualified: &str) -> Option<&str> {
        self.attributes(id).iter().find_map(|attr| match self.kind(*attr) {
            NodeKind::Attribute(data) if data.name.qualified() == qualified => {
                Some(data.value.as_str())
            }
            _ => None,
        })
    }

    /// Start position of an element (or the element owning an attribute)
    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.nodes[id.0].position
    }

    /// XPath string-value of a node
    pub fn string_value(&self, id: NodeId) -> String {
        match self.kind(id) {
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::Attribute(attr) => attr.value.clone(),
            NodeKind::Root | NodeKind::Element(_) => {
                let mut out = String::new();
                self.collect_text(id, &mut out);
                out
            }
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            match self.kind(*child) {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element(_) => self.collect_text(*child, out),
                _ => {}
            }
        }
    }

    /// Direct text content of an element, ignoring child elements
    pub fn own_text(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .filter_map(|child| match self.kind(*child) {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// A readable path to an element, e.g. `/testsuites/testsuite[2]/testcase`
    ///
    /// The `[n]` index is only written when several siblings share the name.
    pub fn path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            match self.kind(node) {
                NodeKind::Element(element) => {
                    let name = element.name.qualified();
                    let segment = match self.parent(node) {
                        Some(parent) => {
                            let same: Vec<NodeId> = self
                                .child_elements(parent)
                                .filter(|sibling| {
                                    self.name(*sibling).map(|n| n.qualified()).as_deref()
                                        == Some(name.as_str())
                                })
                                .collect();
                            if same.len() > 1 {
                                let index = same.iter().position(|s| *s == node).unwrap_or(0);
                                format!("{}[{}]", name, index + 1)
                            } else {
                                name
                            }
                        }
                        None => name,
                    };
                    segments.push(segment);
                }
                NodeKind::Attribute(attr) => segments.push(format!("@{}", attr.name.qualified())),
                _ => {}
            }
            current = self.parent(node);
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Look up the namespace bound to `prefix` at `id` (empty prefix for the
    /// default namespace)
    pub fn lookup_namespace(&self, id: NodeId, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                if let Some((_, uri)) = element.namespace_decls.iter().find(|(p, _)| p == prefix) {
                    return if uri.is_empty() { None } else { Some(uri) };
                }
            }
            current = self.parent(node);
        }
        None
    }

    /// All namespace declarations in scope at `id`, innermost first wins
    pub fn in_scope_namespaces(&self, id: NodeId) -> Vec<(String, String)> {
        let mut scope: Vec<(String, String)> = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                for (prefix, uri) in &element.namespace_decls {
                    if !scope.iter().any(|(p, _)| p == prefix) {
                        scope.push((prefix.clone(), uri.clone()));
                    }
                }
            }
            current = self.parent(node);
        }
        scope
    }

    /// All descendant nodes of `id` in document order (excluding attributes)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.push_descendants(id, &mut out);
        out
    }

    fn push_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            out.push(*child);
            self.push_descendants(*child, out);
        }
    }

    fn push(&mut self, kind: NodeKind, parent: NodeId, position: Option<Position>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            position,
        });
        id
    }
}

/// Maps byte offsets to line/column positions
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let start = self.starts[line];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        Position::new(line + 1, column + 1)
    }
}

struct DocumentParser<'a> {
    text: &'a str,
    lines: LineIndex<'a>,
    doc: XmlDocument,
    stack: Vec<NodeId>,
    preserve_whitespace: bool,
}

impl<'a> DocumentParser<'a> {
    fn new(text: &'a str, preserve_whitespace: bool) -> Self {
        Self {
            text,
            preserve_whitespace,
            lines: LineIndex::new(text),
            doc: XmlDocument {
                nodes: vec![Node {
                    kind: NodeKind::Root,
                    parent: None,
                    children: Vec::new(),
                    position: Some(Position::new(1, 1)),
                }],
            },
            stack: vec![NodeId(0)],
        }
    }

    fn parse(mut self) -> Result<XmlDocument> {
        if let Some((offset, c)) = self.text.char_indices().find(|&(_, c)| !is_xml_char(c)) {
            return Err(illegal_char(c, self.lines.position(offset)));
        }
        let mut reader = Reader::from_str(self.text);

        loop {
            let offset = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    let at = self.lines.position(reader.error_position() as usize);
                    return Err(XmlError::syntax(e.to_string(), at));
                }
            };
            let at = self.lines.position(offset);

            match event {
                Event::Start(ref e) => {
                    let id = self.open_element(e, at)?;
                    self.stack.push(id);
                }
                Event::Empty(ref e) => {
                    self.open_element(e, at)?;
                }
                Event::End(_) => {
                    if self.stack.len() <= 1 {
                        return Err(XmlError::syntax("unexpected closing tag", at));
                    }
                    self.stack.pop();
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| XmlError::syntax(e.to_string(), at))?;
                    self.append_text(&text, at)?;
                }
                Event::CData(c) => {
                    let bytes = c.into_inner();
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| XmlError::syntax(e.to_string(), at))?;
                    self.append_text(text, at)?;
                }
                Event::Comment(ref c) => {
                    let text = std::str::from_utf8(c)
                        .map_err(|e| XmlError::syntax(e.to_string(), at))?
                        .to_string();
                    let parent = self.current();
                    let id = self.doc.push(NodeKind::Comment(text), parent, Some(at));
                    self.doc.nodes[parent.0].children.push(id);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if self.stack.len() > 1 {
            let open = self.stack[self.stack.len() - 1];
            let name = self
                .doc
                .name(open)
                .map(|n| n.qualified())
                .unwrap_or_default();
            let at = self.lines.position(self.text.len());
            return Err(XmlError::syntax(
                format!("element <{}> is not closed", name),
                at,
            ));
        }
        if self.doc.document_element().is_none() {
            return Err(XmlError::NoRootElement);
        }

        Ok(self.doc)
    }

    fn current(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    fn open_element(&mut self, start: &BytesStart<'_>, at: Position) -> Result<NodeId> {
        let parent = self.current();
        if parent == self.doc.root() && self.doc.document_element().is_some() {
            return Err(XmlError::syntax("document has more than one root element", at));
        }

        let raw_name = utf8(start.name().as_ref(), at)?;
        let mut decls = Vec::new();
        let mut raw_attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::syntax(e.to_string(), at))?;
            let key = utf8(attr.key.as_ref(), at)?;
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::syntax(e.to_string(), at))?
                .into_owned();
            check_chars(&value, at)?;
            if key == "xmlns" {
                decls.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                decls.push((prefix.to_string(), value));
            } else {
                raw_attrs.push((key, value));
            }
        }

        let id = self.doc.push(
            NodeKind::Element(ElementData {
                name: QName {
                    prefix: None,
                    local: String::new(),
                    namespace: None,
                },
                attributes: Vec::new(),
                namespace_decls: decls,
            }),
            parent,
            Some(at),
        );
        self.doc.nodes[parent.0].children.push(id);

        let name = self.resolve(id, &raw_name, true, at)?;
        let mut attributes = Vec::with_capacity(raw_attrs.len());
        for (key, value) in raw_attrs {
            let attr_name = self.resolve(id, &key, false, at)?;
            let attr_id = self.doc.push(
                NodeKind::Attribute(AttributeData {
                    name: attr_name,
                    value,
                }),
                id,
                Some(at),
            );
            attributes.push(attr_id);
        }

        if let NodeKind::Element(element) = &mut self.doc.nodes[id.0].kind {
            element.name = name;
            element.attributes = attributes;
        }
        Ok(id)
    }

    fn resolve(&self, scope: NodeId, raw: &str, is_element: bool, at: Position) -> Result<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let namespace = self.doc.lookup_namespace(scope, prefix).ok_or_else(|| {
                    XmlError::syntax(format!("unbound namespace prefix '{}'", prefix), at)
                })?;
                Ok(QName {
                    prefix: Some(prefix.to_string()),
                    local: local.to_string(),
                    namespace: Some(namespace.to_string()),
                })
            }
            None => Ok(QName {
                prefix: None,
                local: raw.to_string(),
                namespace: if is_element {
                    self.doc.lookup_namespace(scope, "").map(str::to_string)
                } else {
                    None
                },
            }),
        }
    }

    fn append_text(&mut self, text: &str, at: Position) -> Result<()> {
        let parent = self.current();
        check_chars(text, at)?;
        if is_whitespace(text) && (parent == self.doc.root() || !self.preserve_whitespace) {
            return Ok(());
        }
        if parent == self.doc.root() {
            return Err(XmlError::syntax("text content outside the root element", at));
        }
        // Merge adjacent character data (text followed by CDATA and so on)
        if let Some(last) = self.doc.nodes[parent.0].children.last().copied() {
            if let NodeKind::Text(existing) = &mut self.doc.nodes[last.0].kind {
                existing.push_str(text);
                return Ok(());
            }
        }
        let id = self.doc.push(NodeKind::Text(text.to_string()), parent, Some(at));
        self.doc.nodes[parent.0].children.push(id);
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| XmlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_document(&bytes)
}

/// Only space, tab, carriage return and line feed
fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// The XML 1.0 `Char` production
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn check_chars(text: &str, at: Position) -> Result<()> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(illegal_char(c, at)),
        None => Ok(()),
    }
}

fn illegal_char(c: char, at: Position) -> XmlError {
    XmlError::syntax(format!("character U+{:04X} is not allowed in XML", c as u32), at)
}

fn utf8(bytes: &[u8], at: Position) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::syntax(e.to_string(), at))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="math" tests="2">
    <testcase name="add"/>
    <testcase name="div">
      <failure message="divide by zero">trace &amp; more</failure>
    </testcase>
  </testsuite>
</testsuites>"#;

    #[test]
    fn test_parse_structure() {
        let doc = XmlDocument::parse(REPORT).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.name(root).unwrap().local, "testsuites");

        let suite = doc.child_elements(root).next().unwrap();
        assert_eq!(doc.attribute(suite, "name"), Some("math"));
        assert_eq!(doc.child_elements(suite).count(), 2);
    }

    #[test]
    fn test_positions_are_one_indexed() {
        let doc = XmlDocument::parse(REPORT).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.position(root), Some(Position::new(2, 1)));

        let suite = doc.child_elements(root).next().unwrap();
        assert_eq!(doc.position(suite), Some(Position::new(3, 3)));
    }

    #[test]
    fn test_text_is_unescaped() {
        let doc = XmlDocument::parse(REPORT).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.string_value(root), "trace & more");
    }

    #[test]
    fn test_document_order_ids() {
        let doc = XmlDocument::parse(REPORT).unwrap();
        let root = doc.document_element().unwrap();
        let descendants = doc.descendants(root);
        let mut sorted = descendants.clone();
        sorted.sort();
        assert_eq!(descendants, sorted);
    }

    #[test]
    fn test_path_indexes_repeated_siblings() {
        let doc = XmlDocument::parse(REPORT).unwrap();
        let root = doc.document_element().unwrap();
        let suite = doc.child_elements(root).next().unwrap();
        let second = doc.child_elements(suite).nth(1).unwrap();
        assert_eq!(doc.path(second), "/testsuites/testsuite/testcase[2]");
    }

    #[test]
    fn test_namespaces_resolve() {
        let doc = XmlDocument::parse(
            r#"<x:a xmlns:x="urn:x" xmlns="urn:default"><b/><x:c y="1"/></x:a>"#,
        )
        .unwrap();
        let root = doc.document_element().unwrap();
        assert!(doc.name(root).unwrap().is(Some("urn:x"), "a"));
        let mut children = doc.child_elements(root);
        let b = children.next().unwrap();
        assert!(doc.name(b).unwrap().is(Some("urn:default"), "b"));
        let c = children.next().unwrap();
        let attr = doc.attributes(c)[0];
        assert!(doc.name(attr).unwrap().is(None, "y"));
    }

    #[test]
    fn test_unbound_prefix_is_an_error() {
        let err = XmlDocument::parse("<x:a/>").unwrap_err();
        assert!(matches!(err, XmlError::Syntax { .. }));
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = XmlDocument::parse("<a><b></a>").unwrap_err();
        assert!(matches!(err, XmlError::Syntax { .. }));
    }

    #[test]
    fn test_unclosed_element() {
        let err = XmlDocument::parse("<a><b/>").unwrap_err();
        assert!(matches!(err, XmlError::Syntax { .. }));
    }

    #[test]
    fn test_no_root_element() {
        let err = XmlDocument::parse("<?xml version=\"1.0\"?>").unwrap_err();
        assert!(matches!(err, XmlError::NoRootElement));
    }

    #[test]
    fn test_two_roots_rejected() {
        assert!(XmlDocument::parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_whitespace_preservation() {
        let text = "<a><b> </b></a>";
        let stripped = XmlDocument::parse(text).unwrap();
        let kept = XmlDocument::parse_preserving_whitespace(text).unwrap();
        assert_eq!(stripped.string_value(stripped.root()), "");
        assert_eq!(kept.string_value(kept.root()), " ");
    }

    #[test]
    fn test_strip_whitespace_by_name() {
        let text = "<m><list> <x/> </list><p><b>a</b> <i>b</i></p><q xml:space=\"preserve\"><list> </list></q></m>";
        let mut doc = XmlDocument::parse_preserving_whitespace(text).unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.string_value(root), "  a b ");

        doc.strip_whitespace(|name| name.local == "list");
        assert_eq!(doc.string_value(root), "a b ");
        let list = doc.child_elements(root).next().unwrap();
        assert_eq!(doc.children(list).len(), 1);
    }

    #[test]
    fn test_illegal_characters_rejected() {
        for text in ["<a>\u{0}</a>", "<a b=\"\u{1}\"/>", "<a>&#0;</a>", "<a>\u{FFFF}</a>"] {
            let err = XmlDocument::parse(text).unwrap_err();
            assert!(matches!(err, XmlError::Syntax { .. }), "{:?}", text);
        }
        let doc = XmlDocument::parse("<a>\ttab\u{E9}\u{1F600}</a>").unwrap();
        assert_eq!(doc.string_value(doc.root()), "\ttab\u{E9}\u{1F600}");
    }

    #[test]
    fn test_from_file_honours_declared_encoding() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("latin1.xml");
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<Message>caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</Message>");
        fs::write(&path, bytes).unwrap();

        let doc = XmlDocument::from_file(&path).unwrap();
        assert_eq!(doc.string_value(doc.root()), "caf\u{E9}");
        assert_eq!(doc.position(doc.document_element().unwrap()), Some(Position::new(2, 1)));
    }

    #[test]
    fn test_cdata_merges_with_text() {
        let doc = XmlDocument::parse("<a>one <![CDATA[<two>]]></a>").unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.children(root).len(), 1);
        assert_eq!(doc.string_value(root), "one <two>");
    }
}
