//! Result tree serialization
//!
//! Transformations build an in-memory tree of [`OutputNode`]s which the
//! [`XmlWriter`] turns into text.

/// A node of a result tree
#[derive(Debug, Clone, PartialEq)]
pub enum OutputNode {
    /// An element with attributes and children
    Element(OutputElement),
    /// Character data (escaped on output)
    Text(String),
    /// A comment
    Comment(String),
}

/// An element of a result tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputElement {
    /// Qualified element name
    pub name: String,
    /// Attributes in insertion order; names are unique
    pub attributes: Vec<(String, String)>,
    /// Child nodes
    pub children: Vec<OutputNode>,
}

impl OutputElement {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, replacing an existing value with the same name
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text of all descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[OutputNode], out: &mut String) {
    for node in nodes {
        match node {
            OutputNode::Text(text) => out.push_str(text),
            OutputNode::Element(element) => collect_text(&element.children, out),
            OutputNode::Comment(_) => {}
        }
    }
}

/// Serializes result trees to XML text
#[derive(Debug, Clone)]
pub struct XmlWriter {
    indent: Option<usize>,
    declaration: bool,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    /// Writer with an XML declaration and two-space indentation
    pub fn new() -> Self {
        Self {
            indent: Some(2),
            declaration: true,
        }
    }

    /// Set the indentation width; `None` writes everything on one line
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    /// Enable or disable the leading `<?xml ...?>` declaration
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Serialize a sequence of top-level nodes
    pub fn write(&self, nodes: &[OutputNode]) -> String {
        let mut out = String::new();
        if self.declaration {
            out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
            if self.indent.is_some() {
                out.push('\n');
            }
        }
        for node in nodes {
            self.write_node(node, 0, &mut out);
            if self.indent.is_some() {
                out.push('\n');
            }
        }
        out
    }

    fn write_node(&self, node: &OutputNode, depth: usize, out: &mut String) {
        match node {
            OutputNode::Text(text) => out.push_str(&escape_text(text)),
            OutputNode::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            OutputNode::Element(element) => self.write_element(element, depth, out),
        }
    }

    fn write_element(&self, element: &OutputElement, depth: usize, out: &mut String) {
        out.push('<');
        out.push_str(&element.name);
        for (name, value) in &element.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }

        if element.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        // Mixed content is written inline so no whitespace is added to text
        let mixed = element
            .children
            .iter()
            .any(|child| matches!(child, OutputNode::Text(_)));

        match self.indent {
            Some(width) if !mixed => {
                for child in &element.children {
                    out.push('\n');
                    push_indent(out, width * (depth + 1));
                    self.write_node(child, depth + 1, out);
                }
                out.push('\n');
                push_indent(out, width * depth);
            }
            _ => {
                for child in &element.children {
                    self.write_node(child, depth + 1, out);
                }
            }
        }

        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
    }
}

fn push_indent(out: &mut String, width: usize) {
    out.extend(std::iter::repeat(' ').take(width));
}

/// Escape character data
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape an attribute value for a double-quoted attribute
pub fn escape_attribute(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
        .replace('\t', "&#9;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<OutputNode> {
        let mut suite = OutputElement::new("testsuite");
        suite.set_attribute("name", "a \"quoted\" <suite>");
        let mut case = OutputElement::new("testcase");
        case.set_attribute("name", "t1");
        let mut failure = OutputElement::new("failure");
        failure.children.push(OutputNode::Text("x < y & z".to_string()));
        case.children.push(OutputNode::Element(failure));
        suite.children.push(OutputNode::Element(case));
        vec![OutputNode::Element(suite)]
    }

    #[test]
    fn test_indented_output() {
        let xml = XmlWriter::new().write(&sample());
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<testsuite name=\"a &quot;quoted&quot; &lt;suite&gt;\">\n  \
<testcase name=\"t1\">\n    \
<failure>x &lt; y &amp; z</failure>\n  \
</testcase>\n\
</testsuite>\n";
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_compact_output_without_declaration() {
        let xml = XmlWriter::new()
            .with_indent(None)
            .with_declaration(false)
            .write(&sample());
        assert!(xml.starts_with("<testsuite"));
        assert!(!xml.contains('\n'));
    }

    #[test]
    fn test_empty_element_self_closes() {
        let xml = XmlWriter::new()
            .with_declaration(false)
            .write(&[OutputNode::Element(OutputElement::new("a"))]);
        assert_eq!(xml, "<a/>\n");
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut element = OutputElement::new("a");
        element.set_attribute("x", "1");
        element.set_attribute("x", "2");
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.attribute("x"), Some("2"));
    }
}
