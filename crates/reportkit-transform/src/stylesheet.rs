//! Stylesheet compilation
//!
//! A stylesheet document is compiled once into templates and instruction
//! trees with every expression, pattern and attribute value template parsed.
//! Anything outside the supported subset is rejected at this point, so a
//! compiled [`Stylesheet`] only fails at run time on evaluation errors.

use std::collections::HashMap;

use reportkit_core::{
    ConversionParameters, LoadedResource, NodeId, NodeKind, QName, XmlDocument, XmlWriter,
};
use tracing::debug;

use crate::engine;
use crate::error::{Result, TransformError};
use crate::xpath::{self, fragment_text, parse_pattern, Expr, PathPattern};

/// Namespace of stylesheet instructions
pub const XSL_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputMethod {
    Xml,
    Text,
}

/// Settings from `xsl:output`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputSettings {
    pub(crate) method: OutputMethod,
    pub(crate) indent: bool,
    pub(crate) omit_declaration: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            method: OutputMethod::Xml,
            indent: false,
            omit_declaration: false,
        }
    }
}

/// Part of an attribute value template
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AvtPart {
    Literal(String),
    Expr(Expr),
}

/// An attribute value with embedded `{expr}` parts
pub(crate) type Avt = Vec<AvtPart>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindingValue {
    Select(Expr),
    Content(Vec<Instruction>),
    /// No select and no content: the empty string
    Empty,
}

/// A variable, parameter or `xsl:with-param`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Binding {
    pub(crate) name: String,
    pub(crate) value: BindingValue,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sort {
    pub(crate) select: Expr,
    pub(crate) descending: bool,
    pub(crate) numeric: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Instruction {
    Text(String),
    LiteralElement {
        name: String,
        /// Namespace declarations copied to the result (`prefix`, `uri`)
        namespaces: Vec<(String, String)>,
        attributes: Vec<(String, Avt)>,
        body: Vec<Instruction>,
    },
    ValueOf(Expr),
    ApplyTemplates {
        select: Option<Expr>,
        mode: Option<String>,
        sorts: Vec<Sort>,
        params: Vec<Binding>,
    },
    CallTemplate {
        name: String,
        params: Vec<Binding>,
    },
    ForEach {
        select: Expr,
        sorts: Vec<Sort>,
        body: Vec<Instruction>,
    },
    If {
        test: Expr,
        body: Vec<Instruction>,
    },
    Choose {
        branches: Vec<(Expr, Vec<Instruction>)>,
        otherwise: Vec<Instruction>,
    },
    Element {
        name: Avt,
        namespace: Option<Avt>,
        body: Vec<Instruction>,
    },
    Attribute {
        name: Avt,
        body: Vec<Instruction>,
    },
    Comment(Vec<Instruction>),
    Copy(Vec<Instruction>),
    CopyOf(Expr),
    Variable(Binding),
    Message {
        body: Vec<Instruction>,
        terminate: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Template {
    pub(crate) name: Option<String>,
    pub(crate) params: Vec<Binding>,
    pub(crate) body: Vec<Instruction>,
}

/// One alternative of a template's match pattern
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rule {
    pub(crate) pattern: PathPattern,
    pub(crate) mode: Option<String>,
    pub(crate) priority: f64,
    pub(crate) template: usize,
}

/// Element names listed by `xsl:strip-space` or `xsl:preserve-space`
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NameTest {
    /// `*`
    Any,
    /// `prefix:*`
    Namespace(String),
    /// A qualified name; unprefixed names are in no namespace
    Name(Option<String>, String),
}

impl NameTest {
    fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Namespace(uri) => name.namespace.as_deref() == Some(uri.as_str()),
            NameTest::Name(uri, local) => name.is(uri.as_deref(), local),
        }
    }

    fn priority(&self) -> f64 {
        match self {
            NameTest::Any => -0.5,
            NameTest::Namespace(_) => -0.25,
            NameTest::Name(..) => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpaceRule {
    pub(crate) test: NameTest,
    pub(crate) strip: bool,
}

/// A top-level variable or parameter
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Global {
    pub(crate) binding: Binding,
    pub(crate) is_param: bool,
}

/// A compiled stylesheet
#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    id: String,
    pub(crate) output: OutputSettings,
    pub(crate) globals: Vec<Global>,
    pub(crate) templates: Vec<Template>,
    /// Match rules in declaration order
    pub(crate) rules: Vec<Rule>,
    pub(crate) named: HashMap<String, usize>,
    /// Whitespace stripping rules in declaration order
    pub(crate) space: Vec<SpaceRule>,
}

impl Stylesheet {
    /// Compile stylesheet text; `id` names it in errors
    pub fn compile(id: impl Into<String>, text: &str) -> Result<Self> {
        let id = id.into();
        let doc = XmlDocument::parse_preserving_whitespace(text).map_err(|source| {
            TransformError::StylesheetSyntax {
                id: id.clone(),
                source,
            }
        })?;
        let sheet = Compiler::new(&id, &doc).compile()?;
        debug!(
            "Compiled stylesheet {}: {} template(s), {} rule(s)",
            id,
            sheet.templates.len(),
            sheet.rules.len()
        );
        Ok(sheet)
    }

    /// Compile a resolved resource
    pub fn from_resource(resource: &LoadedResource) -> Result<Self> {
        Self::compile(resource.id.clone(), &resource.text)
    }

    /// Identity of the stylesheet source
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether whitespace-only text inside elements called `name` is stripped
    ///
    /// The most specific matching name test decides and a later declaration
    /// wins among equally specific ones. Unlisted elements keep their
    /// whitespace.
    pub fn strips_space(&self, name: &QName) -> bool {
        let mut decision: Option<(f64, bool)> = None;
        for rule in self.space.iter().filter(|rule| rule.test.matches(name)) {
            let priority = rule.test.priority();
            if decision.map_or(true, |(best, _)| priority >= best) {
                decision = Some((priority, rule.strip));
            }
        }
        decision.is_some_and(|(_, strip)| strip)
    }

    /// Strip whitespace-only text from `doc` as the stylesheet declares
    pub fn strip_whitespace(&self, doc: &mut XmlDocument) {
        if self.space.iter().any(|rule| rule.strip) {
            doc.strip_whitespace(|name| self.strips_space(name));
        }
    }

    /// Apply the stylesheet to a parsed document and serialize the result
    ///
    /// The document is used as parsed; see [`Stylesheet::strip_whitespace`].
    pub fn apply(&self, input: &XmlDocument, params: &ConversionParameters) -> Result<String> {
        let nodes = engine::run(self, input, params)?;
        let text = match self.output.method {
            OutputMethod::Text => fragment_text(&nodes),
            OutputMethod::Xml => XmlWriter::new()
                .with_indent(self.output.indent.then_some(2))
                .with_declaration(!self.output.omit_declaration)
                .write(&nodes),
        };
        Ok(text)
    }

    /// Parse input text and apply the stylesheet to it
    pub fn apply_str(&self, input: &str, params: &ConversionParameters) -> Result<String> {
        let mut doc = XmlDocument::parse_preserving_whitespace(input).map_err(|source| TransformError::Input {
            document: "<memory>".to_string(),
            source,
        })?;
        self.strip_whitespace(&mut doc);
        self.apply(&doc, params)
    }
}

fn yes_no(value: Option<&str>) -> bool {
    value.map(str::trim) == Some("yes")
}

struct Compiler<'a> {
    id: &'a str,
    doc: &'a XmlDocument,
    /// Prefixes never copied to the result tree
    excluded: Vec<String>,
    sheet: Stylesheet,
}

impl<'a> Compiler<'a> {
    fn new(id: &'a str, doc: &'a XmlDocument) -> Self {
        Self {
            id,
            doc,
            excluded: Vec::new(),
            sheet: Stylesheet {
                id: id.to_string(),
                output: OutputSettings::default(),
                globals: Vec::new(),
                templates: Vec::new(),
                rules: Vec::new(),
                named: HashMap::new(),
                space: Vec::new(),
            },
        }
    }

    fn error(&self, message: impl Into<String>) -> TransformError {
        TransformError::Stylesheet {
            id: self.id.to_string(),
            message: message.into(),
        }
    }

    fn xsl_name(&self, node: NodeId) -> Option<&'a str> {
        let doc = self.doc;
        doc.name(node)
            .filter(|name| name.namespace.as_deref() == Some(XSL_NAMESPACE))
            .map(|name| name.local.as_str())
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&'a str> {
        let doc = self.doc;
        doc.attribute(node, name)
    }

    fn required(&self, node: NodeId, name: &str) -> Result<&'a str> {
        self.attr(node, name).ok_or_else(|| {
            self.error(format!(
                "{} requires a '{}' attribute",
                self.display_name(node),
                name
            ))
        })
    }

    fn display_name(&self, node: NodeId) -> String {
        self.doc.name(node).map(|n| n.qualified()).unwrap_or_default()
    }

    fn expr(&self, node: NodeId, source: &str) -> Result<Expr> {
        let doc = self.doc;
        let resolve = |prefix: &str| doc.lookup_namespace(node, prefix).map(str::to_string);
        xpath::compile(source, &resolve).map_err(|err| self.error(err.to_string()))
    }

    fn avt(&self, node: NodeId, source: &str) -> Result<Avt> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((index, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let start = index + 1;
                    let end = source[start..]
                        .find('}')
                        .map(|offset| start + offset)
                        .ok_or_else(|| self.error(format!("unterminated '{{' in '{}'", source)))?;
                    if !literal.is_empty() {
                        parts.push(AvtPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(AvtPart::Expr(self.expr(node, &source[start..end])?));
                    while matches!(chars.peek(), Some((i, _)) if *i <= end) {
                        chars.next();
                    }
                }
                '}' => return Err(self.error(format!("unescaped '}}' in '{}'", source))),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(AvtPart::Literal(literal));
        }
        Ok(parts)
    }

    fn compile(mut self) -> Result<Stylesheet> {
        let doc = self.doc;
        let root = doc
            .document_element()
            .ok_or_else(|| self.error("stylesheet has no root element"))?;
        match self.xsl_name(root) {
            Some("stylesheet") | Some("transform") => {}
            _ => {
                return Err(self.error(format!(
                    "root element must be xsl:stylesheet or xsl:transform, found {}",
                    self.display_name(root)
                )))
            }
        }
        if let Some(prefixes) = self.attr(root, "exclude-result-prefixes") {
            self.excluded = prefixes
                .split_whitespace()
                .map(|p| if p == "#default" { String::new() } else { p.to_string() })
                .collect();
        }

        for child in doc.child_elements(root) {
            let Some(local) = self.xsl_name(child) else {
                debug!("Ignoring top-level element {}", self.display_name(child));
                continue;
            };
            match local {
                "output" => self.output(child)?,
                "template" => self.template(child)?,
                "param" | "variable" => {
                    let binding = self.binding(child)?;
                    self.sheet.globals.push(Global {
                        binding,
                        is_param: local == "param",
                    });
                }
                "strip-space" => self.space(child, true)?,
                "preserve-space" => self.space(child, false)?,
                other => return Err(self.error(format!("unsupported top-level element xsl:{}", other))),
            }
        }
        Ok(self.sheet)
    }

    fn space(&mut self, node: NodeId, strip: bool) -> Result<()> {
        let doc = self.doc;
        for token in self.required(node, "elements")?.split_whitespace() {
            let test = match token.split_once(':') {
                _ if token == "*" => NameTest::Any,
                Some((prefix, local)) => {
                    let uri = doc
                        .lookup_namespace(node, prefix)
                        .ok_or_else(|| self.error(format!("undeclared prefix '{}' in '{}'", prefix, token)))?
                        .to_string();
                    if local == "*" {
                        NameTest::Namespace(uri)
                    } else {
                        NameTest::Name(Some(uri), local.to_string())
                    }
                }
                None => NameTest::Name(None, token.to_string()),
            };
            self.sheet.space.push(SpaceRule { test, strip });
        }
        Ok(())
    }

    fn output(&mut self, node: NodeId) -> Result<()> {
        let method = match self.attr(node, "method").map(str::trim) {
            None | Some("xml") => OutputMethod::Xml,
            Some("text") => OutputMethod::Text,
            Some(other) => return Err(self.error(format!("unsupported output method '{}'", other))),
        };
        self.sheet.output = OutputSettings {
            method,
            indent: yes_no(self.attr(node, "indent")),
            omit_declaration: yes_no(self.attr(node, "omit-xml-declaration")),
        };
        Ok(())
    }

    fn template(&mut self, node: NodeId) -> Result<()> {
        let doc = self.doc;
        let name = self.attr(node, "name").map(str::to_string);
        let pattern = self.attr(node, "match");
        if name.is_none() && pattern.is_none() {
            return Err(self.error("xsl:template needs a 'match' or 'name' attribute"));
        }

        let mut params = Vec::new();
        let mut rest = Vec::new();
        for child in doc.children(node).iter().copied() {
            if rest.is_empty() && self.xsl_name(child) == Some("param") {
                params.push(self.binding(child)?);
            } else if !self.is_ignorable(child) {
                rest.push(child);
            }
        }
        let body = self.instructions(&rest)?;

        let index = self.sheet.templates.len();
        if let Some(name) = &name {
            if self.sheet.named.insert(name.clone(), index).is_some() {
                return Err(self.error(format!("duplicate template name '{}'", name)));
            }
        }
        if let Some(source) = pattern {
            let resolve = |prefix: &str| doc.lookup_namespace(node, prefix).map(str::to_string);
            let alternatives = parse_pattern(source, &resolve).map_err(|err| self.error(err.to_string()))?;
            let explicit = match self.attr(node, "priority") {
                Some(text) => Some(
                    text.trim()
                        .parse::<f64>()
                        .map_err(|_| self.error(format!("invalid priority '{}'", text)))?,
                ),
                None => None,
            };
            let mode = self.attr(node, "mode").map(str::to_string);
            for pattern in alternatives {
                let priority = explicit.unwrap_or_else(|| pattern.default_priority());
                self.sheet.rules.push(Rule {
                    pattern,
                    mode: mode.clone(),
                    priority,
                    template: index,
                });
            }
        }
        self.sheet.templates.push(Template { name, params, body });
        Ok(())
    }

    /// Whitespace-only text and comments carry no instructions
    fn is_ignorable(&self, node: NodeId) -> bool {
        match self.doc.kind(node) {
            NodeKind::Text(text) => text.trim().is_empty(),
            NodeKind::Comment(_) => true,
            _ => false,
        }
    }

    fn body(&self, node: NodeId) -> Result<Vec<Instruction>> {
        let children = self.doc.children(node).to_vec();
        self.instructions(&children)
    }

    fn instructions(&self, nodes: &[NodeId]) -> Result<Vec<Instruction>> {
        let mut out = Vec::new();
        for node in nodes.iter().copied() {
            match self.doc.kind(node) {
                NodeKind::Text(text) if text.trim().is_empty() => {}
                NodeKind::Text(text) => out.push(Instruction::Text(text.clone())),
                NodeKind::Element(_) => out.push(self.instruction(node)?),
                _ => {}
            }
        }
        Ok(out)
    }

    fn instruction(&self, node: NodeId) -> Result<Instruction> {
        let Some(local) = self.xsl_name(node) else {
            return self.literal_element(node);
        };
        let instruction = match local {
            "text" => Instruction::Text(self.doc.own_text(node)),
            "value-of" => Instruction::ValueOf(self.expr(node, self.required(node, "select")?)?),
            "apply-templates" => {
                let select = match self.attr(node, "select") {
                    Some(source) => Some(self.expr(node, source)?),
                    None => None,
                };
                let (sorts, params) = self.sorts_and_params(node, true)?;
                Instruction::ApplyTemplates {
                    select,
                    mode: self.attr(node, "mode").map(str::to_string),
                    sorts,
                    params,
                }
            }
            "call-template" => {
                let (_, params) = self.sorts_and_params(node, false)?;
                Instruction::CallTemplate {
                    name: self.required(node, "name")?.to_string(),
                    params,
                }
            }
            "for-each" => {
                let select = self.expr(node, self.required(node, "select")?)?;
                let mut sorts = Vec::new();
                let mut rest = Vec::new();
                for child in self.doc.children(node).iter().copied() {
                    if rest.is_empty() && self.xsl_name(child) == Some("sort") {
                        sorts.push(self.sort(child)?);
                    } else if !self.is_ignorable(child) {
                        rest.push(child);
                    }
                }
                Instruction::ForEach {
                    select,
                    sorts,
                    body: self.instructions(&rest)?,
                }
            }
            "if" => Instruction::If {
                test: self.expr(node, self.required(node, "test")?)?,
                body: self.body(node)?,
            },
            "choose" => self.choose(node)?,
            "element" => Instruction::Element {
                name: self.avt(node, self.required(node, "name")?)?,
                namespace: match self.attr(node, "namespace") {
                    Some(source) => Some(self.avt(node, source)?),
                    None => None,
                },
                body: self.body(node)?,
            },
            "attribute" => Instruction::Attribute {
                name: self.avt(node, self.required(node, "name")?)?,
                body: self.body(node)?,
            },
            "comment" => Instruction::Comment(self.body(node)?),
            "copy" => Instruction::Copy(self.body(node)?),
            "copy-of" => Instruction::CopyOf(self.expr(node, self.required(node, "select")?)?),
            "variable" => Instruction::Variable(self.binding(node)?),
            "message" => Instruction::Message {
                body: self.body(node)?,
                terminate: yes_no(self.attr(node, "terminate")),
            },
            "param" | "sort" | "with-param" | "when" | "otherwise" => {
                return Err(self.error(format!("xsl:{} is not allowed here", local)))
            }
            other => return Err(self.error(format!("unsupported instruction xsl:{}", other))),
        };
        Ok(instruction)
    }

    /// Whether no literal result element encloses `node`
    fn is_outermost_literal(&self, node: NodeId) -> bool {
        let doc = self.doc;
        let mut current = doc.parent(node);
        while let Some(parent) = current {
            if doc.is_element(parent) && self.xsl_name(parent).is_none() {
                return false;
            }
            current = doc.parent(parent);
        }
        true
    }

    /// The outermost literal element of a template carries every namespace
    /// in scope in the stylesheet; nested ones only their own declarations
    fn literal_element(&self, node: NodeId) -> Result<Instruction> {
        let doc = self.doc;
        let Some(element) = doc.element(node) else {
            return Err(self.error("expected an element"));
        };
        let declared = if self.is_outermost_literal(node) {
            doc.in_scope_namespaces(node)
        } else {
            element.namespace_decls.clone()
        };
        let namespaces = declared
            .into_iter()
            .filter(|(prefix, uri)| uri != XSL_NAMESPACE && !self.excluded.contains(prefix))
            .collect();

        let mut attributes = Vec::new();
        for attr in &element.attributes {
            if let NodeKind::Attribute(data) = doc.kind(*attr) {
                if data.name.namespace.as_deref() == Some(XSL_NAMESPACE) {
                    continue;
                }
                attributes.push((data.name.qualified(), self.avt(node, &data.value)?));
            }
        }

        Ok(Instruction::LiteralElement {
            name: element.name.qualified(),
            namespaces,
            attributes,
            body: self.body(node)?,
        })
    }

    fn choose(&self, node: NodeId) -> Result<Instruction> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        for child in self.doc.children(node).iter().copied() {
            if self.is_ignorable(child) {
                continue;
            }
            match self.xsl_name(child) {
                Some("when") if otherwise.is_none() => {
                    let test = self.expr(child, self.required(child, "test")?)?;
                    branches.push((test, self.body(child)?));
                }
                Some("otherwise") if otherwise.is_none() => otherwise = Some(self.body(child)?),
                _ => {
                    return Err(self.error(format!(
                        "unexpected {} inside xsl:choose",
                        self.display_name(child)
                    )))
                }
            }
        }
        if branches.is_empty() {
            return Err(self.error("xsl:choose needs at least one xsl:when"));
        }
        Ok(Instruction::Choose {
            branches,
            otherwise: otherwise.unwrap_or_default(),
        })
    }

    fn sorts_and_params(&self, node: NodeId, allow_sort: bool) -> Result<(Vec<Sort>, Vec<Binding>)> {
        let mut sorts = Vec::new();
        let mut params = Vec::new();
        for child in self.doc.children(node).iter().copied() {
            if self.is_ignorable(child) {
                continue;
            }
            match self.xsl_name(child) {
                Some("sort") if allow_sort => sorts.push(self.sort(child)?),
                Some("with-param") => params.push(self.binding(child)?),
                _ => {
                    return Err(self.error(format!(
                        "unexpected {} inside {}",
                        self.display_name(child),
                        self.display_name(node)
                    )))
                }
            }
        }
        Ok((sorts, params))
    }

    fn sort(&self, node: NodeId) -> Result<Sort> {
        let select = self.expr(node, self.attr(node, "select").unwrap_or("."))?;
        let descending = match self.attr(node, "order").map(str::trim) {
            None | Some("ascending") => false,
            Some("descending") => true,
            Some(other) => return Err(self.error(format!("invalid sort order '{}'", other))),
        };
        let numeric = match self.attr(node, "data-type").map(str::trim) {
            None | Some("text") => false,
            Some("number") => true,
            Some(other) => return Err(self.error(format!("unsupported sort data-type '{}'", other))),
        };
        Ok(Sort {
            select,
            descending,
            numeric,
        })
    }

    fn binding(&self, node: NodeId) -> Result<Binding> {
        let name = self.required(node, "name")?.to_string();
        let value = match self.attr(node, "select") {
            Some(source) => BindingValue::Select(self.expr(node, source)?),
            None => {
                let body = self.body(node)?;
                if body.is_empty() {
                    BindingValue::Empty
                } else {
                    BindingValue::Content(body)
                }
            }
        };
        Ok(Binding { name, value })
    }
}
