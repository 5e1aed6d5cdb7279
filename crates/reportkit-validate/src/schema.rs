//! Schema model and compiler
//!
//! A schema document is compiled once into an arena of type definitions and
//! element declarations. Named types are registered before their body is
//! compiled, so recursive content models resolve to the same [`TypeId`].

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use regex::Regex;
use reportkit_core::{NodeId, XmlDocument};
use tracing::debug;

use crate::builtin::{Builtin, WhiteSpace};
use crate::error::{Result, ValidationFailure};

/// Namespace of schema documents
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace of instance attributes such as `xsi:schemaLocation`
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ElementId(usize);

#[derive(Debug)]
pub(crate) enum TypeDef {
    AnyType,
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug)]
pub(crate) struct SimpleType {
    pub(crate) name: String,
    pub(crate) variety: Variety,
    pub(crate) facets: Facets,
}

#[derive(Debug)]
pub(crate) enum Variety {
    Builtin(Builtin),
    Restriction(TypeId),
    List(TypeId),
    Union(Vec<TypeId>),
}

/// A bound of a range facet
#[derive(Debug, Clone)]
pub(crate) enum Bound {
    Number(f64),
    Text(String),
}

impl Bound {
    fn parse(value: &str) -> Self {
        match value.trim().parse::<f64>() {
            Ok(n) => Bound::Number(n),
            Err(_) => Bound::Text(value.trim().to_string()),
        }
    }

    /// Order of `value` relative to the bound
    pub(crate) fn compare(&self, value: &str) -> Option<Ordering> {
        match self {
            Bound::Number(n) => value.parse::<f64>().ok()?.partial_cmp(n),
            Bound::Text(text) => Some(value.cmp(text.as_str())),
        }
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Number(n) => write!(f, "{}", n),
            Bound::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Facets {
    pub(crate) enumeration: Vec<String>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) length: Option<usize>,
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) min_inclusive: Option<Bound>,
    pub(crate) max_inclusive: Option<Bound>,
    pub(crate) min_exclusive: Option<Bound>,
    pub(crate) max_exclusive: Option<Bound>,
    pub(crate) total_digits: Option<usize>,
    pub(crate) fraction_digits: Option<usize>,
    pub(crate) white_space: Option<WhiteSpace>,
}

#[derive(Debug)]
pub(crate) struct ComplexType {
    pub(crate) content: Content,
    pub(crate) attributes: Vec<AttributeUse>,
    pub(crate) any_attribute: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Content {
    Empty,
    Elements { particle: Particle, mixed: bool },
    Simple(TypeId),
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeUse {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) ty: TypeId,
    pub(crate) required: bool,
    pub(crate) fixed: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Particle {
    pub(crate) min: u32,
    pub(crate) max: Option<u32>,
    pub(crate) term: Term,
}

#[derive(Debug, Clone)]
pub(crate) enum Term {
    Element(ElementId),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    All(Vec<Particle>),
    Any(Wildcard),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug, Clone)]
pub(crate) enum NamespaceConstraint {
    Any,
    Other(Option<String>),
    Listed(Vec<Option<String>>),
}

impl NamespaceConstraint {
    pub(crate) fn allows(&self, namespace: Option<&str>) -> bool {
        match self {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => {
                namespace.is_some() && namespace != target.as_deref()
            }
            NamespaceConstraint::Listed(list) => list.iter().any(|ns| ns.as_deref() == namespace),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Wildcard {
    pub(crate) namespaces: NamespaceConstraint,
    pub(crate) process: ProcessContents,
}

#[derive(Debug)]
pub(crate) struct ElementDecl {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) ty: TypeId,
    pub(crate) fixed: Option<String>,
    pub(crate) nillable: bool,
}

impl ElementDecl {
    pub(crate) fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.name == local && self.namespace.as_deref() == namespace
    }
}

/// A compiled schema
///
/// # Example
///
/// ```
/// use reportkit_validate::Schema;
///
/// let schema = Schema::parse(
///     "inline",
///     r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
///          <xs:element name="testsuite" type="xs:string"/>
///        </xs:schema>"#,
/// )?;
/// assert_eq!(schema.root_elements().collect::<Vec<_>>(), vec!["testsuite"]);
/// # Ok::<(), reportkit_validate::ValidationFailure>(())
/// ```
#[derive(Debug)]
pub struct Schema {
    id: String,
    target_namespace: Option<String>,
    types: Vec<TypeDef>,
    elements: Vec<ElementDecl>,
    roots: Vec<ElementId>,
}

impl Schema {
    /// Parse and compile a schema document
    pub fn parse(id: impl Into<String>, text: &str) -> Result<Self> {
        let id = id.into();
        let doc = XmlDocument::parse(text).map_err(|source| ValidationFailure::SchemaSyntax {
            id: id.clone(),
            source,
        })?;
        debug!("Compiling schema {}", id);
        Compiler::new(&id, &doc).compile()
    }

    /// Identity of the schema (the resource id it was loaded from)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Target namespace, if any
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Names of the global element declarations, in declaration order
    pub fn root_elements(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(|id| self.elements[id.0].name.as_str())
    }

    pub(crate) fn root(&self, namespace: Option<&str>, local: &str) -> Option<ElementId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.elements[id.0].matches(namespace, local))
    }

    pub(crate) fn root_by_local_name(&self, local: &str) -> Option<ElementId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.elements[id.0].name == local)
    }

    pub(crate) fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.0]
    }

    pub(crate) fn element(&self, id: ElementId) -> &ElementDecl {
        &self.elements[id.0]
    }
}

#[derive(Debug, Default)]
struct AttributeSet {
    uses: Vec<AttributeUse>,
    any: bool,
}

impl AttributeSet {
    fn insert(&mut self, attribute: AttributeUse) {
        self.remove(&attribute.name);
        self.uses.push(attribute);
    }

    fn remove(&mut self, name: &str) {
        self.uses.retain(|u| u.name != name);
    }
}

struct Compiler<'a> {
    id: &'a str,
    doc: &'a XmlDocument,
    target_namespace: Option<String>,
    qualified_elements: bool,
    raw_types: HashMap<&'a str, NodeId>,
    raw_elements: HashMap<&'a str, NodeId>,
    raw_attributes: HashMap<&'a str, NodeId>,
    raw_attribute_groups: HashMap<&'a str, NodeId>,
    types: Vec<Option<TypeDef>>,
    elements: Vec<ElementDecl>,
    named_types: HashMap<String, TypeId>,
    global_elements: HashMap<String, ElementId>,
    builtin_types: HashMap<Builtin, TypeId>,
    expanding_groups: HashSet<String>,
    any_type: TypeId,
}

impl<'a> Compiler<'a> {
    fn new(id: &'a str, doc: &'a XmlDocument) -> Self {
        Self {
            id,
            doc,
            target_namespace: None,
            qualified_elements: false,
            raw_types: HashMap::new(),
            raw_elements: HashMap::new(),
            raw_attributes: HashMap::new(),
            raw_attribute_groups: HashMap::new(),
            types: vec![Some(TypeDef::AnyType)],
            elements: Vec::new(),
            named_types: HashMap::new(),
            global_elements: HashMap::new(),
            builtin_types: HashMap::new(),
            expanding_groups: HashSet::new(),
            any_type: TypeId(0),
        }
    }

    fn compile(mut self) -> Result<Schema> {
        let doc = self.doc;
        let root = doc.document_element().ok_or_else(|| ValidationFailure::Schema {
            id: self.id.to_string(),
            message: "schema document is empty".to_string(),
        })?;
        if !self.is_xs(root, "schema") {
            return Err(self.error(root, "root element must be xs:schema"));
        }
        self.target_namespace = self
            .attr(root, "targetNamespace")
            .filter(|ns| !ns.is_empty())
            .map(str::to_string);
        self.qualified_elements = self.attr(root, "elementFormDefault") == Some("qualified");

        let mut order = Vec::new();
        for child in self.xs_children(root)? {
            let local = self.local(child);
            if !matches!(
                local,
                "element" | "complexType" | "simpleType" | "attribute" | "attributeGroup"
            ) {
                return Err(self.unsupported(child));
            }
            let name = match doc.attribute(child, "name") {
                Some(name) => name,
                None => return Err(self.error(child, format!("global xs:{} needs a name", local))),
            };
            let table = match local {
                "element" => &mut self.raw_elements,
                "attribute" => &mut self.raw_attributes,
                "attributeGroup" => &mut self.raw_attribute_groups,
                _ => &mut self.raw_types,
            };
            if table.insert(name, child).is_some() {
                return Err(self.error(child, format!("duplicate global xs:{} '{}'", local, name)));
            }
            if local == "element" {
                order.push((name, child));
            }
        }

        let mut roots = Vec::with_capacity(order.len());
        for (name, node) in order {
            roots.push(self.global_element(name, node)?);
        }

        let mut type_names: Vec<(&str, NodeId)> =
            self.raw_types.iter().map(|(k, v)| (*k, *v)).collect();
        type_names.sort();
        for (name, node) in type_names {
            self.named_type(name, node)?;
        }

        let mut types = Vec::with_capacity(self.types.len());
        for def in self.types {
            match def {
                Some(def) => types.push(def),
                None => {
                    return Err(ValidationFailure::Schema {
                        id: self.id.to_string(),
                        message: "circular type definition".to_string(),
                    })
                }
            }
        }

        debug!(
            "Compiled schema {} ({} types, {} elements)",
            self.id,
            types.len(),
            self.elements.len()
        );
        Ok(Schema {
            id: self.id.to_string(),
            target_namespace: self.target_namespace,
            types,
            elements: self.elements,
            roots,
        })
    }

    // --- helpers ---

    fn error(&self, node: NodeId, message: impl Into<String>) -> ValidationFailure {
        let message = message.into();
        let message = match self.doc.position(node) {
            Some(position) => format!("{} (at {})", message, position),
            None => message,
        };
        ValidationFailure::Schema {
            id: self.id.to_string(),
            message,
        }
    }

    fn unsupported(&self, node: NodeId) -> ValidationFailure {
        let name = self
            .doc
            .name(node)
            .map(|n| n.qualified())
            .unwrap_or_default();
        self.error(node, format!("unsupported schema construct <{}>", name))
    }

    fn is_xs(&self, node: NodeId, local: &str) -> bool {
        self.doc
            .name(node)
            .map_or(false, |name| name.is(Some(XSD_NAMESPACE), local))
    }

    fn local(&self, node: NodeId) -> &'a str {
        let doc = self.doc;
        doc.name(node).map(|name| name.local.as_str()).unwrap_or("")
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&'a str> {
        let doc = self.doc;
        doc.attribute(node, name)
    }

    fn required_attr(&self, node: NodeId, name: &str) -> Result<&'a str> {
        self.attr(node, name).ok_or_else(|| {
            self.error(
                node,
                format!("xs:{} is missing attribute '{}'", self.local(node), name),
            )
        })
    }

    /// Schema children of `node`, skipping annotations
    fn xs_children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut children = Vec::new();
        for child in self.doc.child_elements(node) {
            let in_xsd = self
                .doc
                .name(child)
                .map_or(false, |name| name.namespace.as_deref() == Some(XSD_NAMESPACE));
            if !in_xsd {
                return Err(self.unsupported(child));
            }
            if self.local(child) != "annotation" {
                children.push(child);
            }
        }
        Ok(children)
    }

    fn count(&self, node: NodeId, value: &str) -> Result<usize> {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| self.error(node, format!("'{}' is not a valid count", value)))
    }

    fn alloc(&mut self, def: Option<TypeDef>) -> TypeId {
        self.types.push(def);
        TypeId(self.types.len() - 1)
    }

    fn builtin_type(&mut self, builtin: Builtin) -> TypeId {
        if let Some(id) = self.builtin_types.get(&builtin) {
            return *id;
        }
        let id = self.alloc(Some(TypeDef::Simple(SimpleType {
            name: builtin.name().to_string(),
            variety: Variety::Builtin(builtin),
            facets: Facets::default(),
        })));
        self.builtin_types.insert(builtin, id);
        id
    }

    fn is_pending(&self, id: TypeId) -> bool {
        self.types[id.0].is_none()
    }

    fn is_complex(&self, id: TypeId) -> bool {
        matches!(
            self.types[id.0],
            Some(TypeDef::Complex(_)) | Some(TypeDef::AnyType)
        )
    }

    // --- types ---

    fn resolve_type_ref(&mut self, node: NodeId, qname: &str) -> Result<TypeId> {
        let doc = self.doc;
        let (prefix, local) = qname.split_once(':').unwrap_or(("", qname));
        let namespace = doc.lookup_namespace(node, prefix);
        if !prefix.is_empty() && namespace.is_none() {
            return Err(self.error(node, format!("unbound prefix in type '{}'", qname)));
        }
        if namespace == Some(XSD_NAMESPACE) {
            if local == "anyType" {
                return Ok(self.any_type);
            }
            return match Builtin::from_name(local) {
                Some(builtin) => Ok(self.builtin_type(builtin)),
                None => Err(self.error(node, format!("unsupported built-in type '{}'", qname))),
            };
        }
        if namespace != self.target_namespace.as_deref() {
            return Err(self.error(node, format!("type '{}' is not defined by this schema", qname)));
        }
        self.named_type(local, node)
    }

    fn named_type(&mut self, name: &str, referrer: NodeId) -> Result<TypeId> {
        if let Some(id) = self.named_types.get(name) {
            return Ok(*id);
        }
        let node = match self.raw_types.get(name) {
            Some(node) => *node,
            None => return Err(self.error(referrer, format!("unknown type '{}'", name))),
        };
        let id = self.alloc(None);
        self.named_types.insert(name.to_string(), id);
        let def = self.type_definition(node, name)?;
        self.types[id.0] = Some(def);
        Ok(id)
    }

    fn anonymous_type(&mut self, node: NodeId, label: &str) -> Result<TypeId> {
        let id = self.alloc(None);
        let def = self.type_definition(node, label)?;
        self.types[id.0] = Some(def);
        Ok(id)
    }

    fn type_definition(&mut self, node: NodeId, name: &str) -> Result<TypeDef> {
        if self.is_xs(node, "complexType") {
            Ok(TypeDef::Complex(self.complex_type(node)?))
        } else {
            Ok(TypeDef::Simple(self.simple_type(node, name)?))
        }
    }

    fn simple_base(&mut self, node: NodeId, qname: &str) -> Result<TypeId> {
        let base = self.resolve_type_ref(node, qname)?;
        if self.is_pending(base) {
            return Err(self.error(node, format!("circular simple type '{}'", qname)));
        }
        if self.is_complex(base) {
            return Err(self.error(node, format!("'{}' is not a simple type", qname)));
        }
        Ok(base)
    }

    fn simple_type(&mut self, node: NodeId, name: &str) -> Result<SimpleType> {
        let children = self.xs_children(node)?;
        let derivation = match children.as_slice() {
            [single] => *single,
            _ => {
                return Err(self.error(
                    node,
                    "xs:simpleType needs exactly one of xs:restriction, xs:list or xs:union",
                ))
            }
        };
        let mut facets = Facets::default();
        let variety = match self.local(derivation) {
            "restriction" => {
                let mut base = match self.attr(derivation, "base") {
                    Some(qname) => Some(self.simple_base(derivation, qname)?),
                    None => None,
                };
                let mut patterns = Vec::new();
                for facet in self.xs_children(derivation)? {
                    let local = self.local(facet);
                    if local == "simpleType" {
                        if base.is_some() {
                            return Err(self.error(facet, "restriction has both a base and an inline type"));
                        }
                        base = Some(self.anonymous_type(facet, name)?);
                        continue;
                    }
                    let value = self.required_attr(facet, "value")?;
                    match local {
                        "enumeration" => facets.enumeration.push(value.to_string()),
                        "pattern" => patterns.push(translate_pattern(value)),
                        "length" => facets.length = Some(self.count(facet, value)?),
                        "minLength" => facets.min_length = Some(self.count(facet, value)?),
                        "maxLength" => facets.max_length = Some(self.count(facet, value)?),
                        "totalDigits" => facets.total_digits = Some(self.count(facet, value)?),
                        "fractionDigits" => facets.fraction_digits = Some(self.count(facet, value)?),
                        "minInclusive" => facets.min_inclusive = Some(Bound::parse(value)),
                        "maxInclusive" => facets.max_inclusive = Some(Bound::parse(value)),
                        "minExclusive" => facets.min_exclusive = Some(Bound::parse(value)),
                        "maxExclusive" => facets.max_exclusive = Some(Bound::parse(value)),
                        "whiteSpace" => {
                            facets.white_space = Some(WhiteSpace::parse(value).ok_or_else(|| {
                                self.error(facet, format!("invalid whiteSpace '{}'", value))
                            })?)
                        }
                        _ => return Err(self.unsupported(facet)),
                    }
                }
                if !patterns.is_empty() {
                    let source = format!("^(?:{})$", patterns.join("|"));
                    let regex = Regex::new(&source).map_err(|e| {
                        self.error(derivation, format!("invalid pattern facet: {}", e))
                    })?;
                    facets.pattern = Some(regex);
                }
                match base {
                    Some(base) => Variety::Restriction(base),
                    None => return Err(self.error(derivation, "xs:restriction needs a base type")),
                }
            }
            "list" => {
                let inline = self.xs_children(derivation)?;
                let item = match (self.attr(derivation, "itemType"), inline.as_slice()) {
                    (Some(qname), []) => self.simple_base(derivation, qname)?,
                    (None, [item]) if self.is_xs(*item, "simpleType") => {
                        self.anonymous_type(*item, name)?
                    }
                    _ => return Err(self.error(derivation, "xs:list needs exactly one item type")),
                };
                Variety::List(item)
            }
            "union" => {
                let mut members = Vec::new();
                if let Some(list) = self.attr(derivation, "memberTypes") {
                    for qname in list.split_whitespace() {
                        members.push(self.simple_base(derivation, qname)?);
                    }
                }
                for inline in self.xs_children(derivation)? {
                    if !self.is_xs(inline, "simpleType") {
                        return Err(self.unsupported(inline));
                    }
                    members.push(self.anonymous_type(inline, name)?);
                }
                if members.is_empty() {
                    return Err(self.error(derivation, "xs:union needs member types"));
                }
                Variety::Union(members)
            }
            _ => return Err(self.unsupported(derivation)),
        };
        Ok(SimpleType {
            name: name.to_string(),
            variety,
            facets,
        })
    }

    fn complex_type(&mut self, node: NodeId) -> Result<ComplexType> {
        let mixed = is_true(self.attr(node, "mixed"));
        let children = self.xs_children(node)?;
        match children.first().map(|c| self.local(*c)) {
            Some("simpleContent") => self.simple_content(children[0]),
            Some("complexContent") => {
                let mixed = match self.attr(children[0], "mixed") {
                    Some(value) => is_true(Some(value)),
                    None => mixed,
                };
                self.complex_content(children[0], mixed)
            }
            _ => {
                let (particle, attributes) = self.content_model(&children)?;
                Ok(ComplexType {
                    content: element_content(particle, mixed),
                    attributes: attributes.uses,
                    any_attribute: attributes.any,
                })
            }
        }
    }

    fn derivation(&self, node: NodeId) -> Result<(NodeId, &'a str)> {
        let children = self.xs_children(node)?;
        let derivation = match children.as_slice() {
            [single] => *single,
            _ => return Err(self.error(node, "expected a single xs:extension")),
        };
        if !self.is_xs(derivation, "extension") {
            return Err(self.unsupported(derivation));
        }
        Ok((derivation, self.required_attr(derivation, "base")?))
    }

    fn simple_content(&mut self, node: NodeId) -> Result<ComplexType> {
        let (extension, base_name) = self.derivation(node)?;
        let base = self.resolve_type_ref(extension, base_name)?;
        let (value_type, mut attributes) = match &self.types[base.0] {
            Some(TypeDef::Simple(_)) => (base, AttributeSet::default()),
            Some(TypeDef::Complex(ComplexType {
                content: Content::Simple(value_type),
                attributes,
                any_attribute,
                ..
            })) => (
                *value_type,
                AttributeSet {
                    uses: attributes.clone(),
                    any: *any_attribute,
                },
            ),
            None => {
                return Err(self.error(extension, format!("circular base type '{}'", base_name)))
            }
            _ => {
                return Err(self.error(
                    extension,
                    format!("'{}' has no simple content to extend", base_name),
                ))
            }
        };
        for child in self.xs_children(extension)? {
            self.attribute_decl(child, &mut attributes)?;
        }
        Ok(ComplexType {
            content: Content::Simple(value_type),
            attributes: attributes.uses,
            any_attribute: attributes.any,
        })
    }

    fn complex_content(&mut self, node: NodeId, mixed: bool) -> Result<ComplexType> {
        let (extension, base_name) = self.derivation(node)?;
        let base = self.resolve_type_ref(extension, base_name)?;
        let (base_particle, mut attributes) = match &self.types[base.0] {
            Some(TypeDef::AnyType) => (None, AttributeSet::default()),
            Some(TypeDef::Complex(ct)) => {
                let particle = match &ct.content {
                    Content::Elements { particle, .. } => Some(particle.clone()),
                    Content::Empty => None,
                    Content::Simple(_) => {
                        return Err(self.error(
                            extension,
                            format!("'{}' has simple content; use xs:simpleContent", base_name),
                        ))
                    }
                };
                let set = AttributeSet {
                    uses: ct.attributes.clone(),
                    any: ct.any_attribute,
                };
                (particle, set)
            }
            None => {
                return Err(self.error(extension, format!("circular base type '{}'", base_name)))
            }
            Some(TypeDef::Simple(_)) => {
                return Err(self.error(
                    extension,
                    format!("'{}' is a simple type; use xs:simpleContent", base_name),
                ))
            }
        };
        let children = self.xs_children(extension)?;
        let (own_particle, own_attributes) = self.content_model(&children)?;
        for attribute in own_attributes.uses {
            attributes.insert(attribute);
        }
        attributes.any |= own_attributes.any;

        let particle = match (base_particle, own_particle) {
            (Some(base), Some(own)) => Some(Particle {
                min: 1,
                max: Some(1),
                term: Term::Sequence(vec![base, own]),
            }),
            (base, own) => base.or(own),
        };
        Ok(ComplexType {
            content: element_content(particle, mixed),
            attributes: attributes.uses,
            any_attribute: attributes.any,
        })
    }

    /// An optional model group followed by attribute declarations
    fn content_model(&mut self, children: &[NodeId]) -> Result<(Option<Particle>, AttributeSet)> {
        let mut particle = None;
        let mut attributes = AttributeSet::default();
        let mut seen_attribute = false;
        for child in children.iter().copied() {
            match self.local(child) {
                "sequence" | "choice" | "all" => {
                    if particle.is_some() || seen_attribute {
                        return Err(self.error(child, "model group must come first and only once"));
                    }
                    particle = Some(self.particle(child)?);
                }
                "attribute" | "attributeGroup" | "anyAttribute" => {
                    seen_attribute = true;
                    self.attribute_decl(child, &mut attributes)?;
                }
                _ => return Err(self.unsupported(child)),
            }
        }
        Ok((particle, attributes))
    }

    // --- attributes ---

    fn attribute_decl(&mut self, node: NodeId, set: &mut AttributeSet) -> Result<()> {
        match self.local(node) {
            "anyAttribute" => {
                set.any = true;
                Ok(())
            }
            "attributeGroup" => {
                let reference = self.required_attr(node, "ref")?;
                let local = local_part(reference);
                let group = match self.raw_attribute_groups.get(local) {
                    Some(group) => *group,
                    None => {
                        return Err(self.error(node, format!("unknown attribute group '{}'", reference)))
                    }
                };
                if !self.expanding_groups.insert(local.to_string()) {
                    return Err(self.error(node, format!("circular attribute group '{}'", reference)));
                }
                for child in self.xs_children(group)? {
                    self.attribute_decl(child, set)?;
                }
                self.expanding_groups.remove(local);
                Ok(())
            }
            "attribute" => self.attribute(node, set),
            _ => Err(self.unsupported(node)),
        }
    }

    fn attribute(&mut self, node: NodeId, set: &mut AttributeSet) -> Result<()> {
        let usage = self.attr(node, "use").unwrap_or("optional");
        let (name, namespace, declaration) = match self.attr(node, "ref") {
            Some(reference) => {
                let local = local_part(reference);
                let global = match self.raw_attributes.get(local) {
                    Some(global) => *global,
                    None => {
                        return Err(self.error(node, format!("unknown attribute '{}'", reference)))
                    }
                };
                (local, self.target_namespace.clone(), global)
            }
            None => {
                let name = self.required_attr(node, "name")?;
                let namespace = if self.attr(node, "form") == Some("qualified") {
                    self.target_namespace.clone()
                } else {
                    None
                };
                (name, namespace, node)
            }
        };

        let required = match usage {
            "required" => true,
            "optional" => false,
            "prohibited" => {
                set.remove(name);
                return Ok(());
            }
            other => return Err(self.error(node, format!("invalid attribute use '{}'", other))),
        };
        let ty = self.attribute_type(declaration)?;
        let fixed = self
            .attr(node, "fixed")
            .or_else(|| self.attr(declaration, "fixed"))
            .map(str::to_string);
        set.insert(AttributeUse {
            name: name.to_string(),
            namespace,
            ty,
            required,
            fixed,
        });
        Ok(())
    }

    fn attribute_type(&mut self, node: NodeId) -> Result<TypeId> {
        let inline = self.xs_children(node)?;
        match (self.attr(node, "type"), inline.as_slice()) {
            (Some(qname), []) => {
                let ty = self.resolve_type_ref(node, qname)?;
                if self.is_complex(ty) {
                    return Err(self.error(node, format!("attribute type '{}' is not simple", qname)));
                }
                Ok(ty)
            }
            (None, [simple]) if self.is_xs(*simple, "simpleType") => {
                let name = self.attr(node, "name").unwrap_or("attribute");
                self.anonymous_type(*simple, name)
            }
            (None, []) => Ok(self.builtin_type(Builtin::AnySimpleType)),
            _ => Err(self.error(node, "attribute needs a single simple type")),
        }
    }

    // --- particles ---

    fn occurs(&self, node: NodeId) -> Result<(u32, Option<u32>)> {
        let min = match self.attr(node, "minOccurs") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map_err(|_| self.error(node, format!("invalid minOccurs '{}'", value)))?,
            None => 1,
        };
        let max = match self.attr(node, "maxOccurs") {
            Some("unbounded") => None,
            Some(value) => Some(
                value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| self.error(node, format!("invalid maxOccurs '{}'", value)))?,
            ),
            None => Some(1),
        };
        if let Some(max) = max {
            if max < min {
                return Err(self.error(node, "maxOccurs is smaller than minOccurs"));
            }
        }
        Ok((min, max))
    }

    fn particle(&mut self, node: NodeId) -> Result<Particle> {
        let (min, max) = self.occurs(node)?;
        let term = match self.local(node) {
            "element" => Term::Element(self.local_element(node)?),
            "sequence" => Term::Sequence(self.particles(node)?),
            "choice" => Term::Choice(self.particles(node)?),
            "all" => {
                let members = self.particles(node)?;
                let valid = members
                    .iter()
                    .all(|p| matches!(p.term, Term::Element(_)) && p.max.map_or(false, |m| m <= 1));
                if !valid {
                    return Err(self.error(node, "xs:all members must be elements occurring at most once"));
                }
                Term::All(members)
            }
            "any" => Term::Any(self.wildcard(node)?),
            _ => return Err(self.unsupported(node)),
        };
        Ok(Particle { min, max, term })
    }

    fn particles(&mut self, node: NodeId) -> Result<Vec<Particle>> {
        let mut particles = Vec::new();
        for child in self.xs_children(node)? {
            particles.push(self.particle(child)?);
        }
        Ok(particles)
    }

    fn wildcard(&self, node: NodeId) -> Result<Wildcard> {
        let process = match self.attr(node, "processContents").unwrap_or("strict") {
            "strict" => ProcessContents::Strict,
            "lax" => ProcessContents::Lax,
            "skip" => ProcessContents::Skip,
            other => return Err(self.error(node, format!("invalid processContents '{}'", other))),
        };
        let namespaces = match self.attr(node, "namespace").unwrap_or("##any").trim() {
            "##any" => NamespaceConstraint::Any,
            "##other" => NamespaceConstraint::Other(self.target_namespace.clone()),
            list => NamespaceConstraint::Listed(
                list.split_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => self.target_namespace.clone(),
                        "##local" => None,
                        uri => Some(uri.to_string()),
                    })
                    .collect(),
            ),
        };
        Ok(Wildcard {
            namespaces,
            process,
        })
    }

    // --- elements ---

    fn global_element(&mut self, name: &str, referrer: NodeId) -> Result<ElementId> {
        if let Some(id) = self.global_elements.get(name) {
            return Ok(*id);
        }
        let node = match self.raw_elements.get(name) {
            Some(node) => *node,
            None => return Err(self.error(referrer, format!("unknown element '{}'", name))),
        };
        let id = self.push_element(node, name, self.target_namespace.clone());
        self.global_elements.insert(name.to_string(), id);
        self.finish_element(id, node, name)?;
        Ok(id)
    }

    fn local_element(&mut self, node: NodeId) -> Result<ElementId> {
        if let Some(reference) = self.attr(node, "ref") {
            return self.global_element(local_part(reference), node);
        }
        let name = self.required_attr(node, "name")?;
        let qualified = match self.attr(node, "form") {
            Some("qualified") => true,
            Some("unqualified") => false,
            _ => self.qualified_elements,
        };
        let namespace = if qualified {
            self.target_namespace.clone()
        } else {
            None
        };
        let id = self.push_element(node, name, namespace);
        self.finish_element(id, node, name)?;
        Ok(id)
    }

    fn push_element(&mut self, node: NodeId, name: &str, namespace: Option<String>) -> ElementId {
        let decl = ElementDecl {
            name: name.to_string(),
            namespace,
            ty: self.any_type,
            fixed: self.attr(node, "fixed").map(str::to_string),
            nillable: is_true(self.attr(node, "nillable")),
        };
        self.elements.push(decl);
        ElementId(self.elements.len() - 1)
    }

    fn finish_element(&mut self, id: ElementId, node: NodeId, name: &str) -> Result<()> {
        let mut inline = None;
        for child in self.xs_children(node)? {
            match self.local(child) {
                "complexType" | "simpleType" if inline.is_none() => inline = Some(child),
                "unique" | "key" | "keyref" => {
                    debug!("Identity constraint on element {} is not enforced", name)
                }
                _ => return Err(self.unsupported(child)),
            }
        }
        let ty = match (self.attr(node, "type"), inline) {
            (Some(_), Some(_)) => {
                return Err(self.error(node, format!("element '{}' has both a type and an inline type", name)))
            }
            (Some(qname), None) => self.resolve_type_ref(node, qname)?,
            (None, Some(inline)) => self.anonymous_type(inline, name)?,
            (None, None) => self.any_type,
        };
        self.elements[id.0].ty = ty;
        Ok(())
    }
}

fn element_content(particle: Option<Particle>, mixed: bool) -> Content {
    match particle {
        Some(particle) => Content::Elements { particle, mixed },
        None if mixed => Content::Elements {
            particle: Particle {
                min: 1,
                max: Some(1),
                term: Term::Sequence(Vec::new()),
            },
            mixed: true,
        },
        None => Content::Empty,
    }
}

fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true") | Some("1"))
}

fn local_part(qname: &str) -> &str {
    qname.split_once(':').map_or(qname, |(_, local)| local)
}

/// Rewrite the schema-only character classes `\i` and `\c`
fn translate_pattern(pattern: &str) -> String {
    pattern
        .replace(r"\i", r"[\p{L}_:]")
        .replace(r"\c", r"[\w.\-:]")
}
