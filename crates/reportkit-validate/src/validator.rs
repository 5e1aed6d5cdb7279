//! Instance validation against a compiled [`Schema`]

use std::cmp::Ordering;

use reportkit_core::xml::XML_NAMESPACE;
use reportkit_core::{Location, NodeId, NodeKind, ValidationError, ViolationKind, XmlDocument};

use crate::builtin::WhiteSpace;
use crate::schema::{
    ComplexType, Content, ElementId, Particle, ProcessContents, Schema, SimpleType, Term, TypeDef,
    TypeId, Variety, Wildcard, XSI_NAMESPACE,
};

/// Why a content model stopped matching
#[derive(Debug, Clone)]
struct Mismatch {
    at: usize,
    expected: Vec<String>,
}

impl Mismatch {
    fn new(at: usize, expected: String) -> Self {
        Self {
            at,
            expected: vec![expected],
        }
    }

    /// Keep the deepest failure, merging alternatives that failed at the same child
    fn merge(self, other: Mismatch) -> Mismatch {
        match self.at.cmp(&other.at) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal => {
                let mut expected = self.expected;
                for name in other.expected {
                    if !expected.contains(&name) {
                        expected.push(name);
                    }
                }
                Mismatch { at: self.at, expected }
            }
        }
    }

    fn describe(&self) -> String {
        match self.expected.as_slice() {
            [] => String::from("nothing"),
            [one] => one.clone(),
            many => format!("one of {}", many.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Assignment<'s> {
    Element(ElementId),
    Wildcard(&'s Wildcard),
}

/// Validate `document` against `schema`, returning violations in traversal order
pub(crate) fn validate(schema: &Schema, document: &XmlDocument) -> Vec<ValidationError> {
    let mut run = Run {
        schema,
        doc: document,
        errors: Vec::new(),
    };
    run.root();
    run.errors
}

struct Run<'s, 'd> {
    schema: &'s Schema,
    doc: &'d XmlDocument,
    errors: Vec<ValidationError>,
}

impl<'s, 'd> Run<'s, 'd> {
    fn report(&mut self, node: NodeId, kind: ViolationKind, message: String) {
        let path = self.doc.path(node);
        let location = match self.doc.position(node) {
            Some(position) => Location::at(position).with_path(path),
            None => Location::path(path),
        };
        self.errors.push(
            ValidationError::new(kind, message)
                .with_location(location)
                .with_source(self.schema.id()),
        );
    }

    fn qualified(&self, node: NodeId) -> String {
        self.doc.name(node).map(|n| n.qualified()).unwrap_or_default()
    }

    fn root(&mut self) {
        let Some(root) = self.doc.document_element() else {
            return;
        };
        let Some(name) = self.doc.name(root) else {
            return;
        };
        let namespace = name.namespace.as_deref();
        if let Some(decl) = self.schema.root(namespace, &name.local) {
            self.element(root, decl);
            return;
        }
        if let Some(decl) = self.schema.root_by_local_name(&name.local) {
            let expected = self.schema.element(decl).namespace.clone();
            let message = format!(
                "root element '{}' is in namespace '{}' but the schema declares it in '{}'",
                name.local,
                namespace.unwrap_or(""),
                expected.as_deref().unwrap_or("")
            );
            self.report(root, ViolationKind::NamespaceMismatch, message);
            return;
        }
        let declared: Vec<String> = self
            .schema
            .root_elements()
            .map(|n| format!("'{}'", n))
            .collect();
        let message = format!(
            "no declaration for root element '{}' (declared: {})",
            name.qualified(),
            if declared.is_empty() {
                String::from("none")
            } else {
                declared.join(", ")
            }
        );
        self.report(root, ViolationKind::UndeclaredElement, message);
    }

    fn element(&mut self, node: NodeId, decl_id: ElementId) {
        let schema = self.schema;
        let decl = schema.element(decl_id);

        if decl.nillable && self.xsi_attribute(node, "nil") == Some("true") {
            if self.doc.children(node).iter().any(|c| !self.is_blank(*c)) {
                let message = format!("nil element '{}' must be empty", self.qualified(node));
                self.report(node, ViolationKind::UnexpectedElement, message);
            }
            return;
        }

        match schema.type_def(decl.ty) {
            TypeDef::AnyType => {}
            TypeDef::Simple(_) => {
                self.attributes(node, None);
                self.simple_content(node, decl.ty, decl.fixed.as_deref());
            }
            TypeDef::Complex(ct) => {
                self.attributes(node, Some(ct));
                match &ct.content {
                    Content::Empty => {
                        for child in self.doc.child_elements(node).collect::<Vec<_>>() {
                            let message = format!(
                                "element '{}' is not allowed; '{}' must be empty",
                                self.qualified(child),
                                self.qualified(node)
                            );
                            self.report(child, ViolationKind::UnexpectedElement, message);
                        }
                        self.element_only_text(node);
                    }
                    Content::Simple(value_type) => {
                        self.simple_content(node, *value_type, decl.fixed.as_deref());
                    }
                    Content::Elements { particle, mixed } => {
                        if !mixed {
                            self.element_only_text(node);
                        }
                        self.children(node, particle);
                    }
                }
            }
        }
    }

    fn is_blank(&self, node: NodeId) -> bool {
        match self.doc.kind(node) {
            NodeKind::Text(text) => text.trim().is_empty(),
            NodeKind::Comment(_) => true,
            _ => false,
        }
    }

    fn xsi_attribute(&self, node: NodeId, local: &str) -> Option<&'d str> {
        let doc = self.doc;
        doc.attributes(node).iter().find_map(|attr| match doc.kind(*attr) {
            NodeKind::Attribute(data) if data.name.is(Some(XSI_NAMESPACE), local) => {
                Some(data.value.as_str())
            }
            _ => None,
        })
    }

    fn element_only_text(&mut self, node: NodeId) {
        let has_text = self.doc.children(node).iter().any(|child| {
            matches!(self.doc.kind(*child), NodeKind::Text(text) if !text.trim().is_empty())
        });
        if has_text {
            let message = format!(
                "element '{}' cannot contain character data",
                self.qualified(node)
            );
            self.report(node, ViolationKind::UnexpectedText, message);
        }
    }

    fn simple_content(&mut self, node: NodeId, ty: TypeId, fixed: Option<&str>) {
        let children: Vec<NodeId> = self.doc.child_elements(node).collect();
        for child in &children {
            let message = format!(
                "element '{}' is not allowed in the simple content of '{}'",
                self.qualified(*child),
                self.qualified(node)
            );
            self.report(*child, ViolationKind::UnexpectedElement, message);
        }
        if !children.is_empty() {
            return;
        }
        let value = self.doc.string_value(node);
        let what = format!("element '{}'", self.qualified(node));
        self.check_value(node, ty, &value, fixed, &what);
    }

    fn check_value(&mut self, node: NodeId, ty: TypeId, raw: &str, fixed: Option<&str>, what: &str) {
        if let Err(reason) = self.check_simple(ty, raw) {
            self.report(
                node,
                ViolationKind::InvalidValue,
                format!("invalid value for {}: {}", what, reason),
            );
            return;
        }
        if let Some(fixed) = fixed {
            let white_space = self.white_space(ty);
            if white_space.apply(raw) != white_space.apply(fixed) {
                self.report(
                    node,
                    ViolationKind::FixedValueMismatch,
                    format!("{} must have the fixed value '{}', found '{}'", what, fixed, raw),
                );
            }
        }
    }

    // --- attributes ---

    fn attributes(&mut self, node: NodeId, ct: Option<&'s ComplexType>) {
        let doc = self.doc;
        for attr in doc.attributes(node).to_vec() {
            let NodeKind::Attribute(data) = doc.kind(attr) else {
                continue;
            };
            let namespace = data.name.namespace.as_deref();
            if namespace == Some(XSI_NAMESPACE) || namespace == Some(XML_NAMESPACE) {
                continue;
            }
            let declared = ct.and_then(|ct| {
                ct.attributes
                    .iter()
                    .find(|u| u.name == data.name.local && u.namespace.as_deref() == namespace)
            });
            match declared {
                Some(usage) => {
                    let what = format!("attribute '{}'", data.name.qualified());
                    self.check_value(node, usage.ty, &data.value, usage.fixed.as_deref(), &what);
                }
                None if ct.map_or(false, |ct| ct.any_attribute) => {}
                None => {
                    let message = format!(
                        "attribute '{}' is not allowed on element '{}'",
                        data.name.qualified(),
                        self.qualified(node)
                    );
                    self.report(node, ViolationKind::UndeclaredAttribute, message);
                }
            }
        }

        let Some(ct) = ct else {
            return;
        };
        for usage in ct.attributes.iter().filter(|u| u.required) {
            let present = doc.attributes(node).iter().any(|attr| match doc.kind(*attr) {
                NodeKind::Attribute(data) => {
                    data.name.local == usage.name
                        && data.name.namespace.as_deref() == usage.namespace.as_deref()
                }
                _ => false,
            });
            if !present {
                let message = format!(
                    "element '{}' is missing required attribute '{}'",
                    self.qualified(node),
                    usage.name
                );
                self.report(node, ViolationKind::MissingAttribute, message);
            }
        }
    }

    // --- simple values ---

    fn simple(&self, ty: TypeId) -> Option<&'s SimpleType> {
        match self.schema.type_def(ty) {
            TypeDef::Simple(st) => Some(st),
            _ => None,
        }
    }

    fn white_space(&self, ty: TypeId) -> WhiteSpace {
        let Some(st) = self.simple(ty) else {
            return WhiteSpace::Preserve;
        };
        if let Some(white_space) = st.facets.white_space {
            return white_space;
        }
        match &st.variety {
            Variety::Builtin(builtin) => builtin.white_space(),
            Variety::Restriction(base) => self.white_space(*base),
            Variety::List(_) | Variety::Union(_) => WhiteSpace::Collapse,
        }
    }

    fn is_list(&self, ty: TypeId) -> bool {
        match self.simple(ty).map(|st| &st.variety) {
            Some(Variety::List(_)) => true,
            Some(Variety::Restriction(base)) => self.is_list(*base),
            _ => false,
        }
    }

    fn check_simple(&self, ty: TypeId, raw: &str) -> Result<(), String> {
        if self.simple(ty).is_none() {
            return Ok(());
        }
        let value = self.white_space(ty).apply(raw);
        self.check_normalized(ty, &value)
    }

    fn check_normalized(&self, ty: TypeId, value: &str) -> Result<(), String> {
        let Some(st) = self.simple(ty) else {
            return Ok(());
        };
        match &st.variety {
            Variety::Builtin(builtin) => builtin.check(value)?,
            Variety::Restriction(base) => self.check_normalized(*base, value)?,
            Variety::List(item) => {
                for token in value.split_whitespace() {
                    self.check_simple(*item, token)?;
                }
            }
            Variety::Union(members) => {
                if !members.iter().any(|m| self.check_simple(*m, value).is_ok()) {
                    return Err(format!(
                        "'{}' matches none of the member types of '{}'",
                        value, st.name
                    ));
                }
            }
        }
        self.check_facets(ty, st, value)
    }

    fn check_facets(&self, ty: TypeId, st: &SimpleType, value: &str) -> Result<(), String> {
        let facets = &st.facets;
        if !facets.enumeration.is_empty() && !facets.enumeration.iter().any(|e| e == value) {
            return Err(format!(
                "'{}' is not one of {}",
                value,
                facets
                    .enumeration
                    .iter()
                    .map(|e| format!("'{}'", e))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        if let Some(pattern) = &facets.pattern {
            if !pattern.is_match(value) {
                return Err(format!("'{}' does not match the pattern of '{}'", value, st.name));
            }
        }

        let length = if self.is_list(ty) {
            value.split_whitespace().count()
        } else {
            value.chars().count()
        };
        if let Some(expected) = facets.length {
            if length != expected {
                return Err(format!("length of '{}' must be {}", value, expected));
            }
        }
        if let Some(min) = facets.min_length {
            if length < min {
                return Err(format!("'{}' is shorter than {}", value, min));
            }
        }
        if let Some(max) = facets.max_length {
            if length > max {
                return Err(format!("'{}' is longer than {}", value, max));
            }
        }

        let bounds = [
            (&facets.min_inclusive, ">=", [Ordering::Greater, Ordering::Equal]),
            (&facets.max_inclusive, "<=", [Ordering::Less, Ordering::Equal]),
            (&facets.min_exclusive, ">", [Ordering::Greater, Ordering::Greater]),
            (&facets.max_exclusive, "<", [Ordering::Less, Ordering::Less]),
        ];
        for (bound, op, allowed) in bounds {
            if let Some(bound) = bound {
                let ok = bound.compare(value).map_or(false, |o| allowed.contains(&o));
                if !ok {
                    return Err(format!("'{}' must be {} {}", value, op, bound));
                }
            }
        }

        if facets.total_digits.is_some() || facets.fraction_digits.is_some() {
            let digits = value.trim_start_matches(['+', '-']);
            let (integral, fraction) = digits.split_once('.').unwrap_or((digits, ""));
            let fraction = fraction.trim_end_matches('0');
            let integral = integral.trim_start_matches('0');
            if let Some(total) = facets.total_digits {
                if integral.len() + fraction.len() > total {
                    return Err(format!("'{}' has more than {} digits", value, total));
                }
            }
            if let Some(max) = facets.fraction_digits {
                if fraction.len() > max {
                    return Err(format!("'{}' has more than {} fraction digits", value, max));
                }
            }
        }
        Ok(())
    }

    // --- content models ---

    fn children(&mut self, node: NodeId, particle: &'s Particle) {
        let kids: Vec<NodeId> = self.doc.child_elements(node).collect();
        let mut assigned = Vec::new();
        let mut soft = None;
        let outcome = self.match_particle(particle, &kids, 0, &mut assigned, &mut soft);

        for (kid, assignment) in assigned {
            match assignment {
                Assignment::Element(decl) => self.element(kid, decl),
                Assignment::Wildcard(wildcard) => self.wildcard(kid, wildcard),
            }
        }

        let failure = match outcome {
            Ok(end) if end == kids.len() => return,
            Ok(end) => match soft {
                Some(soft) if soft.at == end => soft,
                _ => Mismatch {
                    at: end,
                    expected: Vec::new(),
                },
            },
            Err(hard) => match soft {
                Some(soft) => hard.merge(soft),
                None => hard,
            },
        };

        match kids.get(failure.at) {
            Some(kid) => {
                let message = if failure.expected.is_empty() {
                    format!(
                        "element '{}' is not allowed here in '{}'",
                        self.qualified(*kid),
                        self.qualified(node)
                    )
                } else {
                    format!(
                        "element '{}' is not allowed here; expected {}",
                        self.qualified(*kid),
                        failure.describe()
                    )
                };
                self.report(*kid, ViolationKind::UnexpectedElement, message);
            }
            None => {
                let message = format!(
                    "element '{}' is incomplete; expected {}",
                    self.qualified(node),
                    failure.describe()
                );
                self.report(node, ViolationKind::MissingElement, message);
            }
        }
    }

    fn wildcard(&mut self, node: NodeId, wildcard: &Wildcard) {
        if wildcard.process == ProcessContents::Skip {
            return;
        }
        let Some(name) = self.doc.name(node) else {
            return;
        };
        match self.schema.root(name.namespace.as_deref(), &name.local) {
            Some(decl) => self.element(node, decl),
            None if wildcard.process == ProcessContents::Strict => {
                let message = format!("no declaration for element '{}'", name.qualified());
                self.report(node, ViolationKind::UndeclaredElement, message);
            }
            None => {}
        }
    }

    fn record(soft: &mut Option<Mismatch>, mismatch: Mismatch) {
        *soft = Some(match soft.take() {
            Some(previous) => previous.merge(mismatch),
            None => mismatch,
        });
    }

    /// Match `particle` greedily from `pos`, returning the position after it
    fn match_particle(
        &self,
        particle: &'s Particle,
        kids: &[NodeId],
        mut pos: usize,
        out: &mut Vec<(NodeId, Assignment<'s>)>,
        soft: &mut Option<Mismatch>,
    ) -> Result<usize, Mismatch> {
        let mut count = 0u32;
        while particle.max.map_or(true, |max| count < max) {
            let mark = out.len();
            match self.match_term(&particle.term, kids, pos, out, soft) {
                Ok(next) if next > pos => {
                    pos = next;
                    count += 1;
                }
                Ok(_) => {
                    // Empty match: the remaining occurrences are satisfied the same way.
                    count = particle.min.max(count);
                    break;
                }
                Err(mismatch) if mismatch.at > pos => return Err(mismatch),
                Err(mismatch) => {
                    out.truncate(mark);
                    if count >= particle.min {
                        Self::record(soft, mismatch);
                        break;
                    }
                    return Err(mismatch);
                }
            }
        }
        if count < particle.min {
            let expected = self.describe_term(&particle.term);
            return Err(Mismatch::new(pos, expected));
        }
        Ok(pos)
    }

    fn match_term(
        &self,
        term: &'s Term,
        kids: &[NodeId],
        pos: usize,
        out: &mut Vec<(NodeId, Assignment<'s>)>,
        soft: &mut Option<Mismatch>,
    ) -> Result<usize, Mismatch> {
        match term {
            Term::Element(decl) => {
                if kids.get(pos).map_or(false, |kid| self.matches(*kid, *decl)) {
                    out.push((kids[pos], Assignment::Element(*decl)));
                    Ok(pos + 1)
                } else {
                    Err(Mismatch::new(pos, self.describe_term(term)))
                }
            }
            Term::Any(wildcard) => {
                let allowed = kids.get(pos).map_or(false, |kid| {
                    let namespace = self.doc.name(*kid).and_then(|n| n.namespace.as_deref());
                    wildcard.namespaces.allows(namespace)
                });
                if allowed {
                    out.push((kids[pos], Assignment::Wildcard(wildcard)));
                    Ok(pos + 1)
                } else {
                    Err(Mismatch::new(pos, self.describe_term(term)))
                }
            }
            Term::Sequence(particles) => {
                let mut pos = pos;
                for particle in particles {
                    pos = self.match_particle(particle, kids, pos, out, soft)?;
                }
                Ok(pos)
            }
            Term::Choice(alternatives) => {
                let mark = out.len();
                let mut empty = false;
                let mut failure: Option<Mismatch> = None;
                for alternative in alternatives {
                    match self.match_particle(alternative, kids, pos, out, soft) {
                        Ok(next) if next > pos => return Ok(next),
                        Ok(_) => {
                            empty = true;
                            out.truncate(mark);
                        }
                        Err(mismatch) => {
                            out.truncate(mark);
                            failure = Some(match failure {
                                Some(previous) => previous.merge(mismatch),
                                None => mismatch,
                            });
                        }
                    }
                }
                if empty {
                    if let Some(failure) = failure {
                        Self::record(soft, failure);
                    }
                    return Ok(pos);
                }
                Err(failure.unwrap_or_else(|| Mismatch {
                    at: pos,
                    expected: Vec::new(),
                }))
            }
            Term::All(members) => {
                let mut seen = vec![false; members.len()];
                let mut pos = pos;
                'kids: while let Some(kid) = kids.get(pos) {
                    for (index, member) in members.iter().enumerate() {
                        if let Term::Element(decl) = member.term {
                            if !seen[index] && self.matches(*kid, decl) {
                                seen[index] = true;
                                out.push((*kid, Assignment::Element(decl)));
                                pos += 1;
                                continue 'kids;
                            }
                        }
                    }
                    break;
                }
                let missing: Vec<String> = members
                    .iter()
                    .zip(&seen)
                    .filter(|(member, seen)| !**seen && member.min > 0)
                    .map(|(member, _)| self.describe_term(&member.term))
                    .collect();
                if missing.is_empty() {
                    let unmatched: Vec<String> = members
                        .iter()
                        .zip(&seen)
                        .filter(|(_, seen)| !**seen)
                        .map(|(member, _)| self.describe_term(&member.term))
                        .collect();
                    if !unmatched.is_empty() {
                        Self::record(
                            soft,
                            Mismatch {
                                at: pos,
                                expected: unmatched,
                            },
                        );
                    }
                    Ok(pos)
                } else {
                    Err(Mismatch {
                        at: pos,
                        expected: missing,
                    })
                }
            }
        }
    }

    fn matches(&self, node: NodeId, decl: ElementId) -> bool {
        match self.doc.name(node) {
            Some(name) => self
                .schema
                .element(decl)
                .matches(name.namespace.as_deref(), &name.local),
            None => false,
        }
    }

    fn describe_term(&self, term: &Term) -> String {
        match term {
            Term::Element(decl) => format!("'{}'", self.schema.element(*decl).name),
            Term::Any(_) => String::from("any element"),
            Term::Sequence(particles) | Term::Choice(particles) | Term::All(particles) => {
                match particles.first() {
                    Some(first) if matches!(term, Term::Sequence(_)) => {
                        self.describe_term(&first.term)
                    }
                    _ => particles
                        .iter()
                        .map(|p| self.describe_term(&p.term))
                        .collect::<Vec<_>>()
                        .join(" or "),
                }
            }
        }
    }
}
