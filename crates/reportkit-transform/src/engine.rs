//! Stylesheet execution
//!
//! The engine walks the input document, selecting template rules and
//! executing their instructions into a result tree.

use std::cmp::Ordering;

use reportkit_core::{
    ConversionParameters, NodeId, NodeKind, OutputElement, OutputNode, ParamValue, XmlDocument,
};
use tracing::{debug, info, warn};

use crate::error::{Result, TransformError};
use crate::stylesheet::{
    Avt, AvtPart, Binding, BindingValue, Instruction, Sort, Stylesheet, Template,
};
use crate::xpath::{fragment_text, parse_number, Context, Evaluator, Expr, Value, Variables};

/// Nesting limit for template invocations
const MAX_DEPTH: usize = 256;

type Bindings = Vec<(String, Value)>;

/// Run a compiled stylesheet over a document
pub(crate) fn run(
    sheet: &Stylesheet,
    doc: &XmlDocument,
    params: &ConversionParameters,
) -> Result<Vec<OutputNode>> {
    let mut engine = Engine {
        sheet,
        doc,
        globals: Vec::new(),
        depth: 0,
    };
    engine.bind_globals(params)?;
    let mut out = Output::default();
    engine.apply(&[doc.root()], None, &[], &mut out)?;
    Ok(out.nodes)
}

fn param_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Boolean(b) => Value::Boolean(*b),
        ParamValue::Number(n) => Value::Number(*n),
        ParamValue::String(s) => Value::String(s.clone()),
    }
}

struct Scope<'s> {
    globals: &'s [(String, Value)],
    locals: &'s [(String, Value)],
}

impl Variables for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .chain(self.globals.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

/// A result tree under construction
#[derive(Debug, Default)]
struct Output {
    /// Attributes of the element being built, when one is open
    attributes: Option<Vec<(String, String)>>,
    nodes: Vec<OutputNode>,
}

impl Output {
    fn for_element() -> Self {
        Self {
            attributes: Some(Vec::new()),
            nodes: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.nodes.last_mut() {
            Some(OutputNode::Text(last)) => last.push_str(text),
            _ => self.nodes.push(OutputNode::Text(text.to_string())),
        }
    }

    fn push(&mut self, node: OutputNode) {
        match node {
            OutputNode::Text(text) => self.push_text(&text),
            other => self.nodes.push(other),
        }
    }

    fn set_attribute(&mut self, name: String, value: String) {
        match &mut self.attributes {
            Some(attributes) if self.nodes.is_empty() => {
                match attributes.iter_mut().find(|(n, _)| *n == name) {
                    Some(slot) => slot.1 = value,
                    None => attributes.push((name, value)),
                }
            }
            _ => warn!("Ignoring attribute '{}' added after content or outside an element", name),
        }
    }

    fn into_element(self, name: String) -> OutputElement {
        OutputElement {
            name,
            attributes: self.attributes.unwrap_or_default(),
            children: self.nodes,
        }
    }
}

struct Engine<'a> {
    sheet: &'a Stylesheet,
    doc: &'a XmlDocument,
    globals: Bindings,
    depth: usize,
}

impl<'a> Engine<'a> {
    fn evaluate(&self, expr: &Expr, ctx: Context, locals: &[(String, Value)]) -> Result<Value> {
        let scope = Scope {
            globals: &self.globals,
            locals,
        };
        Evaluator::new(self.doc, &scope, ctx.node).evaluate(expr, &ctx)
    }

    fn evaluate_string(&self, expr: &Expr, ctx: Context, locals: &[(String, Value)]) -> Result<String> {
        let value = self.evaluate(expr, ctx, locals)?;
        Ok(self.string(&value, locals))
    }

    fn string(&self, value: &Value, locals: &[(String, Value)]) -> String {
        let scope = Scope {
            globals: &self.globals,
            locals,
        };
        Evaluator::new(self.doc, &scope, self.doc.root()).string(value)
    }

    fn select(&self, expr: &Expr, ctx: Context, locals: &[(String, Value)]) -> Result<Vec<NodeId>> {
        match self.evaluate(expr, ctx, locals)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(TransformError::Runtime(
                "select expression does not evaluate to a node-set".into(),
            )),
        }
    }

    fn avt(&self, avt: &Avt, ctx: Context, locals: &[(String, Value)]) -> Result<String> {
        let mut out = String::new();
        for part in avt {
            match part {
                AvtPart::Literal(text) => out.push_str(text),
                AvtPart::Expr(expr) => out.push_str(&self.evaluate_string(expr, ctx, locals)?),
            }
        }
        Ok(out)
    }

    /// Evaluate top-level bindings in order; supplied parameters replace the
    /// defaults of `xsl:param`
    fn bind_globals(&mut self, params: &ConversionParameters) -> Result<()> {
        let sheet = self.sheet;
        let ctx = Context::single(self.doc.root());
        for global in &sheet.globals {
            let name = &global.binding.name;
            let value = match params.get(name).filter(|_| global.is_param) {
                Some(supplied) => {
                    debug!("Parameter {} = {}", name, supplied);
                    param_value(supplied)
                }
                None => self.binding_value(&global.binding.value, ctx, &mut Vec::new())?,
            };
            self.globals.push((name.clone(), value));
        }
        Ok(())
    }

    fn binding_value(&mut self, value: &'a BindingValue, ctx: Context, locals: &mut Bindings) -> Result<Value> {
        match value {
            BindingValue::Select(expr) => self.evaluate(expr, ctx, locals),
            BindingValue::Content(body) => {
                let mut out = Output::default();
                self.execute(body, ctx, locals, &mut out)?;
                Ok(Value::Fragment(out.nodes))
            }
            BindingValue::Empty => Ok(Value::String(String::new())),
        }
    }

    fn with_params(&mut self, params: &'a [Binding], ctx: Context, locals: &mut Bindings) -> Result<Bindings> {
        let mut values = Vec::with_capacity(params.len());
        for param in params {
            let value = self.binding_value(&param.value, ctx, locals)?;
            values.push((param.name.clone(), value));
        }
        Ok(values)
    }

    /// Process each node with the best matching rule in `mode`
    fn apply(
        &mut self,
        nodes: &[NodeId],
        mode: Option<&str>,
        params: &[(String, Value)],
        out: &mut Output,
    ) -> Result<()> {
        let size = nodes.len();
        for (index, node) in nodes.iter().enumerate() {
            let ctx = Context::new(*node, index + 1, size);
            match self.find_rule(*node, mode)? {
                Some(template) => self.invoke(template, ctx, params, out)?,
                None => self.builtin(ctx, mode, out)?,
            }
        }
        Ok(())
    }

    /// Highest priority wins; among equals the last declared
    fn find_rule(&self, node: NodeId, mode: Option<&str>) -> Result<Option<&'a Template>> {
        let sheet = self.sheet;
        let scope = Scope {
            globals: &self.globals,
            locals: &[],
        };
        let ev = Evaluator::new(self.doc, &scope, node);
        let mut best: Option<(f64, usize)> = None;
        for rule in &sheet.rules {
            if rule.mode.as_deref() != mode {
                continue;
            }
            if best.map_or(false, |(priority, _)| rule.priority < priority) {
                continue;
            }
            if rule.pattern.matches(&ev, node)? {
                best = Some((rule.priority, rule.template));
            }
        }
        Ok(best.map(|(_, template)| &sheet.templates[template]))
    }

    fn builtin(&mut self, ctx: Context, mode: Option<&str>, out: &mut Output) -> Result<()> {
        let doc = self.doc;
        match doc.kind(ctx.node) {
            NodeKind::Root | NodeKind::Element(_) => {
                let children = doc.children(ctx.node).to_vec();
                self.apply(&children, mode, &[], out)
            }
            NodeKind::Text(text) => {
                out.push_text(text);
                Ok(())
            }
            NodeKind::Attribute(attr) => {
                out.push_text(&attr.value);
                Ok(())
            }
            NodeKind::Comment(_) => Ok(()),
        }
    }

    fn invoke(
        &mut self,
        template: &'a Template,
        ctx: Context,
        params: &[(String, Value)],
        out: &mut Output,
    ) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(TransformError::Runtime(format!(
                "template nesting exceeded {} levels",
                MAX_DEPTH
            )));
        }
        self.depth += 1;
        let result = self.invoke_body(template, ctx, params, out);
        self.depth -= 1;
        result
    }

    fn invoke_body(
        &mut self,
        template: &'a Template,
        ctx: Context,
        params: &[(String, Value)],
        out: &mut Output,
    ) -> Result<()> {
        let mut locals = Bindings::new();
        for param in &template.params {
            let value = match params.iter().find(|(name, _)| *name == param.name) {
                Some((_, value)) => value.clone(),
                None => self.binding_value(&param.value, ctx, &mut locals)?,
            };
            locals.push((param.name.clone(), value));
        }
        self.execute(&template.body, ctx, &mut locals, out)
    }

    /// Execute a sequence of instructions; its variables go out of scope at
    /// the end
    fn execute(
        &mut self,
        body: &'a [Instruction],
        ctx: Context,
        locals: &mut Bindings,
        out: &mut Output,
    ) -> Result<()> {
        let mark = locals.len();
        for instruction in body {
            self.instruction(instruction, ctx, locals, out)?;
        }
        locals.truncate(mark);
        Ok(())
    }

    fn instruction(
        &mut self,
        instruction: &'a Instruction,
        ctx: Context,
        locals: &mut Bindings,
        out: &mut Output,
    ) -> Result<()> {
        match instruction {
            Instruction::Text(text) => out.push_text(text),
            Instruction::ValueOf(expr) => {
                let text = self.evaluate_string(expr, ctx, locals)?;
                out.push_text(&text);
            }
            Instruction::LiteralElement {
                name,
                namespaces,
                attributes,
                body,
            } => {
                let mut inner = Output::for_element();
                for (prefix, uri) in namespaces {
                    let attr = if prefix.is_empty() {
                        "xmlns".to_string()
                    } else {
                        format!("xmlns:{}", prefix)
                    };
                    inner.set_attribute(attr, uri.clone());
                }
                for (attr, avt) in attributes {
                    let value = self.avt(avt, ctx, locals)?;
                    inner.set_attribute(attr.clone(), value);
                }
                self.execute(body, ctx, locals, &mut inner)?;
                out.push(OutputNode::Element(inner.into_element(name.clone())));
            }
            Instruction::Element {
                name,
                namespace,
                body,
            } => {
                let name = self.avt(name, ctx, locals)?;
                let mut inner = Output::for_element();
                if let Some(namespace) = namespace {
                    let uri = self.avt(namespace, ctx, locals)?;
                    let attr = match name.split_once(':') {
                        Some((prefix, _)) => format!("xmlns:{}", prefix),
                        None => "xmlns".to_string(),
                    };
                    inner.set_attribute(attr, uri);
                }
                self.execute(body, ctx, locals, &mut inner)?;
                out.push(OutputNode::Element(inner.into_element(name)));
            }
            Instruction::Attribute { name, body } => {
                let name = self.avt(name, ctx, locals)?;
                let value = self.content_text(body, ctx, locals)?;
                out.set_attribute(name, value);
            }
            Instruction::Comment(body) => {
                let text = self.content_text(body, ctx, locals)?;
                out.push(OutputNode::Comment(text));
            }
            Instruction::ApplyTemplates {
                select,
                mode,
                sorts,
                params,
            } => {
                let nodes = match select {
                    Some(expr) => self.select(expr, ctx, locals)?,
                    None => self.doc.children(ctx.node).to_vec(),
                };
                let nodes = self.sorted(nodes, sorts, locals)?;
                let params = self.with_params(params, ctx, locals)?;
                self.apply(&nodes, mode.as_deref(), &params, out)?;
            }
            Instruction::CallTemplate { name, params } => {
                let sheet = self.sheet;
                let template = sheet
                    .named
                    .get(name)
                    .map(|index| &sheet.templates[*index])
                    .ok_or_else(|| TransformError::Runtime(format!("no template named '{}'", name)))?;
                let params = self.with_params(params, ctx, locals)?;
                self.invoke(template, ctx, &params, out)?;
            }
            Instruction::ForEach {
                select,
                sorts,
                body,
            } => {
                let nodes = self.select(select, ctx, locals)?;
                let nodes = self.sorted(nodes, sorts, locals)?;
                let size = nodes.len();
                for (index, node) in nodes.into_iter().enumerate() {
                    self.execute(body, Context::new(node, index + 1, size), locals, out)?;
                }
            }
            Instruction::If { test, body } => {
                if self.evaluate(test, ctx, locals)?.boolean() {
                    self.execute(body, ctx, locals, out)?;
                }
            }
            Instruction::Choose {
                branches,
                otherwise,
            } => {
                let mut chosen = otherwise;
                for (test, body) in branches {
                    if self.evaluate(test, ctx, locals)?.boolean() {
                        chosen = body;
                        break;
                    }
                }
                self.execute(chosen, ctx, locals, out)?;
            }
            Instruction::Copy(body) => self.copy(ctx, body, locals, out)?,
            Instruction::CopyOf(expr) => match self.evaluate(expr, ctx, locals)? {
                Value::Nodes(nodes) => {
                    for node in nodes {
                        self.copy_of(node, true, out);
                    }
                }
                Value::Fragment(nodes) => {
                    for node in nodes {
                        out.push(node);
                    }
                }
                other => {
                    let text = self.string(&other, locals);
                    out.push_text(&text);
                }
            },
            Instruction::Variable(binding) => {
                let value = self.binding_value(&binding.value, ctx, locals)?;
                locals.push((binding.name.clone(), value));
            }
            Instruction::Message { body, terminate } => {
                let text = self.content_text(body, ctx, locals)?;
                if *terminate {
                    return Err(TransformError::Terminated(text));
                }
                info!("xsl:message: {}", text);
            }
        }
        Ok(())
    }

    /// Text produced by instructions, for attributes, comments and messages
    fn content_text(&mut self, body: &'a [Instruction], ctx: Context, locals: &mut Bindings) -> Result<String> {
        let mut inner = Output::default();
        self.execute(body, ctx, locals, &mut inner)?;
        Ok(fragment_text(&inner.nodes))
    }

    fn sorted(&self, nodes: Vec<NodeId>, sorts: &[Sort], locals: &[(String, Value)]) -> Result<Vec<NodeId>> {
        if sorts.is_empty() {
            return Ok(nodes);
        }
        let size = nodes.len();
        let mut keyed = Vec::with_capacity(size);
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context::new(node, index + 1, size);
            let mut keys = Vec::with_capacity(sorts.len());
            for sort in sorts {
                let text = self.evaluate_string(&sort.select, ctx, locals)?;
                keys.push(text);
            }
            keyed.push((node, keys));
        }
        keyed.sort_by(|(_, a), (_, b)| {
            sorts
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(sort, (x, y))| compare_keys(sort, x, y))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(keyed.into_iter().map(|(node, _)| node).collect())
    }

    fn copy(&mut self, ctx: Context, body: &'a [Instruction], locals: &mut Bindings, out: &mut Output) -> Result<()> {
        let doc = self.doc;
        match doc.kind(ctx.node) {
            NodeKind::Root => self.execute(body, ctx, locals, out)?,
            NodeKind::Element(element) => {
                let mut inner = Output::for_element();
                if let Some(uri) = &element.name.namespace {
                    let attr = match &element.name.prefix {
                        Some(prefix) => format!("xmlns:{}", prefix),
                        None => "xmlns".to_string(),
                    };
                    inner.set_attribute(attr, uri.clone());
                }
                self.execute(body, ctx, locals, &mut inner)?;
                out.push(OutputNode::Element(inner.into_element(element.name.qualified())));
            }
            NodeKind::Attribute(attr) => out.set_attribute(attr.name.qualified(), attr.value.clone()),
            NodeKind::Text(text) => out.push_text(text),
            NodeKind::Comment(text) => out.push(OutputNode::Comment(text.clone())),
        }
        Ok(())
    }

    /// Deep copy of an input node; `outermost` elements carry every
    /// namespace in scope
    fn copy_of(&self, node: NodeId, outermost: bool, out: &mut Output) {
        let doc = self.doc;
        match doc.kind(node) {
            NodeKind::Root => {
                for child in doc.children(node) {
                    self.copy_of(*child, true, out);
                }
            }
            NodeKind::Element(element) => {
                let mut inner = Output::for_element();
                let declared = if outermost {
                    doc.in_scope_namespaces(node)
                } else {
                    element.namespace_decls.clone()
                };
                for (prefix, uri) in declared {
                    let attr = if prefix.is_empty() {
                        "xmlns".to_string()
                    } else {
                        format!("xmlns:{}", prefix)
                    };
                    inner.set_attribute(attr, uri);
                }
                for attr in doc.attributes(node) {
                    self.copy_of(*attr, false, &mut inner);
                }
                for child in doc.children(node) {
                    self.copy_of(*child, false, &mut inner);
                }
                out.push(OutputNode::Element(inner.into_element(element.name.qualified())));
            }
            NodeKind::Attribute(attr) => out.set_attribute(attr.name.qualified(), attr.value.clone()),
            NodeKind::Text(text) => out.push_text(text),
            NodeKind::Comment(text) => out.push(OutputNode::Comment(text.clone())),
        }
    }
}

/// Numeric keys order NaN first; text keys compare by code point
fn compare_keys(sort: &Sort, a: &str, b: &str) -> Ordering {
    let ordering = if sort.numeric {
        let x = parse_number(a);
        let y = parse_number(b);
        match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        }
    } else {
        a.cmp(b)
    };
    if sort.descending {
        ordering.reverse()
    } else {
        ordering
    }
}
