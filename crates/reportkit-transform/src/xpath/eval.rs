//! Expression evaluation

use reportkit_core::{NodeId, NodeKind, OutputNode, XmlDocument};

use super::ast::{Axis, Expr, NodeTest, Step};
use super::lexer::Operator;
use crate::error::{Result, TransformError};

/// The result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    /// Nodes of the input document, in document order without duplicates
    Nodes(Vec<NodeId>),
    /// A result tree fragment built by a variable's content
    Fragment(Vec<OutputNode>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub(crate) fn boolean(&self) -> bool {
        match self {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Fragment(_) => true,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }
}

/// In-scope variable bindings
pub(crate) trait Variables {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

/// Dynamic context of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Context {
    pub(crate) node: NodeId,
    pub(crate) position: usize,
    pub(crate) size: usize,
}

impl Context {
    pub(crate) fn new(node: NodeId, position: usize, size: usize) -> Self {
        Self {
            node,
            position,
            size,
        }
    }

    /// A context holding a single node
    pub(crate) fn single(node: NodeId) -> Self {
        Self::new(node, 1, 1)
    }
}

/// XPath number-to-string conversion
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// XPath string-to-number conversion; anything but a plain decimal is NaN
pub(crate) fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

pub(crate) fn fragment_text(nodes: &[OutputNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            OutputNode::Text(text) => out.push_str(text),
            OutputNode::Element(element) => out.push_str(&element.text()),
            OutputNode::Comment(_) => {}
        }
    }
    out
}

fn round_half_up(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

/// Evaluates expressions against one input document
pub(crate) struct Evaluator<'a> {
    pub(crate) doc: &'a XmlDocument,
    pub(crate) vars: &'a dyn Variables,
    /// The node `current()` returns
    pub(crate) current: NodeId,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(doc: &'a XmlDocument, vars: &'a dyn Variables, current: NodeId) -> Self {
        Self { doc, vars, current }
    }

    pub(crate) fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|node| self.doc.string_value(*node))
                .unwrap_or_default(),
            Value::Fragment(nodes) => fragment_text(nodes),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub(crate) fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string(other)),
        }
    }

    pub(crate) fn evaluate_boolean(&self, expr: &Expr, ctx: &Context) -> Result<bool> {
        Ok(self.evaluate(expr, ctx)?.boolean())
    }

    pub(crate) fn evaluate_number(&self, expr: &Expr, ctx: &Context) -> Result<f64> {
        Ok(self.number(&self.evaluate(expr, ctx)?))
    }

    pub(crate) fn select(&self, expr: &Expr, ctx: &Context) -> Result<Vec<NodeId>> {
        into_nodes(self.evaluate(expr, ctx)?)
    }

    pub(crate) fn evaluate(&self, expr: &Expr, ctx: &Context) -> Result<Value> {
        match expr {
            Expr::Literal(text) => Ok(Value::String(text.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Variable(name) => self
                .vars
                .lookup(name)
                .cloned()
                .ok_or_else(|| TransformError::Runtime(format!("undefined variable ${}", name))),
            Expr::Negate(inner) => Ok(Value::Number(-self.evaluate_number(inner, ctx)?)),
            Expr::Binary(left, op, right) => self.binary(left, *op, right, ctx),
            Expr::Function(name, args) => self.call(name, args, ctx),
            Expr::Path { absolute, steps } => {
                let start = if *absolute { self.doc.root() } else { ctx.node };
                Ok(Value::Nodes(self.walk(vec![start], steps)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = into_nodes(self.evaluate(primary, ctx)?)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(Value::Nodes(self.walk(nodes, steps)?))
            }
        }
    }

    fn binary(&self, left: &Expr, op: Operator, right: &Expr, ctx: &Context) -> Result<Value> {
        match op {
            Operator::Or => Ok(Value::Boolean(
                self.evaluate_boolean(left, ctx)? || self.evaluate_boolean(right, ctx)?,
            )),
            Operator::And => Ok(Value::Boolean(
                self.evaluate_boolean(left, ctx)? && self.evaluate_boolean(right, ctx)?,
            )),
            Operator::Union => {
                let mut nodes = self.select(left, ctx)?;
                nodes.extend(self.select(right, ctx)?);
                nodes.sort();
                nodes.dedup();
                Ok(Value::Nodes(nodes))
            }
            Operator::Plus | Operator::Minus | Operator::Mul | Operator::Div | Operator::Mod => {
                let a = self.evaluate_number(left, ctx)?;
                let b = self.evaluate_number(right, ctx)?;
                Ok(Value::Number(match op {
                    Operator::Plus => a + b,
                    Operator::Minus => a - b,
                    Operator::Mul => a * b,
                    Operator::Div => a / b,
                    _ => a % b,
                }))
            }
            _ => {
                let a = self.evaluate(left, ctx)?;
                let b = self.evaluate(right, ctx)?;
                Ok(Value::Boolean(self.compare(op, &a, &b)))
            }
        }
    }

    /// Comparison with node-set existential semantics
    fn compare(&self, op: Operator, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(l), Value::Nodes(r)) => {
                let right_strings: Vec<Value> = r
                    .iter()
                    .map(|node| Value::String(self.doc.string_value(*node)))
                    .collect();
                l.iter().any(|node| {
                    let a = Value::String(self.doc.string_value(*node));
                    right_strings.iter().any(|b| self.compare_atoms(op, &a, b))
                })
            }
            (Value::Nodes(nodes), other) => self.compare_node_set(op, nodes, other, false),
            (other, Value::Nodes(nodes)) => self.compare_node_set(op, nodes, other, true),
            _ => self.compare_atoms(op, left, right),
        }
    }

    fn compare_node_set(&self, op: Operator, nodes: &[NodeId], other: &Value, flipped: bool) -> bool {
        let ordered = |a: &Value, b: &Value| {
            if flipped {
                self.compare_atoms(op, b, a)
            } else {
                self.compare_atoms(op, a, b)
            }
        };
        match other {
            Value::Boolean(_) => ordered(&Value::Boolean(!nodes.is_empty()), other),
            _ => nodes
                .iter()
                .any(|node| ordered(&Value::String(self.doc.string_value(*node)), other)),
        }
    }

    fn compare_atoms(&self, op: Operator, a: &Value, b: &Value) -> bool {
        match op {
            Operator::Eq | Operator::Neq => {
                let equal = if matches!(a, Value::Boolean(_)) || matches!(b, Value::Boolean(_)) {
                    a.boolean() == b.boolean()
                } else if matches!(a, Value::Number(_)) || matches!(b, Value::Number(_)) {
                    self.number(a) == self.number(b)
                } else {
                    self.string(a) == self.string(b)
                };
                (op == Operator::Eq) == equal
            }
            _ => {
                let (x, y) = (self.number(a), self.number(b));
                match op {
                    Operator::Lt => x < y,
                    Operator::Lte => x <= y,
                    Operator::Gt => x > y,
                    _ => x >= y,
                }
            }
        }
    }

    fn walk(&self, start: Vec<NodeId>, steps: &[Step]) -> Result<Vec<NodeId>> {
        let mut nodes = start;
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut selected: Vec<NodeId> = self
                    .axis_nodes(step.axis, *node)
                    .into_iter()
                    .filter(|candidate| self.test(step.axis, &step.test, *candidate))
                    .collect();
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            next.sort();
            next.dedup();
            nodes = next;
        }
        Ok(nodes)
    }

    /// Keep the nodes for which `predicate` holds; a number means a position
    pub(crate) fn filter(&self, nodes: Vec<NodeId>, predicate: &Expr) -> Result<Vec<NodeId>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context::new(node, index + 1, size);
            let keep = match self.evaluate(predicate, &ctx)? {
                Value::Number(n) => n == (index + 1) as f64,
                other => other.boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along an axis, nearest first for reverse axes
    fn axis_nodes(&self, axis: Axis, node: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        match axis {
            Axis::Child => doc.children(node).to_vec(),
            Axis::Descendant => doc.descendants(node),
            Axis::DescendantOrSelf => {
                let mut out = vec![node];
                out.extend(doc.descendants(node));
                out
            }
            Axis::SelfAxis => vec![node],
            Axis::Parent => doc.parent(node).into_iter().collect(),
            Axis::Ancestor | Axis::AncestorOrSelf => {
                let mut out = Vec::new();
                if axis == Axis::AncestorOrSelf {
                    out.push(node);
                }
                let mut current = doc.parent(node);
                while let Some(parent) = current {
                    out.push(parent);
                    current = doc.parent(parent);
                }
                out
            }
            Axis::Attribute => doc.attributes(node).to_vec(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                if matches!(doc.kind(node), NodeKind::Attribute(_)) {
                    return Vec::new();
                }
                let Some(parent) = doc.parent(node) else {
                    return Vec::new();
                };
                let siblings = doc.children(parent);
                let index = siblings.iter().position(|s| *s == node).unwrap_or(0);
                if axis == Axis::FollowingSibling {
                    siblings[index + 1..].to_vec()
                } else {
                    siblings[..index].iter().rev().copied().collect()
                }
            }
        }
    }

    pub(crate) fn test(&self, axis: Axis, test: &NodeTest, node: NodeId) -> bool {
        let kind = self.doc.kind(node);
        let principal = if axis == Axis::Attribute {
            matches!(kind, NodeKind::Attribute(_))
        } else {
            matches!(kind, NodeKind::Element(_))
        };
        match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(kind, NodeKind::Text(_)),
            NodeTest::Comment => matches!(kind, NodeKind::Comment(_)),
            NodeTest::Wildcard { namespace } => {
                principal
                    && match namespace {
                        None => true,
                        Some(ns) => {
                            self.doc.name(node).and_then(|n| n.namespace.as_deref()) == ns.as_deref()
                        }
                    }
            }
            NodeTest::Name { namespace, local } => {
                principal
                    && self
                        .doc
                        .name(node)
                        .map_or(false, |name| name.is(namespace.as_deref(), local))
            }
        }
    }

    fn arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<Value> {
        match args.get(index) {
            Some(expr) => self.evaluate(expr, ctx),
            None => Err(TransformError::Runtime(format!("missing argument {}", index + 1))),
        }
    }

    fn string_arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<String> {
        Ok(self.string(&self.arg(args, index, ctx)?))
    }

    fn number_arg(&self, args: &[Expr], index: usize, ctx: &Context) -> Result<f64> {
        Ok(self.number(&self.arg(args, index, ctx)?))
    }

    /// The argument as a string, or the context node's string value
    fn string_or_context(&self, args: &[Expr], ctx: &Context) -> Result<String> {
        if args.is_empty() {
            Ok(self.doc.string_value(ctx.node))
        } else {
            self.string_arg(args, 0, ctx)
        }
    }

    /// The first node of the argument, or the context node
    fn node_or_context(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Option<NodeId>> {
        if args.is_empty() {
            return Ok(Some(ctx.node));
        }
        let nodes = into_nodes(self.arg(args, 0, ctx)?)
            .map_err(|_| TransformError::Runtime(format!("{}() expects a node-set", name)))?;
        Ok(nodes.first().copied())
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value> {
        let value = match name {
            "last" => Value::Number(ctx.size as f64),
            "position" => Value::Number(ctx.position as f64),
            "current" => Value::Nodes(vec![self.current]),
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "count" => {
                let nodes = into_nodes(self.arg(args, 0, ctx)?)
                    .map_err(|_| TransformError::Runtime("count() expects a node-set".into()))?;
                Value::Number(nodes.len() as f64)
            }
            "sum" => {
                let nodes = into_nodes(self.arg(args, 0, ctx)?)
                    .map_err(|_| TransformError::Runtime("sum() expects a node-set".into()))?;
                Value::Number(
                    nodes
                        .iter()
                        .map(|node| parse_number(&self.doc.string_value(*node)))
                        .sum(),
                )
            }
            "name" | "local-name" => {
                let text = self
                    .node_or_context(name, args, ctx)?
                    .and_then(|node| self.doc.name(node))
                    .map(|qname| {
                        if name == "name" {
                            qname.qualified()
                        } else {
                            qname.local.clone()
                        }
                    })
                    .unwrap_or_default();
                Value::String(text)
            }
            "string" => Value::String(self.string_or_context(args, ctx)?),
            "string-length" => {
                Value::Number(self.string_or_context(args, ctx)?.chars().count() as f64)
            }
            "normalize-space" => Value::String(
                self.string_or_context(args, ctx)?
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            "number" => {
                if args.is_empty() {
                    Value::Number(parse_number(&self.doc.string_value(ctx.node)))
                } else {
                    Value::Number(self.number_arg(args, 0, ctx)?)
                }
            }
            "concat" => {
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&self.string_arg(args, index, ctx)?);
                }
                Value::String(out)
            }
            "starts-with" => {
                let s = self.string_arg(args, 0, ctx)?;
                Value::Boolean(s.starts_with(self.string_arg(args, 1, ctx)?.as_str()))
            }
            "contains" => {
                let s = self.string_arg(args, 0, ctx)?;
                Value::Boolean(s.contains(self.string_arg(args, 1, ctx)?.as_str()))
            }
            "substring-before" => {
                let s = self.string_arg(args, 0, ctx)?;
                let pattern = self.string_arg(args, 1, ctx)?;
                Value::String(
                    s.split_once(pattern.as_str())
                        .map(|(before, _)| before.to_string())
                        .unwrap_or_default(),
                )
            }
            "substring-after" => {
                let s = self.string_arg(args, 0, ctx)?;
                let pattern = self.string_arg(args, 1, ctx)?;
                Value::String(
                    s.split_once(pattern.as_str())
                        .map(|(_, after)| after.to_string())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                let s = self.string_arg(args, 0, ctx)?;
                let start = round_half_up(self.number_arg(args, 1, ctx)?);
                let end = if args.len() > 2 {
                    start + round_half_up(self.number_arg(args, 2, ctx)?)
                } else {
                    f64::INFINITY
                };
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|(index, _)| {
                            let position = (*index + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "translate" => {
                let s = self.string_arg(args, 0, ctx)?;
                let from: Vec<char> = self.string_arg(args, 1, ctx)?.chars().collect();
                let to: Vec<char> = self.string_arg(args, 2, ctx)?.chars().collect();
                Value::String(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|f| *f == c) {
                            Some(index) => to.get(index).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "boolean" => Value::Boolean(self.arg(args, 0, ctx)?.boolean()),
            "not" => Value::Boolean(!self.arg(args, 0, ctx)?.boolean()),
            "floor" => Value::Number(self.number_arg(args, 0, ctx)?.floor()),
            "ceiling" => Value::Number(self.number_arg(args, 0, ctx)?.ceil()),
            "round" => Value::Number(round_half_up(self.number_arg(args, 0, ctx)?)),
            other => {
                return Err(TransformError::Runtime(format!("unknown function '{}()'", other)))
            }
        };
        Ok(value)
    }
}

fn into_nodes(value: Value) -> Result<Vec<NodeId>> {
    match value {
        Value::Nodes(nodes) => Ok(nodes),
        _ => Err(TransformError::Runtime(
            "expression does not evaluate to a node-set".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::xpath::compile;

    struct Vars(HashMap<String, Value>);

    impl Variables for Vars {
        fn lookup(&self, name: &str) -> Option<&Value> {
            self.0.get(name)
        }
    }

    const DOC: &str = r#"<testsuites>
        <testsuite name="math" tests="3">
            <testcase name="add" time="0.5"/>
            <testcase name="sub" time="1.25"><failure message="off by one">expected 1</failure></testcase>
            <testcase name="mul" time="2"/>
        </testsuite>
        <testsuite name="io" tests="1">
            <testcase name="read" time="0.25"/>
        </testsuite>
    </testsuites>"#;

    fn no_prefixes(_: &str) -> Option<String> {
        None
    }

    fn eval_with(doc: &XmlDocument, vars: &Vars, source: &str) -> Result<Value> {
        let expr = compile(source, &no_prefixes).unwrap();
        let root = doc.root();
        Evaluator::new(doc, vars, root).evaluate(&expr, &Context::single(root))
    }

    fn eval(source: &str) -> Value {
        let doc = XmlDocument::parse(DOC).unwrap();
        eval_with(&doc, &Vars(HashMap::new()), source).unwrap()
    }

    fn eval_string(source: &str) -> String {
        let doc = XmlDocument::parse(DOC).unwrap();
        let vars = Vars(HashMap::new());
        let value = eval_with(&doc, &vars, source).unwrap();
        let root = doc.root();
        Evaluator::new(&doc, &vars, root).string(&value)
    }

    #[test]
    fn test_counts_and_sums() {
        assert_eq!(eval("count(//testcase)"), Value::Number(4.0));
        assert_eq!(eval("sum(//testsuite/@tests)"), Value::Number(4.0));
        assert_eq!(eval("sum(//testcase/@time)"), Value::Number(4.0));
        assert_eq!(eval("count(//testcase[failure])"), Value::Number(1.0));
    }

    #[test]
    fn test_positional_predicates() {
        assert_eq!(eval_string("//testsuite[1]/testcase[last()]/@name"), "mul");
        assert_eq!(eval_string("//testcase[2]/@name"), "sub");
        assert_eq!(eval_string("(//testcase)[4]/@name"), "read");
        assert_eq!(
            eval_string("//testcase[@name='sub']/preceding-sibling::testcase[1]/@name"),
            "add"
        );
        assert_eq!(eval_string("//failure/ancestor::testsuite/@name"), "math");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("//testcase/@time > 1.5"), Value::Boolean(true));
        assert_eq!(eval("//testcase/@time > 5"), Value::Boolean(false));
        assert_eq!(eval("//testcase/@name = 'read'"), Value::Boolean(true));
        assert_eq!(eval("//testcase/@name != 'read'"), Value::Boolean(true));
        assert_eq!(eval("//nothing = ''"), Value::Boolean(false));
        assert_eq!(eval("1 = true()"), Value::Boolean(true));
        assert_eq!(eval("'2' = 2.0"), Value::Boolean(true));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("7 mod 3"), Value::Number(1.0));
        assert_eq!(eval("7 div 2"), Value::Number(3.5));
        assert_eq!(eval("-(2 + 3) * 2"), Value::Number(-10.0));
        assert_eq!(eval_string("1 div 0"), "Infinity");
        assert_eq!(eval_string("number('abc')"), "NaN");
        assert_eq!(eval_string("round(2.5)"), "3");
        assert_eq!(eval_string("floor(-1.5)"), "-2");
        assert_eq!(eval_string("0.1 + 0.2 > 0.3"), "true");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval_string("concat('a', 1, true())"), "a1true");
        assert_eq!(eval_string("substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(eval_string("substring('12345', 0, 3)"), "12");
        assert_eq!(eval_string("substring-before('1999/04/01', '/')"), "1999");
        assert_eq!(eval_string("substring-after('1999/04/01', '/')"), "04/01");
        assert_eq!(eval_string("normalize-space('  a \n b  ')"), "a b");
        assert_eq!(eval_string("translate('bar', 'abc', 'ABC')"), "BAr");
        assert_eq!(eval_string("translate('--aaa--', 'a-', 'A')"), "AAA");
        assert_eq!(eval_string("string-length('héllo')"), "5");
        assert_eq!(eval_string("name(/*)"), "testsuites");
        assert_eq!(eval_string("//failure/@message"), "off by one");
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(parse_number(" 12.5 "), 12.5);
        assert_eq!(parse_number("-3"), -3.0);
        assert!(parse_number("1e3").is_nan());
        assert!(parse_number("+1").is_nan());
        assert!(parse_number("").is_nan());
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn test_variables() {
        let doc = XmlDocument::parse(DOC).unwrap();
        let mut map = HashMap::new();
        map.insert("limit".to_string(), Value::Number(1.0));
        let vars = Vars(map);
        assert_eq!(
            eval_with(&doc, &vars, "count(//testcase[@time > $limit])").unwrap(),
            Value::Number(2.0)
        );
        let err = eval_with(&doc, &vars, "$missing").unwrap_err();
        assert!(matches!(err, TransformError::Runtime(_)));
    }

    #[test]
    fn test_union_is_in_document_order() {
        let doc = XmlDocument::parse(DOC).unwrap();
        let vars = Vars(HashMap::new());
        let value = eval_with(&doc, &vars, "//testsuite[2] | //testsuite[1]").unwrap();
        match value {
            Value::Nodes(nodes) => {
                assert_eq!(nodes.len(), 2);
                assert!(nodes[0] < nodes[1]);
                assert_eq!(doc.attribute(nodes[0], "name"), Some("math"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(eval_with(&doc, &vars, "1 | //testcase").is_err());
    }
}
