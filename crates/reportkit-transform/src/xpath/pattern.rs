//! Template match patterns
//!
//! A pattern is a union of location paths restricted to the child and
//! attribute axes. A node matches a path when it can be reached by that path
//! from some context, which is checked from the last step outward.

use reportkit_core::{NodeId, NodeKind};

use super::ast::{Axis, NodeTest, Step};
use super::eval::Evaluator;
use super::lexer::{Operator, Token};
use super::parser::{Parser, PrefixResolver};
use super::ExprError;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
struct PatternStep {
    step: Step,
    /// The step was introduced by `//` rather than `/`
    descendant: bool,
}

/// One alternative of a match pattern
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathPattern {
    absolute: bool,
    /// Empty for the root pattern `/`
    steps: Vec<PatternStep>,
}

/// Parse a pattern into its alternatives
pub(crate) fn parse_pattern(source: &str, resolve: PrefixResolver<'_>) -> std::result::Result<Vec<PathPattern>, ExprError> {
    let mut parser = Parser::new(source, resolve)?;
    if parser.peek().is_none() {
        return Err(parser.error("empty pattern"));
    }
    let mut alternatives = vec![path_pattern(&mut parser)?];
    while parser.eat(&Token::Op(Operator::Union)) {
        alternatives.push(path_pattern(&mut parser)?);
    }
    parser.expect_end()?;
    Ok(alternatives)
}

fn path_pattern(parser: &mut Parser<'_, '_>) -> std::result::Result<PathPattern, ExprError> {
    let (absolute, mut descendant) = if parser.eat(&Token::Slash) {
        (true, false)
    } else if parser.eat(&Token::DoubleSlash) {
        (true, true)
    } else {
        (false, false)
    };
    let mut steps = Vec::new();
    if absolute && !descendant && !parser.at_step() {
        return Ok(PathPattern { absolute, steps });
    }
    loop {
        let step = parser.step()?;
        if !matches!(step.axis, Axis::Child | Axis::Attribute) {
            return Err(parser.error("patterns may only use the child and attribute axes"));
        }
        steps.push(PatternStep { step, descendant });
        if parser.eat(&Token::Slash) {
            descendant = false;
        } else if parser.eat(&Token::DoubleSlash) {
            descendant = true;
        } else {
            break;
        }
    }
    Ok(PathPattern { absolute, steps })
}

impl PathPattern {
    /// Priority used when a template gives none
    pub(crate) fn default_priority(&self) -> f64 {
        match self.steps.as_slice() {
            [only] if !self.absolute && only.step.predicates.is_empty() => match &only.step.test {
                NodeTest::Name { .. } => 0.0,
                NodeTest::Wildcard { namespace: Some(_) } => -0.25,
                _ => -0.5,
            },
            _ => 0.5,
        }
    }

    pub(crate) fn matches(&self, ev: &Evaluator<'_>, node: NodeId) -> Result<bool> {
        match self.steps.len() {
            0 => Ok(matches!(ev.doc.kind(node), NodeKind::Root)),
            len => self.matches_at(ev, node, len - 1),
        }
    }

    fn matches_at(&self, ev: &Evaluator<'_>, node: NodeId, index: usize) -> Result<bool> {
        let step = &self.steps[index];
        if !step_matches(ev, &step.step, node)? {
            return Ok(false);
        }
        let Some(parent) = ev.doc.parent(node) else {
            return Ok(false);
        };
        if index == 0 {
            return Ok(!self.absolute
                || step.descendant
                || matches!(ev.doc.kind(parent), NodeKind::Root));
        }
        if !step.descendant {
            return self.matches_at(ev, parent, index - 1);
        }
        let mut current = Some(parent);
        while let Some(ancestor) = current {
            if self.matches_at(ev, ancestor, index - 1)? {
                return Ok(true);
            }
            current = ev.doc.parent(ancestor);
        }
        Ok(false)
    }
}

fn step_matches(ev: &Evaluator<'_>, step: &Step, node: NodeId) -> Result<bool> {
    let kind = ev.doc.kind(node);
    let on_axis = match step.axis {
        Axis::Attribute => matches!(kind, NodeKind::Attribute(_)),
        _ => !matches!(kind, NodeKind::Root | NodeKind::Attribute(_)),
    };
    if !on_axis || !ev.test(step.axis, &step.test, node) {
        return Ok(false);
    }
    if step.predicates.is_empty() {
        return Ok(true);
    }
    let Some(parent) = ev.doc.parent(node) else {
        return Ok(false);
    };
    let siblings = match step.axis {
        Axis::Attribute => ev.doc.attributes(parent),
        _ => ev.doc.children(parent),
    };
    let mut candidates: Vec<NodeId> = siblings
        .iter()
        .copied()
        .filter(|sibling| ev.test(step.axis, &step.test, *sibling))
        .collect();
    for predicate in &step.predicates {
        candidates = ev.filter(candidates, predicate)?;
    }
    Ok(candidates.contains(&node))
}

#[cfg(test)]
mod tests {
    use reportkit_core::XmlDocument;

    use super::*;
    use crate::xpath::{Value, Variables};

    struct NoVariables;

    impl Variables for NoVariables {
        fn lookup(&self, _: &str) -> Option<&Value> {
            None
        }
    }

    fn resolve(prefix: &str) -> Option<String> {
        (prefix == "r").then(|| "urn:report".to_string())
    }

    const DOC: &str = r#"<testsuite name="s" xmlns:r="urn:report">
        <testcase name="a"/>
        <testcase name="b"><failure>boom</failure></testcase>
        <r:note>text</r:note>
    </testsuite>"#;

    /// Names of the elements (or `@attr` for attributes) matched by a pattern
    fn matched(source: &str) -> Vec<String> {
        let doc = XmlDocument::parse(DOC).unwrap();
        let alternatives = parse_pattern(source, &resolve).unwrap();
        let ev = Evaluator::new(&doc, &NoVariables, doc.root());
        let mut nodes = vec![doc.root()];
        for node in doc.descendants(doc.root()) {
            nodes.push(node);
            nodes.extend_from_slice(doc.attributes(node));
        }
        nodes
            .into_iter()
            .filter(|node| {
                alternatives
                    .iter()
                    .any(|alt| alt.matches(&ev, *node).unwrap())
            })
            .map(|node| match doc.kind(node) {
                NodeKind::Root => "/".to_string(),
                NodeKind::Attribute(attr) => format!("@{}", attr.value),
                NodeKind::Text(text) => format!("'{}'", text),
                _ => doc.name(node).map(|n| n.qualified()).unwrap_or_default(),
            })
            .collect()
    }

    #[test]
    fn test_name_and_root_patterns() {
        assert_eq!(matched("/"), vec!["/"]);
        assert_eq!(matched("testcase"), vec!["testcase", "testcase"]);
        assert_eq!(matched("/testsuite"), vec!["testsuite"]);
        assert!(matched("/testcase").is_empty());
        assert_eq!(matched("//failure"), vec!["failure"]);
        assert_eq!(matched("testsuite//failure"), vec!["failure"]);
        assert!(matched("testsuite/failure").is_empty());
    }

    #[test]
    fn test_predicates_and_alternatives() {
        assert_eq!(matched("testcase[failure]/@name"), vec!["@b"]);
        assert_eq!(matched("testcase[1]"), vec!["testcase"]);
        assert_eq!(matched("failure | r:note"), vec!["failure", "r:note"]);
        assert_eq!(matched("text()"), vec!["'boom'", "'text'"]);
        assert_eq!(matched("r:*"), vec!["r:note"]);
    }

    #[test]
    fn test_default_priorities() {
        let priority = |source: &str| parse_pattern(source, &resolve).unwrap()[0].default_priority();
        assert_eq!(priority("testcase"), 0.0);
        assert_eq!(priority("@name"), 0.0);
        assert_eq!(priority("r:*"), -0.25);
        assert_eq!(priority("*"), -0.5);
        assert_eq!(priority("node()"), -0.5);
        assert_eq!(priority("testcase[1]"), 0.5);
        assert_eq!(priority("testsuite/testcase"), 0.5);
        assert_eq!(priority("/"), 0.5);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(parse_pattern("ancestor::testsuite", &resolve).is_err());
        assert!(parse_pattern("count(x)", &resolve).is_err());
        assert!(parse_pattern("", &resolve).is_err());
        assert!(parse_pattern("x:y", &resolve).is_err());
    }
}
