//! XPath 1.0 expressions used by stylesheets
//!
//! Expressions are tokenized, parsed into an [`Expr`] tree with namespace
//! prefixes resolved at compile time, and evaluated against an
//! [`XmlDocument`](reportkit_core::XmlDocument) by the [`Evaluator`].

mod ast;
mod eval;
mod lexer;
mod parser;
mod pattern;

use thiserror::Error;

pub(crate) use ast::Expr;
pub(crate) use eval::{fragment_text, parse_number, Context, Evaluator, Value, Variables};
use parser::{Parser, PrefixResolver};
pub(crate) use pattern::{parse_pattern, PathPattern};

/// A malformed expression
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} in expression '{expr}'")]
pub struct ExprError {
    /// Expression text
    pub expr: String,
    /// What is wrong with it
    pub message: String,
}

impl ExprError {
    pub(crate) fn new(expr: &str, message: impl Into<String>) -> Self {
        Self {
            expr: expr.to_string(),
            message: message.into(),
        }
    }
}

/// Compile an expression, resolving prefixes with `resolve`
pub(crate) fn compile(source: &str, resolve: PrefixResolver<'_>) -> Result<Expr, ExprError> {
    Parser::new(source, resolve)?.parse_expression()
}

/// Minimum and maximum argument counts of the core function library
pub(crate) fn function_arity(name: &str) -> Option<(usize, Option<usize>)> {
    let arity = match name {
        "last" | "position" | "true" | "false" | "current" => (0, Some(0)),
        "count" | "sum" | "boolean" | "not" | "floor" | "ceiling" | "round" => (1, Some(1)),
        "name" | "local-name" | "string" | "string-length" | "normalize-space" | "number" => {
            (0, Some(1))
        }
        "starts-with" | "contains" | "substring-before" | "substring-after" => (2, Some(2)),
        "substring" => (2, Some(3)),
        "translate" => (3, Some(3)),
        "concat" => (2, None),
        _ => return None,
    };
    Some(arity)
}
