//! Recursive-descent expression parser

use super::ast::{Axis, Expr, NodeTest, Step};
use super::lexer::{tokenize, Operator, Token};
use super::{function_arity, ExprError};

/// Resolves a namespace prefix in scope where the expression was written
pub(crate) type PrefixResolver<'r> = &'r dyn Fn(&str) -> Option<String>;

pub(crate) struct Parser<'a, 'r> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    resolve: PrefixResolver<'r>,
}

impl<'a, 'r> Parser<'a, 'r> {
    pub(crate) fn new(source: &'a str, resolve: PrefixResolver<'r>) -> Result<Self, ExprError> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            resolve,
        })
    }

    /// Parse a complete expression
    pub(crate) fn parse_expression(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty expression"));
        }
        let expr = self.or_expr()?;
        self.expect_end()?;
        Ok(expr)
    }

    pub(crate) fn expect_end(&self) -> Result<(), ExprError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected {}", describe(token)))),
        }
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::new(self.source, message)
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(crate) fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ExprError> {
        if self.eat(&token) {
            Ok(())
        } else {
            let found = self.peek().map(describe).unwrap_or_else(|| "end of expression".into());
            Err(self.error(format!("expected {}, found {}", describe(&token), found)))
        }
    }

    fn eat_op(&mut self, ops: &[Operator]) -> Option<Operator> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops: &[Operator],
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let right = next(self)?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[Operator::Or], Self::and_expr)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[Operator::And], Self::equality_expr)
    }

    fn equality_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[Operator::Eq, Operator::Neq], Self::relational_expr)
    }

    fn relational_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[Operator::Lt, Operator::Lte, Operator::Gt, Operator::Gte],
            Self::additive_expr,
        )
    }

    fn additive_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[Operator::Plus, Operator::Minus], Self::multiplicative_expr)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[Operator::Mul, Operator::Div, Operator::Mod], Self::unary_expr)
    }

    fn unary_expr(&mut self) -> Result<Expr, ExprError> {
        if self.eat_op(&[Operator::Minus]).is_some() {
            return Ok(Expr::Negate(Box::new(self.unary_expr()?)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[Operator::Union], Self::path_expr)
    }

    /// Whether the next token begins a location step
    pub(crate) fn at_step(&self) -> bool {
        match self.peek() {
            Some(Token::Name(name)) => {
                self.peek_at(1) != Some(&Token::LParen) || is_node_type(name)
            }
            Some(Token::Wildcard(_))
            | Some(Token::Axis(_))
            | Some(Token::At)
            | Some(Token::Dot)
            | Some(Token::DotDot) => true,
            _ => false,
        }
    }

    fn path_expr(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.at_step() {
                    self.relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.relative_steps()?);
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            _ if self.at_step() => Ok(Expr::Path {
                absolute: false,
                steps: self.relative_steps()?,
            }),
            _ => self.filter_expr(),
        }
    }

    fn filter_expr(&mut self) -> Result<Expr, ExprError> {
        let primary = self.primary_expr()?;
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        let mut steps = Vec::new();
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                break;
            }
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::Literal(text)) => Ok(Expr::Literal(text)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Variable(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen)?;
                        break;
                    }
                }
                self.check_call(&name, args.len())?;
                Ok(Expr::Function(name, args))
            }
            Some(token) => Err(self.error(format!("unexpected {}", describe(&token)))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn check_call(&self, name: &str, count: usize) -> Result<(), ExprError> {
        let (min, max) = function_arity(name)
            .ok_or_else(|| self.error(format!("unknown function '{}()'", name)))?;
        if count < min || max.map_or(false, |max| count > max) {
            return Err(self.error(format!(
                "function '{}()' called with {} argument(s)",
                name, count
            )));
        }
        Ok(())
    }

    pub(crate) fn relative_steps(&mut self) -> Result<Vec<Step>, ExprError> {
        let mut steps = vec![self.step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    pub(crate) fn step(&mut self) -> Result<Step, ExprError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        let axis = match self.peek() {
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Token::Axis(name)) => {
                let axis = Axis::from_name(name)
                    .ok_or_else(|| self.error(format!("unsupported axis '{}'", name)))?;
                self.pos += 1;
                axis
            }
            _ => Axis::Child,
        };
        let test = self.node_test()?;
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, ExprError> {
        match self.next() {
            Some(Token::Wildcard(None)) => Ok(NodeTest::Wildcard { namespace: None }),
            Some(Token::Wildcard(Some(prefix))) => Ok(NodeTest::Wildcard {
                namespace: Some(Some(self.namespace(&prefix)?)),
            }),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) && is_node_type(&name) => {
                self.pos += 1;
                self.expect(Token::RParen)?;
                Ok(match name.as_str() {
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => NodeTest::Node,
                })
            }
            Some(Token::Name(name)) => match name.split_once(':') {
                Some((prefix, local)) => Ok(NodeTest::Name {
                    namespace: Some(self.namespace(prefix)?),
                    local: local.to_string(),
                }),
                None => Ok(NodeTest::Name {
                    namespace: None,
                    local: name,
                }),
            },
            Some(token) => Err(self.error(format!("expected a node test, found {}", describe(&token)))),
            None => Err(self.error("expected a node test")),
        }
    }

    fn namespace(&self, prefix: &str) -> Result<String, ExprError> {
        (self.resolve)(prefix).ok_or_else(|| self.error(format!("unbound prefix '{}'", prefix)))
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "node" | "text" | "comment")
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Literal(s) => format!("literal '{}'", s),
        Token::Variable(v) => format!("${}", v),
        Token::Name(n) => format!("'{}'", n),
        Token::Wildcard(None) => "'*'".to_string(),
        Token::Wildcard(Some(p)) => format!("'{}:*'", p),
        Token::Axis(a) => format!("'{}::'", a),
        Token::Slash => "'/'".to_string(),
        Token::DoubleSlash => "'//'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::DotDot => "'..'".to_string(),
        Token::At => "'@'".to_string(),
        Token::Comma => "','".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
        Token::Op(op) => format!("operator {:?}", op),
    }
}
