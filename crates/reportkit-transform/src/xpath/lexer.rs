//! Expression tokenizer

use super::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Literal(String),
    Variable(String),
    /// A name test or function name, possibly prefixed
    Name(String),
    /// `*` or `prefix:*` used as a name test
    Wildcard(Option<String>),
    /// An axis name followed by `::`
    Axis(String),
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Op(Operator),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

/// Split an expression into tokens
///
/// `*` and the names `and`, `or`, `div`, `mod` are operators only where an
/// operand has just been seen; elsewhere they are name tests.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let lexer = Lexer {
        source,
        chars: source.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()
}

impl<'a> Lexer<'a> {
    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::new(self.source, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn operator_expected(&self) -> bool {
        match self.tokens.last() {
            None => false,
            Some(token) => !matches!(
                token,
                Token::At
                    | Token::Axis(_)
                    | Token::LParen
                    | Token::LBracket
                    | Token::Comma
                    | Token::Op(_)
                    | Token::Slash
                    | Token::DoubleSlash
            ),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ExprError> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                ',' => self.single(Token::Comma),
                '@' => self.single(Token::At),
                '|' => self.single(Token::Op(Operator::Union)),
                '+' => self.single(Token::Op(Operator::Plus)),
                '-' => self.single(Token::Op(Operator::Minus)),
                '=' => self.single(Token::Op(Operator::Eq)),
                '!' if self.peek_at(1) == Some('=') => {
                    self.pos += 2;
                    Token::Op(Operator::Neq)
                }
                '<' | '>' => {
                    let or_equal = self.peek_at(1) == Some('=');
                    self.pos += if or_equal { 2 } else { 1 };
                    Token::Op(match (c, or_equal) {
                        ('<', false) => Operator::Lt,
                        ('<', true) => Operator::Lte,
                        ('>', false) => Operator::Gt,
                        _ => Operator::Gte,
                    })
                }
                '/' => {
                    if self.peek_at(1) == Some('/') {
                        self.pos += 2;
                        Token::DoubleSlash
                    } else {
                        self.single(Token::Slash)
                    }
                }
                '.' => match self.peek_at(1) {
                    Some('.') => {
                        self.pos += 2;
                        Token::DotDot
                    }
                    Some(d) if d.is_ascii_digit() => self.number()?,
                    _ => self.single(Token::Dot),
                },
                '"' | '\'' => self.literal(c)?,
                '$' => {
                    self.pos += 1;
                    match self.qname() {
                        Some(name) => Token::Variable(name),
                        None => return Err(self.error("expected a variable name after '$'")),
                    }
                }
                '*' => {
                    self.pos += 1;
                    if self.operator_expected() {
                        Token::Op(Operator::Mul)
                    } else {
                        Token::Wildcard(None)
                    }
                }
                d if d.is_ascii_digit() => self.number()?,
                n if is_name_start(n) => self.name_token()?,
                other => return Err(self.error(format!("unexpected character '{}'", other))),
            };
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn number(&mut self) -> Result<Token, ExprError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }

    fn literal(&mut self, quote: char) -> Result<Token, ExprError> {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let text: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(Token::Literal(text));
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string literal"))
    }

    fn ncname(&mut self) -> Option<String> {
        let start = self.pos;
        if !matches!(self.peek(), Some(c) if is_name_start(c)) {
            return None;
        }
        while matches!(self.peek(), Some(c) if is_name_char(c)) {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    /// An NCName optionally followed by `:NCName`
    fn qname(&mut self) -> Option<String> {
        let mut name = self.ncname()?;
        if self.peek() == Some(':') && matches!(self.peek_at(1), Some(c) if is_name_start(c)) {
            self.pos += 1;
            let local = self.ncname()?;
            name.push(':');
            name.push_str(&local);
        }
        Some(name)
    }

    fn name_token(&mut self) -> Result<Token, ExprError> {
        let name = self.ncname().ok_or_else(|| self.error("expected a name"))?;

        if self.operator_expected() {
            let op = match name.as_str() {
                "and" => Some(Operator::And),
                "or" => Some(Operator::Or),
                "div" => Some(Operator::Div),
                "mod" => Some(Operator::Mod),
                _ => None,
            };
            if let Some(op) = op {
                return Ok(Token::Op(op));
            }
        }

        match (self.peek(), self.peek_at(1)) {
            (Some(':'), Some(':')) => {
                self.pos += 2;
                return Ok(Token::Axis(name));
            }
            (Some(':'), Some('*')) => {
                self.pos += 2;
                return Ok(Token::Wildcard(Some(name)));
            }
            (Some(':'), Some(c)) if is_name_start(c) => {
                self.pos += 1;
                let local = self.ncname().ok_or_else(|| self.error("expected a local name"))?;
                return Ok(Token::Name(format!("{}:{}", name, local)));
            }
            _ => {}
        }

        // Whitespace between an axis name and `::` is allowed.
        let save = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        if self.peek() == Some(':') && self.peek_at(1) == Some(':') {
            self.pos += 2;
            return Ok(Token::Axis(name));
        }
        self.pos = save;
        Ok(Token::Name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_tokens() {
        let tokens = tokenize("//testcase[@name='a']/..").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::DoubleSlash,
                Token::Name("testcase".into()),
                Token::LBracket,
                Token::At,
                Token::Name("name".into()),
                Token::Op(Operator::Eq),
                Token::Literal("a".into()),
                Token::RBracket,
                Token::Slash,
                Token::DotDot,
            ]
        );
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(tokenize("*").unwrap(), vec![Token::Wildcard(None)]);
        assert_eq!(
            tokenize("2 * 3").unwrap(),
            vec![Token::Number(2.0), Token::Op(Operator::Mul), Token::Number(3.0)]
        );
        assert_eq!(
            tokenize("a/*").unwrap(),
            vec![Token::Name("a".into()), Token::Slash, Token::Wildcard(None)]
        );
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            tokenize("div div div").unwrap(),
            vec![
                Token::Name("div".into()),
                Token::Op(Operator::Div),
                Token::Name("div".into()),
            ]
        );
    }

    #[test]
    fn test_axes_and_qnames() {
        assert_eq!(
            tokenize("ancestor-or-self::x:suite").unwrap(),
            vec![Token::Axis("ancestor-or-self".into()), Token::Name("x:suite".into())]
        );
        assert_eq!(tokenize("x:*").unwrap(), vec![Token::Wildcard(Some("x".into()))]);
        assert_eq!(tokenize("$total").unwrap(), vec![Token::Variable("total".into())]);
    }

    #[test]
    fn test_numbers_and_errors() {
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Number(0.5)]);
        assert_eq!(tokenize("10.25").unwrap(), vec![Token::Number(10.25)]);
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a # b").is_err());
    }
}
