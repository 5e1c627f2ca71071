//! Recursive descent expression parser.
//!
//! Parses source text into a [`Block`] using the logos-based tokenizer from
//! [`crate::script::tokenizer`]. Precedence, lowest first:
//!
//! ```text
//! statement   := expression ( "=" expression )?
//! expression  := or ( "?" expression ":" expression )?
//! or          := and ( ("||" | "or") and )*
//! and         := equality ( ("&&" | "and") equality )*
//! equality    := comparison ( ("==" | "!=") comparison )*
//! comparison  := additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive    := term ( ("+" | "-") term )*
//! term        := unary ( ("*" | "/" | "%") unary )*
//! unary       := ("-" | "!" | "not") unary | postfix
//! postfix     := primary ( "." ident | "[" expression "]" | "(" args ")" )*
//! ```

use super::ast::{BinaryOp, Block, Expr, UnaryOp};
use super::tokenizer::{tokenize, Spanned, Token};
use crate::value::{Color, Variant};

/// A syntax error in an expression source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at offset {offset})")]
pub struct CompileError {
    /// Byte offset in the source where the problem was detected.
    pub offset: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Parse an expression source into a [`Block`].
pub fn parse(source: &str) -> Result<Block, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: source.len(),
    };

    let mut statements = Vec::new();
    while !parser.is_eof() {
        statements.push(parser.parse_statement()?);
        if parser.is_eof() {
            break;
        }
        parser.expect(&Token::Semicolon)?;
    }

    if statements.is_empty() {
        return Err(CompileError::new(0, "empty expression"));
    }
    Ok(Block { statements })
}

/// Recursive descent parser state.
struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    /// Source length, reported as the offset of end-of-input errors.
    end: usize,
}

impl Parser {
    fn is_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map_or(self.end, |t| t.offset)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Spanned, CompileError> {
        let offset = self.offset();
        match self.advance() {
            Some(tok) if &tok.token == expected => Ok(tok),
            Some(tok) => Err(CompileError::new(
                offset,
                format!("expected {expected:?}, got `{}`", tok.text),
            )),
            None => Err(CompileError::new(
                offset,
                format!("expected {expected:?}, got end of input"),
            )),
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, CompileError> {
        let offset = self.offset();
        match self.advance() {
            Some(tok) if tok.token == Token::Ident => Ok(tok.text),
            Some(tok) => Err(CompileError::new(
                offset,
                format!("expected identifier {context}, got `{}`", tok.text),
            )),
            None => Err(CompileError::new(
                offset,
                format!("expected identifier {context}, got end of input"),
            )),
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Expr, CompileError> {
        let offset = self.offset();
        let target = self.parse_expression()?;
        if !self.eat(&Token::Assign) {
            return Ok(target);
        }
        if !matches!(target, Expr::Ident(_) | Expr::Member(..)) {
            return Err(CompileError::new(
                offset,
                "left side of `=` must be a property path",
            ));
        }
        let value = self.parse_expression()?;
        Ok(Expr::Assign(Box::new(target), Box::new(value)))
    }

    // ── Binary operators ─────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        let condition = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.parse_expression()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.parse_expression()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr | Token::OrWord)) {
            self.cursor += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::AndAnd | Token::AndWord)) {
            self.cursor += 1;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinaryOp::Lt,
                Some(Token::LessEq) => BinaryOp::Le,
                Some(Token::Greater) => BinaryOp::Gt,
                Some(Token::GreaterEq) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.cursor += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang | Token::NotWord) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.cursor += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    // ── Postfix and primaries ────────────────────────────────────────

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.cursor += 1;
                    let name = self.expect_ident("after `.`")?;
                    expr = Expr::Member(Box::new(expr), name);
                }
                Some(Token::BracketOpen) => {
                    self.cursor += 1;
                    let index = self.parse_expression()?;
                    self.expect(&Token::BracketClose)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::ParenOpen) => {
                    self.cursor += 1;
                    let args = self.parse_list_items(&Token::ParenClose)?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let offset = self.offset();
        let Some(tok) = self.advance() else {
            return Err(CompileError::new(offset, "unexpected end of input"));
        };

        let literal = |value: Variant| -> Result<Expr, CompileError> { Ok(Expr::Literal(value)) };
        match tok.token {
            Token::Int => tok
                .text
                .parse::<i64>()
                .map(|i| Expr::Literal(Variant::Int(i)))
                .map_err(|_| CompileError::new(offset, format!("integer `{}` out of range", tok.text))),
            Token::Float => tok
                .text
                .parse::<f64>()
                .map(|f| Expr::Literal(Variant::Float(f)))
                .map_err(|_| CompileError::new(offset, format!("invalid float `{}`", tok.text))),
            Token::HexColor => Color::parse(&tok.text)
                .map(|c| Expr::Literal(Variant::Color(c)))
                .ok_or_else(|| CompileError::new(offset, format!("invalid color `{}`", tok.text))),
            Token::StringLiteral | Token::StringLiteralSingle => {
                literal(Variant::Str(unescape(&tok.text[1..tok.text.len() - 1])))
            }
            Token::True => literal(Variant::Bool(true)),
            Token::False => literal(Variant::Bool(false)),
            Token::Nil => literal(Variant::Nil),
            Token::Ident => Ok(Expr::Ident(tok.text)),
            Token::ParenOpen => {
                let inner = self.parse_expression()?;
                self.expect(&Token::ParenClose)?;
                Ok(inner)
            }
            Token::BracketOpen => Ok(Expr::List(self.parse_list_items(&Token::BracketClose)?)),
            Token::BraceOpen => self.parse_record(),
            _ => Err(CompileError::new(
                offset,
                format!("unexpected `{}`", tok.text),
            )),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_list_items(&mut self, close: &Token) -> Result<Vec<Expr>, CompileError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    /// `{ key: expr, "other key": expr }`, after the opening brace.
    fn parse_record(&mut self) -> Result<Expr, CompileError> {
        let mut fields: Vec<(String, Expr)> = Vec::new();
        loop {
            if self.eat(&Token::BraceClose) {
                return Ok(Expr::Record(fields));
            }
            let offset = self.offset();
            let key = match self.advance() {
                Some(tok) if tok.token == Token::Ident => tok.text,
                Some(tok)
                    if matches!(tok.token, Token::StringLiteral | Token::StringLiteralSingle) =>
                {
                    unescape(&tok.text[1..tok.text.len() - 1])
                }
                _ => return Err(CompileError::new(offset, "expected record key")),
            };
            if fields.iter().any(|(existing, _)| *existing == key) {
                return Err(CompileError::new(offset, format!("duplicate key `{key}`")));
            }
            self.expect(&Token::Colon)?;
            let value = self.parse_expression()?;
            fields.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(&Token::BraceClose)?;
                return Ok(Expr::Record(fields));
            }
        }
    }
}

/// Resolve backslash escapes inside a string literal body.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
