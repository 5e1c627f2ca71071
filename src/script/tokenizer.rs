//! logos-based expression tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `3.14` as [`Token::Float`] beats `3` + `.` + `14`)
//! 2. For equal length matches, literal tokens beat regexes
//!
//! So `true`, `nil`, `and` lex as keywords while `trueish` is an [`Token::Ident`].

use logos::Logos;

use super::parser::CompileError;

/// Expression token produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"([ \t\n\r\f]+|//[^\n]*)")]
pub enum Token {
    // ── Literals ─────────────────────────────────────────────────────

    /// Float with a fractional part and optional exponent: `3.5`, `1.0e3`.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    Float,

    /// Decimal integer.
    #[regex(r"[0-9]+")]
    Int,

    /// Hex color: `#fff`, `#ff00aa`, `#ff00aa80`.
    #[regex(r"#[0-9a-fA-F]{3,8}")]
    HexColor,

    /// Double-quoted string with backslash escapes.
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,

    /// Single-quoted string with backslash escapes.
    #[regex(r"'([^'\\]|\\.)*'")]
    StringLiteralSingle,

    // ── Keywords ─────────────────────────────────────────────────────

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("nil")]
    Nil,

    #[token("and")]
    AndWord,

    #[token("or")]
    OrWord,

    #[token("not")]
    NotWord,

    /// Identifier: property names, component ids, functions.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Operators (longer first) ─────────────────────────────────────

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LessEq,

    #[token(">=")]
    GreaterEq,

    #[token("&&")]
    AndAnd,

    #[token("||")]
    OrOr,

    #[token("=")]
    Assign,

    #[token("<")]
    Less,

    #[token(">")]
    Greater,

    #[token("!")]
    Bang,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("?")]
    Question,

    // ── Punctuation ──────────────────────────────────────────────────

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,
}

/// A token together with its source text and byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub text: String,
    pub offset: usize,
}

/// Tokenize an expression source.
///
/// Unlike lenient stylesheet lexing, an unrecognized character is a
/// compile error: a binding with a typo must not silently change meaning.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, CompileError> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(Spanned {
                token,
                text: input[span.clone()].to_string(),
                offset: span.start,
            }),
            Err(()) => {
                return Err(CompileError::new(
                    span.start,
                    format!("unexpected character `{}`", &input[span]),
                ))
            }
        }
    }
    Ok(tokens)
}
