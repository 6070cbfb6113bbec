//! Token definitions for Marsh
//!
//! This module defines every token kind the lexer can produce, plus the
//! keyword table that turns identifier text into reserved words.

use crate::span::Position;
use phf::phf_map;
use std::fmt;

/// Reserved words and type keywords.
///
/// The lexer scans identifiers first and then consults this table, so a word
/// that is not listed here is always an [`TokenKind::Ident`].
static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "fn" => TokenKind::Fn,
    "let" => TokenKind::Let,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "int" => TokenKind::Type,
    "float" => TokenKind::Type,
    "bool" => TokenKind::Type,
};

/// Classify identifier text: a keyword kind if reserved, `Ident` otherwise.
pub fn lookup_ident(text: &str) -> TokenKind {
    KEYWORDS.get(text).copied().unwrap_or(TokenKind::Ident)
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token (`"EOF"` for end of input)
    pub literal: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            literal: literal.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} @ {}", self.kind, self.literal, self.position)
    }
}

/// All possible token kinds in Marsh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ============ Literals ============
    Int,
    Float,
    Ident,
    /// Type keyword: `int`, `float`, `bool` (the literal holds which one)
    Type,

    // ============ Keywords ============
    Fn,
    Let,
    Return,
    If,
    Else,
    While,
    For,
    In,
    True,
    False,

    // ============ Operators ============
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    /// `^`
    BwXor,
    /// `|`
    BwOr,
    /// `&`
    BwAnd,
    /// `~`
    BwNot,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Arrow,
    /// `..` between the bounds of a range literal
    RangeSeparator,

    // ============ Delimiters ============
    LParen,
    RParen,
    LBrace,
    RBrace,

    // ============ Punctuation ============
    Colon,
    Comma,
    Semicolon,

    // ============ Special ============
    Eof,
    Illegal,
}

impl TokenKind {
    /// Check if this token is a binary operator
    pub fn is_infix_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::BwXor
                | TokenKind::BwOr
                | TokenKind::BwAnd
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Ident => "identifier",
            TokenKind::Type => "type",
            TokenKind::Fn => "fn",
            TokenKind::Let => "let",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::BwXor => "^",
            TokenKind::BwOr => "|",
            TokenKind::BwAnd => "&",
            TokenKind::BwNot => "~",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::Arrow => "->",
            TokenKind::RangeSeparator => "..",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Eof => "end of file",
            TokenKind::Illegal => "illegal token",
        };
        write!(f, "{}", s)
    }
}
