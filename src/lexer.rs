//! Lexer for Marsh
//!
//! The lexer converts source code into a stream of tokens on demand.
//! Raw scanning is done by the `logos` crate; this wrapper classifies numeric
//! runs, resolves keywords, attaches row/column positions and queues the extra
//! tokens produced when one scan yields several (a range literal `0..3` is
//! emitted as integer, range separator, integer).
//!
//! The lexer never fails: anything it cannot classify becomes an
//! [`TokenKind::Illegal`] token for the parser to reject.

use std::collections::VecDeque;
use std::ops::Range;

use crate::span::{LineIndex, Position};
use crate::token::{lookup_ident, Token, TokenKind};
use logos::Logos;

/// Raw lexemes recognized by logos before classification
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Lexeme {
    /// Maximal run of digits and dots: `42`, `3.14`, `0..10`, `1.2.3`
    #[regex(r"[0-9][0-9.]*")]
    Number,

    /// Identifier or keyword
    #[regex(r"[A-Za-z_]+")]
    Word,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("|")]
    Pipe,
    #[token("&")]
    Ampersand,
    #[token("~")]
    Tilde,
    #[token("=")]
    Assign,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("->")]
    Arrow,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
}

impl Lexeme {
    /// Token kind of a fixed-spelling lexeme
    fn fixed_kind(self) -> Option<TokenKind> {
        let kind = match self {
            Lexeme::Number | Lexeme::Word => return None,
            Lexeme::Plus => TokenKind::Plus,
            Lexeme::Minus => TokenKind::Minus,
            Lexeme::Asterisk => TokenKind::Asterisk,
            Lexeme::Slash => TokenKind::Slash,
            Lexeme::Percent => TokenKind::Percent,
            Lexeme::Caret => TokenKind::BwXor,
            Lexeme::Pipe => TokenKind::BwOr,
            Lexeme::Ampersand => TokenKind::BwAnd,
            Lexeme::Tilde => TokenKind::BwNot,
            Lexeme::Assign => TokenKind::Assign,
            Lexeme::EqEq => TokenKind::EqEq,
            Lexeme::NotEq => TokenKind::NotEq,
            Lexeme::Lt => TokenKind::Lt,
            Lexeme::Gt => TokenKind::Gt,
            Lexeme::LtEq => TokenKind::LtEq,
            Lexeme::GtEq => TokenKind::GtEq,
            Lexeme::Arrow => TokenKind::Arrow,
            Lexeme::LParen => TokenKind::LParen,
            Lexeme::RParen => TokenKind::RParen,
            Lexeme::LBrace => TokenKind::LBrace,
            Lexeme::RBrace => TokenKind::RBrace,
            Lexeme::Colon => TokenKind::Colon,
            Lexeme::Comma => TokenKind::Comma,
            Lexeme::Semicolon => TokenKind::Semicolon,
        };
        Some(kind)
    }
}

/// How a digit/dot run is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberShape {
    Int,
    Float,
    /// `a..b`; holds the byte length of `a`
    Range(usize),
    Illegal,
}

fn classify_number(text: &str) -> NumberShape {
    match text.matches('.').count() {
        0 => NumberShape::Int,
        1 => NumberShape::Float,
        2 => match text.split_once("..") {
            Some((start, end)) if !start.is_empty() && !end.is_empty() && !end.contains('.') => {
                NumberShape::Range(start.len())
            }
            _ => NumberShape::Illegal,
        },
        _ => NumberShape::Illegal,
    }
}

/// The lexer for Marsh
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, Lexeme>,
    lines: LineIndex,
    /// Tokens already scanned but not yet handed out
    pending: VecDeque<Token>,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: Lexeme::lexer(source),
            lines: LineIndex::new(source),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Get the next token. Once the input is exhausted this keeps returning
    /// `Eof`.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop_front() {
            return token;
        }
        if self.finished {
            return self.eof();
        }

        match self.inner.next() {
            Some(Ok(lexeme)) => {
                let span = self.inner.span();
                self.classify(lexeme, span)
            }
            Some(Err(())) => {
                let span = self.inner.span();
                self.token(TokenKind::Illegal, span)
            }
            None => {
                self.finished = true;
                self.eof()
            }
        }
    }

    /// Collect all tokens into a vector (the last one is `Eof`)
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is(TokenKind::Eof);
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn classify(&mut self, lexeme: Lexeme, span: Range<usize>) -> Token {
        if let Some(kind) = lexeme.fixed_kind() {
            return self.token(kind, span);
        }

        let text = self.slice(span.clone());
        match lexeme {
            Lexeme::Word => self.token(lookup_ident(text), span),
            _ => match classify_number(text) {
                NumberShape::Int => self.token(TokenKind::Int, span),
                NumberShape::Float => self.token(TokenKind::Float, span),
                NumberShape::Illegal => self.token(TokenKind::Illegal, span),
                NumberShape::Range(start_len) => {
                    let separator = span.start + start_len;
                    let end = separator + 2;
                    let separator_token = self.token(TokenKind::RangeSeparator, separator..end);
                    let end_token = self.token(TokenKind::Int, end..span.end);
                    self.pending.push_back(separator_token);
                    self.pending.push_back(end_token);
                    self.token(TokenKind::Int, span.start..separator)
                }
            },
        }
    }

    fn token(&self, kind: TokenKind, span: Range<usize>) -> Token {
        let position = self.position(span.start);
        Token::new(kind, self.slice(span), position)
    }

    fn eof(&self) -> Token {
        Token::new(TokenKind::Eof, "EOF", self.position(self.source.len()))
    }

    fn slice(&self, span: Range<usize>) -> &'src str {
        self.source.get(span).unwrap_or_default()
    }

    fn position(&self, offset: usize) -> Position {
        self.lines.position(self.source, offset)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.is(TokenKind::Eof) {
            None
        } else {
            Some(token)
        }
    }
}

/// Helper function to lex source code
pub fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

/// Lex source given as an ordered sequence of lines
pub fn lex_lines<S: AsRef<str>>(lines: &[S]) -> Vec<Token> {
    let source = join_lines(lines);
    lex(&source)
}

pub(crate) fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n")
}
