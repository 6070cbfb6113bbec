//! Parser for Marsh
//!
//! Statements are parsed by recursive descent; expressions by precedence
//! climbing (Pratt parsing). The parser keeps the current token and a
//! one-token lookahead, pulling fresh tokens from the lexer on demand.
//!
//! Errors never abort the parse. A statement that hits an unexpected token
//! records a [`ParseError`] and yields no node; the parser then moves on to the
//! next statement. Callers must not lower a program whose parse produced
//! diagnostics.

use std::mem;

use crate::ast::*;
use crate::lexer::Lexer;
use crate::span::Position;
use crate::token::{Token, TokenKind};
use thiserror::Error;
use tracing::debug;

/// Parser errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{position}: expected next token to be {expected}, got {found} `{literal}` instead")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
        literal: String,
        position: Position,
    },

    #[error("{position}: no prefix parse rule for {found} `{literal}`")]
    NoPrefixRule {
        found: TokenKind,
        literal: String,
        position: Position,
    },

    #[error("{position}: could not parse `{literal}` as an integer")]
    InvalidInteger { literal: String, position: Position },

    #[error("{position}: could not parse `{literal}` as a float")]
    InvalidFloat { literal: String, position: Position },

    #[error("{position}: only a plain function name can be called")]
    NotCallable { position: Position },

    #[error("{position}: block is missing its closing `}}`")]
    UnterminatedBlock { position: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::NoPrefixRule { position, .. }
            | ParseError::InvalidInteger { position, .. }
            | ParseError::InvalidFloat { position, .. }
            | ParseError::NotCallable { position }
            | ParseError::UnterminatedBlock { position } => *position,
        }
    }
}

/// Binding power of operators, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    /// `==` `!=`
    Equals,
    /// `<` `>` `<=` `>=`
    LessGreater,
    /// `|`
    BwOr,
    /// `^`
    BwXor,
    /// `&`
    BwAnd,
    /// Tier of unary `~` in the ladder
    BwNot,
    /// `+` `-`
    Sum,
    /// `*` `/` `%`
    Product,
    Exponent,
    Prefix,
    /// `f()`
    Call,
    Index,
}

impl Precedence {
    /// Precedence of a token in infix position
    pub fn of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::EqEq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
                Precedence::LessGreater
            }
            TokenKind::BwOr => Precedence::BwOr,
            TokenKind::BwXor => Precedence::BwXor,
            TokenKind::BwAnd => Precedence::BwAnd,
            TokenKind::BwNot => Precedence::BwNot,
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
            TokenKind::LParen => Precedence::Call,
            _ => Precedence::Lowest,
        }
    }
}

type PrefixParseFn<'src> = fn(&mut Parser<'src>) -> Option<Expression>;
type InfixParseFn<'src> = fn(&mut Parser<'src>, Expression) -> Option<Expression>;

/// The parser for Marsh
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    peek: Token,
    errors: Vec<ParseError>,
}

impl<'src> Parser<'src> {
    /// Create a new parser
    pub fn new(source: &'src str) -> Self {
        Self::from_lexer(Lexer::new(source))
    }

    pub fn from_lexer(mut lexer: Lexer<'src>) -> Self {
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Self {
            lexer,
            current,
            peek,
            errors: Vec::new(),
        }
    }

    /// Get parse errors recorded so far
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    // ============ Token stream ============

    fn advance(&mut self) {
        let next = self.lexer.next_token();
        self.current = mem::replace(&mut self.peek, next);
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current.is(kind)
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.is(kind)
    }

    /// Advance if the lookahead is `kind`; record a diagnostic otherwise
    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.advance();
            true
        } else {
            self.error(ParseError::UnexpectedToken {
                expected: kind,
                found: self.peek.kind,
                literal: self.peek.literal.clone(),
                position: self.peek.position,
            });
            false
        }
    }

    fn error(&mut self, error: ParseError) {
        debug!(%error, "parse diagnostic");
        self.errors.push(error);
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::of(self.peek.kind)
    }

    fn current_precedence(&self) -> Precedence {
        Precedence::of(self.current.kind)
    }

    // ============ Statements ============

    /// Parse a complete program, returning it with every diagnostic recorded
    pub fn parse_program(&mut self) -> (Program, Vec<ParseError>) {
        let mut program = Program::default();

        while !self.current_is(TokenKind::Eof) {
            if let Some(statement) = self.parse_statement() {
                program.statements.push(statement);
            }
            self.advance();
        }

        (program, mem::take(&mut self.errors))
    }

    /// On success the current token is the last token of the statement.
    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current.kind {
            TokenKind::Fn => self.parse_function_declaration(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Let => self.parse_assignment_statement(),
            TokenKind::Ident if !self.peek_is(TokenKind::LParen) => {
                self.parse_reassignment_statement()
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_function_declaration(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.current.literal.clone();

        if !self.expect_peek(TokenKind::LParen)
            || !self.expect_peek(TokenKind::RParen)
            || !self.expect_peek(TokenKind::Arrow)
            || !self.expect_peek(TokenKind::Type)
        {
            return None;
        }
        let return_type = self.current.literal.clone();

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block();

        Some(Statement::FunctionDecl(FunctionDecl {
            name,
            return_type,
            body,
        }))
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::Semicolon) {
            return None;
        }

        Some(Statement::Return(ReturnStatement { value }))
    }

    fn parse_assignment_statement(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.current.literal.clone();

        if !self.expect_peek(TokenKind::Colon) || !self.expect_peek(TokenKind::Type) {
            return None;
        }
        let value_type = self.current.literal.clone();

        if !self.expect_peek(TokenKind::Assign) {
            return None;
        }
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::Semicolon) {
            return None;
        }

        Some(Statement::Assignment(AssignmentStatement {
            name,
            value_type,
            value,
        }))
    }

    fn parse_reassignment_statement(&mut self) -> Option<Statement> {
        let name = self.current.literal.clone();

        if !self.expect_peek(TokenKind::Assign) {
            return None;
        }
        self.advance();
        let value = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::Semicolon) {
            return None;
        }

        Some(Statement::Reassignment(ReassignmentStatement { name, value }))
    }

    fn parse_if_statement(&mut self) -> Option<Statement> {
        self.advance();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let consequence = self.parse_block();

        let alternative = if self.peek_is(TokenKind::Else) {
            self.advance();
            if !self.expect_peek(TokenKind::LBrace) {
                return None;
            }
            self.parse_block()
        } else {
            Block::default()
        };

        Some(Statement::If(IfStatement {
            condition,
            consequence,
            alternative,
        }))
    }

    fn parse_while_statement(&mut self) -> Option<Statement> {
        self.advance();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block();

        Some(Statement::While(WhileStatement { condition, body }))
    }

    /// `for i in 0..10 { ... }`; the test `i < 10` is built here.
    fn parse_for_statement(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let variable = self.current.literal.clone();

        if !self.expect_peek(TokenKind::In) || !self.expect_peek(TokenKind::Int) {
            return None;
        }
        let range_start = self.integer_value()?;

        if !self.expect_peek(TokenKind::RangeSeparator) || !self.expect_peek(TokenKind::Int) {
            return None;
        }
        let range_end = self.integer_value()?;

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block();

        let condition = Expression::infix(
            Expression::ident(variable.clone()),
            InfixOperator::Lt,
            Expression::int(range_end),
        );

        Some(Statement::For(ForStatement {
            variable,
            range_start,
            range_end,
            condition,
            body,
        }))
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;

        if self.peek_is(TokenKind::Semicolon) {
            self.advance();
        }

        Some(Statement::ExpressionStatement(ExpressionStatement {
            expression,
        }))
    }

    /// Called with the current token on `{`; returns with it on `}`.
    fn parse_block(&mut self) -> Block {
        let mut block = Block::default();
        self.advance();

        while !self.current_is(TokenKind::RBrace) && !self.current_is(TokenKind::Eof) {
            if let Some(statement) = self.parse_statement() {
                block.statements.push(statement);
            }
            self.advance();
        }

        if self.current_is(TokenKind::Eof) {
            self.error(ParseError::UnterminatedBlock {
                position: self.current.position,
            });
        }

        block
    }

    // ============ Expressions ============

    fn prefix_rule(kind: TokenKind) -> Option<PrefixParseFn<'src>> {
        let rule: PrefixParseFn<'src> = match kind {
            TokenKind::Int => Self::parse_integer_literal,
            TokenKind::Float => Self::parse_float_literal,
            TokenKind::True | TokenKind::False => Self::parse_boolean_literal,
            TokenKind::Ident => Self::parse_identifier,
            TokenKind::LParen => Self::parse_grouped_expression,
            TokenKind::BwNot => Self::parse_bitwise_not,
            _ => return None,
        };
        Some(rule)
    }

    fn infix_rule(kind: TokenKind) -> Option<InfixParseFn<'src>> {
        if kind.is_infix_operator() {
            Some(Self::parse_infix_expression)
        } else if kind == TokenKind::LParen {
            Some(Self::parse_call_expression)
        } else {
            None
        }
    }

    /// Parse an expression whose operators all bind tighter than `precedence`
    pub fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let Some(prefix) = Self::prefix_rule(self.current.kind) else {
            self.error(ParseError::NoPrefixRule {
                found: self.current.kind,
                literal: self.current.literal.clone(),
                position: self.current.position,
            });
            return None;
        };

        let mut left = prefix(self)?;

        while !self.peek_is(TokenKind::Semicolon) && precedence < self.peek_precedence() {
            let Some(infix) = Self::infix_rule(self.peek.kind) else {
                return Some(left);
            };
            self.advance();
            left = infix(self, left)?;
        }

        Some(left)
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = InfixOperator::from_token(self.current.kind)?;
        let precedence = self.current_precedence();
        self.advance();
        let right = self.parse_expression(precedence)?;

        Some(Expression::infix(left, operator, right))
    }

    fn parse_call_expression(&mut self, callee: Expression) -> Option<Expression> {
        let Expression::Identifier(Identifier { name }) = callee else {
            self.error(ParseError::NotCallable {
                position: self.current.position,
            });
            return None;
        };

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }

        Some(Expression::call(name))
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.advance();
        let expression = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }

        Some(expression)
    }

    fn parse_bitwise_not(&mut self) -> Option<Expression> {
        self.advance();
        // The operand extends as far right as a full expression
        let operand = self.parse_expression(Precedence::Lowest)?;

        Some(Expression::prefix(PrefixOperator::BwNot, operand))
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        self.integer_value().map(Expression::int)
    }

    fn parse_float_literal(&mut self) -> Option<Expression> {
        match self.current.literal.parse::<f64>() {
            Ok(value) => Some(Expression::float(value)),
            Err(_) => {
                self.error(ParseError::InvalidFloat {
                    literal: self.current.literal.clone(),
                    position: self.current.position,
                });
                None
            }
        }
    }

    fn parse_boolean_literal(&mut self) -> Option<Expression> {
        Some(Expression::boolean(self.current_is(TokenKind::True)))
    }

    fn parse_identifier(&mut self) -> Option<Expression> {
        Some(Expression::ident(self.current.literal.clone()))
    }

    /// Value of the current integer token; it must fit the language's `int`
    fn integer_value(&mut self) -> Option<i64> {
        match self.current.literal.parse::<i32>() {
            Ok(value) => Some(i64::from(value)),
            Err(_) => {
                self.error(ParseError::InvalidInteger {
                    literal: self.current.literal.clone(),
                    position: self.current.position,
                });
                None
            }
        }
    }
}

/// Parse source code into an AST
pub fn parse(source: &str) -> (Program, Vec<ParseError>) {
    Parser::new(source).parse_program()
}

/// Parse source given as an ordered sequence of lines
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> (Program, Vec<ParseError>) {
    let source = crate::lexer::join_lines(lines);
    parse(&source)
}
