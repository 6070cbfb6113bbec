//! Abstract Syntax Tree (AST) for Marsh
//!
//! The AST represents the structure of a Marsh program after parsing.
//! Statements and expressions are closed sum types; every node owns its
//! children.
//!
//! # Export format
//!
//! The tree serializes to nested JSON objects. Every node object carries a
//! `"type"` key naming its variant (`"Program"`, `"Infix"`, `"While"`, ...)
//! followed by its fields in declaration order; operators serialize as their
//! source symbols. External visualization tooling depends on these key names.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::token::TokenKind;

/// A complete Marsh program (compilation unit)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Rebuild a program from its JSON export
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A brace-delimited sequence of statements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

// ============ Statements ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    /// `expr;`
    ExpressionStatement(ExpressionStatement),
    /// `let name: type = expr;`
    Assignment(AssignmentStatement),
    /// `name = expr;`
    Reassignment(ReassignmentStatement),
    /// `return expr;`
    Return(ReturnStatement),
    /// `if cond { ... } else { ... }`
    If(IfStatement),
    /// `while cond { ... }`
    While(WhileStatement),
    /// `for i in 0..10 { ... }`
    For(ForStatement),
    /// `fn name() -> type { ... }`
    FunctionDecl(FunctionDecl),
}

impl Statement {
    /// Variant name, identical to the `"type"` key of the export
    pub fn node_type(&self) -> &'static str {
        match self {
            Statement::ExpressionStatement(_) => "ExpressionStatement",
            Statement::Assignment(_) => "Assignment",
            Statement::Reassignment(_) => "Reassignment",
            Statement::Return(_) => "Return",
            Statement::If(_) => "If",
            Statement::While(_) => "While",
            Statement::For(_) => "For",
            Statement::FunctionDecl(_) => "FunctionDecl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatement {
    pub name: String,
    /// Annotated type keyword (`int`, `float`, `bool`)
    pub value_type: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReassignmentStatement {
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expression,
    pub consequence: Block,
    /// Empty when the source has no `else`
    pub alternative: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Expression,
    pub body: Block,
}

/// Ascending, step-1 counting loop over `range_start..range_end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub variable: String,
    pub range_start: i64,
    pub range_end: i64,
    /// Loop test evaluated before every iteration
    pub condition: Expression,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: String,
    pub body: Block,
}

// ============ Expressions ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    Infix(InfixExpression),
    Prefix(PrefixExpression),
    Call(CallExpression),
    IntegerLiteral(IntegerLiteral),
    FloatLiteral(FloatLiteral),
    BooleanLiteral(BooleanLiteral),
    Identifier(Identifier),
}

impl Expression {
    pub fn infix(left: Expression, operator: InfixOperator, right: Expression) -> Self {
        Expression::Infix(InfixExpression {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    pub fn prefix(operator: PrefixOperator, operand: Expression) -> Self {
        Expression::Prefix(PrefixExpression {
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn int(value: i64) -> Self {
        Expression::IntegerLiteral(IntegerLiteral { value })
    }

    pub fn float(value: f64) -> Self {
        Expression::FloatLiteral(FloatLiteral { value })
    }

    pub fn boolean(value: bool) -> Self {
        Expression::BooleanLiteral(BooleanLiteral { value })
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expression::Identifier(Identifier { name: name.into() })
    }

    pub fn call(function: impl Into<String>) -> Self {
        Expression::Call(CallExpression {
            function: function.into(),
        })
    }

    /// Variant name, identical to the `"type"` key of the export
    pub fn node_type(&self) -> &'static str {
        match self {
            Expression::Infix(_) => "Infix",
            Expression::Prefix(_) => "Prefix",
            Expression::Call(_) => "Call",
            Expression::IntegerLiteral(_) => "IntegerLiteral",
            Expression::FloatLiteral(_) => "FloatLiteral",
            Expression::BooleanLiteral(_) => "BooleanLiteral",
            Expression::Identifier(_) => "Identifier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfixExpression {
    pub left: Box<Expression>,
    pub operator: InfixOperator,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixExpression {
    pub operator: PrefixOperator,
    pub operand: Box<Expression>,
}

/// Zero-argument call: the language has no parameter lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegerLiteral {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatLiteral {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanLiteral {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
}

// ============ Operators ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfixOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Rem,
    #[serde(rename = "^")]
    BwXor,
    #[serde(rename = "|")]
    BwOr,
    #[serde(rename = "&")]
    BwAnd,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl InfixOperator {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Plus => InfixOperator::Add,
            TokenKind::Minus => InfixOperator::Sub,
            TokenKind::Asterisk => InfixOperator::Mul,
            TokenKind::Slash => InfixOperator::Div,
            TokenKind::Percent => InfixOperator::Rem,
            TokenKind::BwXor => InfixOperator::BwXor,
            TokenKind::BwOr => InfixOperator::BwOr,
            TokenKind::BwAnd => InfixOperator::BwAnd,
            TokenKind::EqEq => InfixOperator::Eq,
            TokenKind::NotEq => InfixOperator::Ne,
            TokenKind::Lt => InfixOperator::Lt,
            TokenKind::Gt => InfixOperator::Gt,
            TokenKind::LtEq => InfixOperator::Le,
            TokenKind::GtEq => InfixOperator::Ge,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            InfixOperator::Add => "+",
            InfixOperator::Sub => "-",
            InfixOperator::Mul => "*",
            InfixOperator::Div => "/",
            InfixOperator::Rem => "%",
            InfixOperator::BwXor => "^",
            InfixOperator::BwOr => "|",
            InfixOperator::BwAnd => "&",
            InfixOperator::Eq => "==",
            InfixOperator::Ne => "!=",
            InfixOperator::Lt => "<",
            InfixOperator::Gt => ">",
            InfixOperator::Le => "<=",
            InfixOperator::Ge => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            InfixOperator::Eq
                | InfixOperator::Ne
                | InfixOperator::Lt
                | InfixOperator::Gt
                | InfixOperator::Le
                | InfixOperator::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefixOperator {
    #[serde(rename = "~")]
    BwNot,
}

impl PrefixOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            PrefixOperator::BwNot => "~",
        }
    }
}

// ============ Source-like rendering ============

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for statement in &self.statements {
            write!(f, " {}", statement)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::ExpressionStatement(s) => write!(f, "{};", s.expression),
            Statement::Assignment(s) => {
                write!(f, "let {}: {} = {};", s.name, s.value_type, s.value)
            }
            Statement::Reassignment(s) => write!(f, "{} = {};", s.name, s.value),
            Statement::Return(s) => write!(f, "return {};", s.value),
            Statement::If(s) => {
                write!(f, "if {} {}", s.condition, s.consequence)?;
                if !s.alternative.is_empty() {
                    write!(f, " else {}", s.alternative)?;
                }
                Ok(())
            }
            Statement::While(s) => write!(f, "while {} {}", s.condition, s.body),
            Statement::For(s) => write!(
                f,
                "for {} in {}..{} {}",
                s.variable, s.range_start, s.range_end, s.body
            ),
            Statement::FunctionDecl(s) => {
                write!(f, "fn {}() -> {} {}", s.name, s.return_type, s.body)
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Infix(e) => write!(f, "({} {} {})", e.left, e.operator, e.right),
            Expression::Prefix(e) => write!(f, "({}{})", e.operator, e.operand),
            Expression::Call(e) => write!(f, "{}()", e.function),
            Expression::IntegerLiteral(e) => write!(f, "{}", e.value),
            Expression::FloatLiteral(e) => write!(f, "{:?}", e.value),
            Expression::BooleanLiteral(e) => write!(f, "{}", e.value),
            Expression::Identifier(e) => write!(f, "{}", e.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> Program {
        Program::new(vec![
            Statement::Assignment(AssignmentStatement {
                name: "x".into(),
                value_type: "int".into(),
                value: Expression::infix(
                    Expression::int(2),
                    InfixOperator::Add,
                    Expression::infix(Expression::int(3), InfixOperator::Mul, Expression::int(4)),
                ),
            }),
            Statement::If(IfStatement {
                condition: Expression::infix(
                    Expression::ident("x"),
                    InfixOperator::Ge,
                    Expression::int(10),
                ),
                consequence: Block::new(vec![Statement::Return(ReturnStatement {
                    value: Expression::prefix(PrefixOperator::BwNot, Expression::ident("x")),
                })]),
                alternative: Block::default(),
            }),
        ])
    }

    #[test]
    fn test_export_uses_type_keys() {
        let json: Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "Program");
        assert_eq!(json["statements"][0]["type"], "Assignment");
        assert_eq!(json["statements"][0]["value"]["type"], "Infix");
        assert_eq!(json["statements"][0]["value"]["operator"], "+");
        assert_eq!(json["statements"][0]["value"]["right"]["operator"], "*");
        assert_eq!(json["statements"][1]["consequence"]["type"], "Block");
        assert_eq!(
            json["statements"][1]["consequence"]["statements"][0]["value"]["operator"],
            "~"
        );
    }

    #[test]
    fn test_export_round_trip() {
        let program = sample();
        let json = program.to_json_pretty().unwrap();
        let rebuilt = Program::from_json(&json).unwrap();
        assert_eq!(rebuilt, program);
        assert_eq!(rebuilt.to_json().unwrap(), program.to_json().unwrap());
    }

    #[test]
    fn test_display_parenthesizes() {
        let rendered = sample().to_string();
        assert_eq!(
            rendered,
            "let x: int = (2 + (3 * 4));\nif (x >= 10) { return (~x); }"
        );
    }

    #[test]
    fn test_node_type_matches_export() {
        for statement in &sample().statements {
            let json = serde_json::to_value(statement).unwrap();
            assert_eq!(json["type"], statement.node_type());
        }
    }

    #[test]
    fn test_operator_from_token() {
        assert_eq!(InfixOperator::from_token(TokenKind::LtEq), Some(InfixOperator::Le));
        assert_eq!(InfixOperator::from_token(TokenKind::BwNot), None);
        assert!(InfixOperator::Ne.is_comparison());
        assert!(!InfixOperator::BwAnd.is_comparison());
    }
}
