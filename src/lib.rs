//! Marsh Compiler Front End
//!
//! Turns Marsh source text into an SSA-style IR module that a separate
//! backend can verify, optimize and run.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.marsh)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → AST (+ diagnostics)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  IR Lowering│  → Marsh IR, through an IrBuilder
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Verify    │  → Module ready for a backend
//! └─────────────┘
//! ```
//!
//! ```
//! let module = marsh::compile("fn main() -> int { return 1 + 2; }").unwrap();
//! assert_eq!(module.functions[0].name, "main");
//! ```

pub mod span;
pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod env;
pub mod ir;

use thiserror::Error;
use tracing::info;

// Re-exports for convenience
pub use lexer::Lexer;
pub use token::{Token, TokenKind};
pub use span::Position;
pub use parser::{ParseError, Parser};
pub use ir::{LowerError, LowerOptions, Lowerer, Module, VerifyError};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for Marsh source files
pub const FILE_EXTENSION: &str = "marsh";

/// Why a compilation stopped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("{} parse error(s), first: {}", .0.len(), first(.0))]
    Parse(Vec<ParseError>),

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error("{} verifier error(s), first: {}", .0.len(), first(.0))]
    Verify(Vec<VerifyError>),
}

fn first<E: ToString>(errors: &[E]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}

/// Compile source code with default options
pub fn compile(source: &str) -> Result<Module, CompileError> {
    compile_with(source, LowerOptions::default())
}

/// Compile source code given as an ordered sequence of lines
pub fn compile_lines<S: AsRef<str>>(lines: &[S]) -> Result<Module, CompileError> {
    compile(&lexer::join_lines(lines))
}

/// Run the whole pipeline. Lowering never starts when the parser reported
/// anything.
pub fn compile_with(source: &str, options: LowerOptions) -> Result<Module, CompileError> {
    let (program, errors) = parser::parse(source);
    if !errors.is_empty() {
        return Err(CompileError::Parse(errors));
    }

    let verify = options.verify;
    let module = Lowerer::with_options(options).generate(&program)?;
    if verify {
        ir::verify(&module).map_err(CompileError::Verify)?;
    }

    info!(
        module = %module.name,
        statements = program.statements.len(),
        functions = module.functions.len(),
        "compiled"
    );
    Ok(module)
}
