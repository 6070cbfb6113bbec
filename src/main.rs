//! Marsh Compiler CLI
//!
//! The `marshc` command drives the front end: tokenize, parse, or lower a
//! source file to IR.

use clap::{Parser, Subcommand};
use marsh::{lexer, parser, CompileError, LowerOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "marshc")]
#[command(version = marsh::VERSION)]
#[command(about = "The Marsh compiler front end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a Marsh source file to IR
    Build {
        /// Input file to compile
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Emit AST (for debugging)
        #[arg(long)]
        emit_ast: bool,

        /// Emit IR
        #[arg(long)]
        emit_ir: bool,

        /// Name of the produced module
        #[arg(long, value_name = "NAME")]
        module_name: Option<String>,

        /// Skip the IR verifier
        #[arg(long)]
        no_verify: bool,
    },

    /// Check a file for errors without printing anything
    Check {
        /// Input file to check
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Tokenize a file and print tokens
    Tokenize {
        /// Input file to tokenize
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Parse a file and print AST
    Parse {
        /// Input file to parse
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the AST as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            emit_ast,
            emit_ir,
            module_name,
            no_verify,
        } => {
            let source = read_source(&input)?;

            if emit_ast {
                let (ast, _) = parser::parse(&source);
                println!("=== AST ===");
                println!("{}", ast);
            }

            let options = LowerOptions {
                module_name: module_name.unwrap_or_else(|| default_module_name(&input)),
                verify: !no_verify,
            };
            let module = marsh::compile_with(&source, options).map_err(report)?;

            if emit_ir || !emit_ast {
                if emit_ast {
                    println!("\n=== IR ===");
                }
                println!("{}", module);
            }
            Ok(())
        }

        Commands::Check { input } => {
            let source = read_source(&input)?;
            marsh::compile(&source).map_err(report)?;
            eprintln!("{}: no errors found", input.display());
            Ok(())
        }

        Commands::Tokenize { input } => {
            let source = read_source(&input)?;

            for token in lexer::lex(&source) {
                println!(
                    "{:>4}:{:<4} {:16} {:?}",
                    token.position.row,
                    token.position.column,
                    format!("{:?}", token.kind),
                    token.literal
                );
            }
            Ok(())
        }

        Commands::Parse { input, json } => {
            let source = read_source(&input)?;

            let (ast, errors) = parser::parse(&source);
            for err in &errors {
                eprintln!("Parser error at {}", err);
            }

            if json {
                let text = ast
                    .to_json_pretty()
                    .map_err(|e| miette::miette!("Failed to serialize AST: {}", e))?;
                println!("{}", text);
            } else {
                println!("{}", ast);
            }

            if errors.is_empty() {
                Ok(())
            } else {
                Err(miette::miette!("Found {} parse error(s)", errors.len()))
            }
        }
    }
}

fn read_source(path: &Path) -> miette::Result<String> {
    fs::read_to_string(path).map_err(|e| miette::miette!("Failed to read file: {}", e))
}

fn default_module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| LowerOptions::default().module_name)
}

/// Print every diagnostic, then summarize
fn report(err: CompileError) -> miette::Report {
    match err {
        CompileError::Parse(errors) => {
            for err in &errors {
                eprintln!("Parser error at {}", err);
            }
            miette::miette!("Found {} parse error(s)", errors.len())
        }
        CompileError::Lower(err) => miette::miette!("Lowering failed: {}", err),
        CompileError::Verify(errors) => {
            for err in &errors {
                eprintln!("IR verification error: {}", err);
            }
            miette::miette!(
                "Found {} IR verification error(s); rerun with --no-verify to inspect the module",
                errors.len()
            )
        }
    }
}
