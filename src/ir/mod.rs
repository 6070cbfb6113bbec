//! Marsh Intermediate Representation
//!
//! A small SSA-form IR. Variables live in stack slots (`alloca`/`load`/`store`)
//! so the lowering never builds phi nodes; a backend is expected to promote
//! slots to registers.
//!
//! The pieces, in dependency order:
//! - [`Module`], [`Instruction`] and friends: the data model
//! - [`IrBuilder`]: the construction interface the code generator talks to
//! - [`Lowerer`]: AST to IR
//! - [`verify`]: structural checks a backend relies on

mod instr;
mod types;
mod builder;
mod lower;
mod verify;

pub use instr::*;
pub use types::*;
pub use builder::*;
pub use lower::*;
pub use verify::*;
