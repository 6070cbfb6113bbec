//! Structural checks on a finished module
//!
//! A module handed to a backend must have every block terminated, branch only
//! to blocks that exist (never to the entry block), return values of the
//! declared type and branch on `i1` conditions. Every register an instruction
//! reads must be defined in the same function, and function names are unique.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::instr::Terminator;
use super::types::{BlockId, Function, IrType, Module, VReg};

/// Verifier errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("@{function}: {block} has no terminator")]
    Unterminated { function: String, block: BlockId },

    #[error("@{function}: {block} branches to missing block {target}")]
    UnknownTarget {
        function: String,
        block: BlockId,
        target: BlockId,
    },

    #[error("@{function}: {block} branches to the entry block")]
    BranchToEntry { function: String, block: BlockId },

    #[error("@{function}: {block} returns {found}, expected {expected}")]
    ReturnType {
        function: String,
        block: BlockId,
        expected: IrType,
        found: String,
    },

    #[error("@{function}: {block} branches on {cond} of type {found}, expected i1")]
    ConditionType {
        function: String,
        block: BlockId,
        cond: VReg,
        found: String,
    },

    #[error("@{function}: {block} uses {operand}, which is not defined in this function")]
    UndefinedOperand {
        function: String,
        block: BlockId,
        operand: VReg,
    },

    #[error("@{function}: function has no blocks")]
    Empty { function: String },

    #[error("@{function}: function is defined more than once")]
    DuplicateFunction { function: String },
}

/// Check every function of `module`, collecting all problems found
pub fn verify(module: &Module) -> Result<(), Vec<VerifyError>> {
    let mut seen = HashSet::new();
    let mut errors: Vec<VerifyError> = module
        .functions
        .iter()
        .filter(|function| !seen.insert(function.name.as_str()))
        .map(|function| VerifyError::DuplicateFunction {
            function: function.name.clone(),
        })
        .collect();
    errors.extend(module.functions.iter().flat_map(verify_function));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn verify_function(function: &Function) -> Vec<VerifyError> {
    let mut errors = Vec::new();
    let name = || function.name.clone();

    if function.blocks.is_empty() {
        errors.push(VerifyError::Empty { function: name() });
        return errors;
    }

    let types: HashMap<VReg, IrType> = function
        .blocks
        .iter()
        .flat_map(|block| &block.instructions)
        .filter_map(|instr| instr.result.map(|r| (r, instr.ty)))
        .collect();
    let type_of = |v: VReg| {
        types
            .get(&v)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| format!("undefined {}", v))
    };

    for block in &function.blocks {
        let operands = block
            .instructions
            .iter()
            .flat_map(|instr| instr.kind.operands())
            .chain(block.terminator.iter().flat_map(Terminator::operands));
        for operand in operands {
            if !types.contains_key(&operand) {
                errors.push(VerifyError::UndefinedOperand {
                    function: name(),
                    block: block.id,
                    operand,
                });
            }
        }

        let Some(terminator) = &block.terminator else {
            errors.push(VerifyError::Unterminated {
                function: name(),
                block: block.id,
            });
            continue;
        };

        for target in terminator.successors() {
            if function.block(target).is_none() {
                errors.push(VerifyError::UnknownTarget {
                    function: name(),
                    block: block.id,
                    target,
                });
            } else if target == BlockId(0) {
                errors.push(VerifyError::BranchToEntry {
                    function: name(),
                    block: block.id,
                });
            }
        }

        match terminator {
            Terminator::Ret(Some(v)) if !types.contains_key(v) => {}
            Terminator::Ret(value) => {
                let found = value.and_then(|v| types.get(&v).copied());
                if found != Some(function.ret_type) {
                    errors.push(VerifyError::ReturnType {
                        function: name(),
                        block: block.id,
                        expected: function.ret_type,
                        found: value.map(type_of).unwrap_or_else(|| "void".into()),
                    });
                }
            }
            Terminator::CondBr { cond, .. } => {
                if types.get(cond).is_some_and(|ty| *ty != IrType::Bool) {
                    errors.push(VerifyError::ConditionType {
                        function: name(),
                        block: block.id,
                        cond: *cond,
                        found: type_of(*cond),
                    });
                }
            }
            Terminator::Br(_) | Terminator::Unreachable => {}
        }
    }

    errors
}
