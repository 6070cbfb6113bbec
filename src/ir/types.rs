//! IR Types
//!
//! Values, types and the containers (module, function, basic block) of the
//! Marsh IR.

use std::collections::HashSet;
use std::fmt;

use super::instr::{Instruction, Terminator};

/// A virtual register (SSA value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block label, unique within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Index of a function within its module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// IR types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    /// Boolean (1 bit)
    Bool,
    /// 32-bit signed integer
    I32,
    /// 32-bit float
    F32,
    /// Opaque pointer to a stack slot
    Ptr,
}

impl IrType {
    /// Map a source type keyword to its IR type
    pub fn from_keyword(keyword: &str) -> Option<IrType> {
        match keyword {
            "int" => Some(IrType::I32),
            "float" => Some(IrType::F32),
            "bool" => Some(IrType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Bool => write!(f, "i1"),
            IrType::I32 => write!(f, "i32"),
            IrType::F32 => write!(f, "f32"),
            IrType::Ptr => write!(f, "ptr"),
        }
    }
}

/// A module contains functions
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    /// Last function declared under `name`
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().rev().find(|f| f.name == name)
    }
}

/// A function in the IR. Functions take no parameters.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub ret_type: IrType,
    /// Blocks in creation order; `BlockId(n)` is `blocks[n]` and `bb0` is the entry
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret_type: IrType) -> Self {
        Self {
            name: name.into(),
            ret_type,
            blocks: Vec::new(),
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.0 as usize)
    }

    /// Blocks that some path from the entry block can reach
    pub fn reachable_blocks(&self) -> HashSet<BlockId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<BlockId> = self.blocks.first().map(|b| b.id).into_iter().collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(term) = self.block(id).and_then(|b| b.terminator.as_ref()) {
                stack.extend(term.successors());
            }
        }
        seen
    }
}

/// A basic block contains a sequence of instructions
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// A constant value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => write!(f, "{:?}", v),
            Constant::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "; module {}", self.name)?;
        for function in &self.functions {
            write!(f, "\n\n{}", function)?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn @{}() -> {} {{", self.name, self.ret_type)?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:  ; {}", self.id, self.label)?;
        for instr in &self.instructions {
            writeln!(f, "    {}", instr)?;
        }
        match &self.terminator {
            Some(term) => writeln!(f, "    {}", term),
            None => writeln!(f, "    ; <unterminated>"),
        }
    }
}
