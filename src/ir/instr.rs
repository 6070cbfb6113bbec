//! IR Instructions
//!
//! Instruction definitions for the Marsh IR.

use super::types::{BlockId, Constant, IrType, VReg};
use std::fmt;

/// An instruction in the IR
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Result register (None for `store`)
    pub result: Option<VReg>,
    /// Type of the result, or of the stored value for `store`
    pub ty: IrType,
    pub kind: InstrKind,
}

impl Instruction {
    pub fn new(result: Option<VReg>, ty: IrType, kind: InstrKind) -> Self {
        Self { result, ty, kind }
    }
}

/// Kinds of instructions
#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    // ============ Constants ============
    Const(Constant),

    // ============ Integer Arithmetic ============
    Add(VReg, VReg),
    Sub(VReg, VReg),
    Mul(VReg, VReg),
    /// Signed integer division
    SDiv(VReg, VReg),
    /// Signed integer remainder
    SRem(VReg, VReg),

    // ============ Floating Point ============
    FAdd(VReg, VReg),
    FSub(VReg, VReg),
    FMul(VReg, VReg),
    FDiv(VReg, VReg),

    // ============ Bitwise ============
    And(VReg, VReg),
    Or(VReg, VReg),
    Xor(VReg, VReg),
    /// Bitwise NOT
    Not(VReg),

    // ============ Comparison ============
    /// Integer comparison, yields `i1`
    ICmp(CmpOp, VReg, VReg),
    /// Ordered float comparison, yields `i1`
    FCmp(CmpOp, VReg, VReg),

    // ============ Memory ============
    /// Allocate a stack slot of the given type
    Alloca(IrType),
    /// Load from a slot
    Load(VReg),
    /// Store to a slot (ptr, value)
    Store(VReg, VReg),

    // ============ Function Calls ============
    /// Call a function; calls never carry arguments today
    Call { func: String, args: Vec<VReg> },
}

impl InstrKind {
    /// Registers read by this instruction
    pub fn operands(&self) -> Vec<VReg> {
        match self {
            InstrKind::Const(_) | InstrKind::Alloca(_) => Vec::new(),
            InstrKind::Not(v) | InstrKind::Load(v) => vec![*v],
            InstrKind::Add(a, b)
            | InstrKind::Sub(a, b)
            | InstrKind::Mul(a, b)
            | InstrKind::SDiv(a, b)
            | InstrKind::SRem(a, b)
            | InstrKind::FAdd(a, b)
            | InstrKind::FSub(a, b)
            | InstrKind::FMul(a, b)
            | InstrKind::FDiv(a, b)
            | InstrKind::And(a, b)
            | InstrKind::Or(a, b)
            | InstrKind::Xor(a, b)
            | InstrKind::ICmp(_, a, b)
            | InstrKind::FCmp(_, a, b)
            | InstrKind::Store(a, b) => vec![*a, *b],
            InstrKind::Call { args, .. } => args.clone(),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    /// Less than (signed for integers)
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Mnemonic in integer position (`slt`, ...)
    pub fn int_mnemonic(&self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "slt",
            CmpOp::Le => "sle",
            CmpOp::Gt => "sgt",
            CmpOp::Ge => "sge",
        }
    }

    /// Mnemonic in float position (`olt`, ...)
    pub fn float_mnemonic(&self) -> &'static str {
        match self {
            CmpOp::Eq => "oeq",
            CmpOp::Ne => "one",
            CmpOp::Lt => "olt",
            CmpOp::Le => "ole",
            CmpOp::Gt => "ogt",
            CmpOp::Ge => "oge",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.int_mnemonic())
    }
}

/// Block terminators
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Return from function
    Ret(Option<VReg>),
    /// Unconditional branch
    Br(BlockId),
    /// Conditional branch
    CondBr {
        cond: VReg,
        then_block: BlockId,
        else_block: BlockId,
    },
    Unreachable,
}

impl Terminator {
    /// Blocks control may pass to
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Ret(_) | Terminator::Unreachable => Vec::new(),
        }
    }

    /// Registers read by this terminator
    pub fn operands(&self) -> Vec<VReg> {
        match self {
            Terminator::Ret(Some(v)) | Terminator::CondBr { cond: v, .. } => vec![*v],
            Terminator::Ret(None) | Terminator::Br(_) | Terminator::Unreachable => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{}: {} = ", result, self.ty)?;
        }
        match &self.kind {
            InstrKind::Const(c) => write!(f, "const {}", c),
            InstrKind::Add(a, b) => write!(f, "add {}, {}", a, b),
            InstrKind::Sub(a, b) => write!(f, "sub {}, {}", a, b),
            InstrKind::Mul(a, b) => write!(f, "mul {}, {}", a, b),
            InstrKind::SDiv(a, b) => write!(f, "sdiv {}, {}", a, b),
            InstrKind::SRem(a, b) => write!(f, "srem {}, {}", a, b),
            InstrKind::FAdd(a, b) => write!(f, "fadd {}, {}", a, b),
            InstrKind::FSub(a, b) => write!(f, "fsub {}, {}", a, b),
            InstrKind::FMul(a, b) => write!(f, "fmul {}, {}", a, b),
            InstrKind::FDiv(a, b) => write!(f, "fdiv {}, {}", a, b),
            InstrKind::And(a, b) => write!(f, "and {}, {}", a, b),
            InstrKind::Or(a, b) => write!(f, "or {}, {}", a, b),
            InstrKind::Xor(a, b) => write!(f, "xor {}, {}", a, b),
            InstrKind::Not(v) => write!(f, "not {}", v),
            InstrKind::ICmp(op, a, b) => write!(f, "icmp {} {}, {}", op.int_mnemonic(), a, b),
            InstrKind::FCmp(op, a, b) => write!(f, "fcmp {} {}, {}", op.float_mnemonic(), a, b),
            InstrKind::Alloca(ty) => write!(f, "alloca {}", ty),
            InstrKind::Load(ptr) => write!(f, "load {}", ptr),
            InstrKind::Store(ptr, val) => write!(f, "store {} {}, {}", self.ty, ptr, val),
            InstrKind::Call { func, args } => {
                write!(f, "call @{}(", func)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret(None) => write!(f, "ret void"),
            Terminator::Ret(Some(v)) => write!(f, "ret {}", v),
            Terminator::Br(block) => write!(f, "br {}", block),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "br {}, {}, {}", cond, then_block, else_block)
            }
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}
