//! IR Builder
//!
//! The code generator talks to the backend only through [`IrBuilder`]. The
//! trait keeps one insertion point (function + block); every emitted
//! instruction is appended there. [`ModuleBuilder`] is the in-memory
//! implementation that produces a [`Module`].

use tracing::{debug, trace};

use super::instr::{CmpOp, InstrKind, Instruction, Terminator};
use super::types::{BasicBlock, BlockId, Constant, FuncId, Function, IrType, Module, VReg};

/// Where the next instruction goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    pub function: FuncId,
    pub block: BlockId,
}

impl InsertPoint {
    pub fn new(function: FuncId, block: BlockId) -> Self {
        Self { function, block }
    }
}

/// Backend-facing construction interface
pub trait IrBuilder {
    /// Declare a new function with zero parameters
    fn create_function(&mut self, name: &str, ret_type: IrType) -> FuncId;

    /// Append an empty block to `function`. The first block is its entry.
    fn append_block(&mut self, function: FuncId, label: &str) -> BlockId;

    fn insert_point(&self) -> Option<InsertPoint>;

    fn set_insert_point(&mut self, point: Option<InsertPoint>);

    fn fresh_vreg(&mut self) -> VReg;

    /// Append an instruction at the insertion point
    fn emit(&mut self, instruction: Instruction);

    /// Allocate a stack slot in the entry block of the current function
    fn alloca(&mut self, ty: IrType) -> VReg;

    /// Set the terminator of the current block
    fn terminate(&mut self, terminator: Terminator);

    /// Has the current block been terminated?
    fn is_terminated(&self) -> bool;

    /// Blocks of `function` that have no terminator yet
    fn open_blocks(&self, function: FuncId) -> Vec<BlockId>;

    /// Can control reach `block` from the entry of `function`?
    fn is_reachable(&self, function: FuncId, block: BlockId) -> bool;

    fn finish(self) -> Module
    where
        Self: Sized;

    // ============ Provided helpers ============

    fn value(&mut self, ty: IrType, kind: InstrKind) -> VReg {
        let result = self.fresh_vreg();
        self.emit(Instruction::new(Some(result), ty, kind));
        result
    }

    fn const_int(&mut self, value: i64) -> VReg {
        self.value(IrType::I32, InstrKind::Const(Constant::Int(value)))
    }

    fn const_float(&mut self, value: f64) -> VReg {
        self.value(IrType::F32, InstrKind::Const(Constant::Float(value)))
    }

    fn const_bool(&mut self, value: bool) -> VReg {
        self.value(IrType::Bool, InstrKind::Const(Constant::Bool(value)))
    }

    fn add(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::Add(a, b))
    }

    fn sub(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::Sub(a, b))
    }

    fn mul(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::Mul(a, b))
    }

    fn sdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::SDiv(a, b))
    }

    fn srem(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::SRem(a, b))
    }

    fn fadd(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::F32, InstrKind::FAdd(a, b))
    }

    fn fsub(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::F32, InstrKind::FSub(a, b))
    }

    fn fmul(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::F32, InstrKind::FMul(a, b))
    }

    fn fdiv(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::F32, InstrKind::FDiv(a, b))
    }

    fn and(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::And(a, b))
    }

    fn or(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::Or(a, b))
    }

    fn xor(&mut self, a: VReg, b: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::Xor(a, b))
    }

    fn not(&mut self, v: VReg) -> VReg {
        self.value(IrType::I32, InstrKind::Not(v))
    }

    fn icmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.value(IrType::Bool, InstrKind::ICmp(op, a, b))
    }

    fn fcmp(&mut self, op: CmpOp, a: VReg, b: VReg) -> VReg {
        self.value(IrType::Bool, InstrKind::FCmp(op, a, b))
    }

    fn load(&mut self, ptr: VReg, ty: IrType) -> VReg {
        self.value(ty, InstrKind::Load(ptr))
    }

    fn store(&mut self, ptr: VReg, value: VReg, ty: IrType) {
        self.emit(Instruction::new(None, ty, InstrKind::Store(ptr, value)));
    }

    fn call(&mut self, func: &str, ret_type: IrType) -> VReg {
        self.value(
            ret_type,
            InstrKind::Call {
                func: func.to_string(),
                args: Vec::new(),
            },
        )
    }

    fn ret(&mut self, value: Option<VReg>) {
        self.terminate(Terminator::Ret(value));
    }

    fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    fn cond_br(&mut self, cond: VReg, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }
}

/// Builds an in-memory [`Module`]
pub struct ModuleBuilder {
    /// Next virtual register ID
    next_vreg: u32,
    module: Module,
    current: Option<InsertPoint>,
}

impl ModuleBuilder {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            next_vreg: 0,
            module: Module::new(module_name),
            current: None,
        }
    }

    fn function_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        self.module.functions.get_mut(id.0 as usize)
    }

    fn current_block_mut(&mut self) -> Option<&mut BasicBlock> {
        let point = self.current?;
        self.function_mut(point.function)?.block_mut(point.block)
    }

    fn current_block(&self) -> Option<&BasicBlock> {
        let point = self.current?;
        self.module.function(point.function)?.block(point.block)
    }
}

impl IrBuilder for ModuleBuilder {
    fn create_function(&mut self, name: &str, ret_type: IrType) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(Function::new(name, ret_type));
        debug!(function = name, %ret_type, "declare function");
        id
    }

    fn append_block(&mut self, function: FuncId, label: &str) -> BlockId {
        let Some(func) = self.function_mut(function) else {
            debug!(?function, label, "block requested for unknown function");
            return BlockId(u32::MAX);
        };
        let id = BlockId(func.blocks.len() as u32);
        func.blocks.push(BasicBlock::new(id, label));
        trace!(function = %func.name, block = %id, label, "append block");
        id
    }

    fn insert_point(&self) -> Option<InsertPoint> {
        self.current
    }

    fn set_insert_point(&mut self, point: Option<InsertPoint>) {
        self.current = point;
    }

    fn fresh_vreg(&mut self) -> VReg {
        let vreg = VReg(self.next_vreg);
        self.next_vreg += 1;
        vreg
    }

    fn emit(&mut self, instruction: Instruction) {
        match self.current_block_mut() {
            Some(block) => block.instructions.push(instruction),
            None => debug!(%instruction, "dropped instruction: no insertion point"),
        }
    }

    fn alloca(&mut self, ty: IrType) -> VReg {
        let result = self.fresh_vreg();
        let instruction = Instruction::new(Some(result), IrType::Ptr, InstrKind::Alloca(ty));

        let entry = match self.current {
            Some(point) => self
                .function_mut(point.function)
                .and_then(|func| func.blocks.first_mut()),
            None => None,
        };
        match entry {
            Some(block) => {
                // Slots stay grouped at the top of the entry block
                let at = block
                    .instructions
                    .iter()
                    .take_while(|instr| matches!(instr.kind, InstrKind::Alloca(_)))
                    .count();
                block.instructions.insert(at, instruction);
            }
            None => debug!(%instruction, "dropped alloca: no current function"),
        }
        result
    }

    fn terminate(&mut self, terminator: Terminator) {
        match self.current_block_mut() {
            Some(block) if block.terminator.is_none() => block.terminator = Some(terminator),
            Some(block) => {
                debug!(block = %block.id, %terminator, "block already terminated");
            }
            None => debug!(%terminator, "dropped terminator: no insertion point"),
        }
    }

    fn is_terminated(&self) -> bool {
        self.current_block().is_some_and(BasicBlock::is_terminated)
    }

    fn open_blocks(&self, function: FuncId) -> Vec<BlockId> {
        self.module
            .function(function)
            .map(|func| {
                func.blocks
                    .iter()
                    .filter(|block| !block.is_terminated())
                    .map(|block| block.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_reachable(&self, function: FuncId, block: BlockId) -> bool {
        self.module
            .function(function)
            .is_some_and(|func| func.reachable_blocks().contains(&block))
    }

    fn finish(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder_with_entry() -> (ModuleBuilder, FuncId, BlockId) {
        let mut builder = ModuleBuilder::new("test");
        let func = builder.create_function("main", IrType::I32);
        let entry = builder.append_block(func, "entry");
        builder.set_insert_point(Some(InsertPoint::new(func, entry)));
        (builder, func, entry)
    }

    #[test]
    fn test_instructions_go_to_insert_point() {
        let (mut builder, func, _) = builder_with_entry();
        let other = builder.append_block(func, "other");
        let a = builder.const_int(1);
        builder.set_insert_point(Some(InsertPoint::new(func, other)));
        let b = builder.const_int(2);

        let module = builder.finish();
        let main = &module.functions[0];
        assert_eq!(main.blocks[0].instructions[0].result, Some(a));
        assert_eq!(main.blocks[1].instructions[0].result, Some(b));
    }

    #[test]
    fn test_alloca_lands_in_entry_block() {
        let (mut builder, func, _) = builder_with_entry();
        builder.const_int(7);
        let body = builder.append_block(func, "body");
        builder.set_insert_point(Some(InsertPoint::new(func, body)));
        let slot = builder.alloca(IrType::I32);

        let module = builder.finish();
        let entry = &module.functions[0].blocks[0];
        assert_eq!(entry.instructions[0].result, Some(slot));
        assert_eq!(entry.instructions[0].kind, InstrKind::Alloca(IrType::I32));
        assert!(module.functions[0].blocks[1].instructions.is_empty());
    }

    #[test]
    fn test_first_terminator_wins() {
        let (mut builder, func, entry) = builder_with_entry();
        assert!(!builder.is_terminated());
        let v = builder.const_int(0);
        builder.ret(Some(v));
        builder.unreachable();
        assert!(builder.is_terminated());
        assert!(builder.open_blocks(func).is_empty());

        let module = builder.finish();
        assert_eq!(
            module.functions[0].block(entry).and_then(|b| b.terminator.clone()),
            Some(Terminator::Ret(Some(v)))
        );
    }

    #[test]
    fn test_reachability() {
        let (mut builder, func, entry) = builder_with_entry();
        let next = builder.append_block(func, "next");
        let lonely = builder.append_block(func, "lonely");
        let after_lonely = builder.append_block(func, "after_lonely");
        builder.br(next);
        builder.set_insert_point(Some(InsertPoint::new(func, lonely)));
        builder.br(after_lonely);

        assert!(builder.is_reachable(func, entry));
        assert!(builder.is_reachable(func, next));
        assert!(!builder.is_reachable(func, lonely));
        // A branch from dead code does not make its target live
        assert!(!builder.is_reachable(func, after_lonely));
        assert_eq!(builder.open_blocks(func), vec![next, after_lonely]);
    }

    #[test]
    fn test_emit_without_insert_point_is_dropped() {
        let mut builder = ModuleBuilder::new("test");
        builder.const_int(1);
        assert!(!builder.is_terminated());
        assert!(builder.finish().functions.is_empty());
    }

    #[test]
    fn test_listing() {
        let (mut builder, _, _) = builder_with_entry();
        let slot = builder.alloca(IrType::I32);
        let one = builder.const_int(1);
        builder.store(slot, one, IrType::I32);
        let v = builder.load(slot, IrType::I32);
        builder.ret(Some(v));

        let text = builder.finish().to_string();
        assert_eq!(
            text,
            "; module test\n\n\
             fn @main() -> i32 {\n\
             bb0:  ; entry\n    \
             %0: ptr = alloca i32\n    \
             %1: i32 = const 1\n    \
             store i32 %0, %1\n    \
             %2: i32 = load %0\n    \
             ret %2\n\
             }"
        );
    }
}
