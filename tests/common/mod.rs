//! Reference evaluator for lowered modules.
//!
//! Only good enough to observe what the generated code does: loop trip counts,
//! final slot contents and return values.

#![allow(dead_code)]

use std::collections::HashMap;

use marsh::ir::{BlockId, CmpOp, Constant, Function, InstrKind, Module, Terminator, VReg};

const MAX_STEPS: usize = 100_000;
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Index into the frame's slots
    Ptr(usize),
}

/// What one call of a function did
#[derive(Debug)]
pub struct Run {
    pub value: Value,
    /// Final content of every stack slot, in allocation order
    pub slots: Vec<Option<Value>>,
    /// How often each block was entered
    pub visits: HashMap<BlockId, usize>,
}

impl Run {
    pub fn visits_of(&self, function: &Function, label: &str) -> usize {
        function
            .blocks
            .iter()
            .filter(|b| b.label == label)
            .map(|b| self.visits.get(&b.id).copied().unwrap_or(0))
            .sum()
    }
}

pub fn run(module: &Module, name: &str) -> Result<Run, String> {
    let mut steps = 0;
    call(module, name, 0, &mut steps)
}

/// Compile `source` and return what `main` evaluates to
pub fn run_main(source: &str) -> Value {
    let module = marsh::compile(source).unwrap_or_else(|e| panic!("compile failed: {}", e));
    run(&module, "main")
        .unwrap_or_else(|e| panic!("evaluation failed: {}", e))
        .value
}

fn call(module: &Module, name: &str, depth: usize, steps: &mut usize) -> Result<Run, String> {
    if depth > MAX_DEPTH {
        return Err(format!("call depth exceeded in @{}", name));
    }
    let function = module
        .function_by_name(name)
        .ok_or_else(|| format!("no function @{}", name))?;

    let mut regs: HashMap<VReg, Value> = HashMap::new();
    let mut slots: Vec<Option<Value>> = Vec::new();
    let mut visits: HashMap<BlockId, usize> = HashMap::new();
    let mut current = BlockId(0);

    loop {
        *visits.entry(current).or_default() += 1;
        let block = function
            .block(current)
            .ok_or_else(|| format!("missing block {}", current))?;

        for instr in &block.instructions {
            *steps += 1;
            if *steps > MAX_STEPS {
                return Err("step limit exceeded".into());
            }

            let get = |v: &VReg| regs.get(v).copied().ok_or_else(|| format!("unset {}", v));
            let value = match &instr.kind {
                InstrKind::Const(Constant::Int(v)) => Value::Int(*v as i32),
                InstrKind::Const(Constant::Float(v)) => Value::Float(*v as f32),
                InstrKind::Const(Constant::Bool(v)) => Value::Bool(*v),
                InstrKind::Add(a, b) => int_op(get(a)?, get(b)?, |x, y| Some(x.wrapping_add(y)))?,
                InstrKind::Sub(a, b) => int_op(get(a)?, get(b)?, |x, y| Some(x.wrapping_sub(y)))?,
                InstrKind::Mul(a, b) => int_op(get(a)?, get(b)?, |x, y| Some(x.wrapping_mul(y)))?,
                InstrKind::SDiv(a, b) => int_op(get(a)?, get(b)?, |x, y| x.checked_div(y))?,
                InstrKind::SRem(a, b) => int_op(get(a)?, get(b)?, |x, y| x.checked_rem(y))?,
                InstrKind::And(a, b) => int_op(get(a)?, get(b)?, |x, y| Some(x & y))?,
                InstrKind::Or(a, b) => int_op(get(a)?, get(b)?, |x, y| Some(x | y))?,
                InstrKind::Xor(a, b) => int_op(get(a)?, get(b)?, |x, y| Some(x ^ y))?,
                InstrKind::Not(a) => match get(a)? {
                    Value::Int(x) => Value::Int(!x),
                    other => return Err(format!("not on {:?}", other)),
                },
                InstrKind::FAdd(a, b) => float_op(get(a)?, get(b)?, |x, y| x + y)?,
                InstrKind::FSub(a, b) => float_op(get(a)?, get(b)?, |x, y| x - y)?,
                InstrKind::FMul(a, b) => float_op(get(a)?, get(b)?, |x, y| x * y)?,
                InstrKind::FDiv(a, b) => float_op(get(a)?, get(b)?, |x, y| x / y)?,
                InstrKind::ICmp(op, a, b) => match (get(a)?, get(b)?) {
                    (Value::Int(x), Value::Int(y)) => Value::Bool(compare(*op, x, y)),
                    other => return Err(format!("icmp on {:?}", other)),
                },
                InstrKind::FCmp(op, a, b) => match (get(a)?, get(b)?) {
                    (Value::Float(x), Value::Float(y)) => Value::Bool(compare(*op, x, y)),
                    other => return Err(format!("fcmp on {:?}", other)),
                },
                InstrKind::Alloca(_) => {
                    slots.push(None);
                    Value::Ptr(slots.len() - 1)
                }
                InstrKind::Load(ptr) => match get(ptr)? {
                    Value::Ptr(slot) => slots
                        .get(slot)
                        .copied()
                        .flatten()
                        .ok_or_else(|| format!("load of empty slot {}", slot))?,
                    other => return Err(format!("load from {:?}", other)),
                },
                InstrKind::Store(ptr, val) => {
                    let val = get(val)?;
                    match get(ptr)? {
                        Value::Ptr(slot) if slot < slots.len() => slots[slot] = Some(val),
                        other => return Err(format!("store to {:?}", other)),
                    }
                    continue;
                }
                InstrKind::Call { func, .. } => call(module, func, depth + 1, steps)?.value,
            };

            if let Some(result) = instr.result {
                regs.insert(result, value);
            }
        }

        let get = |v: &VReg| regs.get(v).copied().ok_or_else(|| format!("unset {}", v));
        current = match &block.terminator {
            Some(Terminator::Ret(Some(v))) => {
                return Ok(Run {
                    value: get(v)?,
                    slots,
                    visits,
                })
            }
            Some(Terminator::Br(target)) => *target,
            Some(Terminator::CondBr {
                cond,
                then_block,
                else_block,
            }) => match get(cond)? {
                Value::Bool(true) => *then_block,
                Value::Bool(false) => *else_block,
                other => return Err(format!("branch on {:?}", other)),
            },
            other => return Err(format!("reached {:?} in {}", other, current)),
        };
    }
}

fn int_op(a: Value, b: Value, op: impl Fn(i32, i32) -> Option<i32>) -> Result<Value, String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => op(x, y)
            .map(Value::Int)
            .ok_or_else(|| "integer division by zero".to_string()),
        other => Err(format!("integer op on {:?}", other)),
    }
}

fn float_op(a: Value, b: Value, op: impl Fn(f32, f32) -> f32) -> Result<Value, String> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(op(x, y))),
        other => Err(format!("float op on {:?}", other)),
    }
}

fn compare<T: PartialOrd>(op: CmpOp, x: T, y: T) -> bool {
    match op {
        CmpOp::Eq => x == y,
        CmpOp::Ne => x != y,
        CmpOp::Lt => x < y,
        CmpOp::Le => x <= y,
        CmpOp::Gt => x > y,
        CmpOp::Ge => x >= y,
    }
}
