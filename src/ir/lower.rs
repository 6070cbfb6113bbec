//! AST to IR Lowering
//!
//! Walks a parsed [`Program`] and emits IR through an [`IrBuilder`]. The
//! lowerer owns one insertion point (inside the builder) and one scope chain.
//! Both are swapped around nested constructs by `Lowerer::at` and
//! `Lowerer::scoped`, which restore the previous state before returning,
//! whether the nested lowering succeeded or not.
//!
//! Variables live in stack slots: a `let` allocates a slot in the entry block
//! of the enclosing function, reads are loads and writes are stores.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{
    Block, Expression, FunctionDecl, InfixOperator, PrefixOperator, Program, Statement,
};
use crate::env::{Binding, Environment, Handle};

use super::builder::{InsertPoint, IrBuilder, ModuleBuilder};
use super::instr::CmpOp;
use super::types::{BlockId, FuncId, IrType, Module, VReg};

/// Lowering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LowerError {
    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("{statement} statement outside of a function body")]
    OutsideFunction { statement: &'static str },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: IrType,
        found: IrType,
    },

    #[error("operator `{operator}` is not supported for {left} and {right}")]
    UnsupportedInfix {
        operator: InfixOperator,
        left: IrType,
        right: IrType,
    },

    #[error("operator `{operator}` is not supported for {operand}")]
    UnsupportedPrefix {
        operator: PrefixOperator,
        operand: IrType,
    },

    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("undefined function `{name}`")]
    UndefinedFunction { name: String },

    #[error("`{name}` is a function, not a variable")]
    NotAVariable { name: String },

    #[error("`{name}` is a variable, not a function")]
    NotCallable { name: String },

    #[error("function `{function}` can finish without returning a value")]
    MissingReturn { function: String },

    #[error("`{name}` belongs to an enclosing function and is not visible in `{function}`")]
    CapturedVariable { name: String, function: String },

    #[error("function `{name}` is already defined")]
    DuplicateFunction { name: String },
}

/// Lowering settings
#[derive(Debug, Clone)]
pub struct LowerOptions {
    /// Name given to the produced module
    pub module_name: String,
    /// Run [`verify`](super::verify) on the result
    pub verify: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            module_name: "main_module".to_string(),
            verify: true,
        }
    }
}

/// The function whose body is being lowered
#[derive(Debug, Clone)]
struct FunctionContext {
    id: FuncId,
    name: String,
    ret_type: IrType,
}

/// Lowers AST to IR
pub struct Lowerer<B: IrBuilder = ModuleBuilder> {
    builder: B,
    env: Environment,
    /// Innermost last; nested declarations push here
    functions: Vec<FunctionContext>,
    /// Every function name emitted so far, nested ones included
    symbols: HashSet<String>,
    options: LowerOptions,
}

impl Lowerer<ModuleBuilder> {
    pub fn new() -> Self {
        Self::with_options(LowerOptions::default())
    }

    pub fn with_options(options: LowerOptions) -> Self {
        let builder = ModuleBuilder::new(options.module_name.as_str());
        Self::with_builder(builder, options)
    }
}

impl Default for Lowerer<ModuleBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: IrBuilder> Lowerer<B> {
    /// Lower into a caller-supplied builder
    pub fn with_builder(builder: B, options: LowerOptions) -> Self {
        Self {
            builder,
            env: Environment::new(),
            functions: Vec::new(),
            symbols: HashSet::new(),
            options,
        }
    }

    /// Lower a whole program, stopping at the first error
    pub fn generate(mut self, program: &Program) -> Result<Module, LowerError> {
        debug!(module = %self.options.module_name, "lowering program");
        for statement in &program.statements {
            self.lower_statement(statement)?;
        }
        Ok(self.builder.finish())
    }

    // ============ State Helpers ============

    /// Run `f` inside a fresh child scope
    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        self.env.push_scope();
        let result = f(self);
        self.env.pop_scope();
        result
    }

    /// Run `f` with the insertion point moved to `point`
    fn at<T>(
        &mut self,
        point: InsertPoint,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        let saved = self.builder.insert_point();
        self.builder.set_insert_point(Some(point));
        let result = f(self);
        self.builder.set_insert_point(saved);
        result
    }

    fn current_function(&self, statement: &'static str) -> Result<&FunctionContext, LowerError> {
        match (self.builder.insert_point(), self.functions.last()) {
            (Some(_), Some(context)) => Ok(context),
            _ => Err(LowerError::OutsideFunction { statement }),
        }
    }

    fn new_block(&mut self, function: FuncId, label: &str) -> InsertPoint {
        let block = self.builder.append_block(function, label);
        InsertPoint::new(function, block)
    }

    fn move_to(&mut self, point: InsertPoint) {
        self.builder.set_insert_point(Some(point));
    }

    fn ir_type(&self, keyword: &str) -> Result<IrType, LowerError> {
        IrType::from_keyword(keyword).ok_or_else(|| LowerError::UnknownType {
            name: keyword.to_string(),
        })
    }

    fn expect_type(context: &str, expected: IrType, found: IrType) -> Result<(), LowerError> {
        if expected == found {
            Ok(())
        } else {
            Err(LowerError::TypeMismatch {
                context: context.to_string(),
                expected,
                found,
            })
        }
    }

    /// Slot of a variable visible from here. Slots of an enclosing function
    /// are in scope but cannot be reached from a nested one.
    fn resolve_slot(&self, name: &str) -> Result<(VReg, IrType), LowerError> {
        match self.env.lookup(name) {
            Some(Binding {
                handle: Handle::Slot { function, ptr },
                ty,
            }) => match self.functions.last() {
                Some(context) if context.id == function => Ok((ptr, ty)),
                context => Err(LowerError::CapturedVariable {
                    name: name.to_string(),
                    function: context.map(|c| c.name.clone()).unwrap_or_default(),
                }),
            },
            Some(Binding {
                handle: Handle::Function(_),
                ..
            }) => Err(LowerError::NotAVariable {
                name: name.to_string(),
            }),
            None => Err(LowerError::UndefinedVariable {
                name: name.to_string(),
            }),
        }
    }

    // ============ Statements ============

    fn lower_block(&mut self, block: &Block) -> Result<(), LowerError> {
        for statement in &block.statements {
            self.lower_statement(statement)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, statement: &Statement) -> Result<(), LowerError> {
        // Code after a terminator still gets checked, in a block nothing reaches
        if let Some(point) = self.builder.insert_point() {
            if self.builder.is_terminated() {
                trace!(statement = statement.node_type(), "lowering dead statement");
                let dead = self.new_block(point.function, "dead");
                self.move_to(dead);
            }
        }

        match statement {
            Statement::FunctionDecl(decl) => self.lower_function(decl),
            Statement::Assignment(stmt) => {
                let function = self.current_function("let")?.id;
                let annotated = self.ir_type(&stmt.value_type)?;
                let (value, ty) = self.lower_expression(&stmt.value)?;
                Self::expect_type(&format!("`let {}`", stmt.name), annotated, ty)?;

                match self.env.lookup(&stmt.name) {
                    // Visible already: write through the existing slot
                    Some(_) => {
                        let (ptr, slot_ty) = self.resolve_slot(&stmt.name)?;
                        Self::expect_type(&format!("`let {}`", stmt.name), slot_ty, ty)?;
                        self.builder.store(ptr, value, ty);
                    }
                    None => {
                        let ptr = self.builder.alloca(annotated);
                        self.builder.store(ptr, value, annotated);
                        let handle = Handle::Slot { function, ptr };
                        self.env.define(stmt.name.as_str(), handle, annotated);
                    }
                }
                Ok(())
            }
            Statement::Reassignment(stmt) => {
                self.current_function("assignment")?;
                let (ptr, slot_ty) = self.resolve_slot(&stmt.name)?;
                let (value, ty) = self.lower_expression(&stmt.value)?;
                Self::expect_type(&format!("assignment to `{}`", stmt.name), slot_ty, ty)?;
                self.builder.store(ptr, value, ty);
                Ok(())
            }
            Statement::Return(stmt) => {
                let context = self.current_function("return")?;
                let (name, expected) = (context.name.clone(), context.ret_type);
                let (value, ty) = self.lower_expression(&stmt.value)?;
                Self::expect_type(&format!("return from `{}`", name), expected, ty)?;
                self.builder.ret(Some(value));
                Ok(())
            }
            Statement::ExpressionStatement(stmt) => {
                self.current_function("expression")?;
                self.lower_expression(&stmt.expression)?;
                Ok(())
            }
            Statement::If(stmt) => {
                let function = self.current_function("if")?.id;
                let cond = self.lower_condition(&stmt.condition, "if condition")?;

                if stmt.alternative.is_empty() {
                    let then_point = self.new_block(function, "if.then");
                    let merge = self.new_block(function, "if.end");
                    self.builder.cond_br(cond, then_point.block, merge.block);
                    self.lower_branch(then_point, &stmt.consequence, merge.block)?;
                    self.move_to(merge);
                } else {
                    let then_point = self.new_block(function, "if.then");
                    let else_point = self.new_block(function, "if.else");
                    let merge = self.new_block(function, "if.end");
                    self.builder.cond_br(cond, then_point.block, else_point.block);
                    self.lower_branch(then_point, &stmt.consequence, merge.block)?;
                    self.lower_branch(else_point, &stmt.alternative, merge.block)?;
                    self.move_to(merge);
                }
                Ok(())
            }
            Statement::While(stmt) => {
                let function = self.current_function("while")?.id;
                let cond = self.lower_condition(&stmt.condition, "while condition")?;

                let body = self.new_block(function, "while.body");
                let exit = self.new_block(function, "while.end");
                self.builder.cond_br(cond, body.block, exit.block);

                self.at(body, |this| {
                    this.scoped(|this| this.lower_block(&stmt.body))?;
                    if !this.builder.is_terminated() {
                        let cond = this.lower_condition(&stmt.condition, "while condition")?;
                        this.builder.cond_br(cond, body.block, exit.block);
                    }
                    Ok(())
                })?;

                self.move_to(exit);
                Ok(())
            }
            Statement::For(stmt) => {
                let function = self.current_function("for")?.id;
                let counter = self.builder.alloca(IrType::I32);
                let start = self.builder.const_int(stmt.range_start);
                self.builder.store(counter, start, IrType::I32);

                let exit = self.scoped(|this| {
                    let handle = Handle::Slot {
                        function,
                        ptr: counter,
                    };
                    this.env.define(stmt.variable.as_str(), handle, IrType::I32);
                    let cond = this.lower_condition(&stmt.condition, "for condition")?;

                    let body = this.new_block(function, "for.body");
                    let exit = this.new_block(function, "for.end");
                    this.builder.cond_br(cond, body.block, exit.block);

                    this.at(body, |this| {
                        this.scoped(|this| this.lower_block(&stmt.body))?;
                        if !this.builder.is_terminated() {
                            let current = this.builder.load(counter, IrType::I32);
                            let one = this.builder.const_int(1);
                            let next = this.builder.add(current, one);
                            this.builder.store(counter, next, IrType::I32);
                            let cond = this.lower_condition(&stmt.condition, "for condition")?;
                            this.builder.cond_br(cond, body.block, exit.block);
                        }
                        Ok(())
                    })?;
                    Ok(exit)
                })?;

                self.move_to(exit);
                Ok(())
            }
        }
    }

    fn lower_function(&mut self, decl: &FunctionDecl) -> Result<(), LowerError> {
        let ret_type = self.ir_type(&decl.return_type)?;
        if !self.symbols.insert(decl.name.clone()) {
            return Err(LowerError::DuplicateFunction {
                name: decl.name.clone(),
            });
        }
        let id = self.builder.create_function(&decl.name, ret_type);
        debug!(function = %decl.name, %ret_type, "lowering function");

        // Bound before the body so it can call itself
        self.env.define(decl.name.as_str(), Handle::Function(id), ret_type);

        let entry = self.new_block(id, "entry");
        self.functions.push(FunctionContext {
            id,
            name: decl.name.clone(),
            ret_type,
        });
        let result = self.at(entry, |this| {
            this.scoped(|this| this.lower_block(&decl.body))?;
            this.seal_function(id, &decl.name)
        });
        self.functions.pop();
        result?;

        self.env.define(decl.name.as_str(), Handle::Function(id), ret_type);
        Ok(())
    }

    /// Close off the blocks a body left open. Unreachable ones get
    /// `unreachable`; a reachable one means a path without `return`.
    fn seal_function(&mut self, function: FuncId, name: &str) -> Result<(), LowerError> {
        for block in self.builder.open_blocks(function) {
            if self.builder.is_reachable(function, block) {
                return Err(LowerError::MissingReturn {
                    function: name.to_string(),
                });
            }
            self.move_to(InsertPoint::new(function, block));
            self.builder.unreachable();
        }
        Ok(())
    }

    /// Lower a branch body in its own scope and fall through to `next`
    fn lower_branch(
        &mut self,
        point: InsertPoint,
        body: &Block,
        next: BlockId,
    ) -> Result<(), LowerError> {
        self.at(point, |this| {
            this.scoped(|this| this.lower_block(body))?;
            if !this.builder.is_terminated() {
                this.builder.br(next);
            }
            Ok(())
        })
    }

    fn lower_condition(&mut self, condition: &Expression, context: &str) -> Result<VReg, LowerError> {
        let (value, ty) = self.lower_expression(condition)?;
        Self::expect_type(context, IrType::Bool, ty)?;
        Ok(value)
    }

    // ============ Expressions ============

    fn lower_expression(&mut self, expr: &Expression) -> Result<(VReg, IrType), LowerError> {
        match expr {
            Expression::IntegerLiteral(lit) => Ok((self.builder.const_int(lit.value), IrType::I32)),
            Expression::FloatLiteral(lit) => Ok((self.builder.const_float(lit.value), IrType::F32)),
            Expression::BooleanLiteral(lit) => {
                Ok((self.builder.const_bool(lit.value), IrType::Bool))
            }
            Expression::Identifier(ident) => {
                let (ptr, ty) = self.resolve_slot(&ident.name)?;
                Ok((self.builder.load(ptr, ty), ty))
            }
            Expression::Call(call) => match self.env.lookup(&call.function) {
                Some(Binding {
                    handle: Handle::Function(_),
                    ty,
                }) => Ok((self.builder.call(&call.function, ty), ty)),
                Some(_) => Err(LowerError::NotCallable {
                    name: call.function.clone(),
                }),
                None => Err(LowerError::UndefinedFunction {
                    name: call.function.clone(),
                }),
            },
            Expression::Prefix(prefix) => {
                let (operand, ty) = self.lower_expression(&prefix.operand)?;
                match (prefix.operator, ty) {
                    (PrefixOperator::BwNot, IrType::I32) => Ok((self.builder.not(operand), ty)),
                    (operator, operand) => Err(LowerError::UnsupportedPrefix { operator, operand }),
                }
            }
            Expression::Infix(infix) => {
                let (lhs, left) = self.lower_expression(&infix.left)?;
                let (rhs, right) = self.lower_expression(&infix.right)?;
                self.lower_infix(infix.operator, lhs, left, rhs, right)
            }
        }
    }

    fn lower_infix(
        &mut self,
        operator: InfixOperator,
        lhs: VReg,
        left: IrType,
        rhs: VReg,
        right: IrType,
    ) -> Result<(VReg, IrType), LowerError> {
        use InfixOperator as Op;

        let b = &mut self.builder;
        let lowered = match (left, right) {
            (IrType::I32, IrType::I32) => match operator {
                Op::Add => Some((b.add(lhs, rhs), IrType::I32)),
                Op::Sub => Some((b.sub(lhs, rhs), IrType::I32)),
                Op::Mul => Some((b.mul(lhs, rhs), IrType::I32)),
                Op::Div => Some((b.sdiv(lhs, rhs), IrType::I32)),
                Op::Rem => Some((b.srem(lhs, rhs), IrType::I32)),
                Op::BwAnd => Some((b.and(lhs, rhs), IrType::I32)),
                Op::BwOr => Some((b.or(lhs, rhs), IrType::I32)),
                Op::BwXor => Some((b.xor(lhs, rhs), IrType::I32)),
                _ => comparison(operator).map(|op| (b.icmp(op, lhs, rhs), IrType::Bool)),
            },
            (IrType::F32, IrType::F32) => match operator {
                Op::Add => Some((b.fadd(lhs, rhs), IrType::F32)),
                Op::Sub => Some((b.fsub(lhs, rhs), IrType::F32)),
                Op::Mul => Some((b.fmul(lhs, rhs), IrType::F32)),
                Op::Div => Some((b.fdiv(lhs, rhs), IrType::F32)),
                _ => comparison(operator).map(|op| (b.fcmp(op, lhs, rhs), IrType::Bool)),
            },
            _ => None,
        };

        lowered.ok_or(LowerError::UnsupportedInfix {
            operator,
            left,
            right,
        })
    }
}

fn comparison(operator: InfixOperator) -> Option<CmpOp> {
    match operator {
        InfixOperator::Eq => Some(CmpOp::Eq),
        InfixOperator::Ne => Some(CmpOp::Ne),
        InfixOperator::Lt => Some(CmpOp::Lt),
        InfixOperator::Le => Some(CmpOp::Le),
        InfixOperator::Gt => Some(CmpOp::Gt),
        InfixOperator::Ge => Some(CmpOp::Ge),
        _ => None,
    }
}
