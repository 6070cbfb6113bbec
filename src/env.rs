//! Lexical scope chain
//!
//! The code generator keeps one [`Environment`] for the whole module. Scopes
//! form a stack: the global scope sits at the bottom and is never removed, and
//! each function or control-flow body pushes a child that is popped once the
//! body has been lowered. Lookups walk from the innermost scope outward.

use std::collections::HashMap;

use tracing::trace;

use crate::ir::{FuncId, IrType, VReg};

/// What a name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// Stack slot holding a variable (result of an `alloca` in `function`)
    Slot { function: FuncId, ptr: VReg },
    /// A declared function
    Function(FuncId),
}

/// A resolved name: its handle plus the static type of the value.
///
/// For functions the type is the declared return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub handle: Handle,
    pub ty: IrType,
}

#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
}

#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// A chain holding only the global scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Number of scopes on the chain, counting the global one
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
        trace!(depth = self.depth(), "enter scope");
    }

    /// Drop the innermost scope. The global scope stays put.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
        trace!(depth = self.depth(), "leave scope");
    }

    /// Bind `name` in the innermost scope, replacing any binding it already
    /// has there. Outer scopes are not touched.
    pub fn define(&mut self, name: impl Into<String>, handle: Handle, ty: IrType) -> Handle {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.into(), Binding { handle, ty });
        }
        handle
    }

    /// Resolve `name`, innermost scope first
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u32) -> Handle {
        Handle::Slot {
            function: FuncId(0),
            ptr: VReg(n),
        }
    }

    #[test]
    fn test_undefined_name() {
        let env = Environment::new();
        assert_eq!(env.lookup("x"), None);
    }

    #[test]
    fn test_define_returns_handle() {
        let mut env = Environment::new();
        let handle = env.define("x", slot(3), IrType::I32);
        assert_eq!(handle, slot(3));
        assert_eq!(
            env.lookup("x"),
            Some(Binding {
                handle,
                ty: IrType::I32
            })
        );
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut env = Environment::new();
        env.define("f", Handle::Function(FuncId(0)), IrType::I32);
        env.push_scope();
        env.push_scope();
        assert_eq!(env.lookup("f").map(|b| b.handle), Some(Handle::Function(FuncId(0))));
        env.pop_scope();
        env.pop_scope();
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn test_inner_definition_shadows_and_disappears() {
        let mut env = Environment::new();
        env.define("x", slot(0), IrType::I32);
        env.push_scope();
        env.define("x", slot(1), IrType::F32);
        assert_eq!(env.lookup("x").map(|b| b.ty), Some(IrType::F32));
        env.pop_scope();
        assert_eq!(env.lookup("x").map(|b| b.handle), Some(slot(0)));
    }

    #[test]
    fn test_define_overwrites_current_scope_only() {
        let mut env = Environment::new();
        env.define("x", slot(0), IrType::I32);
        env.define("x", slot(5), IrType::I32);
        assert_eq!(env.lookup("x").map(|b| b.handle), Some(slot(5)));
    }

    #[test]
    fn test_global_scope_survives_pop() {
        let mut env = Environment::new();
        env.define("g", slot(0), IrType::Bool);
        env.pop_scope();
        assert_eq!(env.depth(), 1);
        assert!(env.lookup("g").is_some());
    }
}
