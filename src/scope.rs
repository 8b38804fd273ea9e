//! Scope stack and variable accumulators.
//!
//! One [`Env`] lives for a whole compilation. The binding stack implements
//! lexical scoping: entering a block saves the stack length as a
//! [`ScopeMarker`], leaving truncates back to it. Lookup walks from the top
//! of the stack, so the innermost declaration of a name shadows outer ones.
//!
//! `locals` and `globals` are append-only accumulators that are never
//! rewound by scope exit; the code emitter needs every variable that ever
//! existed, in declaration order. Leaving a scope only removes bindings
//! from the lookup chain.
//!
//! No redeclaration check is performed; a later declaration of the same
//! name simply shadows the earlier one.

use crate::arena_ctx::AstContext;
use crate::ast::Var;
use crate::intern::{Interner, Symbol};
use crate::types::Type;

/// A snapshot of the binding-stack depth, used to pop all bindings
/// introduced after it.
#[derive(Debug, Clone, Copy)]
pub struct ScopeMarker(usize);

pub struct Env<'a> {
    scope: Vec<(Symbol, &'a Var<'a>)>,
    locals: Vec<&'a Var<'a>>,
    globals: Vec<&'a Var<'a>>,
    label_count: usize,
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Env {
            scope: Vec::new(),
            locals: Vec::new(),
            globals: Vec::new(),
            label_count: 0,
        }
    }

    pub fn enter_scope(&self) -> ScopeMarker {
        ScopeMarker(self.scope.len())
    }

    pub fn leave_scope(&mut self, marker: ScopeMarker) {
        self.scope.truncate(marker.0);
    }

    /// Declares a function-local variable, visible until its scope is left.
    pub fn declare_local(
        &mut self,
        ctx: AstContext<'a>,
        name: Symbol,
        ty: &'a Type<'a>,
    ) -> &'a Var<'a> {
        let var = ctx.new_var(name, ty, true, None);
        self.scope.push((name, var));
        self.locals.push(var);
        var
    }

    /// Declares a program-wide global variable.
    pub fn declare_global(
        &mut self,
        ctx: AstContext<'a>,
        name: Symbol,
        ty: &'a Type<'a>,
    ) -> &'a Var<'a> {
        let var = ctx.new_var(name, ty, false, None);
        self.scope.push((name, var));
        self.globals.push(var);
        var
    }

    /// Promotes a string literal to an anonymous `char` array global with a
    /// fresh `.L.data.<n>` label. `contents` includes the trailing NUL.
    pub fn declare_string(
        &mut self,
        ctx: AstContext<'a>,
        interner: &mut Interner,
        contents: Symbol,
    ) -> &'a Var<'a> {
        let label = interner.intern(&format!(".L.data.{}", self.label_count));
        self.label_count += 1;
        let len = interner.resolve(contents).len();
        let ty = ctx.array_of(Type::char_type(), len);
        let var = ctx.new_var(label, ty, false, Some(contents));
        self.scope.push((label, var));
        self.globals.push(var);
        var
    }

    /// Finds the innermost binding for `name`.
    pub fn lookup(&self, name: Symbol) -> Option<&'a Var<'a>> {
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|&(_, var)| var)
    }

    /// Hands over the locals accumulated since the last call, resetting it
    /// for the next function.
    pub fn take_locals(&mut self) -> Vec<&'a Var<'a>> {
        std::mem::take(&mut self.locals)
    }

    /// Hands over the program-wide globals.
    pub fn take_globals(&mut self) -> Vec<&'a Var<'a>> {
        std::mem::take(&mut self.globals)
    }
}

impl<'a> Default for Env<'a> {
    fn default() -> Self {
        Self::new()
    }
}
