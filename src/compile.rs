//! End-to-end compilation pipeline.
//!
//! One call to [`compile`] owns the whole lifecycle: intern, lex, parse,
//! type, emit, drop. The arenas holding every node, type, and variable live
//! on this function's stack frame, which is what makes the borrow story of
//! the AST so simple: everything dies together when the assembly string has
//! been produced.

use crate::arena::Arena;
use crate::arena_ctx::AstContext;
use crate::codegen;
use crate::error::Result;
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Compiles a C source string to an x86-64 assembly listing.
pub fn compile(source: &str) -> Result<String> {
    let mut interner = Interner::new();
    let tokens = Lexer::new(source, &mut interner).tokenize()?;

    let nodes = Arena::new();
    let types = Arena::new();
    let vars = Arena::new();
    let members = Arena::new();
    let lists = Arena::new();
    let ctx = AstContext::new(&nodes, &types, &vars, &members, &lists);

    let mut parser = Parser::new(tokens, &mut interner, ctx);
    let prog = parser.parse_program()?;

    codegen::emit(&prog, &interner)
}
