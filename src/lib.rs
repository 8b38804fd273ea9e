//! # minic
//!
//! A small C-subset compiler targeting x86-64.
//!
//! ## Quick Start
//!
//! ```rust
//! use minic::compile;
//!
//! let asm = compile("int main(){ return 1+2*3; }").unwrap();
//! assert!(asm.contains("main:"));
//! ```
//!
//! ## Architecture
//!
//! The pipeline consists of four stages:
//!
//! 1. **Lexer** ([`lexer`]) - Tokenizes the source into a stream of
//!    [`Token`]s carrying spans and interned lexemes.
//!
//! 2. **Parser** ([`parser`]) - Recursive descent over the C-subset
//!    grammar, producing an arena-allocated AST. Typing is interleaved
//!    with parsing ([`typing`]): pointer arithmetic classification,
//!    member resolution, and `sizeof` all need the types of already-built
//!    subtrees.
//!
//! 3. **Scope and symbols** ([`scope`]) - A binding stack with marker-based
//!    restoration implements shadowing and block scope; flat accumulators
//!    hand the emitter every local and global ever declared.
//!
//! 4. **Code generator** ([`codegen`]) - A one-pass stack machine emitter
//!    producing Intel-syntax x86-64 assembly.
//!
//! ## The language
//!
//! `int` (8 bytes), `char`, pointers, fixed-size arrays, anonymous structs
//! with packed layout, functions of up to six parameters, `if`/`while`/
//! `for` control flow, GNU statement expressions, `sizeof`, and string
//! literals promoted to labeled globals. No typedef, enum, union, float,
//! unsigned, storage classes, or preprocessor.

// Core modules
pub mod arena;
pub mod error;
pub mod intern;
pub mod lexer;
pub mod token;

// Types, AST, and symbols
pub mod arena_ctx;
pub mod ast;
pub mod scope;
pub mod types;
pub mod typing;

// Parser
pub mod parser;

// Code generation and the compile API
pub mod codegen;
pub mod compile;

// Driver
pub mod cli;

// Support modules
pub mod style;
pub mod suggest;

// Re-export key types at crate root
pub use arena::Arena;
pub use arena_ctx::AstContext;
pub use ast::{Function, Node, NodeKind, Program, Var};
pub use compile::compile;
pub use error::{CompileError, CompileErrorKind};
pub use intern::{Interner, Symbol};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Span, Token, TokenKind};
pub use types::{Member, Type, TypeKind};
