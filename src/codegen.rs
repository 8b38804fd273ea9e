//! x86-64 code generation.
//!
//! A one-pass stack-machine emitter in Intel syntax: every expression leaves
//! its value pushed on the hardware stack, statements leave nothing. Lvalues
//! are generated by [`CodeGen::gen_addr`], which pushes an address; loads
//! and stores are sized (`char` moves one byte and sign-extends, everything
//! else moves eight).
//!
//! The emitter owns the two responsibilities the parser deliberately left
//! open: assigning stack offsets to locals, and laying out string-literal
//! globals in the `.data` section.

use std::fmt::Write;

use crate::ast::{Function, Node, NodeKind, Program};
use crate::error::{CompileError, CompileErrorKind, Result};
use crate::intern::Interner;
use crate::types::{Type, TypeKind};

/// Argument registers, byte-sized and full-width.
const ARGREG1: [&str; 6] = ["dil", "sil", "dl", "cl", "r8b", "r9b"];
const ARGREG8: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Emits the whole program as an assembly listing.
pub fn emit(prog: &Program<'_>, interner: &Interner) -> Result<String> {
    let mut gen = CodeGen::new(interner);
    gen.emit_program(prog)?;
    Ok(gen.out)
}

struct CodeGen<'int> {
    out: String,
    interner: &'int Interner,
    label_count: usize,
    funcname: String,
}

impl<'int> CodeGen<'int> {
    fn new(interner: &'int Interner) -> Self {
        CodeGen {
            out: String::new(),
            interner,
            label_count: 0,
            funcname: String::new(),
        }
    }

    fn new_label(&mut self) -> usize {
        self.label_count += 1;
        self.label_count
    }

    fn emit_program(&mut self, prog: &Program<'_>) -> Result<()> {
        writeln!(self.out, ".intel_syntax noprefix").unwrap();

        writeln!(self.out, ".data").unwrap();
        for var in &prog.globals {
            writeln!(self.out, "{}:", self.interner.resolve(var.name)).unwrap();
            match var.contents {
                Some(contents) => {
                    for &byte in self.interner.resolve(contents).as_bytes() {
                        writeln!(self.out, "  .byte {}", byte).unwrap();
                    }
                }
                None => writeln!(self.out, "  .zero {}", var.ty.size()).unwrap(),
            }
        }

        writeln!(self.out, ".text").unwrap();
        for f in &prog.fns {
            self.emit_function(f)?;
        }
        Ok(())
    }

    fn emit_function(&mut self, f: &Function<'_>) -> Result<()> {
        self.funcname = self.interner.resolve(f.name).to_string();

        // Offsets grow downward from rbp, one slot per local in
        // declaration order, parameters included.
        let mut offset = 0;
        for var in &f.locals {
            offset += var.ty.size();
            var.offset.set(offset as i64);
        }
        let stack_size = align_to(offset, 8);

        writeln!(self.out, ".globl {}", self.funcname).unwrap();
        writeln!(self.out, "{}:", self.funcname).unwrap();

        // Prologue.
        writeln!(self.out, "  push rbp").unwrap();
        writeln!(self.out, "  mov rbp, rsp").unwrap();
        writeln!(self.out, "  sub rsp, {}", stack_size).unwrap();

        for (i, param) in f.params.iter().enumerate() {
            let offset = param.offset.get();
            if param.ty.size() == 1 {
                writeln!(self.out, "  mov [rbp-{}], {}", offset, ARGREG1[i]).unwrap();
            } else {
                writeln!(self.out, "  mov [rbp-{}], {}", offset, ARGREG8[i]).unwrap();
            }
        }

        for stmt in f.body.iter() {
            self.gen(stmt)?;
        }

        // Epilogue.
        writeln!(self.out, ".L.return.{}:", self.funcname).unwrap();
        writeln!(self.out, "  mov rsp, rbp").unwrap();
        writeln!(self.out, "  pop rbp").unwrap();
        writeln!(self.out, "  ret").unwrap();
        Ok(())
    }

    /// Pushes the address of an lvalue.
    fn gen_addr(&mut self, node: &Node<'_>) -> Result<()> {
        match node.kind {
            NodeKind::Var(var) => {
                if var.is_local {
                    writeln!(self.out, "  lea rax, [rbp-{}]", var.offset.get()).unwrap();
                } else {
                    writeln!(self.out, "  lea rax, [rip+{}]", self.interner.resolve(var.name))
                        .unwrap();
                }
                writeln!(self.out, "  push rax").unwrap();
                Ok(())
            }
            NodeKind::Deref { operand } => self.gen(operand),
            NodeKind::Member { base, member } => {
                self.gen_addr(base)?;
                writeln!(self.out, "  pop rax").unwrap();
                writeln!(self.out, "  add rax, {}", member.offset).unwrap();
                writeln!(self.out, "  push rax").unwrap();
                Ok(())
            }
            _ => Err(CompileError::new(
                CompileErrorKind::NotAnLvalue,
                node.tok.span,
            )),
        }
    }

    /// Replaces the address on the stack top with the value it points at.
    fn load(&mut self, ty: &Type<'_>) {
        writeln!(self.out, "  pop rax").unwrap();
        if ty.size() == 1 {
            writeln!(self.out, "  movsx rax, byte ptr [rax]").unwrap();
        } else {
            writeln!(self.out, "  mov rax, [rax]").unwrap();
        }
        writeln!(self.out, "  push rax").unwrap();
    }

    /// Stores stack top into the address below it, leaving the value pushed.
    fn store(&mut self, ty: &Type<'_>) {
        writeln!(self.out, "  pop rdi").unwrap();
        writeln!(self.out, "  pop rax").unwrap();
        if ty.size() == 1 {
            writeln!(self.out, "  mov [rax], dil").unwrap();
        } else {
            writeln!(self.out, "  mov [rax], rdi").unwrap();
        }
        writeln!(self.out, "  push rdi").unwrap();
    }

    fn node_ty<'a>(node: &Node<'a>) -> &'a Type<'a> {
        node.ty().expect("node typed before code generation")
    }

    fn gen(&mut self, node: &Node<'_>) -> Result<()> {
        match node.kind {
            NodeKind::Null => Ok(()),

            NodeKind::Num(value) => {
                if let Ok(imm) = i32::try_from(value) {
                    writeln!(self.out, "  push {}", imm).unwrap();
                } else {
                    writeln!(self.out, "  movabs rax, {}", value).unwrap();
                    writeln!(self.out, "  push rax").unwrap();
                }
                Ok(())
            }

            NodeKind::ExprStmt { expr } => {
                self.gen(expr)?;
                writeln!(self.out, "  add rsp, 8").unwrap();
                Ok(())
            }

            NodeKind::Var(_) | NodeKind::Member { .. } => {
                self.gen_addr(node)?;
                let ty = Self::node_ty(node);
                // An array in value position decays to its address.
                if !matches!(ty.kind, TypeKind::Array { .. }) {
                    self.load(ty);
                }
                Ok(())
            }

            NodeKind::Assign { lhs, rhs } => {
                self.gen_addr(lhs)?;
                self.gen(rhs)?;
                self.store(Self::node_ty(node));
                Ok(())
            }

            NodeKind::Addr { operand } => self.gen_addr(operand),

            NodeKind::Deref { operand } => {
                self.gen(operand)?;
                let ty = Self::node_ty(node);
                if !matches!(ty.kind, TypeKind::Array { .. }) {
                    self.load(ty);
                }
                Ok(())
            }

            NodeKind::If { cond, then, els } => {
                let seq = self.new_label();
                self.gen(cond)?;
                writeln!(self.out, "  pop rax").unwrap();
                writeln!(self.out, "  cmp rax, 0").unwrap();
                match els {
                    Some(els) => {
                        writeln!(self.out, "  je .L.else.{}", seq).unwrap();
                        self.gen(then)?;
                        writeln!(self.out, "  jmp .L.end.{}", seq).unwrap();
                        writeln!(self.out, ".L.else.{}:", seq).unwrap();
                        self.gen(els)?;
                    }
                    None => {
                        writeln!(self.out, "  je .L.end.{}", seq).unwrap();
                        self.gen(then)?;
                    }
                }
                writeln!(self.out, ".L.end.{}:", seq).unwrap();
                Ok(())
            }

            NodeKind::While { cond, body } => {
                let seq = self.new_label();
                writeln!(self.out, ".L.begin.{}:", seq).unwrap();
                self.gen(cond)?;
                writeln!(self.out, "  pop rax").unwrap();
                writeln!(self.out, "  cmp rax, 0").unwrap();
                writeln!(self.out, "  je .L.end.{}", seq).unwrap();
                self.gen(body)?;
                writeln!(self.out, "  jmp .L.begin.{}", seq).unwrap();
                writeln!(self.out, ".L.end.{}:", seq).unwrap();
                Ok(())
            }

            NodeKind::For {
                init,
                cond,
                inc,
                body,
            } => {
                let seq = self.new_label();
                if let Some(init) = init {
                    self.gen(init)?;
                }
                writeln!(self.out, ".L.begin.{}:", seq).unwrap();
                if let Some(cond) = cond {
                    self.gen(cond)?;
                    writeln!(self.out, "  pop rax").unwrap();
                    writeln!(self.out, "  cmp rax, 0").unwrap();
                    writeln!(self.out, "  je .L.end.{}", seq).unwrap();
                }
                self.gen(body)?;
                if let Some(inc) = inc {
                    self.gen(inc)?;
                }
                writeln!(self.out, "  jmp .L.begin.{}", seq).unwrap();
                writeln!(self.out, ".L.end.{}:", seq).unwrap();
                Ok(())
            }

            NodeKind::Block { body } | NodeKind::StmtExpr { body } => {
                for stmt in body {
                    self.gen(stmt)?;
                }
                Ok(())
            }

            NodeKind::FunCall { name, args } => {
                for arg in args {
                    self.gen(arg)?;
                }
                for i in (0..args.len()).rev() {
                    writeln!(self.out, "  pop {}", ARGREG8[i]).unwrap();
                }

                // The ABI wants rsp 16-byte aligned at the call. We cannot
                // know the current parity statically, so branch on it.
                let seq = self.new_label();
                let name = self.interner.resolve(name);
                writeln!(self.out, "  mov rax, rsp").unwrap();
                writeln!(self.out, "  and rax, 15").unwrap();
                writeln!(self.out, "  jnz .L.call.{}", seq).unwrap();
                writeln!(self.out, "  mov rax, 0").unwrap();
                writeln!(self.out, "  call {}", name).unwrap();
                writeln!(self.out, "  jmp .L.end.{}", seq).unwrap();
                writeln!(self.out, ".L.call.{}:", seq).unwrap();
                writeln!(self.out, "  sub rsp, 8").unwrap();
                writeln!(self.out, "  mov rax, 0").unwrap();
                writeln!(self.out, "  call {}", name).unwrap();
                writeln!(self.out, "  add rsp, 8").unwrap();
                writeln!(self.out, ".L.end.{}:", seq).unwrap();
                writeln!(self.out, "  push rax").unwrap();
                Ok(())
            }

            NodeKind::Return { value } => {
                self.gen(value)?;
                writeln!(self.out, "  pop rax").unwrap();
                writeln!(self.out, "  jmp .L.return.{}", self.funcname).unwrap();
                Ok(())
            }

            NodeKind::Add { lhs, rhs }
            | NodeKind::Sub { lhs, rhs }
            | NodeKind::PtrAdd { lhs, rhs }
            | NodeKind::PtrSub { lhs, rhs }
            | NodeKind::PtrDiff { lhs, rhs }
            | NodeKind::Mul { lhs, rhs }
            | NodeKind::Div { lhs, rhs }
            | NodeKind::Eq { lhs, rhs }
            | NodeKind::Ne { lhs, rhs }
            | NodeKind::Lt { lhs, rhs }
            | NodeKind::Le { lhs, rhs } => {
                self.gen(lhs)?;
                self.gen(rhs)?;
                self.gen_binary(node, lhs);
                Ok(())
            }
        }
    }

    /// Combines the two pushed operands of a binary node into one value.
    fn gen_binary(&mut self, node: &Node<'_>, lhs: &Node<'_>) {
        writeln!(self.out, "  pop rdi").unwrap();
        writeln!(self.out, "  pop rax").unwrap();

        match node.kind {
            NodeKind::Add { .. } => writeln!(self.out, "  add rax, rdi").unwrap(),
            NodeKind::PtrAdd { .. } => {
                writeln!(self.out, "  imul rdi, {}", Self::elem_size(node)).unwrap();
                writeln!(self.out, "  add rax, rdi").unwrap();
            }
            NodeKind::Sub { .. } => writeln!(self.out, "  sub rax, rdi").unwrap(),
            NodeKind::PtrSub { .. } => {
                writeln!(self.out, "  imul rdi, {}", Self::elem_size(node)).unwrap();
                writeln!(self.out, "  sub rax, rdi").unwrap();
            }
            NodeKind::PtrDiff { .. } => {
                writeln!(self.out, "  sub rax, rdi").unwrap();
                writeln!(self.out, "  cqo").unwrap();
                writeln!(self.out, "  mov rdi, {}", Self::elem_size(lhs)).unwrap();
                writeln!(self.out, "  idiv rdi").unwrap();
            }
            NodeKind::Mul { .. } => writeln!(self.out, "  imul rax, rdi").unwrap(),
            NodeKind::Div { .. } => {
                writeln!(self.out, "  cqo").unwrap();
                writeln!(self.out, "  idiv rdi").unwrap();
            }
            NodeKind::Eq { .. } => {
                writeln!(self.out, "  cmp rax, rdi").unwrap();
                writeln!(self.out, "  sete al").unwrap();
                writeln!(self.out, "  movzb rax, al").unwrap();
            }
            NodeKind::Ne { .. } => {
                writeln!(self.out, "  cmp rax, rdi").unwrap();
                writeln!(self.out, "  setne al").unwrap();
                writeln!(self.out, "  movzb rax, al").unwrap();
            }
            NodeKind::Lt { .. } => {
                writeln!(self.out, "  cmp rax, rdi").unwrap();
                writeln!(self.out, "  setl al").unwrap();
                writeln!(self.out, "  movzb rax, al").unwrap();
            }
            NodeKind::Le { .. } => {
                writeln!(self.out, "  cmp rax, rdi").unwrap();
                writeln!(self.out, "  setle al").unwrap();
                writeln!(self.out, "  movzb rax, al").unwrap();
            }
            _ => {}
        }

        writeln!(self.out, "  push rax").unwrap();
    }

    /// Byte size of the pointed-at element, for pointer arithmetic scaling.
    fn elem_size(node: &Node<'_>) -> usize {
        Self::node_ty(node)
            .base()
            .expect("pointer arithmetic on a based type")
            .size()
    }
}

fn align_to(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}
