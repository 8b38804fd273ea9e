//! End-to-end compilation scenarios exercised through the public API.

use minic::compile;
use minic::CompileErrorKind;

#[test]
fn arithmetic_precedence_program() {
    let asm = compile("int main(){ return 1+2*3; }").expect("compiles");
    assert!(asm.contains("main:"));
    assert!(asm.contains("  imul rax, rdi"));
    assert!(asm.contains("  add rax, rdi"));
}

#[test]
fn array_store_and_load_share_an_address_path() {
    let asm = compile("int main(){ int a[3]; a[1]=5; return *(a+1); }").expect("compiles");
    // Both a[1] and *(a+1) scale the index by the 8-byte element size.
    let scaled = asm.matches("  imul rdi, 8").count();
    assert_eq!(scaled, 2);
}

#[test]
fn struct_member_assignment_uses_its_offset() {
    let asm =
        compile("int main(){ struct { int x; char y; } s; s.y = 7; return s.y; }").expect("compiles");
    assert!(asm.contains("  add rax, 8"));
    // y is a char: byte store, sign-extending byte load.
    assert!(asm.contains("  mov [rax], dil"));
    assert!(asm.contains("  movsx rax, byte ptr [rax]"));
}

#[test]
fn for_loop_emits_branch_and_backedge() {
    let asm =
        compile("int main(){ int i; for (i=0; i<10; i=i+1) {} return i; }").expect("compiles");
    assert!(asm.contains(".L.begin.1:"));
    assert!(asm.contains("  je .L.end.1"));
    assert!(asm.contains("  jmp .L.begin.1"));
}

#[test]
fn string_literal_is_promoted_to_a_labeled_global() {
    let asm = compile("int main(){ char *s = \"hi\"; return sizeof s; }").expect("compiles");
    assert!(asm.contains(".L.data.0:"));
    // sizeof s is a pointer: resolved to the constant 8 at parse time.
    assert!(asm.contains("  push 8"));
}

#[test]
fn global_variables_live_in_data_not_on_the_stack() {
    let asm = compile("int x; int main(){ return x; }").expect("compiles");
    assert!(asm.contains("x:"));
    assert!(asm.contains("  .zero 8"));
    assert!(asm.contains("  lea rax, [rip+x]"));
}

#[test]
fn gt_and_swapped_lt_compile_to_identical_bodies() {
    let gt = compile("int main(){ int a; int b; return a>b; }").expect("compiles");
    let lt = compile("int main(){ int a; int b; return b<a; }").expect("compiles");
    assert_eq!(gt, lt);
}

#[test]
fn ge_and_swapped_le_compile_to_identical_bodies() {
    let ge = compile("int main(){ int a; int b; return a>=b; }").expect("compiles");
    let le = compile("int main(){ int a; int b; return b<=a; }").expect("compiles");
    assert_eq!(ge, le);
}

#[test]
fn statement_expression_and_block_emit_the_same_statements() {
    let block = compile("int main(){ { 1; 2; } return 0; }").expect("compiles");
    let expr = compile("int main(){ return ({ 1; 2; }); }").expect("compiles");
    // Both forms push 1, discard it, and push 2; only what happens to the
    // final value differs.
    assert!(block.contains("  push 1"));
    assert!(expr.contains("  push 1"));
    assert!(block.contains("  push 2"));
    assert!(expr.contains("  push 2"));
}

#[test]
fn else_branch_gets_its_own_label() {
    let asm = compile("int main(){ if (1) return 2; else return 3; }").expect("compiles");
    assert!(asm.contains("  je .L.else.1"));
    assert!(asm.contains(".L.else.1:"));
    assert!(asm.contains(".L.end.1:"));
}

#[test]
fn while_loop_compiles() {
    let asm = compile("int main(){ int i; i=0; while (i<5) i=i+1; return i; }").expect("compiles");
    assert!(asm.contains(".L.begin.1:"));
    assert!(asm.contains("  jmp .L.begin.1"));
}

#[test]
fn recursive_call_references_own_label() {
    let asm =
        compile("int f(int n){ if (n<1) return 0; return f(n-1); } int main(){ return f(3); }")
            .expect("compiles");
    assert!(asm.contains(".globl f"));
    assert!(asm.contains("  call f"));
}

#[test]
fn pointer_difference_divides_by_element_size() {
    let asm = compile("int main(){ int a[4]; return (a+3) - a; }").expect("compiles");
    assert!(asm.contains("  cqo"));
    assert!(asm.contains("  mov rdi, 8"));
    assert!(asm.contains("  idiv rdi"));
}

#[test]
fn sizeof_struct_counts_packed_members() {
    let asm = compile("int main(){ struct { char a; char b; int c; } s; return sizeof s; }")
        .expect("compiles");
    assert!(asm.contains("  push 10"));
}

#[test]
fn undefined_variable_fails_compilation() {
    let err = compile("int main(){ return nope; }").unwrap_err();
    assert!(matches!(
        err.kind,
        CompileErrorKind::UndefinedVariable { ref name } if name == "nope"
    ));
}

#[test]
fn variable_declared_in_block_is_gone_after_it() {
    let err = compile("int main(){ {int a; a=1;} return a; }").unwrap_err();
    assert!(matches!(
        err.kind,
        CompileErrorKind::UndefinedVariable { ref name } if name == "a"
    ));
}

#[test]
fn shadowed_variable_reemerges_after_block() {
    let asm = compile("int main(){ int a; a=1; { char a; a=2; } return a; }").expect("compiles");
    // The outer int a is the first local, at offset 8.
    assert!(asm.contains("  lea rax, [rbp-8]"));
}

#[test]
fn statement_expression_must_end_in_an_expression() {
    let err = compile("int main(){ return ({ int x; }); }").unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::StmtExprVoid));
}

#[test]
fn empty_source_compiles_to_an_empty_program() {
    let asm = compile("").expect("compiles");
    assert!(asm.contains(".text"));
    assert!(!asm.contains(".globl"));
}
