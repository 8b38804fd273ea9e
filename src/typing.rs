//! The typing pass and typed arithmetic lowering.
//!
//! [`add_type`] assigns a type to a node after its children are typed. It is
//! idempotent (a node already typed is returned as-is), so the parser can
//! call it eagerly while building subtrees and the final whole-tree walk in
//! `parse_program` re-visits each node at most once.
//!
//! [`new_add`] and [`new_sub`] implement the `+`/`-` lowering that separates
//! integer from pointer arithmetic. A "pointer operand" is any operand whose
//! type has a base, so arrays decay to pointers here without any explicit
//! conversion node.

use crate::arena_ctx::AstContext;
use crate::ast::{Node, NodeKind};
use crate::error::{CompileError, CompileErrorKind, Result};
use crate::token::Token;
use crate::types::{Type, TypeKind};

/// Types `node` (and, recursively, its children), returning the node's type.
pub fn add_type<'a>(ctx: AstContext<'a>, node: &'a Node<'a>) -> Result<&'a Type<'a>> {
    if let Some(ty) = node.ty() {
        return Ok(ty);
    }

    let ty = match node.kind {
        NodeKind::Num(_) => Type::int_type(),
        NodeKind::Var(var) => var.ty,
        NodeKind::Member { base, member } => {
            add_type(ctx, base)?;
            member.ty
        }

        NodeKind::Add { lhs, rhs }
        | NodeKind::Sub { lhs, rhs }
        | NodeKind::Mul { lhs, rhs }
        | NodeKind::Div { lhs, rhs }
        | NodeKind::Eq { lhs, rhs }
        | NodeKind::Ne { lhs, rhs }
        | NodeKind::Lt { lhs, rhs }
        | NodeKind::Le { lhs, rhs }
        | NodeKind::PtrDiff { lhs, rhs } => {
            add_type(ctx, lhs)?;
            add_type(ctx, rhs)?;
            Type::int_type()
        }

        NodeKind::PtrAdd { lhs, rhs } | NodeKind::PtrSub { lhs, rhs } => {
            let lt = add_type(ctx, lhs)?;
            add_type(ctx, rhs)?;
            lt
        }

        NodeKind::Assign { lhs, rhs } => {
            let lt = add_type(ctx, lhs)?;
            add_type(ctx, rhs)?;
            lt
        }

        NodeKind::Addr { operand } => {
            let ty = add_type(ctx, operand)?;
            match ty.kind {
                // Taking the address of an array yields a pointer to its
                // element type, not to the array.
                TypeKind::Array { base, .. } => ctx.pointer_to(base),
                _ => ctx.pointer_to(ty),
            }
        }

        NodeKind::Deref { operand } => {
            let ty = add_type(ctx, operand)?;
            ty.base().ok_or_else(|| {
                CompileError::new(CompileErrorKind::InvalidDereference, node.tok.span)
            })?
        }

        NodeKind::FunCall { args, .. } => {
            for arg in args.iter().copied() {
                add_type(ctx, arg)?;
            }
            Type::int_type()
        }

        NodeKind::Return { value } => {
            add_type(ctx, value)?;
            Type::int_type()
        }
        NodeKind::ExprStmt { expr } => {
            add_type(ctx, expr)?;
            Type::int_type()
        }
        NodeKind::If { cond, then, els } => {
            add_type(ctx, cond)?;
            add_type(ctx, then)?;
            if let Some(els) = els {
                add_type(ctx, els)?;
            }
            Type::int_type()
        }
        NodeKind::While { cond, body } => {
            add_type(ctx, cond)?;
            add_type(ctx, body)?;
            Type::int_type()
        }
        NodeKind::For {
            init,
            cond,
            inc,
            body,
        } => {
            for part in [init, cond, inc].into_iter().flatten() {
                add_type(ctx, part)?;
            }
            add_type(ctx, body)?;
            Type::int_type()
        }
        NodeKind::Block { body } => {
            for stmt in body.iter().copied() {
                add_type(ctx, stmt)?;
            }
            Type::int_type()
        }

        NodeKind::StmtExpr { body } => {
            let mut last_ty = None;
            for stmt in body.iter().copied() {
                last_ty = Some(add_type(ctx, stmt)?);
            }
            last_ty.ok_or_else(|| {
                CompileError::new(CompileErrorKind::StmtExprVoid, node.tok.span)
            })?
        }

        NodeKind::Null => Type::int_type(),
    };

    node.set_ty(ty);
    Ok(ty)
}

/// Lowers `lhs + rhs` to `Add`/`PtrAdd`, normalizing the pointer to `lhs`.
pub fn new_add<'a>(
    ctx: AstContext<'a>,
    lhs: &'a Node<'a>,
    rhs: &'a Node<'a>,
    tok: Token,
) -> Result<&'a Node<'a>> {
    let lt = add_type(ctx, lhs)?;
    let rt = add_type(ctx, rhs)?;

    let node = if lt.is_integer() && rt.is_integer() {
        ctx.node(NodeKind::Add { lhs, rhs }, tok)
    } else if lt.base().is_some() && rt.is_integer() {
        ctx.node(NodeKind::PtrAdd { lhs, rhs }, tok)
    } else if lt.is_integer() && rt.base().is_some() {
        // int + ptr: swap so the pointer is always on the left.
        ctx.node(NodeKind::PtrAdd { lhs: rhs, rhs: lhs }, tok)
    } else {
        return Err(CompileError::new(
            CompileErrorKind::InvalidOperands,
            tok.span,
        ));
    };
    add_type(ctx, node)?;
    Ok(node)
}

/// Lowers `lhs - rhs` to `Sub`/`PtrSub`/`PtrDiff`.
pub fn new_sub<'a>(
    ctx: AstContext<'a>,
    lhs: &'a Node<'a>,
    rhs: &'a Node<'a>,
    tok: Token,
) -> Result<&'a Node<'a>> {
    let lt = add_type(ctx, lhs)?;
    let rt = add_type(ctx, rhs)?;

    let node = if lt.is_integer() && rt.is_integer() {
        ctx.node(NodeKind::Sub { lhs, rhs }, tok)
    } else if lt.base().is_some() && rt.is_integer() {
        ctx.node(NodeKind::PtrSub { lhs, rhs }, tok)
    } else if lt.base().is_some() && rt.base().is_some() {
        ctx.node(NodeKind::PtrDiff { lhs, rhs }, tok)
    } else {
        return Err(CompileError::new(
            CompileErrorKind::InvalidOperands,
            tok.span,
        ));
    };
    add_type(ctx, node)?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::intern::{Interner, Symbol};
    use crate::token::{Span, TokenKind};

    fn tok() -> Token {
        Token::new(TokenKind::Plus, Symbol::EMPTY, Span::new(0, 1))
    }

    macro_rules! ctx {
        ($nodes:ident, $types:ident, $vars:ident, $members:ident, $lists:ident) => {{
            AstContext::new(&$nodes, &$types, &$vars, &$members, &$lists)
        }};
    }

    #[test]
    fn int_plus_int_is_add() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);

        let sum = new_add(ctx, ctx.num(1, tok()), ctx.num(2, tok()), tok()).expect("typed");
        assert!(matches!(sum.kind, NodeKind::Add { .. }));
        assert_eq!(sum.ty(), Some(Type::int_type()));
    }

    #[test]
    fn ptr_plus_int_is_ptr_add() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let p = ctx.new_var(
            interner.intern("p"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let sum = new_add(ctx, ctx.var_node(p, tok()), ctx.num(1, tok()), tok()).expect("typed");
        assert!(matches!(sum.kind, NodeKind::PtrAdd { .. }));
        assert_eq!(sum.ty(), Some(p.ty));
    }

    #[test]
    fn int_plus_ptr_swaps_operands() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let p = ctx.new_var(
            interner.intern("p"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let sum = new_add(ctx, ctx.num(1, tok()), ctx.var_node(p, tok()), tok()).expect("typed");
        let NodeKind::PtrAdd { lhs, .. } = sum.kind else {
            panic!("expected PtrAdd, got {:?}", sum.kind);
        };
        assert!(matches!(lhs.kind, NodeKind::Var(_)));
    }

    #[test]
    fn array_decays_in_addition() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let a = ctx.new_var(
            interner.intern("a"),
            ctx.array_of(Type::int_type(), 3),
            true,
            None,
        );
        let sum = new_add(ctx, ctx.var_node(a, tok()), ctx.num(1, tok()), tok()).expect("typed");
        assert!(matches!(sum.kind, NodeKind::PtrAdd { .. }));
    }

    #[test]
    fn ptr_plus_ptr_is_invalid() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let p = ctx.new_var(
            interner.intern("p"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let q = ctx.new_var(
            interner.intern("q"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let err = new_add(
            ctx,
            ctx.var_node(p, tok()),
            ctx.var_node(q, tok()),
            tok(),
        )
        .unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::InvalidOperands));
    }

    #[test]
    fn ptr_minus_ptr_is_ptr_diff_typed_int() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let p = ctx.new_var(
            interner.intern("p"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let q = ctx.new_var(
            interner.intern("q"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let diff = new_sub(
            ctx,
            ctx.var_node(p, tok()),
            ctx.var_node(q, tok()),
            tok(),
        )
        .expect("typed");
        assert!(matches!(diff.kind, NodeKind::PtrDiff { .. }));
        assert_eq!(diff.ty(), Some(Type::int_type()));
    }

    #[test]
    fn int_minus_ptr_is_invalid() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let p = ctx.new_var(
            interner.intern("p"),
            ctx.pointer_to(Type::int_type()),
            true,
            None,
        );
        let err = new_sub(ctx, ctx.num(1, tok()), ctx.var_node(p, tok()), tok()).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::InvalidOperands));
    }

    #[test]
    fn deref_of_integer_is_invalid() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);

        let node = ctx.node(
            NodeKind::Deref {
                operand: ctx.num(1, tok()),
            },
            tok(),
        );
        let err = add_type(ctx, node).unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::InvalidDereference));
    }

    #[test]
    fn addr_of_array_is_pointer_to_element() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);
        let mut interner = Interner::new();

        let a = ctx.new_var(
            interner.intern("a"),
            ctx.array_of(Type::char_type(), 4),
            true,
            None,
        );
        let addr = ctx.node(
            NodeKind::Addr {
                operand: ctx.var_node(a, tok()),
            },
            tok(),
        );
        let ty = add_type(ctx, addr).expect("typed");
        assert_eq!(ty.base(), Some(Type::char_type()));
        assert_eq!(ty.size(), 8);
    }

    #[test]
    fn add_type_is_idempotent() {
        let nodes = Arena::new();
        let types = Arena::new();
        let vars = Arena::new();
        let members = Arena::new();
        let lists = Arena::new();
        let ctx = ctx!(nodes, types, vars, members, lists);

        let n = ctx.num(1, tok());
        let first = add_type(ctx, n).expect("typed");
        let second = add_type(ctx, n).expect("typed");
        assert!(std::ptr::eq(first, second));
    }
}
