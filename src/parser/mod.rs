//! Recursive-descent parser for the C subset.
//!
//! The grammar, in the order the methods below appear:
//!
//! ```text
//! program        = (global-var | function)*
//! function       = basetype ident "(" params? ")" "{" stmt* "}"
//! params         = param ("," param)*
//! param          = basetype ident type-suffix
//! global-var     = basetype ident type-suffix ";"
//! basetype       = ("char" | "int" | struct-decl) "*"*
//! struct-decl    = "struct" "{" (basetype ident type-suffix ";")* "}"
//! type-suffix    = ("[" num "]")*
//! declaration    = basetype ident type-suffix ("=" expr)? ";"
//! stmt           = "return" expr ";"
//!                | "if" "(" expr ")" stmt ("else" stmt)?
//!                | "while" "(" expr ")" stmt
//!                | "for" "(" expr-stmt? ";" expr? ";" expr-stmt? ")" stmt
//!                | "{" stmt* "}"
//!                | declaration
//!                | expr ";"
//! expr           = assign
//! assign         = equality ("=" assign)?
//! equality       = relational (("==" | "!=") relational)*
//! relational     = add (("<" | "<=" | ">" | ">=") add)*
//! add            = mul (("+" | "-") mul)*
//! mul            = unary (("*" | "/") unary)*
//! unary          = ("+" | "-" | "*" | "&") unary | postfix
//! postfix        = primary ("[" expr "]" | "." ident)*
//! primary        = "(" "{" stmt stmt* "}" ")"
//!                | "(" expr ")"
//!                | "sizeof" unary
//!                | ident ("(" func-args? ")")?
//!                | string
//!                | num
//! func-args      = assign ("," assign)*
//! ```
//!
//! Parsing and typing are interleaved: `a + b` cannot be lowered without
//! knowing whether an operand is a pointer, and `x.m` and `sizeof e` need
//! their subtree typed before the enclosing expression continues. The
//! typing rules themselves live in [`crate::typing`].
//!
//! Only `<` and `<=` comparison nodes exist: `a > b` is parsed as `b < a`
//! and `a >= b` as `b <= a`.


use crate::arena_ctx::AstContext;
use crate::ast::{Function, Node, NodeKind, Program, Var};
use crate::error::{CompileError, CompileErrorKind};
use crate::intern::{Interner, Symbol};
use crate::scope::Env;
use crate::token::{Span, Token, TokenKind};
use crate::types::{Member, Type, TypeKind};
use crate::typing::{add_type, new_add, new_sub};

pub(crate) type ParseResult<T> = Result<T, CompileError>;

/// The most arguments a call can pass in registers.
const MAX_ARGS: usize = 6;

#[derive(Clone, Copy)]
struct ParserCheckpoint {
    pos: usize,
}

pub struct Parser<'a, 'int> {
    tokens: Vec<Token>,
    current: usize,
    interner: &'int mut Interner,
    ctx: AstContext<'a>,
    env: Env<'a>,
}

impl<'a, 'int> Parser<'a, 'int> {
    pub fn new(tokens: Vec<Token>, interner: &'int mut Interner, ctx: AstContext<'a>) -> Self {
        Parser {
            tokens,
            current: 0,
            interner,
            ctx,
            env: Env::new(),
        }
    }

    /// Parses a whole translation unit and types every node in it.
    pub fn parse_program(&mut self) -> ParseResult<Program<'a>> {
        let mut fns = Vec::new();
        while !self.at_eof() {
            if self.is_function()? {
                fns.push(self.function()?);
            } else {
                self.global_var()?;
            }
        }

        for f in &fns {
            for stmt in f.body.iter().copied() {
                add_type(self.ctx, stmt)?;
            }
        }

        Ok(Program {
            globals: self.env.take_globals(),
            fns,
        })
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    /// Decides whether the upcoming declaration is a function definition.
    ///
    /// Speculatively parses `basetype ident` and checks for `(`, then
    /// rewinds the cursor unconditionally. The speculative basetype may
    /// allocate a struct type that is thrown away and reparsed; type
    /// construction is pure, so the duplicate is harmless arena garbage.
    fn is_function(&mut self) -> ParseResult<bool> {
        let cp = self.checkpoint();
        let result = self.function_ahead();
        self.restore(cp);
        result
    }

    fn function_ahead(&mut self) -> ParseResult<bool> {
        self.basetype()?;
        Ok(self.consume_ident().is_some() && self.check(TokenKind::LParen))
    }

    fn function(&mut self) -> ParseResult<Function<'a>> {
        self.basetype()?;
        let (name, _) = self.expect_ident()?;
        let marker = self.env.enter_scope();
        self.consume(TokenKind::LParen)?;
        let params = self.read_func_params()?;
        self.consume(TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.at_eof() {
                self.consume(TokenKind::RBrace)?;
            }
            body.push(self.stmt()?);
        }
        self.advance();
        self.env.leave_scope(marker);

        Ok(Function {
            name,
            params,
            locals: self.env.take_locals(),
            body: self.ctx.node_list(body),
        })
    }

    fn read_func_params(&mut self) -> ParseResult<Vec<&'a Var<'a>>> {
        let mut params = Vec::new();
        if self.match_token(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let base = self.basetype()?;
            let (name, _) = self.expect_ident()?;
            let ty = self.type_suffix(base)?;
            params.push(self.env.declare_local(self.ctx, name, ty));
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RParen)?;
        Ok(params)
    }

    fn global_var(&mut self) -> ParseResult<()> {
        let base = self.basetype()?;
        let (name, _) = self.expect_ident()?;
        let ty = self.type_suffix(base)?;
        self.consume(TokenKind::Semicolon)?;
        self.env.declare_global(self.ctx, name, ty);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    fn is_typename(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Int | TokenKind::Char | TokenKind::Struct
        )
    }

    fn basetype(&mut self) -> ParseResult<&'a Type<'a>> {
        let mut ty = if self.match_token(TokenKind::Char) {
            Type::char_type()
        } else if self.match_token(TokenKind::Int) {
            Type::int_type()
        } else if self.check(TokenKind::Struct) {
            self.struct_decl()?
        } else {
            return Err(CompileError::new(
                CompileErrorKind::ExpectedTypeName {
                    found: self.peek().kind,
                },
                self.current_span(),
            ));
        };
        while self.match_token(TokenKind::Star) {
            ty = self.ctx.pointer_to(ty);
        }
        Ok(ty)
    }

    /// Parses an anonymous struct declaration, laying members out in
    /// declaration order with no padding.
    fn struct_decl(&mut self) -> ParseResult<&'a Type<'a>> {
        self.consume(TokenKind::Struct)?;
        self.consume(TokenKind::LBrace)?;

        let mut members = Vec::new();
        let mut offset = 0;
        while !self.check(TokenKind::RBrace) {
            if self.at_eof() {
                self.consume(TokenKind::RBrace)?;
            }
            let base = self.basetype()?;
            let (name, _) = self.expect_ident()?;
            let ty = self.type_suffix(base)?;
            self.consume(TokenKind::Semicolon)?;
            members.push(Member { name, ty, offset });
            offset += ty.size();
        }
        self.advance();

        Ok(self.ctx.struct_type(members))
    }

    /// Parses `("[" num "]")*` suffixes, innermost dimension last.
    fn type_suffix(&mut self, base: &'a Type<'a>) -> ParseResult<&'a Type<'a>> {
        if !self.match_token(TokenKind::LBracket) {
            return Ok(base);
        }
        let len = self.expect_number()?;
        self.consume(TokenKind::RBracket)?;
        let base = self.type_suffix(base)?;
        Ok(self.ctx.array_of(base, len as usize))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parses a local declaration. Without an initializer this produces a
    /// no-op `Null` statement; the variable still lands in the function's
    /// locals either way.
    fn declaration(&mut self) -> ParseResult<&'a Node<'a>> {
        let start = *self.peek();
        let base = self.basetype()?;
        let (name, name_tok) = self.expect_ident()?;
        let ty = self.type_suffix(base)?;
        let var = self.env.declare_local(self.ctx, name, ty);

        if self.match_token(TokenKind::Semicolon) {
            return Ok(self.ctx.node(NodeKind::Null, start));
        }

        let assign_tok = self.consume(TokenKind::Assign)?;
        let lhs = self.ctx.var_node(var, name_tok);
        let rhs = self.expr()?;
        self.consume(TokenKind::Semicolon)?;
        let assign = self.ctx.node(NodeKind::Assign { lhs, rhs }, assign_tok);
        Ok(self.ctx.node(NodeKind::ExprStmt { expr: assign }, start))
    }

    fn stmt(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = *self.peek();
        match tok.kind {
            TokenKind::Return => {
                self.advance();
                let value = self.expr()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(self.ctx.node(NodeKind::Return { value }, tok))
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::LBrace => self.block(),
            _ if self.is_typename() => self.declaration(),
            _ => {
                let node = self.read_expr_stmt()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(node)
            }
        }
    }

    fn if_stmt(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = self.advance();
        self.consume(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.consume(TokenKind::RParen)?;
        let then = self.stmt()?;
        let els = if self.match_token(TokenKind::Else) {
            Some(self.stmt()?)
        } else {
            None
        };
        Ok(self.ctx.node(NodeKind::If { cond, then, els }, tok))
    }

    fn while_stmt(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = self.advance();
        self.consume(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.consume(TokenKind::RParen)?;
        let body = self.stmt()?;
        Ok(self.ctx.node(NodeKind::While { cond, body }, tok))
    }

    /// Each of init, cond, and inc may be absent. The init and inc slots are
    /// expression statements (their values are discarded); cond is a bare
    /// expression terminated by `;`, inc by the closing `)`.
    fn for_stmt(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = self.advance();
        self.consume(TokenKind::LParen)?;

        let init = if self.match_token(TokenKind::Semicolon) {
            None
        } else {
            let node = self.read_expr_stmt()?;
            self.consume(TokenKind::Semicolon)?;
            Some(node)
        };
        let cond = if self.match_token(TokenKind::Semicolon) {
            None
        } else {
            let node = self.expr()?;
            self.consume(TokenKind::Semicolon)?;
            Some(node)
        };
        let inc = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.read_expr_stmt()?)
        };
        self.consume(TokenKind::RParen)?;

        let body = self.stmt()?;
        Ok(self.ctx.node(
            NodeKind::For {
                init,
                cond,
                inc,
                body,
            },
            tok,
        ))
    }

    fn block(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = self.advance();
        let marker = self.env.enter_scope();

        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.at_eof() {
                self.consume(TokenKind::RBrace)?;
            }
            body.push(self.stmt()?);
        }
        self.advance();
        self.env.leave_scope(marker);

        Ok(self.ctx.node(
            NodeKind::Block {
                body: self.ctx.node_list(body),
            },
            tok,
        ))
    }

    fn read_expr_stmt(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = *self.peek();
        let expr = self.expr()?;
        Ok(self.ctx.node(NodeKind::ExprStmt { expr }, tok))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self) -> ParseResult<&'a Node<'a>> {
        self.assign()
    }

    /// Assignment is right-associative; the diagnostic token of an `Assign`
    /// node is the `=` itself.
    fn assign(&mut self) -> ParseResult<&'a Node<'a>> {
        let node = self.equality()?;
        if self.match_token(TokenKind::Assign) {
            let tok = *self.previous();
            let rhs = self.assign()?;
            return Ok(self.ctx.node(NodeKind::Assign { lhs: node, rhs }, tok));
        }
        Ok(node)
    }

    fn equality(&mut self) -> ParseResult<&'a Node<'a>> {
        let mut node = self.relational()?;
        loop {
            if self.match_token(TokenKind::EqEq) {
                let tok = *self.previous();
                let rhs = self.relational()?;
                node = self.ctx.node(NodeKind::Eq { lhs: node, rhs }, tok);
            } else if self.match_token(TokenKind::NotEq) {
                let tok = *self.previous();
                let rhs = self.relational()?;
                node = self.ctx.node(NodeKind::Ne { lhs: node, rhs }, tok);
            } else {
                return Ok(node);
            }
        }
    }

    fn relational(&mut self) -> ParseResult<&'a Node<'a>> {
        let mut node = self.add()?;
        loop {
            if self.match_token(TokenKind::Lt) {
                let tok = *self.previous();
                let rhs = self.add()?;
                node = self.ctx.node(NodeKind::Lt { lhs: node, rhs }, tok);
            } else if self.match_token(TokenKind::LtEq) {
                let tok = *self.previous();
                let rhs = self.add()?;
                node = self.ctx.node(NodeKind::Le { lhs: node, rhs }, tok);
            } else if self.match_token(TokenKind::Gt) {
                let tok = *self.previous();
                let rhs = self.add()?;
                node = self.ctx.node(NodeKind::Lt { lhs: rhs, rhs: node }, tok);
            } else if self.match_token(TokenKind::GtEq) {
                let tok = *self.previous();
                let rhs = self.add()?;
                node = self.ctx.node(NodeKind::Le { lhs: rhs, rhs: node }, tok);
            } else {
                return Ok(node);
            }
        }
    }

    fn add(&mut self) -> ParseResult<&'a Node<'a>> {
        let mut node = self.mul()?;
        loop {
            if self.match_token(TokenKind::Plus) {
                let tok = *self.previous();
                let rhs = self.mul()?;
                node = new_add(self.ctx, node, rhs, tok)?;
            } else if self.match_token(TokenKind::Minus) {
                let tok = *self.previous();
                let rhs = self.mul()?;
                node = new_sub(self.ctx, node, rhs, tok)?;
            } else {
                return Ok(node);
            }
        }
    }

    fn mul(&mut self) -> ParseResult<&'a Node<'a>> {
        let mut node = self.unary()?;
        loop {
            if self.match_token(TokenKind::Star) {
                let tok = *self.previous();
                let rhs = self.unary()?;
                node = self.ctx.node(NodeKind::Mul { lhs: node, rhs }, tok);
            } else if self.match_token(TokenKind::Slash) {
                let tok = *self.previous();
                let rhs = self.unary()?;
                node = self.ctx.node(NodeKind::Div { lhs: node, rhs }, tok);
            } else {
                return Ok(node);
            }
        }
    }

    fn unary(&mut self) -> ParseResult<&'a Node<'a>> {
        if self.match_token(TokenKind::Plus) {
            return self.unary();
        }
        if self.match_token(TokenKind::Minus) {
            let tok = *self.previous();
            let operand = self.unary()?;
            return new_sub(self.ctx, self.ctx.num(0, tok), operand, tok);
        }
        if self.match_token(TokenKind::Star) {
            let tok = *self.previous();
            let operand = self.unary()?;
            return Ok(self.ctx.node(NodeKind::Deref { operand }, tok));
        }
        if self.match_token(TokenKind::Amp) {
            let tok = *self.previous();
            let operand = self.unary()?;
            return Ok(self.ctx.node(NodeKind::Addr { operand }, tok));
        }
        self.postfix()
    }

    /// Postfix chains: indexing and member access.
    ///
    /// `x[y]` is sugar for `*(x+y)`, so the pointer/integer classification
    /// of [`new_add`] handles `ptr[int]` and `int[ptr]` alike.
    fn postfix(&mut self) -> ParseResult<&'a Node<'a>> {
        let mut node = self.primary()?;
        loop {
            if self.match_token(TokenKind::LBracket) {
                let tok = *self.previous();
                let index = self.expr()?;
                self.consume(TokenKind::RBracket)?;
                let sum = new_add(self.ctx, node, index, tok)?;
                node = self.ctx.node(NodeKind::Deref { operand: sum }, tok);
            } else if self.match_token(TokenKind::Dot) {
                node = self.struct_ref(node)?;
            } else {
                return Ok(node);
            }
        }
    }

    /// Member access `base.name`. The base subtree is typed here, because
    /// member lookup needs its struct type before parsing can continue.
    fn struct_ref(&mut self, base: &'a Node<'a>) -> ParseResult<&'a Node<'a>> {
        let ty = add_type(self.ctx, base)?;
        if !matches!(ty.kind, TypeKind::Struct { .. }) {
            return Err(CompileError::new(
                CompileErrorKind::NotAStruct,
                base.tok.span,
            ));
        }

        let (name, tok) = self.expect_ident()?;
        let member = ty.find_member(name).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::NoSuchMember {
                    name: self.interner.resolve(name).to_string(),
                },
                tok.span,
            )
        })?;
        Ok(self.ctx.node(NodeKind::Member { base, member }, tok))
    }

    fn primary(&mut self) -> ParseResult<&'a Node<'a>> {
        let tok = *self.peek();

        if self.match_token(TokenKind::LParen) {
            if self.check(TokenKind::LBrace) {
                return self.stmt_expr(tok);
            }
            let node = self.expr()?;
            self.consume(TokenKind::RParen)?;
            return Ok(node);
        }

        if self.match_token(TokenKind::Sizeof) {
            // The operand is parsed and typed, then discarded; only its
            // byte size survives as a number literal.
            let operand = self.unary()?;
            let ty = add_type(self.ctx, operand)?;
            return Ok(self.ctx.num(ty.size() as i64, tok));
        }

        match tok.kind {
            TokenKind::Ident(name) => {
                self.advance();
                if self.match_token(TokenKind::LParen) {
                    return self.funcall(name, tok);
                }
                let var = self.env.lookup(name).ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::UndefinedVariable {
                            name: self.interner.resolve(name).to_string(),
                        },
                        tok.span,
                    )
                })?;
                Ok(self.ctx.var_node(var, tok))
            }
            TokenKind::Str(contents) => {
                self.advance();
                let var = self.env.declare_string(self.ctx, self.interner, contents);
                Ok(self.ctx.var_node(var, tok))
            }
            TokenKind::Num(value) => {
                self.advance();
                Ok(self.ctx.num(value, tok))
            }
            found => Err(CompileError::new(
                CompileErrorKind::ExpectedExpression { found },
                tok.span,
            )),
        }
    }

    /// GNU statement expression `({ stmt stmt* })`. The last statement must
    /// be an expression statement; its inner expression is spliced into the
    /// body so the enclosing expression sees a value.
    fn stmt_expr(&mut self, tok: Token) -> ParseResult<&'a Node<'a>> {
        self.consume(TokenKind::LBrace)?;
        let marker = self.env.enter_scope();

        let mut body = vec![self.stmt()?];
        while !self.check(TokenKind::RBrace) {
            if self.at_eof() {
                self.consume(TokenKind::RBrace)?;
            }
            body.push(self.stmt()?);
        }
        self.advance();
        self.consume(TokenKind::RParen)?;
        self.env.leave_scope(marker);

        let last = body[body.len() - 1];
        match last.kind {
            NodeKind::ExprStmt { expr } => {
                let n = body.len();
                body[n - 1] = expr;
            }
            _ => {
                return Err(CompileError::new(
                    CompileErrorKind::StmtExprVoid,
                    last.tok.span,
                ))
            }
        }

        Ok(self.ctx.node(
            NodeKind::StmtExpr {
                body: self.ctx.node_list(body),
            },
            tok,
        ))
    }

    fn funcall(&mut self, name: Symbol, tok: Token) -> ParseResult<&'a Node<'a>> {
        let mut args = Vec::new();
        if !self.match_token(TokenKind::RParen) {
            loop {
                args.push(self.assign()?);
                if args.len() > MAX_ARGS {
                    return Err(CompileError::new(
                        CompileErrorKind::TooManyArguments,
                        tok.span,
                    ));
                }
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RParen)?;
        }
        Ok(self.ctx.node(
            NodeKind::FunCall {
                name,
                args: self.ctx.node_list(args),
            },
            tok,
        ))
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(&kind)
    }

    fn advance(&mut self) -> Token {
        if !self.at_eof() {
            self.current += 1;
        }
        *self.previous()
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn consume(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(CompileError::new(
            CompileErrorKind::UnexpectedToken {
                expected: kind,
                found: self.peek().kind,
            },
            self.current_span(),
        ))
    }

    fn consume_ident(&mut self) -> Option<Token> {
        if matches!(self.peek().kind, TokenKind::Ident(_)) {
            return Some(self.advance());
        }
        None
    }

    fn expect_ident(&mut self) -> ParseResult<(Symbol, Token)> {
        let tok = *self.peek();
        if let TokenKind::Ident(name) = tok.kind {
            self.advance();
            return Ok((name, tok));
        }
        Err(CompileError::new(
            CompileErrorKind::ExpectedIdentifier { found: tok.kind },
            tok.span,
        ))
    }

    fn expect_number(&mut self) -> ParseResult<i64> {
        let tok = *self.peek();
        if let TokenKind::Num(value) = tok.kind {
            self.advance();
            return Ok(value);
        }
        Err(CompileError::new(
            CompileErrorKind::ExpectedNumber { found: tok.kind },
            tok.span,
        ))
    }

    fn checkpoint(&self) -> ParserCheckpoint {
        ParserCheckpoint { pos: self.current }
    }

    fn restore(&mut self, cp: ParserCheckpoint) {
        self.current = cp.pos;
    }
}
