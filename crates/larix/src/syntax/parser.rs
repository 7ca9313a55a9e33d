//! Recursive-descent parser over the token stream.
//!
//! Grammar follows the usual layered precedence: `test` (conditional
//! expressions) over `or`/`and`/`not`, comparisons, the binary operator
//! levels, unary operators, `**`, then atoms with call, subscript and
//! attribute trailers. Constructs outside the supported subset are
//! rejected here with an unsupported-node error rather than reaching
//! the evaluator.

use std::rc::Rc;

use super::ast::*;
use super::lexer::{tokenize, Tok, Token};
use crate::error::SyntaxError;
use crate::stack::with_stack_room;

type PResult<T> = Result<T, SyntaxError>;

/// Binary operator levels, loosest first.
const BINARY_LEVELS: &[&[&str]] = &[
    &["|"],
    &["^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "//", "%", "@"],
];

/// Deepest bracket, operator or block nesting accepted.
pub const MAX_NESTING: usize = 200;

/// Tallest operator or trailer chain accepted.
pub const MAX_CHAIN_HEIGHT: usize = 1000;

/// Parse a sequence of statements.
pub fn parse_module(text: &str) -> PResult<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(text)?);
    parser.parse_file()
}

/// Parse a single expression (a bare tuple is allowed).
pub fn parse_expr(text: &str) -> PResult<Expr> {
    let mut parser = Parser::new(tokenize(text.trim())?);
    let expr = parser.parse_testlist()?;
    parser.eat_tok(&Tok::Newline);
    if parser.peek() != &Tok::Eof {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    loop_depth: usize,
    in_def: bool,
    nesting: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
            in_def: false,
            nesting: 0,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Token helpers
    // ═══════════════════════════════════════════════════════════════════

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).map(|t| &t.tok).unwrap_or(&Tok::Eof)
    }

    fn peek_at(&self, n: usize) -> &Tok {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.peek() {
            Tok::Op(op) => Some(op),
            _ => None,
        }
    }

    fn peek_kw(&self) -> Option<&'static str> {
        match self.peek() {
            Tok::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    fn loc(&self) -> Loc {
        self.tokens
            .get(self.pos)
            .map(|t| Loc::new(t.line, t.col))
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token {
            tok: Tok::Eof,
            line: 0,
            col: 0,
        });
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn is_op(&self, op: &str) -> bool {
        self.peek_op() == Some(op)
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.peek_kw() == Some(kw)
    }

    fn eat_tok(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", op)))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> PResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", kw)))
        }
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.peek().clone() {
            Tok::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Op(";"))
    }

    /// Can the current token begin an expression?
    fn starts_expr(&self) -> bool {
        match self.peek() {
            Tok::Name(_) | Tok::Int(_) | Tok::Float(_) | Tok::Str(_) => true,
            Tok::Keyword(kw) => matches!(*kw, "not" | "None" | "True" | "False" | "lambda"),
            Tok::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~"),
            _ => false,
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let loc = self.loc();
        SyntaxError::new(message).at(loc.line, loc.col)
    }

    fn error_at(loc: Loc, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message).at(loc.line, loc.col)
    }

    /// Run `parse` one nesting level down.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error("too many nested levels"));
        }
        self.nesting += 1;
        let result = with_stack_room(|| parse(self));
        self.nesting -= 1;
        result
    }

    fn check_height(loc: Loc, height: usize) -> PResult<()> {
        if height > MAX_CHAIN_HEIGHT {
            return Err(Self::error_at(loc, "expression too deeply nested"));
        }
        Ok(())
    }

    fn unsupported(&self, what: &str) -> SyntaxError {
        let loc = self.loc();
        SyntaxError::unsupported(what).at(loc.line, loc.col)
    }

    fn unexpected(&self) -> SyntaxError {
        match self.tokens.get(self.pos) {
            Some(token) => unexpected_token(token),
            None => self.error("unexpected end of input"),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    fn parse_file(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Newline => {
                    self.advance();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> PResult<Vec<Stmt>> {
        if self.peek() == &Tok::Indent {
            return Err(self.error("unexpected indent"));
        }
        match (self.peek_kw(), self.peek_op()) {
            (Some("if"), _) => Ok(vec![self.parse_if()?]),
            (Some("while"), _) => Ok(vec![self.parse_while()?]),
            (Some("for"), _) => Ok(vec![self.parse_for()?]),
            (Some("try"), _) => Ok(vec![self.parse_try()?]),
            (Some("def"), _) => Ok(vec![self.parse_def()?]),
            (Some("class"), _) => Err(self.unsupported("class definition")),
            (Some("with"), _) => Err(self.unsupported("'with' statement")),
            (Some("async"), _) => Err(self.unsupported("async code")),
            (_, Some("@")) => Err(self.unsupported("decorator")),
            _ => self.parse_simple_statements(),
        }
    }

    fn parse_simple_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat_op(";") {
            if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        if !self.eat_tok(&Tok::Newline) && self.peek() != &Tok::Eof {
            return Err(self.unexpected());
        }
        Ok(stmts)
    }

    fn parse_small_statement(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        match self.peek_kw() {
            Some("pass") => {
                self.advance();
                Ok(Stmt::Pass(loc))
            }
            Some("break") => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(Self::error_at(loc, "'break' outside loop"));
                }
                Ok(Stmt::Break(loc))
            }
            Some("continue") => {
                self.advance();
                if self.loop_depth == 0 {
                    return Err(Self::error_at(loc, "'continue' not properly in loop"));
                }
                Ok(Stmt::Continue(loc))
            }
            Some("return") => {
                self.advance();
                if !self.in_def {
                    return Err(Self::error_at(loc, "'return' outside function"));
                }
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_testlist()?)
                };
                Ok(Stmt::Return(StmtReturn { value, loc }))
            }
            Some("del") => {
                self.advance();
                let target = self.parse_exprlist()?;
                let targets = match self.into_target(target, ExprContext::Del)? {
                    Expr::Tuple(t) => t.elts,
                    single => vec![single],
                };
                Ok(Stmt::Delete(StmtDelete { targets, loc }))
            }
            Some("raise") => {
                self.advance();
                let exc = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_test()?)
                };
                let cause = if exc.is_some() && self.eat_kw("from") {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(Stmt::Raise(StmtRaise { exc, cause, loc }))
            }
            Some("assert") => {
                self.advance();
                let test = self.parse_test()?;
                let msg = if self.eat_op(",") {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(Stmt::Assert(StmtAssert { test, msg, loc }))
            }
            Some("import") => self.parse_import(),
            Some("from") => self.parse_import_from(),
            Some("global") => Err(self.unsupported("'global' statement")),
            Some("nonlocal") => Err(self.unsupported("'nonlocal' statement")),
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_expr_statement(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        let first = self.parse_testlist()?;

        if let Some(op) = self
            .peek_op()
            .and_then(|o| o.strip_suffix('='))
            .and_then(BinOp::from_symbol)
        {
            self.advance();
            let target = match first {
                Expr::Name(_) | Expr::Attribute(_) | Expr::Subscript(_) => {
                    self.into_target(first, ExprContext::Store)?
                }
                _ => {
                    return Err(Self::error_at(
                        loc,
                        "illegal expression for augmented assignment",
                    ))
                }
            };
            let value = self.parse_testlist()?;
            return Ok(Stmt::AugAssign(StmtAugAssign {
                target,
                op,
                value,
                loc,
            }));
        }

        if self.is_op("=") {
            let mut exprs = vec![first];
            while self.eat_op("=") {
                if self.is_kw("yield") {
                    return Err(self.unsupported("'yield' expression"));
                }
                exprs.push(self.parse_testlist()?);
            }
            let value = exprs.pop().ok_or_else(|| self.unexpected())?;
            let targets = exprs
                .into_iter()
                .map(|e| self.into_target(e, ExprContext::Store))
                .collect::<PResult<Vec<_>>>()?;
            return Ok(Stmt::Assign(StmtAssign {
                targets,
                value,
                loc,
            }));
        }

        match self.peek_op() {
            Some(":") => Err(self.unsupported("variable annotation")),
            Some(":=") => Err(self.unsupported("assignment expression")),
            _ => Ok(Stmt::Expr(StmtExpr { value: first, loc })),
        }
    }

    /// Re-tag an expression as an assignment or deletion target.
    fn into_target(&self, expr: Expr, ctx: ExprContext) -> PResult<Expr> {
        match expr {
            Expr::Name(mut n) => {
                n.ctx = ctx;
                Ok(Expr::Name(n))
            }
            Expr::Attribute(mut a) => {
                a.ctx = ctx;
                Ok(Expr::Attribute(a))
            }
            Expr::Subscript(mut s) => {
                s.ctx = ctx;
                Ok(Expr::Subscript(s))
            }
            Expr::Tuple(t) => Ok(Expr::Tuple(ExprTuple {
                elts: t
                    .elts
                    .into_iter()
                    .map(|e| self.into_target(e, ctx))
                    .collect::<PResult<_>>()?,
                ctx,
                loc: t.loc,
            })),
            Expr::List(l) => Ok(Expr::List(ExprList {
                elts: l
                    .elts
                    .into_iter()
                    .map(|e| self.into_target(e, ctx))
                    .collect::<PResult<_>>()?,
                ctx,
                loc: l.loc,
            })),
            other => {
                let verb = if ctx == ExprContext::Del {
                    "delete"
                } else {
                    "assign to"
                };
                let what = match other {
                    Expr::Constant(_) => "literal",
                    Expr::Call(_) => "function call",
                    _ => "expression",
                };
                Err(Self::error_at(other.loc(), format!("cannot {} {}", verb, what)))
            }
        }
    }

    fn parse_suite(&mut self) -> PResult<Vec<Stmt>> {
        if !self.eat_tok(&Tok::Newline) {
            return self.parse_simple_statements();
        }
        if !self.eat_tok(&Tok::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.nested(|p| {
            let mut body = Vec::new();
            while !p.eat_tok(&Tok::Dedent) {
                if p.peek() == &Tok::Eof {
                    return Err(p.error("unexpected end of input"));
                }
                body.extend(p.parse_statement()?);
            }
            Ok(body)
        })
    }

    fn parse_loop_body(&mut self) -> PResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_suite();
        self.loop_depth -= 1;
        body
    }

    fn parse_else(&mut self) -> PResult<Vec<Stmt>> {
        if self.eat_kw("else") {
            self.expect_op(":")?;
            self.parse_suite()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        // `if` or `elif`
        self.advance();
        let test = self.parse_test()?;
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = if self.is_kw("elif") {
            vec![self.nested(Self::parse_if)?]
        } else {
            self.parse_else()?
        };
        Ok(Stmt::If(StmtIf {
            test,
            body,
            orelse,
            loc,
        }))
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance();
        let test = self.parse_test()?;
        self.expect_op(":")?;
        let body = self.parse_loop_body()?;
        let orelse = self.parse_else()?;
        Ok(Stmt::While(StmtWhile {
            test,
            body,
            orelse,
            loc,
        }))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance();
        let target = self.parse_exprlist()?;
        let target = self.into_target(target, ExprContext::Store)?;
        self.expect_kw("in")?;
        let iter = self.parse_testlist()?;
        self.expect_op(":")?;
        let body = self.parse_loop_body()?;
        let orelse = self.parse_else()?;
        Ok(Stmt::For(StmtFor {
            target,
            iter,
            body,
            orelse,
            loc,
        }))
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance();
        self.expect_op(":")?;
        let body = self.parse_suite()?;

        let mut handlers = Vec::new();
        while self.is_kw("except") {
            let handler_loc = self.loc();
            self.advance();
            let typ = if self.is_op(":") {
                None
            } else {
                Some(self.parse_test()?)
            };
            let name = if typ.is_some() && self.eat_kw("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            self.expect_op(":")?;
            handlers.push(ExceptHandler {
                typ,
                name,
                body: self.parse_suite()?,
                loc: handler_loc,
            });
        }

        let orelse = if handlers.is_empty() {
            Vec::new()
        } else {
            self.parse_else()?
        };
        let finalbody = if self.eat_kw("finally") {
            self.expect_op(":")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error("expected 'except' or 'finally' block"));
        }

        Ok(Stmt::Try(StmtTry {
            body,
            handlers,
            orelse,
            finalbody,
            loc,
        }))
    }

    fn parse_def(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance();
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.parse_params()?;
        self.expect_op(")")?;
        if self.is_op("->") {
            return Err(self.unsupported("return annotation"));
        }
        self.expect_op(":")?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let saved_def = std::mem::replace(&mut self.in_def, true);
        let body = self.parse_suite();
        self.loop_depth = saved_loops;
        self.in_def = saved_def;
        let body = body?;

        let doc = match body.first() {
            Some(Stmt::Expr(StmtExpr {
                value:
                    Expr::Constant(ExprConstant {
                        value: Constant::Str(s),
                        ..
                    }),
                ..
            })) => Some(s.to_string()),
            _ => None,
        };

        Ok(Stmt::FunctionDef(Rc::new(FunctionDef {
            name,
            params,
            body,
            doc,
            loc,
        })))
    }

    fn parse_params(&mut self) -> PResult<Params> {
        let mut params = Params::default();
        while !self.is_op(")") {
            let loc = self.loc();
            let name = if self.eat_op("**") {
                let name = self.expect_name()?;
                params.kwarg = Some(name.clone());
                name
            } else if self.eat_op("*") {
                if self.is_op(",") || self.is_op(")") {
                    return Err(self.unsupported("keyword-only parameters"));
                }
                let name = self.expect_name()?;
                if params.kwarg.is_some() {
                    return Err(Self::error_at(loc, "invalid syntax"));
                }
                params.vararg = Some(name.clone());
                name
            } else {
                let name = self.expect_name()?;
                if params.vararg.is_some() || params.kwarg.is_some() {
                    return Err(Self::error_at(loc, "keyword-only parameters are not supported"));
                }
                if self.eat_op("=") {
                    let default = self.parse_test()?;
                    params.defaults.push((name.clone(), default));
                } else if !params.defaults.is_empty() {
                    return Err(Self::error_at(
                        loc,
                        "non-default argument follows default argument",
                    ));
                } else {
                    params.args.push(name.clone());
                }
                name
            };
            if self.is_op(":") {
                return Err(self.unsupported("parameter annotation"));
            }
            if params.names().filter(|n| *n == name).count() > 1 {
                return Err(Self::error_at(
                    loc,
                    format!("duplicate argument '{}' in function definition", name),
                ));
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_name()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn parse_alias(&mut self, dotted: bool) -> PResult<Alias> {
        let name = if dotted {
            self.parse_dotted_name()?
        } else {
            self.expect_name()?
        };
        let asname = if self.eat_kw("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance();
        let mut names = vec![self.parse_alias(true)?];
        while self.eat_op(",") {
            names.push(self.parse_alias(true)?);
        }
        Ok(Stmt::Import(StmtImport { names, loc }))
    }

    fn parse_import_from(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance();
        if self.is_op(".") {
            return Err(self.unsupported("relative import"));
        }
        let module = self.parse_dotted_name()?;
        self.expect_kw("import")?;

        if self.eat_op("*") {
            return Ok(Stmt::ImportFrom(StmtImportFrom {
                module,
                names: vec![Alias {
                    name: "*".to_string(),
                    asname: None,
                }],
                loc,
            }));
        }

        let parenthesized = self.eat_op("(");
        let mut names = vec![self.parse_alias(false)?];
        while self.eat_op(",") {
            if parenthesized && self.is_op(")") {
                break;
            }
            names.push(self.parse_alias(false)?);
        }
        if parenthesized {
            self.expect_op(")")?;
        }
        Ok(Stmt::ImportFrom(StmtImportFrom { module, names, loc }))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    /// `test (',' test)* [',']`; more than one item makes a tuple.
    fn parse_testlist(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        let first = self.parse_test()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            elts.push(self.parse_test()?);
        }
        Ok(Expr::Tuple(ExprTuple {
            elts,
            ctx: ExprContext::Load,
            loc,
        }))
    }

    /// Like `parse_testlist`, but items stop below comparisons, so `in`
    /// is left for the enclosing `for`.
    fn parse_exprlist(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        let first = self.parse_binary(0)?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            elts.push(self.parse_binary(0)?);
        }
        Ok(Expr::Tuple(ExprTuple {
            elts,
            ctx: ExprContext::Load,
            loc,
        }))
    }

    fn parse_test(&mut self) -> PResult<Expr> {
        self.nested(Self::parse_test_inner)
    }

    fn parse_test_inner(&mut self) -> PResult<Expr> {
        match self.peek_kw() {
            Some("lambda") => return Err(self.unsupported("lambda expression")),
            Some("yield") => return Err(self.unsupported("'yield' expression")),
            _ => {}
        }
        let body = self.parse_or_test()?;
        if !self.eat_kw("if") {
            return Ok(body);
        }
        let test = self.parse_or_test()?;
        self.expect_kw("else")?;
        let orelse = self.parse_test()?;
        Ok(Expr::IfExp(ExprIfExp {
            loc: body.loc(),
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }))
    }

    fn parse_or_test(&mut self) -> PResult<Expr> {
        self.parse_bool_chain(BoolOp::Or, "or", Self::parse_and_test)
    }

    fn parse_and_test(&mut self) -> PResult<Expr> {
        self.parse_bool_chain(BoolOp::And, "and", Self::parse_not_test)
    }

    fn parse_bool_chain(
        &mut self,
        op: BoolOp,
        keyword: &str,
        next: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let first = next(self)?;
        if !self.is_kw(keyword) {
            return Ok(first);
        }
        let loc = first.loc();
        let mut values = vec![first];
        while self.eat_kw(keyword) {
            values.push(next(self)?);
        }
        Ok(Expr::BoolOp(ExprBoolOp { op, values, loc }))
    }

    fn parse_not_test(&mut self) -> PResult<Expr> {
        if !self.is_kw("not") {
            return self.parse_comparison();
        }
        let loc = self.loc();
        self.advance();
        let operand = self.nested(Self::parse_not_test)?;
        Ok(Expr::UnaryOp(ExprUnaryOp {
            op: UnaryOp::Not,
            operand: Box::new(operand),
            loc,
        }))
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let left = self.parse_binary(0)?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match (self.peek_op(), self.peek_kw()) {
                (Some("<"), _) => CmpOp::Lt,
                (Some(">"), _) => CmpOp::Gt,
                (Some("=="), _) => CmpOp::Eq,
                (Some(">="), _) => CmpOp::GtE,
                (Some("<="), _) => CmpOp::LtE,
                (Some("!="), _) => CmpOp::NotEq,
                (_, Some("in")) => CmpOp::In,
                (_, Some("not")) if self.peek_at(1) == &Tok::Keyword("in") => {
                    self.advance();
                    CmpOp::NotIn
                }
                (_, Some("is")) => {
                    if self.peek_at(1) == &Tok::Keyword("not") {
                        self.advance();
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                _ => break,
            };
            self.advance();
            ops.push(op);
            comparators.push(self.parse_binary(0)?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare(ExprCompare {
            loc: left.loc(),
            left: Box::new(left),
            ops,
            comparators,
        }))
    }

    fn parse_binary(&mut self, level: usize) -> PResult<Expr> {
        let Some(symbols) = BINARY_LEVELS.get(level) else {
            return self.parse_factor();
        };
        let mut left = self.parse_binary(level + 1)?;
        // The fold builds a left-deep tree without recursing, so its
        // height is tracked here and measured only once per operand
        let mut height = None;
        while let Some(symbol) = self.peek_op().filter(|o| symbols.contains(o)) {
            if symbol == "@" {
                return Err(self.unsupported("matrix multiplication"));
            }
            let op = BinOp::from_symbol(symbol).ok_or_else(|| self.unexpected())?;
            self.advance();
            let right = self.parse_binary(level + 1)?;
            let loc = left.loc();
            let grown = height.unwrap_or_else(|| left.height()).max(right.height()) + 1;
            Self::check_height(loc, grown)?;
            height = Some(grown);
            left = Expr::BinOp(ExprBinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
                loc,
            });
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let op = match self.peek_op() {
            Some("-") => UnaryOp::Neg,
            Some("+") => UnaryOp::Pos,
            Some("~") => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let loc = self.loc();
        self.advance();
        let operand = self.nested(Self::parse_factor)?;
        Ok(Expr::UnaryOp(ExprUnaryOp {
            op,
            operand: Box::new(operand),
            loc,
        }))
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        if self.is_kw("await") {
            return Err(self.unsupported("'await' expression"));
        }
        let base = self.parse_atom_expr()?;
        if !self.eat_op("**") {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        Ok(Expr::BinOp(ExprBinOp {
            loc: base.loc(),
            left: Box::new(base),
            op: BinOp::Pow,
            right: Box::new(exponent),
        }))
    }

    fn parse_atom_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        let mut height = None;
        loop {
            let loc = expr.loc();
            let below = height.unwrap_or_else(|| expr.height());
            if self.eat_op("(") {
                let (args, keywords) = self.parse_arglist()?;
                self.expect_op(")")?;
                let call = ExprCall {
                    func: Box::new(expr),
                    args,
                    keywords,
                    loc,
                };
                let grown = below.max(call.args_height()) + 1;
                Self::check_height(loc, grown)?;
                height = Some(grown);
                expr = Expr::Call(call);
            } else if self.eat_op("[") {
                let index = self.parse_subscript()?;
                self.expect_op("]")?;
                let grown = below.max(index.height()) + 1;
                Self::check_height(loc, grown)?;
                height = Some(grown);
                expr = Expr::Subscript(ExprSubscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                    ctx: ExprContext::Load,
                    loc,
                });
            } else if self.eat_op(".") {
                let attr = self.expect_name()?;
                Self::check_height(loc, below + 1)?;
                height = Some(below + 1);
                expr = Expr::Attribute(ExprAttribute {
                    value: Box::new(expr),
                    attr,
                    ctx: ExprContext::Load,
                    loc,
                });
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_arglist(&mut self) -> PResult<(Vec<Arg>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while !self.is_op(")") {
            let loc = self.loc();
            if self.eat_op("*") {
                args.push(Arg::Starred(self.parse_test()?));
            } else if self.eat_op("**") {
                keywords.push(Keyword::DoubleStarred(self.parse_test()?));
            } else if matches!(self.peek(), Tok::Name(_)) && self.peek_at(1) == &Tok::Op("=") {
                let name = self.expect_name()?;
                self.advance();
                let repeated = keywords
                    .iter()
                    .any(|k| matches!(k, Keyword::Named { name: n, .. } if *n == name));
                if repeated {
                    return Err(Self::error_at(
                        loc,
                        format!("keyword argument repeated: {}", name),
                    ));
                }
                let value = self.parse_test()?;
                keywords.push(Keyword::Named { name, value });
            } else {
                let value = self.parse_test()?;
                if self.is_kw("for") {
                    return Err(self.unsupported("generator expression"));
                }
                if !keywords.is_empty() {
                    return Err(Self::error_at(
                        loc,
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(Arg::Positional(value));
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_subscript(&mut self) -> PResult<Index> {
        let loc = self.loc();
        let first = self.parse_slice_item()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut elts = vec![self.index_to_expr(first)?];
        while self.eat_op(",") {
            if self.is_op("]") {
                break;
            }
            let item = self.parse_slice_item()?;
            elts.push(self.index_to_expr(item)?);
        }
        Ok(Index::Single(Expr::Tuple(ExprTuple {
            elts,
            ctx: ExprContext::Load,
            loc,
        })))
    }

    fn index_to_expr(&self, index: Index) -> PResult<Expr> {
        match index {
            Index::Single(expr) => Ok(expr),
            Index::Slice { .. } => Err(self.unsupported("multi-dimensional slicing")),
        }
    }

    fn parse_slice_item(&mut self) -> PResult<Index> {
        let ends_part = |p: &Self| p.is_op(":") || p.is_op("]") || p.is_op(",");
        let lower = if self.is_op(":") {
            None
        } else {
            Some(self.parse_test()?)
        };
        if !self.eat_op(":") {
            return lower.map(Index::Single).ok_or_else(|| self.unexpected());
        }
        let upper = if ends_part(self) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.eat_op(":") && !ends_part(self) {
            Some(self.parse_test()?)
        } else {
            None
        };
        Ok(Index::Slice { lower, upper, step })
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let token = self.advance();
        let loc = Loc::new(token.line, token.col);
        let constant =
            |value: Constant| -> PResult<Expr> { Ok(Expr::Constant(ExprConstant { value, loc })) };
        match token.tok {
            Tok::Name(id) => {
                if let Tok::Str(_) = self.peek() {
                    let adjacent = self.loc() == Loc::new(loc.line, loc.col + id.len());
                    if adjacent && matches!(id.to_ascii_lowercase().as_str(), "f" | "rf" | "fr") {
                        return Err(SyntaxError::unsupported("f-string").at(loc.line, loc.col));
                    }
                }
                Ok(Expr::Name(ExprName {
                    id,
                    ctx: ExprContext::Load,
                    loc,
                }))
            }
            Tok::Int(n) => constant(Constant::Int(n)),
            Tok::Float(f) => constant(Constant::Float(f)),
            Tok::Str(mut s) => {
                while let Tok::Str(next) = self.peek().clone() {
                    s.push_str(&next);
                    self.advance();
                }
                constant(Constant::Str(Rc::from(s)))
            }
            Tok::Keyword("None") => constant(Constant::None),
            Tok::Keyword("True") => constant(Constant::Bool(true)),
            Tok::Keyword("False") => constant(Constant::Bool(false)),
            Tok::Keyword("lambda") => {
                Err(SyntaxError::unsupported("lambda expression").at(loc.line, loc.col))
            }
            Tok::Keyword("yield") => {
                Err(SyntaxError::unsupported("'yield' expression").at(loc.line, loc.col))
            }
            Tok::Op("(") => self.parse_paren(loc),
            Tok::Op("[") => self.parse_list_display(loc),
            Tok::Op("{") => self.parse_dict_display(loc),
            Tok::Op("*") => {
                Err(SyntaxError::unsupported("starred expression").at(loc.line, loc.col))
            }
            _ => Err(unexpected_token(&token)),
        }
    }

    fn parse_paren(&mut self, loc: Loc) -> PResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(ExprTuple {
                elts: Vec::new(),
                ctx: ExprContext::Load,
                loc,
            }));
        }
        let first = self.parse_test()?;
        if self.is_kw("for") {
            return Err(self.unsupported("generator expression"));
        }
        if self.eat_op(")") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.is_op(")") {
                break;
            }
            elts.push(self.parse_test()?);
        }
        self.expect_op(")")?;
        Ok(Expr::Tuple(ExprTuple {
            elts,
            ctx: ExprContext::Load,
            loc,
        }))
    }

    fn parse_list_display(&mut self, loc: Loc) -> PResult<Expr> {
        let mut elts = Vec::new();
        if self.eat_op("]") {
            return Ok(Expr::List(ExprList {
                elts,
                ctx: ExprContext::Load,
                loc,
            }));
        }
        let first = self.parse_test()?;
        if self.is_kw("for") {
            let generators = self.parse_comprehension()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp(ExprListComp {
                elt: Box::new(first),
                generators,
                loc,
            }));
        }
        elts.push(first);
        while self.eat_op(",") {
            if self.is_op("]") {
                break;
            }
            elts.push(self.parse_test()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List(ExprList {
            elts,
            ctx: ExprContext::Load,
            loc,
        }))
    }

    fn parse_dict_display(&mut self, loc: Loc) -> PResult<Expr> {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        if self.eat_op("}") {
            return Ok(Expr::Dict(ExprDict { keys, values, loc }));
        }
        if self.is_op("**") {
            return Err(self.unsupported("dictionary unpacking"));
        }
        let key = self.parse_test()?;
        if !self.eat_op(":") {
            if self.is_op(",") || self.is_op("}") || self.is_kw("for") {
                return Err(self.unsupported("set display"));
            }
            return Err(self.unexpected());
        }
        let value = self.parse_test()?;
        if self.is_kw("for") {
            let generators = self.parse_comprehension()?;
            self.expect_op("}")?;
            return Ok(Expr::DictComp(ExprDictComp {
                key: Box::new(key),
                value: Box::new(value),
                generators,
                loc,
            }));
        }
        keys.push(key);
        values.push(value);
        while self.eat_op(",") {
            if self.is_op("}") {
                break;
            }
            if self.is_op("**") {
                return Err(self.unsupported("dictionary unpacking"));
            }
            keys.push(self.parse_test()?);
            self.expect_op(":")?;
            values.push(self.parse_test()?);
        }
        self.expect_op("}")?;
        Ok(Expr::Dict(ExprDict { keys, values, loc }))
    }

    fn parse_comprehension(&mut self) -> PResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.eat_kw("for") {
            let target = self.parse_exprlist()?;
            let target = self.into_target(target, ExprContext::Store)?;
            self.expect_kw("in")?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.eat_kw("if") {
                ifs.push(self.parse_or_test()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        if self.is_kw("async") {
            return Err(self.unsupported("async comprehension"));
        }
        Ok(generators)
    }
}

fn unexpected_token(token: &Token) -> SyntaxError {
    let message = match &token.tok {
        Tok::Indent => "unexpected indent".to_string(),
        Tok::Dedent => "unindent does not match any outer indentation level".to_string(),
        Tok::Eof => "unexpected end of input".to_string(),
        Tok::Newline => "invalid syntax".to_string(),
        Tok::Name(name) => format!("invalid syntax near '{}'", name),
        Tok::Keyword(kw) | Tok::Op(kw) => format!("invalid syntax near '{}'", kw),
        Tok::Int(n) => format!("invalid syntax near '{}'", n),
        Tok::Float(f) => format!("invalid syntax near '{}'", f),
        Tok::Str(_) => "invalid syntax near string literal".to_string(),
    };
    SyntaxError::new(message).at(token.line, token.col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn parse_one(text: &str) -> Stmt {
        let mut stmts = parse_module(text).unwrap();
        assert_eq!(stmts.len(), 1, "{:?}", stmts);
        stmts.remove(0)
    }

    #[test]
    fn test_precedence() {
        let Stmt::Expr(StmtExpr { value, .. }) = parse_one("1 + 2 * 3 ** 2") else {
            panic!("expected expression statement");
        };
        let Expr::BinOp(add) = value else {
            panic!("expected binop");
        };
        assert_eq!(add.op, BinOp::Add);
        let Expr::BinOp(mul) = *add.right else {
            panic!("expected binop");
        };
        assert_eq!(mul.op, BinOp::Mult);
        assert!(matches!(*mul.right, Expr::BinOp(ExprBinOp { op: BinOp::Pow, .. })));
    }

    #[test]
    fn test_chained_assignment_targets() {
        let Stmt::Assign(assign) = parse_one("a = b.c = d[0] = 1") else {
            panic!("expected assignment");
        };
        assert_eq!(assign.targets.len(), 3);
        assert!(matches!(&assign.targets[1], Expr::Attribute(a) if a.ctx == ExprContext::Store));
        assert!(matches!(&assign.targets[2], Expr::Subscript(s) if s.ctx == ExprContext::Store));
    }

    #[test]
    fn test_def_with_all_parameter_kinds() {
        let Stmt::FunctionDef(def) = parse_one("def f(a, b=2, *rest, **kw):\n    'doc'\n    return a\n")
        else {
            panic!("expected def");
        };
        assert_eq!(def.params.args, vec!["a".to_string()]);
        assert_eq!(def.params.defaults.len(), 1);
        assert_eq!(def.params.vararg.as_deref(), Some("rest"));
        assert_eq!(def.params.kwarg.as_deref(), Some("kw"));
        assert_eq!(def.doc.as_deref(), Some("doc"));
    }

    #[test]
    fn test_elif_chain_nests() {
        let Stmt::If(stmt) = parse_one("if a:\n    x\nelif b:\n    y\nelse:\n    z\n") else {
            panic!("expected if");
        };
        assert!(matches!(&stmt.orelse[..], [Stmt::If(inner)] if inner.orelse.len() == 1));
    }

    #[test]
    fn test_comprehension_and_slices() {
        assert!(parse_module("[x * 2 for x in y if x]").is_ok());
        assert!(parse_module("{k: v for k, v in items}").is_ok());
        assert!(parse_module("a[1:]\na[::2]\na[:-1]\na[1, 2]").is_ok());
    }

    #[test]
    fn test_not_in_and_is_not() {
        let Stmt::Expr(StmtExpr {
            value: Expr::Compare(cmp),
            ..
        }) = parse_one("a not in b is not c")
        else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.ops, vec![CmpOp::NotIn, CmpOp::IsNot]);
    }

    #[test]
    fn test_unsupported_constructs() {
        for text in [
            "class A:\n    pass\n",
            "f = lambda x: x",
            "with open(p) as f:\n    pass\n",
            "global x",
            "s = {1, 2}",
            "g = (x for x in y)",
            "y = f'{x}'",
        ] {
            let err = parse_module(text).unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnsupportedNode, "{}", text);
        }
    }

    #[test]
    fn test_misplaced_control_flow() {
        assert_eq!(parse_module("break").unwrap_err().message, "'break' outside loop");
        assert_eq!(
            parse_module("return 1").unwrap_err().message,
            "'return' outside function"
        );
        assert!(parse_module("while x:\n    def f():\n        break\n").is_err());
        assert!(parse_module("def f():\n    while x:\n        break\n    return 1\n").is_ok());
    }

    #[test]
    fn test_error_location() {
        let err = parse_module("x = 1\ny = (2 +\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.line >= 2);
    }

    #[test]
    fn test_bad_targets() {
        assert_eq!(parse_module("1 = x").unwrap_err().message, "cannot assign to literal");
        assert_eq!(parse_module("f() += 1").unwrap_err().message,
            "illegal expression for augmented assignment");
        assert!(parse_module("non_default(a=1, b)").is_err());
        assert!(parse_module("def f(a=1, b):\n    pass\n").is_err());
    }

    #[test]
    fn test_parse_expression_only() {
        assert!(matches!(parse_expr("  x + 1 "), Ok(Expr::BinOp(_))));
        assert!(matches!(parse_expr("a, b"), Ok(Expr::Tuple(_))));
        assert!(parse_expr("x = 1").is_err());
        assert!(parse_expr("x +").is_err());
    }

    #[test]
    fn test_long_chain_is_rejected() {
        let err = parse_module(&format!("x = 1{}", " + 1".repeat(20_000))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.message, "expression too deeply nested");

        let err = parse_expr(&format!("a{}", ".b".repeat(5_000))).unwrap_err();
        assert_eq!(err.message, "expression too deeply nested");
    }

    #[test]
    fn test_chain_within_limit_parses() {
        let terms = MAX_CHAIN_HEIGHT - 1;
        let expr = parse_expr(&format!("1{}", " + 1".repeat(terms))).unwrap();
        assert_eq!(expr.height(), MAX_CHAIN_HEIGHT);
        assert!(parse_expr(&format!("f{}", "(1)".repeat(100))).is_ok());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 10_000;
        let parens = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_expr(&parens).unwrap_err().message, "too many nested levels");
        let negations = format!("{}1", "-".repeat(depth));
        assert_eq!(parse_expr(&negations).unwrap_err().message, "too many nested levels");
        let nots = format!("{}x", "not ".repeat(depth));
        assert!(parse_expr(&nots).is_err());

        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse_expr(&shallow).is_ok());
    }

    #[test]
    fn test_nested_chains_stay_bounded() {
        // Chains in brackets count towards the chain they sit in
        let mut text = "1".to_string();
        for _ in 0..3 {
            text = format!("({}{})", text, " + 1".repeat(400));
        }
        let err = parse_expr(&text).unwrap_err();
        assert_eq!(err.message, "expression too deeply nested");

        let two = format!("((1{0}){0})", " + 1".repeat(400));
        assert_eq!(parse_expr(&two).unwrap().height(), 801);
    }
}
