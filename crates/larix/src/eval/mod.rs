//! Expression evaluation and statement execution
//!
//! Every node kind has exactly one handler. Expressions implement
//! [`Evaluate`] and propagate failures with `?`; the dispatcher records a
//! failure once, at the innermost node that raised it, and passes
//! [`EvalError::Reported`] upward. Statements implement [`Execute`] and
//! turn failures into [`Flow::Error`].

pub mod assign;
pub mod binary;
pub mod call;
pub mod control;
pub mod exception;
pub mod function;
pub mod import;
pub mod index;
pub mod literal;
pub mod loops;
pub mod methods;
pub mod path;
pub mod stmt;
pub mod unary;

pub use control::Flow;

use tracing::{debug, trace};

use crate::error::EvalError;
use crate::interpreter::Interpreter;
use crate::stack::with_stack_room;
use crate::syntax::{Expr, Stmt};
use crate::value::Value;

/// Trait for evaluating expression nodes to values.
pub trait Evaluate {
    /// Evaluate this node in the interpreter's current frame.
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError>;
}

/// Trait for executing statement nodes.
pub trait Execute {
    /// Execute this node in the interpreter's current frame.
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Main Expression Dispatcher
// ═══════════════════════════════════════════════════════════════════════

impl Evaluate for Expr {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        with_stack_room(|| {
            let result = match self {
                Expr::Constant(expr) => expr.eval(interp),
                Expr::Name(expr) => expr.eval(interp),
                Expr::Attribute(expr) => expr.eval(interp),
                Expr::Subscript(expr) => expr.eval(interp),
                Expr::List(expr) => expr.eval(interp),
                Expr::Tuple(expr) => expr.eval(interp),
                Expr::Dict(expr) => expr.eval(interp),
                Expr::ListComp(expr) => expr.eval(interp),
                Expr::DictComp(expr) => expr.eval(interp),
                Expr::BinOp(expr) => expr.eval(interp),
                Expr::UnaryOp(expr) => expr.eval(interp),
                Expr::BoolOp(expr) => expr.eval(interp),
                Expr::Compare(expr) => expr.eval(interp),
                Expr::IfExp(expr) => expr.eval(interp),
                Expr::Call(expr) => expr.eval(interp),
            };
            result.map_err(|err| interp.record(err, self.kind_name(), self.loc()))
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Main Statement Dispatcher
// ═══════════════════════════════════════════════════════════════════════

impl Execute for Stmt {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        match self {
            Stmt::Expr(stmt) => stmt.exec(interp),
            Stmt::Assign(stmt) => stmt.exec(interp),
            Stmt::AugAssign(stmt) => stmt.exec(interp),
            Stmt::FunctionDef(def) => function::define(def, interp),
            Stmt::If(stmt) => stmt.exec(interp),
            Stmt::For(stmt) => stmt.exec(interp),
            Stmt::While(stmt) => stmt.exec(interp),
            Stmt::Try(stmt) => stmt.exec(interp),
            Stmt::Raise(stmt) => stmt.exec(interp),
            Stmt::Import(stmt) => stmt.exec(interp),
            Stmt::ImportFrom(stmt) => stmt.exec(interp),
            Stmt::Assert(stmt) => stmt.exec(interp),
            Stmt::Delete(stmt) => stmt.exec(interp),
            Stmt::Return(stmt) => stmt.exec(interp),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Pass(_) => Ok(Flow::Normal),
        }
    }
}

/// Execute one statement, recording any failure.
pub fn exec_stmt(stmt: &Stmt, interp: &mut Interpreter) -> Flow {
    let loc = stmt.loc();
    if interp.ctx.trace {
        debug!(node = stmt.kind_name(), line = interp.source.line(loc.line), "exec");
    } else {
        trace!(node = stmt.kind_name(), line = interp.source.line(loc.line), "exec");
    }
    with_stack_room(|| match stmt.exec(interp) {
        Ok(flow) => flow,
        Err(err) => {
            interp.record(err, stmt.kind_name(), loc);
            Flow::Error
        }
    })
}

/// Execute statements in order until one does not finish normally.
pub fn exec_block(body: &[Stmt], interp: &mut Interpreter) -> Flow {
    for stmt in body {
        let flow = exec_stmt(stmt, interp);
        if !flow.is_normal() {
            return flow;
        }
    }
    Flow::Normal
}
