//! Callable value types: procedures, defined variables, and builtins

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Value;
use crate::error::EvalError;
use crate::interpreter::Interpreter;
use crate::symtable::{GroupRef, WeakGroup};
use crate::syntax::{self, Expr, FunctionDef, Source};

/// Type alias for builtin function pointers to reduce complexity
pub type BuiltinFnPtr = Rc<dyn Fn(&mut Interpreter, CallArgs) -> Result<Value, EvalError>>;

/// Evaluated call arguments.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    /// Positional arguments, in order
    pub positional: Vec<Value>,
    /// Keyword arguments, in the order given
    pub keywords: IndexMap<String, Value>,
}

impl CallArgs {
    /// Positional-only arguments.
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: IndexMap::new(),
        }
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    /// True when no arguments were given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Positional argument `i`, or keyword `name`.
    pub fn get(&self, i: usize, name: &str) -> Option<&Value> {
        self.positional.get(i).or_else(|| self.keywords.get(name))
    }

    /// Remove and return a keyword argument.
    pub fn take_keyword(&mut self, name: &str) -> Option<Value> {
        self.keywords.shift_remove(name)
    }
}

/// A built-in native function.
///
/// These are Rust functions exposed to the interpreter. They receive the
/// interpreter so that they can call back into script code.
#[derive(Clone)]
pub struct BuiltinFn {
    /// Function name (for display/debugging)
    pub name: String,

    /// Positional arity (-1 for variadic or keyword-accepting)
    pub arity: i32,

    /// The actual function pointer
    pub func: BuiltinFnPtr,
}

impl BuiltinFn {
    /// Wrap a closure as a builtin.
    pub fn new(
        name: impl Into<String>,
        arity: i32,
        func: impl Fn(&mut Interpreter, CallArgs) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Rc::new(func),
        }
    }
}

impl std::fmt::Debug for BuiltinFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinFn({})", self.name)
    }
}

/// A user-defined procedure.
///
/// Holds the definition's syntax tree, its default values (evaluated once,
/// when the `def` statement ran) and the module group it was defined in.
/// The module is held strongly: a procedure keeps its module alive.
#[derive(Debug)]
pub struct Procedure {
    /// Procedure name
    pub name: String,
    /// Defining module group
    pub module: GroupRef,
    /// Parsed definition
    pub def: Rc<FunctionDef>,
    /// Default values for the optional parameters, in declaration order
    pub defaults: Vec<(String, Value)>,
    /// Source the definition came from
    pub source: Rc<Source>,
}

impl Procedure {
    /// Docstring, if the body starts with one.
    pub fn doc(&self) -> Option<&str> {
        self.def.doc.as_deref()
    }

    /// Required positional parameter names.
    pub fn required(&self) -> &[String] {
        &self.def.params.args
    }

    /// Printable signature, e.g. `f(a, b=1, *args, **kws)`.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = self.def.params.args.clone();
        for (name, value) in &self.defaults {
            parts.push(format!("{}={}", name, value.repr()));
        }
        if let Some(var) = &self.def.params.vararg {
            parts.push(format!("*{}", var));
        }
        if let Some(kw) = &self.def.params.kwarg {
            parts.push(format!("**{}", kw));
        }
        format!("{}({})", self.name, parts.join(", "))
    }
}

/// A binding whose value is recomputed from an expression on every read.
///
/// The local and module groups active at declaration are held weakly: a
/// defined variable never keeps a finished procedure scope alive, and
/// reading one whose scope is gone fails instead of resolving names
/// somewhere unexpected.
#[derive(Debug)]
pub struct DefinedVariable {
    /// Variable name
    pub name: String,
    expr: RefCell<String>,
    compiled: RefCell<Result<Rc<Expr>, String>>,
    local: WeakGroup,
    module: WeakGroup,
}

impl DefinedVariable {
    /// Declare `name = expr` against the given scope, compiling `expr` now.
    pub fn new(name: impl Into<String>, expr: &str, local: &GroupRef, module: &GroupRef) -> Self {
        Self {
            name: name.into(),
            expr: RefCell::new(expr.to_string()),
            compiled: RefCell::new(compile(expr)),
            local: local.downgrade(),
            module: module.downgrade(),
        }
    }

    /// The expression text.
    pub fn expression(&self) -> String {
        self.expr.borrow().clone()
    }

    /// Replace the expression and recompile it.
    pub fn set_expression(&self, expr: &str) {
        *self.expr.borrow_mut() = expr.to_string();
        *self.compiled.borrow_mut() = compile(expr);
    }

    /// Was this declared against exactly these groups?
    pub fn captures(&self, local: &GroupRef, module: &GroupRef) -> bool {
        match (self.local.upgrade(), self.module.upgrade()) {
            (Some(l), Some(m)) => l.ptr_eq(local) && m.ptr_eq(module),
            _ => false,
        }
    }

    /// The compiled tree, or a `CannotCompile` error.
    pub fn compiled(&self) -> Result<Rc<Expr>, EvalError> {
        match &*self.compiled.borrow() {
            Ok(tree) => Ok(tree.clone()),
            Err(message) => Err(EvalError::CannotCompile {
                expr: self.expression(),
                message: message.clone(),
            }),
        }
    }

    /// The captured (local, module) groups, if both still exist.
    pub fn scope(&self) -> Result<(GroupRef, GroupRef), EvalError> {
        match (self.local.upgrade(), self.module.upgrade()) {
            (Some(local), Some(module)) => Ok((local, module)),
            _ => Err(EvalError::StaleScope {
                name: self.name.clone(),
            }),
        }
    }
}

fn compile(expr: &str) -> Result<Rc<Expr>, String> {
    syntax::parse_expression(expr)
        .map(Rc::new)
        .map_err(|e| e.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtable::Group;

    #[test]
    fn test_defined_variable_compile_error() {
        let g = Group::new("_main").into_ref();
        let dv = DefinedVariable::new("y", "x +", &g, &g);
        assert!(matches!(dv.compiled(), Err(EvalError::CannotCompile { .. })));

        dv.set_expression("x + 1");
        assert!(dv.compiled().is_ok());
        assert_eq!(dv.expression(), "x + 1");
        assert!(dv.captures(&g, &g));
        assert!(!dv.captures(&g, &Group::new("other").into_ref()));
    }

    #[test]
    fn test_defined_variable_stale_scope() {
        let module = Group::new("_main").into_ref();
        let dv = {
            let local = Group::new("f").into_ref();
            DefinedVariable::new("y", "1", &local, &module)
        };
        assert!(matches!(dv.scope(), Err(EvalError::StaleScope { .. })));
    }

    #[test]
    fn test_call_args_get() {
        let mut args = CallArgs::new(vec![Value::Int(1)]);
        args.keywords.insert("b".to_string(), Value::Int(2));
        assert!(matches!(args.get(0, "a"), Some(Value::Int(1))));
        assert!(matches!(args.get(1, "b"), Some(Value::Int(2))));
        assert_eq!(args.len(), 2);
        assert!(args.take_keyword("b").is_some());
        assert!(args.get(1, "b").is_none());
    }
}
