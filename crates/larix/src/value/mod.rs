//! Value representation for runtime values

mod callable;
mod display;
mod format;
mod hashable;
mod impls;

pub use callable::{BuiltinFn, BuiltinFnPtr, CallArgs, DefinedVariable, Procedure};
pub use format::percent_format;
pub use hashable::HashableValue;
pub use impls::MAX_COMPARE_DEPTH;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::symtable::GroupRef;

/// Shared, mutable list storage.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable, insertion-ordered mapping storage.
pub type DictRef = Rc<RefCell<IndexMap<HashableValue, Value>>>;

/// Shared, mutable numeric array storage.
pub type ArrayRef = Rc<RefCell<Vec<f64>>>;

/// Runtime value representation for the larix interpreter.
///
/// Scalars are stored inline; containers are reference counted so that
/// two names bound to the same list observe each other's mutations.
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Scalars
    // ═══════════════════════════════════════════════════════════════════
    /// `None`
    None,

    /// `True` / `False`
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Immutable string
    Str(Rc<str>),

    // ═══════════════════════════════════════════════════════════════════
    // Containers
    // ═══════════════════════════════════════════════════════════════════
    /// Mutable list
    List(ListRef),

    /// Immutable tuple
    Tuple(Rc<Vec<Value>>),

    /// Insertion-ordered dictionary with hashable keys
    Dict(DictRef),

    /// Homogeneous numeric array with elementwise arithmetic
    Array(ArrayRef),

    /// Namespace group
    Group(GroupRef),

    // ═══════════════════════════════════════════════════════════════════
    // Callables and lazy bindings
    // ═══════════════════════════════════════════════════════════════════
    /// User-defined procedure
    Procedure(Rc<Procedure>),

    /// Binding that re-evaluates its expression on every read
    DefinedVariable(Rc<DefinedVariable>),

    /// Native function
    Builtin(BuiltinFn),

    /// Exception class, e.g. `ValueError`
    ExceptionType(Rc<str>),

    /// Exception instance
    Exception(Rc<ExceptionValue>),
}

/// A raised (or constructed) exception.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionValue {
    /// Exception-class name
    pub kind: String,
    /// Message text
    pub message: String,
}

impl ExceptionValue {
    /// Create an exception value.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
