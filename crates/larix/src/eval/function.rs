//! Procedure definition and invocation
//!
//! A `def` statement builds a [`Procedure`] that captures the current
//! module group and evaluates its defaults once. A call binds arguments
//! into a fresh local group and runs the body under a [`FrameGuard`], so
//! the frame stack is balanced however the body finishes.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::EvalError;
use crate::interpreter::{CallGuard, Interpreter};
use crate::symtable::{FrameGuard, GroupRef};
use crate::syntax::FunctionDef;
use crate::value::{CallArgs, HashableValue, Procedure, Value};

use super::{exec_block, Evaluate, Flow};

/// Execute a `def` statement.
pub fn define(def: &Rc<FunctionDef>, interp: &mut Interpreter) -> Result<Flow, EvalError> {
    let mut defaults = Vec::with_capacity(def.params.defaults.len());
    for (name, expr) in &def.params.defaults {
        defaults.push((name.clone(), expr.eval(interp)?));
    }
    let procedure = Procedure {
        name: def.name.clone(),
        module: interp.symtable.module_group().clone(),
        def: Rc::clone(def),
        defaults,
        source: Rc::clone(&interp.source),
    };
    interp
        .symtable
        .set_symbol(&def.name, Value::Procedure(Rc::new(procedure)))?;
    Ok(Flow::Normal)
}

/// Invoke a procedure.
pub fn call_procedure(
    interp: &mut Interpreter,
    procedure: &Rc<Procedure>,
    args: CallArgs,
) -> Result<Value, EvalError> {
    let local = bind_arguments(procedure, args)?;
    let flow = {
        let mut call = CallGuard::with_source(interp, Rc::clone(&procedure.source))?;
        debug!(procedure = %procedure.name, depth = call.call_depth, "call");
        let mut guard = FrameGuard::enter(&mut *call, local, procedure.module.clone());
        exec_block(&procedure.def.body, &mut guard)
    };

    match flow {
        Flow::Return(value) => Ok(value),
        Flow::Error => Err(EvalError::Reported),
        Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::None),
    }
}

/// Bind call arguments to parameters in a new local group.
fn bind_arguments(procedure: &Procedure, args: CallArgs) -> Result<GroupRef, EvalError> {
    let params = &procedure.def.params;
    let name = &procedure.name;
    let local = GroupRef::new(name.as_str());
    let given = args.positional.len();
    let mut positional = args.positional.into_iter();
    let mut keywords = args.keywords;

    let take = |param: &str,
                positional: &mut std::vec::IntoIter<Value>,
                keywords: &mut IndexMap<String, Value>|
     -> Result<Option<Value>, EvalError> {
        match positional.next() {
            Some(value) => {
                if keywords.contains_key(param) {
                    return Err(EvalError::MultipleValues {
                        name: name.clone(),
                        keyword: param.to_string(),
                    });
                }
                Ok(Some(value))
            }
            None => Ok(keywords.shift_remove(param)),
        }
    };

    for param in &params.args {
        match take(param, &mut positional, &mut keywords)? {
            Some(value) => local.set(param, value),
            None => {
                let flexible = !procedure.defaults.is_empty() || params.vararg.is_some();
                return Err(EvalError::Arity {
                    name: name.clone(),
                    qualifier: if flexible { "at least" } else { "exactly" },
                    expected: params.args.len(),
                    got: given,
                });
            }
        }
    }

    for (param, default) in &procedure.defaults {
        let value = take(param, &mut positional, &mut keywords)?.unwrap_or_else(|| default.clone());
        local.set(param, value);
    }

    let extra: Vec<Value> = positional.collect();
    match &params.vararg {
        Some(vararg) => local.set(vararg, Value::tuple(extra)),
        None if !extra.is_empty() => {
            let optional = procedure.defaults.len();
            return Err(EvalError::Arity {
                name: name.clone(),
                qualifier: if optional == 0 { "exactly" } else { "at most" },
                expected: params.args.len() + optional,
                got: given,
            });
        }
        None => {}
    }

    match &params.kwarg {
        Some(kwarg) => {
            let mut entries = IndexMap::with_capacity(keywords.len());
            for (key, value) in keywords {
                entries.insert(HashableValue::new(Value::str(key))?, value);
            }
            local.set(kwarg, Value::dict(entries));
        }
        None => {
            if let Some(keyword) = keywords.keys().next() {
                return Err(EvalError::UnexpectedKeyword {
                    name: name.clone(),
                    keyword: keyword.clone(),
                });
            }
        }
    }
    Ok(local)
}
