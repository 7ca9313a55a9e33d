//! Call expressions and callable dispatch

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{Arg, ExprCall, Keyword};
use crate::value::{CallArgs, ExceptionValue, Value};

use super::function::call_procedure;
use super::Evaluate;

impl Evaluate for ExprCall {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let func = self.func.eval(interp)?;
        if !func.is_callable() {
            return Err(EvalError::NotCallable {
                type_name: type_name(&func).to_string(),
            });
        }
        let args = eval_args(self, interp)?;
        call_value(interp, &func, args)
    }
}

/// Evaluate arguments left to right, expanding `*seq` and `**mapping`.
fn eval_args(call: &ExprCall, interp: &mut Interpreter) -> Result<CallArgs, EvalError> {
    let mut positional = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        match arg {
            Arg::Positional(expr) => positional.push(expr.eval(interp)?),
            Arg::Starred(expr) => positional.extend(expr.eval(interp)?.to_items()?),
        }
    }

    let mut keywords = IndexMap::new();
    let mut add = |name: String, value: Value| {
        if keywords.contains_key(&name) {
            return Err(EvalError::type_error(format!(
                "got multiple values for keyword argument '{}'",
                name
            )));
        }
        keywords.insert(name, value);
        Ok(())
    };
    for keyword in &call.keywords {
        match keyword {
            Keyword::Named { name, value } => add(name.clone(), value.eval(interp)?)?,
            Keyword::DoubleStarred(expr) => {
                for (name, value) in keyword_pairs(expr.eval(interp)?)? {
                    add(name, value)?;
                }
            }
        }
    }
    Ok(CallArgs {
        positional,
        keywords,
    })
}

fn keyword_pairs(mapping: Value) -> Result<Vec<(String, Value)>, EvalError> {
    match mapping {
        Value::Dict(entries) => entries
            .borrow()
            .iter()
            .map(|(k, v)| match k.value().as_str() {
                Some(name) => Ok((name.to_string(), v.clone())),
                None => Err(EvalError::type_error("keywords must be strings")),
            })
            .collect(),
        Value::Group(group) => Ok(group.members()),
        other => Err(EvalError::type_error(format!(
            "argument after ** must be a mapping, not {}",
            type_name(&other)
        ))),
    }
}

/// Call any callable value.
pub fn call_value(
    interp: &mut Interpreter,
    func: &Value,
    args: CallArgs,
) -> Result<Value, EvalError> {
    match func {
        Value::Builtin(builtin) => {
            if builtin.arity >= 0 {
                let expected = builtin.arity as usize;
                if args.positional.len() != expected {
                    return Err(EvalError::Arity {
                        name: builtin.name.clone(),
                        qualifier: "exactly",
                        expected,
                        got: args.positional.len(),
                    });
                }
                if let Some(keyword) = args.keywords.keys().next() {
                    return Err(EvalError::UnexpectedKeyword {
                        name: builtin.name.clone(),
                        keyword: keyword.clone(),
                    });
                }
            }
            let f = Rc::clone(&builtin.func);
            f(interp, args)
        }
        Value::Procedure(proc) => call_procedure(interp, proc, args),
        Value::ExceptionType(kind) => {
            if let Some(keyword) = args.keywords.keys().next() {
                return Err(EvalError::UnexpectedKeyword {
                    name: kind.to_string(),
                    keyword: keyword.clone(),
                });
            }
            let message = match args.positional.as_slice() {
                [] => String::new(),
                [one] => one.to_string(),
                many => Value::tuple(many.to_vec()).repr(),
            };
            Ok(Value::Exception(Rc::new(ExceptionValue::new(
                kind.as_ref(),
                message,
            ))))
        }
        other => Err(EvalError::NotCallable {
            type_name: type_name(other).to_string(),
        }),
    }
}
