//! Assignment, augmented assignment and deletion

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{Expr, ExprAttribute, StmtAssign, StmtAugAssign, StmtDelete};
use crate::value::Value;

use super::binary::{binary_op, extend_in_place};
use super::index::{self, eval_key};
use super::{Evaluate, Execute, Flow};

impl Execute for StmtAssign {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        let value = self.value.eval(interp)?;
        for target in &self.targets {
            assign(target, value.clone(), interp)?;
        }
        Ok(Flow::Normal)
    }
}

/// Bind `value` to an assignment target.
///
/// List and tuple targets destructure element by element.
pub fn assign(target: &Expr, value: Value, interp: &mut Interpreter) -> Result<(), EvalError> {
    match target {
        Expr::Name(name) => {
            interp.symtable.set_symbol(&name.id, value)?;
            Ok(())
        }
        Expr::Attribute(attr) => assign_attribute(attr, value, interp),
        Expr::Subscript(sub) => {
            let container = sub.value.eval(interp)?;
            let key = eval_key(&sub.index, interp)?;
            index::store(&container, &key, value)
        }
        Expr::List(list) => destructure(&list.elts, value, interp),
        Expr::Tuple(tuple) => destructure(&tuple.elts, value, interp),
        other => Err(EvalError::Unsupported {
            what: format!("assignment to {}", other.kind_name()),
        }),
    }
}

fn destructure(targets: &[Expr], value: Value, interp: &mut Interpreter) -> Result<(), EvalError> {
    let items = value.to_items().map_err(|_| {
        EvalError::type_error(format!(
            "cannot unpack non-iterable {} object",
            type_name(&value)
        ))
    })?;
    if items.len() != targets.len() {
        return Err(EvalError::Unpack {
            expected: targets.len(),
            got: items.len(),
        });
    }
    for (target, item) in targets.iter().zip(items) {
        assign(target, item, interp)?;
    }
    Ok(())
}

// A dotted target whose parent path is missing creates the intermediate
// groups relative to the local group.
fn assign_attribute(
    attr: &ExprAttribute,
    value: Value,
    interp: &mut Interpreter,
) -> Result<(), EvalError> {
    let parent = match attr.value.dotted_name() {
        Some(path) => match interp.symtable.lookup(&path, false) {
            Ok(parent) => parent,
            Err(EvalError::NameNotFound { .. } | EvalError::NoMember { .. }) => {
                let full = format!("{}.{}", path, attr.attr);
                interp.symtable.set_symbol(&full, value)?;
                return Ok(());
            }
            Err(err) => return Err(err),
        },
        None => attr.value.eval(interp)?,
    };
    match parent {
        Value::Group(group) => {
            let value = interp.symtable.normalize(value);
            group.set(&attr.attr, value);
            Ok(())
        }
        other => Err(EvalError::type_error(format!(
            "cannot set attribute '{}' on '{}' object",
            attr.attr,
            type_name(&other)
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Augmented assignment
// ═══════════════════════════════════════════════════════════════════════

impl Execute for StmtAugAssign {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        match &self.target {
            Expr::Subscript(sub) => {
                // Container and key are evaluated once
                let container = sub.value.eval(interp)?;
                let key = eval_key(&sub.index, interp)?;
                let current = index::load(&container, &key)?;
                let operand = self.value.eval(interp)?;
                let updated = combine(self, &current, &operand)?;
                index::store(&container, &key, updated)?;
            }
            target => {
                let current = target.eval(interp)?;
                let operand = self.value.eval(interp)?;
                let updated = combine(self, &current, &operand)?;
                assign(target, updated, interp)?;
            }
        }
        Ok(Flow::Normal)
    }
}

fn combine(stmt: &StmtAugAssign, current: &Value, operand: &Value) -> Result<Value, EvalError> {
    if stmt.op == crate::syntax::BinOp::Add {
        if let Some(extended) = extend_in_place(current, operand)? {
            return Ok(extended);
        }
    }
    binary_op(stmt.op, current, operand)
}

// ═══════════════════════════════════════════════════════════════════════
// Deletion
// ═══════════════════════════════════════════════════════════════════════

impl Execute for StmtDelete {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        for target in &self.targets {
            delete(target, interp)?;
        }
        Ok(Flow::Normal)
    }
}

fn delete(target: &Expr, interp: &mut Interpreter) -> Result<(), EvalError> {
    match target {
        Expr::Name(name) => interp.symtable.delete(&name.id).map(|_| ()),
        Expr::Attribute(attr) => match target.dotted_name() {
            Some(path) => interp.symtable.delete(&path).map(|_| ()),
            None => match attr.value.eval(interp)? {
                Value::Group(group) => group.delete(&attr.attr).map(|_| ()).ok_or_else(|| {
                    EvalError::NoMember {
                        member: attr.attr.clone(),
                        owner: format!("'{}'", group.name()),
                    }
                }),
                other => Err(EvalError::type_error(format!(
                    "cannot delete attribute '{}' of '{}' object",
                    attr.attr,
                    type_name(&other)
                ))),
            },
        },
        Expr::Subscript(sub) => {
            let container = sub.value.eval(interp)?;
            let key = eval_key(&sub.index, interp)?;
            index::delete(&container, &key)
        }
        Expr::List(list) => list.elts.iter().try_for_each(|e| delete(e, interp)),
        Expr::Tuple(tuple) => tuple.elts.iter().try_for_each(|e| delete(e, interp)),
        other => Err(EvalError::Unsupported {
            what: format!("deletion of {}", other.kind_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use crate::{Interpreter, Value};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_destructuring() {
        let mut interp = Interpreter::new();
        interp.eval("a, (b, c) = 1, [2, 3]").unwrap();
        assert_eq!(interp.get_symbol("c").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_unpack_mismatch() {
        let mut interp = Interpreter::new();
        let errs = interp.eval("a, b = 1, 2, 3").unwrap_err();
        assert_eq!(errs.first().unwrap().message, "too many values to unpack (expected 2)");
    }

    #[test]
    fn test_dotted_assignment_creates_groups() {
        let mut interp = Interpreter::new();
        interp.eval("scan.motor.pos = 1.5").unwrap();
        assert_eq!(interp.get_symbol("scan.motor.pos").unwrap(), Value::Float(1.5));
        interp.eval("scan.motor.speed = 2").unwrap();
        assert_eq!(interp.eval("isgroup(scan.motor)").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_augmented_list_extends_in_place() {
        let mut interp = Interpreter::new();
        interp.eval("a = [1]\nb = a\na += [2]").unwrap();
        assert_eq!(interp.eval("len(b)").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_augmented_subscript() {
        let mut interp = Interpreter::new();
        interp.eval("d = {'n': 1}\nd['n'] *= 5").unwrap();
        assert_eq!(interp.eval("d['n']").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_delete_forms() {
        let mut interp = Interpreter::new();
        interp.eval("x = 1\ng.y = 2\nl = [1, 2, 3]\ndel x, g.y, l[0]").unwrap();
        assert!(interp.eval("x").is_err());
        assert_eq!(interp.eval("hasattr(g, 'y')").unwrap(), Value::Bool(false));
        assert_eq!(interp.eval("l").unwrap(), Value::list(vec![Value::Int(2), Value::Int(3)]));
    }
}
