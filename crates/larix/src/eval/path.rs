//! Name and attribute resolution
//!
//! Bare names resolve through the symbol table's search order. Attributes
//! of groups are group members; attributes of other values are the
//! builtin methods from [`super::methods`].

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{ExprAttribute, ExprName};
use crate::value::Value;

use super::methods::bound_method;
use super::Evaluate;

impl Evaluate for ExprName {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let value = interp.symtable.lookup(&self.id, false)?;
        interp.read_binding(value)
    }
}

impl Evaluate for ExprAttribute {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let owner = self.value.eval(interp)?;
        match get_attribute(&owner, &self.attr) {
            Some(value) => interp.read_binding(value),
            None => Err(EvalError::NoMember {
                member: self.attr.clone(),
                owner: owner_label(&owner, self.value.dotted_name()),
            }),
        }
    }
}

/// Attribute `name` of `owner`, if it has one.
pub fn get_attribute(owner: &Value, name: &str) -> Option<Value> {
    match owner {
        Value::Group(group) => group.get(name),
        Value::Exception(exc) => match name {
            "message" => Some(Value::str(&exc.message)),
            "args" => Some(Value::tuple(vec![Value::str(&exc.message)])),
            "kind" => Some(Value::str(&exc.kind)),
            _ => None,
        },
        Value::Procedure(proc) => match name {
            "__name__" => Some(Value::str(&proc.name)),
            "__doc__" => Some(proc.doc().map(Value::str).unwrap_or(Value::None)),
            _ => None,
        },
        other => bound_method(other, name),
    }
}

fn owner_label(owner: &Value, path: Option<String>) -> String {
    match (owner, path) {
        (Value::Group(_), Some(path)) => format!("'{}'", path),
        (Value::Group(group), None) => format!("'{}'", group.name()),
        (other, _) => format!("'{}' object", type_name(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtable::GroupRef;
    use crate::value::ExceptionValue;
    use std::rc::Rc;

    #[test]
    fn test_group_member() {
        let g = GroupRef::new("g");
        g.set("x", Value::Int(1));
        assert_eq!(get_attribute(&Value::Group(g.clone()), "x"), Some(Value::Int(1)));
        assert_eq!(get_attribute(&Value::Group(g), "y"), None);
    }

    #[test]
    fn test_exception_attributes() {
        let exc = Value::Exception(Rc::new(ExceptionValue::new("ValueError", "bad")));
        assert_eq!(get_attribute(&exc, "message"), Some(Value::str("bad")));
        assert_eq!(get_attribute(&exc, "kind"), Some(Value::str("ValueError")));
    }

    #[test]
    fn test_owner_label() {
        let g = Value::Group(GroupRef::new("g"));
        assert_eq!(owner_label(&g, Some("a.b".into())), "'a.b'");
        assert_eq!(owner_label(&Value::Int(1), None), "'int' object");
    }
}
