//! Loop evaluation: while, for, and comprehensions

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::interpreter::Interpreter;
use crate::syntax::{Comprehension, ExprDictComp, ExprListComp, StmtFor, StmtWhile};
use crate::value::{HashableValue, Value};

use super::assign::assign;
use super::{exec_block, Evaluate, Execute, Flow};

impl Execute for StmtWhile {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        while self.test.eval(interp)?.is_truthy() {
            match exec_block(&self.body, interp) {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
        Ok(exec_block(&self.orelse, interp))
    }
}

impl Execute for StmtFor {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        // The sequence is snapshotted before the first iteration
        let items = self.iter.eval(interp)?.to_items()?;
        for item in items {
            assign(&self.target, item, interp)?;
            match exec_block(&self.body, interp) {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
        Ok(exec_block(&self.orelse, interp))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Comprehensions
// ═══════════════════════════════════════════════════════════════════════

impl Evaluate for ExprListComp {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let mut out = Vec::new();
        run_generators(&self.generators, interp, &mut |interp| {
            out.push(self.elt.eval(interp)?);
            Ok(())
        })?;
        Ok(Value::list(out))
    }
}

impl Evaluate for ExprDictComp {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let mut out = IndexMap::new();
        run_generators(&self.generators, interp, &mut |interp| {
            let key = HashableValue::new(self.key.eval(interp)?)?;
            let value = self.value.eval(interp)?;
            out.insert(key, value);
            Ok(())
        })?;
        Ok(Value::dict(out))
    }
}

/// Drive nested `for ... if ...` clauses, calling `emit` for every
/// combination that passes all filters.
///
/// Loop variables are bound in the current local group.
fn run_generators(
    generators: &[Comprehension],
    interp: &mut Interpreter,
    emit: &mut dyn FnMut(&mut Interpreter) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    let Some((first, rest)) = generators.split_first() else {
        return emit(interp);
    };
    for item in first.iter.eval(interp)?.to_items()? {
        assign(&first.target, item, interp)?;
        let mut keep = true;
        for cond in &first.ifs {
            if !cond.eval(interp)?.is_truthy() {
                keep = false;
                break;
            }
        }
        if keep {
            run_generators(rest, interp, emit)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Interpreter, Value};
    use pretty_assertions::assert_eq;

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|&n| Value::Int(n)).collect())
    }

    #[test]
    fn test_for_else_runs_without_break() {
        let mut interp = Interpreter::new();
        interp
            .eval("hit = 0\nfor i in range(3):\n    pass\nelse:\n    hit = 1\nendfor")
            .unwrap();
        assert_eq!(interp.eval("hit").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_break_skips_else() {
        let mut interp = Interpreter::new();
        interp
            .eval(
                "hit = 0\nfor i in range(10):\n    if i == 4:\n        break\n    endif\nelse:\n    hit = 1\nendfor",
            )
            .unwrap();
        assert_eq!(interp.eval("(i, hit)").unwrap().repr(), "(4, 0)");
    }

    #[test]
    fn test_while_continue() {
        let mut interp = Interpreter::new();
        interp
            .eval("n = 0\nodd = []\nwhile n < 6:\n    n += 1\n    if n % 2 == 0:\n        continue\n    endif\n    odd.append(n)\nendwhile")
            .unwrap();
        assert_eq!(interp.eval("odd").unwrap(), ints(&[1, 3, 5]));
    }

    #[test]
    fn test_comprehensions() {
        let mut interp = Interpreter::new();
        assert_eq!(
            interp.eval("[x * y for x in range(1, 3) for y in [10, 20] if y > 10]").unwrap(),
            ints(&[20, 40])
        );
        assert_eq!(
            interp.eval("{k: len(k) for k in ['a', 'bb']}").unwrap().repr(),
            "{'a': 1, 'bb': 2}"
        );
    }

    #[test]
    fn test_error_in_body_stops_loop() {
        let mut interp = Interpreter::new();
        let errs = interp
            .eval("seen = []\nfor i in range(5):\n    seen.append(i)\n    x = 1 / (2 - i)\nendfor")
            .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.0[0].line, 4);
        assert_eq!(interp.eval("seen").unwrap(), ints(&[0, 1, 2]));
    }
}
