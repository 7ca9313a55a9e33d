//! `_math` and `_sys` core groups
//!
//! Math functions accept a number, an array, or a list/tuple of numbers.
//! Scalars give floats; sequences give arrays, computed elementwise.

use super::prelude::define_builtin;
use super::GroupRef;
use crate::error::{type_name, EvalError, MAX_SEQUENCE_LEN};
use crate::interpreter::Interpreter;
use crate::value::{CallArgs, Value};

pub(super) fn load_math(g: &GroupRef) {
    g.set("pi", Value::Float(std::f64::consts::PI));
    g.set("e", Value::Float(std::f64::consts::E));
    g.set("inf", Value::Float(f64::INFINITY));
    g.set("nan", Value::Float(f64::NAN));

    let unary: &[(&'static str, fn(f64) -> f64)] = &[
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("ln", f64::ln),
        ("log10", f64::log10),
        ("log2", f64::log2),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("arcsin", f64::asin),
        ("acos", f64::acos),
        ("arccos", f64::acos),
        ("atan", f64::atan),
        ("arctan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("fabs", f64::abs),
        ("degrees", f64::to_degrees),
        ("radians", f64::to_radians),
    ];
    for &(name, f) in unary {
        define_builtin(g, name, 1, move |_, a| elementwise(name, &a.positional[0], f));
    }

    let binary: &[(&'static str, fn(f64, f64) -> f64)] = &[
        ("atan2", f64::atan2),
        ("arctan2", f64::atan2),
        ("hypot", f64::hypot),
    ];
    for &(name, f) in binary {
        define_builtin(g, name, 2, move |_, a| {
            let x = a.positional[0].expect_f64(name)?;
            let y = a.positional[1].expect_f64(name)?;
            Ok(Value::Float(f(x, y)))
        });
    }

    define_builtin(g, "isnan", 1, |_, a| predicate("isnan", &a.positional[0], f64::is_nan));
    define_builtin(g, "isinf", 1, |_, a| {
        predicate("isinf", &a.positional[0], f64::is_infinite)
    });

    define_builtin(g, "array", 1, |_, a| Ok(Value::array(a.positional[0].to_f64_vec()?)));
    define_builtin(g, "arange", -1, builtin_arange);
    define_builtin(g, "linspace", -1, builtin_linspace);
    define_builtin(g, "zeros", 1, |_, a| filled(&a.positional[0], 0.0));
    define_builtin(g, "ones", 1, |_, a| filled(&a.positional[0], 1.0));
}

pub(super) fn load_sys(g: &GroupRef) {
    g.set("version", Value::str(crate::VERSION));
    g.set("last_error", Value::None);
}

fn elementwise(name: &str, value: &Value, f: fn(f64) -> f64) -> Result<Value, EvalError> {
    match value {
        Value::Array(_) | Value::List(_) | Value::Tuple(_) => {
            Ok(Value::array(value.to_f64_vec()?.into_iter().map(f).collect()))
        }
        other if other.is_number() => Ok(Value::Float(f(other.expect_f64(name)?))),
        other => Err(EvalError::type_error(format!(
            "{}() expected a number or array, not '{}'",
            name,
            type_name(other)
        ))),
    }
}

fn predicate(name: &str, value: &Value, f: fn(f64) -> bool) -> Result<Value, EvalError> {
    match value {
        Value::Array(_) | Value::List(_) | Value::Tuple(_) => Ok(Value::list(
            value
                .to_f64_vec()?
                .into_iter()
                .map(|x| Value::Bool(f(x)))
                .collect(),
        )),
        other => Ok(Value::Bool(f(other.expect_f64(name)?))),
    }
}

fn filled(count: &Value, fill: f64) -> Result<Value, EvalError> {
    let n = count.expect_int("array size")?;
    if n < 0 {
        return Err(EvalError::Value("negative dimensions are not allowed".to_string()));
    }
    let n = EvalError::check_size(usize::try_from(n).ok(), "array")?;
    Ok(Value::array(vec![fill; n]))
}

fn builtin_arange(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    let nums = args
        .positional
        .iter()
        .map(|v| v.expect_f64("arange() argument"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match *nums.as_slice() {
        [stop] => (0.0, stop, 1.0),
        [start, stop] => (start, stop, 1.0),
        [start, stop, step] => (start, stop, step),
        _ => {
            return Err(EvalError::Arity {
                name: "arange".to_string(),
                qualifier: "at most",
                expected: 3,
                got: nums.len(),
            })
        }
    };
    if step == 0.0 {
        return Err(EvalError::ZeroDivision("arange() step must not be zero"));
    }
    let count = ((stop - start) / step).ceil().max(0.0);
    let count = if count.is_finite() && count < MAX_SEQUENCE_LEN as f64 {
        count as usize
    } else {
        return Err(EvalError::TooLarge { what: "arange() result" });
    };
    Ok(Value::array(
        (0..count).map(|i| start + step * i as f64).collect(),
    ))
}

fn builtin_linspace(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    if args.positional.len() < 2 {
        return Err(EvalError::Arity {
            name: "linspace".to_string(),
            qualifier: "at least",
            expected: 2,
            got: args.positional.len(),
        });
    }
    let start = args.positional[0].expect_f64("linspace() start")?;
    let stop = args.positional[1].expect_f64("linspace() stop")?;
    let num = match args.get(2, "num") {
        Some(v) => v.expect_int("linspace() num")?,
        None => 50,
    };
    if num > 0 {
        EvalError::check_size(usize::try_from(num).ok(), "linspace() result")?;
    }
    let items = match num {
        n if n <= 0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    };
    Ok(Value::array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_elementwise_scalar_and_array() {
        assert_eq!(
            elementwise("sqrt", &Value::Int(4), f64::sqrt).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            elementwise("sqrt", &Value::array(vec![1.0, 9.0]), f64::sqrt).unwrap(),
            Value::array(vec![1.0, 3.0])
        );
        assert!(elementwise("sqrt", &Value::str("x"), f64::sqrt).is_err());
    }

    #[test]
    fn test_filled_rejects_negative() {
        assert_eq!(filled(&Value::Int(2), 1.0).unwrap(), Value::array(vec![1.0, 1.0]));
        assert!(filled(&Value::Int(-1), 0.0).is_err());
    }

    #[test]
    fn test_sys_group() {
        let g = GroupRef::new("_sys");
        load_sys(&g);
        assert_eq!(g.get("version"), Some(Value::str(crate::VERSION)));
        assert_eq!(g.get("last_error"), Some(Value::None));
    }
}
