//! `%`-style string formatting: `"%s = %.3f" % (name, x)`

use super::{HashableValue, Value};
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{type_name, EvalError, MAX_SEQUENCE_LEN};

#[derive(Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: usize,
    precision: Option<usize>,
}

/// Apply `fmt % args`.
pub fn percent_format(fmt: &str, args: &Value) -> Result<String, EvalError> {
    let positional: Vec<Value> = match args {
        Value::Tuple(items) => items.as_ref().clone(),
        Value::Dict(_) => Vec::new(),
        other => vec![other.clone()],
    };
    let mut next = 0usize;
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        // Mapping key: %(name)s
        let mut keyed: Option<Value> = None;
        if chars.peek() == Some(&'(') {
            chars.next();
            let mut key = String::new();
            for k in chars.by_ref() {
                if k == ')' {
                    break;
                }
                key.push(k);
            }
            let Value::Dict(entries) = args else {
                return Err(EvalError::type_error("format requires a mapping"));
            };
            let lookup = HashableValue::new(Value::str(&key))?;
            keyed = Some(entries.borrow().get(&lookup).cloned().ok_or_else(|| {
                EvalError::KeyNotFound {
                    key: Value::str(&key).repr(),
                }
            })?);
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => {}
                _ => break,
            }
            chars.next();
        }
        spec.width = read_count(&mut chars, "width")?;
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(read_count(&mut chars, "precision")?);
        }

        let conv = chars
            .next()
            .ok_or_else(|| EvalError::Value("incomplete format".to_string()))?;
        if conv == '%' {
            out.push('%');
            continue;
        }

        let arg = match keyed {
            Some(v) => v,
            None => {
                let v = positional.get(next).cloned().ok_or_else(|| {
                    EvalError::type_error("not enough arguments for format string")
                })?;
                next += 1;
                v
            }
        };

        let body = convert(conv, &arg, &spec)?;
        let numeric = matches!(
            conv,
            'd' | 'i' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o'
        );
        out.push_str(&pad(body, &spec, numeric));
    }

    if keyed_only(args) || next >= positional.len() {
        Ok(out)
    } else {
        Err(EvalError::type_error(
            "not all arguments converted during string formatting",
        ))
    }
}

fn read_count(chars: &mut Peekable<Chars<'_>>, what: &str) -> Result<usize, EvalError> {
    let mut n = 0usize;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(d as usize))
            .filter(|n| *n <= MAX_SEQUENCE_LEN)
            .ok_or_else(|| EvalError::Value(format!("{} too big", what)))?;
        chars.next();
    }
    Ok(n)
}

fn keyed_only(args: &Value) -> bool {
    matches!(args, Value::Dict(_))
}

fn convert(conv: char, arg: &Value, spec: &Spec) -> Result<String, EvalError> {
    let number = |arg: &Value| {
        arg.as_f64().ok_or_else(|| {
            EvalError::type_error(format!(
                "%{} format: a number is required, not {}",
                conv,
                type_name(arg)
            ))
        })
    };
    let signed = |s: String, negative: bool| {
        if negative {
            s
        } else if spec.plus {
            format!("+{}", s)
        } else if spec.space {
            format!(" {}", s)
        } else {
            s
        }
    };

    let text = match conv {
        's' => {
            let s = arg.to_string();
            match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            }
        }
        'r' => arg.repr(),
        'd' | 'i' => {
            let n = match arg {
                Value::Float(f) => Value::float_to_int(*f, "%d format")?,
                other => match other.as_i64() {
                    Some(n) => n,
                    None => Value::float_to_int(number(other)?, "%d format")?,
                },
            };
            signed(n.to_string(), n < 0)
        }
        'f' | 'F' => {
            let f = number(arg)?;
            signed(format!("{:.*}", spec.precision.unwrap_or(6), f), f < 0.0)
        }
        'e' | 'E' => {
            let f = number(arg)?;
            let s = exponent(f, spec.precision.unwrap_or(6));
            let s = if conv == 'E' { s.to_uppercase() } else { s };
            signed(s, f < 0.0)
        }
        'g' | 'G' => {
            let f = number(arg)?;
            let p = spec.precision.unwrap_or(6).max(1);
            let exp = if f == 0.0 { 0 } else { f.abs().log10().floor() as i32 };
            let s = if exp < -4 || exp >= p as i32 {
                let e = exponent(f, p - 1);
                match e.split_once('e') {
                    Some((mantissa, rest)) => format!("{}e{}", trim_zeros(mantissa.to_string()), rest),
                    None => e,
                }
            } else {
                let fixed = format!("{:.*}", (p as i32 - 1 - exp).max(0) as usize, f);
                trim_zeros(fixed)
            };
            signed(s, f < 0.0)
        }
        'x' | 'X' | 'o' => {
            let n = arg.expect_int(&format!("%{} format", conv))?;
            let magnitude = n.unsigned_abs();
            let digits = match conv {
                'x' => format!("{:x}", magnitude),
                'X' => format!("{:X}", magnitude),
                _ => format!("{:o}", magnitude),
            };
            let s = if n < 0 { format!("-{}", digits) } else { digits };
            signed(s, n < 0)
        }
        other => {
            return Err(EvalError::Value(format!(
                "unsupported format character '{}'",
                other
            )))
        }
    };
    Ok(text)
}

fn exponent(f: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, f);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}

fn trim_zeros(s: String) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

fn pad(body: String, spec: &Spec, numeric: bool) -> String {
    let len = body.chars().count();
    if len >= spec.width {
        return body;
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero && numeric {
        match body.strip_prefix('-') {
            Some(rest) => format!("-{}{}", "0".repeat(fill), rest),
            None => format!("{}{}", "0".repeat(fill), body),
        }
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}
