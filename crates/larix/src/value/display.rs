//! Display and Debug implementations for Value
//!
//! `Display` gives the `str()` form and `repr()` the quoted form, following
//! the conventions scripts expect from `print`.

use std::fmt;
use std::rc::Rc;

use super::*;
use crate::stack::with_stack_room;

impl Value {
    /// The `repr()` form of a value.
    ///
    /// A list or dict that contains itself prints as `[...]` / `{...}` at
    /// the point of re-entry.
    pub fn repr(&self) -> String {
        let mut open = Vec::new();
        self.repr_in(&mut open)
    }

    fn repr_in(&self, open: &mut Vec<*const ()>) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote_str(s),
            Value::List(items) => {
                let key = Rc::as_ptr(items) as *const ();
                if open.contains(&key) {
                    return "[...]".to_string();
                }
                open.push(key);
                let text = format!("[{}]", join_repr(&items.borrow(), open));
                open.pop();
                text
            }
            Value::Tuple(items) if items.len() == 1 => {
                format!("({},)", nested_repr(&items[0], open))
            }
            Value::Tuple(items) => format!("({})", join_repr(items, open)),
            Value::Dict(entries) => {
                let key = Rc::as_ptr(entries) as *const ();
                if open.contains(&key) {
                    return "{...}".to_string();
                }
                open.push(key);
                let parts: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| {
                        let key = nested_repr(k.value(), open);
                        format!("{}: {}", key, nested_repr(v, open))
                    })
                    .collect();
                open.pop();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Array(items) => {
                let parts: Vec<String> = items.borrow().iter().map(|f| format_float(*f)).collect();
                format!("array([{}])", parts.join(", "))
            }
            Value::Group(group) => format!("<Group {}>", group.name()),
            Value::Procedure(p) => format!("<Procedure {}>", p.signature()),
            Value::DefinedVariable(dv) => {
                format!("<DefinedVariable {} = {}>", dv.name, dv.expression())
            }
            Value::Builtin(f) => format!("<builtin function {}>", f.name),
            Value::ExceptionType(name) => format!("<class '{}'>", name),
            Value::Exception(exc) => format!("{}({})", exc.kind, quote_str(&exc.message)),
        }
    }
}

fn nested_repr(value: &Value, open: &mut Vec<*const ()>) -> String {
    with_stack_room(|| value.repr_in(open))
}

fn join_repr(items: &[Value], open: &mut Vec<*const ()>) -> String {
    items
        .iter()
        .map(|v| nested_repr(v, open))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a float the way scripts print it: `1.0`, `0.1`, `1e+20`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return format_exponent(&format!("{:e}", f));
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

// Rust writes `1e20` and `1.5e-7`; scripts expect `1e+20` and `1.5e-07`.
fn format_exponent(raw: &str) -> String {
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw.to_string(),
    }
}

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Exception(exc) => f.write_str(&exc.message),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_repr_of_containers() {
        let v = Value::list(vec![Value::Int(1), Value::str("a"), Value::None]);
        assert_eq!(v.repr(), "[1, 'a', None]");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::array(vec![1.0, 2.5]).repr(), "array([1.0, 2.5])");
    }

    #[test]
    fn test_str_versus_repr() {
        let s = Value::str("it's");
        assert_eq!(s.to_string(), "it's");
        assert_eq!(s.repr(), "\"it's\"");
        let e = Value::exception("ValueError", "bad");
        assert_eq!(e.to_string(), "bad");
        assert_eq!(e.repr(), "ValueError('bad')");
    }

    #[test]
    fn test_self_containing_list_repr() {
        let a = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &a {
            items.borrow_mut().push(a.clone());
        }
        assert_eq!(a.repr(), "[1, [...]]");
        assert_eq!(a.to_string(), "[1, [...]]");
    }

    #[test]
    fn test_shared_but_acyclic_list_prints_twice() {
        let inner = Value::list(vec![Value::Int(2)]);
        let outer = Value::list(vec![inner.clone(), inner]);
        assert_eq!(outer.repr(), "[[2], [2]]");
    }
}
