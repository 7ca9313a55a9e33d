//! Error classification, location and accumulation

use larix::{ErrorKind, Interpreter, ScriptError, Value};
use pretty_assertions::assert_eq;

fn first_error(src: &str) -> (ErrorKind, String) {
    let mut interp = Interpreter::new();
    let errs = interp.eval(src).unwrap_err();
    let record = errs.first().unwrap();
    (record.kind, record.exc_name.clone())
}

// ═══════════════════════════════════════════════════════════════════════
// Taxonomy
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_error_kinds() {
    let cases = [
        ("nothing_here", ErrorKind::Lookup, "NameError"),
        ("g = group()\ng.missing", ErrorKind::Lookup, "AttributeError"),
        ("{'a': 1}['b']", ErrorKind::Lookup, "KeyError"),
        ("[1, 2][5]", ErrorKind::Lookup, "IndexError"),
        ("len(1, 2)", ErrorKind::Arity, "TypeError"),
        ("1 + 'a'", ErrorKind::Type, "TypeError"),
        ("3()", ErrorKind::Type, "TypeError"),
        ("import no_such_module_here", ErrorKind::Import, "ModuleNotFoundError"),
        ("x = 1 / 0", ErrorKind::Runtime, "ZeroDivisionError"),
        ("a, b = [1, 2, 3]", ErrorKind::Runtime, "ValueError"),
        ("raise KeyError('k')", ErrorKind::Runtime, "KeyError"),
        ("f = lambda x: x", ErrorKind::UnsupportedNode, "NotImplementedError"),
        ("x = 1 2", ErrorKind::Syntax, "SyntaxError"),
    ];
    for (src, kind, exc_name) in cases {
        assert_eq!(first_error(src), (kind, exc_name.to_string()), "source: {}", src);
    }
}

#[test]
fn test_unsupported_statement() {
    let (kind, name) = first_error("with open('f') as fh:\n    pass");
    assert_eq!(kind, ErrorKind::UnsupportedNode);
    assert_eq!(name, "NotImplementedError");
}

// ═══════════════════════════════════════════════════════════════════════
// Location
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_runtime_error_location() {
    let mut interp = Interpreter::new();
    let errs = interp
        .eval("a = 1\nfor i in range(3):\nif i == 2:\nb = a / 0\nendif\nendfor")
        .unwrap_err();
    let record = errs.first().unwrap();
    assert_eq!(record.line, 4);
    assert_eq!(record.filename, "<stdin>");
    assert_eq!(record.text.trim(), "b = a / 0");
    assert_eq!(record.node, "BinOp");
    assert_eq!(interp.eval("i").unwrap(), Value::Int(2));
}

#[test]
fn test_syntax_error_location() {
    let mut interp = Interpreter::new();
    let errs = interp.eval("a = 1\n\nb = 1 2").unwrap_err();
    let record = errs.first().unwrap();
    assert_eq!(record.kind, ErrorKind::Syntax);
    assert_eq!(record.line, 3);
    assert_eq!(record.text, "b = 1 2");
    // Earlier blocks still ran
    assert_eq!(interp.eval("a").unwrap(), Value::Int(1));
}

#[test]
fn test_unterminated_block_is_reported() {
    let mut interp = Interpreter::new();
    let errs = interp.eval("if 1:\nx = 2").unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "SyntaxError");
}

#[test]
fn test_report_lines() {
    let mut interp = Interpreter::new();
    let errs = interp.eval("y = missing").unwrap_err();
    let (location, what) = errs.first().unwrap().report();
    assert_eq!(location, "<stdin>, line 1");
    assert!(what.starts_with("NameError: "));
    assert!(what.ends_with("y = missing"));
}

// ═══════════════════════════════════════════════════════════════════════
// Accumulation
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_independent_blocks_all_report() {
    let mut interp = Interpreter::new();
    let errs = interp
        .eval("x = 1 / 0\nok = True\ny = [][0]\nz = nope")
        .unwrap_err();
    let names: Vec<&str> = errs.iter().map(|r| r.exc_name.as_str()).collect();
    assert_eq!(names, ["ZeroDivisionError", "IndexError", "NameError"]);
    assert_eq!(interp.eval("ok").unwrap(), Value::Bool(true));
    assert!(errs.to_string().ends_with("(and 2 more)"));
}

#[test]
fn test_errors_reset_per_call() {
    let mut interp = Interpreter::new();
    assert!(interp.eval("nope").is_err());
    assert_eq!(interp.errors().len(), 1);
    interp.eval("1").unwrap();
    assert!(interp.errors().is_empty());
}

#[test]
fn test_failure_inside_procedure_reported_once() {
    let mut interp = Interpreter::new();
    interp
        .eval("def a():\nreturn b()\nend\ndef b():\nreturn {}['k']\nend")
        .unwrap();
    let errs = interp.eval("a()").unwrap_err();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.first().unwrap().exc_name, "KeyError");
}

// ═══════════════════════════════════════════════════════════════════════
// Host errors
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
#[error("motor {0} stalled")]
struct MotorStalled(u32);

#[test]
fn test_host_payload_downcasts() {
    let mut interp = Interpreter::new();
    interp
        .register_fn("motor.move", 1, |_| Err(MotorStalled(3).into()))
        .unwrap();
    let errs = interp.eval("motor.move(10)").unwrap_err();
    let record = errs.first().unwrap();
    assert_eq!(record.kind, ErrorKind::Host);
    assert_eq!(record.message, "motor 3 stalled");
    let payload = record.payload.as_ref().unwrap();
    assert!(matches!(payload.downcast_ref::<MotorStalled>(), Some(MotorStalled(3))));
}

#[test]
fn test_host_eval_error_passes_through() {
    let mut interp = Interpreter::new();
    interp
        .register_fn("check", 1, |_| {
            Err(ScriptError::new("ValueError", "out of range").into())
        })
        .unwrap();
    let errs = interp.eval("check(1)").unwrap_err();
    let record = errs.first().unwrap();
    assert_eq!(record.kind, ErrorKind::Runtime);
    assert_eq!(record.exc_name, "ValueError");
    assert_eq!(record.message, "out of range");
    assert!(record.payload.is_none());
}

#[test]
fn test_host_script_error_is_catchable() {
    let mut interp = Interpreter::new();
    interp
        .register_fn("stage.move", 1, |_| {
            Err(ScriptError::new("ValueError", "position beyond travel").into())
        })
        .unwrap();
    interp
        .eval("try:
stage.move(900)
except ValueError as e:
why = str(e)
endtry")
        .unwrap();
    assert_eq!(interp.eval("why").unwrap(), Value::str("position beyond travel"));
}

#[test]
fn test_host_panic_is_recorded() {
    let mut interp = Interpreter::new();
    interp
        .register_fn("detector.read", 0, |_| panic!("driver fault"))
        .unwrap();
    interp
        .eval("def sample():
return detector.read()
end")
        .unwrap();
    let errs = interp.eval("counts = sample()").unwrap_err();
    assert_eq!(errs.len(), 1);
    let record = errs.first().unwrap();
    assert_eq!(record.kind, ErrorKind::Host);
    assert_eq!(record.exc_name, "SystemError");
    assert!(record.message.contains("driver fault"));
    assert_eq!(interp.symtable().frame_depth(), 0);
    assert_eq!(interp.eval("1 + 1").unwrap(), Value::Int(2));
}

// ═══════════════════════════════════════════════════════════════════════
// Resource limits
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_oversized_results_are_memory_errors() {
    for src in [
        "'ab' * 4611686018427387904",
        "[1, 2] * 4611686018427387904",
        "(0,) * 4611686018427387904",
        "r = range(10**12)",
    ] {
        let (kind, name) = first_error(src);
        assert_eq!((kind, name.as_str()), (ErrorKind::Host, "MemoryError"), "source: {}", src);
    }
}

#[test]
fn test_oversized_format_width_is_value_error() {
    let (kind, name) = first_error("'%99999999999999999999999d' % 1");
    assert_eq!((kind, name.as_str()), (ErrorKind::Runtime, "ValueError"));
}

#[test]
fn test_memory_error_is_catchable() {
    let mut interp = Interpreter::new();
    interp
        .eval("try:
big = 'x' * 10**18
except MemoryError:
big = None
endtry")
        .unwrap();
    assert_eq!(interp.eval("big").unwrap(), Value::None);
}

#[test]
fn test_long_expression_is_syntax_error() {
    let mut interp = Interpreter::new();
    let long = format!("x = 1{}", " + 1".repeat(20_000));
    let err = interp.compile(&long).unwrap_err();
    assert_eq!(err.message, "expression too deeply nested");

    let errs = interp.eval(&format!("ok = 1
{}", long)).unwrap_err();
    let record = errs.first().unwrap();
    assert_eq!(record.kind, ErrorKind::Syntax);
    assert_eq!(record.line, 2);
    assert_eq!(interp.eval("ok").unwrap(), Value::Int(1));
}

#[test]
fn test_deep_nesting_is_syntax_error() {
    let mut interp = Interpreter::new();
    let depth = 5_000;
    for src in [
        format!("x = {}1{}", "(".repeat(depth), ")".repeat(depth)),
        format!("x = {}1", "-".repeat(depth)),
        format!("x = {}1{}", "[".repeat(depth), "]".repeat(depth)),
    ] {
        let errs = interp.eval(&src).unwrap_err();
        assert_eq!(errs.first().unwrap().exc_name, "SyntaxError");
    }
}

#[test]
fn test_moderate_nesting_evaluates() {
    let mut interp = Interpreter::new();
    let depth = 150;
    let src = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
    interp.eval(&format!("x = {}", src)).unwrap();
    assert_eq!(interp.eval(&format!("x == {}", src)).unwrap(), Value::Bool(true));
    let sum = format!("1{}", " + 1".repeat(900));
    assert_eq!(interp.eval(&sum).unwrap(), Value::Int(901));
}

#[test]
fn test_self_containing_containers_print() {
    let mut interp = Interpreter::new();
    interp.eval("a = [1]\na.append(a)\nd = {}\nd['k'] = d").unwrap();
    assert_eq!(interp.eval("repr(a)").unwrap(), Value::str("[1, [...]]"));
    assert_eq!(interp.eval("str(d)").unwrap(), Value::str("{'k': {...}}"));
    assert_eq!(interp.eval("a == a").unwrap(), Value::Bool(true));
}

#[test]
fn test_comparing_distinct_cyclic_lists_is_recursion_error() {
    let mut interp = Interpreter::new();
    interp
        .eval("a = [1]\na.append(a)\nb = [1]\nb.append(b)")
        .unwrap();
    for src in ["a == b", "a != b", "a < b", "b in [a]"] {
        let errs = interp.eval(src).unwrap_err();
        assert_eq!(errs.first().unwrap().exc_name, "RecursionError", "source: {}", src);
    }
}

#[test]
fn test_float_to_int_out_of_range_is_overflow() {
    for src in ["int(1e300)", "'%d' % 1e300", "round(-1e19)", "int(float('inf'))"] {
        let (kind, name) = first_error(src);
        assert_eq!((kind, name.as_str()), (ErrorKind::Runtime, "OverflowError"), "source: {}", src);
    }
    let mut interp = Interpreter::new();
    assert_eq!(interp.eval("int(-2.9)").unwrap(), Value::Int(-2));
    assert_eq!(interp.eval("'%d' % 7.5").unwrap(), Value::str("7"));
}
