//! Preprocessor behavior through the public `InputText` API

use larix::{EvalContext, InputText, Interpreter, Value};
use pretty_assertions::assert_eq;

fn blocks(source: &str) -> Vec<String> {
    let mut input = InputText::new();
    input.put(source, "<test>", 1).unwrap();
    input.finish().unwrap();
    std::iter::from_fn(|| input.get()).map(|b| b.text).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Completeness
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_bracket_completeness() {
    let mut input = InputText::new();
    assert!(!input.is_complete("(a, b"));
    input.clear();
    assert!(input.is_complete("(a, b)"));
    assert!(input.is_complete("{'k': [1, (2, 3)]}"));
}

#[test]
fn test_escaped_quote_completeness() {
    let mut input = InputText::new();
    assert!(input.is_complete("\"a\\\"b\""));
    assert!(!input.is_complete("'never closed"));
    assert!(!input.is_complete("still open"));
}

#[test]
fn test_single_statement_is_one_block() {
    for stmt in ["x = 1", "y = f(1, [2, 3])", "print('a: b')", "z = {'k': 1}"] {
        assert_eq!(blocks(stmt), vec![stmt.to_string()]);
    }
}

#[test]
fn test_block_records_start_line() {
    let mut input = InputText::new();
    input
        .put("a = 1\nfor i in range(2):\nb = i\nendfor", "scan.lar", 10)
        .unwrap();
    let first = input.get().unwrap();
    let second = input.get().unwrap();
    assert_eq!((first.filename.as_str(), first.line), ("scan.lar", 10));
    assert_eq!(second.line, 11);
    assert_eq!(second.raw, "for i in range(2):\nb = i\nendfor");
}

// ═══════════════════════════════════════════════════════════════════════
// Rewrites
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_command_sugar() {
    assert_eq!(blocks("plot x, y"), blocks("plot(x, y)"));
    assert_eq!(blocks("plot(x, y)"), vec!["plot(x, y)"]);
    assert_eq!(blocks("show 3"), vec!["show(3)"]);
}

#[test]
fn test_command_sugar_runs() {
    let mut interp = Interpreter::new();
    let out = larix::SharedBuffer::new();
    interp.set_output(out.clone());
    interp.eval("print 'a', 2").unwrap();
    assert_eq!(out.contents(), "a 2\n");
}

#[test]
fn test_valid_commands_limit_command_sugar() {
    let ctx = EvalContext::default().commands(["show"]);
    let mut interp = Interpreter::with_context(ctx);
    interp.eval("def show(x):\nreturn x * 2\nend\ndef tell(x):\nreturn -x\nend").unwrap();
    assert_eq!(interp.eval("_sys.valid_commands").unwrap().repr(), "['show']");
    assert_eq!(interp.eval("show 4").unwrap(), Value::Int(8));

    let errs = interp.eval("tell 4").unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "SyntaxError");

    // Scripts extend the list and the next evaluation honors it
    interp.eval("_sys.valid_commands.append('tell')").unwrap();
    assert_eq!(interp.eval("tell 4").unwrap(), Value::Int(-4));

    interp.eval("_sys.valid_commands = None").unwrap();
    assert_eq!(interp.symtable().valid_commands(), None);
}

#[test]
fn test_end_and_endif_are_equivalent() {
    let with_end = blocks("if x:\ny = 1\nend");
    let with_endif = blocks("if x:\ny = 1\nendif");
    assert_eq!(with_end.len(), 1);
    assert_eq!(with_endif.len(), 1);

    let mut interp = Interpreter::new();
    interp.eval("x = 1\nif x:\ny = 1\nend\nif x:\nz = 2\nendif").unwrap();
    assert_eq!(interp.eval("y + z").unwrap(), Value::Int(3));
}

#[test]
fn test_wrong_end_keyword_does_not_close() {
    let mut input = InputText::new();
    input.put("while x:\nx = x - 1\nendfor", "<test>", 1).unwrap();
    assert_eq!(input.depth(), 1);
    assert!(input.get().is_none());
    assert!(input.finish().is_err());
}

#[test]
fn test_source_indentation_is_ignored() {
    let mut interp = Interpreter::new();
    interp
        .eval("total = 0\nfor i in range(4):\n        if i % 2:\n  total = total + i\n      endif\nendfor")
        .unwrap();
    assert_eq!(interp.eval("total").unwrap(), Value::Int(4));
}

#[test]
fn test_comments_dropped() {
    assert_eq!(blocks("x = 1  # set x\n# only a comment"), vec!["x = 1"]);
}
