//! Property tests for the preprocessor and evaluator

use larix::input::{is_valid_name, RESERVED_WORDS};
use larix::{InputText, Interpreter, Value};
use proptest::prelude::*;

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_filter("reserved", |n| {
        !RESERVED_WORDS.contains(&n.as_str()) && is_valid_name(n)
    })
}

fn literal() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        "[a-z ]{0,10}".prop_map(|s| format!("'{}'", s)),
        prop::collection::vec(0u16..1000, 0..5).prop_map(|items| {
            let parts: Vec<String> = items.iter().map(u16::to_string).collect();
            format!("[{}]", parts.join(", "))
        }),
    ]
}

/// Text with balanced brackets and closed strings.
fn balanced() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[a-z0-9 +,]{0,6}",
        "[a-z ]{1,6}".prop_map(|s| format!("'{}'", s)),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(|s| format!("({})", s)),
            inner.clone().prop_map(|s| format!("[{}]", s)),
            inner.clone().prop_map(|s| format!("{{{}}}", s)),
            (inner.clone(), inner).prop_map(|(a, b)| format!("{}{}", a, b)),
        ]
    })
}

proptest! {
    #[test]
    fn balanced_text_is_complete(text in balanced()) {
        let mut input = InputText::new();
        prop_assert!(input.is_complete(&text));
    }

    #[test]
    fn unclosed_bracket_is_incomplete(text in balanced(), open in prop::sample::select(vec!['(', '[', '{'])) {
        let line = format!("{}{}", open, text);
        let mut input = InputText::new();
        prop_assert!(!input.is_complete(&line));
    }

    #[test]
    fn single_statement_is_one_block(target in name(), value in literal()) {
        let stmt = format!("{} = {}", target, value);
        let mut input = InputText::new();
        input.put(&stmt, "<prop>", 1).unwrap();
        input.finish().unwrap();
        let block = input.get().unwrap();
        prop_assert_eq!(block.text, stmt);
        prop_assert!(input.get().is_none());
    }

    #[test]
    fn assignment_then_read(target in name(), n in any::<i32>()) {
        let mut interp = Interpreter::new();
        interp.eval(&format!("{} = {}", target, n)).unwrap();
        prop_assert_eq!(interp.get_symbol(&target).unwrap(), Value::Int(n as i64));
    }

    #[test]
    fn sum_and_sorted_agree(items in prop::collection::vec(-1000i64..1000, 0..20)) {
        let list: Vec<String> = items.iter().map(i64::to_string).collect();
        let mut interp = Interpreter::new();
        interp.eval(&format!("data = [{}]", list.join(", "))).unwrap();

        prop_assert_eq!(interp.eval("sum(data)").unwrap(), Value::Int(items.iter().sum()));
        let mut expected = items.clone();
        expected.sort();
        let sorted: Vec<String> = expected.iter().map(i64::to_string).collect();
        prop_assert_eq!(
            interp.eval("sorted(data)").unwrap().repr(),
            format!("[{}]", sorted.join(", "))
        );
    }

    #[test]
    fn frames_balanced_after_any_call(n in 0i64..30, fail in any::<bool>()) {
        let mut interp = Interpreter::new();
        interp
            .eval("def walk(n, fail):\nif n == 0:\nif fail:\nreturn missing\nendif\nreturn 0\nendif\nreturn walk(n - 1, fail)\nend")
            .unwrap();
        let call = format!("walk({}, {})", n, if fail { "True" } else { "False" });
        prop_assert_eq!(interp.eval(&call).is_err(), fail);
        prop_assert_eq!(interp.symtable().frame_depth(), 0);
    }
}
