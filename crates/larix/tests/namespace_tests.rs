//! Symbol table resolution, frames and groups

use larix::{EvalContext, EvalError, GroupRef, Interpreter, Namespace, SymbolTable, Value};
use pretty_assertions::assert_eq;

// ═══════════════════════════════════════════════════════════════════════
// Search order
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_local_shadows_module_shadows_core() {
    let mut table = SymbolTable::with_prelude();
    table.root().set("pi", Value::Int(3));
    assert_eq!(table.get_symbol("pi").unwrap(), Value::Int(3));

    let module = GroupRef::new("mod");
    let local = GroupRef::new("call");
    module.set("pi", Value::Int(4));
    local.set("pi", Value::Int(5));

    let guard = table.frame_guard(local.clone(), module.clone());
    assert_eq!(guard.get_symbol("pi").unwrap(), Value::Int(5));
    local.delete("pi");
    assert_eq!(guard.get_symbol("pi").unwrap(), Value::Int(4));
    module.delete("pi");
    // Core groups come before the root
    assert!(matches!(guard.get_symbol("pi").unwrap(), Value::Float(f) if f == std::f64::consts::PI));
}

#[test]
fn test_search_group_precedes_core_groups() {
    let mut table = SymbolTable::with_prelude();
    let optics = table.new_group("optics").unwrap();
    optics.set("sqrt", Value::str("shadowed"));
    table.add_search_group("optics");
    table.add_search_group("optics");
    assert_eq!(table.search_groups(), ["optics".to_string()]);
    assert_eq!(table.get_symbol("sqrt").unwrap(), Value::str("shadowed"));

    let names: Vec<String> = table.search_order().iter().map(|g| g.name()).collect();
    assert_eq!(names, ["_main", "optics", "_builtin", "_math", "_sys"]);
}

#[test]
fn test_search_group_follows_its_binding() {
    let mut interp = Interpreter::new();
    interp.add_search_group("plugins");
    interp.eval("a = 1").unwrap();
    interp.eval("plugins = group()\nplugins.gain = 7").unwrap();
    assert_eq!(interp.eval("gain").unwrap(), Value::Int(7));

    interp.eval("plugins = group()\nplugins.gain = 2").unwrap();
    assert_eq!(interp.eval("gain").unwrap(), Value::Int(2));
}

#[test]
fn test_dotted_lookup_walks_groups() {
    let mut table = SymbolTable::new();
    table.set_symbol("a.b.c", Value::Int(1)).unwrap();
    assert_eq!(table.lookup("a.b.c", false).unwrap(), Value::Int(1));
    assert!(matches!(
        table.lookup("a.x.c", false),
        Err(EvalError::NoMember { .. })
    ));
    assert!(matches!(
        table.lookup("a.b.c.d", false),
        Err(EvalError::NotANamespace { .. })
    ));
    assert_eq!(table.lookup("a.x.c", true).unwrap(), Value::None);
    assert!(matches!(table.lookup("a.x", false).unwrap(), Value::Group(_)));
}

#[test]
fn test_parent_path() {
    let table = SymbolTable::with_prelude();
    assert_eq!(table.parent_path("sqrt").as_deref(), Some("_math.sqrt"));
    assert_eq!(table.parent_path("len").as_deref(), Some("_builtin.len"));
    assert_eq!(table.parent_path("nothing_here"), None);
}

// ═══════════════════════════════════════════════════════════════════════
// Binding and deletion
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_set_binds_relative_to_local_group() {
    let mut table = SymbolTable::new();
    let local = GroupRef::new("call");
    {
        let mut guard = table.frame_guard(local.clone(), local.clone());
        guard.set_symbol("scan.npts", Value::Int(11)).unwrap();
    }
    assert!(table.get_symbol("scan").is_err());
    assert!(matches!(local.get("scan"), Some(Value::Group(_))));
}

#[test]
fn test_set_through_non_group_fails() {
    let mut table = SymbolTable::new();
    table.set_symbol("x", Value::Int(1)).unwrap();
    assert!(matches!(
        table.set_symbol("x.y", Value::Int(2)),
        Err(EvalError::NotANamespace { .. })
    ));
}

#[test]
fn test_delete_only_direct_bindings() {
    let mut table = SymbolTable::with_prelude();
    table.set_symbol("x", Value::Int(1)).unwrap();
    assert_eq!(table.delete("x").unwrap(), Value::Int(1));
    assert!(matches!(table.delete("x"), Err(EvalError::NameNotFound { .. })));
    // Visible only through a core group
    assert!(matches!(table.delete("sqrt"), Err(EvalError::NotDeletable { .. })));
    // The full path reaches it directly
    table.delete("_math.sqrt").unwrap();
    assert!(!table.has_symbol("sqrt"));
}

#[test]
fn test_numeric_list_normalization() {
    let mut interp = Interpreter::with_context(EvalContext::default().normalize_numeric_lists(true));
    interp.eval("a = [1, 2.5, 3]\nb = ['x', 1]\ng.v = (1, 2)").unwrap();
    assert!(matches!(interp.get_symbol("a").unwrap(), Value::Array(_)));
    assert!(matches!(interp.get_symbol("b").unwrap(), Value::List(_)));
    assert!(matches!(interp.get_symbol("g.v").unwrap(), Value::Array(_)));
    assert_eq!(interp.eval("(a * 2).tolist()").unwrap().repr(), "[2.0, 5.0, 6.0]");
}

#[test]
fn test_groups_are_never_normalized() {
    let mut table = SymbolTable::new();
    table.set_normalize_numeric_lists(true);
    let group = GroupRef::new("g");
    table.set_symbol("g", Value::Group(group)).unwrap();
    assert!(matches!(table.get_symbol("g").unwrap(), Value::Group(_)));
}

// ═══════════════════════════════════════════════════════════════════════
// Frames
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_frame_guard_restores_on_early_exit() {
    fn body(table: &mut SymbolTable) -> Result<(), EvalError> {
        let local = GroupRef::new("call");
        let mut guard = table.frame_guard(local.clone(), local);
        guard.set_symbol("tmp", Value::Int(1))?;
        guard.get_symbol("does_not_exist")?;
        Ok(())
    }

    let mut table = SymbolTable::new();
    assert!(body(&mut table).is_err());
    assert_eq!(table.frame_depth(), 0);
    assert!(table.local_group().ptr_eq(table.root()));
    assert!(!table.has_symbol("tmp"));
}

#[test]
fn test_frame_balance_after_failed_call() {
    let mut interp = Interpreter::new();
    interp
        .eval("def inner():\n    return missing\nend\ndef outer():\n    return inner() + 1\nend")
        .unwrap();
    assert!(interp.eval("outer()").is_err());
    assert_eq!(interp.symtable().frame_depth(), 0);
    assert!(interp.symtable().local_group().ptr_eq(interp.symtable().root()));
}

#[test]
fn test_group_namespace_trait() {
    let mut group = larix::Group::new("g");
    group.set("b", Value::Int(2));
    group.set("a", Value::Int(1));
    assert!(group.has("a"));
    assert_eq!(group.keys(), ["b".to_string(), "a".to_string()]);
    assert_eq!(group.delete("b"), Some(Value::Int(2)));
    assert_eq!(group.get("b"), None);
}

#[test]
fn test_collaborator_get_and_set() {
    let mut interp = Interpreter::new();
    interp.set_symbol("beam.energy", 7.0).unwrap();
    assert_eq!(interp.eval("beam.energy * 2").unwrap(), Value::Float(14.0));
    interp.eval("beam.current = 100").unwrap();
    assert_eq!(interp.get_symbol("beam.current").unwrap(), Value::Int(100));
    let errs = interp.get_symbol("beam.missing").unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "AttributeError");
}
