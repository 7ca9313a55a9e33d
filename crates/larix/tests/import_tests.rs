//! Script modules, native modules and the search path

use std::fs;
use std::path::Path;

use larix::{EvalContext, GroupRef, Interpreter, Value};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write_module(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(format!("{}.lar", name)), body).unwrap();
}

fn interp_in(dir: &TempDir) -> Interpreter {
    Interpreter::with_context(EvalContext::default().search_dir(dir.path()))
}

#[test]
fn test_from_import_alias_binds_only_alias() {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "modA", "x = 1\ny = 2");
    let mut interp = interp_in(&dir);
    interp.eval("from modA import x as y").unwrap();
    assert_eq!(interp.eval("y").unwrap(), Value::Int(1));
    let errs = interp.eval("x").unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "NameError");
}

#[test]
fn test_star_import_skips_private_names() {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "consts", "c = 299792458\n_scratch = 1");
    let mut interp = interp_in(&dir);
    interp.eval("from consts import *").unwrap();
    assert_eq!(interp.eval("c").unwrap(), Value::Int(299792458));
    assert!(interp.eval("_scratch").is_err());
}

#[test]
fn test_module_procedure_resolves_module_names() {
    let dir = TempDir::new().unwrap();
    write_module(
        dir.path(),
        "optics",
        "focal = 2.0\ndef power():\nreturn 1 / focal\nend",
    );
    let mut interp = interp_in(&dir);
    interp.eval("import optics\nfocal = 100").unwrap();
    assert_eq!(interp.eval("optics.power()").unwrap(), Value::Float(0.5));
    interp.eval("optics.focal = 4.0").unwrap();
    assert_eq!(interp.eval("optics.power()").unwrap(), Value::Float(0.25));
}

#[test]
fn test_import_runs_once_until_reload() {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "counter", "n = 1");
    let mut interp = interp_in(&dir);
    interp.eval("import counter\ncounter.n = 5\nimport counter").unwrap();
    assert_eq!(interp.eval("counter.n").unwrap(), Value::Int(5));

    write_module(dir.path(), "counter", "n = 2\nm = 3");
    interp.eval("reload(counter)").unwrap();
    assert_eq!(interp.eval("(counter.n, counter.m)").unwrap().repr(), "(2, 3)");
}

#[test]
fn test_failed_reload_keeps_previous_module() {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "cfg", "mode = 'fast'");
    let mut interp = interp_in(&dir);
    let first = interp.import_module("cfg", false).unwrap();

    write_module(dir.path(), "cfg", "mode = 'slow'\n1 / 0");
    let errs = interp.import_module("cfg", true).unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "ZeroDivisionError");
    let again = interp.import_module("cfg", false).unwrap();
    assert!(again.ptr_eq(&first));
}

#[test]
fn test_first_search_dir_wins() {
    let near = TempDir::new().unwrap();
    let far = TempDir::new().unwrap();
    write_module(near.path(), "pick", "which_dir = 'near'");
    write_module(far.path(), "pick", "which_dir = 'far'");
    let ctx = EvalContext::default()
        .search_dir(near.path())
        .search_dir(far.path());
    let mut interp = Interpreter::with_context(ctx);
    let module = interp.import_module("pick", false).unwrap();
    assert_eq!(module.get("which_dir"), Some(Value::str("near")));
}

#[test]
fn test_sys_path_mirrors_search_path() {
    let ctx = EvalContext::default().search_dir("/opt/lar");
    let mut interp = Interpreter::with_context(ctx);
    assert_eq!(interp.eval("_sys.path").unwrap().repr(), "['.', '/opt/lar']");
    interp.add_search_path("/srv/lar");
    assert_eq!(interp.eval("len(_sys.path)").unwrap(), Value::Int(3));
}

#[test]
fn test_script_edits_to_sys_path_drive_import() {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "late", "v = 3");
    let mut interp = Interpreter::new();
    let errs = interp.eval("import late").unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "ModuleNotFoundError");

    let dir_text = dir.path().display().to_string();
    interp.eval(&format!("_sys.path.append({:?})", dir_text)).unwrap();
    assert_eq!(interp.symtable().search_path().last(), Some(&dir.path().to_path_buf()));
    interp.eval("import late").unwrap();
    assert_eq!(interp.eval("late.v").unwrap(), Value::Int(3));
}

#[test]
fn test_native_module_import() {
    let mut interp = Interpreter::new();
    let hw = GroupRef::new("hw");
    hw.set("serial", Value::str("X-17"));
    interp.register_module("hw", hw);
    interp.eval("import hw as device").unwrap();
    assert_eq!(interp.eval("device.serial").unwrap(), Value::str("X-17"));
}

#[test]
fn test_missing_member_is_import_error() {
    let dir = TempDir::new().unwrap();
    write_module(dir.path(), "modB", "a = 1");
    let mut interp = interp_in(&dir);
    let errs = interp.eval("from modB import nope").unwrap_err();
    assert_eq!(errs.first().unwrap().exc_name, "ImportError");
}

#[test]
fn test_run_file_in_current_frame() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("setup.lar");
    fs::write(&script, "energy = 8.0\nif energy > 5:\nmode = 'high'\nendif").unwrap();
    let mut interp = Interpreter::new();
    interp.run_file(&script).unwrap();
    assert_eq!(interp.eval("mode").unwrap(), Value::str("high"));
}
