//! Module import
//!
//! `import name` first looks for `name.<ext>` in each search-path
//! directory. A script module runs in a fresh frame whose local and
//! module groups are both the new module group, which is then registered
//! under its dotted name. When no file exists, modules provided by the
//! host through [`Interpreter::register_module`] are consulted.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::EvalError;
use crate::interpreter::{CallGuard, Interpreter};
use crate::symtable::{is_member_name, FrameGuard, GroupRef};
use crate::syntax::{StmtImport, StmtImportFrom};
use crate::value::Value;

use super::{Execute, Flow};

/// Find, run and register the module `name`.
///
/// An already loaded module is returned as is unless `reload` is set, in
/// which case its source runs again into the same group.
pub(crate) fn load_module(
    interp: &mut Interpreter,
    name: &str,
    reload: bool,
) -> Result<GroupRef, EvalError> {
    if name.is_empty() || !name.split('.').all(is_member_name) {
        return Err(EvalError::ImportNotFound {
            name: name.to_string(),
        });
    }
    let existing = interp.symtable.module(name);
    if let Some(module) = &existing {
        if !reload {
            return Ok(module.clone());
        }
    }

    if let Some(path) = find_module_file(interp, name) {
        return exec_module(interp, name, &path, existing);
    }
    if let Some(native) = interp.native_modules.get(name).cloned() {
        debug!(module = name, "native module");
        interp.symtable.register_module(name, native.clone());
        return Ok(native);
    }
    existing.ok_or_else(|| EvalError::ImportNotFound {
        name: name.to_string(),
    })
}

fn find_module_file(interp: &Interpreter, name: &str) -> Option<PathBuf> {
    let file = format!("{}.{}", name, interp.ctx.module_extension);
    interp
        .symtable
        .search_path()
        .into_iter()
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}

fn exec_module(
    interp: &mut Interpreter,
    name: &str,
    path: &Path,
    existing: Option<GroupRef>,
) -> Result<GroupRef, EvalError> {
    let text = std::fs::read_to_string(path).map_err(|e| EvalError::ImportIo {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    debug!(module = name, path = %path.display(), "importing");

    let group = existing.clone().unwrap_or_else(|| GroupRef::new(name));
    let result = {
        let mut call = CallGuard::enter(interp)?;
        // Registered before running so that circular imports see the module
        call.symtable.register_module(name, group.clone());
        let mut guard = FrameGuard::enter(&mut *call, group.clone(), group.clone());
        guard.eval_source(&text, &path.display().to_string(), 1, false)
    };

    match result {
        Ok(_) => Ok(group),
        Err(err) => {
            match existing {
                Some(previous) => interp.symtable.register_module(name, previous),
                None => {
                    interp.symtable.unregister_module(name);
                }
            }
            Err(err)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Import statements
// ═══════════════════════════════════════════════════════════════════════

impl Execute for StmtImport {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        for alias in &self.names {
            let module = load_module(interp, &alias.name, false)?;
            let binding = alias.asname.as_deref().unwrap_or(&alias.name);
            interp.symtable.set_symbol(binding, Value::Group(module))?;
        }
        Ok(Flow::Normal)
    }
}

impl Execute for StmtImportFrom {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        let module = load_module(interp, &self.module, false)?;
        let target = interp.symtable.module_group().clone();
        for alias in &self.names {
            if alias.name == "*" {
                for (name, value) in module.members() {
                    if !name.starts_with('_') {
                        target.set(&name, value);
                    }
                }
                continue;
            }
            let value = module.get(&alias.name).ok_or_else(|| EvalError::ImportName {
                name: alias.name.clone(),
                module: self.module.clone(),
            })?;
            target.set(alias.asname.as_deref().unwrap_or(&alias.name), value);
        }
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use crate::{EvalContext, GroupRef, Interpreter, Value};
    use pretty_assertions::assert_eq;

    fn interp_in(dir: &tempfile::TempDir) -> Interpreter {
        Interpreter::with_context(EvalContext::default().search_dir(dir.path()))
    }

    #[test]
    fn test_import_script_module() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("optics.lar"), "focal = 2.5\ndef power():\n    return 1 / focal\nend\n").unwrap();
        let mut interp = interp_in(&dir);
        interp.eval("import optics").unwrap();
        assert_eq!(interp.eval("optics.power()").unwrap(), Value::Float(0.4));
        assert_eq!(interp.symtable().frame_depth(), 0);
    }

    #[test]
    fn test_from_import_alias() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("consts.lar"), "c = 3\nh = 6\n").unwrap();
        let mut interp = interp_in(&dir);
        interp.eval("from consts import c as speed, h").unwrap();
        assert_eq!(interp.eval("speed").unwrap(), Value::Int(3));
        assert_eq!(interp.eval("h").unwrap(), Value::Int(6));
        assert!(interp.eval("c").is_err());
    }

    #[test]
    fn test_failed_module_is_unregistered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.lar"), "x = 1\ny = undefined\n").unwrap();
        let mut interp = interp_in(&dir);
        let errs = interp.eval("import broken").unwrap_err();
        assert_eq!(errs.first().unwrap().line, 2);
        assert!(interp.symtable().module("broken").is_none());
        assert_eq!(interp.symtable().frame_depth(), 0);
    }

    #[test]
    fn test_native_module_fallback() {
        let mut interp = Interpreter::new();
        let native = GroupRef::new("detector");
        native.set("gain", Value::Int(4));
        interp.register_module("detector", native);
        assert_eq!(interp.eval("import detector\ndetector.gain").unwrap(), Value::Int(4));
    }

    #[test]
    fn test_missing_module() {
        let mut interp = Interpreter::new();
        let errs = interp.eval("import nowhere_to_be_found").unwrap_err();
        assert_eq!(errs.first().unwrap().exc_name, "ModuleNotFoundError");
    }
}
