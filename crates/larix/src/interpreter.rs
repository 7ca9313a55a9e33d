//! The interpreter: one symbol table, one error list, one frame stack.
//!
//! [`Interpreter`] owns everything a running script touches and is threaded
//! explicitly through every evaluation function. Text goes through the
//! block preprocessor, then the parser, then the evaluator; failures are
//! accumulated as [`ErrorRecord`]s instead of unwinding.

use std::cell::RefCell;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::context::EvalContext;
use crate::error::{ErrorRecord, EvalError, EvalErrors, SyntaxError};
use crate::eval::{self, exec_stmt, Evaluate, Flow};
use crate::input::InputText;
use crate::symtable::{FrameGuard, FrameHost, GroupRef, SymbolTable};
use crate::syntax::{self, Loc, Source, Stmt};
use crate::value::{BuiltinFn, CallArgs, ExceptionValue, Value};

/// An in-memory `print` sink that can be read back.
///
/// Clones share the same buffer, so one clone can be handed to
/// [`Interpreter::set_output`] and the other kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Discard everything written so far.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A scripting session.
///
/// Not thread-safe: use one interpreter per concurrent script.
pub struct Interpreter {
    pub(crate) symtable: SymbolTable,
    pub(crate) ctx: EvalContext,
    pub(crate) errors: Vec<ErrorRecord>,
    pub(crate) output: Box<dyn Write>,
    pub(crate) call_depth: usize,
    pub(crate) source: Rc<Source>,
    pub(crate) native_modules: IndexMap<String, GroupRef>,
    /// Exceptions being handled by enclosing `except` clauses, innermost last
    pub(crate) handling: Vec<Rc<ExceptionValue>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("ctx", &self.ctx)
            .field("errors", &self.errors.len())
            .field("call_depth", &self.call_depth)
            .finish_non_exhaustive()
    }
}

impl FrameHost for Interpreter {
    fn symbols(&mut self) -> &mut SymbolTable {
        &mut self.symtable
    }
}

impl Interpreter {
    /// Create an interpreter with default settings.
    pub fn new() -> Self {
        Self::with_context(EvalContext::default())
    }

    /// Create an interpreter from a configuration.
    pub fn with_context(ctx: EvalContext) -> Self {
        let mut symtable = SymbolTable::with_prelude();
        symtable.set_search_path(ctx.search_path.clone());
        symtable.set_valid_commands(ctx.valid_commands.clone());
        for group in &ctx.search_groups {
            symtable.add_search_group(group);
        }
        symtable.set_normalize_numeric_lists(ctx.normalize_numeric_lists);
        Self {
            symtable,
            ctx,
            errors: Vec::new(),
            output: Box::new(io::stdout()),
            call_depth: 0,
            source: Rc::new(Source::new("<stdin>", "", 1)),
            native_modules: IndexMap::new(),
            handling: Vec::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Collaborator API
    // ═══════════════════════════════════════════════════════════════════

    /// Preprocess and parse `text` without running it.
    pub fn compile(&self, text: &str) -> Result<Vec<Stmt>, SyntaxError> {
        let mut input = self.new_input();
        input.put(text, "<stdin>", 1)?;
        input.finish().map_err(|e| {
            let mut err = SyntaxError::new(e.reason).at(e.line, 0);
            err.filename = e.filename;
            err
        })?;

        let mut program = Vec::new();
        while let Some(block) = input.get() {
            let source = Source::new(&block.filename, &block.raw, block.line);
            match syntax::parse_program(&block.text) {
                Ok(stmts) => program.extend(stmts),
                Err(err) => return Err(locate_syntax(err, &source)),
            }
        }
        Ok(program)
    }

    /// Run `text` and return the value of its final expression statement.
    ///
    /// Each complete block runs even if an earlier one failed; every
    /// failure is returned, in order.
    #[tracing::instrument(skip(self, text), fields(bytes = text.len()))]
    pub fn eval(&mut self, text: &str) -> Result<Value, EvalErrors> {
        self.errors.clear();
        let result = self.guarded(|interp| interp.eval_source(text, "<stdin>", 1, true));
        self.finish_public(result)
    }

    /// Run a script file in the current frame.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<Value, EvalErrors> {
        self.errors.clear();
        let result = self.guarded(|interp| interp.exec_file(path.as_ref()));
        self.finish_public(result)
    }

    /// Resolve a possibly dotted name, evaluating a defined variable.
    pub fn get_symbol(&mut self, name: &str) -> Result<Value, EvalErrors> {
        self.errors.clear();
        let result = self.guarded(|interp| {
            let value = interp.symtable.get_symbol(name)?;
            interp.read_binding(value)
        });
        self.finish_public(result)
    }

    /// Bind a possibly dotted name in the current local group.
    pub fn set_symbol(&mut self, name: &str, value: impl Into<Value>) -> Result<Value, EvalError> {
        self.symtable.set_symbol(name, value.into())
    }

    /// Import a module by name, re-running its source when `reload` is set.
    #[tracing::instrument(skip(self))]
    pub fn import_module(&mut self, name: &str, reload: bool) -> Result<GroupRef, EvalErrors> {
        self.errors.clear();
        let result = self.guarded(|interp| interp.load_module(name, reload));
        self.finish_public(result)
    }

    /// A preprocessor honoring the current `_sys.valid_commands`.
    fn new_input(&self) -> InputText {
        match self.symtable.valid_commands() {
            Some(commands) => InputText::new().with_commands(commands),
            None => InputText::new(),
        }
    }

    /// Expose a host function at `path`, e.g. `"scan.move"`.
    ///
    /// Errors returned by `func` surface to scripts as host errors, except
    /// a [`ScriptError`](crate::ScriptError), which raises the exception
    /// class it names. A panic in `func` is caught and recorded as a host
    /// error.
    pub fn register_fn<F>(&mut self, path: &str, arity: i32, func: F) -> Result<(), EvalError>
    where
        F: Fn(CallArgs) -> anyhow::Result<Value> + 'static,
    {
        let name = path.rsplit('.').next().unwrap_or(path);
        let builtin = BuiltinFn::new(name, arity, move |_, args| {
            let func = &func;
            match panic::catch_unwind(AssertUnwindSafe(move || func(args))) {
                Ok(result) => result.map_err(EvalError::from_host),
                Err(payload) => Err(EvalError::from_panic(payload)),
            }
        });
        self.symtable.set_symbol(path, Value::Builtin(builtin))?;
        Ok(())
    }

    /// Provide a native module, used by `import` when no script is found.
    pub fn register_module(&mut self, name: &str, group: GroupRef) {
        self.native_modules.insert(name.to_string(), group);
    }

    /// Errors recorded by the most recent top-level call.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Redirect `print` output.
    pub fn set_output(&mut self, output: impl Write + 'static) {
        self.output = Box::new(output);
    }

    /// Consult `name` for unqualified lookups, after the current frame.
    pub fn add_search_group(&mut self, name: &str) {
        self.symtable.add_search_group(name);
    }

    /// Append a directory to the module search path.
    pub fn add_search_path(&mut self, dir: impl Into<std::path::PathBuf>) {
        self.symtable.add_search_path(dir);
    }

    /// The symbol table.
    pub fn symtable(&self) -> &SymbolTable {
        &self.symtable
    }

    /// The symbol table, mutably.
    pub fn symtable_mut(&mut self) -> &mut SymbolTable {
        &mut self.symtable
    }

    /// The configuration this interpreter was built with.
    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Call any callable value with already evaluated arguments.
    pub fn call_value(&mut self, func: &Value, args: CallArgs) -> Result<Value, EvalError> {
        eval::call::call_value(self, func, args)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Running source
    // ═══════════════════════════════════════════════════════════════════

    /// Preprocess `text` and run each block it produces.
    ///
    /// In independent mode a failing block does not stop later ones;
    /// otherwise (files and modules) the first failure ends the run.
    pub(crate) fn eval_source(
        &mut self,
        text: &str,
        filename: &str,
        first_line: usize,
        independent: bool,
    ) -> Result<Value, EvalError> {
        let mut input = self.new_input();
        if let Err(err) = input.put(text, filename, first_line) {
            self.errors.push(ErrorRecord::from_syntax(&err));
            return Err(EvalError::Reported);
        }
        if let Err(err) = input.finish() {
            self.errors.push(ErrorRecord::from_incomplete(&err));
            return Err(EvalError::Reported);
        }

        let saved = self.source.clone();
        let mut result = Ok(Value::None);
        while let Some(block) = input.get() {
            self.source = Rc::new(Source::new(&block.filename, &block.raw, block.line));
            match self.run_block(&block.text) {
                Ok(value) => result = Ok(value),
                Err(err) => {
                    result = Err(err);
                    if !independent {
                        break;
                    }
                }
            }
        }
        self.source = saved;
        result
    }

    // Stops at the first failing statement.
    fn run_block(&mut self, text: &str) -> Result<Value, EvalError> {
        let program = match syntax::parse_program(text) {
            Ok(program) => program,
            Err(err) => {
                let located = locate_syntax(err, &self.source);
                self.errors.push(ErrorRecord::from_syntax(&located));
                return Err(EvalError::Reported);
            }
        };

        let mut last = Value::None;
        for stmt in &program {
            match stmt {
                Stmt::Expr(expr) => match expr.value.eval(self) {
                    Ok(value) => last = value,
                    Err(err) => return Err(self.record(err, "Expr", expr.loc)),
                },
                other => {
                    last = Value::None;
                    if matches!(exec_stmt(other, self), Flow::Error) {
                        return Err(EvalError::Reported);
                    }
                }
            }
        }
        Ok(last)
    }

    /// Run a script file in the current frame.
    pub(crate) fn exec_file(&mut self, path: &Path) -> Result<Value, EvalError> {
        let text = std::fs::read_to_string(path).map_err(|e| EvalError::ImportIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "running file");
        self.eval_source(&text, &path.display().to_string(), 1, false)
    }

    /// Find, run and register a module.
    pub(crate) fn load_module(&mut self, name: &str, reload: bool) -> Result<GroupRef, EvalError> {
        eval::import::load_module(self, name, reload)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Evaluation support
    // ═══════════════════════════════════════════════════════════════════

    /// Resolve a binding to the value a reader sees.
    ///
    /// Defined variables are evaluated against the scope they were
    /// declared in; every other value is returned unchanged.
    pub fn read_binding(&mut self, value: Value) -> Result<Value, EvalError> {
        let dv = match value {
            Value::DefinedVariable(dv) => dv,
            other => return Ok(other),
        };
        let expr = dv.compiled()?;
        let (local, module) = dv.scope().map_err(|err| {
            warn!(name = %dv.name, "defined variable outlived its scope");
            err
        })?;

        let source = Source::new(format!("<def {}>", dv.name), dv.expression(), 1);
        let mut call = CallGuard::with_source(self, Rc::new(source))?;
        let mut guard = FrameGuard::enter(&mut *call, local, module);
        expr.eval(&mut guard)
    }

    /// Write `text` to the `print` sink.
    pub(crate) fn write_output(&mut self, text: &str) -> Result<(), EvalError> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|()| self.output.flush())
            .map_err(|e| EvalError::from_host(e.into()))
    }

    /// Run a top-level entry point, turning a panic into a host error.
    ///
    /// Frames and call depth unwind through their guards; the current
    /// source and the handled-exception stack are put back here.
    fn guarded<T>(
        &mut self,
        run: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        let source = Rc::clone(&self.source);
        let handling = self.handling.len();
        match panic::catch_unwind(AssertUnwindSafe(|| run(&mut *self))) {
            Ok(result) => result,
            Err(payload) => {
                warn!("evaluation panicked");
                self.source = source;
                self.handling.truncate(handling);
                Err(EvalError::from_panic(payload))
            }
        }
    }

    /// Turn `err` into an error record located at `loc` in the current
    /// source, and return the `Reported` marker.
    ///
    /// Errors that were already recorded pass through untouched.
    pub(crate) fn record(&mut self, err: EvalError, node: &'static str, loc: Loc) -> EvalError {
        if matches!(err, EvalError::Reported) {
            return err;
        }
        let payload = match &err {
            EvalError::Host { payload, .. } => payload.clone(),
            _ => None,
        };
        let exc = err.to_exception();
        let record = ErrorRecord {
            kind: err.kind(),
            exc_name: exc.kind.clone(),
            message: exc.message.clone(),
            node,
            text: self.source.line_text(loc.line).to_string(),
            filename: self.source.filename.clone(),
            line: self.source.line(loc.line),
            col: loc.col,
            payload,
        };
        debug!(
            kind = %record.kind,
            file = %record.filename,
            line = record.line,
            node,
            "{}",
            record.message
        );
        if let Some(sys) = self.symtable.core_group("_sys") {
            sys.set("last_error", Value::Exception(exc));
        }
        self.errors.push(record);
        EvalError::Reported
    }

    fn finish_public<T>(&mut self, result: Result<T, EvalError>) -> Result<T, EvalErrors> {
        match result {
            Ok(value) if self.errors.is_empty() => Ok(value),
            Ok(_) => Err(EvalErrors(self.errors.clone())),
            Err(err) => {
                self.record(err, "Module", Loc::default());
                Err(EvalErrors(self.errors.clone()))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Call Depth
// ═══════════════════════════════════════════════════════════════════════

/// RAII guard counting one nested call against `max_call_depth`.
///
/// Optionally installs a different current source; both the depth and
/// the source are restored when the guard drops.
pub(crate) struct CallGuard<'a> {
    interp: &'a mut Interpreter,
    saved_source: Option<Rc<Source>>,
}

impl<'a> CallGuard<'a> {
    /// Count a call, failing with `RecursionLimit` past the limit.
    pub(crate) fn enter(interp: &'a mut Interpreter) -> Result<Self, EvalError> {
        if interp.call_depth >= interp.ctx.max_call_depth {
            return Err(EvalError::RecursionLimit {
                depth: interp.ctx.max_call_depth,
            });
        }
        interp.call_depth += 1;
        Ok(CallGuard {
            interp,
            saved_source: None,
        })
    }

    /// Count a call and make `source` current for its duration.
    pub(crate) fn with_source(
        interp: &'a mut Interpreter,
        source: Rc<Source>,
    ) -> Result<Self, EvalError> {
        let mut guard = Self::enter(interp)?;
        guard.saved_source = Some(std::mem::replace(&mut guard.interp.source, source));
        Ok(guard)
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if let Some(source) = self.saved_source.take() {
            self.interp.source = source;
        }
        self.interp.call_depth = self.interp.call_depth.saturating_sub(1);
    }
}

impl Deref for CallGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interp
    }
}

impl DerefMut for CallGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interp
    }
}

/// Map a block-relative syntax error back onto the file it came from.
fn locate_syntax(mut err: SyntaxError, source: &Source) -> SyntaxError {
    if err.text.is_empty() {
        err.text = source.line_text(err.line).to_string();
    }
    err.line = source.line(err.line);
    err.filename = source.filename.clone();
    err
}
