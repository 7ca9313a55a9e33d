//! Evaluation context configuration

use std::path::PathBuf;

/// Environment variable holding extra module search directories.
pub const PATH_ENV: &str = "LARIX_PATH";

/// Configuration for an interpreter.
///
/// Controls recursion limits, where `import` looks for source files,
/// and a few convenience behaviors.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Maximum call depth (stack overflow protection)
    pub max_call_depth: usize,

    /// Directories searched for `<module>.<ext>` files, in order
    pub search_path: Vec<PathBuf>,

    /// Extra group names consulted for unqualified lookups
    pub search_groups: Vec<String>,

    /// Names allowed to use command syntax (`None` allows any name)
    pub valid_commands: Option<Vec<String>>,

    /// Extension of script modules, without the dot
    pub module_extension: String,

    /// Store all-numeric lists as arrays on assignment
    pub normalize_numeric_lists: bool,

    /// Whether to trace evaluation (for debugging)
    pub trace: bool,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            max_call_depth: 1000,
            search_path: vec![PathBuf::from(".")],
            search_groups: Vec::new(),
            valid_commands: None,
            module_extension: "lar".to_string(),
            normalize_numeric_lists: false,
            trace: false,
        }
    }
}

impl EvalContext {
    /// Create a new context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings plus any directories listed in `LARIX_PATH`.
    pub fn from_env() -> Self {
        let mut ctx = Self::default();
        if let Some(paths) = std::env::var_os(PATH_ENV) {
            for dir in std::env::split_paths(&paths) {
                if !dir.as_os_str().is_empty() && !ctx.search_path.contains(&dir) {
                    ctx.search_path.push(dir);
                }
            }
        }
        ctx
    }

    /// Create a context with a custom call depth limit.
    pub fn with_max_call_depth(max_depth: usize) -> Self {
        Self {
            max_call_depth: max_depth,
            ..Default::default()
        }
    }

    /// Append a directory to the module search path.
    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path.push(dir.into());
        self
    }

    /// Add a group name to consult for unqualified lookups.
    pub fn search_group(mut self, name: impl Into<String>) -> Self {
        self.search_groups.push(name.into());
        self
    }

    /// Allow command syntax only for `names`.
    pub fn commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_commands = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable numeric-list normalization.
    pub fn normalize_numeric_lists(mut self, on: bool) -> Self {
        self.normalize_numeric_lists = on;
        self
    }

    /// Enable or disable statement tracing.
    pub fn trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }
}
