//! Symbol table: hierarchical groups and scoped name resolution
//!
//! Unqualified names resolve through a fixed search order: the current
//! local group, the current module group, the configured search groups,
//! the core groups (`_builtin`, `_math`, `_sys`) and finally the root
//! (`_main`). The (local, module) pair is the current *frame*; procedure
//! calls and imports switch frames through [`FrameGuard`].

mod frame;
mod group;
mod math;
mod prelude;

pub use frame::{FrameGuard, FrameHost};
pub use group::{Group, GroupRef, Namespace, WeakGroup};
pub(crate) use prelude::{expect_count, expect_str, reject_keywords, sort_items};

use std::cell::RefCell;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::value::Value;

/// Name of the root group.
pub const TOP_GROUP: &str = "_main";

/// Core groups, in search order.
pub const CORE_GROUPS: [&str; 3] = ["_builtin", "_math", "_sys"];

/// `_sys` member holding the module search path.
const SYS_PATH: &str = "path";

/// `_sys` member holding the command-syntax whitelist.
const SYS_COMMANDS: &str = "valid_commands";

#[derive(Debug)]
struct SearchCache {
    local: GroupRef,
    module: GroupRef,
    resolved: Vec<Option<GroupRef>>,
    order: Vec<GroupRef>,
}

/// The session-wide namespace.
#[derive(Debug)]
pub struct SymbolTable {
    root: GroupRef,
    modules: IndexMap<String, GroupRef>,
    search_groups: Vec<String>,
    local: GroupRef,
    module: GroupRef,
    frames: Vec<(GroupRef, GroupRef)>,
    normalize_numeric_lists: bool,
    cache: RefCell<Option<SearchCache>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table with empty core groups.
    pub fn new() -> Self {
        let root = GroupRef::new(TOP_GROUP);
        let mut modules = IndexMap::new();
        modules.insert(TOP_GROUP.to_string(), root.clone());
        for name in CORE_GROUPS {
            let group = GroupRef::new(name);
            root.set(name, Value::Group(group.clone()));
            modules.insert(name.to_string(), group);
        }
        let mut table = Self {
            local: root.clone(),
            module: root.clone(),
            root,
            modules,
            search_groups: Vec::new(),
            frames: Vec::new(),
            normalize_numeric_lists: false,
            cache: RefCell::new(None),
        };
        table.set_search_path(vec![PathBuf::from(".")]);
        table.set_valid_commands(None);
        table
    }

    // ═══════════════════════════════════════════════════════════════════
    // Groups and modules
    // ═══════════════════════════════════════════════════════════════════

    /// The root (`_main`) group.
    pub fn root(&self) -> &GroupRef {
        &self.root
    }

    /// The current local group.
    pub fn local_group(&self) -> &GroupRef {
        &self.local
    }

    /// The current module group.
    pub fn module_group(&self) -> &GroupRef {
        &self.module
    }

    /// One of the core groups, by name.
    pub fn core_group(&self, name: &str) -> Option<GroupRef> {
        if CORE_GROUPS.contains(&name) {
            self.modules.get(name).cloned()
        } else {
            None
        }
    }

    /// A loaded module, by name.
    pub fn module(&self, name: &str) -> Option<GroupRef> {
        self.modules.get(name).cloned()
    }

    /// Names of all loaded modules.
    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Register (or replace) a loaded module.
    pub fn register_module(&mut self, name: &str, group: GroupRef) {
        self.modules.insert(name.to_string(), group);
    }

    /// Forget a loaded module.
    pub fn unregister_module(&mut self, name: &str) -> Option<GroupRef> {
        self.modules.shift_remove(name)
    }

    /// Create an empty group bound to `name` in the local group.
    pub fn new_group(&mut self, name: &str) -> Result<GroupRef, EvalError> {
        let leaf = name.rsplit('.').next().unwrap_or(name);
        let group = GroupRef::new(leaf);
        self.set_symbol(name, Value::Group(group.clone()))?;
        Ok(group)
    }

    /// Resolve `name` to a group.
    pub fn get_group(&self, name: &str) -> Result<GroupRef, EvalError> {
        match self.lookup(name, false)? {
            Value::Group(g) => Ok(g),
            _ => Err(EvalError::NotANamespace {
                name: name.to_string(),
            }),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Configuration
    // ═══════════════════════════════════════════════════════════════════

    /// Directories searched for script modules.
    ///
    /// Read from `_sys.path`, so scripts can edit the list directly;
    /// entries that are not strings are skipped.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.sys_value(SYS_PATH)
            .and_then(|value| string_items(&value))
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect()
    }

    /// Replace the module search path.
    pub fn set_search_path(&mut self, path: Vec<PathBuf>) {
        let items = path
            .iter()
            .map(|dir| Value::str(dir.to_string_lossy()))
            .collect();
        self.set_sys_value(SYS_PATH, Value::list(items));
    }

    /// Append a directory to the module search path.
    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let mut path = self.search_path();
        if !path.contains(&dir) {
            path.push(dir);
            self.set_search_path(path);
        }
    }

    /// Names allowed to use command syntax, from `_sys.valid_commands`.
    ///
    /// `None` (the default) lets any name use it.
    pub fn valid_commands(&self) -> Option<Vec<String>> {
        self.sys_value(SYS_COMMANDS)
            .and_then(|value| string_items(&value))
    }

    /// Restrict command syntax to `commands`, or lift the restriction.
    pub fn set_valid_commands(&mut self, commands: Option<Vec<String>>) {
        let value = match commands {
            Some(names) => Value::list(names.into_iter().map(Value::str).collect()),
            None => Value::None,
        };
        self.set_sys_value(SYS_COMMANDS, value);
    }

    fn sys_value(&self, name: &str) -> Option<Value> {
        self.core_group("_sys").and_then(|sys| sys.get(name))
    }

    fn set_sys_value(&self, name: &str, value: Value) {
        if let Some(sys) = self.core_group("_sys") {
            sys.set(name, value);
        }
    }

    /// Names of the extra search groups.
    pub fn search_groups(&self) -> &[String] {
        &self.search_groups
    }

    /// Add a group name to the search list (ignored if already present).
    pub fn add_search_group(&mut self, name: &str) {
        if !self.search_groups.iter().any(|g| g == name) {
            self.search_groups.push(name.to_string());
        }
    }

    /// Store all-numeric lists and tuples as arrays in `set_symbol`.
    pub fn set_normalize_numeric_lists(&mut self, on: bool) {
        self.normalize_numeric_lists = on;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Frames
    // ═══════════════════════════════════════════════════════════════════

    /// Push the current (local, module) pair.
    pub fn save_frame(&mut self) {
        self.frames.push((self.local.clone(), self.module.clone()));
    }

    /// Pop the most recently saved frame and make it current.
    ///
    /// Returns false if there was nothing to restore.
    pub fn restore_frame(&mut self) -> bool {
        match self.frames.pop() {
            Some((local, module)) => {
                self.local = local;
                self.module = module;
                true
            }
            None => false,
        }
    }

    /// Make (`local`, `module`) the current frame without saving.
    pub fn set_frame(&mut self, local: GroupRef, module: GroupRef) {
        self.local = local;
        self.module = module;
    }

    /// Number of saved frames.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Resolution
    // ═══════════════════════════════════════════════════════════════════

    /// The groups consulted for an unqualified name, in order.
    ///
    /// Search-group names are resolved on every call, so a name bound or
    /// rebound after it was added takes effect at once. The deduplicated
    /// order is rebuilt only when the frame or a resolved group changed.
    pub fn search_order(&self) -> Vec<GroupRef> {
        let resolved: Vec<Option<GroupRef>> = self
            .search_groups
            .iter()
            .map(String::as_str)
            .chain(CORE_GROUPS)
            .map(|name| self.resolve_group_name(name))
            .collect();

        if let Some(cache) = &*self.cache.borrow() {
            let same_groups = cache.resolved.len() == resolved.len()
                && cache.resolved.iter().zip(&resolved).all(|pair| match pair {
                    (Some(a), Some(b)) => a.ptr_eq(b),
                    (None, None) => true,
                    _ => false,
                });
            if same_groups && cache.local.ptr_eq(&self.local) && cache.module.ptr_eq(&self.module) {
                return cache.order.clone();
            }
        }

        let mut order: Vec<GroupRef> = Vec::new();
        let push = |g: &GroupRef, order: &mut Vec<GroupRef>| {
            if !order.iter().any(|o| o.ptr_eq(g)) {
                order.push(g.clone());
            }
        };
        push(&self.local, &mut order);
        push(&self.module, &mut order);
        for group in resolved.iter().flatten() {
            push(group, &mut order);
        }
        push(&self.root, &mut order);

        *self.cache.borrow_mut() = Some(SearchCache {
            local: self.local.clone(),
            module: self.module.clone(),
            resolved,
            order: order.clone(),
        });
        order
    }

    // Search-group names are module names or absolute paths from the root.
    fn resolve_group_name(&self, name: &str) -> Option<GroupRef> {
        if let Some(group) = self.modules.get(name) {
            return Some(group.clone());
        }
        let mut current = self.root.clone();
        for part in name.split('.') {
            match current.get(part) {
                Some(Value::Group(g)) => current = g,
                _ => return None,
            }
        }
        Some(current)
    }

    fn find_first(&self, name: &str) -> Option<(GroupRef, Value)> {
        if name == TOP_GROUP {
            return Some((self.root.clone(), Value::Group(self.root.clone())));
        }
        self.search_order()
            .into_iter()
            .find_map(|g| g.get(name).map(|v| (g, v)))
    }

    /// Look up a possibly dotted name.
    ///
    /// The first segment resolves through the search order; the rest walk
    /// group members. With `create`, missing intermediate segments become
    /// new groups and a missing final segment is bound to `None`.
    pub fn lookup(&self, name: &str, create: bool) -> Result<Value, EvalError> {
        let parts: Vec<&str> = name.split('.').collect();
        let first = parts[0];
        let (_, mut value) = self.find_first(first).ok_or_else(|| EvalError::NameNotFound {
            name: first.to_string(),
        })?;

        let mut path = first.to_string();
        for (i, part) in parts.iter().enumerate().skip(1) {
            let group = match &value {
                Value::Group(g) => g.clone(),
                _ => return Err(EvalError::NotANamespace { name: path }),
            };
            value = match group.get(part) {
                Some(v) => v,
                None if create => {
                    let fresh = if i + 1 < parts.len() {
                        Value::Group(GroupRef::new(*part))
                    } else {
                        Value::None
                    };
                    group.set(part, fresh.clone());
                    fresh
                }
                None => {
                    return Err(EvalError::NoMember {
                        member: part.to_string(),
                        owner: format!("'{}'", path),
                    })
                }
            };
            path.push('.');
            path.push_str(part);
        }
        Ok(value)
    }

    /// Look up a name without creating anything.
    pub fn get_symbol(&self, name: &str) -> Result<Value, EvalError> {
        self.lookup(name, false)
    }

    /// Does `name` resolve?
    pub fn has_symbol(&self, name: &str) -> bool {
        self.lookup(name, false).is_ok()
    }

    /// Bind a possibly dotted name, relative to the local group.
    ///
    /// Missing intermediate groups are created; an intermediate that
    /// exists but is not a group is an error.
    pub fn set_symbol(&mut self, name: &str, value: Value) -> Result<Value, EvalError> {
        let parts: Vec<&str> = name.split('.').collect();
        if let Some(bad) = parts.iter().find(|p| !is_member_name(p)) {
            return Err(EvalError::Value(format!("invalid symbol name '{}'", bad)));
        }
        let (child, parents) = match parts.split_last() {
            Some(split) => split,
            None => return Err(EvalError::Value("empty symbol name".to_string())),
        };

        let mut group = self.local.clone();
        for part in parents {
            group = match group.get(part) {
                Some(Value::Group(g)) => g,
                Some(_) => {
                    return Err(EvalError::NotANamespace {
                        name: part.to_string(),
                    })
                }
                None => {
                    let fresh = GroupRef::new(*part);
                    group.set(part, Value::Group(fresh.clone()));
                    fresh
                }
            };
        }

        let value = self.normalize(value);
        group.set(child, value.clone());
        Ok(value)
    }

    pub(crate) fn normalize(&self, value: Value) -> Value {
        if self.normalize_numeric_lists && value.is_numeric_sequence() {
            if let Ok(items) = value.to_f64_vec() {
                return Value::array(items);
            }
        }
        value
    }

    /// Remove a binding.
    ///
    /// A plain name must be bound directly in the local or module group;
    /// names visible only through a search group cannot be deleted. A
    /// dotted name removes the final member from its parent group.
    pub fn delete(&mut self, name: &str) -> Result<Value, EvalError> {
        if let Some((parent, child)) = name.rsplit_once('.') {
            let group = self.get_group(parent)?;
            return group.delete(child).ok_or_else(|| EvalError::NoMember {
                member: child.to_string(),
                owner: format!("'{}'", parent),
            });
        }
        if let Some(v) = self.local.delete(name) {
            return Ok(v);
        }
        if let Some(v) = self.module.delete(name) {
            return Ok(v);
        }
        if self.find_first(name).is_some() {
            Err(EvalError::NotDeletable {
                name: name.to_string(),
            })
        } else {
            Err(EvalError::NameNotFound {
                name: name.to_string(),
            })
        }
    }

    /// Dotted path of the group an unqualified name resolves through,
    /// e.g. `_math.sqrt`.
    pub fn parent_path(&self, name: &str) -> Option<String> {
        let (first, rest) = match name.split_once('.') {
            Some((f, r)) => (f, Some(r)),
            None => (name, None),
        };
        let (group, _) = self.find_first(first)?;
        let mut path = if first == TOP_GROUP {
            first.to_string()
        } else {
            format!("{}.{}", group.name(), first)
        };
        if let Some(rest) = rest {
            self.lookup(name, false).ok()?;
            path.push('.');
            path.push_str(rest);
        }
        Some(path)
    }
}

/// The strings in a list or tuple; `None` for anything else.
fn string_items(value: &Value) -> Option<Vec<String>> {
    fn strings(items: &[Value]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    }
    match value {
        Value::List(items) => Some(strings(&items.borrow())),
        Value::Tuple(items) => Some(strings(items)),
        _ => None,
    }
}

/// A single identifier segment that may be bound in a group.
pub fn is_member_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.starts_with("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_core_groups_exist() {
        let table = SymbolTable::new();
        for name in CORE_GROUPS {
            assert!(table.core_group(name).is_some());
            assert!(table.root().has(name));
        }
        assert!(table.module(TOP_GROUP).is_some());
    }

    #[test]
    fn test_search_order_defaults() {
        let table = SymbolTable::new();
        let names: Vec<String> = table.search_order().iter().map(GroupRef::name).collect();
        assert_eq!(names, vec!["_main", "_builtin", "_math", "_sys"]);
    }

    #[test]
    fn test_search_order_with_search_group() {
        let mut table = SymbolTable::new();
        table.new_group("plugins").unwrap();
        table.add_search_group("plugins");
        table.add_search_group("plugins");
        let names: Vec<String> = table.search_order().iter().map(GroupRef::name).collect();
        assert_eq!(names, vec!["_main", "plugins", "_builtin", "_math", "_sys"]);
    }

    #[test]
    fn test_search_order_cache_tracks_frame() {
        let mut table = SymbolTable::new();
        let before = table.search_order();
        let local = GroupRef::new("f");
        table.save_frame();
        table.set_frame(local.clone(), table.root().clone());
        let during = table.search_order();
        assert!(during[0].ptr_eq(&local));
        assert_eq!(during.len(), before.len() + 1);
        table.restore_frame();
        assert!(table.search_order()[0].ptr_eq(table.root()));
    }

    #[test]
    fn test_search_group_bound_after_it_was_added() {
        let mut table = SymbolTable::new();
        table.add_search_group("plugins");
        assert_eq!(table.search_order().len(), 4);

        let first = table.new_group("plugins").unwrap();
        first.set("gain", Value::Int(7));
        assert_eq!(table.get_symbol("gain").unwrap(), Value::Int(7));

        let second = table.new_group("plugins").unwrap();
        second.set("gain", Value::Int(2));
        assert_eq!(table.get_symbol("gain").unwrap(), Value::Int(2));
        assert!(table.search_order()[1].ptr_eq(&second));

        table.delete("plugins").unwrap();
        assert!(table.get_symbol("gain").is_err());
    }

    #[test]
    fn test_lookup_create_autovivifies() {
        let table = SymbolTable::new();
        table.root().set("a", Value::Group(GroupRef::new("a")));
        let v = table.lookup("a.b.c", true).unwrap();
        assert_eq!(v, Value::None);
        assert!(matches!(table.lookup("a.b", false).unwrap(), Value::Group(_)));
    }

    #[test]
    fn test_lookup_missing_member() {
        let table = SymbolTable::new();
        let err = table.lookup("_math.nothing", false).unwrap_err();
        assert!(matches!(err, EvalError::NoMember { ref member, .. } if member == "nothing"));
    }

    #[test]
    fn test_lookup_through_non_group() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Value::Int(1)).unwrap();
        let err = table.lookup("x.y", false).unwrap_err();
        assert!(matches!(err, EvalError::NotANamespace { .. }));
    }

    #[test]
    fn test_set_symbol_dotted_creates_groups() {
        let mut table = SymbolTable::new();
        table.set_symbol("g.h.x", Value::Int(3)).unwrap();
        assert_eq!(table.get_symbol("g.h.x").unwrap(), Value::Int(3));
        assert_eq!(table.get_group("g.h").unwrap().name(), "h");
    }

    #[test]
    fn test_set_symbol_rejects_non_group_parent() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Value::Int(1)).unwrap();
        assert!(table.set_symbol("x.y", Value::Int(2)).is_err());
        assert!(table.set_symbol("bad-name", Value::Int(2)).is_err());
        assert!(table.set_symbol("__name__", Value::Int(2)).is_err());
    }

    #[test]
    fn test_main_refers_to_root() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Value::Int(9)).unwrap();
        assert_eq!(table.get_symbol("_main.x").unwrap(), Value::Int(9));
    }

    #[test]
    fn test_normalize_numeric_lists() {
        let mut table = SymbolTable::new();
        table.set_normalize_numeric_lists(true);
        let v = table
            .set_symbol("a", Value::list(vec![Value::Int(1), Value::Float(2.0)]))
            .unwrap();
        assert_eq!(v, Value::array(vec![1.0, 2.0]));
        let g = table.set_symbol("g", Value::Group(GroupRef::new("g"))).unwrap();
        assert!(matches!(g, Value::Group(_)));
    }

    #[test]
    fn test_delete_rules() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Value::Int(1)).unwrap();
        table.set_symbol("g.y", Value::Int(2)).unwrap();
        table
            .core_group("_math")
            .unwrap()
            .set("pi", Value::Float(3.14));

        assert_eq!(table.delete("x").unwrap(), Value::Int(1));
        assert_eq!(table.delete("g.y").unwrap(), Value::Int(2));
        assert!(matches!(
            table.delete("pi"),
            Err(EvalError::NotDeletable { .. })
        ));
        assert!(matches!(
            table.delete("nope"),
            Err(EvalError::NameNotFound { .. })
        ));
        assert!(table.delete("_math.pi").is_ok());
    }

    #[test]
    fn test_parent_path() {
        let mut table = SymbolTable::new();
        table.core_group("_math").unwrap().set("sqrt", Value::None);
        table.set_symbol("x", Value::Int(1)).unwrap();
        assert_eq!(table.parent_path("sqrt").as_deref(), Some("_math.sqrt"));
        assert_eq!(table.parent_path("x").as_deref(), Some("_main.x"));
        assert_eq!(table.parent_path("missing"), None);
    }

    #[test]
    fn test_restore_without_save_is_harmless() {
        let mut table = SymbolTable::new();
        assert!(!table.restore_frame());
        assert_eq!(table.frame_depth(), 0);
    }
}
