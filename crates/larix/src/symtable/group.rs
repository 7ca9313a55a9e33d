//! Groups: ordered, named attribute containers

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::value::Value;

/// Explicit namespace capability.
///
/// Everything that resolves names through a group goes through these five
/// operations; nothing discovers members by other means.
pub trait Namespace {
    /// Value bound to `name`, if any.
    fn get(&self, name: &str) -> Option<Value>;

    /// Bind `name` to `value`, replacing any previous binding.
    fn set(&mut self, name: &str, value: Value);

    /// Is `name` bound?
    fn has(&self, name: &str) -> bool;

    /// Remove `name`, returning its value.
    fn delete(&mut self, name: &str) -> Option<Value>;

    /// Bound names, in insertion order.
    fn keys(&self) -> Vec<String>;
}

/// An ordered mapping from attribute name to value.
#[derive(Debug, Clone, Default)]
pub struct Group {
    name: String,
    members: IndexMap<String, Value>,
}

impl Group {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: IndexMap::new(),
        }
    }

    /// The group's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over (name, value) pairs in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.members.iter()
    }

    /// Wrap in a shared reference.
    pub fn into_ref(self) -> GroupRef {
        GroupRef(Rc::new(RefCell::new(self)))
    }
}

impl Namespace for Group {
    fn get(&self, name: &str) -> Option<Value> {
        self.members.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) {
        self.members.insert(name.to_string(), value);
    }

    fn has(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    fn delete(&mut self, name: &str) -> Option<Value> {
        self.members.shift_remove(name)
    }

    fn keys(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }
}

/// Shared handle to a [`Group`].
///
/// Groups are shared between their parent, the frame stack, the module
/// registry and any procedure defined in them. Borrows are released before
/// each method returns, so callers never hold a group borrow across
/// evaluation.
#[derive(Clone, Default)]
pub struct GroupRef(Rc<RefCell<Group>>);

impl GroupRef {
    /// Create a new, empty, shared group.
    pub fn new(name: impl Into<String>) -> Self {
        Group::new(name).into_ref()
    }

    /// Display name.
    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    /// Value bound to `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name)
    }

    /// Bind `name`.
    pub fn set(&self, name: &str, value: Value) {
        self.0.borrow_mut().set(name, value);
    }

    /// Is `name` bound?
    pub fn has(&self, name: &str) -> bool {
        self.0.borrow().has(name)
    }

    /// Remove `name`.
    pub fn delete(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().delete(name)
    }

    /// Member names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys()
    }

    /// Snapshot of all members.
    pub fn members(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// True when the group has no members.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Same underlying group?
    pub fn ptr_eq(&self, other: &GroupRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Non-owning handle.
    pub fn downgrade(&self) -> WeakGroup {
        WeakGroup(Rc::downgrade(&self.0))
    }

    /// Shallow copy: a new group with the same bindings.
    pub fn shallow_copy(&self) -> GroupRef {
        self.0.borrow().clone().into_ref()
    }
}

impl fmt::Debug for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Members may refer back to this group, so only the name is shown
        write!(f, "GroupRef({})", self.name())
    }
}

/// Weak handle to a group, for bindings that must not keep a scope alive.
#[derive(Clone, Debug, Default)]
pub struct WeakGroup(Weak<RefCell<Group>>);

impl WeakGroup {
    /// The group, if it still exists.
    pub fn upgrade(&self) -> Option<GroupRef> {
        self.0.upgrade().map(GroupRef)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_members_keep_insertion_order() {
        let g = GroupRef::new("g");
        g.set("b", Value::Int(2));
        g.set("a", Value::Int(1));
        g.set("b", Value::Int(3));
        assert_eq!(g.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(g.get("b"), Some(Value::Int(3)));
    }

    #[test]
    fn test_delete() {
        let g = GroupRef::new("g");
        g.set("x", Value::Int(1));
        assert_eq!(g.delete("x"), Some(Value::Int(1)));
        assert!(!g.has("x"));
        assert_eq!(g.delete("x"), None);
    }

    #[test]
    fn test_shared_between_handles() {
        let g = GroupRef::new("g");
        let alias = g.clone();
        alias.set("x", Value::Int(5));
        assert!(g.has("x"));
        assert!(g.ptr_eq(&alias));
        assert!(!g.ptr_eq(&g.shallow_copy()));
    }

    #[test]
    fn test_weak_handle_expires() {
        let weak = {
            let g = GroupRef::new("tmp");
            g.downgrade()
        };
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_namespace_trait_on_group() {
        let mut g = Group::new("plain");
        g.set("k", Value::Bool(true));
        assert!(g.has("k"));
        assert_eq!(g.keys(), vec!["k".to_string()]);
        assert_eq!(g.delete("k"), Some(Value::Bool(true)));
        assert!(g.is_empty());
    }
}
