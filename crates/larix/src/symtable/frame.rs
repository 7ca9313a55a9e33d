//! RAII frame guard for automatic frame restoration

use super::{GroupRef, SymbolTable};

/// Anything that owns a symbol table whose frames can be switched.
pub trait FrameHost {
    /// The symbol table whose frame stack is managed.
    fn symbols(&mut self) -> &mut SymbolTable;
}

impl FrameHost for SymbolTable {
    fn symbols(&mut self) -> &mut SymbolTable {
        self
    }
}

/// RAII guard that saves the current frame, installs a new one, and
/// restores the saved frame when dropped.
///
/// Procedure calls and module imports run their bodies through this guard,
/// so the frame stack is balanced on every exit path.
///
/// # Example
///
/// ```
/// use larix::{GroupRef, SymbolTable, Value};
///
/// let mut table = SymbolTable::new();
/// let local = GroupRef::new("call");
/// {
///     let mut guard = table.frame_guard(local.clone(), local.clone());
///     guard.set_symbol("y", Value::Int(2)).unwrap();
/// }
/// // guard dropped, previous frame restored, y lived only in `local`
/// assert!(table.get_symbol("y").is_err());
/// assert!(local.has("y"));
/// ```
pub struct FrameGuard<'a, H: FrameHost> {
    host: &'a mut H,
}

impl<'a, H: FrameHost> FrameGuard<'a, H> {
    /// Push the current frame and make (`local`, `module`) current.
    pub fn enter(host: &'a mut H, local: GroupRef, module: GroupRef) -> Self {
        let table = host.symbols();
        table.save_frame();
        table.set_frame(local, module);
        tracing::debug!(depth = table.frame_depth(), "frame pushed");
        FrameGuard { host }
    }
}

impl SymbolTable {
    /// Create a frame guard over this table.
    pub fn frame_guard(&mut self, local: GroupRef, module: GroupRef) -> FrameGuard<'_, SymbolTable> {
        FrameGuard::enter(self, local, module)
    }
}

impl<'a, H: FrameHost> Drop for FrameGuard<'a, H> {
    fn drop(&mut self) {
        let table = self.host.symbols();
        table.restore_frame();
        tracing::debug!(depth = table.frame_depth(), "frame popped");
    }
}

impl<'a, H: FrameHost> std::ops::Deref for FrameGuard<'a, H> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        self.host
    }
}

impl<'a, H: FrameHost> std::ops::DerefMut for FrameGuard<'a, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_frame_guard_pushes_frame() {
        let mut table = SymbolTable::new();
        let initial = table.frame_depth();
        {
            let g = GroupRef::new("f");
            let guard = table.frame_guard(g.clone(), g);
            assert_eq!(guard.frame_depth(), initial + 1);
        }
        assert_eq!(table.frame_depth(), initial);
    }

    #[test]
    fn test_frame_guard_restores_groups() {
        let mut table = SymbolTable::new();
        let root = table.root().clone();
        {
            let local = GroupRef::new("f");
            let guard = table.frame_guard(local.clone(), root.clone());
            assert!(guard.local_group().ptr_eq(&local));
        }
        assert!(table.local_group().ptr_eq(&root));
        assert!(table.module_group().ptr_eq(&root));
    }

    #[test]
    fn test_frame_guard_local_shadows_module() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Value::Int(1)).unwrap();
        let module = table.root().clone();
        {
            let mut guard = table.frame_guard(GroupRef::new("f"), module);
            guard.set_symbol("x", Value::Int(2)).unwrap();
            assert_eq!(guard.get_symbol("x").unwrap(), Value::Int(2));
        }
        assert_eq!(table.get_symbol("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_nested_guards() {
        let mut table = SymbolTable::new();
        let root = table.root().clone();
        {
            let mut outer = table.frame_guard(GroupRef::new("a"), root.clone());
            {
                let inner = outer.frame_guard(GroupRef::new("b"), root.clone());
                assert_eq!(inner.frame_depth(), 2);
            }
            assert_eq!(outer.frame_depth(), 1);
        }
        assert_eq!(table.frame_depth(), 0);
    }
}
