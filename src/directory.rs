//! Name directory for role managers and access controllers.
//!
//! A token only carries `(manager, role)` names, so verification needs a place to
//! turn those names back into live objects. That place is a `Directory`: build one
//! at startup and hand it to everything that creates managers or controllers.
//! Tests build their own so names never collide across cases.
//! `Directory::global()` is a lazily created process-wide instance for
//! applications that prefer not to thread one through.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{AccessError, AccessResult, NameKind};
use crate::role::{Role, RoleManager, RoleRef};

#[derive(Default)]
struct DirectoryInner {
    managers: RwLock<HashMap<String, RoleManager>>,
    controllers: RwLock<HashSet<String>>,
}

#[derive(Clone, Default)]
pub struct Directory {
    inner: Arc<DirectoryInner>,
}

static GLOBAL: Lazy<Directory> = Lazy::new(Directory::new);

impl Directory {
    pub fn new() -> Self { Self::default() }

    pub fn global() -> &'static Directory { &GLOBAL }

    /// Create and register an empty role manager. Fails if the name is taken.
    pub fn create_manager(&self, name: &str) -> AccessResult<RoleManager> {
        let mut map = self.inner.managers.write();
        if map.contains_key(name) {
            return Err(AccessError::NameConflict { kind: NameKind::Manager, name: name.to_string() });
        }
        let manager = RoleManager::new(name);
        map.insert(name.to_string(), manager.clone());
        tracing::info!(target: "rolegate::directory", manager = name, "role manager registered");
        Ok(manager)
    }

    pub fn resolve_manager(&self, name: &str) -> AccessResult<RoleManager> {
        self.inner
            .managers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::ManagerNotFound(name.to_string()))
    }

    /// Bind a role reference to the live role it names.
    pub fn resolve_role(&self, reference: &RoleRef) -> AccessResult<Role> {
        self.resolve_manager(&reference.manager)?.resolve_role(&reference.name)
    }

    /// Reserve a controller name. Controllers derive their cookie name from it,
    /// so two controllers sharing a name would fight over one cookie.
    pub(crate) fn claim_controller_name(&self, name: &str) -> AccessResult<()> {
        if !self.inner.controllers.write().insert(name.to_string()) {
            return Err(AccessError::NameConflict { kind: NameKind::Controller, name: name.to_string() });
        }
        Ok(())
    }

    pub fn has_controller(&self, name: &str) -> bool {
        self.inner.controllers.read().contains(name)
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut managers: Vec<String> = self.inner.managers.read().keys().cloned().collect();
        managers.sort();
        f.debug_struct("Directory")
            .field("managers", &managers)
            .field("controllers", &self.inner.controllers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_names_are_unique() {
        let dir = Directory::new();
        let m = dir.create_manager("site").unwrap();
        assert!(dir.resolve_manager("site").unwrap().same_as(&m));

        let err = dir.create_manager("site").unwrap_err();
        assert!(matches!(err, AccessError::NameConflict { kind: NameKind::Manager, .. }));
    }

    #[test]
    fn directories_are_isolated() {
        let a = Directory::new();
        let b = Directory::new();
        a.create_manager("site").unwrap();
        assert!(b.create_manager("site").is_ok());
        assert!(matches!(Directory::new().resolve_manager("site"), Err(AccessError::ManagerNotFound(_))));
    }

    #[test]
    fn resolve_role_walks_manager_then_role() {
        let dir = Directory::new();
        let m = dir.create_manager("site").unwrap();
        let viewer = m.create_role("viewer", &[]).unwrap();

        let found = dir.resolve_role(&viewer.reference()).unwrap();
        assert!(found.same_as(&viewer));

        let missing_manager = RoleRef { name: "viewer".into(), manager: "billing".into() };
        assert!(matches!(dir.resolve_role(&missing_manager), Err(AccessError::ManagerNotFound(_))));
        let missing_role = RoleRef { name: "admin".into(), manager: "site".into() };
        assert!(matches!(dir.resolve_role(&missing_role), Err(AccessError::RoleNotFound { .. })));
    }

    #[test]
    fn controller_names_claim_once() {
        let dir = Directory::new();
        dir.claim_controller_name("main").unwrap();
        assert!(dir.has_controller("main"));
        assert!(matches!(
            dir.claim_controller_name("main"),
            Err(AccessError::NameConflict { kind: NameKind::Controller, .. })
        ));
    }

    #[test]
    fn concurrent_manager_creation_admits_exactly_one_winner() {
        use std::sync::Barrier;
        let dir = Directory::new();
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let dir = dir.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    dir.create_manager("contended").is_ok()
                })
            })
            .collect();
        let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(wins, 1);
        assert!(dir.resolve_manager("contended").is_ok());
    }

    #[test]
    fn global_is_shared() {
        let name = format!("global-{}", uuid::Uuid::new_v4());
        Directory::global().create_manager(&name).unwrap();
        assert!(Directory::global().resolve_manager(&name).is_ok());
    }
}
