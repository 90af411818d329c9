use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::permission::Permission;
use super::role::Role;
use crate::error::{AccessError, AccessResult, NameKind};

struct ManagerInner {
    name: String,
    roles: RwLock<HashMap<String, Role>>,
    permissions: RwLock<HashMap<String, Permission>>,
}

/// Uniquely-named container owning independent role and permission namespaces.
///
/// Created through [`crate::Directory::create_manager`]; cheap to clone.
#[derive(Clone)]
pub struct RoleManager {
    inner: Arc<ManagerInner>,
}

impl RoleManager {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                name: name.to_string(),
                roles: RwLock::new(HashMap::new()),
                permissions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn name(&self) -> &str { &self.inner.name }

    /// Create a permission; the name must be unique within this manager.
    pub fn create_permission(&self, name: &str) -> AccessResult<Permission> {
        let mut map = self.inner.permissions.write();
        if map.contains_key(name) {
            return Err(AccessError::NameConflict { kind: NameKind::Permission, name: name.to_string() });
        }
        let permission = Permission::new(name, &self.inner.name);
        map.insert(name.to_string(), permission.clone());
        Ok(permission)
    }

    /// Create a role holding exactly `permissions`; the name must be unique within this manager.
    pub fn create_role(&self, name: &str, permissions: &[Permission]) -> AccessResult<Role> {
        let mut map = self.inner.roles.write();
        if map.contains_key(name) {
            return Err(AccessError::NameConflict { kind: NameKind::Role, name: name.to_string() });
        }
        let role = Role::new(name, &self.inner.name, permissions);
        map.insert(name.to_string(), role.clone());
        tracing::debug!(target: "rolegate::role", manager = %self.inner.name, role = name, permissions = permissions.len(), "role created");
        Ok(role)
    }

    pub fn resolve_role(&self, name: &str) -> AccessResult<Role> {
        self.inner.roles.read().get(name).cloned().ok_or_else(|| AccessError::RoleNotFound {
            manager: self.inner.name.clone(),
            role: name.to_string(),
        })
    }

    pub fn resolve_permission(&self, name: &str) -> AccessResult<Permission> {
        self.inner.permissions.read().get(name).cloned().ok_or_else(|| AccessError::PermissionNotFound {
            manager: self.inner.name.clone(),
            permission: name.to_string(),
        })
    }

    pub fn same_as(&self, other: &RoleManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for RoleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleManager")
            .field("name", &self.inner.name)
            .field("roles", &self.inner.roles.read().len())
            .field("permissions", &self.inner.permissions.read().len())
            .finish()
    }
}
