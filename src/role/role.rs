use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::{DeserializeSeed, Deserializer, Error as _};
use serde::{Deserialize, Serialize, Serializer};

use super::permission::Permission;
use crate::directory::Directory;
use crate::error::{AccessError, AccessResult};

/// Lookup key for a role: the only part of a role that ever leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "mn")]
    pub manager: String,
}

struct RoleInner {
    name: String,
    manager_name: String,
    permissions: RwLock<HashMap<String, Permission>>,
}

/// A named, mutable set of permissions owned by a role manager.
///
/// Cloning yields another handle to the same live role, so permission changes made
/// through any handle are seen by every request checked afterwards.
#[derive(Clone)]
pub struct Role {
    inner: Arc<RoleInner>,
}

impl Role {
    pub(crate) fn new(name: &str, manager_name: &str, permissions: &[Permission]) -> Self {
        let set: HashMap<String, Permission> = permissions.iter().map(|p| (p.name().to_string(), p.clone())).collect();
        Self {
            inner: Arc::new(RoleInner {
                name: name.to_string(),
                manager_name: manager_name.to_string(),
                permissions: RwLock::new(set),
            }),
        }
    }

    pub fn name(&self) -> &str { &self.inner.name }

    pub fn manager_name(&self) -> &str { &self.inner.manager_name }

    pub fn reference(&self) -> RoleRef {
        RoleRef { name: self.inner.name.clone(), manager: self.inner.manager_name.clone() }
    }

    /// Assign permissions to the role. Re-adding a held permission changes nothing.
    pub fn allow(&self, permissions: &[Permission]) {
        self.inner.permissions.write().extend(permissions.iter().map(|p| (p.name().to_string(), p.clone())));
    }

    /// Revoke permissions by name; names the role does not hold are ignored.
    pub fn disallow(&self, permissions: &[Permission]) {
        let mut set = self.inner.permissions.write();
        for p in permissions {
            set.remove(p.name());
        }
    }

    pub fn is_allowed_to(&self, permission: &Permission) -> bool {
        holds(&self.inner.permissions.read(), permission)
    }

    /// True when the role currently holds every permission in `required`.
    pub fn is_allowed_to_all(&self, required: &[Permission]) -> bool {
        let set = self.inner.permissions.read();
        required.iter().all(|p| holds(&set, p))
    }

    /// Names of the permissions held right now, sorted.
    pub fn permissions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.permissions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn same_as(&self, other: &Role) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Parse a serialized role reference and bind it to the live role in `directory`.
    pub fn from_json(directory: &Directory, json: &str) -> AccessResult<Role> {
        let reference: RoleRef = serde_json::from_str(json)
            .map_err(|e| AccessError::Malformed(format!("role reference: {e}")))?;
        directory.resolve_role(&reference)
    }
}

// a held permission matches on both name and owning manager
fn holds(set: &HashMap<String, Permission>, permission: &Permission) -> bool {
    set.get(permission.name()).is_some_and(|held| held == permission)
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool { self.same_as(other) }
}

impl Eq for Role {}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("name", &self.inner.name)
            .field("manager", &self.inner.manager_name)
            .field("permissions", &self.permissions())
            .finish()
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.reference().serialize(serializer)
    }
}

/// Deserializes a role reference straight into the live role held by a directory.
pub struct RoleSeed<'a> {
    directory: &'a Directory,
}

impl<'a> RoleSeed<'a> {
    pub fn new(directory: &'a Directory) -> Self { Self { directory } }
}

impl<'de> DeserializeSeed<'de> for RoleSeed<'_> {
    type Value = Role;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Role, D::Error> {
        let reference = RoleRef::deserialize(deserializer)?;
        self.directory.resolve_role(&reference).map_err(D::Error::custom)
    }
}
