//! Named roles and permissions scoped to role managers.
//! Role and permission names are unique only within their manager; manager names
//! are unique within a [`crate::Directory`].

mod manager;
mod permission;
#[allow(clippy::module_inception)]
mod role;

pub use manager::RoleManager;
pub use permission::Permission;
pub use role::{Role, RoleRef, RoleSeed};
