//! Capability-based access control for HTTP handlers.
//!
//! Permissions and roles live in per-manager registries inside a [`Directory`].
//! An [`AccessController`] issues encrypted session cookies that bind application
//! claims to a role, and guards handlers with [`VerifyOperation`]s that admit a
//! request only when its role currently holds every required permission.

pub mod accesscontrol;
pub mod config;
pub mod directory;
pub mod error;
pub mod role;
pub mod web;

pub use accesscontrol::{
    AccessController, Claims, DenyReason, InternalClaims, LoginDecider, LoginDecision, LoginOperation,
    LoginOutcome, Verdict, VerifyOperation,
};
pub use config::{AccessConfig, CookieSettings};
pub use directory::Directory;
pub use error::{AccessError, AccessResult};
pub use role::{Permission, Role, RoleManager};
pub use web::RequestContext;
