//! Unified access-control error model and mapping helpers.
//! Every fallible operation in the crate returns `AccessError`; the router adapter
//! maps it onto an HTTP status so operational faults surface to the host pipeline.

use std::panic::Location;

use thiserror::Error;

/// What kind of registry object a name conflict happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Manager,
    Permission,
    Role,
    Controller,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NameKind::Manager => "role manager",
            NameKind::Permission => "permission",
            NameKind::Role => "role",
            NameKind::Controller => "access controller",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    // --- configuration ---
    #[error("{kind} name \"{name}\" is not unique")]
    NameConflict { kind: NameKind, name: String },

    #[error("invalid key size, expected 64 bytes but got {0}")]
    InvalidKeyLength(usize),

    #[error("required permissions cannot be empty because then everyone can access")]
    EmptyPermissions,

    #[error("configuration error: {0}")]
    Config(String),

    // --- lookups ---
    #[error("role manager \"{0}\" does not exist")]
    ManagerNotFound(String),

    #[error("role \"{role}\" does not exist in role manager \"{manager}\"")]
    RoleNotFound { manager: String, role: String },

    #[error("permission \"{permission}\" does not exist in role manager \"{manager}\"")]
    PermissionNotFound { manager: String, permission: String },

    // --- token ---
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token failed authentication")]
    CryptoFailure,

    #[error("token carries no role reference")]
    MissingRole,

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    // --- pipeline ---
    #[error("request context was cancelled")]
    Cancelled,

    #[error("login decision returned issue=true without a role (login operation created at {site})")]
    InvalidDecision { site: &'static Location<'static> },

    #[error("login decision failed: {0}")]
    Decision(#[source] anyhow::Error),

    #[error("reading claims when the token carries none")]
    EmptyClaims,

    #[error("claims (de)serialization failed: {0}")]
    Claims(#[from] serde_json::Error),
}

impl AccessError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AccessError::NameConflict { .. } => "name_conflict",
            AccessError::InvalidKeyLength(_) => "invalid_key_length",
            AccessError::EmptyPermissions => "empty_permissions",
            AccessError::Config(_) => "config",
            AccessError::ManagerNotFound(_) => "manager_not_found",
            AccessError::RoleNotFound { .. } => "role_not_found",
            AccessError::PermissionNotFound { .. } => "permission_not_found",
            AccessError::Malformed(_) => "malformed_token",
            AccessError::CryptoFailure => "crypto_failure",
            AccessError::MissingRole => "missing_role",
            AccessError::Crypto(_) => "crypto",
            AccessError::Cancelled => "cancelled",
            AccessError::InvalidDecision { .. } => "invalid_decision",
            AccessError::Decision(_) => "decision",
            AccessError::EmptyClaims => "empty_claims",
            AccessError::Claims(_) => "claims",
        }
    }

    /// Setup-time errors: surfaced while building managers, controllers and operations.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AccessError::NameConflict { .. }
                | AccessError::InvalidKeyLength(_)
                | AccessError::EmptyPermissions
                | AccessError::Config(_)
        )
    }

    /// Token failed authentication; callers deny access rather than fail.
    pub fn is_deny(&self) -> bool {
        matches!(self, AccessError::CryptoFailure)
    }

    /// Token no longer points at a live role: the registry changed since issuance.
    pub fn is_stale_role(&self) -> bool {
        matches!(
            self,
            AccessError::ManagerNotFound(_) | AccessError::RoleNotFound { .. } | AccessError::MissingRole
        )
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AccessError::Malformed(_) => 400,
            AccessError::CryptoFailure => 403,
            AccessError::ManagerNotFound(_)
            | AccessError::RoleNotFound { .. }
            | AccessError::PermissionNotFound { .. }
            | AccessError::MissingRole => 403,
            AccessError::NameConflict { .. } => 409,
            // nginx-style "client closed request"
            AccessError::Cancelled => 499,
            AccessError::InvalidKeyLength(_)
            | AccessError::EmptyPermissions
            | AccessError::Config(_)
            | AccessError::Crypto(_)
            | AccessError::InvalidDecision { .. }
            | AccessError::Decision(_)
            | AccessError::EmptyClaims
            | AccessError::Claims(_) => 500,
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
