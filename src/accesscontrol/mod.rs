//! Session tokens binding application claims to a role, and the login / verify
//! operations built on them.
//!
//! An [`AccessController`] owns a 64-byte key: the first half signs, the second
//! half encrypts. Tokens are signed first and encrypted second, so a token that
//! decrypts cleanly still has to pass the signature check before its payload is
//! trusted. The payload names its role by `(manager, role)` only; verification
//! resolves that against the controller's [`Directory`] on every request, so
//! permission changes apply to tokens that were issued before the change.

mod claims;
mod login;
mod token;
mod verify;

use std::panic::Location;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

pub use claims::{Claims, InternalClaims};
pub use login::{LoginDecider, LoginDecision, LoginOperation, LoginOutcome};
pub use verify::{DenyReason, Verdict, VerifyOperation};

use claims::WireClaims;
use token::{TokenKeys, HALF_KEY_LEN};

use crate::config::{AccessConfig, CookieSettings};
use crate::directory::Directory;
use crate::error::{AccessError, AccessResult};
use crate::role::{Permission, Role};

pub const KEY_LEN: usize = 2 * HALF_KEY_LEN;

struct ControllerInner {
    name: String,
    cookie_name: String,
    cookie: CookieSettings,
    keys: TokenKeys,
    directory: Directory,
}

#[derive(Clone)]
pub struct AccessController {
    inner: Arc<ControllerInner>,
}

impl AccessController {
    /// Create a controller with default cookie attributes.
    /// `key` must be 64 bytes and `name` unused in `directory`.
    pub fn create(directory: &Directory, name: &str, key: &[u8]) -> AccessResult<Self> {
        Self::with_cookie_settings(directory, name, key, CookieSettings::default())
    }

    pub fn with_cookie_settings(directory: &Directory, name: &str, key: &[u8], cookie: CookieSettings) -> AccessResult<Self> {
        if key.len() != KEY_LEN {
            return Err(AccessError::InvalidKeyLength(key.len()));
        }
        let (signing, encrypting) = key.split_at(HALF_KEY_LEN);
        let keys = TokenKeys::new(half(signing)?, half(encrypting)?);

        directory.claim_controller_name(name)?;
        let cookie_name = derive_cookie_name(name);
        info!(target: "rolegate::accesscontrol", controller = name, cookie = %cookie_name, "access controller created");

        Ok(Self {
            inner: Arc::new(ControllerInner {
                name: name.to_string(),
                cookie_name,
                cookie,
                keys,
                directory: directory.clone(),
            }),
        })
    }

    pub fn from_config(directory: &Directory, config: &AccessConfig) -> AccessResult<Self> {
        let key = config.key_bytes()?;
        Self::with_cookie_settings(directory, &config.name, &key, config.cookie.clone())
    }

    pub fn name(&self) -> &str { &self.inner.name }

    /// Name of the session cookie: base64url(SHA-256(controller name)).
    pub fn cookie_name(&self) -> &str { &self.inner.cookie_name }

    pub fn cookie_settings(&self) -> &CookieSettings { &self.inner.cookie }

    pub fn directory(&self) -> &Directory { &self.inner.directory }

    /// Bind `claims` to `role` in a signed-then-encrypted compact token.
    /// Claims that serialize to JSON `null` are left out of the token.
    pub fn issue_token<C: Serialize + ?Sized>(&self, claims: &C, role: &Role) -> AccessResult<String> {
        let claims = match serde_json::to_value(claims)? {
            serde_json::Value::Null => None,
            value => Some(value),
        };
        self.seal_wire(&WireClaims { claims, role: Some(role.reference()) })
    }

    pub(crate) fn seal_wire(&self, wire: &WireClaims) -> AccessResult<String> {
        let payload = serde_json::to_vec(wire)?;
        self.inner.keys.seal(&payload)
    }

    /// Decrypt, check the signature, and bind the embedded role reference to the live role.
    pub fn verify_token(&self, token: &str) -> AccessResult<InternalClaims> {
        let payload = self.inner.keys.open(token)?;
        let wire: WireClaims = serde_json::from_slice(&payload)
            .map_err(|e| AccessError::Malformed(format!("token payload: {e}")))?;
        let reference = wire.role.ok_or(AccessError::MissingRole)?;
        let role = self.inner.directory.resolve_role(&reference)?;
        Ok(InternalClaims { claims: Claims::new(wire.claims), role })
    }

    /// Build a login operation around `decider`.
    #[track_caller]
    pub fn login<C, D>(&self, decider: D) -> LoginOperation<C, D>
    where
        C: Serialize + Send + 'static,
        D: LoginDecider<C>,
    {
        LoginOperation::new(self.clone(), decider, Location::caller())
    }

    /// Build a verify operation admitting roles that hold every permission in `required`.
    pub fn verify(&self, required: &[Permission]) -> AccessResult<VerifyOperation> {
        VerifyOperation::new(self.clone(), required)
    }
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("name", &self.inner.name)
            .field("cookie_name", &self.inner.cookie_name)
            .finish_non_exhaustive()
    }
}

fn half(bytes: &[u8]) -> AccessResult<[u8; HALF_KEY_LEN]> {
    bytes.try_into().map_err(|_| AccessError::InvalidKeyLength(bytes.len() * 2))
}

fn derive_cookie_name(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(name.as_bytes()))
}
