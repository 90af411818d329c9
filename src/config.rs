//! Controller and cookie configuration.
//! Values come from a JSON file or from `ROLEGATE_*` environment variables; the key
//! is carried as base64url text and must decode to exactly 64 bytes.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::accesscontrol::KEY_LEN;
use crate::error::{AccessError, AccessResult};

pub const ENV_CONTROLLER_NAME: &str = "ROLEGATE_CONTROLLER_NAME";
pub const ENV_CONTROLLER_KEY: &str = "ROLEGATE_CONTROLLER_KEY";
pub const ENV_COOKIE_SECURE: &str = "ROLEGATE_COOKIE_SECURE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes attached to the session cookie on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// Session cookie (no Max-Age) when unset
    pub max_age_secs: Option<u64>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self { path: "/".to_string(), http_only: true, secure: true, same_site: SameSite::Strict, max_age_secs: None }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Controller name; also the seed of the cookie name
    pub name: String,
    /// base64url, 64 bytes once decoded
    pub key: String,
    #[serde(default)]
    pub cookie: CookieSettings,
}

impl std::fmt::Debug for AccessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessConfig")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .field("cookie", &self.cookie)
            .finish()
    }
}

impl AccessConfig {
    pub fn load(path: impl AsRef<Path>) -> AccessResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AccessError::Config(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| AccessError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_env() -> AccessResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AccessResult<Self> {
        let name = lookup(ENV_CONTROLLER_NAME)
            .ok_or_else(|| AccessError::Config(format!("{ENV_CONTROLLER_NAME} is not set")))?;
        let key = lookup(ENV_CONTROLLER_KEY)
            .ok_or_else(|| AccessError::Config(format!("{ENV_CONTROLLER_KEY} is not set")))?;
        let mut cookie = CookieSettings::default();
        if let Some(raw) = lookup(ENV_COOKIE_SECURE) {
            cookie.secure = parse_bool(&raw)
                .ok_or_else(|| AccessError::Config(format!("{ENV_COOKIE_SECURE}: not a boolean: {raw}")))?;
        }
        Ok(Self { name, key, cookie })
    }

    pub fn key_bytes(&self) -> AccessResult<Vec<u8>> {
        let bytes = URL_SAFE_NO_PAD
            .decode(self.key.trim().trim_end_matches('='))
            .map_err(|e| AccessError::Config(format!("controller key is not base64url: {e}")))?;
        if bytes.len() != KEY_LEN {
            return Err(AccessError::InvalidKeyLength(bytes.len()));
        }
        Ok(bytes)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Fresh random controller key from the OS source.
pub fn generate_key() -> AccessResult<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    getrandom::getrandom(&mut key).map_err(|e| AccessError::Crypto(e.to_string()))?;
    Ok(key)
}

pub fn encode_key(key: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(key)
}
