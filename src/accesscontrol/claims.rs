use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AccessError, AccessResult};
use crate::role::{Role, RoleRef};

/// Token payload as it travels: application claims plus the role lookup key.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireClaims {
    #[serde(rename = "uc", default, skip_serializing_if = "Option::is_none")]
    pub(crate) claims: Option<Value>,
    #[serde(rename = "ro", default, skip_serializing_if = "Option::is_none")]
    pub(crate) role: Option<RoleRef>,
}

/// A verified token: the embedded claims and the live role it is bound to.
#[derive(Debug, Clone)]
pub struct InternalClaims {
    pub claims: Claims,
    pub role: Role,
}

/// Application claims embedded in a session token, decoded on demand.
#[derive(Debug, Clone, Default)]
pub struct Claims {
    data: Option<Arc<Value>>,
}

impl Claims {
    pub(crate) fn new(data: Option<Value>) -> Self {
        Self { data: data.map(Arc::new) }
    }

    pub fn is_empty(&self) -> bool { self.data.is_none() }

    pub fn raw(&self) -> Option<&Value> { self.data.as_deref() }

    /// Deserialize the claims into `T`. Fails with `EmptyClaims` if the token carried none.
    pub fn decode<T: DeserializeOwned>(&self) -> AccessResult<T> {
        let data = self.data.as_deref().ok_or(AccessError::EmptyClaims)?;
        Ok(T::deserialize(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[test]
    fn decodes_into_caller_type() {
        let claims = Claims::new(Some(serde_json::json!({"id": 7, "name": "ada"})));
        let user: User = claims.decode().unwrap();
        assert_eq!(user, User { id: 7, name: "ada".into() });

        // wrong shape is a claims error, not EmptyClaims
        assert!(matches!(claims.decode::<String>(), Err(AccessError::Claims(_))));
    }

    #[test]
    fn empty_claims_are_distinct() {
        let claims = Claims::new(None);
        assert!(claims.is_empty());
        assert!(matches!(claims.decode::<String>(), Err(AccessError::EmptyClaims)));
    }

    #[test]
    fn wire_format_omits_absent_fields() {
        let wire = WireClaims { claims: None, role: Some(RoleRef { name: "viewer".into(), manager: "site".into() }) };
        assert_eq!(serde_json::to_string(&wire).unwrap(), r#"{"ro":{"n":"viewer","mn":"site"}}"#);

        let back: WireClaims = serde_json::from_str(r#"{"uc":null}"#).unwrap();
        assert!(back.claims.is_none());
        assert!(back.role.is_none());
    }
}
