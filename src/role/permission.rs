use serde::{Deserialize, Serialize};

/// A named capability tag scoped to one role manager.
///
/// Equality is by value on both fields so a permission rebuilt from a token in a
/// later process compares equal to the one the manager handed out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "n")]
    name: String,
    #[serde(rename = "mn")]
    manager_name: String,
}

impl Permission {
    pub(crate) fn new(name: &str, manager_name: &str) -> Self {
        Self { name: name.to_string(), manager_name: manager_name.to_string() }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn manager_name(&self) -> &str { &self.manager_name }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.manager_name, self.name)
    }
}
