use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// References a namespaced resource by name.
///
/// An empty namespace refers to the namespace of the referring resource.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema,
)]
pub struct ResourceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns the referenced namespace, falling back to `default_ns` when
    /// the reference does not set one.
    pub fn namespace_or<'a>(&'a self, default_ns: &'a str) -> &'a str {
        if self.namespace.is_empty() {
            default_ns
        } else {
            &self.namespace
        }
    }

    /// Resolves the reference against the referring resource's namespace.
    pub fn resolve(&self, default_ns: &str) -> Self {
        Self::new(self.namespace_or(default_ns), &self.name)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}
