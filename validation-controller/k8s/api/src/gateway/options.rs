use crate::ResourceRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A reusable set of route options.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.solo.io",
    version = "v1",
    kind = "RouteOption",
    namespaced,
    derive = "PartialEq"
)]
pub struct RouteOptionSpec {
    #[serde(default)]
    pub options: RouteOptions,
}

/// A reusable set of virtual host options.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.solo.io",
    version = "v1",
    kind = "VirtualHostOption",
    namespaced,
    derive = "PartialEq"
)]
pub struct VirtualHostOptionSpec {
    #[serde(default)]
    pub options: VirtualHostOptions,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptions {
    pub timeout: Option<String>,
    pub retries: Option<RetryPolicy>,
    pub prefix_rewrite: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub num_retries: u32,
    pub per_try_timeout: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHostOptions {
    pub cors: Option<CorsPolicy>,
    pub include_request_attempt_count: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorsPolicy {
    #[serde(default)]
    pub allow_origin: Vec<String>,
    #[serde(default)]
    pub allow_methods: Vec<String>,
}

/// Refers to option resources whose settings are merged underneath the
/// inline options.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionsConfigRefs {
    #[serde(default)]
    pub delegate_options: Vec<ResourceRef>,
}

impl RouteOptions {
    /// Fills every unset field from `other`.
    pub fn merge(mut self, other: &RouteOptions) -> Self {
        if self.timeout.is_none() {
            self.timeout.clone_from(&other.timeout);
        }
        if self.retries.is_none() {
            self.retries.clone_from(&other.retries);
        }
        if self.prefix_rewrite.is_none() {
            self.prefix_rewrite.clone_from(&other.prefix_rewrite);
        }
        self
    }
}

impl VirtualHostOptions {
    /// Fills every unset field from `other`.
    pub fn merge(mut self, other: &VirtualHostOptions) -> Self {
        if self.cors.is_none() {
            self.cors.clone_from(&other.cors);
        }
        if self.include_request_attempt_count.is_none() {
            self.include_request_attempt_count = other.include_request_attempt_count;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_options_take_precedence() {
        let inline = RouteOptions {
            prefix_rewrite: Some("/v2".to_string()),
            ..Default::default()
        };
        let delegated = RouteOptions {
            timeout: Some("5s".to_string()),
            prefix_rewrite: Some("/v1".to_string()),
            ..Default::default()
        };

        let merged = inline.merge(&delegated);
        assert_eq!(merged.prefix_rewrite.as_deref(), Some("/v2"));
        assert_eq!(merged.timeout.as_deref(), Some("5s"));
        assert_eq!(merged.retries, None);
    }
}
