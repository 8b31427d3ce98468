use crate::ResourceRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A discovered address for one or more upstreams.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gloo.solo.io",
    version = "v1",
    kind = "Endpoint",
    namespaced,
    derive = "PartialEq"
)]
pub struct EndpointSpec {
    #[serde(default)]
    pub upstreams: Vec<ResourceRef>,
    pub address: String,
    pub port: u32,
}
