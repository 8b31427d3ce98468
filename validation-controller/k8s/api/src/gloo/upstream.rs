use crate::ResourceRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A routable destination.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gloo.solo.io",
    version = "v1",
    kind = "Upstream",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSpec {
    #[serde(flatten)]
    pub upstream_type: UpstreamType,
    pub ssl_config: Option<UpstreamSslConfig>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub enum UpstreamType {
    #[serde(rename = "static")]
    Static(StaticUpstream),
    #[serde(rename = "kube")]
    Kube(KubeUpstream),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaticUpstream {
    #[serde(default)]
    pub hosts: Vec<Host>,
    pub use_tls: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Host {
    pub addr: String,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubeUpstream {
    pub service_name: String,
    pub service_namespace: String,
    pub service_port: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSslConfig {
    pub secret_ref: Option<ResourceRef>,
}
