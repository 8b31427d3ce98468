use super::{
    options::{OptionsConfigRefs, VirtualHostOptions},
    route::Route,
};
use crate::ResourceRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Describes the routes served for a set of domains.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.solo.io",
    version = "v1",
    kind = "VirtualService",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    pub virtual_host: VirtualHost,
    pub ssl_config: Option<SslConfig>,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    pub options: Option<VirtualHostOptions>,
    pub options_config_refs: Option<OptionsConfigRefs>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SslConfig {
    pub secret_ref: Option<ResourceRef>,
    #[serde(default)]
    pub sni_domains: Vec<String>,
}
