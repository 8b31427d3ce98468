use super::route::Destination;
use crate::ResourceRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes a listener that one or more proxies expose.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.solo.io",
    version = "v1",
    kind = "Gateway",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub bind_port: u32,
    #[serde(default)]
    pub ssl: bool,

    /// Names of the proxies this gateway is rendered into. Empty means the
    /// default proxy.
    #[serde(default)]
    pub proxy_names: Vec<String>,

    #[serde(flatten)]
    pub gateway_type: GatewayType,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub enum GatewayType {
    #[serde(rename = "httpGateway")]
    Http(HttpGateway),
    #[serde(rename = "tcpGateway")]
    Tcp(TcpGateway),
    #[serde(rename = "hybridGateway")]
    Hybrid(HybridGateway),
}

/// Selects the virtual services served by an HTTP listener.
///
/// Explicit `virtual_services` refs take precedence over the label selector.
/// With neither set, every virtual service in the allowed namespaces is
/// selected.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpGateway {
    #[serde(default)]
    pub virtual_services: Vec<ResourceRef>,
    pub virtual_service_selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub virtual_service_namespaces: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TcpGateway {
    #[serde(default)]
    pub tcp_hosts: Vec<TcpHost>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct TcpHost {
    pub name: String,
    pub destination: Destination,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HybridGateway {
    pub delegated_http_gateways: DelegatedHttpGateway,
}

/// Selects `MatchableHttpGateway`s either by reference or by labels.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DelegatedHttpGateway {
    #[serde(rename = "ref")]
    pub reference: Option<ResourceRef>,
    pub selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

fn default_bind_address() -> String {
    "::".to_string()
}

impl GatewaySpec {
    /// Returns the proxies this gateway contributes a listener to.
    pub fn proxy_names(&self) -> Vec<&str> {
        if self.proxy_names.is_empty() {
            return vec![crate::DEFAULT_PROXY_NAME];
        }
        self.proxy_names.iter().map(String::as_str).collect()
    }
}
