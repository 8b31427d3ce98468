use super::{gateway::HttpGateway, virtual_service::SslConfig};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An HTTP listener body that hybrid gateways delegate to.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.solo.io",
    version = "v1",
    kind = "MatchableHttpGateway",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct MatchableHttpGatewaySpec {
    pub matcher: Option<HttpGatewayMatcher>,
    pub http_gateway: HttpGateway,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpGatewayMatcher {
    #[serde(default)]
    pub source_prefix_ranges: Vec<String>,
    pub ssl_config: Option<SslConfig>,
}
