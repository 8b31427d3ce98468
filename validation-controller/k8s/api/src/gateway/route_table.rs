use super::route::Route;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A set of routes that virtual services and other route tables delegate to.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.solo.io",
    version = "v1",
    kind = "RouteTable",
    namespaced,
    derive = "PartialEq"
)]
pub struct RouteTableSpec {
    #[serde(default)]
    pub routes: Vec<Route>,
    pub weight: Option<i32>,
}
