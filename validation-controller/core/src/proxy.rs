//! The rendered form of a proxy's configuration.

use crate::{
    k8s::{
        gateway::{HttpGatewayMatcher, Matcher, RouteOptions, VirtualHostOptions},
        ResourceRef,
    },
    ResourceId,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    pub name: String,
    pub namespace: String,
    pub listeners: Vec<Listener>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub name: String,
    pub bind_address: String,
    pub bind_port: u32,
    pub ssl: bool,
    /// The gateway this listener was rendered from.
    pub source: ResourceId,
    pub kind: ListenerKind,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerKind {
    Http(Vec<VirtualHost>),
    Tcp(Vec<TcpHost>),
    Hybrid(Vec<MatchedHttpListener>),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedHttpListener {
    pub source: ResourceId,
    pub matcher: HttpGatewayMatcher,
    pub virtual_hosts: Vec<VirtualHost>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpHost {
    pub name: String,
    pub upstream: ResourceRef,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    pub name: String,
    /// The virtual service this host was rendered from.
    pub source: ResourceId,
    pub domains: Vec<String>,
    pub routes: Vec<Route>,
    pub options: Option<VirtualHostOptions>,
    pub ssl_secret: Option<ResourceRef>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: Option<String>,
    /// The virtual service or route table that declared this route.
    pub source: ResourceId,
    pub matchers: Vec<Matcher>,
    pub options: Option<RouteOptions>,
    pub action: RouteAction,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteAction {
    Upstream(ResourceRef),
    Weighted(Vec<WeightedUpstream>),
    DirectResponse { status: u32, body: Option<String> },
    Redirect {
        host: Option<String>,
        path: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedUpstream {
    pub upstream: ResourceRef,
    pub weight: u32,
}

// === impl Proxy ===

impl Proxy {
    pub fn virtual_hosts(&self) -> impl Iterator<Item = &VirtualHost> + '_ {
        self.listeners.iter().flat_map(|l| l.virtual_hosts())
    }
}

// === impl Listener ===

impl Listener {
    /// Every HTTP virtual host served by the listener, including those of
    /// matched hybrid listeners.
    pub fn virtual_hosts(&self) -> Box<dyn Iterator<Item = &VirtualHost> + '_> {
        match &self.kind {
            ListenerKind::Http(vhosts) => Box::new(vhosts.iter()),
            ListenerKind::Tcp(_) => Box::new(std::iter::empty()),
            ListenerKind::Hybrid(matched) => {
                Box::new(matched.iter().flat_map(|m| m.virtual_hosts.iter()))
            }
        }
    }
}

// === impl VirtualHost ===

impl VirtualHost {
    /// Upstreams referenced by the host's routes.
    pub fn upstreams(&self) -> impl Iterator<Item = &ResourceRef> + '_ {
        self.routes.iter().flat_map(|r| r.action.upstreams())
    }
}

// === impl RouteAction ===

impl RouteAction {
    pub fn upstreams(&self) -> Vec<&ResourceRef> {
        match self {
            RouteAction::Upstream(us) => vec![us],
            RouteAction::Weighted(dsts) => dsts.iter().map(|d| &d.upstream).collect(),
            RouteAction::DirectResponse { .. } | RouteAction::Redirect { .. } => vec![],
        }
    }
}
