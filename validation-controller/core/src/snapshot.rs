use crate::{
    k8s::{
        gateway::{
            Gateway, MatchableHttpGateway, RouteOption, RouteTable, VirtualHostOption,
            VirtualService,
        },
        gloo::{Endpoint, Upstream},
        ResourceRef, Secret,
    },
    Kind, Resource, ResourceId,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A point-in-time view of every resource that affects rendered proxies.
///
/// Each collection holds at most one entry per namespace and name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub gateways: Vec<Gateway>,
    pub http_gateways: Vec<MatchableHttpGateway>,
    pub virtual_services: Vec<VirtualService>,
    pub route_tables: Vec<RouteTable>,
    pub route_options: Vec<RouteOption>,
    pub virtual_host_options: Vec<VirtualHostOption>,
    pub upstreams: Vec<Upstream>,
    pub endpoints: Vec<Endpoint>,
    pub secrets: Vec<Secret>,
}

/// The gateway-group collections of a snapshot.
///
/// Two snapshots that agree here render identical proxies, so this is the
/// input used to detect whether a sync changed anything.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResources<'s> {
    pub virtual_host_options: &'s [VirtualHostOption],
    pub virtual_services: &'s [VirtualService],
    pub gateways: &'s [Gateway],
    pub route_options: &'s [RouteOption],
    pub route_tables: &'s [RouteTable],
    pub http_gateways: &'s [MatchableHttpGateway],
}

fn is_named<T: crate::k8s::Resource>(res: &T, namespace: &str, name: &str) -> bool {
    let meta = res.meta();
    meta.namespace.as_deref().unwrap_or_default() == namespace
        && meta.name.as_deref().unwrap_or_default() == name
}

fn upsert_into<T: crate::k8s::Resource>(list: &mut Vec<T>, item: T) {
    let meta = item.meta();
    let namespace = meta.namespace.clone().unwrap_or_default();
    let name = meta.name.clone().unwrap_or_default();
    match list.iter_mut().find(|r| is_named(*r, &namespace, &name)) {
        Some(slot) => *slot = item,
        None => list.push(item),
    }
}

fn remove_from<T: crate::k8s::Resource>(list: &mut Vec<T>, namespace: &str, name: &str) -> bool {
    let before = list.len();
    list.retain(|r| !is_named(r, namespace, name));
    list.len() != before
}

fn find<'s, T: crate::k8s::Resource>(list: &'s [T], reference: &ResourceRef) -> Option<&'s T> {
    list.iter()
        .find(|r| is_named(*r, &reference.namespace, &reference.name))
}

// === impl Snapshot ===

impl Snapshot {
    /// Inserts the resource, replacing any existing resource with the same
    /// kind, namespace and name.
    pub fn upsert(&mut self, resource: impl Into<Resource>) {
        match resource.into() {
            Resource::Gateway(r) => upsert_into(&mut self.gateways, r),
            Resource::MatchableHttpGateway(r) => upsert_into(&mut self.http_gateways, r),
            Resource::VirtualService(r) => upsert_into(&mut self.virtual_services, r),
            Resource::RouteTable(r) => upsert_into(&mut self.route_tables, r),
            Resource::RouteOption(r) => upsert_into(&mut self.route_options, r),
            Resource::VirtualHostOption(r) => upsert_into(&mut self.virtual_host_options, r),
            Resource::Upstream(r) => upsert_into(&mut self.upstreams, r),
            Resource::Endpoint(r) => upsert_into(&mut self.endpoints, r),
            Resource::Secret(r) => upsert_into(&mut self.secrets, r),
        }
    }

    /// Removes the identified resource, returning whether it was present.
    pub fn remove(&mut self, id: &ResourceId) -> bool {
        let (ns, name) = (id.namespace.as_str(), id.name.as_str());
        match id.kind {
            Kind::Gateway => remove_from(&mut self.gateways, ns, name),
            Kind::MatchableHttpGateway => remove_from(&mut self.http_gateways, ns, name),
            Kind::VirtualService => remove_from(&mut self.virtual_services, ns, name),
            Kind::RouteTable => remove_from(&mut self.route_tables, ns, name),
            Kind::RouteOption => remove_from(&mut self.route_options, ns, name),
            Kind::VirtualHostOption => remove_from(&mut self.virtual_host_options, ns, name),
            Kind::Upstream => remove_from(&mut self.upstreams, ns, name),
            Kind::Endpoint => remove_from(&mut self.endpoints, ns, name),
            Kind::Secret => remove_from(&mut self.secrets, ns, name),
        }
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        let r = id.to_ref();
        match id.kind {
            Kind::Gateway => find(&self.gateways, &r).is_some(),
            Kind::MatchableHttpGateway => find(&self.http_gateways, &r).is_some(),
            Kind::VirtualService => find(&self.virtual_services, &r).is_some(),
            Kind::RouteTable => find(&self.route_tables, &r).is_some(),
            Kind::RouteOption => find(&self.route_options, &r).is_some(),
            Kind::VirtualHostOption => find(&self.virtual_host_options, &r).is_some(),
            Kind::Upstream => find(&self.upstreams, &r).is_some(),
            Kind::Endpoint => find(&self.endpoints, &r).is_some(),
            Kind::Secret => find(&self.secrets, &r).is_some(),
        }
    }

    /// Groups gateways by the proxies they are rendered into. A gateway that
    /// names several proxies appears under each of them.
    pub fn gateways_by_proxy_name(&self) -> BTreeMap<String, Vec<Gateway>> {
        let mut by_proxy = BTreeMap::<String, Vec<Gateway>>::new();
        for gw in &self.gateways {
            for name in gw.spec.proxy_names() {
                by_proxy.entry(name.to_string()).or_default().push(gw.clone());
            }
        }
        by_proxy
    }

    pub fn gateway_resources(&self) -> GatewayResources<'_> {
        GatewayResources {
            virtual_host_options: &self.virtual_host_options,
            virtual_services: &self.virtual_services,
            gateways: &self.gateways,
            route_options: &self.route_options,
            route_tables: &self.route_tables,
            http_gateways: &self.http_gateways,
        }
    }

    // Lookups take fully resolved references.

    pub fn virtual_service(&self, r: &ResourceRef) -> Option<&VirtualService> {
        find(&self.virtual_services, r)
    }

    pub fn route_table(&self, r: &ResourceRef) -> Option<&RouteTable> {
        find(&self.route_tables, r)
    }

    pub fn route_option(&self, r: &ResourceRef) -> Option<&RouteOption> {
        find(&self.route_options, r)
    }

    pub fn virtual_host_option(&self, r: &ResourceRef) -> Option<&VirtualHostOption> {
        find(&self.virtual_host_options, r)
    }

    pub fn http_gateway(&self, r: &ResourceRef) -> Option<&MatchableHttpGateway> {
        find(&self.http_gateways, r)
    }

    pub fn upstream(&self, r: &ResourceRef) -> Option<&Upstream> {
        find(&self.upstreams, r)
    }

    pub fn secret(&self, r: &ResourceRef) -> Option<&Secret> {
        find(&self.secrets, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{
        gateway::{GatewaySpec, GatewayType, HttpGateway},
        ObjectMeta,
    };

    fn gateway(name: &str, proxies: &[&str]) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                namespace: Some("gloo-system".to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: GatewaySpec {
                bind_address: "::".to_string(),
                bind_port: 8080,
                ssl: false,
                proxy_names: proxies.iter().map(|p| p.to_string()).collect(),
                gateway_type: GatewayType::Http(HttpGateway::default()),
            },
        }
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut snapshot = Snapshot::default();
        snapshot.upsert(gateway("gw", &[]));
        let mut updated = gateway("gw", &[]);
        updated.spec.bind_port = 9090;
        snapshot.upsert(updated);
        snapshot.upsert(gateway("other", &[]));

        assert_eq!(snapshot.gateways.len(), 2);
        assert_eq!(snapshot.gateways[0].spec.bind_port, 9090);

        let id = ResourceId::new(Kind::Gateway, "gloo-system", "gw");
        assert!(snapshot.contains(&id));
        assert!(snapshot.remove(&id));
        assert!(!snapshot.remove(&id));
        assert!(!snapshot.contains(&id));
        assert_eq!(snapshot.gateways.len(), 1);
    }

    #[test]
    fn groups_gateways_by_proxy() {
        let mut snapshot = Snapshot::default();
        snapshot.upsert(gateway("default", &[]));
        snapshot.upsert(gateway("both", &["gateway-proxy", "internal"]));
        snapshot.upsert(gateway("internal", &["internal"]));

        let by_proxy = snapshot.gateways_by_proxy_name();
        let names = |proxy: &str| {
            by_proxy[proxy]
                .iter()
                .map(|gw| gw.metadata.name.clone().unwrap_or_default())
                .collect::<Vec<_>>()
        };
        assert_eq!(by_proxy.len(), 2);
        assert_eq!(names("gateway-proxy"), vec!["default", "both"]);
        assert_eq!(names("internal"), vec!["both", "internal"]);
    }
}
