use crate::k8s::{
    gateway::{
        Gateway, MatchableHttpGateway, RouteOption, RouteTable, VirtualHostOption, VirtualService,
    },
    gloo::{Endpoint, Upstream},
    GroupVersionKind, Resource, Secret,
};
use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every resource kind a snapshot can hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Kind {
    Gateway,
    MatchableHttpGateway,
    VirtualService,
    RouteTable,
    RouteOption,
    VirtualHostOption,
    Upstream,
    Endpoint,
    Secret,
}

/// Kinds in the gateway group whose creation or update is validated.
const GATEWAY_GROUP_MODIFICATIONS: &[Kind] = &[
    Kind::Gateway,
    Kind::MatchableHttpGateway,
    Kind::VirtualService,
    Kind::RouteTable,
    Kind::RouteOption,
    Kind::VirtualHostOption,
];

/// Kinds in the secondary (gloo) group whose creation or update is validated.
const SECONDARY_GROUP_MODIFICATIONS: &[Kind] = &[Kind::Upstream];

/// Kinds whose deletion is validated. Deleting any other kind is accepted.
const DELETIONS: &[Kind] = &[
    Kind::VirtualService,
    Kind::RouteTable,
    Kind::RouteOption,
    Kind::VirtualHostOption,
    Kind::Upstream,
    Kind::Secret,
];

static KINDS: Lazy<HashMap<GroupVersionKind, Kind>> = Lazy::new(|| table(Kind::ALL));
static GATEWAY_GROUP: Lazy<HashMap<GroupVersionKind, Kind>> =
    Lazy::new(|| table(GATEWAY_GROUP_MODIFICATIONS));
static SECONDARY_GROUP: Lazy<HashMap<GroupVersionKind, Kind>> =
    Lazy::new(|| table(SECONDARY_GROUP_MODIFICATIONS));
static DELETION: Lazy<HashMap<GroupVersionKind, Kind>> = Lazy::new(|| table(DELETIONS));

/// Returns true if creating or updating a resource of this type is validated.
///
/// A kind must be listed by exactly one of the gateway or secondary tables.
pub fn modification_is_supported(gvk: &GroupVersionKind) -> bool {
    GATEWAY_GROUP.contains_key(gvk) != SECONDARY_GROUP.contains_key(gvk)
}

/// Returns true if deleting a resource of this type is validated.
pub fn deletion_is_supported(gvk: &GroupVersionKind) -> bool {
    DELETION.contains_key(gvk)
}

fn table(kinds: &[Kind]) -> HashMap<GroupVersionKind, Kind> {
    kinds.iter().map(|k| (k.gvk(), *k)).collect()
}

fn gvk_of<T>() -> GroupVersionKind
where
    T: Resource<DynamicType = ()>,
{
    GroupVersionKind::gvk(&T::group(&()), &T::version(&()), &T::kind(&()))
}

// === impl Kind ===

impl Kind {
    pub const ALL: &'static [Kind] = &[
        Kind::Gateway,
        Kind::MatchableHttpGateway,
        Kind::VirtualService,
        Kind::RouteTable,
        Kind::RouteOption,
        Kind::VirtualHostOption,
        Kind::Upstream,
        Kind::Endpoint,
        Kind::Secret,
    ];

    pub fn gvk(&self) -> GroupVersionKind {
        match self {
            Kind::Gateway => gvk_of::<Gateway>(),
            Kind::MatchableHttpGateway => gvk_of::<MatchableHttpGateway>(),
            Kind::VirtualService => gvk_of::<VirtualService>(),
            Kind::RouteTable => gvk_of::<RouteTable>(),
            Kind::RouteOption => gvk_of::<RouteOption>(),
            Kind::VirtualHostOption => gvk_of::<VirtualHostOption>(),
            Kind::Upstream => gvk_of::<Upstream>(),
            Kind::Endpoint => gvk_of::<Endpoint>(),
            Kind::Secret => gvk_of::<Secret>(),
        }
    }

    /// Resolves a GVK into a known kind.
    pub fn from_gvk(gvk: &GroupVersionKind) -> Option<Self> {
        KINDS.get(gvk).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Gateway => "Gateway",
            Kind::MatchableHttpGateway => "MatchableHttpGateway",
            Kind::VirtualService => "VirtualService",
            Kind::RouteTable => "RouteTable",
            Kind::RouteOption => "RouteOption",
            Kind::VirtualHostOption => "VirtualHostOption",
            Kind::Upstream => "Upstream",
            Kind::Endpoint => "Endpoint",
            Kind::Secret => "Secret",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modification_tables_are_disjoint() {
        for kind in GATEWAY_GROUP_MODIFICATIONS {
            assert!(
                !SECONDARY_GROUP_MODIFICATIONS.contains(kind),
                "{kind} is listed in both modification tables"
            );
        }
    }

    #[test]
    fn supported_modifications() {
        let vs = GroupVersionKind::gvk("gateway.solo.io", "v1", "VirtualService");
        assert!(modification_is_supported(&vs));
        assert!(deletion_is_supported(&vs));

        let us = GroupVersionKind::gvk("gloo.solo.io", "v1", "Upstream");
        assert!(modification_is_supported(&us));
        assert!(deletion_is_supported(&us));

        let gw = GroupVersionKind::gvk("gateway.solo.io", "v1", "Gateway");
        assert!(modification_is_supported(&gw));
        assert!(!deletion_is_supported(&gw));

        let secret = GroupVersionKind::gvk("", "v1", "Secret");
        assert!(!modification_is_supported(&secret));
        assert!(deletion_is_supported(&secret));

        let ep = GroupVersionKind::gvk("gloo.solo.io", "v1", "Endpoint");
        assert!(!modification_is_supported(&ep));
        assert!(!deletion_is_supported(&ep));
    }

    #[test]
    fn lookups_are_version_sensitive() {
        let vs = GroupVersionKind::gvk("gateway.solo.io", "v2", "VirtualService");
        assert_eq!(Kind::from_gvk(&vs), None);
        assert!(!modification_is_supported(&vs));
    }

    #[test]
    fn resolves_every_kind() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_gvk(&kind.gvk()), Some(*kind));
            assert_eq!(kind.gvk().kind, kind.as_str());
        }
    }
}
