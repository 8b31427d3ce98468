use crate::{
    k8s::{
        gateway::{
            Gateway, MatchableHttpGateway, RouteOption, RouteTable, VirtualHostOption,
            VirtualService,
        },
        gloo::{Endpoint, Upstream},
        DynamicObject, GroupVersionKind, ObjectMeta, ResourceRef, Secret,
    },
    Kind,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a single resource within a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ResourceId {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

/// Any resource that participates in validation.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    Gateway(Gateway),
    MatchableHttpGateway(MatchableHttpGateway),
    VirtualService(VirtualService),
    RouteTable(RouteTable),
    RouteOption(RouteOption),
    VirtualHostOption(VirtualHostOption),
    Upstream(Upstream),
    Endpoint(Endpoint),
    Secret(Secret),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown resource type {0:?}")]
    UnknownKind(GroupVersionKind),

    #[error("failed to decode {kind}: {source}")]
    Json {
        kind: Kind,
        #[source]
        source: serde_json::Error,
    },
}

/// Splits an `apiVersion` into its group and version.
fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(kind: Kind, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Builds an id from a reference, resolving an empty namespace against
    /// `default_ns`.
    pub fn from_ref(kind: Kind, reference: &ResourceRef, default_ns: &str) -> Self {
        Self::new(kind, reference.namespace_or(default_ns), &reference.name)
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(&self.namespace, &self.name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.kind, self.namespace, self.name)
    }
}

// === impl Resource ===

macro_rules! each_resource {
    ($res:expr, $inner:ident => $body:expr) => {
        match $res {
            Resource::Gateway($inner) => $body,
            Resource::MatchableHttpGateway($inner) => $body,
            Resource::VirtualService($inner) => $body,
            Resource::RouteTable($inner) => $body,
            Resource::RouteOption($inner) => $body,
            Resource::VirtualHostOption($inner) => $body,
            Resource::Upstream($inner) => $body,
            Resource::Endpoint($inner) => $body,
            Resource::Secret($inner) => $body,
        }
    };
}

impl Resource {
    /// Decodes an admission object of the given type.
    pub fn from_object(gvk: &GroupVersionKind, obj: &DynamicObject) -> Result<Self, DecodeError> {
        let kind = Kind::from_gvk(gvk).ok_or_else(|| DecodeError::UnknownKind(gvk.clone()))?;
        let value = serde_json::to_value(obj).map_err(|source| DecodeError::Json { kind, source })?;
        Self::from_value(kind, value)
    }

    /// Decodes an object whose type is described by its own type metadata.
    pub fn from_dynamic(obj: &DynamicObject) -> Result<Self, DecodeError> {
        let gvk = match obj.types.as_ref() {
            Some(types) => {
                let (group, version) = split_api_version(&types.api_version);
                GroupVersionKind::gvk(group, version, &types.kind)
            }
            None => GroupVersionKind::gvk("", "", ""),
        };
        Self::from_object(&gvk, obj)
    }

    pub fn from_value(kind: Kind, value: serde_json::Value) -> Result<Self, DecodeError> {
        let json = |source| DecodeError::Json { kind, source };
        let res = match kind {
            Kind::Gateway => Self::Gateway(serde_json::from_value(value).map_err(json)?),
            Kind::MatchableHttpGateway => {
                Self::MatchableHttpGateway(serde_json::from_value(value).map_err(json)?)
            }
            Kind::VirtualService => {
                Self::VirtualService(serde_json::from_value(value).map_err(json)?)
            }
            Kind::RouteTable => Self::RouteTable(serde_json::from_value(value).map_err(json)?),
            Kind::RouteOption => Self::RouteOption(serde_json::from_value(value).map_err(json)?),
            Kind::VirtualHostOption => {
                Self::VirtualHostOption(serde_json::from_value(value).map_err(json)?)
            }
            Kind::Upstream => Self::Upstream(serde_json::from_value(value).map_err(json)?),
            Kind::Endpoint => Self::Endpoint(serde_json::from_value(value).map_err(json)?),
            Kind::Secret => Self::Secret(serde_json::from_value(value).map_err(json)?),
        };
        Ok(res)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Resource::Gateway(_) => Kind::Gateway,
            Resource::MatchableHttpGateway(_) => Kind::MatchableHttpGateway,
            Resource::VirtualService(_) => Kind::VirtualService,
            Resource::RouteTable(_) => Kind::RouteTable,
            Resource::RouteOption(_) => Kind::RouteOption,
            Resource::VirtualHostOption(_) => Kind::VirtualHostOption,
            Resource::Upstream(_) => Kind::Upstream,
            Resource::Endpoint(_) => Kind::Endpoint,
            Resource::Secret(_) => Kind::Secret,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        each_resource!(self, r => &r.metadata)
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(self.kind(), self.namespace(), self.name())
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        each_resource!(self, r => serde_json::to_value(r))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id().fmt(f)
    }
}

impl Serialize for Resource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        each_resource!(self, r => r.serialize(serializer))
    }
}

macro_rules! impl_from {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Resource {
                fn from(r: $variant) -> Self {
                    Resource::$variant(r)
                }
            }
        )+
    };
}

impl_from!(
    Gateway,
    MatchableHttpGateway,
    VirtualService,
    RouteTable,
    RouteOption,
    VirtualHostOption,
    Upstream,
    Endpoint,
    Secret,
);
