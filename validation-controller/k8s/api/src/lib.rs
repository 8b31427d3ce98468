#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod gateway;
pub mod gloo;
mod resource_ref;

pub use self::resource_ref::ResourceRef;
pub use k8s_openapi::api::core::v1::Secret;
pub use kube::{
    api::ObjectMeta,
    core::{DynamicObject, GroupVersionKind, TypeMeta},
    Resource, ResourceExt,
};

/// Proxy name used by gateways that do not name one explicitly.
pub const DEFAULT_PROXY_NAME: &str = "gateway-proxy";
