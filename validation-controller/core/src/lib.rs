#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod kind;
pub mod proxy;
pub mod report;
pub mod resource;
pub mod snapshot;

pub use self::{
    kind::{deletion_is_supported, modification_is_supported, Kind},
    proxy::Proxy,
    report::{ProxyReport, ReportErrors, Reports, ResourceReports, ValidationReport},
    resource::{DecodeError, Resource, ResourceId},
    snapshot::Snapshot,
};
pub use gateway_validation_k8s_api as k8s;

use self::k8s::gateway::Gateway;

/// Renders the gateways of one logical proxy into a `Proxy`.
///
/// Translation never fails outright: problems are recorded against the
/// resources that caused them in the returned reports. A `None` proxy means
/// the gateways produced no listeners.
pub trait Translate: Send + Sync {
    fn translate(
        &self,
        proxy_name: &str,
        snapshot: &Snapshot,
        gateways: &[Gateway],
    ) -> (Option<Proxy>, ResourceReports);
}

/// Deep-validates a rendered proxy, possibly out of process.
///
/// `resource` is the mutation under validation, if any, and `delete`
/// indicates whether it is being removed. A well-behaved implementation
/// returns exactly one report per proxy.
#[async_trait::async_trait]
pub trait ValidateProxy: Send + Sync {
    async fn validate_proxy(
        &self,
        proxy: &Proxy,
        resource: Option<&Resource>,
        delete: bool,
    ) -> anyhow::Result<Vec<ValidationReport>>;
}
