use crate::codec::JsonCodec;
use futures::prelude::*;
use gateway_validation_core::{
    k8s::{gloo::Upstream, ResourceRef},
    Proxy, Resource, ValidationReport,
};
use http::uri::PathAndQuery;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tonic::{
    client::Grpc,
    transport::{Channel, Endpoint},
    Request, Status,
};

const VALIDATE_PATH: &str = "/gloo.solo.io.GlooValidationService/Validate";
const NOTIFY_ON_RESYNC_PATH: &str = "/gloo.solo.io.GlooValidationService/NotifyOnResync";

pub type ResyncStream =
    Pin<Box<dyn Stream<Item = Result<NotifyOnResyncResponse, Status>> + Send + 'static>>;

/// The remote validation service.
#[async_trait::async_trait]
pub trait ValidationApi: Clone + Send + Sync + 'static {
    async fn validate(&self, req: ValidationRequest) -> Result<ValidationResponse, Status>;

    async fn notify_on_resync(&self, req: NotifyOnResyncRequest) -> Result<ResyncStream, Status>;
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub proxy: Option<Proxy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceChange>,
}

/// The resources the secondary validator checks alongside the proxy.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceChange {
    #[serde(rename_all = "camelCase")]
    Modified { upstreams: Vec<Upstream> },

    #[serde(rename_all = "camelCase")]
    Deleted {
        #[serde(default)]
        upstream_refs: Vec<ResourceRef>,
        #[serde(default)]
        secret_refs: Vec<ResourceRef>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(default)]
    pub validation_reports: Vec<ValidationReport>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotifyOnResyncRequest {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotifyOnResyncResponse {}

/// A `ValidationApi` over a gRPC channel.
#[derive(Clone, Debug)]
pub struct GrpcValidationClient {
    inner: Grpc<Channel>,
}

// === impl ValidationRequest ===

impl ValidationRequest {
    pub fn new(proxy: &Proxy, resource: Option<&Resource>, delete: bool) -> Self {
        Self {
            proxy: Some(proxy.clone()),
            resources: resource.and_then(|r| ResourceChange::new(r, delete)),
        }
    }
}

// === impl ResourceChange ===

impl ResourceChange {
    /// Only upstreams and secrets are checked directly by the secondary
    /// validator; other kinds are covered by the rendered proxy.
    pub fn new(resource: &Resource, delete: bool) -> Option<Self> {
        match (resource, delete) {
            (Resource::Upstream(upstream), false) => Some(Self::Modified {
                upstreams: vec![upstream.clone()],
            }),
            (Resource::Upstream(_), true) => Some(Self::Deleted {
                upstream_refs: vec![resource.id().to_ref()],
                secret_refs: vec![],
            }),
            (Resource::Secret(_), true) => Some(Self::Deleted {
                upstream_refs: vec![],
                secret_refs: vec![resource.id().to_ref()],
            }),
            _ => None,
        }
    }
}

// === impl GrpcValidationClient ===

impl GrpcValidationClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    /// Connects to the validation server at `addr`, e.g. `gloo:9988`.
    pub async fn connect(addr: &str) -> Result<Self, Status> {
        let channel = endpoint(addr)?
            .connect()
            .await
            .map_err(|error| Status::unavailable(format!("failed to connect to {addr}: {error}")))?;
        Ok(Self::new(channel))
    }

    /// Like `connect`, but defers connecting until the first call.
    pub fn connect_lazy(addr: &str) -> Result<Self, Status> {
        Ok(Self::new(endpoint(addr)?.connect_lazy()))
    }

    async fn ready(&self) -> Result<Grpc<Channel>, Status> {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|error| Status::unavailable(format!("service was not ready: {error}")))?;
        Ok(grpc)
    }
}

fn endpoint(addr: &str) -> Result<Endpoint, Status> {
    Endpoint::from_shared(format!("http://{addr}"))
        .map_err(|error| Status::invalid_argument(format!("invalid address {addr}: {error}")))
}

#[async_trait::async_trait]
impl ValidationApi for GrpcValidationClient {
    async fn validate(&self, req: ValidationRequest) -> Result<ValidationResponse, Status> {
        let mut grpc = self.ready().await?;
        let rsp = grpc
            .unary(
                Request::new(req),
                PathAndQuery::from_static(VALIDATE_PATH),
                JsonCodec::<ValidationRequest, ValidationResponse>::default(),
            )
            .await?;
        Ok(rsp.into_inner())
    }

    async fn notify_on_resync(&self, req: NotifyOnResyncRequest) -> Result<ResyncStream, Status> {
        let mut grpc = self.ready().await?;
        let rsp = grpc
            .server_streaming(
                Request::new(req),
                PathAndQuery::from_static(NOTIFY_ON_RESYNC_PATH),
                JsonCodec::<NotifyOnResyncRequest, NotifyOnResyncResponse>::default(),
            )
            .await?;
        Ok(Box::pin(rsp.into_inner()))
    }
}
