use crate::{
    core::{
        k8s::{DynamicObject, GroupVersionKind},
        Reports, Resource,
    },
    validator::{self, SnapshotValidator},
};
use anyhow::{anyhow, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::admission::Operation;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

const LIST_KIND: &str = "List";

/// Resources annotated with this key set to `true` are admitted without
/// validation.
const SKIP_VALIDATION_KEY: &str = "gateway.solo.io/skip_validation";

#[derive(Clone)]
pub struct Admission {
    validator: Arc<SnapshotValidator>,

    /// Admit resources that fail validation. Objects that cannot be decoded
    /// are still denied.
    always_accept: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// The request's object could not be decoded.
#[derive(Debug, Error)]
#[error("could not unmarshal resource: {0}")]
struct UnmarshalError(anyhow::Error);

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: Review = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(validator: Arc<SnapshotValidator>, always_accept: bool) -> Self {
        Self {
            validator,
            always_accept,
        }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        let mut rsp = AdmissionResponse::from(&req);
        let gvk = GroupVersionKind::gvk(&req.kind.group, &req.kind.version, &req.kind.kind);

        match self.review(&req, &gvk).await {
            Ok(warnings) => {
                if !warnings.is_empty() {
                    rsp.warnings = Some(warnings);
                }
                rsp
            }
            Err(error) if self.always_accept && !error.is::<UnmarshalError>() => {
                warn!(
                    %error,
                    kind = %req.kind.kind,
                    ns = req.namespace.as_deref().unwrap_or_default(),
                    name = %req.name,
                    "Admitting invalid resource"
                );
                rsp.warnings = Some(vec![error.to_string()]);
                rsp
            }
            Err(error) => {
                info!(
                    %error,
                    kind = %req.kind.kind,
                    ns = req.namespace.as_deref().unwrap_or_default(),
                    name = %req.name,
                    "Denied"
                );
                rsp.deny(error)
            }
        }
    }

    /// Validates the request, returning the warnings to attach to an
    /// admitted response.
    async fn review(&self, req: &AdmissionRequest, gvk: &GroupVersionKind) -> Result<Vec<String>> {
        if req.kind.kind == LIST_KIND {
            let items = parse_list(req).map_err(UnmarshalError)?;
            let reports = self.validator.validate_list(&items, req.dry_run).await?;
            return Ok(warnings(&reports));
        }

        match req.operation {
            Operation::Create | Operation::Update => {
                if !SnapshotValidator::modification_is_supported(gvk) {
                    return Err(validator::Error::UnsupportedResource(gvk.clone()).into());
                }
                let obj = req
                    .object
                    .as_ref()
                    .ok_or_else(|| anyhow!("admission request missing 'object'"))?;
                let resource =
                    Resource::from_object(gvk, obj).map_err(|e| UnmarshalError(e.into()))?;

                if skip_validation(obj) {
                    debug!("Skipping validation: annotated to skip");
                    return Ok(vec![]);
                }
                if matches!(req.operation, Operation::Update) {
                    let old = req
                        .old_object
                        .as_ref()
                        .ok_or_else(|| anyhow!("admission request missing 'oldObject'"))?;
                    Resource::from_object(gvk, old).map_err(|e| UnmarshalError(e.into()))?;
                    if is_status_update(obj, old) {
                        debug!("Skipping validation: status only update");
                        return Ok(vec![]);
                    }
                }

                let reports = self
                    .validator
                    .validate_modified_gvk(gvk, &resource, req.dry_run)
                    .await?;
                Ok(warnings(&reports))
            }

            Operation::Delete => {
                if !SnapshotValidator::deletion_is_supported(gvk) {
                    debug!(kind = %gvk.kind, "Deletion is not validated");
                    return Ok(vec![]);
                }
                let obj = req
                    .old_object
                    .as_ref()
                    .ok_or_else(|| anyhow!("admission request missing 'oldObject'"))?;
                let resource =
                    Resource::from_object(gvk, obj).map_err(|e| UnmarshalError(e.into()))?;
                self.validator
                    .validate_deleted_gvk(gvk, &resource, req.dry_run)
                    .await?;
                Ok(vec![])
            }

            Operation::Connect => Ok(vec![]),
        }
    }
}

fn skip_validation(obj: &DynamicObject) -> bool {
    obj.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(SKIP_VALIDATION_KEY))
        .is_some_and(|v| v == "true")
}

/// True when an update changes nothing but the object's status or
/// server-managed metadata.
fn is_status_update(obj: &DynamicObject, old: &DynamicObject) -> bool {
    fn without_status(obj: &DynamicObject) -> serde_json::Value {
        let mut data = obj.data.clone();
        if let Some(data) = data.as_object_mut() {
            data.remove("status");
        }
        data
    }

    obj.metadata.labels == old.metadata.labels
        && obj.metadata.annotations == old.metadata.annotations
        && without_status(obj) == without_status(old)
}

fn parse_list(req: &AdmissionRequest) -> Result<Vec<DynamicObject>> {
    let obj = req
        .object
        .as_ref()
        .ok_or_else(|| anyhow!("admission request missing 'object'"))?;
    let items = obj
        .data
        .get("items")
        .cloned()
        .ok_or_else(|| anyhow!("list is missing 'items'"))?;
    Ok(serde_json::from_value(items)?)
}

fn warnings(reports: &Reports) -> Vec<String> {
    reports
        .proxy_reports
        .iter()
        .flat_map(|report| report.warnings())
        .collect()
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}
