use crate::api::{ValidationApi, ValidationRequest};
use anyhow::Context;
use gateway_validation_core::{Proxy, Resource, ValidateProxy, ValidationReport};
use tracing::{debug, instrument};

/// Validates rendered proxies with the remote validation server.
#[derive(Clone, Debug)]
pub struct RemoteProxyValidator<C> {
    client: C,
}

impl<C: ValidationApi> RemoteProxyValidator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl<C: ValidationApi> ValidateProxy for RemoteProxyValidator<C> {
    #[instrument(skip_all, fields(proxy = %proxy.name))]
    async fn validate_proxy(
        &self,
        proxy: &Proxy,
        resource: Option<&Resource>,
        delete: bool,
    ) -> anyhow::Result<Vec<ValidationReport>> {
        let req = ValidationRequest::new(proxy, resource, delete);
        let rsp = self
            .client
            .validate(req)
            .await
            .context("failed to communicate with the validation server")?;
        debug!(reports = rsp.validation_reports.len(), "Validated proxy");
        Ok(rsp.validation_reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{NotifyOnResyncRequest, ResyncStream, ResourceChange, ValidationResponse};
    use gateway_validation_core::{
        k8s::{
            gloo::{StaticUpstream, Upstream, UpstreamSpec, UpstreamType},
            ResourceRef,
        },
        ProxyReport,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tonic::Status;

    #[derive(Clone, Default)]
    struct Recorder {
        requests: Arc<Mutex<Vec<ValidationRequest>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ValidationApi for Recorder {
        async fn validate(&self, req: ValidationRequest) -> Result<ValidationResponse, Status> {
            let proxy = req.proxy.clone();
            self.requests.lock().push(req);
            if self.fail {
                return Err(Status::internal("validation server exploded"));
            }
            let proxy_report = proxy
                .as_ref()
                .map(ProxyReport::for_proxy)
                .unwrap_or_default();
            Ok(ValidationResponse {
                validation_reports: vec![ValidationReport {
                    proxy_report,
                    resource_reports: Default::default(),
                    proxy,
                }],
            })
        }

        async fn notify_on_resync(&self, _: NotifyOnResyncRequest) -> Result<ResyncStream, Status> {
            Err(Status::unimplemented("notify_on_resync"))
        }
    }

    fn proxy() -> Proxy {
        Proxy {
            name: "gateway-proxy".to_string(),
            namespace: "gloo-system".to_string(),
            listeners: vec![],
        }
    }

    #[tokio::test]
    async fn forwards_the_proxy_and_resource() {
        let client = Recorder::default();
        let validator = RemoteProxyValidator::new(client.clone());

        let mut upstream = Upstream::new(
            "petstore",
            UpstreamSpec {
                upstream_type: UpstreamType::Static(StaticUpstream::default()),
                ssl_config: None,
            },
        );
        upstream.metadata.namespace = Some("default".to_string());
        let resource = Resource::Upstream(upstream);

        let reports = validator
            .validate_proxy(&proxy(), Some(&resource), true)
            .await
            .expect("validation must succeed");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].proxy_report.proxy_name, "gateway-proxy");

        let requests = client.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].proxy, Some(proxy()));
        assert_eq!(
            requests[0].resources,
            Some(ResourceChange::Deleted {
                upstream_refs: vec![ResourceRef::new("default", "petstore")],
                secret_refs: vec![],
            })
        );
    }

    #[tokio::test]
    async fn call_failures_are_errors() {
        let client = Recorder {
            fail: true,
            ..Default::default()
        };
        let validator = RemoteProxyValidator::new(client);

        let error = validator
            .validate_proxy(&proxy(), None, false)
            .await
            .expect_err("validation must fail");
        assert!(
            format!("{error:#}").contains("validation server exploded"),
            "{error:#}"
        );
    }
}
