use crate::{
    admission::Admission,
    core::{
        k8s::{
            gateway::{
                Gateway, MatchableHttpGateway, RouteOption, RouteTable, VirtualHostOption,
                VirtualService,
            },
            gloo::{Endpoint, Upstream},
            Resource, Secret,
        },
        Kind, ValidateProxy,
    },
    grpc::{
        default_backoff, GrpcValidationClient, RemoteProxyValidator, ResilientClient,
        ResyncNotifier,
    },
    index::SnapshotIndex,
    sync,
    translator::{GatewayTranslator, LocalProxyValidator},
    validator::{SnapshotValidator, ValidatorConfig, ValidatorMetrics},
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::{runtime::watcher, Client};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, info_span, warn, Instrument};

const RECONCILIATION_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[clap(
    name = "gateway-validation",
    about = "Validates gateway configuration before it is admitted"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway_validation=info,warn",
        env = "GATEWAY_VALIDATION_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// Namespace proxies are rendered into.
    #[clap(long, default_value = "gloo-system")]
    write_namespace: String,

    /// Address of the validation server that deep-validates rendered proxies.
    ///
    /// When unset, proxies are only checked locally.
    #[clap(long)]
    validation_server_addr: Option<String>,

    /// Admit resources whose validation produced warnings.
    #[clap(long)]
    allow_warnings: bool,

    /// Admit resources that fail validation, returning the errors as
    /// warnings. Resources that cannot be decoded are still denied.
    #[clap(long)]
    always_accept: bool,

    /// Do not compare secret deletions against the errors the current
    /// configuration already has.
    #[clap(long)]
    disable_validation_against_previous_state: bool,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            write_namespace,
            validation_server_addr,
            allow_warnings,
            always_accept,
            disable_validation_against_previous_state,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let mut prom = <Registry>::default();
        let metrics = ValidatorMetrics::register(prom.sub_registry_with_prefix("validation"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        // Proxies are deep-validated by the validation server when one is
        // configured. Its resync notifications trigger a re-render of the
        // baseline.
        let mut resyncs = None;
        let proxy_validator: Arc<dyn ValidateProxy> = match validation_server_addr {
            Some(addr) => {
                let client = validation_client(addr)?;
                let notifier = ResyncNotifier::new(client.clone());
                resyncs = Some(notifier.spawn(runtime.shutdown_handle()));
                Arc::new(RemoteProxyValidator::new(client))
            }
            None => {
                info!("No validation server configured; proxies are validated locally");
                Arc::new(LocalProxyValidator::new())
            }
        };

        let validator = Arc::new(SnapshotValidator::new(
            Arc::new(GatewayTranslator::new(&write_namespace)),
            proxy_validator,
            ValidatorConfig {
                allow_warnings,
                disable_validation_against_previous_state,
            },
            metrics,
        ));

        // Spawn resource watches. Kinds whose CRDs are not installed are not
        // waited on.
        let mut watched = vec![Kind::Secret];
        let client = runtime.client();
        for (kind, exists) in [
            (Kind::Gateway, api_resource_exists::<Gateway>(&client).await),
            (
                Kind::MatchableHttpGateway,
                api_resource_exists::<MatchableHttpGateway>(&client).await,
            ),
            (
                Kind::VirtualService,
                api_resource_exists::<VirtualService>(&client).await,
            ),
            (Kind::RouteTable, api_resource_exists::<RouteTable>(&client).await),
            (Kind::RouteOption, api_resource_exists::<RouteOption>(&client).await),
            (
                Kind::VirtualHostOption,
                api_resource_exists::<VirtualHostOption>(&client).await,
            ),
            (Kind::Upstream, api_resource_exists::<Upstream>(&client).await),
            (Kind::Endpoint, api_resource_exists::<Endpoint>(&client).await),
        ] {
            if exists {
                watched.push(kind);
            } else {
                warn!(%kind, "Resource kind not found, skipping watches");
            }
        }
        let index = SnapshotIndex::shared(watched.iter().copied());

        if watched.contains(&Kind::Gateway) {
            let gateways = runtime.watch_all::<Gateway>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), gateways)
                    .instrument(info_span!("gateways")),
            );
        }

        if watched.contains(&Kind::MatchableHttpGateway) {
            let http_gateways =
                runtime.watch_all::<MatchableHttpGateway>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), http_gateways)
                    .instrument(info_span!("matchablehttpgateways")),
            );
        }

        if watched.contains(&Kind::VirtualService) {
            let virtual_services = runtime.watch_all::<VirtualService>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), virtual_services)
                    .instrument(info_span!("virtualservices")),
            );
        }

        if watched.contains(&Kind::RouteTable) {
            let route_tables = runtime.watch_all::<RouteTable>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), route_tables)
                    .instrument(info_span!("routetables")),
            );
        }

        if watched.contains(&Kind::RouteOption) {
            let route_options = runtime.watch_all::<RouteOption>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), route_options)
                    .instrument(info_span!("routeoptions")),
            );
        }

        if watched.contains(&Kind::VirtualHostOption) {
            let vhost_options = runtime.watch_all::<VirtualHostOption>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), vhost_options)
                    .instrument(info_span!("virtualhostoptions")),
            );
        }

        if watched.contains(&Kind::Upstream) {
            let upstreams = runtime.watch_all::<Upstream>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), upstreams)
                    .instrument(info_span!("upstreams")),
            );
        }

        if watched.contains(&Kind::Endpoint) {
            let endpoints = runtime.watch_all::<Endpoint>(watcher::Config::default());
            tokio::spawn(
                kubert::index::namespaced(index.clone(), endpoints)
                    .instrument(info_span!("endpoints")),
            );
        }

        let secrets = runtime.watch_all::<Secret>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), secrets).instrument(info_span!("secrets")),
        );

        // Push the index into the validator as it changes.
        tokio::spawn(
            sync::run(index, validator.clone(), resyncs, RECONCILIATION_PERIOD)
                .instrument(info_span!("sync")),
        );

        let runtime = runtime.spawn_server(move || Admission::new(validator, always_accept));

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

fn validation_client(addr: String) -> Result<ResilientClient<GrpcValidationClient>> {
    let client = GrpcValidationClient::connect_lazy(&addr)?;
    info!(%addr, "Using validation server");
    Ok(ResilientClient::new(
        client,
        move || {
            let addr = addr.clone();
            async move { GrpcValidationClient::connect(&addr).await }
        },
        default_backoff(),
    ))
}

async fn api_resource_exists<T>(client: &Client) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    client
        .list_api_group_resources(&T::api_version(&dt))
        .await
        .ok()
        .iter()
        .flat_map(|r| r.resources.iter())
        .any(|r| r.kind == T::kind(&dt))
}
