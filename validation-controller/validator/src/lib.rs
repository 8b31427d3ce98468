#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod error;
mod metrics;


pub use self::{
    error::{BatchError, Error, ItemError, Violation, Violations},
    metrics::ValidatorMetrics,
};
use gateway_validation_core::{
    deletion_is_supported,
    k8s::{DynamicObject, GroupVersionKind},
    modification_is_supported, Kind, Proxy, ProxyReport, ReportErrors, Reports, Resource, Snapshot,
    Translate, ValidateProxy, ValidationReport,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Message logged when mutations are admitted without validation because
/// the stored configuration itself is invalid.
pub const INVALID_SNAPSHOT_MESSAGE: &str = "validation is disabled due to an invalid resource which has been written to storage. Please correct any Rejected resources to re-enable validation.";

#[derive(Clone, Debug, Default)]
pub struct ValidatorConfig {
    /// Treat warnings as non-fatal.
    pub allow_warnings: bool,

    /// Validate secret deletions without comparing against the errors the
    /// current configuration already has.
    pub disable_validation_against_previous_state: bool,
}

/// Validates proposed mutations against the last synced snapshot.
///
/// Every mutation is applied to a copy of the baseline, rendered, and
/// validated; only mutations that pass are committed, and only when the
/// caller did not request a dry run. All mutation paths hold the state's
/// write lock for the whole transaction.
pub struct SnapshotValidator {
    state: RwLock<State>,
    translator: Arc<dyn Translate>,
    proxy_validator: Arc<dyn ValidateProxy>,
    config: ValidatorConfig,
    metrics: ValidatorMetrics,
    hasher: ahash::RandomState,
}

#[derive(Clone, Debug, Default)]
struct State {
    latest: Option<Snapshot>,

    /// Hash of the baseline's gateway resources.
    hash: Option<u64>,

    /// Set when the baseline failed to translate on its last full sync.
    sync_error: Option<Violations>,
}

/// Describes a single mutation to validate.
struct Mutation<'r> {
    resource: &'r Resource,
    delete: bool,

    /// Apply the mutation to the given state when it passes.
    commit: bool,

    /// Reflect the outcome in the health signal.
    record_health: bool,
}

// === impl SnapshotValidator ===

impl SnapshotValidator {
    pub fn new(
        translator: Arc<dyn Translate>,
        proxy_validator: Arc<dyn ValidateProxy>,
        config: ValidatorConfig,
        metrics: ValidatorMetrics,
    ) -> Self {
        Self {
            state: RwLock::new(State::default()),
            translator,
            proxy_validator,
            config,
            metrics,
            hasher: ahash::RandomState::new(),
        }
    }

    pub fn modification_is_supported(gvk: &GroupVersionKind) -> bool {
        modification_is_supported(gvk)
    }

    pub fn deletion_is_supported(gvk: &GroupVersionKind) -> bool {
        deletion_is_supported(gvk)
    }

    /// True once a snapshot has been synced.
    pub async fn is_ready(&self) -> bool {
        self.state.read().await.latest.is_some()
    }

    /// Returns a copy of the committed baseline.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.state.read().await.latest.clone()
    }

    pub fn metrics(&self) -> &ValidatorMetrics {
        &self.metrics
    }

    /// Installs a new baseline.
    ///
    /// When the gateway resources are unchanged since the last successful
    /// sync, the snapshot is installed without translating. Otherwise every
    /// proxy is translated; the snapshot is installed even if that fails,
    /// but the health signal is marked invalid and mutations are admitted
    /// without validation until a later sync succeeds.
    ///
    /// Only translation is checked here. The secondary validator is never
    /// consulted, so its availability cannot disable mutation validation.
    #[tracing::instrument(skip_all)]
    pub async fn sync(&self, snapshot: Snapshot) -> Result<(), Violations> {
        let mut state = self.state.write().await;
        let hash = self.hash(&snapshot);
        if state.latest.is_some()
            && state.sync_error.is_none()
            && hash.is_some()
            && hash == state.hash
        {
            debug!("Gateway resources unchanged");
            state.latest = Some(snapshot);
            return Ok(());
        }

        state.hash = hash;
        self.install_baseline(&mut state, snapshot)
    }

    /// Translates the current baseline regardless of whether it changed.
    #[tracing::instrument(skip_all)]
    pub async fn resync(&self) -> Result<(), Violations> {
        let mut state = self.state.write().await;
        match state.latest.clone() {
            Some(snapshot) => self.install_baseline(&mut state, snapshot),
            None => Ok(()),
        }
    }

    /// Validates the creation or update of a resource.
    #[tracing::instrument(skip_all, fields(resource = %resource))]
    pub async fn validate_modified_gvk(
        &self,
        gvk: &GroupVersionKind,
        resource: &Resource,
        dry_run: bool,
    ) -> Result<Reports, Error> {
        if !modification_is_supported(gvk) {
            return Err(Error::UnsupportedResource(gvk.clone()));
        }

        let mut state = self.state.write().await;
        self.validate_mutation(
            &mut state,
            Mutation {
                resource,
                delete: false,
                commit: !dry_run,
                record_health: !dry_run,
            },
        )
        .await
    }

    /// Validates the deletion of a resource. Deleting a resource whose type
    /// is not validated always succeeds.
    #[tracing::instrument(skip_all, fields(resource = %resource))]
    pub async fn validate_deleted_gvk(
        &self,
        gvk: &GroupVersionKind,
        resource: &Resource,
        dry_run: bool,
    ) -> Result<(), Error> {
        if !deletion_is_supported(gvk) {
            debug!("Deletion is not validated for this type");
            return Ok(());
        }

        let mut state = self.state.write().await;
        self.validate_mutation(
            &mut state,
            Mutation {
                resource,
                delete: true,
                commit: !dry_run,
                record_health: !dry_run,
            },
        )
        .await?;
        Ok(())
    }

    /// Validates an ordered batch of creations and updates.
    ///
    /// Each item is validated against the baseline with every earlier
    /// passing item applied. Passing items are committed unless `dry_run` is
    /// set, in which case the baseline is left untouched.
    #[tracing::instrument(skip_all, fields(items = objects.len()))]
    pub async fn validate_list(
        &self,
        objects: &[DynamicObject],
        dry_run: bool,
    ) -> Result<Reports, Error> {
        let mut state = self.state.write().await;
        if state.latest.is_none() {
            return Err(Error::NotReady);
        }

        let mut working = state.clone();
        let mut reports = Reports::default();
        let mut errors = vec![];
        for (index, obj) in objects.iter().enumerate() {
            match self.validate_item(&mut working, obj, dry_run).await {
                Ok(r) => reports.merge(r),
                Err(error) => {
                    if let Some(r) = error.reports() {
                        reports.merge(r.clone());
                    }
                    errors.push(ItemError { index, error });
                }
            }
        }

        if !dry_run {
            *state = working;
        }

        if errors.is_empty() {
            return Ok(reports);
        }
        Err(BatchError {
            reports: Box::new(reports),
            errors,
        }
        .into())
    }

    async fn validate_item(
        &self,
        working: &mut State,
        obj: &DynamicObject,
        dry_run: bool,
    ) -> Result<Reports, Error> {
        let resource = Resource::from_dynamic(obj)?;
        let gvk = resource.kind().gvk();
        if !modification_is_supported(&gvk) {
            return Err(Error::UnsupportedResource(gvk));
        }

        self.validate_mutation(
            working,
            Mutation {
                resource: &resource,
                delete: false,
                commit: true,
                record_health: !dry_run,
            },
        )
        .await
    }

    /// Runs the clone, mutate, render, validate, commit sequence against
    /// `state`.
    async fn validate_mutation(
        &self,
        state: &mut State,
        mutation: Mutation<'_>,
    ) -> Result<Reports, Error> {
        let Mutation {
            resource,
            delete,
            commit,
            record_health,
        } = mutation;

        let Some(latest) = state.latest.as_ref() else {
            return Err(Error::NotReady);
        };

        if let Some(error) = state.sync_error.as_ref() {
            warn!(%error, "{}", INVALID_SNAPSHOT_MESSAGE);
            if record_health {
                self.metrics.set_valid(false);
            }
            return Ok(Reports::default());
        }

        let mut candidate = latest.clone();
        apply(&mut candidate, resource, delete);

        let compare_previous = delete
            && resource.kind() == Kind::Secret
            && !self.config.disable_validation_against_previous_state;
        let (reports, violations) = self
            .render(&candidate, Some(resource), delete, compare_previous)
            .await;

        if !violations.is_empty() {
            let accepted = compare_previous
                && !violations.has_breaking()
                && self.matches_previous(latest, &reports, &violations).await;
            if !accepted {
                info!(%violations, "Rejected");
                if record_health {
                    self.metrics.set_valid(false);
                }
                return Err(Error::Rejected {
                    id: resource.id(),
                    reports: Box::new(reports),
                    violations,
                });
            }
            debug!("Deletion does not introduce new errors");
        }

        if record_health {
            self.metrics.set_valid(true);
        }
        if commit {
            if let Some(latest) = state.latest.as_mut() {
                apply(latest, resource, delete);
                state.hash = self.hash(latest);
            }
        }
        Ok(reports)
    }

    /// Checks whether the baseline, validated without any mutation, has
    /// exactly the same problems as the candidate.
    async fn matches_previous(
        &self,
        latest: &Snapshot,
        reports: &Reports,
        violations: &Violations,
    ) -> bool {
        let (previous, previous_violations) = self.render(latest, None, false, true).await;
        if previous_violations != *violations || previous.proxies != reports.proxies {
            return false;
        }
        let mut previous = previous.proxy_reports;
        let mut current = reports.proxy_reports.clone();
        if self.config.allow_warnings {
            previous.iter_mut().for_each(ProxyReport::strip_warnings);
            current.iter_mut().for_each(ProxyReport::strip_warnings);
        }
        previous == current
    }

    fn install_baseline(&self, state: &mut State, snapshot: Snapshot) -> Result<(), Violations> {
        let first = state.latest.is_none();
        let mut violations = Violations::default();
        let proxies = snapshot.gateways_by_proxy_name();
        for (proxy_name, gateways) in &proxies {
            let (_, reports) = self.translator.translate(proxy_name, &snapshot, gateways);
            if let Err(errors) = reports.check(self.config.allow_warnings) {
                violations.push(Violation::Render {
                    proxy: proxy_name.clone(),
                    errors,
                });
            }
        }
        state.latest = Some(snapshot);

        if !violations.is_empty() {
            warn!(%violations, "Snapshot is invalid");
            self.metrics.set_valid(false);
            state.sync_error = Some(violations.clone());
            return Err(violations);
        }

        info!(proxies = proxies.len(), "Snapshot is valid");
        state.sync_error = None;
        if first {
            self.metrics.set_valid(true);
        }
        Ok(())
    }

    /// Renders and validates every proxy of the snapshot.
    ///
    /// Unless `collect_all` is set, a proxy that fails to render is not sent
    /// to the secondary validator.
    async fn render(
        &self,
        snapshot: &Snapshot,
        resource: Option<&Resource>,
        delete: bool,
        collect_all: bool,
    ) -> (Reports, Violations) {
        let mut reports = Reports::default();
        let mut violations = Violations::default();

        for (proxy_name, gateways) in snapshot.gateways_by_proxy_name() {
            let (proxy, resource_reports) =
                self.translator.translate(&proxy_name, snapshot, &gateways);
            let rendered = resource_reports.check(self.config.allow_warnings);
            let render_ok = rendered.is_ok();
            if let Err(errors) = rendered {
                violations.push(Violation::Render {
                    proxy: proxy_name.clone(),
                    errors,
                });
            }

            // A proxy without listeners is not an error.
            let Some(proxy) = proxy else {
                debug!(proxy = %proxy_name, "No listeners");
                continue;
            };

            if !render_ok && !collect_all {
                let report = ProxyReport::for_proxy(&proxy);
                reports.insert(proxy, report);
                continue;
            }

            let report = self
                .validate_proxy(&proxy, resource, delete, &mut violations)
                .await;
            reports.insert(proxy, report);
        }

        (reports, violations)
    }

    async fn validate_proxy(
        &self,
        proxy: &Proxy,
        resource: Option<&Resource>,
        delete: bool,
        violations: &mut Violations,
    ) -> ProxyReport {
        let mut validated = match self
            .proxy_validator
            .validate_proxy(proxy, resource, delete)
            .await
        {
            Ok(validated) => validated,
            Err(error) => {
                let message = format!("{error:#}");
                warn!(proxy = %proxy.name, error = %message, "Secondary validation failed");
                violations.push(Violation::SecondaryValidation {
                    proxy: proxy.name.clone(),
                    message,
                });
                return ProxyReport::for_proxy(proxy);
            }
        };

        if validated.len() != 1 {
            warn!(proxy = %proxy.name, reports = validated.len(), "Unexpected validation response");
            violations.push(Violation::ResponseShape {
                proxy: proxy.name.clone(),
                count: validated.len(),
            });
            return ProxyReport::for_proxy(proxy);
        }

        let ValidationReport {
            proxy_report,
            resource_reports,
            ..
        } = validated.remove(0);

        let errors = proxy_report.errors();
        if !errors.is_empty() {
            violations.push(Violation::ProxyRejected {
                proxy: proxy.name.clone(),
                errors: ReportErrors(errors),
            });
        }
        if !self.config.allow_warnings {
            let warnings = proxy_report.warnings();
            if !warnings.is_empty() {
                violations.push(Violation::Warning {
                    proxy: proxy.name.clone(),
                    warnings: ReportErrors(warnings),
                });
            }
        }
        if let Err(errors) = resource_reports.check(self.config.allow_warnings) {
            violations.push(Violation::ResourceReports {
                proxy: proxy.name.clone(),
                errors,
            });
        }

        proxy_report
    }

    /// Hashes the gateway resources of a snapshot. Returns `None` if they
    /// cannot be serialized, which is treated as a change.
    fn hash(&self, snapshot: &Snapshot) -> Option<u64> {
        match serde_json::to_vec(&snapshot.gateway_resources()) {
            Ok(bytes) => Some(self.hasher.hash_one(bytes)),
            Err(error) => {
                warn!(%error, "Failed to hash gateway resources");
                None
            }
        }
    }
}

fn apply(snapshot: &mut Snapshot, resource: &Resource, delete: bool) {
    if delete {
        snapshot.remove(&resource.id());
    } else {
        snapshot.upsert(resource.clone());
    }
}
