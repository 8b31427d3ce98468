//! Errors and warnings produced while rendering and validating proxies.

use crate::{Proxy, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors and warnings attributed to a single resource.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceReport {
    pub id: ResourceId,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Reports for every resource that was considered, in the order the
/// resources were first seen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ResourceReports(Vec<ResourceReport>);

/// Diagnostics collected from a report, one message per entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportErrors(pub Vec<String>);

/// Mirrors the structure of a rendered proxy with per-element diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyReport {
    pub proxy_name: String,
    #[serde(default)]
    pub listener_reports: Vec<ListenerReport>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerReport {
    pub name: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub virtual_host_reports: Vec<VirtualHostReport>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHostReport {
    pub name: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub route_reports: Vec<RouteReport>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    pub name: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// The outcome of deep-validating one proxy.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub proxy_report: ProxyReport,
    #[serde(default)]
    pub resource_reports: ResourceReports,
    /// The proxy that was validated, if the validator echoes it back.
    pub proxy: Option<Proxy>,
}

/// The proxies rendered while validating a mutation, with their reports.
///
/// Entries are keyed by proxy name; `proxies` and `proxy_reports` are kept
/// in the same order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reports {
    pub proxies: Vec<Proxy>,
    pub proxy_reports: Vec<ProxyReport>,
}

// === impl ResourceReports ===

impl ResourceReports {
    fn entry(&mut self, id: &ResourceId) -> &mut ResourceReport {
        let idx = match self.0.iter().position(|r| r.id == *id) {
            Some(idx) => idx,
            None => {
                self.0.push(ResourceReport {
                    id: id.clone(),
                    errors: vec![],
                    warnings: vec![],
                });
                self.0.len() - 1
            }
        };
        &mut self.0[idx]
    }

    /// Records that a resource was considered without adding diagnostics.
    pub fn accept(&mut self, id: &ResourceId) {
        self.entry(id);
    }

    pub fn add_error(&mut self, id: &ResourceId, error: impl ToString) {
        self.entry(id).errors.push(error.to_string());
    }

    pub fn add_warning(&mut self, id: &ResourceId, warning: impl ToString) {
        self.entry(id).warnings.push(warning.to_string());
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceReport> {
        self.0.iter().find(|r| r.id == *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceReport> + '_ {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends the diagnostics of `other`, combining entries for the same
    /// resource.
    pub fn extend(&mut self, other: ResourceReports) {
        for report in other.0 {
            let entry = self.entry(&report.id);
            entry.errors.extend(report.errors);
            entry.warnings.extend(report.warnings);
        }
    }

    /// Fails if any resource has errors.
    pub fn validate(&self) -> Result<(), ReportErrors> {
        self.check(true)
    }

    /// Fails if any resource has errors or warnings.
    pub fn validate_strict(&self) -> Result<(), ReportErrors> {
        self.check(false)
    }

    /// Fails if any resource has errors or, unless `allow_warnings` is set,
    /// warnings.
    pub fn check(&self, allow_warnings: bool) -> Result<(), ReportErrors> {
        let mut errors = vec![];
        for report in &self.0 {
            for e in &report.errors {
                errors.push(format!("{}: {}", report.id, e));
            }
            if !allow_warnings {
                for w in &report.warnings {
                    errors.push(format!("{}: warning: {}", report.id, w));
                }
            }
        }
        ReportErrors::into_result(errors)
    }
}

impl IntoIterator for ResourceReports {
    type Item = ResourceReport;
    type IntoIter = std::vec::IntoIter<ResourceReport>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// === impl ReportErrors ===

impl ReportErrors {
    fn into_result(errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            return Ok(());
        }
        Err(Self(errors))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ReportErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(e)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReportErrors {}

// === impl ProxyReport ===

impl ProxyReport {
    /// Builds an empty report shaped like the proxy.
    pub fn for_proxy(proxy: &Proxy) -> Self {
        let listener_reports = proxy
            .listeners
            .iter()
            .map(|l| ListenerReport {
                name: l.name.clone(),
                errors: vec![],
                warnings: vec![],
                virtual_host_reports: l
                    .virtual_hosts()
                    .map(|vh| VirtualHostReport {
                        name: vh.name.clone(),
                        errors: vec![],
                        warnings: vec![],
                        route_reports: vh
                            .routes
                            .iter()
                            .map(|r| RouteReport {
                                name: r.name.clone(),
                                errors: vec![],
                                warnings: vec![],
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            proxy_name: proxy.name.clone(),
            listener_reports,
        }
    }

    /// Drops every warning, leaving errors in place.
    pub fn strip_warnings(&mut self) {
        for l in &mut self.listener_reports {
            l.warnings.clear();
            for vh in &mut l.virtual_host_reports {
                vh.warnings.clear();
                for r in &mut vh.route_reports {
                    r.warnings.clear();
                }
            }
        }
    }

    /// Every error in the report, prefixed with its location.
    pub fn errors(&self) -> Vec<String> {
        self.messages(|errors, _| errors)
    }

    /// Every warning in the report, prefixed with its location.
    pub fn warnings(&self) -> Vec<String> {
        self.messages(|_, warnings| warnings)
    }

    fn messages<'r>(
        &'r self,
        pick: impl Fn(&'r [String], &'r [String]) -> &'r [String],
    ) -> Vec<String> {
        let mut out = vec![];
        for l in &self.listener_reports {
            for msg in pick(&l.errors, &l.warnings) {
                out.push(format!("listener {}: {}", l.name, msg));
            }
            for vh in &l.virtual_host_reports {
                for msg in pick(&vh.errors, &vh.warnings) {
                    out.push(format!(
                        "listener {}: virtual host {}: {}",
                        l.name, vh.name, msg
                    ));
                }
                for (i, r) in vh.route_reports.iter().enumerate() {
                    let route = r.name.clone().unwrap_or_else(|| format!("#{i}"));
                    for msg in pick(&r.errors, &r.warnings) {
                        out.push(format!(
                            "listener {}: virtual host {}: route {}: {}",
                            l.name, vh.name, route, msg
                        ));
                    }
                }
            }
        }
        out
    }
}

// === impl Reports ===

impl Reports {
    /// Records a proxy and its report, replacing any earlier entry for the
    /// same proxy name.
    pub fn insert(&mut self, proxy: Proxy, report: ProxyReport) {
        match self.proxies.iter().position(|p| p.name == proxy.name) {
            Some(idx) => {
                self.proxies[idx] = proxy;
                self.proxy_reports[idx] = report;
            }
            None => {
                self.proxies.push(proxy);
                self.proxy_reports.push(report);
            }
        }
    }

    /// Folds `other` into `self`; later entries win per proxy name.
    pub fn merge(&mut self, other: Reports) {
        for (proxy, report) in other.proxies.into_iter().zip(other.proxy_reports) {
            self.insert(proxy, report);
        }
    }

    pub fn proxy(&self, name: &str) -> Option<&Proxy> {
        self.proxies.iter().find(|p| p.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kind;

    fn vs(name: &str) -> ResourceId {
        ResourceId::new(Kind::VirtualService, "default", name)
    }

    fn proxy(name: &str) -> Proxy {
        Proxy {
            name: name.to_string(),
            namespace: "gloo-system".to_string(),
            listeners: vec![],
        }
    }

    #[test]
    fn warnings_fail_only_strict_validation() {
        let mut reports = ResourceReports::default();
        reports.accept(&vs("clean"));
        reports.add_warning(&vs("noisy"), "route is shadowed");
        assert!(reports.validate().is_ok());

        let err = reports.validate_strict().expect_err("warnings must fail");
        assert_eq!(
            err.to_string(),
            "VirtualService default.noisy: warning: route is shadowed"
        );

        reports.add_error(&vs("broken"), "upstream not found");
        let err = reports.validate().expect_err("errors must fail");
        assert_eq!(err.0, vec!["VirtualService default.broken: upstream not found"]);
    }

    #[test]
    fn extend_combines_entries() {
        let mut a = ResourceReports::default();
        a.add_error(&vs("one"), "first");
        let mut b = ResourceReports::default();
        b.add_error(&vs("one"), "second");
        b.add_warning(&vs("two"), "third");
        a.extend(b);

        assert_eq!(a.iter().count(), 2);
        let one = a.get(&vs("one")).expect("must be present");
        assert_eq!(one.errors, vec!["first", "second"]);
    }

    #[test]
    fn merge_replaces_by_proxy_name() {
        let mut reports = Reports::default();
        reports.insert(proxy("a"), ProxyReport::default());
        reports.insert(proxy("b"), ProxyReport::default());

        let mut later = Reports::default();
        let replaced = ProxyReport {
            proxy_name: "a".to_string(),
            listener_reports: vec![],
        };
        later.insert(proxy("a"), replaced.clone());
        reports.merge(later);

        assert_eq!(reports.proxies.len(), 2);
        assert_eq!(reports.proxy_reports[0], replaced);
        assert!(reports.proxy("b").is_some());
    }

    #[test]
    fn proxy_report_messages_carry_location() {
        let report = ProxyReport {
            proxy_name: "gateway-proxy".to_string(),
            listener_reports: vec![ListenerReport {
                name: "listener-::-8080".to_string(),
                errors: vec!["duplicate port".to_string()],
                warnings: vec![],
                virtual_host_reports: vec![VirtualHostReport {
                    name: "default.petstore".to_string(),
                    errors: vec![],
                    warnings: vec![],
                    route_reports: vec![RouteReport {
                        name: None,
                        errors: vec![],
                        warnings: vec!["unreachable".to_string()],
                    }],
                }],
            }],
        };
        assert_eq!(report.errors(), vec!["listener listener-::-8080: duplicate port"]);
        assert_eq!(
            report.warnings(),
            vec!["listener listener-::-8080: virtual host default.petstore: route #0: unreachable"]
        );
    }
}
