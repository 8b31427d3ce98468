use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use gateway_validation_core::{
    k8s::gateway::PathMatch,
    proxy::{ListenerKind, Proxy, Route, RouteAction, VirtualHost},
    report::{RouteReport, VirtualHostReport},
    ProxyReport, Resource, ResourceReports, ValidateProxy, ValidationReport,
};

/// Structural checks on a rendered proxy, run in process.
///
/// Always produces exactly one report.
#[derive(Clone, Debug, Default)]
pub struct LocalProxyValidator(());

// === impl LocalProxyValidator ===

impl LocalProxyValidator {
    pub fn new() -> Self {
        Self(())
    }

    pub fn validate(&self, proxy: &Proxy) -> ValidationReport {
        let mut report = ProxyReport::for_proxy(proxy);

        let mut names = HashSet::new();
        let mut ports = HashMap::new();
        for (listener, lr) in proxy.listeners.iter().zip(&mut report.listener_reports) {
            if !names.insert(listener.name.as_str()) {
                lr.errors
                    .push(format!("duplicate listener name {}", listener.name));
            }
            if let Some(other) = ports.insert(listener.bind_port, listener.name.as_str()) {
                lr.errors.push(format!(
                    "bind port {} is already used by listener {other}",
                    listener.bind_port
                ));
            }

            // Domains must be unique within each HTTP filter chain.
            let chains: Vec<&[VirtualHost]> = match &listener.kind {
                ListenerKind::Http(vhosts) => vec![vhosts.as_slice()],
                ListenerKind::Tcp(_) => vec![],
                ListenerKind::Hybrid(matched) => {
                    matched.iter().map(|m| &m.virtual_hosts[..]).collect()
                }
            };
            let mut vh_reports = lr.virtual_host_reports.iter_mut();
            for vhosts in chains {
                let mut domains = HashMap::new();
                for (vh, vhr) in vhosts.iter().zip(vh_reports.by_ref()) {
                    check_virtual_host(vh, vhr, &mut domains);
                }
            }
        }

        ValidationReport {
            proxy_report: report,
            resource_reports: ResourceReports::default(),
            proxy: Some(proxy.clone()),
        }
    }
}

#[async_trait::async_trait]
impl ValidateProxy for LocalProxyValidator {
    async fn validate_proxy(
        &self,
        proxy: &Proxy,
        _: Option<&Resource>,
        _: bool,
    ) -> anyhow::Result<Vec<ValidationReport>> {
        Ok(vec![self.validate(proxy)])
    }
}

fn check_virtual_host<'p>(
    vh: &'p VirtualHost,
    report: &mut VirtualHostReport,
    domains: &mut HashMap<&'p str, &'p str>,
) {
    if vh.domains.is_empty() {
        report.errors.push("virtual host has no domains".to_string());
    }
    for domain in &vh.domains {
        if let Some(other) = domains.insert(domain.as_str(), vh.name.as_str()) {
            report.errors.push(format!(
                "domain {domain} is already declared by virtual host {other}"
            ));
        }
    }

    let mut catch_all = false;
    for (route, rr) in vh.routes.iter().zip(&mut report.route_reports) {
        check_route(route, rr);
        if catch_all {
            rr.warnings.push(
                "route is unreachable because an earlier route matches every request".to_string(),
            );
        }
        catch_all |= route.matchers.iter().any(|m| m.is_catch_all());
    }
}

fn check_route(route: &Route, report: &mut RouteReport) {
    for m in &route.matchers {
        if m.path_specifiers() > 1 {
            report
                .errors
                .push("matcher sets more than one path specifier".to_string());
        }
        if let PathMatch::Regex(re) = m.path() {
            if let Err(error) = regex::Regex::new(re) {
                report.errors.push(format!("invalid regex {re}: {error}"));
            }
        }
    }

    if let Some(rewrite) = route.options.as_ref().and_then(|o| o.prefix_rewrite.as_deref()) {
        if !rewrite.is_empty() && !rewrite.starts_with('/') {
            report
                .errors
                .push(format!("prefix rewrite {rewrite} must start with /"));
        }
    }

    if let RouteAction::Weighted(dsts) = &route.action {
        if dsts.iter().map(|d| d.weight).sum::<u32>() == 0 {
            report
                .errors
                .push("weighted destinations have a total weight of zero".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_validation_core::{
        k8s::{
            gateway::{Matcher, RouteOptions},
            ResourceRef,
        },
        proxy::{Listener, WeightedUpstream},
        Kind, ResourceId,
    };

    fn route(matcher: Matcher, action: RouteAction) -> Route {
        Route {
            name: None,
            source: ResourceId::new(Kind::VirtualService, "default", "vs"),
            matchers: vec![matcher],
            options: None,
            action,
        }
    }

    fn upstream() -> RouteAction {
        RouteAction::Upstream(ResourceRef::new("default", "us"))
    }

    fn vhost(name: &str, domains: &[&str], routes: Vec<Route>) -> VirtualHost {
        VirtualHost {
            name: name.to_string(),
            source: ResourceId::new(Kind::VirtualService, "default", name),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            routes,
            options: None,
            ssl_secret: None,
        }
    }

    fn listener(port: u32, vhosts: Vec<VirtualHost>) -> Listener {
        Listener {
            name: format!("listener-::-{port}"),
            bind_address: "::".to_string(),
            bind_port: port,
            ssl: false,
            source: ResourceId::new(Kind::Gateway, "gloo-system", "gw"),
            kind: ListenerKind::Http(vhosts),
        }
    }

    fn proxy(listeners: Vec<Listener>) -> Proxy {
        Proxy {
            name: "gateway-proxy".to_string(),
            namespace: "gloo-system".to_string(),
            listeners,
        }
    }

    #[tokio::test]
    async fn returns_one_report_per_proxy() {
        let proxy = proxy(vec![listener(
            8080,
            vec![vhost("default.vs", &["example.com"], vec![route(Matcher::prefix("/"), upstream())])],
        )]);
        let reports = LocalProxyValidator::new()
            .validate_proxy(&proxy, None, false)
            .await
            .expect("validation must succeed");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].proxy_report.errors().is_empty());
        assert!(reports[0].proxy_report.warnings().is_empty());
        assert_eq!(reports[0].proxy.as_ref(), Some(&proxy));
    }

    #[test]
    fn rejects_duplicate_listeners_and_domains() {
        let proxy = proxy(vec![
            listener(
                8080,
                vec![
                    vhost("default.a", &["example.com"], vec![]),
                    vhost("default.b", &["example.com"], vec![]),
                ],
            ),
            listener(8080, vec![]),
        ]);
        let report = LocalProxyValidator::new().validate(&proxy).proxy_report;
        let errors = report.errors();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].contains("domain example.com is already declared by virtual host default.a"));
        assert!(errors[1].contains("duplicate listener name"));
        assert!(errors[2].contains("bind port 8080 is already used"));
    }

    #[test]
    fn checks_routes() {
        let bad_regex = Matcher {
            regex: Some("(".to_string()),
            ..Default::default()
        };
        let mut rewrite = route(Matcher::prefix("/api"), upstream());
        rewrite.options = Some(RouteOptions {
            prefix_rewrite: Some("v2".to_string()),
            ..Default::default()
        });
        let zero_weight = route(
            Matcher::prefix("/weighted"),
            RouteAction::Weighted(vec![WeightedUpstream {
                upstream: ResourceRef::new("default", "us"),
                weight: 0,
            }]),
        );
        let proxy = proxy(vec![listener(
            8080,
            vec![vhost(
                "default.vs",
                &["example.com"],
                vec![route(bad_regex, upstream()), rewrite, zero_weight],
            )],
        )]);

        let report = LocalProxyValidator::new().validate(&proxy).proxy_report;
        let errors = report.errors();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].contains("route #0: invalid regex ("));
        assert!(errors[1].contains("route #1: prefix rewrite v2 must start with /"));
        assert!(errors[2].contains("route #2: weighted destinations have a total weight of zero"));
    }

    #[test]
    fn warns_on_shadowed_routes() {
        let proxy = proxy(vec![listener(
            8080,
            vec![vhost(
                "default.vs",
                &["*"],
                vec![
                    route(Matcher::prefix("/"), upstream()),
                    route(Matcher::prefix("/api"), upstream()),
                ],
            )],
        )]);

        let report = LocalProxyValidator::new().validate(&proxy).proxy_report;
        assert!(report.errors().is_empty());
        let warnings = report.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("route #1: route is unreachable"));
    }
}
