use gateway_validation_core::{
    k8s::{
        self,
        gateway::{
            Action, DelegateAction, DelegatedHttpGateway, Gateway, GatewayType, HttpGateway,
            MatchableHttpGateway, PathMatch, Route, RouteAction as RouteActionSpec, RouteOptions,
            RouteTable, VirtualHostOptions, VirtualService,
        },
        ObjectMeta, ResourceRef,
    },
    proxy::{
        self, Listener, ListenerKind, MatchedHttpListener, Proxy, RouteAction, TcpHost,
        VirtualHost, WeightedUpstream,
    },
    Kind, ResourceId, ResourceReports, Snapshot, Translate,
};
use std::collections::BTreeMap;

/// Renders gateways into proxies, checking that every reference resolves.
#[derive(Clone, Debug)]
pub struct GatewayTranslator {
    write_namespace: String,
}

/// State for a single `translate` call.
struct Translation<'s> {
    snapshot: &'s Snapshot,
    reports: ResourceReports,
}

/// What a delegating route passes down to the routes it delegates to.
struct Parent {
    prefixes: Vec<String>,
    options: Option<RouteOptions>,
}

// === impl GatewayTranslator ===

impl GatewayTranslator {
    /// Rendered proxies are placed in `write_namespace`.
    pub fn new(write_namespace: impl ToString) -> Self {
        Self {
            write_namespace: write_namespace.to_string(),
        }
    }
}

impl Translate for GatewayTranslator {
    fn translate(
        &self,
        proxy_name: &str,
        snapshot: &Snapshot,
        gateways: &[Gateway],
    ) -> (Option<Proxy>, ResourceReports) {
        let mut tx = Translation {
            snapshot,
            reports: ResourceReports::default(),
        };
        let listeners = gateways
            .iter()
            .map(|gw| tx.listener(gw))
            .collect::<Vec<_>>();
        tracing::debug!(proxy = %proxy_name, listeners = listeners.len(), "Translated proxy");

        if listeners.is_empty() {
            return (None, tx.reports);
        }
        let proxy = Proxy {
            name: proxy_name.to_string(),
            namespace: self.write_namespace.clone(),
            listeners,
        };
        (Some(proxy), tx.reports)
    }
}

// === impl Translation ===

impl<'s> Translation<'s> {
    fn listener(&mut self, gw: &Gateway) -> Listener {
        let id = id_of(Kind::Gateway, gw);
        self.reports.accept(&id);

        let kind = match &gw.spec.gateway_type {
            GatewayType::Http(http) => {
                let vss = self.select_virtual_services(&id, http, gw.spec.ssl);
                ListenerKind::Http(self.virtual_hosts(&vss))
            }
            GatewayType::Tcp(tcp) => ListenerKind::Tcp(
                tcp.tcp_hosts
                    .iter()
                    .map(|host| TcpHost {
                        name: host.name.clone(),
                        upstream: self.upstream(&id, &host.destination.upstream),
                    })
                    .collect(),
            ),
            GatewayType::Hybrid(hybrid) => {
                ListenerKind::Hybrid(self.matched_listeners(&id, &hybrid.delegated_http_gateways))
            }
        };

        Listener {
            name: format!("listener-{}-{}", gw.spec.bind_address, gw.spec.bind_port),
            bind_address: gw.spec.bind_address.clone(),
            bind_port: gw.spec.bind_port,
            ssl: gw.spec.ssl,
            source: id,
            kind,
        }
    }

    fn matched_listeners(
        &mut self,
        gw_id: &ResourceId,
        delegated: &DelegatedHttpGateway,
    ) -> Vec<MatchedHttpListener> {
        let snapshot = self.snapshot;
        let selected: Vec<&'s MatchableHttpGateway> = match &delegated.reference {
            Some(r) => {
                let r = r.resolve(&gw_id.namespace);
                match snapshot.http_gateway(&r) {
                    Some(hgw) => vec![hgw],
                    None => {
                        self.reports
                            .add_error(gw_id, format!("matchable http gateway {r} not found"));
                        return vec![];
                    }
                }
            }
            None => snapshot
                .http_gateways
                .iter()
                .filter(|hgw| {
                    namespace_selected(&delegated.namespaces, ns_of(*hgw), None)
                        && delegated
                            .selector
                            .as_ref()
                            .map_or(true, |sel| labels_match(sel, &hgw.metadata))
                })
                .collect(),
        };

        let mut listeners = Vec::with_capacity(selected.len());
        for hgw in selected {
            let id = id_of(Kind::MatchableHttpGateway, hgw);
            self.reports.accept(&id);
            let matcher = hgw.spec.matcher.clone().unwrap_or_default();
            let ssl = matcher.ssl_config.is_some();
            let vss = self.select_virtual_services(&id, &hgw.spec.http_gateway, ssl);
            let virtual_hosts = self.virtual_hosts(&vss);
            listeners.push(MatchedHttpListener {
                source: id,
                matcher,
                virtual_hosts,
            });
        }
        listeners
    }

    /// Selects the virtual services an HTTP listener serves. Listeners with
    /// TLS only serve virtual services that configure it, and vice versa.
    fn select_virtual_services(
        &mut self,
        owner: &ResourceId,
        http: &HttpGateway,
        ssl: bool,
    ) -> Vec<&'s VirtualService> {
        let snapshot = self.snapshot;
        let candidates = if http.virtual_services.is_empty() {
            snapshot
                .virtual_services
                .iter()
                .filter(|vs| {
                    namespace_selected(&http.virtual_service_namespaces, ns_of(*vs), None)
                        && http
                            .virtual_service_selector
                            .as_ref()
                            .map_or(true, |sel| labels_match(sel, &vs.metadata))
                })
                .collect::<Vec<_>>()
        } else {
            let mut vss = Vec::with_capacity(http.virtual_services.len());
            for r in &http.virtual_services {
                let r = r.resolve(&owner.namespace);
                match snapshot.virtual_service(&r) {
                    Some(vs) => vss.push(vs),
                    None => self
                        .reports
                        .add_error(owner, format!("virtual service {r} not found")),
                }
            }
            vss
        };

        candidates
            .into_iter()
            .filter(|vs| vs.spec.ssl_config.is_some() == ssl)
            .collect()
    }

    fn virtual_hosts(&mut self, vss: &[&VirtualService]) -> Vec<VirtualHost> {
        let vhosts = vss
            .iter()
            .map(|vs| self.virtual_host(vs))
            .collect::<Vec<_>>();

        let mut owners_by_domain = BTreeMap::<&str, Vec<&ResourceId>>::new();
        for vh in &vhosts {
            for domain in &vh.domains {
                let owners = owners_by_domain.entry(domain).or_default();
                if !owners.contains(&&vh.source) {
                    owners.push(&vh.source);
                }
            }
        }
        for (domain, owners) in owners_by_domain {
            if owners.len() < 2 {
                continue;
            }
            let names = owners
                .iter()
                .map(|id| id.to_ref().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            for id in owners {
                self.reports.add_error(
                    id,
                    format!("domain conflict: {domain} is declared by more than one virtual service on the same listener: {names}"),
                );
            }
        }

        vhosts
    }

    fn virtual_host(&mut self, vs: &VirtualService) -> VirtualHost {
        let id = id_of(Kind::VirtualService, vs);
        self.reports.accept(&id);
        let spec = &vs.spec.virtual_host;

        let options = self.virtual_host_options(&id, spec);

        let mut ssl_secret = None;
        if let Some(r) = vs.spec.ssl_config.as_ref().and_then(|ssl| ssl.secret_ref.as_ref()) {
            let r = r.resolve(&id.namespace);
            if self.snapshot.secret(&r).is_none() {
                self.reports
                    .add_error(&id, format!("ssl secret {r} not found"));
            }
            ssl_secret = Some(r);
        }

        let domains = if spec.domains.is_empty() {
            vec!["*".to_string()]
        } else {
            spec.domains.clone()
        };

        let mut routes = vec![];
        let mut visited = vec![];
        for route in &spec.routes {
            self.route(route, &id, None, &mut visited, &mut routes);
        }

        VirtualHost {
            name: id.to_ref().to_string(),
            source: id,
            domains,
            routes,
            options,
            ssl_secret,
        }
    }

    fn virtual_host_options(
        &mut self,
        owner: &ResourceId,
        spec: &k8s::gateway::VirtualHost,
    ) -> Option<VirtualHostOptions> {
        let mut options = spec.options.clone();
        let refs = spec.options_config_refs.iter().flat_map(|c| &c.delegate_options);
        for r in refs {
            let r = r.resolve(&owner.namespace);
            match self.snapshot.virtual_host_option(&r) {
                Some(opt) => options = Some(options.unwrap_or_default().merge(&opt.spec.options)),
                None => self
                    .reports
                    .add_error(owner, format!("virtual host option {r} not found")),
            }
        }
        options
    }

    fn route_options(&mut self, owner: &ResourceId, route: &Route) -> Option<RouteOptions> {
        let mut options = route.options.clone();
        let refs = route.options_config_refs.iter().flat_map(|c| &c.delegate_options);
        for r in refs {
            let r = r.resolve(&owner.namespace);
            match self.snapshot.route_option(&r) {
                Some(opt) => options = Some(options.unwrap_or_default().merge(&opt.spec.options)),
                None => self
                    .reports
                    .add_error(owner, format!("route option {r} not found")),
            }
        }

        if let Some(retries) = options.as_ref().and_then(|o| o.retries.as_ref()) {
            if retries.num_retries == 0 {
                self.reports
                    .add_warning(owner, "retry policy sets numRetries to 0; requests will not be retried");
            }
        }
        options
    }

    /// Renders a route into `out`, descending through delegation.
    fn route(
        &mut self,
        route: &Route,
        owner: &ResourceId,
        parent: Option<&Parent>,
        visited: &mut Vec<ResourceId>,
        out: &mut Vec<proxy::Route>,
    ) {
        let matchers = route.effective_matchers();
        if let Some(parent) = parent {
            for m in &matchers {
                let path_match = m.path();
                let Some(path) = path_match.literal() else {
                    continue;
                };
                if !parent.prefixes.iter().any(|p| path.starts_with(p.as_str())) {
                    self.reports.add_error(
                        owner,
                        format!(
                            "route path {path} does not start with the delegating prefix {}",
                            parent.prefixes.join(" or ")
                        ),
                    );
                }
            }
        }

        let mut options = self.route_options(owner, route);
        if let Some(inherited) = parent.and_then(|p| p.options.as_ref()) {
            options = Some(options.unwrap_or_default().merge(inherited));
        }

        let action = match &route.action {
            Action::Route(RouteActionSpec::Single(dst)) => {
                RouteAction::Upstream(self.upstream(owner, &dst.upstream))
            }
            Action::Route(RouteActionSpec::Multi(multi)) => RouteAction::Weighted(
                multi
                    .destinations
                    .iter()
                    .map(|d| WeightedUpstream {
                        upstream: self.upstream(owner, &d.destination.upstream),
                        weight: d.weight,
                    })
                    .collect(),
            ),
            Action::DirectResponse(rsp) => RouteAction::DirectResponse {
                status: rsp.status,
                body: rsp.body.clone(),
            },
            Action::Redirect(redirect) => RouteAction::Redirect {
                host: redirect.host_redirect.clone(),
                path: redirect.path_redirect.clone(),
            },
            Action::Delegate(delegate) => {
                let mut prefixes = vec![];
                for m in &matchers {
                    match m.path() {
                        PathMatch::Prefix(p) => prefixes.push(p.to_string()),
                        PathMatch::Exact(_) | PathMatch::Regex(_) => self
                            .reports
                            .add_error(owner, "delegating routes may only use prefix matchers"),
                    }
                }
                if !prefixes.is_empty() {
                    let parent = Parent { prefixes, options };
                    self.delegate(owner, delegate, &parent, visited, out);
                }
                return;
            }
        };

        out.push(proxy::Route {
            name: route.name.clone(),
            source: owner.clone(),
            matchers,
            options,
            action,
        });
    }

    fn delegate(
        &mut self,
        owner: &ResourceId,
        delegate: &DelegateAction,
        parent: &Parent,
        visited: &mut Vec<ResourceId>,
        out: &mut Vec<proxy::Route>,
    ) {
        let snapshot = self.snapshot;
        let tables: Vec<&'s RouteTable> = match (&delegate.reference, &delegate.selector) {
            (Some(r), _) => {
                let r = r.resolve(&owner.namespace);
                match snapshot.route_table(&r) {
                    Some(rt) => vec![rt],
                    None => {
                        self.reports
                            .add_error(owner, format!("delegated route table {r} not found"));
                        return;
                    }
                }
            }
            (None, Some(sel)) => {
                let mut rts = snapshot
                    .route_tables
                    .iter()
                    .filter(|rt| {
                        namespace_selected(&sel.namespaces, ns_of(*rt), Some(&owner.namespace))
                            && labels_match(&sel.labels, &rt.metadata)
                    })
                    .collect::<Vec<_>>();
                rts.sort_by_key(|rt| rt.spec.weight.unwrap_or(0));
                rts
            }
            (None, None) => {
                self.reports.add_error(
                    owner,
                    "delegate action must either reference or select route tables",
                );
                return;
            }
        };

        for rt in tables {
            let id = id_of(Kind::RouteTable, rt);
            self.reports.accept(&id);
            if visited.contains(&id) {
                let chain = visited
                    .iter()
                    .chain(Some(&id))
                    .map(|v| v.to_ref().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                self.reports
                    .add_error(&id, format!("delegation cycle detected: {chain}"));
                continue;
            }

            visited.push(id.clone());
            for route in &rt.spec.routes {
                self.route(route, &id, Some(parent), visited, out);
            }
            visited.pop();
        }
    }

    fn upstream(&mut self, owner: &ResourceId, r: &ResourceRef) -> ResourceRef {
        let r = r.resolve(&owner.namespace);
        if self.snapshot.upstream(&r).is_none() {
            self.reports
                .add_error(owner, format!("destination upstream {r} does not exist"));
        }
        r
    }
}

fn id_of<T: k8s::Resource>(kind: Kind, res: &T) -> ResourceId {
    let meta = res.meta();
    ResourceId::new(
        kind,
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

fn ns_of<T: k8s::Resource>(res: &T) -> &str {
    res.meta().namespace.as_deref().unwrap_or_default()
}

/// An empty namespace list selects `default_ns` when one is given and every
/// namespace otherwise; `*` selects every namespace.
fn namespace_selected(namespaces: &[String], ns: &str, default_ns: Option<&str>) -> bool {
    if namespaces.is_empty() {
        return default_ns.map_or(true, |d| d == ns);
    }
    namespaces.iter().any(|n| n == "*" || n == ns)
}

fn labels_match(selector: &BTreeMap<String, String>, meta: &ObjectMeta) -> bool {
    let labels = meta.labels.as_ref();
    selector
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
}
