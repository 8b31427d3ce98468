use super::GatewayTranslator;
use gateway_validation_core::{
    k8s::{DynamicObject, ResourceRef},
    proxy::{ListenerKind, Proxy, RouteAction},
    Kind, Resource, ResourceId, ResourceReports, Snapshot, Translate,
};
use serde_json::{json, Value};

fn resource(value: Value) -> Resource {
    let obj: DynamicObject = serde_json::from_value(value).expect("object must parse");
    Resource::from_dynamic(&obj).expect("resource must decode")
}

fn snapshot(resources: impl IntoIterator<Item = Value>) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for value in resources {
        snapshot.upsert(resource(value));
    }
    snapshot
}

fn translate(snapshot: &Snapshot) -> (Option<Proxy>, ResourceReports) {
    let gateways = snapshot
        .gateways_by_proxy_name()
        .remove("gateway-proxy")
        .unwrap_or_default();
    GatewayTranslator::new("gloo-system").translate("gateway-proxy", snapshot, &gateways)
}

fn errors(reports: &ResourceReports) -> Vec<String> {
    match reports.validate() {
        Ok(()) => vec![],
        Err(e) => e.0,
    }
}

fn http_gateway(name: &str, port: u32, ssl: bool) -> Value {
    json!({
        "apiVersion": "gateway.solo.io/v1",
        "kind": "Gateway",
        "metadata": { "namespace": "gloo-system", "name": name },
        "spec": { "bindPort": port, "ssl": ssl, "httpGateway": {} }
    })
}

fn upstream(ns: &str, name: &str) -> Value {
    json!({
        "apiVersion": "gloo.solo.io/v1",
        "kind": "Upstream",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "static": { "hosts": [{ "addr": "10.0.0.1", "port": 80 }] } }
    })
}

fn virtual_service(ns: &str, name: &str, domains: &[&str], routes: Value) -> Value {
    json!({
        "apiVersion": "gateway.solo.io/v1",
        "kind": "VirtualService",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "virtualHost": { "domains": domains, "routes": routes } }
    })
}

fn route_table(ns: &str, name: &str, labels: Value, routes: Value) -> Value {
    json!({
        "apiVersion": "gateway.solo.io/v1",
        "kind": "RouteTable",
        "metadata": { "namespace": ns, "name": name, "labels": labels },
        "spec": { "routes": routes }
    })
}

fn to_upstream(prefix: &str, ns: &str, name: &str) -> Value {
    json!({
        "matchers": [{ "prefix": prefix }],
        "routeAction": { "single": { "upstream": { "namespace": ns, "name": name } } }
    })
}

fn delegate_to(prefix: &str, name: &str) -> Value {
    json!({
        "matchers": [{ "prefix": prefix }],
        "delegateAction": { "ref": { "name": name } }
    })
}

#[test]
fn no_gateways_render_no_proxy() {
    let snapshot = snapshot([upstream("default", "petstore")]);
    let (proxy, reports) = translate(&snapshot);
    assert!(proxy.is_none());
    assert!(reports.is_empty());
}

#[test]
fn renders_http_listener() {
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        upstream("default", "petstore"),
        virtual_service(
            "default",
            "petstore",
            &["petstore.example.com"],
            json!([to_upstream("/", "", "petstore")]),
        ),
    ]);

    let (proxy, reports) = translate(&snapshot);
    assert_eq!(errors(&reports), Vec::<String>::new());
    let proxy = proxy.expect("proxy must render");
    assert_eq!(proxy.name, "gateway-proxy");
    assert_eq!(proxy.namespace, "gloo-system");
    assert_eq!(proxy.listeners.len(), 1);

    let listener = &proxy.listeners[0];
    assert_eq!(listener.name, "listener-::-8080");
    let ListenerKind::Http(vhosts) = &listener.kind else {
        panic!("expected an http listener");
    };
    assert_eq!(vhosts.len(), 1);
    assert_eq!(vhosts[0].name, "default.petstore");
    assert_eq!(vhosts[0].domains, vec!["petstore.example.com"]);
    assert_eq!(
        vhosts[0].routes[0].action,
        RouteAction::Upstream(ResourceRef::new("default", "petstore"))
    );
}

#[test]
fn missing_upstream_is_an_error_on_the_route_owner() {
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        virtual_service(
            "default",
            "petstore",
            &["*"],
            json!([to_upstream("/", "default", "missing")]),
        ),
    ]);

    let (proxy, reports) = translate(&snapshot);
    assert!(proxy.is_some());
    let vs = ResourceId::new(Kind::VirtualService, "default", "petstore");
    assert_eq!(
        reports.get(&vs).map(|r| r.errors.clone()),
        Some(vec![
            "destination upstream default.missing does not exist".to_string()
        ])
    );
}

#[test]
fn domain_conflicts_are_reported_on_both_virtual_services() {
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        upstream("default", "petstore"),
        virtual_service("default", "a", &["example.com"], json!([])),
        virtual_service("default", "b", &["example.com"], json!([])),
    ]);

    let (_, reports) = translate(&snapshot);
    for name in ["a", "b"] {
        let id = ResourceId::new(Kind::VirtualService, "default", name);
        let report = reports.get(&id).expect("virtual service must be reported");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("domain conflict: example.com"));
    }
}

#[test]
fn ssl_listeners_only_serve_tls_virtual_services() {
    let mut tls = virtual_service("default", "tls", &["secure.example.com"], json!([]));
    tls["spec"]["sslConfig"] = json!({ "secretRef": { "name": "cert" } });
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        http_gateway("gateway-proxy-ssl", 8443, true),
        virtual_service("default", "plain", &["example.com"], json!([])),
        tls,
    ]);

    let (proxy, reports) = translate(&snapshot);
    let proxy = proxy.expect("proxy must render");
    let hosts = |port: u32| {
        proxy
            .listeners
            .iter()
            .find(|l| l.bind_port == port)
            .expect("listener must exist")
            .virtual_hosts()
            .map(|vh| vh.name.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(hosts(8080), vec!["default.plain"]);
    assert_eq!(hosts(8443), vec!["default.tls"]);

    let tls = ResourceId::new(Kind::VirtualService, "default", "tls");
    assert_eq!(
        reports.get(&tls).map(|r| r.errors.clone()),
        Some(vec!["ssl secret default.cert not found".to_string()])
    );
}

#[test]
fn delegation_flattens_route_tables() {
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        upstream("default", "petstore"),
        virtual_service("default", "vs", &["*"], json!([delegate_to("/api", "rt")])),
        route_table(
            "default",
            "rt",
            json!({}),
            json!([
                to_upstream("/api/pets", "", "petstore"),
                to_upstream("/other", "", "petstore"),
            ]),
        ),
    ]);

    let (proxy, reports) = translate(&snapshot);
    let proxy = proxy.expect("proxy must render");
    let routes = &proxy.virtual_hosts().next().expect("vhost must exist").routes;
    assert_eq!(routes.len(), 2);
    let rt = ResourceId::new(Kind::RouteTable, "default", "rt");
    assert_eq!(routes[0].source, rt);

    assert_eq!(
        errors(&reports),
        vec!["RouteTable default.rt: route path /other does not start with the delegating prefix /api"]
    );
}

#[test]
fn delegation_by_selector_orders_by_weight() {
    let mut heavy = route_table(
        "default",
        "heavy",
        json!({ "team": "pets" }),
        json!([to_upstream("/api/b", "", "petstore")]),
    );
    heavy["spec"]["weight"] = json!(10);
    let mut light = route_table(
        "default",
        "light",
        json!({ "team": "pets" }),
        json!([to_upstream("/api/a", "", "petstore")]),
    );
    light["spec"]["weight"] = json!(-1);
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        upstream("default", "petstore"),
        virtual_service(
            "default",
            "vs",
            &["*"],
            json!([{
                "matchers": [{ "prefix": "/api" }],
                "delegateAction": { "selector": { "labels": { "team": "pets" } } }
            }]),
        ),
        heavy,
        light,
        route_table(
            "other",
            "ignored",
            json!({ "team": "pets" }),
            json!([to_upstream("/api/c", "default", "petstore")]),
        ),
    ]);

    let (proxy, reports) = translate(&snapshot);
    assert_eq!(errors(&reports), Vec::<String>::new());
    let proxy = proxy.expect("proxy must render");
    let sources = proxy
        .virtual_hosts()
        .flat_map(|vh| vh.routes.iter().map(|r| r.source.name.clone()))
        .collect::<Vec<_>>();
    assert_eq!(sources, vec!["light", "heavy"]);
}

#[test]
fn delegation_cycles_are_errors() {
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        virtual_service("default", "vs", &["*"], json!([delegate_to("/", "a")])),
        route_table("default", "a", json!({}), json!([delegate_to("/", "b")])),
        route_table("default", "b", json!({}), json!([delegate_to("/", "a")])),
    ]);

    let (proxy, reports) = translate(&snapshot);
    assert!(proxy.is_some());
    assert_eq!(
        errors(&reports),
        vec!["RouteTable default.a: delegation cycle detected: default.a -> default.b -> default.a"]
    );
}

#[test]
fn missing_options_are_errors_and_zero_retries_warn() {
    let snapshot = snapshot([
        http_gateway("gateway-proxy", 8080, false),
        upstream("default", "petstore"),
        virtual_service(
            "default",
            "vs",
            &["*"],
            json!([{
                "matchers": [{ "prefix": "/" }],
                "options": { "retries": { "numRetries": 0 } },
                "optionsConfigRefs": { "delegateOptions": [{ "name": "missing" }] },
                "routeAction": { "single": { "upstream": { "name": "petstore" } } }
            }]),
        ),
    ]);

    let (_, reports) = translate(&snapshot);
    let vs = ResourceId::new(Kind::VirtualService, "default", "vs");
    let report = reports.get(&vs).expect("virtual service must be reported");
    assert_eq!(report.errors, vec!["route option default.missing not found"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(reports.validate_strict().is_err());
}

#[test]
fn tcp_and_hybrid_gateways() {
    let snapshot = snapshot([
        json!({
            "apiVersion": "gateway.solo.io/v1",
            "kind": "Gateway",
            "metadata": { "namespace": "gloo-system", "name": "tcp" },
            "spec": {
                "bindPort": 9000,
                "tcpGateway": {
                    "tcpHosts": [{ "name": "db", "destination": { "upstream": { "name": "db" } } }]
                }
            }
        }),
        json!({
            "apiVersion": "gateway.solo.io/v1",
            "kind": "Gateway",
            "metadata": { "namespace": "gloo-system", "name": "hybrid" },
            "spec": {
                "bindPort": 8080,
                "hybridGateway": { "delegatedHttpGateways": { "ref": { "name": "public" } } }
            }
        }),
        json!({
            "apiVersion": "gateway.solo.io/v1",
            "kind": "MatchableHttpGateway",
            "metadata": { "namespace": "gloo-system", "name": "public" },
            "spec": {
                "matcher": { "sourcePrefixRanges": ["0.0.0.0/0"] },
                "httpGateway": {}
            }
        }),
        virtual_service("default", "vs", &["*"], json!([])),
    ]);

    let (proxy, reports) = translate(&snapshot);
    let proxy = proxy.expect("proxy must render");
    assert_eq!(proxy.listeners.len(), 2);

    let hybrid = proxy
        .listeners
        .iter()
        .find(|l| l.bind_port == 8080)
        .expect("hybrid listener must exist");
    let ListenerKind::Hybrid(matched) = &hybrid.kind else {
        panic!("expected a hybrid listener");
    };
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].virtual_hosts.len(), 1);

    assert_eq!(
        errors(&reports),
        vec!["Gateway gloo-system.tcp: destination upstream gloo-system.db does not exist"]
    );
}
