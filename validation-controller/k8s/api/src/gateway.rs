//! Resources in the `gateway.solo.io` group.

pub mod gateway;
pub mod matchable_http_gateway;
pub mod options;
pub mod route;
pub mod route_table;
pub mod virtual_service;

pub use self::{
    gateway::{
        DelegatedHttpGateway, Gateway, GatewaySpec, GatewayType, HttpGateway, HybridGateway,
        TcpGateway, TcpHost,
    },
    matchable_http_gateway::{HttpGatewayMatcher, MatchableHttpGateway, MatchableHttpGatewaySpec},
    options::{
        CorsPolicy, OptionsConfigRefs, RetryPolicy, RouteOption, RouteOptionSpec, RouteOptions,
        VirtualHostOption, VirtualHostOptionSpec, VirtualHostOptions,
    },
    route::{
        Action, DelegateAction, Destination, DirectResponseAction, Matcher, MultiDestination,
        PathMatch, RedirectAction, Route, RouteAction, RouteTableSelector, WeightedDestination,
    },
    route_table::{RouteTable, RouteTableSpec},
    virtual_service::{SslConfig, VirtualHost, VirtualService, VirtualServiceSpec},
};

pub const GROUP: &str = "gateway.solo.io";
