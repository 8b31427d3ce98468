//! Resources in the `gloo.solo.io` group.

pub mod endpoint;
pub mod upstream;

pub use self::{
    endpoint::{Endpoint, EndpointSpec},
    upstream::{
        Host, KubeUpstream, StaticUpstream, Upstream, UpstreamSpec, UpstreamSslConfig,
        UpstreamType,
    },
};

pub const GROUP: &str = "gloo.solo.io";
