#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Client for the remote validation service.

mod api;
mod codec;
mod notifier;
mod remote;
mod resilient;

pub use self::{
    api::{
        GrpcValidationClient, NotifyOnResyncRequest, NotifyOnResyncResponse, ResourceChange,
        ResyncStream, ValidationApi, ValidationRequest, ValidationResponse,
    },
    codec::JsonCodec,
    notifier::ResyncNotifier,
    remote::RemoteProxyValidator,
    resilient::{default_backoff, ResilientClient},
};
pub use backoff::ExponentialBackoff;
