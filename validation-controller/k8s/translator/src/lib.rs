#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod local;
mod translator;

#[cfg(test)]
mod tests;

pub use self::{local::LocalProxyValidator, translator::GatewayTranslator};
