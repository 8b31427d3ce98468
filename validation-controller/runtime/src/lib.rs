#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use gateway_validation_core as core;
pub use gateway_validation_grpc as grpc;
pub use gateway_validation_k8s_translator as translator;
pub use gateway_validation_validator as validator;

mod admission;
mod args;
mod index;
mod sync;

pub use self::args::Args;
