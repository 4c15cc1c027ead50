pub mod decoder;
pub mod emit;
pub mod errors;
pub mod model;
pub mod publicize;
pub mod resolver;
pub mod session;

pub mod structs;

#[cfg(test)]
pub(crate) mod testutil;

pub use decoder::Decoder;
pub use emit::{Emitter, ValuesDocument};
pub use errors::ArscError;
pub use model::{FlagRegion, Package, ResSpec, ResourceId, ResourceTable, TypeSpec, Value};
pub use publicize::publicize;
pub use resolver::{Resolved, Resolver};
pub use session::DecodeOptions;
pub use structs::config::ResConfig;
