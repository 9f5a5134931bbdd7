pub mod error;
pub mod failure;
pub mod invocation;
pub mod message;
pub mod registry;

pub use error::*;
pub use failure::*;
pub use invocation::*;
pub use message::*;
pub use registry::*;

pub use serde_json::Value;
