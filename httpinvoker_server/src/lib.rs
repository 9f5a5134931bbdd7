pub mod dispatch;
pub mod executor;
pub mod exporter;
pub mod server;

pub use dispatch::*;
pub use executor::*;
pub use exporter::*;
pub use server::*;
