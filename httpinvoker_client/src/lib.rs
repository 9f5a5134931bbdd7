pub mod config;
pub mod connection;
pub mod executor;
pub mod interceptor;
pub mod pooled;
pub mod simple;

pub use config::*;
pub use connection::*;
pub use executor::*;
pub use interceptor::*;
pub use pooled::*;
pub use simple::*;
