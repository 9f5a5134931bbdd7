//! Synchronous remote invocation over HTTP.
//!
//! A service interface is declared once with [`remote_interface!`]. The
//! server exports an implementation through a [`ServiceExporter`] hosted by
//! a [`Server`]; the client calls it through the generated stub, which
//! turns every method call into an [`Invocation`] POSTed to the service URL.
//!
//! ```no_run
//! use httpinvoker::*;
//!
//! remote_interface! {
//!     pub trait Calc => CalcClient {
//!         fn add(a: i32, b: i32) -> i32;
//!     }
//! }
//!
//! struct CalcImpl;
//!
//! impl Calc for CalcImpl {
//!     fn add(&self, a: i32, b: i32) -> std::result::Result<i32, RemoteFailure> {
//!         Ok(a + b)
//!     }
//! }
//!
//! let mut server = Server::new("127.0.0.1:8080");
//! server.register("/calc", ServiceExporter::new(CalcImpl, CalcImpl::dispatch_table()));
//! let handle = server.bind()?;
//!
//! let client = CalcClient::connect(handle.url("/calc"))?;
//! assert_eq!(5, client.add(2, 3)?);
//! # Ok::<(), httpinvoker::Error>(())
//! ```

pub use httpinvoker_client::*;
pub use httpinvoker_protocol::*;
pub use httpinvoker_server::*;

pub use httpinvoker_client as client;
pub use httpinvoker_protocol as protocol;
pub use httpinvoker_server as server;

pub use http;
pub use serde;
pub use serde_json;

mod macros;
