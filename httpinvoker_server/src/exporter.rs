use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use http::{
    header::{HeaderValue, ALLOW, CONTENT_TYPE},
    Method, Request, Response, StatusCode,
};
use httpinvoker_protocol::{Codec, ErrorKind, Invocation, InvocationResult, RemoteFailure, Result};
use tracing::{debug, warn};

use crate::{DefaultInvocationExecutor, DispatchTable, InvocationExecutor};

/// Failure kind reported when the target operation panics.
pub const PANIC_FAILURE: &str = "Panic";

/// Answers one HTTP request. Never fails: problems become error statuses.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>>;
}

/// Exposes a service object as an HTTP endpoint.
///
/// Decodes the invocation in the request body, dispatches it against the
/// service and encodes the outcome into the response. A failure raised by
/// the service travels back in a 200 response; only requests that cannot be
/// decoded or resolved get an error status.
pub struct ServiceExporter<T> {
    service: Arc<T>,
    table: DispatchTable<T>,
    codec: Codec,
    executor: Arc<dyn InvocationExecutor<T>>,
}

impl<T: Send + Sync + 'static> ServiceExporter<T> {
    pub fn new(service: T, table: DispatchTable<T>) -> Self {
        ServiceExporter::from_arc(Arc::new(service), table)
    }

    pub fn from_arc(service: Arc<T>, table: DispatchTable<T>) -> Self {
        let codec = Codec::default().with_registry(table.type_registry());
        ServiceExporter {
            service,
            table,
            codec,
            executor: Arc::new(DefaultInvocationExecutor),
        }
    }

    /// Results are encoded with `codec`'s settings. Without a registry of its
    /// own, the codec gets one built from the dispatch table.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = match codec.registry() {
            Some(_) => codec,
            None => codec.with_registry(self.table.type_registry()),
        };
        self
    }

    pub fn set_invocation_executor(&mut self, executor: Arc<dyn InvocationExecutor<T>>) {
        self.executor = executor;
    }

    pub fn service(&self) -> &Arc<T> {
        &self.service
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn read_invocation(&self, body: &[u8]) -> Result<Invocation> {
        self.codec.decode_invocation(body)
    }

    /// Runs the invocation. A panic in the target operation is reported as a
    /// [`PANIC_FAILURE`] application failure, since the operation did run.
    pub fn invoke(&self, invocation: Invocation) -> Result<InvocationResult> {
        let method = invocation.method_name().to_owned();
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.executor.invoke(invocation, &self.service, &self.table)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(method = method.as_str(), message = message.as_str(), "operation panicked");
            Ok(InvocationResult::Failure(RemoteFailure::new(PANIC_FAILURE, message)))
        })
    }

    pub fn write_result(&self, result: &InvocationResult) -> Result<Vec<u8>> {
        self.codec.encode_result(result)
    }

    fn respond(&self, body: &[u8]) -> (StatusCode, Vec<u8>) {
        let invocation = match self.read_invocation(body) {
            Ok(invocation) => invocation,
            Err(err) => {
                warn!(%err, "could not decode invocation");
                return (StatusCode::BAD_REQUEST, Vec::new());
            }
        };
        debug!(%invocation, "dispatching");

        let result = match self.invoke(invocation) {
            Ok(result) => result,
            Err(err) if err.kind() == ErrorKind::Dispatch => {
                warn!(%err, "could not resolve invocation");
                return (StatusCode::NOT_FOUND, Vec::new());
            }
            Err(err) => {
                warn!(%err, "invocation failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
            }
        };

        match self.write_result(&result) {
            Ok(body) => (StatusCode::OK, body),
            Err(err) => {
                warn!(%err, "could not encode result");
                (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        }
    }
}

impl<T: Send + Sync + 'static> RequestHandler for ServiceExporter<T> {
    fn handle(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
        let mut response = Response::new(Vec::new());
        if request.method() != Method::POST {
            *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            return response;
        }

        let (status, body) = self.respond(request.body());
        *response.status_mut() = status;
        if status == StatusCode::OK {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(self.codec.content_type()));
        }
        *response.body_mut() = body;
        response
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "operation panicked".to_owned()
    }
}

impl<T> fmt::Debug for ServiceExporter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceExporter")
            .field("operations", &self.table)
            .field("codec", &self.codec)
            .finish()
    }
}
