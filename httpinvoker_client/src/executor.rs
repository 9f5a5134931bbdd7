use http::{header::CONTENT_TYPE, Method, Request, Response, Uri};
use httpinvoker_protocol::{Codec, Error, ErrorKind, Invocation, InvocationResult, Result};
use tracing::debug;

use crate::ClientConfiguration;

/// Ships an invocation to the configured service and returns its result.
///
/// Implementations never retry: a failed call is reported as a `Network`,
/// `Protocol` or `Serialization` error and retrying is up to the caller.
pub trait RequestExecutor: Send + Sync {
    fn execute(
        &self,
        config: &dyn ClientConfiguration,
        invocation: &Invocation,
    ) -> Result<InvocationResult>;
}

/// Moves one fully built HTTP request to its destination and returns the
/// complete response.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

/// The executor shared by every transport strategy: encode, POST, check
/// the status, decode.
#[derive(Debug, Default)]
pub struct HttpRequestExecutor<T> {
    codec: Codec,
    transport: T,
}

impl<T: HttpTransport> HttpRequestExecutor<T> {
    pub fn new(transport: T) -> Self {
        HttpRequestExecutor {
            codec: Codec::default(),
            transport,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: HttpTransport> RequestExecutor for HttpRequestExecutor<T> {
    fn execute(
        &self,
        config: &dyn ClientConfiguration,
        invocation: &Invocation,
    ) -> Result<InvocationResult> {
        let body = self.codec.encode_invocation(invocation)?;
        let uri: Uri = config.service_url().parse().map_err(|err| {
            Error::new(
                ErrorKind::Client,
                format!("invalid service URL '{}': {}", config.service_url(), err),
            )
        })?;

        debug!(
            url = config.service_url(),
            method = invocation.method_name(),
            bytes = body.len(),
            "sending invocation"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, self.codec.content_type())
            .body(body)?;

        let response = self.transport.send(request)?;
        validate_response(&response)?;
        self.codec.decode_result(response.body())
    }
}

/// Rejects any status of 300 and above without looking at the body.
pub fn validate_response(response: &Response<Vec<u8>>) -> Result<()> {
    let status = response.status();
    if status.as_u16() >= 300 {
        return Err(Error::new(
            ErrorKind::Protocol,
            format!(
                "did not receive successful HTTP response: status code = {}, status message = [{}]",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            ),
        ));
    }
    Ok(())
}
