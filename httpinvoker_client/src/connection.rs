//! HTTP exchanges over reqwest's blocking client.

use std::{io::Read, time::Duration};

use http::{Request, Response};
use httpinvoker_protocol::{Error, ErrorKind, Result};
use reqwest::{blocking::Client, redirect::Policy};
use tracing::trace;

use crate::Opt;

/// A configured client plus the limits applied to every exchange.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_response_size: usize,
}

impl HttpClient {
    /// `max_idle_per_host` of zero keeps no connection around after a call.
    pub fn new(opt: &Opt, max_idle_per_host: usize, idle_timeout: Option<Duration>) -> Result<HttpClient> {
        let client = Client::builder()
            .redirect(Policy::none())
            .no_proxy()
            .tcp_nodelay(opt.nodelay)
            .connect_timeout(non_zero(opt.connect_timeout))
            .timeout(non_zero(opt.timeout))
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(idle_timeout)
            .build()
            .map_err(convert_error)?;
        Ok(HttpClient {
            client,
            max_response_size: opt.max_response_size,
        })
    }

    /// Sends `request` and reads the complete response.
    pub fn exchange(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let (parts, body) = request.into_parts();
        let url = parts.uri.to_string();
        let response = self
            .client
            .request(parts.method, url.as_str())
            .headers(parts.headers)
            .body(body)
            .send()
            .map_err(convert_error)?;

        let limit = self.max_response_size;
        if response.content_length().map_or(false, |len| len > limit as u64) {
            return Err(too_large(limit));
        }

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let mut body = Vec::new();
        response
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut body)?;
        if body.len() > limit {
            return Err(too_large(limit));
        }
        trace!(status = status.as_u16(), bytes = body.len(), "received response");

        let mut out = Response::new(body);
        *out.status_mut() = status;
        *out.version_mut() = version;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    if timeout.as_millis() == 0 {
        None
    } else {
        Some(timeout)
    }
}

fn too_large(limit: usize) -> Error {
    Error::new(
        ErrorKind::Protocol,
        format!("response body exceeds {} bytes", limit),
    )
}

/// Unreachable endpoints, timeouts and broken connections are `Network`
/// errors; redirects and status failures are `Protocol` errors.
pub fn convert_error(err: reqwest::Error) -> Error {
    let kind = if err.is_builder() {
        ErrorKind::Client
    } else if err.is_redirect() || err.is_status() {
        ErrorKind::Protocol
    } else {
        ErrorKind::Network
    };
    Error::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        thread,
    };

    // Answers one request with `raw` and hangs up.
    fn serve_once(raw: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/svc", listener.local_addr().unwrap());
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut len = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end().to_ascii_lowercase();
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line.strip_prefix("content-length:") {
                    len = value.trim().parse().unwrap();
                }
            }
            let mut body = vec![0; len];
            reader.read_exact(&mut body).unwrap();
            reader.get_mut().write_all(raw).unwrap();
        });
        url
    }

    fn post(url: &str) -> Request<Vec<u8>> {
        Request::post(url).body(b"ping".to_vec()).unwrap()
    }

    fn client(max_response_size: usize) -> HttpClient {
        let opt = Opt {
            max_response_size,
            ..Default::default()
        };
        HttpClient::new(&opt, 0, None).unwrap()
    }

    #[test]
    fn reads_status_headers_and_body() {
        let url = serve_once(b"HTTP/1.1 201 Created\r\nx-trace: 7\r\ncontent-length: 4\r\n\r\npong");
        let response = client(1024).exchange(post(&url)).unwrap();
        assert_eq!(StatusCode::CREATED, response.status());
        assert_eq!("7", response.headers()["x-trace"]);
        assert_eq!(b"pong".to_vec(), *response.body());
    }

    #[test]
    fn oversized_response_is_protocol_failure() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\n0123456789");
        let err = client(8).exchange(post(&url)).unwrap_err();
        assert_eq!(ErrorKind::Protocol, err.kind());

        // no length announced: the limit applies while reading
        let url = serve_once(b"HTTP/1.1 200 OK\r\nconnection: close\r\n\r\n0123456789");
        let err = client(8).exchange(post(&url)).unwrap_err();
        assert_eq!(ErrorKind::Protocol, err.kind());
    }

    #[test]
    fn hostile_chunk_size_is_transport_failure() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n1\r\na\r\nffffffffffffffff\r\n",
        );
        let err = client(1024).exchange(post(&url)).unwrap_err();
        assert!(err.is_transport(), "{:?}", err);
    }

    #[test]
    fn unreachable_endpoint_is_network_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = client(1024)
            .exchange(post(&format!("http://127.0.0.1:{}/svc", port)))
            .unwrap_err();
        assert_eq!(ErrorKind::Network, err.kind());
    }
}
