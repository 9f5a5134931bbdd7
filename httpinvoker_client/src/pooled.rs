use std::time::Duration;

use http::{Request, Response};
use httpinvoker_protocol::Result;

use crate::{HttpClient, HttpRequestExecutor, HttpTransport, Opt};

/// Idle connection settings of the pooled strategy.
#[derive(Debug, Copy, Clone)]
pub struct PoolConfig {
    /// Idle connections kept per host once their call is done.
    pub max_idle_per_host: usize,
    /// How long a connection may idle before it is closed; `None` keeps it.
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_idle_per_host: 5,
            idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Sends every call over a keep-alive connection from a shared pool.
///
/// Each call holds its connection exclusively until the response is read;
/// a connection left in an unknown state is closed instead of reused.
#[derive(Debug, Clone)]
pub struct PooledTransport {
    client: HttpClient,
}

impl PooledTransport {
    pub fn new(opt: Opt, config: PoolConfig) -> Result<Self> {
        Ok(PooledTransport {
            client: HttpClient::new(&opt, config.max_idle_per_host, config.idle_timeout)?,
        })
    }

    /// Shares the pool of an existing client, e.g. between executors for
    /// several services.
    pub fn with_client(client: HttpClient) -> Self {
        PooledTransport { client }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

impl HttpTransport for PooledTransport {
    fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        self.client.exchange(request)
    }
}

pub type PooledRequestExecutor = HttpRequestExecutor<PooledTransport>;

impl HttpRequestExecutor<PooledTransport> {
    pub fn pooled(opt: Opt, config: PoolConfig) -> Result<Self> {
        Ok(HttpRequestExecutor::new(PooledTransport::new(opt, config)?))
    }
}
