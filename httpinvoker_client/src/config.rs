use std::time::Duration;

use http::Uri;
use httpinvoker_protocol::{Error, ErrorKind, Result};

/// Transport options shared by every executor strategy.
///
/// A zero duration means no timeout.
#[derive(Debug, Copy, Clone)]
pub struct Opt {
    pub connect_timeout: Duration,
    /// Bounds a whole call, from connecting until the response body is read.
    pub timeout: Duration,
    pub nodelay: bool,
    /// Larger response bodies fail the call with a `Protocol` error.
    pub max_response_size: usize,
}

impl Default for Opt {
    fn default() -> Self {
        Opt {
            connect_timeout: Default::default(),
            timeout: Default::default(),
            nodelay: true,
            max_response_size: 64 * 1024 * 1024,
        }
    }
}

/// Where an executor sends invocations.
pub trait ClientConfiguration {
    fn service_url(&self) -> &str;

    /// Hint for resolving types the receiver does not know.
    fn codebase_url(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    service_url: String,
    codebase_url: Option<String>,
}

impl EndpointConfig {
    /// Fails when `service_url` is not an absolute `http` URL.
    pub fn new<S: Into<String>>(service_url: S) -> Result<Self> {
        let service_url = service_url.into();
        Target::parse(&service_url)?;
        Ok(EndpointConfig {
            service_url,
            codebase_url: None,
        })
    }

    pub fn with_codebase_url<S: Into<String>>(mut self, codebase_url: S) -> Self {
        self.codebase_url = Some(codebase_url.into());
        self
    }
}

impl ClientConfiguration for EndpointConfig {
    fn service_url(&self) -> &str {
        &self.service_url
    }

    fn codebase_url(&self) -> Option<&str> {
        self.codebase_url.as_deref()
    }
}

/// The host and port a service URL points at.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    pub fn parse(service_url: &str) -> Result<Target> {
        let uri: Uri = service_url.parse().map_err(|err| {
            Error::new(
                ErrorKind::Client,
                format!("invalid service URL '{}': {}", service_url, err),
            )
        })?;
        Target::from_uri(&uri)
    }

    pub fn from_uri(uri: &Uri) -> Result<Target> {
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                return Err(Error::new(
                    ErrorKind::Client,
                    format!("unsupported scheme '{}' in '{}'", other, uri),
                ))
            }
            None => {
                return Err(Error::new(
                    ErrorKind::Client,
                    format!("service URL '{}' is not absolute", uri),
                ))
            }
        }
        let host = uri
            .host()
            .ok_or_else(|| Error::new(ErrorKind::Client, format!("no host in '{}'", uri)))?;
        Ok(Target {
            host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
            port: uri.port_u16().unwrap_or(80),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_targets() {
        let t = Target::parse("http://myurl/remoting/Service").unwrap();
        assert_eq!(("myurl", 80), (t.host(), t.port()));

        let t = Target::parse("http://[::1]:8080/svc").unwrap();
        assert_eq!(("::1", 8080), (t.host(), t.port()));

        for bad in &["https://secure/svc", "/relative/svc", "http://", "not a url"] {
            let err = Target::parse(bad).unwrap_err();
            assert_eq!(ErrorKind::Client, err.kind(), "{}", bad);
        }
    }

    #[test]
    fn endpoint_config() {
        let config = EndpointConfig::new("http://myurl")
            .unwrap()
            .with_codebase_url("http://codebase/");
        assert_eq!("http://myurl", config.service_url());
        assert_eq!(Some("http://codebase/"), config.codebase_url());
        assert!(EndpointConfig::new("ftp://myurl").is_err());
    }
}
