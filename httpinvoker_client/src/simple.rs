use http::{
    header::{HeaderValue, CONNECTION},
    Request, Response,
};
use httpinvoker_protocol::Result;

use crate::{HttpClient, HttpRequestExecutor, HttpTransport, Opt};

/// Uses a fresh connection for every call and closes it afterwards.
///
/// Keeps no idle connections, which suits low call rates.
#[derive(Debug, Clone)]
pub struct SimpleTransport {
    client: HttpClient,
}

impl SimpleTransport {
    pub fn new(opt: Opt) -> Result<Self> {
        Ok(SimpleTransport {
            client: HttpClient::new(&opt, 0, None)?,
        })
    }
}

impl HttpTransport for SimpleTransport {
    fn send(&self, mut request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        request
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
        self.client.exchange(request)
    }
}

pub type SimpleRequestExecutor = HttpRequestExecutor<SimpleTransport>;

impl HttpRequestExecutor<SimpleTransport> {
    pub fn simple(opt: Opt) -> Result<Self> {
        Ok(HttpRequestExecutor::new(SimpleTransport::new(opt)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointConfig, RequestExecutor};
    use httpinvoker_protocol::{ErrorKind, Invocation};
    use std::{
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        thread,
    };

    #[test]
    fn unreachable_endpoint_is_network_failure() {
        // grab a free port and release it again
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = EndpointConfig::new(format!("http://127.0.0.1:{}/svc", port)).unwrap();
        let invocation = Invocation::new("getAge", vec![], vec![]).unwrap();

        let err = SimpleRequestExecutor::simple(Opt::default())
            .unwrap()
            .execute(&config, &invocation)
            .unwrap_err();
        assert_eq!(ErrorKind::Network, err.kind());
    }

    #[test]
    fn asks_the_server_to_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/svc", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim_end().is_empty() {
                    break;
                }
                head.push(line.trim_end().to_ascii_lowercase());
            }
            reader
                .get_mut()
                .write_all(b"HTTP/1.1 204 No Content\r\n\r\n")
                .unwrap();
            head
        });

        let transport = SimpleTransport::new(Opt::default()).unwrap();
        let request = Request::post(url).body(Vec::new()).unwrap();
        assert_eq!(204, transport.send(request).unwrap().status().as_u16());
        assert!(server.join().unwrap().contains(&"connection: close".to_owned()));
    }
}
