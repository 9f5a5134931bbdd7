use std::{
    collections::HashMap,
    convert::Infallible,
    future::Future,
    net::{SocketAddr, TcpListener},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock,
    },
    thread::{self, JoinHandle},
};

use http::{Request, Response, StatusCode};
use httpinvoker_protocol::{Error, ErrorKind, Result};
use hyper::{
    body::HttpBody,
    server::conn::AddrStream,
    service::{make_service_fn, service_fn},
    Body,
};
use tokio::{
    runtime::{self, Runtime},
    sync::oneshot,
    task,
};
use tracing::{debug, info, warn};

use crate::RequestHandler;

type Handlers = Arc<RwLock<HashMap<String, Arc<dyn RequestHandler>>>>;

#[derive(Debug, Copy, Clone)]
pub struct ServerOpt {
    /// Serve several requests per connection.
    pub keep_alive: bool,
    pub nodelay: bool,
    /// Larger request bodies are answered with 413.
    pub max_request_size: usize,
    /// Runtime worker threads; zero means one per core.
    pub worker_threads: usize,
}

impl Default for ServerOpt {
    fn default() -> Self {
        ServerOpt {
            keep_alive: true,
            nodelay: true,
            max_request_size: 16 * 1024 * 1024,
            worker_threads: 0,
        }
    }
}

/// Connection counters of a running server.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ConnectionStats {
    pub accepted: usize,
    pub open: usize,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicUsize,
    open: AtomicUsize,
}

/// Hosts request handlers by URL path.
///
/// Connections are served by hyper on a tokio runtime owned by the server;
/// handlers run on the runtime's blocking pool.
pub struct Server {
    pub addr: String,
    pub opt: ServerOpt,
    handlers: Handlers,
}

impl Server {
    pub fn new<S: Into<String>>(addr: S) -> Self {
        Server {
            addr: addr.into(),
            opt: Default::default(),
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Serves `handler` at `path`, e.g. `/remoting/CalcService`.
    pub fn register<S, H>(&mut self, path: S, handler: H)
    where
        S: Into<String>,
        H: RequestHandler + 'static,
    {
        let mut map = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(path.into(), Arc::new(handler));
    }

    pub fn get_handler(&self, path: &str) -> Option<Arc<dyn RequestHandler>> {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        map.get(path).cloned()
    }

    /// Serves until the listener fails. Blocks the caller.
    pub fn start(&self) -> Result<()> {
        let listener = self.listen()?;
        info!(addr = %listener.local_addr()?, "listening");
        let runtime = self.runtime()?;
        let serving = self.serve(&runtime, listener, Default::default(), std::future::pending())?;
        runtime.block_on(serving)
    }

    /// Binds and serves on a background thread.
    pub fn bind(&self) -> Result<ServerHandle> {
        let listener = self.listen()?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening");

        let runtime = self.runtime()?;
        let counters = Arc::new(Counters::default());
        let (shutdown, signal) = oneshot::channel::<()>();
        let serving = self.serve(&runtime, listener, counters.clone(), async move {
            let _ = signal.await;
        })?;

        let thread = thread::Builder::new()
            .name("httpinvoker-server".to_owned())
            .spawn(move || {
                if let Err(err) = runtime.block_on(serving) {
                    warn!(%err, "server stopped");
                }
            })?;

        Ok(ServerHandle {
            local_addr,
            counters,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    fn listen(&self) -> Result<TcpListener> {
        let addr = self
            .addr
            .parse::<SocketAddr>()
            .map_err(|err| Error::new(ErrorKind::Client, err))?;
        let listener = TcpListener::bind(&addr)?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    fn runtime(&self) -> Result<Runtime> {
        let mut builder = runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("httpinvoker-worker");
        if self.opt.worker_threads > 0 {
            builder.worker_threads(self.opt.worker_threads);
        }
        Ok(builder.build()?)
    }

    /// Builds the hyper server for `listener`; it stops once `signal`
    /// resolves and the open connections are done.
    fn serve<F>(
        &self,
        runtime: &Runtime,
        listener: TcpListener,
        counters: Arc<Counters>,
        signal: F,
    ) -> Result<impl Future<Output = Result<()>>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // the listener registers with the runtime's reactor
        let _entered = runtime.enter();
        let builder =
            hyper::Server::from_tcp(listener).map_err(|err| Error::new(ErrorKind::Network, err))?;

        let handlers = self.handlers.clone();
        let opt = self.opt;
        let make_service = make_service_fn(move |stream: &AddrStream| {
            let connection = Arc::new(Connection::new(
                handlers.clone(),
                opt,
                stream.remote_addr(),
                counters.clone(),
            ));
            async move {
                Ok::<_, Infallible>(service_fn(move |request: Request<Body>| {
                    let connection = connection.clone();
                    async move { Ok::<_, Infallible>(connection.route(request).await) }
                }))
            }
        });

        let server = builder
            .http1_only(true)
            .http1_keepalive(self.opt.keep_alive)
            .tcp_nodelay(self.opt.nodelay)
            .serve(make_service)
            .with_graceful_shutdown(signal);
        Ok(async move { server.await.map_err(|err| Error::new(ErrorKind::Network, err)) })
    }
}

/// A server running in the background.
///
/// Closing stops accepting, lets in-flight requests finish and closes idle
/// keep-alive connections.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    counters: Arc<Counters>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://` URL for a handler registered at `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.local_addr, path)
    }

    pub fn connections(&self) -> ConnectionStats {
        ConnectionStats {
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            open: self.counters.open.load(Ordering::SeqCst),
        }
    }

    pub fn close(&mut self) {
        let shutdown = match self.shutdown.take() {
            Some(shutdown) => shutdown,
            None => return,
        };
        // a dropped receiver means the server already stopped
        let _ = shutdown.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(addr = %self.local_addr, "server thread panicked");
            }
        }
        info!(addr = %self.local_addr, "closed");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Per-connection state shared by the requests it carries.
struct Connection {
    handlers: Handlers,
    opt: ServerOpt,
    peer: SocketAddr,
    counters: Arc<Counters>,
}

impl Connection {
    fn new(handlers: Handlers, opt: ServerOpt, peer: SocketAddr, counters: Arc<Counters>) -> Self {
        counters.accepted.fetch_add(1, Ordering::SeqCst);
        counters.open.fetch_add(1, Ordering::SeqCst);
        debug!(%peer, "accepted connection");
        Connection {
            handlers,
            opt,
            peer,
            counters,
        }
    }

    fn handler(&self, path: &str) -> Option<Arc<dyn RequestHandler>> {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        map.get(path).cloned()
    }

    async fn route(&self, request: Request<Body>) -> Response<Body> {
        let path = request.uri().path().to_owned();
        let handler = match self.handler(&path) {
            Some(handler) => handler,
            None => {
                debug!(peer = %self.peer, path = path.as_str(), "no handler");
                return status(StatusCode::NOT_FOUND);
            }
        };

        let (parts, body) = request.into_parts();
        let body = match read_body(body, self.opt.max_request_size).await {
            Ok(body) => body,
            Err(code) => {
                warn!(peer = %self.peer, path = path.as_str(), status = code.as_u16(), "rejected request body");
                return status(code);
            }
        };

        let request = Request::from_parts(parts, body);
        match task::spawn_blocking(move || handler.handle(request)).await {
            Ok(response) => {
                debug!(peer = %self.peer, path = path.as_str(), status = response.status().as_u16(), "served");
                response.map(Body::from)
            }
            Err(err) => {
                warn!(peer = %self.peer, path = path.as_str(), %err, "handler failed");
                status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        debug!(peer = %self.peer, "connection closed");
    }
}

async fn read_body(mut body: Body, limit: usize) -> std::result::Result<Vec<u8>, StatusCode> {
    if body.size_hint().lower() > limit as u64 {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    let mut buf = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|_| StatusCode::BAD_REQUEST)?;
        if chunk.len() > limit - buf.len() {
            return Err(StatusCode::PAYLOAD_TOO_LARGE);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn status(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpStream,
        time::{Duration, Instant},
    };

    struct Echo;

    impl RequestHandler for Echo {
        fn handle(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
            Response::new(request.into_body())
        }
    }

    fn server() -> ServerHandle {
        let mut server = Server::new("127.0.0.1:0");
        server.opt.max_request_size = 64;
        server.register("/echo", Echo);
        server.bind().unwrap()
    }

    fn connect(handle: &ServerHandle) -> BufReader<TcpStream> {
        BufReader::new(TcpStream::connect(handle.local_addr()).unwrap())
    }

    fn post(stream: &mut BufReader<TcpStream>, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let head = format!(
            "POST {} HTTP/1.1\r\nhost: localhost\r\ncontent-length: {}\r\n\r\n",
            path,
            body.len()
        );
        stream.get_mut().write_all(head.as_bytes()).unwrap();
        stream.get_mut().write_all(body).unwrap();
        read_response(stream)
    }

    fn read_response(stream: &mut BufReader<TcpStream>) -> (u16, Vec<u8>) {
        let mut line = String::new();
        stream.read_line(&mut line).unwrap();
        let code = line.split_whitespace().nth(1).unwrap().parse().unwrap();
        let mut len = 0;
        loop {
            let mut line = String::new();
            stream.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    len = value.trim().parse().unwrap();
                }
            }
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).unwrap();
        (code, body)
    }

    #[test]
    fn keep_alive_serves_several_requests() {
        let handle = server();
        let mut stream = connect(&handle);

        assert_eq!((200, b"one".to_vec()), post(&mut stream, "/echo", b"one"));
        assert_eq!((200, b"two".to_vec()), post(&mut stream, "/echo", b"two"));
        assert_eq!(404, post(&mut stream, "/missing", b"").0);

        assert_eq!(ConnectionStats { accepted: 1, open: 1 }, handle.connections());
    }

    #[test]
    fn chunked_request_body_is_assembled() {
        let handle = server();
        let mut stream = connect(&handle);
        stream
            .get_mut()
            .write_all(
                b"POST /echo HTTP/1.1\r\nhost: localhost\r\ntransfer-encoding: chunked\r\n\r\n\
                  3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n",
            )
            .unwrap();
        assert_eq!((200, b"abcde".to_vec()), read_response(&mut stream));

        // the connection is still in sync for the next request
        assert_eq!((200, b"next".to_vec()), post(&mut stream, "/echo", b"next"));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let handle = server();
        let mut stream = connect(&handle);
        assert_eq!(413, post(&mut stream, "/echo", &[b'x'; 65]).0);
    }

    #[test]
    fn malformed_request_gets_client_error() {
        let handle = server();
        let mut stream = TcpStream::connect(handle.local_addr()).unwrap();
        stream.write_all(b"NONSENSE\r\n\r\n").unwrap();

        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        assert!(text.starts_with("HTTP/1.1 4"), "{}", text);
    }

    #[test]
    fn close_drops_idle_keep_alive_connections() {
        let mut handle = server();
        let addr = handle.local_addr();
        let mut stream = connect(&handle);
        assert_eq!(200, post(&mut stream, "/echo", b"ping").0);

        let started = Instant::now();
        handle.close();
        assert!(started.elapsed() < Duration::from_secs(5));

        // the idle connection was closed by the server
        let mut rest = Vec::new();
        assert_eq!(0, stream.read_to_end(&mut rest).unwrap_or(0));
        assert_eq!(0, handle.connections().open);
        assert!(TcpStream::connect(addr).is_err());
    }
}
