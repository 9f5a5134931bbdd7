//! Fixtures shared by the end-to-end tests.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::{Duration, Instant},
};

use calc_model::{init_logging, Calc, CalcService, CALC_SERVICE_PATH};
use httpinvoker::{Server, ServerHandle, ServiceExporter};

/// Starts a calculator service on an ephemeral loopback port.
pub fn start_calc_server() -> ServerHandle {
    start_server(ServiceExporter::new(CalcService::default(), CalcService::dispatch_table()))
}

/// Serves `exporter` at the calculator path on an ephemeral loopback port.
pub fn start_server(exporter: ServiceExporter<CalcService>) -> ServerHandle {
    init_logging();
    let mut server = Server::new("127.0.0.1:0");
    server.register(CALC_SERVICE_PATH, exporter);
    server.bind().expect("bind calc server")
}

pub fn calc_url(handle: &ServerHandle) -> String {
    handle.url(CALC_SERVICE_PATH)
}

/// Waits up to five seconds for every client connection to `handle` to
/// go away.
pub fn all_connections_closed(handle: &ServerHandle) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if handle.connections().open == 0 {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}

/// Serves `raw` as the response to one request on each of the first
/// `connections` connections.
pub fn start_raw_server(raw: &'static [u8], connections: usize) -> String {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/svc", listener.local_addr().expect("local addr"));
    thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let stream = match stream {
                Ok(stream) => stream,
                Err(_) => return,
            };
            let mut reader = BufReader::new(stream);
            if read_message(&mut reader).is_some() {
                let _ = reader.get_mut().write_all(raw);
            }
        }
    });
    url
}

/// Reads one HTTP message with a `Content-Length` body, returning its
/// start line and body.
pub fn read_message(reader: &mut BufReader<TcpStream>) -> Option<(String, Vec<u8>)> {
    let mut start = String::new();
    if reader.read_line(&mut start).ok()? == 0 {
        return None;
    }
    let mut len = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let line = line.trim_end().to_ascii_lowercase();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("content-length:") {
            len = value.trim().parse().ok()?;
        }
    }
    let mut body = vec![0; len];
    reader.read_exact(&mut body).ok()?;
    Some((start.trim_end().to_owned(), body))
}
