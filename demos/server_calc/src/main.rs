use std::env;

use calc_model::{init_logging, Calc, CalcService, CALC_SERVICE_PATH};
use httpinvoker::{Server, ServiceExporter};
use tracing::error;

fn main() {
    init_logging();

    let addr = env::args().nth(1).unwrap_or_else(|| "0.0.0.0:8080".to_owned());
    let mut server = Server::new(addr);
    server.register(
        CALC_SERVICE_PATH,
        ServiceExporter::new(CalcService::default(), CalcService::dispatch_table()),
    );

    if let Err(err) = server.start() {
        error!(%err, "server stopped");
    }
}
