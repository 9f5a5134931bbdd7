use std::{env, sync::Arc, time::Duration};

use calc_model::{init_logging, CalcClient, Point, CALC_SERVICE_PATH};
use httpinvoker::{ClientInterceptor, EndpointConfig, Opt, PoolConfig, PooledRequestExecutor, Result};
use tracing::{info, warn};

fn main() -> Result<()> {
    init_logging();

    let addr = env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8080".to_owned());
    let config = EndpointConfig::new(format!("http://{}{}", addr, CALC_SERVICE_PATH))?;

    let mut opt = Opt::default();
    opt.connect_timeout = Duration::from_secs(3);
    opt.timeout = Duration::from_secs(10);
    let executor = PooledRequestExecutor::pooled(opt, PoolConfig::default())?;
    let calc = CalcClient::new(ClientInterceptor::with_executor(config, Arc::new(executor)));

    info!("using {}", calc);

    for a in 1..=5 {
        let sum = calc.add(a, 10)?;
        info!(a, sum, "add");
    }

    match calc.divide(1, 0) {
        Ok(q) => info!(q, "divide"),
        Err(err) if err.failure().is_some() => warn!(%err, "service rejected the call"),
        Err(err) => return Err(err),
    }

    let mid = calc.midpoint(Point { x: 0.0, y: 0.0 }, Point { x: 4.0, y: 2.0 })?;
    info!(x = mid.x, y = mid.y, "midpoint");

    match calc.factorial(-3) {
        Ok(f) => info!(f, "factorial"),
        Err(err) => warn!(%err, transport = err.is_transport(), "factorial failed"),
    }

    info!(calls = calc.calls()?, "done");
    Ok(())
}
