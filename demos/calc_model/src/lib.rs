use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use httpinvoker::{remote_interface, RemoteFailure};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Path the calculator is exported at.
pub const CALC_SERVICE_PATH: &str = "/remoting/CalcService";

#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

remote_interface! {
    pub trait Calc => CalcClient {
        fn add(a: i32, b: i32) -> i32;
        /// Fails with `ArithmeticError` on a zero divisor.
        fn divide(a: i32, b: i32) -> i32;
        /// Fails with `IllegalArgument` for negative input.
        fn factorial(n: i64) -> u64;
        fn midpoint(a: Point, b: Point) -> Point;
        fn calls() -> u64;
    }
}

#[derive(Debug, Default)]
pub struct CalcService {
    calls: AtomicU64,
}

impl CalcService {
    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Calc for CalcService {
    fn add(&self, a: i32, b: i32) -> Result<i32, RemoteFailure> {
        self.count();
        a.checked_add(b)
            .ok_or_else(|| RemoteFailure::new("ArithmeticError", "integer overflow"))
    }

    fn divide(&self, a: i32, b: i32) -> Result<i32, RemoteFailure> {
        self.count();
        if b == 0 {
            return Err(RemoteFailure::new("ArithmeticError", "division by zero"));
        }
        Ok(a / b)
    }

    fn factorial(&self, n: i64) -> Result<u64, RemoteFailure> {
        self.count();
        if n < 0 {
            return Err(RemoteFailure::new(
                "IllegalArgument",
                format!("factorial of negative number {}", n),
            ));
        }
        (1..=n as u64).try_fold(1u64, |acc, i| acc.checked_mul(i)).ok_or_else(|| {
            RemoteFailure::new("ArithmeticError", "integer overflow")
                .with_cause(RemoteFailure::new("Overflow", format!("{}!", n)))
        })
    }

    fn midpoint(&self, a: Point, b: Point) -> Result<Point, RemoteFailure> {
        self.count();
        Ok(Point {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        })
    }

    fn calls(&self) -> Result<u64, RemoteFailure> {
        Ok(self.calls.load(Ordering::SeqCst))
    }
}

static LOGGING_CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Later calls do nothing.
pub fn init_logging() {
    if LOGGING_CONFIGURED.swap(true, Ordering::SeqCst) {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_line_number(true)
        .try_init();
}
