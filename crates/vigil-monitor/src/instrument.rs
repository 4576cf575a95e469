//! Request-handler instrumentation.
//!
//! Wraps any future-returning handler: times it, records the outcome through
//! `MetricsCollector::record_api_request`, and hands the handler's own result
//! (or panic) back to the caller untouched. Route and method are supplied by
//! the caller.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;

use vigil_core::MetricsCollector;

pub const STATUS_OK: u16 = 200;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Default mapping: `Ok` is 200, `Err` is 500.
pub fn default_status<T, E>(res: &Result<T, E>) -> u16 {
    if res.is_ok() {
        STATUS_OK
    } else {
        STATUS_INTERNAL_ERROR
    }
}

#[derive(Clone)]
pub struct EndpointInstrumentation {
    collector: Arc<MetricsCollector>,
}

impl EndpointInstrumentation {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub async fn call<F, T, E>(&self, endpoint: &str, method: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.call_with_status(endpoint, method, fut, default_status::<T, E>)
            .await
    }

    /// Like `call`, with a caller-chosen status for the handler's result.
    pub async fn call_with_status<F, T, E, S>(&self, endpoint: &str, method: &str, fut: F, status: S) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        S: FnOnce(&Result<T, E>) -> u16,
    {
        let start = Instant::now();
        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(res) => {
                self.collector
                    .record_api_request(endpoint, method, status(&res), elapsed);
                res
            }
            Err(payload) => {
                self.collector
                    .record_api_request(endpoint, method, STATUS_INTERNAL_ERROR, elapsed);
                std::panic::resume_unwind(payload)
            }
        }
    }

    /// Bind a handler to a route, producing an instrumented callable.
    pub fn wrap<H>(&self, endpoint: &str, method: &str, handler: H) -> Instrumented<H> {
        Instrumented {
            instr: self.clone(),
            endpoint: Arc::from(endpoint),
            method: Arc::from(method),
            handler,
        }
    }
}

/// A handler with its route baked in. See `EndpointInstrumentation::wrap`.
pub struct Instrumented<H> {
    instr: EndpointInstrumentation,
    endpoint: Arc<str>,
    method: Arc<str>,
    handler: H,
}

impl<H> Instrumented<H> {
    pub async fn call<Req, Fut, T, E>(&self, req: Req) -> Result<T, E>
    where
        H: Fn(Req) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // build the handler future inside the timed, unwind-guarded region
        self.instr
            .call(&self.endpoint, &self.method, async move { (self.handler)(req).await })
            .await
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}
