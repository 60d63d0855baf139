// Shared test helpers: a scripted in-process executor.
//
// Each call pops the next step from the script; once the script runs out every
// call answers 200. Calls, their timestamps and request bodies are recorded.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tokio::time::Instant;

use registry_transport::{
    Body, InvocationContext, Request, RequestExecutor, Response, TransientCondition,
    TransportError,
};

/// One scripted executor outcome.
#[allow(dead_code)] // Not every test file uses every step
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Status(u16),
    /// A response whose body fails to release.
    StatusWithBrokenBody(u16),
    Transient(TransientCondition),
    Fatal,
}

pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    bodies: Mutex<Vec<Option<Bytes>>>,
}

#[allow(dead_code)] // Used by other test files
impl ScriptedExecutor {
    pub fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            bodies: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with 200.
    pub fn ok() -> Self {
        Self::new(Vec::<Step>::new())
    }

    /// Answers every call with `code`.
    pub fn always(code: u16) -> Self {
        Self::new(std::iter::repeat(Step::Status(code)).take(10_000))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<Option<Bytes>> {
        self.bodies.lock().unwrap().clone()
    }

    /// Smallest gap between two consecutive calls.
    pub fn min_spacing(&self) -> Option<std::time::Duration> {
        self.call_times()
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .min()
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        mut request: Request,
        _ctx: &InvocationContext,
    ) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        let body = match request.take_body() {
            Some(body) => Some(body.collect().await.map_err(TransportError::executor)?),
            None => None,
        };
        self.bodies.lock().unwrap().push(body);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Status(200));
        match step {
            Step::Status(code) => Ok(Response::with_status(status(code))),
            Step::StatusWithBrokenBody(code) => {
                let body = Body::from("partial")
                    .with_release_hook(|| Err("connection reset while closing body".into()));
                Ok(Response::new(status(code), Default::default(), body))
            }
            Step::Transient(condition) => Err(TransportError::executor(condition)),
            Step::Fatal => Err(TransportError::executor(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))),
        }
    }
}

pub fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).expect("valid status code")
}

#[allow(dead_code)]
pub fn hub_url() -> url::Url {
    url::Url::parse("https://registry-1.docker.io/v2/library/alpine/manifests/latest")
        .expect("valid url")
}
