//! Test doubles for the transport seam.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use petclinic_domain::NetworkError;

use crate::api::{ApiRequest, ApiResponse, Transport};

#[derive(Debug, Clone)]
enum Step {
    Respond(Result<ApiResponse, NetworkError>),
    Delay(Duration, Result<ApiResponse, NetworkError>),
    Hang,
}

/// Transport that replays a scripted list of outcomes.
///
/// Once the script is exhausted every call returns an empty 200.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    credentials: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, status: u16, body: &str) -> &Self {
        self.steps.lock().push_back(Step::Respond(Ok(ApiResponse::new(status, body.as_bytes()))));
        self
    }

    pub fn push_err(&self, error: NetworkError) -> &Self {
        self.steps.lock().push_back(Step::Respond(Err(error)));
        self
    }

    /// Respond only after `delay` of (tokio) time.
    pub fn push_delayed(&self, delay: Duration, outcome: Result<ApiResponse, NetworkError>) -> &Self {
        self.steps.lock().push_back(Step::Delay(delay, outcome));
        self
    }

    /// Never complete the call.
    pub fn push_hang(&self) -> &Self {
        self.steps.lock().push_back(Step::Hang);
        self
    }

    /// Number of attempts that reached the transport.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Credential passed to each attempt, in order.
    pub fn credentials(&self) -> Vec<Option<String>> {
        self.credentials.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        _request: &ApiRequest,
        credential: Option<&str>,
    ) -> Result<ApiResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().push(credential.map(str::to_string));

        let step = self.steps.lock().pop_front();
        match step {
            None => Ok(ApiResponse::empty(200)),
            Some(Step::Respond(outcome)) => outcome,
            Some(Step::Delay(delay, outcome)) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            Some(Step::Hang) => std::future::pending().await,
        }
    }
}
