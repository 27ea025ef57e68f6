use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::traits::{CategoryOracle, OracleError, OracleRequest, OracleResponse};

/// Deterministic oracle for tests: returns a fixed response (or a fixed
/// failure) and counts how many times it was consulted.
pub struct StubOracle {
    responses: Mutex<Vec<OracleResponse>>,
    fallback: Option<OracleResponse>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubOracle {
    /// Always answer with the given labels.
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: Some(OracleResponse {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                explanation: "stubbed".to_string(),
            }),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer each call with the next queued response, then fall back to
    /// the last one.
    pub fn with_sequence(responses: Vec<OracleResponse>) -> Self {
        let fallback = responses.last().cloned();
        Self {
            responses: Mutex::new(responses),
            fallback,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with `OracleError::Unavailable`.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CategoryOracle for StubOracle {
    async fn categorize(&self, _request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(OracleError::Unavailable("stub failure".to_string()));
        }

        let mut queue = self.responses.lock().expect("stub poisoned");
        if !queue.is_empty() {
            return Ok(queue.remove(0));
        }
        drop(queue);

        self.fallback
            .clone()
            .ok_or_else(|| OracleError::Unavailable("stub exhausted".to_string()))
    }
}
