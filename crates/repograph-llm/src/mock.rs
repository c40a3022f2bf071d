//! Scripted oracle for tests

use crate::provider::{LlmError, LlmOracle, LlmRequest, LlmResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Returns queued responses in order, then repeats the last one.
/// An empty queue makes every call fail, which exercises fallback paths.
pub struct MockOracle {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub calls: Mutex<Vec<LlmRequest>>,
}

impl MockOracle {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<String> {
        self.calls.lock().unwrap().push(request);
        let mut queue = self.responses.lock().unwrap();
        if let Some(next) = queue.pop_front() {
            *self.last.lock().unwrap() = Some(next.clone());
            return Ok(next);
        }
        if let Some(last) = self.last.lock().unwrap().clone() {
            return Ok(last);
        }
        Err(LlmError::RequestFailed("mock oracle exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replays_then_repeats() {
        let oracle = MockOracle::new(vec!["one", "two"]);
        assert_eq!(oracle.complete(LlmRequest::new("a")).await.unwrap(), "one");
        assert_eq!(oracle.complete(LlmRequest::new("b")).await.unwrap(), "two");
        assert_eq!(oracle.complete(LlmRequest::new("c")).await.unwrap(), "two");
        assert_eq!(oracle.call_count(), 3);
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let oracle = MockOracle::failing();
        assert!(oracle.complete(LlmRequest::new("x")).await.is_err());
    }
}
