/*!
 * Mock provider implementation for testing.
 *
 * The mock never touches the network. It answers from a script of queued
 * replies, or from a responder function, and records every request so tests
 * can assert how many remote calls the pipeline made and what they carried:
 * - `MockProvider::scripted(..)` - Answers queued replies in order
 * - `MockProvider::intermittent(n)` - Fails every Nth request
 * - `MockProvider::failing()` - Always fails with an error
 */

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::ProviderError;
use super::{ChatRequest, Completion, Provider};

/// A queued reply
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Successful completion text
    Text(String),
    /// Failure with the given HTTP status
    Failure(u16),
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Answers from the script, then from the responder, then with empty text
    Scripted,
    /// Like `Scripted`, but every Nth request fails before consuming the script
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
}

#[derive(Debug, Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    requests: Vec<ChatRequest>,
}

/// Mock provider for testing pipeline behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Script and request log, shared between clones
    state: Arc<Mutex<MockState>>,
    /// Fallback reply generator once the script is exhausted
    responder: Option<fn(&ChatRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            state: Arc::new(Mutex::new(MockState::default())),
            responder: None,
        }
    }

    /// Create a mock that answers the given texts in order
    pub fn scripted<S: AsRef<str>>(replies: &[S]) -> Self {
        let provider = Self::new(MockBehavior::Scripted);
        for reply in replies {
            provider.push_reply(reply.as_ref());
        }
        provider
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Set a reply generator used once the script runs out
    pub fn with_responder(mut self, responder: fn(&ChatRequest) -> String) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Queue a successful reply
    pub fn push_reply(&self, text: impl Into<String>) {
        self.lock().replies.push_back(MockReply::Text(text.into()));
    }

    /// Queue a failed reply
    pub fn push_failure(&self, status_code: u16) {
        self.lock().replies.push_back(MockReply::Failure(status_code));
    }

    /// Number of requests received so far, across clones
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Copies of all requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }

    /// Number of queued replies not consumed yet
    pub fn remaining_replies(&self) -> usize {
        self.lock().replies.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the log from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, ProviderError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        let count = state.requests.len();

        match self.behavior {
            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "Simulated provider failure".to_string(),
                });
            }
            MockBehavior::Intermittent { fail_every } if count % fail_every == 0 => {
                return Err(ProviderError::ApiError {
                    status_code: 503,
                    message: format!("Simulated intermittent failure (request #{})", count),
                });
            }
            _ => {}
        }

        let prompt_tokens = request.user_prompt().map(|p| p.len() as u64);
        match state.replies.pop_front() {
            Some(MockReply::Text(text)) => Ok(Completion {
                completion_tokens: Some(text.len() as u64),
                text,
                prompt_tokens,
            }),
            Some(MockReply::Failure(status_code)) => Err(ProviderError::from_status(
                status_code,
                format!("Scripted failure (request #{})", count),
            )),
            None => {
                let text = self.responder.map(|r| r(request)).unwrap_or_default();
                Ok(Completion { text, prompt_tokens, completion_tokens: None })
            }
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
