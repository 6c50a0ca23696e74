use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatClient, ChatMode, LlmError, Message};

type Responder = Box<dyn Fn(&[Message], ChatMode) -> Result<String, LlmError> + Send + Sync>;

/// Chat client that replays queued responses, or computes them from the
/// request with a responder closure.
pub struct MockChatClient {
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl std::fmt::Debug for MockChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChatClient")
            .field("queued", &self.queue.lock().len())
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

impl MockChatClient {
    /// Replays `responses` in order; once drained every call fails.
    pub fn scripted<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
            responder: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[Message], ChatMode) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: Result<String, LlmError>) {
        self.queue.lock().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages of every call so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn chat(&self, messages: &[Message], mode: ChatMode) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(messages.to_vec());

        if let Some(response) = self.queue.lock().pop_front() {
            return response;
        }
        match &self.responder {
            Some(responder) => responder(messages, mode),
            None => Err(LlmError::internal("mock script exhausted")),
        }
    }
}
