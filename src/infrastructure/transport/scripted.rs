use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::domain::models::Transport;
use crate::domain::models::TransportError;

type Reply = Result<Value, TransportError>;

enum Scripted {
    Now(Reply),
    Deferred(oneshot::Receiver<Reply>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Answers requests from a queue of scripted replies, in call order. Deferred
/// replies stay pending until the test resolves them, which lets tests decide
/// the order responses arrive in.
#[derive(Default)]
pub struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<VecDeque<Scripted>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<ScriptedTransport> {
        return Arc::new(ScriptedTransport::default());
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(Scripted::Now(reply));
    }

    pub fn defer(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Scripted::Deferred(rx));
        return tx;
    }

    pub fn calls(&self) -> Vec<Call> {
        return self.calls.lock().unwrap().clone();
    }

    pub fn call_count(&self) -> usize {
        return self.calls.lock().unwrap().len();
    }

    /// Yields to other tasks until `count` requests were made.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    #[allow(clippy::implicit_return)]
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body,
        });

        let scripted = self.replies.lock().unwrap().pop_front();
        return match scripted {
            Some(Scripted::Now(reply)) => reply,
            Some(Scripted::Deferred(rx)) => rx
                .await
                .unwrap_or_else(|_| return Err(TransportError::network("reply dropped"))),
            None => Err(TransportError::network("no scripted reply")),
        };
    }
}
