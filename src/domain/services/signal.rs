#[cfg(test)]
#[path = "signal_test.rs"]
mod tests;

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::Weak;

use async_trait::async_trait;

use crate::domain::models::SessionEnd;

#[async_trait]
pub trait SessionListener {
    async fn on_session_end(&self, reason: SessionEnd);
}

type ListenerRef = Weak<dyn SessionListener + Send + Sync>;

/// The one place a session ends. Logout and authorization failures both raise
/// it, and everything that must not outlive the session listens to it.
#[derive(Default)]
pub struct SessionSignal {
    listeners: Mutex<Vec<ListenerRef>>,
}

impl SessionSignal {
    pub fn subscribe(&self, listener: ListenerRef) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|existing| return existing.strong_count() > 0);
        listeners.push(listener);
    }

    /// Listeners run one after another, in subscription order. The lock is
    /// released before any of them runs.
    pub async fn raise(&self, reason: SessionEnd) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|listener| return listener.upgrade())
            .collect::<Vec<_>>();

        tracing::info!(reason = %reason, listeners = listeners.len(), "Session ended");
        for listener in listeners {
            listener.on_session_end(reason).await;
        }
    }
}
