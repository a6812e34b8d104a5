#[cfg(test)]
#[path = "monitor_store_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SessionListener;
use super::SessionSignal;
use crate::domain::models::decode;
use crate::domain::models::ApiResponse;
use crate::domain::models::ClientError;
use crate::domain::models::Monitor;
use crate::domain::models::MonitorsView;
use crate::domain::models::SessionEnd;
use crate::domain::models::SessionState;
use crate::domain::models::TransportBox;

pub const FETCH_FALLBACK: &str = "Unable to connect to telemetry stream.";

/// `tokio::time::interval` panics on a zero period.
pub const MINIMUM_POLL_PERIOD: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Cycle {
    issued: u64,
    settled: u64,
    in_flight: usize,
    generation: u64,
}

#[derive(Clone, Copy, Debug)]
struct Ticket {
    sequence: u64,
    generation: u64,
}

struct InFlight<'a> {
    store: &'a MonitorStore,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut cycle = self.store.cycle();
        cycle.in_flight = cycle.in_flight.saturating_sub(1);
    }
}

/// The client's copy of the user's monitors, refreshed on demand and by a
/// background poller while the dashboard is open.
pub struct MonitorStore {
    transport: TransportBox,
    signal: Arc<SessionSignal>,
    session: watch::Receiver<SessionState>,
    cycle: Mutex<Cycle>,
    view: watch::Sender<MonitorsView>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorStore {
    pub fn new(
        transport: TransportBox,
        signal: Arc<SessionSignal>,
        session: watch::Receiver<SessionState>,
    ) -> Arc<MonitorStore> {
        let (view, _) = watch::channel(MonitorsView::default());
        let store = Arc::new(MonitorStore {
            transport,
            signal: signal.clone(),
            session,
            cycle: Mutex::new(Cycle::default()),
            view,
            poller: Mutex::new(None),
        });

        let listener: Weak<MonitorStore> = Arc::downgrade(&store);
        signal.subscribe(listener);

        return store;
    }

    fn cycle(&self) -> MutexGuard<'_, Cycle> {
        return self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
    }

    fn is_authenticated(&self) -> bool {
        return self.session.borrow().is_authenticated();
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorsView> {
        return self.view.subscribe();
    }

    pub fn snapshot(&self) -> MonitorsView {
        return self.view.borrow().clone();
    }

    pub fn is_refreshing(&self) -> bool {
        return self.cycle().in_flight > 0;
    }

    pub fn is_running(&self) -> bool {
        return self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|handle| return !handle.is_finished())
            .unwrap_or(false);
    }

    fn issue(&self) -> (Ticket, InFlight<'_>) {
        let mut cycle = self.cycle();
        cycle.issued += 1;
        cycle.in_flight += 1;

        let ticket = Ticket {
            sequence: cycle.issued,
            generation: cycle.generation,
        };
        return (ticket, InFlight { store: self });
    }

    async fn fetch(&self) -> Result<Vec<Monitor>, ClientError> {
        let value = self
            .transport
            .request(Method::GET, "/monitor/list", None)
            .await?;

        let res: ApiResponse<Vec<Monitor>> = decode(value)?;
        if !res.is_success() {
            return Err(ClientError::Rejected(res.message_or(FETCH_FALLBACK)));
        }

        return Ok(res.data.unwrap_or_default());
    }

    /// Fetches the full list once. Responses that arrive after a newer one was
    /// applied, or after the session ended, are dropped. An authorization
    /// failure still ends the session unless the session already ended.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        if !self.is_authenticated() {
            return Err(ClientError::Unauthenticated);
        }

        let (ticket, in_flight) = self.issue();
        tracing::debug!(sequence = ticket.sequence, "Refreshing monitors");

        let outcome = self.fetch().await;
        drop(in_flight);

        match &outcome {
            Ok(monitors) => {
                tracing::debug!(sequence = ticket.sequence, count = monitors.len(), "Monitors fetched");
            }
            Err(err) => {
                tracing::warn!(sequence = ticket.sequence, error = %err, "Failed to refresh monitors");
            }
        }

        if self.settle(ticket, &outcome) {
            tracing::warn!("Backend rejected the session");
            self.signal.raise(SessionEnd::Rejected).await;
        }

        return outcome.map(|_| return ());
    }

    /// Applies an outcome to the view. Returns whether the session must end.
    fn settle(&self, ticket: Ticket, outcome: &Result<Vec<Monitor>, ClientError>) -> bool {
        let mut cycle = self.cycle();
        if ticket.generation != cycle.generation || !self.is_authenticated() {
            tracing::debug!(sequence = ticket.sequence, "Discarding refresh from an ended session");
            return false;
        }

        // Even a superseded response proves the token is no longer accepted.
        if matches!(outcome, Err(err) if err.is_unauthorized()) {
            return true;
        }

        if ticket.sequence <= cycle.settled {
            tracing::debug!(
                sequence = ticket.sequence,
                settled = cycle.settled,
                "Discarding stale refresh"
            );
            return false;
        }

        cycle.settled = ticket.sequence;
        self.view.send_modify(|view| {
            view.loading = false;
            view.applied_sequence = ticket.sequence;
            match outcome {
                Ok(monitors) => {
                    view.monitors = monitors.clone();
                    view.error = None;
                }
                Err(err) => {
                    view.error = Some(err.reason(FETCH_FALLBACK));
                }
            }
        });

        return false;
    }

    /// Poller entry point: skips the tick when a refresh is already outstanding.
    async fn refresh_if_idle(&self) {
        if self.is_refreshing() {
            tracing::debug!("Refresh outstanding, skipping tick");
            return;
        }

        // Failures already landed in the view.
        let _ = self.refresh().await;
    }

    /// Polls every `period`, the first tick fires immediately. Replaces a
    /// running poller.
    pub fn start(self: &Arc<Self>, period: Duration) {
        let period = if period.is_zero() {
            tracing::warn!(?period, minimum = ?MINIMUM_POLL_PERIOD, "Poll period too short, using the minimum");
            MINIMUM_POLL_PERIOD
        } else {
            period
        };

        let store = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let store = match store.upgrade() {
                    Some(store) => store,
                    None => return,
                };

                store.refresh_if_idle().await;
            }
        });

        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }

        tracing::info!(?period, "Poller started");
    }

    pub fn stop(&self) {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        self.cycle().generation += 1;

        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Poller stopped");
        }
    }

    pub fn reset(&self) {
        self.stop();
        self.view.send_replace(MonitorsView::default());
    }
}

#[async_trait]
impl SessionListener for MonitorStore {
    #[allow(clippy::implicit_return)]
    async fn on_session_end(&self, _reason: SessionEnd) {
        self.reset();
    }
}

impl Drop for MonitorStore {
    fn drop(&mut self) {
        if let Some(handle) = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
