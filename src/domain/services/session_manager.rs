#[cfg(test)]
#[path = "session_manager_test.rs"]
mod tests;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use serde_json::Value;
use tokio::sync::watch;
use tokio::sync::Mutex;

use super::SessionListener;
use super::SessionSignal;
use crate::domain::models::decode;
use crate::domain::models::Access;
use crate::domain::models::ApiResponse;
use crate::domain::models::ClientError;
use crate::domain::models::CredentialStoreBox;
use crate::domain::models::LoginResponse;
use crate::domain::models::Route;
use crate::domain::models::SessionEnd;
use crate::domain::models::SessionState;
use crate::domain::models::TransportBox;

pub const LOGIN_FALLBACK: &str = "Failed to login";
pub const REGISTER_FALLBACK: &str = "Failed to register";

/// Owns authentication state. The token lives in the credential store, the
/// state machine lives here and is published to subscribers.
pub struct SessionManager {
    transport: TransportBox,
    credentials: CredentialStoreBox,
    signal: Arc<SessionSignal>,
    state: watch::Sender<SessionState>,
    /// Bumped whenever a session is ended. A login only commits when the
    /// epoch it started in is still current.
    epoch: AtomicU64,
    /// Serializes writes to the credential store.
    persist: Mutex<()>,
}

impl SessionManager {
    /// Restores an authenticated session when the credential store still holds
    /// a token from a previous run.
    pub async fn new(
        transport: TransportBox,
        credentials: CredentialStoreBox,
        signal: Arc<SessionSignal>,
    ) -> Arc<SessionManager> {
        let initial = if credentials.load().await.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        };

        let (state, _) = watch::channel(initial);
        let manager = Arc::new(SessionManager {
            transport,
            credentials,
            signal: signal.clone(),
            state,
            epoch: AtomicU64::new(0),
            persist: Mutex::new(()),
        });

        let listener: Weak<SessionManager> = Arc::downgrade(&manager);
        signal.subscribe(listener);

        tracing::debug!(state = %initial, "Session restored");
        return manager;
    }

    pub fn state(&self) -> SessionState {
        return *self.state.borrow();
    }

    pub fn is_authenticated(&self) -> bool {
        return self.state().is_authenticated();
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        return self.state.subscribe();
    }

    /// Decided from the current state alone: protected routes are only shown
    /// to an authenticated session, a login in progress still redirects.
    pub fn guard(&self, route: Route) -> Access {
        if !route.is_protected() || self.is_authenticated() {
            return Access::Granted;
        }

        return Access::Redirect(Route::Login);
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(from = %previous, to = %next, "Session transition");
        }
    }

    /// Moves to `Authenticating` only from `Unauthenticated`, atomically.
    /// Returns the epoch the attempt belongs to.
    fn begin_authenticating(&self) -> Result<u64, ClientError> {
        let mut rejected = None;
        let mut epoch = 0;
        self.state.send_if_modified(|state| {
            if *state != SessionState::Unauthenticated {
                rejected = Some(*state);
                return false;
            }

            *state = SessionState::Authenticating;
            epoch = self.epoch.load(Ordering::SeqCst);
            return true;
        });

        if let Some(state) = rejected {
            return Err(ClientError::InvalidSession(state));
        }

        tracing::info!(from = %SessionState::Unauthenticated, to = %SessionState::Authenticating, "Session transition");
        return Ok(epoch);
    }

    /// Leaves `Authenticating` for `next`, unless the session was ended since
    /// the attempt began.
    fn finish_authenticating(&self, epoch: u64, next: SessionState) -> bool {
        let finished = self.state.send_if_modified(|state| {
            if *state != SessionState::Authenticating || self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }

            *state = next;
            return true;
        });

        if finished {
            tracing::info!(from = %SessionState::Authenticating, to = %next, "Session transition");
        }

        return finished;
    }

    async fn request_token(&self, email: &str, password: &str) -> Result<String, ClientError> {
        let value = self
            .transport
            .request(
                Method::POST,
                "/auth/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await?;

        let res: LoginResponse = decode(value)?;
        if !res.envelope.is_success() {
            return Err(ClientError::Rejected(res.envelope.message_or(LOGIN_FALLBACK)));
        }

        return res
            .token()
            .ok_or_else(|| return ClientError::Rejected(LOGIN_FALLBACK.to_string()));
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let epoch = self.begin_authenticating()?;

        let token = match self.request_token(email, password).await {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, "Login failed");
                self.finish_authenticating(epoch, SessionState::Unauthenticated);
                return Err(err);
            }
        };

        let _persist = self.persist.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::info!("Session ended while logging in, discarding the token");
            return Err(ClientError::InvalidSession(self.state()));
        }

        if let Err(err) = self.credentials.save(&token).await {
            tracing::error!(error = ?err, "Failed to persist credentials");
            self.finish_authenticating(epoch, SessionState::Unauthenticated);
            return Err(ClientError::Storage(err.to_string()));
        }

        if !self.finish_authenticating(epoch, SessionState::Authenticated) {
            if let Err(err) = self.credentials.clear().await {
                tracing::error!(error = ?err, "Failed to clear discarded credentials");
            }
            return Err(ClientError::InvalidSession(self.state()));
        }

        return Ok(());
    }

    /// Creates an account. Registration never signs in, on success the caller
    /// moves on to the login flow. Returns the backend's confirmation message.
    pub async fn register(&self, email: &str, password: &str) -> Result<String, ClientError> {
        let state = self.state();
        if state != SessionState::Unauthenticated {
            return Err(ClientError::InvalidSession(state));
        }

        let value = self
            .transport
            .request(
                Method::POST,
                "/auth/register",
                Some(json!({ "email": email, "password": password })),
            )
            .await?;

        let res: ApiResponse<Value> = decode(value)?;
        if !res.is_success() {
            return Err(ClientError::Rejected(res.message_or(REGISTER_FALLBACK)));
        }

        return Ok(res.message_or("registration successful"));
    }

    /// Clears the token and ends the session for every listener, which stops
    /// polling and empties the monitor list. A login still in flight is
    /// abandoned.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let cleared = {
            let _persist = self.persist.lock().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.credentials.clear().await
        };
        self.signal.raise(SessionEnd::LoggedOut).await;

        return cleared.map_err(|err| return ClientError::Storage(err.to_string()));
    }
}

#[async_trait]
impl SessionListener for SessionManager {
    #[allow(clippy::implicit_return)]
    async fn on_session_end(&self, reason: SessionEnd) {
        if reason == SessionEnd::Rejected {
            // A stale rejection must not cancel a login that is in progress.
            if !self.is_authenticated() {
                return;
            }

            let _persist = self.persist.lock().await;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = self.credentials.clear().await {
                tracing::error!(error = ?err, "Failed to clear rejected credentials");
            }
        }

        self.transition(SessionState::Unauthenticated);
    }
}
