#[cfg(test)]
#[path = "sentinel_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;

use super::MonitorStore;
use super::Mutations;
use super::SessionManager;
use super::SessionSignal;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Access;
use crate::domain::models::ClientError;
use crate::domain::models::CredentialStoreBox;
use crate::domain::models::CredentialStoreName;
use crate::domain::models::Route;
use crate::domain::models::TransportBox;
use crate::infrastructure::credentials::CredentialStoreManager;
use crate::infrastructure::transport::HttpTransport;

/// Wires the session, the monitor store and the mutation flow around one
/// transport and one credential store. Dropping it stops the poller.
pub struct Sentinel {
    session: Arc<SessionManager>,
    monitors: Arc<MonitorStore>,
    mutations: Mutations,
}

impl Sentinel {
    pub async fn new(transport: TransportBox, credentials: CredentialStoreBox) -> Sentinel {
        let signal = Arc::new(SessionSignal::default());
        let session = SessionManager::new(transport.clone(), credentials, signal.clone()).await;
        let monitors = MonitorStore::new(transport.clone(), signal.clone(), session.subscribe());
        let mutations = Mutations::new(transport, monitors.clone(), signal, session.subscribe());

        return Sentinel {
            session,
            monitors,
            mutations,
        };
    }

    pub async fn from_config() -> Result<Sentinel> {
        let store_name = Config::get(ConfigKey::CredentialStore);
        let name = CredentialStoreName::parse(store_name.clone())
            .with_context(|| return format!("Unknown credential store '{store_name}'"))?;

        let credentials = CredentialStoreManager::get(name)?;
        tracing::debug!(store = %credentials.name(), "Using credential store");
        let transport = HttpTransport::from_config(credentials.clone())?;

        return Ok(Sentinel::new(Arc::new(transport), credentials).await);
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        return &self.session;
    }

    pub fn monitors(&self) -> &Arc<MonitorStore> {
        return &self.monitors;
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<String, ClientError> {
        return self.session.register(email, password).await;
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        return self.session.login(email, password).await;
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        return self.session.logout().await;
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        return self.monitors.refresh().await;
    }

    pub async fn add_monitor(&self, url: &str, interval_seconds: u64) -> Result<String, ClientError> {
        return self.mutations.add_monitor(url, interval_seconds).await;
    }

    /// Enters the protected dashboard and starts polling.
    pub fn open_dashboard(&self, period: Duration) -> Result<(), ClientError> {
        if let Access::Redirect(route) = self.session.guard(Route::Dashboard) {
            tracing::debug!(?route, "Dashboard requires a session");
            return Err(ClientError::Unauthenticated);
        }

        if self.monitors.is_running() {
            tracing::debug!("Dashboard already open, restarting the poller");
        }

        self.monitors.start(period);
        return Ok(());
    }

    pub fn close_dashboard(&self) {
        self.monitors.stop();
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.monitors.stop();
    }
}
