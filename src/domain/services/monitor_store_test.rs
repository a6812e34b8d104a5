use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Method;
use serde_json::json;
use serde_json::Value;
use test_utils::monitors_fixture;
use tokio::sync::watch;

use super::MonitorStore;
use super::FETCH_FALLBACK;
use super::MINIMUM_POLL_PERIOD;
use crate::domain::models::ClientError;
use crate::domain::models::CredentialStore;
use crate::domain::models::MonitorsView;
use crate::domain::models::SessionEnd;
use crate::domain::models::SessionState;
use crate::domain::models::TransportError;
use crate::domain::services::SessionManager;
use crate::domain::services::SessionSignal;
use crate::infrastructure::credentials::memory::MemoryCredentialStore;
use crate::infrastructure::transport::scripted::ScriptedTransport;

struct Fixture {
    transport: Arc<ScriptedTransport>,
    signal: Arc<SessionSignal>,
    session: watch::Sender<SessionState>,
    store: Arc<MonitorStore>,
}

fn fixture() -> Fixture {
    let transport = ScriptedTransport::new();
    let signal = Arc::new(SessionSignal::default());
    let (session, session_rx) = watch::channel(SessionState::Authenticated);
    let store = MonitorStore::new(transport.clone(), signal.clone(), session_rx);

    return Fixture {
        transport,
        signal,
        session,
        store,
    };
}

fn list(monitors: Value) -> Result<Value, TransportError> {
    return Ok(json!({
        "success": true,
        "message": "monitors retrieved",
        "data": monitors,
    }));
}

fn first_monitor() -> Value {
    return json!([monitors_fixture()[0].clone()]);
}

#[tokio::test]
async fn it_replaces_the_list_on_refresh() -> Result<()> {
    let fixture = fixture();
    assert!(fixture.store.snapshot().loading);

    fixture.transport.reply(list(monitors_fixture()));
    fixture.store.refresh().await?;

    let view = fixture.store.snapshot();
    assert_eq!(view.monitors.len(), 3);
    assert!(!view.loading);
    assert_eq!(view.error, None);
    assert_eq!(view.applied_sequence, 1);

    let calls = fixture.transport.calls();
    assert_eq!(calls[0].method, Method::GET);
    assert_eq!(calls[0].path, "/monitor/list");
    assert_eq!(calls[0].body, None);
    return Ok(());
}

#[tokio::test]
async fn it_treats_null_data_as_an_empty_list() -> Result<()> {
    let fixture = fixture();
    fixture.transport.reply(list(monitors_fixture()));
    fixture.transport.reply(list(Value::Null));

    fixture.store.refresh().await?;
    fixture.store.refresh().await?;

    let view = fixture.store.snapshot();
    assert!(view.monitors.is_empty());
    assert!(!view.loading);
    assert_eq!(view.error, None);
    return Ok(());
}

#[tokio::test]
async fn it_requires_an_authenticated_session() {
    let fixture = fixture();
    fixture.session.send_replace(SessionState::Unauthenticated);

    let res = fixture.store.refresh().await;

    assert_eq!(res, Err(ClientError::Unauthenticated));
    assert_eq!(fixture.transport.call_count(), 0);
}

#[tokio::test]
async fn it_keeps_the_list_when_a_refresh_fails() -> Result<()> {
    let fixture = fixture();
    fixture.transport.reply(list(monitors_fixture()));
    fixture
        .transport
        .reply(Err(TransportError::network("connection refused")));
    fixture.transport.reply(Err(TransportError::Server {
        status: 500,
        message: Some("database unavailable".to_string()),
    }));
    fixture.transport.reply(list(monitors_fixture()));

    fixture.store.refresh().await?;

    assert!(fixture.store.refresh().await.is_err());
    let view = fixture.store.snapshot();
    assert_eq!(view.monitors.len(), 3);
    assert_eq!(view.error.as_deref(), Some(FETCH_FALLBACK));

    assert!(fixture.store.refresh().await.is_err());
    assert_eq!(
        fixture.store.snapshot().error.as_deref(),
        Some("database unavailable")
    );

    fixture.store.refresh().await?;
    assert_eq!(fixture.store.snapshot().error, None);
    return Ok(());
}

#[tokio::test]
async fn it_surfaces_declined_envelopes() {
    let fixture = fixture();
    fixture.transport.reply(Ok(json!({ "success": false })));

    let res = fixture.store.refresh().await;

    assert_eq!(res, Err(ClientError::Rejected(FETCH_FALLBACK.to_string())));
    let view = fixture.store.snapshot();
    assert!(!view.loading);
    assert_eq!(view.error.as_deref(), Some(FETCH_FALLBACK));
}

#[tokio::test]
async fn it_discards_responses_that_arrive_out_of_order() -> Result<()> {
    let fixture = fixture();
    let older = fixture.transport.defer();
    let newer = fixture.transport.defer();

    let store = fixture.store.clone();
    let first = tokio::spawn(async move {
        return store.refresh().await;
    });
    fixture.transport.wait_for_calls(1).await;

    let store = fixture.store.clone();
    let second = tokio::spawn(async move {
        return store.refresh().await;
    });
    fixture.transport.wait_for_calls(2).await;

    let _ = newer.send(list(first_monitor()));
    second.await??;
    let _ = older.send(list(monitors_fixture()));
    first.await??;

    let view = fixture.store.snapshot();
    assert_eq!(view.monitors.len(), 1);
    assert_eq!(view.applied_sequence, 2);
    return Ok(());
}

#[tokio::test]
async fn it_ignores_failures_from_superseded_refreshes() -> Result<()> {
    let fixture = fixture();
    let older = fixture.transport.defer();
    fixture.transport.reply(list(monitors_fixture()));

    let store = fixture.store.clone();
    let first = tokio::spawn(async move {
        return store.refresh().await;
    });
    fixture.transport.wait_for_calls(1).await;

    fixture.store.refresh().await?;
    let _ = older.send(Err(TransportError::network("timed out")));
    assert!(first.await?.is_err());

    let view = fixture.store.snapshot();
    assert_eq!(view.monitors.len(), 3);
    assert_eq!(view.error, None);
    return Ok(());
}

#[tokio::test]
async fn it_ends_the_session_on_a_superseded_unauthorized_reply() -> Result<()> {
    let transport = ScriptedTransport::new();
    let credentials = Arc::new(MemoryCredentialStore::with_token("revoked"));
    let signal = Arc::new(SessionSignal::default());
    let session = SessionManager::new(transport.clone(), credentials.clone(), signal.clone()).await;
    let store = MonitorStore::new(transport.clone(), signal.clone(), session.subscribe());

    let older = transport.defer();
    transport.reply(list(monitors_fixture()));

    let pending = store.clone();
    let first = tokio::spawn(async move {
        return pending.refresh().await;
    });
    transport.wait_for_calls(1).await;

    store.refresh().await?;
    assert_eq!(store.snapshot().applied_sequence, 2);

    let _ = older.send(Err(TransportError::Server {
        status: 401,
        message: Some("Invalid token".to_string()),
    }));
    let res = first.await?;

    assert!(res.unwrap_err().is_unauthorized());
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(credentials.load().await, None);
    assert_eq!(store.snapshot(), MonitorsView::default());
    return Ok(());
}

#[tokio::test]
async fn it_ignores_an_unauthorized_reply_after_logout() -> Result<()> {
    let transport = ScriptedTransport::new();
    let credentials = Arc::new(MemoryCredentialStore::with_token("abc"));
    let signal = Arc::new(SessionSignal::default());
    let session = SessionManager::new(transport.clone(), credentials.clone(), signal.clone()).await;
    let store = MonitorStore::new(transport.clone(), signal.clone(), session.subscribe());
    let pending = transport.defer();

    let refreshing = store.clone();
    let refresh = tokio::spawn(async move {
        return refreshing.refresh().await;
    });
    transport.wait_for_calls(1).await;

    session.logout().await?;
    transport.reply(Ok(json!({ "data": { "token": "next" } })));
    session.login("a@b.co", "pw").await?;

    let _ = pending.send(Err(TransportError::Server {
        status: 401,
        message: None,
    }));
    assert!(refresh.await?.is_err());

    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(credentials.load().await, Some("next".to_string()));
    return Ok(());
}

#[tokio::test]
async fn it_drops_a_refresh_that_outlives_the_session() -> Result<()> {
    let fixture = fixture();
    let pending = fixture.transport.defer();

    let store = fixture.store.clone();
    let refresh = tokio::spawn(async move {
        return store.refresh().await;
    });
    fixture.transport.wait_for_calls(1).await;

    fixture.session.send_replace(SessionState::Unauthenticated);
    fixture.signal.raise(SessionEnd::LoggedOut).await;
    let _ = pending.send(list(monitors_fixture()));
    refresh.await??;

    assert_eq!(fixture.store.snapshot(), MonitorsView::default());
    return Ok(());
}

#[tokio::test]
async fn it_ends_the_session_on_unauthorized() -> Result<()> {
    let transport = ScriptedTransport::new();
    let credentials = Arc::new(MemoryCredentialStore::with_token("expired"));
    let signal = Arc::new(SessionSignal::default());
    let session = SessionManager::new(transport.clone(), credentials.clone(), signal.clone()).await;
    let store = MonitorStore::new(transport.clone(), signal.clone(), session.subscribe());

    transport.reply(list(monitors_fixture()));
    transport.reply(Err(TransportError::Server {
        status: 401,
        message: Some("Invalid token".to_string()),
    }));

    store.start(Duration::from_secs(60));
    store.refresh().await?;
    assert_eq!(store.snapshot().monitors.len(), 3);

    let res = store.refresh().await;

    assert!(res.unwrap_err().is_unauthorized());
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert_eq!(credentials.load().await, None);
    assert_eq!(store.snapshot(), MonitorsView::default());
    assert!(!store.is_running());
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_polls_until_stopped() -> Result<()> {
    let fixture = fixture();
    for _ in 0..3 {
        fixture.transport.reply(list(monitors_fixture()));
    }

    fixture.store.start(Duration::from_secs(5));
    assert!(fixture.store.is_running());

    // The first tick is immediate.
    fixture.transport.wait_for_calls(1).await;
    assert_eq!(fixture.transport.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    fixture.transport.wait_for_calls(2).await;

    fixture.store.stop();
    fixture.store.stop();
    assert!(!fixture.store.is_running());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fixture.transport.call_count(), 2);
    assert_eq!(fixture.store.snapshot().monitors.len(), 3);
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_skips_ticks_while_a_refresh_is_outstanding() -> Result<()> {
    let fixture = fixture();
    let pending = fixture.transport.defer();

    let store = fixture.store.clone();
    let refresh = tokio::spawn(async move {
        return store.refresh().await;
    });
    fixture.transport.wait_for_calls(1).await;
    assert!(fixture.store.is_refreshing());

    fixture.store.start(Duration::from_secs(5));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fixture.transport.call_count(), 1);

    let _ = pending.send(list(monitors_fixture()));
    refresh.await??;
    assert!(!fixture.store.is_refreshing());

    fixture.transport.reply(list(first_monitor()));
    tokio::time::sleep(Duration::from_secs(5)).await;
    fixture.transport.wait_for_calls(2).await;

    fixture.store.stop();
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_stops_polling_on_logout() -> Result<()> {
    let fixture = fixture();
    fixture.transport.reply(list(monitors_fixture()));

    fixture.store.start(Duration::from_secs(5));
    fixture.transport.wait_for_calls(1).await;

    fixture.session.send_replace(SessionState::Unauthenticated);
    fixture.signal.raise(SessionEnd::LoggedOut).await;
    assert!(!fixture.store.is_running());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fixture.transport.call_count(), 1);
    assert_eq!(fixture.store.snapshot(), MonitorsView::default());
    return Ok(());
}

#[tokio::test(start_paused = true)]
async fn it_polls_at_the_minimum_period_when_given_zero() -> Result<()> {
    let fixture = fixture();
    for _ in 0..2 {
        fixture.transport.reply(list(monitors_fixture()));
    }

    fixture.store.start(Duration::ZERO);
    fixture.transport.wait_for_calls(1).await;
    assert!(fixture.store.is_running());

    tokio::time::sleep(MINIMUM_POLL_PERIOD).await;
    fixture.transport.wait_for_calls(2).await;

    fixture.store.stop();
    assert_eq!(fixture.store.snapshot().monitors.len(), 3);
    return Ok(());
}
