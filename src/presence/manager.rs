//! Presence session lifecycle: connect, disconnect, reconnect and the
//! periodic refresh tick.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::editor::EditorState;
use crate::notify::{Notification, Notifier, Remediation};
use crate::settings::{Settings, SettingsStore};

use super::snapshot::build_snapshot;
use super::traits::{PresenceClient, PresenceError, PresenceSession};

/// How often the activity snapshot is recomputed and re-sent while connected.
const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Pause between teardown and redial, so the external client observes the
/// teardown before the next handshake begins.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Hard cap on a single activity send; an in-flight send is raced against
/// this, never actively cancelled.
const UPDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the one session handle and the one refresh task.
///
/// Session and refresh task are armed and torn down together; the only
/// exception is an external disconnect, which cancels the refresh task and
/// leaves a stale not-ready handle behind until the next connect replaces it.
pub struct PresenceManager {
    inner: Arc<Inner>,
}

struct Inner {
    client: Box<dyn PresenceClient>,
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    start_timestamp: i64,
    editor: Mutex<EditorState>,
    session: tokio::sync::Mutex<Option<Box<dyn PresenceSession>>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

/// What the control surface reports to the editor plugin.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub enabled: bool,
    pub connected: bool,
    pub refreshing: bool,
    pub file_name: Option<String>,
    pub workspace_name: Option<String>,
}

impl PresenceManager {
    pub fn new(
        client: Box<dyn PresenceClient>,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                settings,
                notifier,
                start_timestamp: unix_now(),
                editor: Mutex::new(EditorState::default()),
                session: tokio::sync::Mutex::new(None),
                refresh_task: Mutex::new(None),
                watch_task: Mutex::new(None),
            }),
        }
    }

    /// Unix seconds captured when the manager was built; deliberately stable
    /// across reconnects within one process lifetime.
    pub fn start_timestamp(&self) -> i64 {
        self.inner.start_timestamp
    }

    /// Establish a session if settings allow it.
    pub async fn connect(&self) {
        Arc::clone(&self.inner).connect().await;
    }

    /// Tear the session down. Safe to call at any time, in any state.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    /// Disconnect, wait out the fixed delay, connect again.
    pub async fn reconnect(&self) {
        Arc::clone(&self.inner).reconnect().await;
    }

    pub async fn enable(&self) {
        self.inner.persist_enabled(true);
        Arc::clone(&self.inner).connect().await;
    }

    pub async fn disable(&self) {
        self.inner.persist_enabled(false);
        self.inner.disconnect().await;
    }

    /// Apply a full settings document, then cycle the session so every change
    /// takes effect.
    pub async fn apply_settings(&self, settings: Settings) {
        if let Err(err) = self.inner.settings.replace(settings) {
            tracing::warn!("failed to persist settings: {}", err);
        }
        Arc::clone(&self.inner).reconnect().await;
    }

    pub fn set_active_editor(&self, file_name: Option<String>, language_id: Option<String>) {
        let mut editor = self.inner.editor.lock().unwrap();
        editor.file_name = file_name;
        editor.language_id = language_id;
    }

    pub fn set_workspace(&self, workspace_name: Option<String>) {
        self.inner.editor.lock().unwrap().workspace_name = workspace_name;
    }

    /// Recompute the snapshot and send it, bounded by the send timeout.
    pub async fn update_activity(&self) {
        self.inner.update_activity().await;
    }

    pub async fn status(&self) -> StatusReport {
        self.inner.status().await
    }

    pub fn refresh_active(&self) -> bool {
        self.inner.refresh_active()
    }
}

impl Inner {
    async fn connect(self: Arc<Self>) {
        let settings = self.settings.current();

        if !settings.enabled {
            tracing::debug!("presence is disabled, not connecting");
            return;
        }

        if settings.application_id.is_empty() {
            self.notifier.notify(
                Notification::warning(
                    "No Discord application id is configured. Set one to enable Rich Presence.",
                )
                .with_remediation(Remediation::OpenSettings),
            );
            return;
        }

        match self.client.connect(&settings.application_id).await {
            Ok(connection) => {
                self.cancel_watch_task();
                self.cancel_refresh_task();

                {
                    let mut session = self.session.lock().await;
                    if let Some(old) = session.take() {
                        old.close().await;
                    }
                    *session = Some(connection.session);
                }
                tracing::info!("presence session established");

                self.update_activity().await;

                let inner = Arc::clone(&self);
                let refresh = tokio::spawn(async move {
                    loop {
                        tokio::time::sleep(REFRESH_INTERVAL).await;
                        inner.update_activity().await;
                    }
                });
                *self.refresh_task.lock().unwrap() = Some(refresh);

                let inner = Arc::clone(&self);
                let disconnected = connection.disconnected;
                let watch = tokio::spawn(async move {
                    disconnected.await;
                    // Expected external lifecycle event: stop refreshing and
                    // leave the rest of the state untouched.
                    tracing::info!("presence service closed the connection");
                    inner.cancel_refresh_task();
                });
                *self.watch_task.lock().unwrap() = Some(watch);
            }
            Err(err) => {
                self.notifier.notify(Notification::error(format!(
                    "Failed to connect to Discord: {}",
                    err
                )));
            }
        }
    }

    async fn disconnect(&self) {
        self.cancel_watch_task();
        self.cancel_refresh_task();

        let old = self.session.lock().await.take();
        if let Some(session) = old {
            match tokio::time::timeout(UPDATE_TIMEOUT, session.clear_activity()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::debug!("failed to clear activity during disconnect: {}", err)
                }
                Err(_) => tracing::debug!("clearing activity timed out during disconnect"),
            }
            session.close().await;
            tracing::info!("presence session closed");
        }
    }

    async fn reconnect(self: Arc<Self>) {
        self.disconnect().await;
        tokio::time::sleep(RECONNECT_DELAY).await;
        self.connect().await;
    }

    /// Send failures and timeouts are reported but leave session and timer
    /// untouched; the next tick retries implicitly. Without a ready session
    /// this is a silent no-op.
    async fn update_activity(&self) {
        let session = self.session.lock().await;
        let Some(session) = session.as_ref() else {
            return;
        };
        if !session.is_ready() {
            tracing::debug!("presence session not ready, skipping activity update");
            return;
        }

        let snapshot = {
            let editor = self.editor.lock().unwrap();
            build_snapshot(&editor, &self.settings.current(), self.start_timestamp)
        };

        let result = match tokio::time::timeout(UPDATE_TIMEOUT, session.set_activity(&snapshot)).await
        {
            Ok(result) => result,
            Err(_) => Err(PresenceError::UpdateTimeout),
        };

        match result {
            Ok(()) => tracing::debug!("activity updated"),
            Err(err) => self.notifier.notify(Notification::error(format!(
                "Failed to update activity: {}",
                err
            ))),
        }
    }

    async fn status(&self) -> StatusReport {
        let connected = {
            let session = self.session.lock().await;
            session.as_ref().map(|s| s.is_ready()).unwrap_or(false)
        };
        let (file_name, workspace_name) = {
            let editor = self.editor.lock().unwrap();
            (editor.file_name.clone(), editor.workspace_name.clone())
        };

        StatusReport {
            enabled: self.settings.current().enabled,
            connected,
            refreshing: self.refresh_active(),
            file_name,
            workspace_name,
        }
    }

    fn refresh_active(&self) -> bool {
        self.refresh_task
            .lock()
            .unwrap()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    fn persist_enabled(&self, enabled: bool) {
        if let Err(err) = self.settings.update(|s| s.enabled = enabled) {
            tracing::warn!("failed to persist enabled={}: {}", enabled, err);
        }
    }

    fn cancel_refresh_task(&self) {
        if let Some(task) = self.refresh_task.lock().unwrap().take() {
            task.abort();
        }
    }

    fn cancel_watch_task(&self) {
        if let Some(task) = self.watch_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
