//! Scripted presence client for exercising the manager without a running
//! Discord client.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::traits::{
    Activity, DisconnectSignal, PresenceClient, PresenceConnection, PresenceError, PresenceSession,
};

/// Knobs for a test run. The default behavior is a well-behaved service.
#[derive(Debug, Default)]
pub struct MockBehavior {
    /// Fail every handshake with this message.
    pub fail_connect: Option<String>,
    /// Delay every activity send, so the manager's timeout race can win.
    pub activity_delay: Option<Duration>,
    /// Fail every activity send.
    pub fail_activity: bool,
}

/// Shared observation point for everything the manager did to the mock.
pub struct MockState {
    behavior: MockBehavior,
    pub connect_calls: AtomicUsize,
    /// Sends started (incremented before any scripted delay or failure).
    pub activity_attempts: AtomicUsize,
    /// Successfully recorded payloads.
    pub activities: Mutex<Vec<Activity>>,
    pub clears: AtomicUsize,
    pub closes: AtomicUsize,
    ready: AtomicBool,
    disconnect: Notify,
}

impl MockState {
    /// Simulate the service dropping the connection.
    pub fn trigger_disconnect(&self) {
        self.disconnect.notify_one();
    }
}

pub struct MockClient {
    state: Arc<MockState>,
}

impl MockClient {
    pub fn with_behavior(behavior: MockBehavior) -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState {
            behavior,
            connect_calls: AtomicUsize::new(0),
            activity_attempts: AtomicUsize::new(0),
            activities: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
            disconnect: Notify::new(),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[async_trait]
impl PresenceClient for MockClient {
    async fn connect(&self, _application_id: &str) -> Result<PresenceConnection, PresenceError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.state.behavior.fail_connect {
            return Err(PresenceError::Handshake(message.clone()));
        }

        self.state.ready.store(true, Ordering::SeqCst);

        let signal_state = Arc::clone(&self.state);
        let disconnected: DisconnectSignal = Box::pin(async move {
            signal_state.disconnect.notified().await;
            signal_state.ready.store(false, Ordering::SeqCst);
        });

        Ok(PresenceConnection {
            session: Box::new(MockSession {
                state: Arc::clone(&self.state),
            }),
            disconnected,
        })
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl PresenceSession for MockSession {
    fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    async fn set_activity(&self, activity: &Activity) -> Result<(), PresenceError> {
        self.state.activity_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.state.behavior.activity_delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.behavior.fail_activity {
            return Err(PresenceError::Update("scripted failure".to_string()));
        }

        self.state.activities.lock().unwrap().push(activity.clone());
        Ok(())
    }

    async fn clear_activity(&self) -> Result<(), PresenceError> {
        self.state.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
