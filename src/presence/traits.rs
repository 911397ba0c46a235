use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

/// The presence payload sent to the external service on every refresh.
///
/// Recomputed from live editor/workspace state each time; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub details: String,
    pub state: String,
    /// Unix seconds; set once per process, survives reconnects.
    pub start_timestamp: i64,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: Option<String>,
    pub small_image_text: Option<String>,
    pub instance: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("invalid application id {0:?}: expected a numeric Discord application id")]
    InvalidApplicationId(String),

    #[error("presence service is not available: {0}")]
    Unavailable(String),

    #[error("handshake with the presence service failed: {0}")]
    Handshake(String),

    #[error("handshake with the presence service timed out")]
    HandshakeTimeout,

    #[error("failed to send activity: {0}")]
    Update(String),

    #[error("activity update timed out")]
    UpdateTimeout,
}

/// Resolves once the external side drops the connection.
pub type DisconnectSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A successful handshake: the live session plus its disconnect signal.
pub struct PresenceConnection {
    pub session: Box<dyn PresenceSession>,
    pub disconnected: DisconnectSignal,
}

/// Dials the external presence service (Discord, or a mock in tests).
#[async_trait]
pub trait PresenceClient: Send + Sync {
    async fn connect(&self, application_id: &str) -> Result<PresenceConnection, PresenceError>;
}

/// One live connection to the presence service.
#[async_trait]
pub trait PresenceSession: Send + Sync {
    /// False once the service has dropped us or the user is gone; activity
    /// updates against a not-ready session are skipped, not errors.
    fn is_ready(&self) -> bool;

    async fn set_activity(&self, activity: &Activity) -> Result<(), PresenceError>;

    async fn clear_activity(&self) -> Result<(), PresenceError>;

    async fn close(self: Box<Self>);
}
