use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

/// Oldest notifications are dropped once the editor stops draining.
const MAX_PENDING: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// An action the editor can offer alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Remediation {
    OpenSettings,
}

/// A non-blocking, user-visible message. Never fatal to the process.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
}

impl Notification {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            remediation: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            remediation: None,
        }
    }

    pub fn with_remediation(mut self, remediation: Remediation) -> Self {
        self.remediation = Some(remediation);
        self
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Production notifier: logs every notification and buffers it until the
/// editor plugin drains the queue over the control surface.
#[derive(Default)]
pub struct NotificationHub {
    pending: Mutex<VecDeque<Notification>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over everything buffered so far.
    pub fn drain(&self) -> Vec<Notification> {
        self.pending.lock().unwrap().drain(..).collect()
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Warning => tracing::warn!("{}", notification.message),
            Severity::Error => tracing::error!("{}", notification.message),
        }

        let mut pending = self.pending.lock().unwrap();
        if pending.len() == MAX_PENDING {
            pending.pop_front();
        }
        pending.push_back(notification);
    }
}
