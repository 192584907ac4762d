use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// A title/body notification. Opening it lands on the app's default screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Writes notifications to the log; the default delivery for the local binary.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, n: Notification) {
        info!(title = %n.title, body = %n.body, "notification");
    }
}

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, n: Notification) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(n);
    }
}
