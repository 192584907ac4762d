use serde::Deserialize;

/// Incoming push message; only the notification payload is used.
#[derive(Debug, Default, Deserialize)]
pub struct PushMessage {
    pub notification: Option<PushNotification>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushNotification {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderRequest {
    pub title: Option<String>,
    pub message: Option<String>,
}
