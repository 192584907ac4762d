use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::dto::PushMessage;
use super::notifier::{Notification, Notifier};
use crate::clock::{now_ms, MILLIS_PER_MINUTE};

pub const ADVICE_TITLE: &str = "Baby Care Advice";
pub const REMINDER_TITLE: &str = "Baby Monitor Reminder";
pub const REMINDER_MESSAGE: &str = "It's time to check on your baby!";
pub const PUSH_TITLE: &str = "Baby Monitor";

pub const ADVICE: [&str; 4] = [
    "Feeding: Remember to feed your baby every 2-3 hours for healthy growth.",
    "Sleeping: Ensure your baby gets enough sleep and monitor nap patterns.",
    "Diapers: Check and change diapers regularly to prevent rashes.",
    "Health: Track temperature and watch for any signs of illness.",
];

/// Rotates through [`ADVICE`] once per wall-clock minute.
pub fn advice_for(now_ms: i64) -> &'static str {
    let idx = (now_ms / MILLIS_PER_MINUTE).rem_euclid(ADVICE.len() as i64);
    ADVICE[idx as usize]
}

pub fn advice_notification(now_ms: i64) -> Notification {
    Notification {
        title: ADVICE_TITLE.to_string(),
        body: advice_for(now_ms).to_string(),
    }
}

pub fn reminder_notification(title: Option<String>, message: Option<String>) -> Notification {
    Notification {
        title: title.unwrap_or_else(|| REMINDER_TITLE.to_string()),
        body: message.unwrap_or_else(|| REMINDER_MESSAGE.to_string()),
    }
}

/// Messages without a notification payload are not shown.
pub fn push_notification(message: PushMessage) -> Option<Notification> {
    let payload = message.notification?;
    Some(Notification {
        title: payload.title.unwrap_or_else(|| PUSH_TITLE.to_string()),
        body: payload.body.unwrap_or_default(),
    })
}

pub fn activity_created(kind: &str) -> Notification {
    let text = format!("Successfully created {} Activity", kind);
    Notification {
        title: text.clone(),
        body: text,
    }
}

/// Fires an advice notification every `period`, first one after one full period.
pub fn spawn_advice_reminders(notifier: Arc<dyn Notifier>, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "advice reminders scheduled");
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let n = advice_notification(now_ms());
            debug!(body = %n.body, "advice reminder fired");
            notifier.notify(n).await;
        }
    })
}
