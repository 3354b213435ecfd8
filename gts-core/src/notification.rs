use async_trait::async_trait;
use gts_shared::Masked;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Sms,
    Email,
    Push,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub to: Masked<String>,
    pub subject: Option<String>,
    pub body: String,
    pub channel: Channel,
}

impl Notification {
    pub fn new(channel: Channel, to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: Masked(to.into()),
            subject: None,
            body: body.into(),
            channel,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub success: bool,
    pub message_id: Option<String>,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationReceipt, Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Default)]
pub struct LogNotifier {
    counter: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationReceipt, Box<dyn std::error::Error + Send + Sync>> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let message_id = format!("log-{}-{}", chrono::Utc::now().timestamp_millis(), seq);
        tracing::info!(
            channel = ?notification.channel,
            to = %notification.to.hint(4),
            subject = notification.subject.as_deref().unwrap_or("(none)"),
            message_id = %message_id,
            "notification: {}",
            notification.body
        );
        Ok(NotificationReceipt {
            success: true,
            message_id: Some(message_id),
        })
    }
}

/// Keeps every notification in memory. Handy for asserting on what was sent.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationReceipt, Box<dyn std::error::Error + Send + Sync>> {
        let mut sent = self.sent.lock().map_err(|_| "notification log poisoned")?;
        sent.push(notification.clone());
        Ok(NotificationReceipt {
            success: true,
            message_id: Some(format!("rec-{}", sent.len())),
        })
    }
}

/// Send and swallow failures. A notification never fails the operation that triggered it.
pub async fn send_best_effort(sender: &dyn NotificationSender, notification: Notification) {
    match sender.send(&notification).await {
        Ok(receipt) if receipt.success => {}
        Ok(_) => tracing::warn!(channel = ?notification.channel, "notification was not accepted"),
        Err(e) => tracing::warn!(channel = ?notification.channel, "notification failed: {}", e),
    }
}
