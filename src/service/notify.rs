//! Outbound notifications.
//!
//! Delivery is a structured log event addressed to the configured recipients;
//! templating and transport live outside this process.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::NotificationConfig;

#[derive(Debug, Clone)]
pub struct Notification {
    pub subject: String,
    pub lines: Vec<String>,
}

pub struct NotificationService {
    config: NotificationConfig,
    sent: AtomicUsize,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            config: config.clone(),
            sent: AtomicUsize::new(0),
        }
    }

    /// Send to every configured recipient. Returns false when there is nobody to notify.
    pub fn send(&self, notification: &Notification) -> bool {
        if self.config.recipients.is_empty() {
            tracing::debug!(subject = %notification.subject, "No recipients configured, notification dropped");
            return false;
        }
        tracing::info!(
            from = %self.config.sender,
            to = %self.config.recipients.join(","),
            subject = %notification.subject,
            lines = notification.lines.len(),
            body = %notification.lines.join("\n"),
            "Notification sent"
        );
        self.sent.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}
