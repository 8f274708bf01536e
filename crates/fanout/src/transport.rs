//! Delivery transports.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::{Notification, NotificationKind, Recipient};

use crate::error::FanoutError;

/// Pushes one notification to one recipient.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(
        &self,
        recipient: Recipient,
        notification: &Notification,
    ) -> Result<(), FanoutError>;
}

/// Writes every delivery to the log as structured JSON. Stands in for the
/// real-time channel when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn deliver(
        &self,
        recipient: Recipient,
        notification: &Notification,
    ) -> Result<(), FanoutError> {
        let payload = serde_json::to_string(&notification.payload)?;
        tracing::info!(
            kind = %notification.kind,
            %recipient,
            occurred_at = %notification.occurred_at,
            payload,
            "notification delivered"
        );
        Ok(())
    }
}

/// A successful delivery recorded by [`InMemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipient: Recipient,
    pub notification: Notification,
}

#[derive(Debug, Default)]
struct TransportState {
    delivered: Vec<Delivery>,
    attempts: u32,
    failures_left: u32,
}

/// Records deliveries in memory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` delivery attempts fail.
    pub fn fail_next(&self, count: u32) {
        self.lock().failures_left = count;
    }

    pub fn delivered(&self) -> Vec<Delivery> {
        self.lock().delivered.clone()
    }

    pub fn delivered_to(&self, recipient: Recipient) -> Vec<NotificationKind> {
        self.lock()
            .delivered
            .iter()
            .filter(|d| d.recipient == recipient)
            .map(|d| d.notification.kind)
            .collect()
    }

    /// Attempts made so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn deliver(
        &self,
        recipient: Recipient,
        notification: &Notification,
    ) -> Result<(), FanoutError> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(FanoutError::Unavailable("injected failure".into()));
        }
        state.delivered.push(Delivery {
            recipient,
            notification: notification.clone(),
        });
        Ok(())
    }
}
