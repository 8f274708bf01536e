//! The publisher handed to the engines and the task that drains it.

use std::sync::Arc;
use std::time::Duration;

use domain::{Notification, Publisher, Recipient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::transport::Transport;

/// How hard to try before dropping a delivery.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each one after.
    pub backoff: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Non-blocking [`Publisher`] backed by an unbounded queue.
#[derive(Debug, Clone)]
pub struct FanOut {
    sender: mpsc::UnboundedSender<Notification>,
}

impl FanOut {
    /// Starts the dispatch task. It runs until every `FanOut` clone has
    /// been dropped and the queue is drained.
    pub fn spawn(transport: Arc<dyn Transport>, policy: DeliveryPolicy) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(receiver, transport, policy));
        (Self { sender }, handle)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl Publisher for FanOut {
    fn publish(&self, notification: Notification) {
        let kind = notification.kind;
        if self.sender.send(notification).is_err() {
            metrics::counter!("fanout_failures_total", "kind" => kind.as_str(), "reason" => "closed")
                .increment(1);
            tracing::warn!(%kind, "fan-out dispatcher stopped, notification dropped");
        }
    }
}

async fn run(
    mut receiver: mpsc::UnboundedReceiver<Notification>,
    transport: Arc<dyn Transport>,
    policy: DeliveryPolicy,
) {
    tracing::info!("fan-out dispatcher started");
    while let Some(notification) = receiver.recv().await {
        for recipient in notification.recipients.iter().copied() {
            deliver_with_retry(transport.as_ref(), recipient, &notification, policy).await;
        }
    }
    tracing::info!("fan-out dispatcher stopped");
}

/// Delivers to one recipient, retrying with exponential backoff. Returns
/// whether the delivery eventually succeeded.
pub async fn deliver_with_retry(
    transport: &dyn Transport,
    recipient: Recipient,
    notification: &Notification,
    policy: DeliveryPolicy,
) -> bool {
    let kind = notification.kind.as_str();
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.backoff;

    for attempt in 1..=attempts {
        match transport.deliver(recipient, notification).await {
            Ok(()) => {
                metrics::counter!("fanout_deliveries_total", "kind" => kind).increment(1);
                return true;
            }
            Err(e) if attempt < attempts => {
                tracing::debug!(kind, %recipient, attempt, error = %e, "delivery failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                metrics::counter!("fanout_failures_total", "kind" => kind, "reason" => "exhausted")
                    .increment(1);
                tracing::error!(kind, %recipient, attempts, error = %e, "delivery abandoned");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use chrono::Utc;
    use domain::NotificationKind;

    fn quick() -> DeliveryPolicy {
        DeliveryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_delivered() {
        let transport = InMemoryTransport::new();
        transport.fail_next(2);
        let notification = Notification::new(NotificationKind::OrderCompleted, Utc::now());

        let ok = deliver_with_retry(&transport, Recipient::Admin, &notification, quick()).await;

        assert!(ok);
        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.delivered().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let transport = InMemoryTransport::new();
        transport.fail_next(5);
        let notification = Notification::new(NotificationKind::OrderCompleted, Utc::now());

        let ok = deliver_with_retry(&transport, Recipient::Admin, &notification, quick()).await;

        assert!(!ok);
        assert_eq!(transport.attempts(), 3);
        assert!(transport.delivered().is_empty());
    }
}
