//! Integration tests for the fan-out dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{SellerId, UserId};
use domain::{Notification, NotificationKind, Publisher, Recipient};
use fanout::{DeliveryPolicy, FanOut, InMemoryTransport};

fn quick() -> DeliveryPolicy {
    DeliveryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn every_recipient_gets_its_own_delivery() {
    let transport = InMemoryTransport::new();
    let (fanout, worker) = FanOut::spawn(Arc::new(transport.clone()), quick());

    let customer = Recipient::User(UserId::new());
    let seller = Recipient::Seller(SellerId::new());
    fanout.publish(
        Notification::new(NotificationKind::OrderCreated, Utc::now()).to_all([customer, seller]),
    );
    fanout.publish(Notification::new(NotificationKind::WithdrawalRequested, Utc::now()).to(Recipient::Admin));

    drop(fanout);
    worker.await.unwrap();

    assert_eq!(transport.delivered().len(), 3);
    assert_eq!(
        transport.delivered_to(customer),
        vec![NotificationKind::OrderCreated]
    );
    assert_eq!(
        transport.delivered_to(Recipient::Admin),
        vec![NotificationKind::WithdrawalRequested]
    );
}

#[tokio::test]
async fn an_abandoned_delivery_does_not_stop_the_queue() {
    let transport = InMemoryTransport::new();
    transport.fail_next(3);
    let (fanout, worker) = FanOut::spawn(Arc::new(transport.clone()), quick());

    let first = Recipient::User(UserId::new());
    let second = Recipient::User(UserId::new());
    fanout.publish(Notification::new(NotificationKind::WalletDebited, Utc::now()).to(first));
    fanout.publish(Notification::new(NotificationKind::WalletCredited, Utc::now()).to(second));

    drop(fanout);
    worker.await.unwrap();

    assert!(transport.delivered_to(first).is_empty());
    assert_eq!(
        transport.delivered_to(second),
        vec![NotificationKind::WalletCredited]
    );
    assert_eq!(transport.attempts(), 4);
}

#[tokio::test]
async fn publishing_after_shutdown_is_silent() {
    let transport = InMemoryTransport::new();
    let (fanout, worker) = FanOut::spawn(Arc::new(transport.clone()), quick());
    worker.abort();
    let _ = worker.await;

    assert!(fanout.is_closed());
    fanout.publish(Notification::new(NotificationKind::NeedExpired, Utc::now()).to(Recipient::Admin));
    assert!(transport.delivered().is_empty());
}
