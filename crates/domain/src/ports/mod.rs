//! Contracts the engines require of external collaborators.
//!
//! Each port is an object-safe trait held behind `Arc<dyn ...>` so the
//! service can be wired to real collaborators while tests use the in-memory
//! versions defined next to each trait.

mod catalog;
mod clock;
mod directory;
mod notify;
mod presence;

use std::sync::Arc;

use thiserror::Error;

pub use catalog::{CatalogLink, InMemoryCatalog, Listing, ProductInfo};
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{InMemorySellerDirectory, SellerDirectory, SellerProfile};
pub use notify::{
    Notification, NotificationKind, NullPublisher, Publisher, Recipient, RecordingPublisher,
};
pub use presence::{InMemoryPresenceRegistry, PresenceRegistry};

/// A collaborator could not answer.
#[derive(Debug, Error)]
#[error("{port} unavailable: {message}")]
pub struct PortError {
    pub port: &'static str,
    pub message: String,
}

impl PortError {
    pub fn unavailable(port: &'static str, message: impl Into<String>) -> Self {
        Self {
            port,
            message: message.into(),
        }
    }
}

/// Every collaborator the engines talk to.
#[derive(Clone)]
pub struct MarketPorts {
    pub catalog: Arc<dyn CatalogLink>,
    pub sellers: Arc<dyn SellerDirectory>,
    pub presence: Arc<dyn PresenceRegistry>,
    pub publisher: Arc<dyn Publisher>,
    pub clock: Arc<dyn Clock>,
}

impl MarketPorts {
    /// Publishes each notification. Never fails and never blocks on delivery.
    pub fn publish_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.publisher.publish(notification);
        }
    }
}

/// In-memory ports sharing one manual clock, for tests and local runs.
#[derive(Clone)]
pub struct InMemoryPorts {
    pub catalog: Arc<InMemoryCatalog>,
    pub sellers: Arc<InMemorySellerDirectory>,
    pub presence: Arc<InMemoryPresenceRegistry>,
    pub publisher: Arc<RecordingPublisher>,
    pub clock: Arc<ManualClock>,
}

impl InMemoryPorts {
    pub fn new() -> Self {
        let sellers = Arc::new(InMemorySellerDirectory::new());
        Self {
            catalog: Arc::new(InMemoryCatalog::new()),
            presence: Arc::new(InMemoryPresenceRegistry::new(sellers.clone())),
            sellers,
            publisher: Arc::new(RecordingPublisher::new()),
            clock: Arc::new(ManualClock::starting_now()),
        }
    }

    pub fn ports(&self) -> MarketPorts {
        MarketPorts {
            catalog: self.catalog.clone(),
            sellers: self.sellers.clone(),
            presence: self.presence.clone(),
            publisher: self.publisher.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl Default for InMemoryPorts {
    fn default() -> Self {
        Self::new()
    }
}
