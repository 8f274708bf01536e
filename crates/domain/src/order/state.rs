//! Order state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Assigned ──► Processing ──► Completed
///    │           │   └──────────────────────▲
///    │           │            │
///    └───────────┴────────────┴──► Cancelled
/// ```
///
/// Customers may only cancel while `Pending`; sellers and admins may cancel
/// from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Placed, waiting for the seller to take it.
    #[default]
    Pending,

    /// The seller committed to fulfilling it.
    Assigned,

    /// Fulfillment under way.
    Processing,

    Completed,

    Cancelled,
}

impl OrderStatus {
    pub fn can_accept(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_start_processing(&self) -> bool {
        matches!(self, OrderStatus::Assigned)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Assigned | OrderStatus::Processing)
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the customer alone may still cancel.
    pub fn customer_can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
