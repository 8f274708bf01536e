//! Need and offer statuses.

use serde::{Deserialize, Serialize};

/// ```text
/// Active ──┬──► Accepted
///          ├──► Expired
///          └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeedStatus {
    #[default]
    Active,
    Accepted,
    Expired,
    Cancelled,
}

impl NeedStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NeedStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NeedStatus::Active => "active",
            NeedStatus::Accepted => "accepted",
            NeedStatus::Expired => "expired",
            NeedStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for NeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A re-bid while `Pending` refreshes the offer in place; every other
/// status is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl OfferStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_needs_are_open() {
        assert!(!NeedStatus::Active.is_terminal());
        assert!(NeedStatus::Accepted.is_terminal());
        assert!(NeedStatus::Expired.is_terminal());
        assert!(NeedStatus::Cancelled.is_terminal());
    }

    #[test]
    fn only_pending_offers_are_open() {
        assert!(!OfferStatus::Pending.is_terminal());
        assert!(OfferStatus::Accepted.is_terminal());
        assert!(OfferStatus::Rejected.is_terminal());
        assert!(OfferStatus::Expired.is_terminal());
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&NeedStatus::Cancelled).unwrap(), "\"cancelled\"");
        assert_eq!(OfferStatus::Rejected.to_string(), "rejected");
    }
}
