//! Withdrawal status and payout rails.

use serde::{Deserialize, Serialize};

/// ```text
/// Pending ──► Approved ──► Completed
///    └──► Rejected
/// ```
///
/// Approval and settlement commit together, so `Approved` is only ever
/// observed in the event history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    #[default]
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn can_resolve(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    BankTransfer,
    MobileWallet,
}

/// An admin's answer to a pending withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum WithdrawalDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl WithdrawalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalDecision::Approve => "approve",
            WithdrawalDecision::Reject { .. } => "reject",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_withdrawals_resolve() {
        assert!(WithdrawalStatus::Pending.can_resolve());
        assert!(!WithdrawalStatus::Approved.can_resolve());
        assert!(!WithdrawalStatus::Completed.can_resolve());
        assert!(!WithdrawalStatus::Rejected.can_resolve());
    }

    #[test]
    fn decisions_are_tagged_by_action() {
        let json = serde_json::to_string(&WithdrawalDecision::Reject {
            reason: Some("kyc".into()),
        })
        .unwrap();
        assert_eq!(json, r#"{"action":"reject","reason":"kyc"}"#);

        let approve: WithdrawalDecision = serde_json::from_str(r#"{"action":"approve"}"#).unwrap();
        assert_eq!(approve, WithdrawalDecision::Approve);
        assert!(serde_json::from_str::<WithdrawalDecision>(r#"{"action":"delete"}"#).is_err());
    }
}
