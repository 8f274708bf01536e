//! Tunable marketplace rules.

use chrono::Duration;
use common::{CommissionRate, Money, UserId};

use crate::retry::DEFAULT_ATTEMPTS;

/// Largest quantity a need or order may ask for.
pub const MAX_QUANTITY: u32 = 10_000;

/// Values the engines read instead of consulting the environment.
#[derive(Debug, Clone)]
pub struct MarketPolicy {
    pub commission_rate: CommissionRate,
    /// Lifetime of a Need from creation.
    pub need_ttl: Duration,
    /// Lifetime of an Offer from its latest (re)submission.
    pub offer_ttl: Duration,
    pub min_withdrawal: Money,
    pub conflict_retry_attempts: u32,
    /// Wallet credited with the commission of every completed order.
    pub platform_user_id: UserId,
}

impl Default for MarketPolicy {
    fn default() -> Self {
        Self {
            commission_rate: CommissionRate::DEFAULT,
            need_ttl: Duration::minutes(30),
            offer_ttl: Duration::minutes(30),
            min_withdrawal: Money::from_units(100),
            conflict_retry_attempts: DEFAULT_ATTEMPTS,
            platform_user_id: UserId::from_uuid(uuid::Uuid::nil()),
        }
    }
}
