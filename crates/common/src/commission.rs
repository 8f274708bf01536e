//! Platform commission split.

use serde::{Deserialize, Serialize};

use crate::Money;

/// Commission rate in basis points (1 bp = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// The default platform rate, 5%.
    pub const DEFAULT: CommissionRate = CommissionRate(500);

    const BPS_SCALE: i64 = 10_000;

    /// Rates above 100% are capped at 100%.
    pub fn from_bps(bps: u32) -> Self {
        Self(bps.min(Self::BPS_SCALE as u32))
    }

    pub fn bps(&self) -> u32 {
        self.0
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Result of splitting an order total between platform and seller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub commission: Money,
    pub seller_amount: Money,
}

/// Splits `amount` into the platform commission and the seller's share.
///
/// The commission is rounded half-up to the cent; the seller amount is the
/// exact remainder, so the two parts always sum back to `amount`. The
/// product is taken in 128 bits and the rate is at most 100%, so the
/// commission never exceeds `amount` and nothing can overflow.
pub fn split(amount: Money, rate: CommissionRate) -> CommissionSplit {
    let scale = i128::from(CommissionRate::BPS_SCALE);
    let scaled = i128::from(amount.cents()) * i128::from(rate.bps());
    let commission = (scaled + scale / 2) / scale;
    let commission = Money::from_cents(i64::try_from(commission).unwrap_or(amount.cents()));

    CommissionSplit {
        commission,
        seller_amount: amount - commission,
    }
}
