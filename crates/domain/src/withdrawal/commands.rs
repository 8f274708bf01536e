use common::Money;
use serde::{Deserialize, Serialize};

use super::PayoutMethod;

/// Command to request a payout of available earnings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestWithdrawal {
    pub amount: Money,
    pub method: PayoutMethod,
    /// Bank account or mobile wallet number receiving the payout.
    pub account: String,
}

impl RequestWithdrawal {
    pub fn new(amount: Money, method: PayoutMethod, account: impl Into<String>) -> Self {
        Self {
            amount,
            method,
            account: account.into(),
        }
    }
}
