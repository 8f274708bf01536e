//! Seller identity facts.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{SellerId, UserId};
use serde::{Deserialize, Serialize};

use super::PortError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerProfile {
    pub seller_id: SellerId,
    /// The seller-role user behind the storefront.
    pub user_id: UserId,
    pub store_name: String,
    pub approved: bool,
}

#[async_trait]
pub trait SellerDirectory: Send + Sync {
    async fn seller(&self, seller_id: SellerId) -> Result<Option<SellerProfile>, PortError>;

    async fn seller_for_user(&self, user_id: UserId) -> Result<Option<SellerProfile>, PortError>;
}

/// In-memory seller directory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySellerDirectory {
    sellers: Arc<RwLock<HashMap<SellerId, SellerProfile>>>,
}

impl InMemorySellerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, profile: SellerProfile) {
        self.sellers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.seller_id, profile);
    }

    pub fn set_approved(&self, seller_id: SellerId, approved: bool) {
        if let Some(profile) = self
            .sellers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&seller_id)
        {
            profile.approved = approved;
        }
    }

    fn lookup(
        &self,
        matches: impl Fn(&SellerProfile) -> bool,
    ) -> Result<Option<SellerProfile>, PortError> {
        let sellers = self
            .sellers
            .read()
            .map_err(|_| PortError::unavailable("seller directory", "state lock poisoned"))?;
        Ok(sellers.values().find(|p| matches(p)).cloned())
    }
}

#[async_trait]
impl SellerDirectory for InMemorySellerDirectory {
    async fn seller(&self, seller_id: SellerId) -> Result<Option<SellerProfile>, PortError> {
        self.lookup(|p| p.seller_id == seller_id)
    }

    async fn seller_for_user(&self, user_id: UserId) -> Result<Option<SellerProfile>, PortError> {
        self.lookup(|p| p.user_id == user_id)
    }
}
