//! Which sellers are reachable right now.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::{ProductId, SellerId};

use super::{PortError, SellerDirectory};

/// Registry of seller presence queried when a Need is broadcast.
///
/// Decouples "who gets notified" from connection state held by the push
/// transport.
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Online, approved sellers who should hear about a Need for `product_id`.
    async fn list_eligible_sellers(&self, product_id: &ProductId)
    -> Result<Vec<SellerId>, PortError>;

    async fn is_online(&self, seller_id: SellerId) -> Result<bool, PortError>;

    async fn set_online(&self, seller_id: SellerId, online: bool) -> Result<(), PortError>;
}

/// In-memory presence registry backed by a seller directory for approval.
///
/// Every update is a single set insert or removal, so a writer that
/// panicked cannot leave the set half-changed; a poisoned lock is read
/// through, as the other in-memory adapters do.
#[derive(Clone)]
pub struct InMemoryPresenceRegistry {
    online: Arc<RwLock<HashSet<SellerId>>>,
    directory: Arc<dyn SellerDirectory>,
}

impl InMemoryPresenceRegistry {
    pub fn new(directory: Arc<dyn SellerDirectory>) -> Self {
        Self {
            online: Arc::new(RwLock::new(HashSet::new())),
            directory,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashSet<SellerId>> {
        self.online.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashSet<SellerId>> {
        self.online.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn online_sellers(&self) -> Vec<SellerId> {
        let mut sellers: Vec<_> = self.read().iter().copied().collect();
        sellers.sort();
        sellers
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresenceRegistry {
    // Broadcast goes to every online approved seller; listing checks happen
    // when they bid.
    async fn list_eligible_sellers(
        &self,
        _product_id: &ProductId,
    ) -> Result<Vec<SellerId>, PortError> {
        let mut eligible = Vec::new();
        for seller_id in self.online_sellers() {
            if let Some(profile) = self.directory.seller(seller_id).await?
                && profile.approved
            {
                eligible.push(seller_id);
            }
        }
        Ok(eligible)
    }

    async fn is_online(&self, seller_id: SellerId) -> Result<bool, PortError> {
        Ok(self.read().contains(&seller_id))
    }

    async fn set_online(&self, seller_id: SellerId, online: bool) -> Result<(), PortError> {
        let mut set = self.write();
        if online {
            set.insert(seller_id);
        } else {
            set.remove(&seller_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{InMemorySellerDirectory, SellerProfile};
    use common::UserId;

    fn seller(directory: &InMemorySellerDirectory, approved: bool) -> SellerId {
        let seller_id = SellerId::new();
        directory.register(SellerProfile {
            seller_id,
            user_id: UserId::new(),
            store_name: "s".to_string(),
            approved,
        });
        seller_id
    }

    #[tokio::test]
    async fn only_online_approved_sellers_are_eligible() {
        let directory = Arc::new(InMemorySellerDirectory::new());
        let registry = InMemoryPresenceRegistry::new(directory.clone());

        let approved_online = seller(&directory, true);
        let unapproved_online = seller(&directory, false);
        let approved_offline = seller(&directory, true);

        registry.set_online(approved_online, true).await.unwrap();
        registry.set_online(unapproved_online, true).await.unwrap();

        let eligible = registry
            .list_eligible_sellers(&ProductId::from("p"))
            .await
            .unwrap();
        assert_eq!(eligible, vec![approved_online]);
        assert!(!registry.is_online(approved_offline).await.unwrap());

        registry.set_online(approved_online, false).await.unwrap();
        assert!(!registry.is_online(approved_online).await.unwrap());
    }

    #[tokio::test]
    async fn a_poisoned_lock_keeps_reads_and_writes_working() {
        let directory = Arc::new(InMemorySellerDirectory::new());
        let registry = InMemoryPresenceRegistry::new(directory.clone());
        let online = seller(&directory, true);
        let later = seller(&directory, true);
        registry.set_online(online, true).await.unwrap();

        let poisoner = registry.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.online.write().unwrap();
            panic!("writer died holding the presence lock");
        })
        .join();
        assert!(registry.online.is_poisoned());

        assert!(registry.is_online(online).await.unwrap());
        registry.set_online(later, true).await.unwrap();
        registry.set_online(online, false).await.unwrap();
        let eligible = registry
            .list_eligible_sellers(&ProductId::from("p"))
            .await
            .unwrap();
        assert_eq!(eligible, vec![later]);
    }
}
