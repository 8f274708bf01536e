//! Read-only product and listing lookups.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{ListingId, Money, ProductId, SellerId};
use serde::{Deserialize, Serialize};

use super::PortError;

/// Catalog facts about a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub exists: bool,
    pub approved: bool,
    pub active: bool,
}

impl ProductInfo {
    pub fn available() -> Self {
        Self {
            exists: true,
            approved: true,
            active: true,
        }
    }

    /// True when customers may request the product.
    pub fn is_available(&self) -> bool {
        self.exists && self.approved && self.active
    }
}

/// A seller's standing price for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub listing_id: ListingId,
    pub product_id: ProductId,
    pub seller_id: SellerId,
    pub price: Money,
    pub stock: u32,
    pub active: bool,
}

#[async_trait]
pub trait CatalogLink: Send + Sync {
    async fn resolve_product(&self, product_id: &ProductId) -> Result<ProductInfo, PortError>;

    /// The seller's listing for a product, if they list it.
    async fn get_listing(
        &self,
        product_id: &ProductId,
        seller_id: SellerId,
    ) -> Result<Option<Listing>, PortError>;

    async fn listing(&self, listing_id: ListingId) -> Result<Option<Listing>, PortError>;
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, ProductInfo>,
    listings: HashMap<ListingId, Listing>,
    unavailable: bool,
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product_id: impl Into<ProductId>, info: ProductInfo) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.products.insert(product_id.into(), info);
    }

    /// Adds a listing, registering its product as available if unknown.
    pub fn add_listing(&self, listing: Listing) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .products
            .entry(listing.product_id.clone())
            .or_insert_with(ProductInfo::available);
        state.listings.insert(listing.listing_id, listing);
    }

    pub fn set_listing_active(&self, listing_id: ListingId, active: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(listing) = state.listings.get_mut(&listing_id) {
            listing.active = active;
        }
    }

    /// Makes every lookup fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unavailable = unavailable;
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, CatalogState>, PortError> {
        let state = self
            .state
            .read()
            .map_err(|_| PortError::unavailable("catalog", "state lock poisoned"))?;
        if state.unavailable {
            return Err(PortError::unavailable("catalog", "catalog offline"));
        }
        Ok(state)
    }
}

#[async_trait]
impl CatalogLink for InMemoryCatalog {
    async fn resolve_product(&self, product_id: &ProductId) -> Result<ProductInfo, PortError> {
        Ok(self
            .read()?
            .products
            .get(product_id)
            .copied()
            .unwrap_or_default())
    }

    async fn get_listing(
        &self,
        product_id: &ProductId,
        seller_id: SellerId,
    ) -> Result<Option<Listing>, PortError> {
        Ok(self
            .read()?
            .listings
            .values()
            .find(|l| &l.product_id == product_id && l.seller_id == seller_id)
            .cloned())
    }

    async fn listing(&self, listing_id: ListingId) -> Result<Option<Listing>, PortError> {
        Ok(self.read()?.listings.get(&listing_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(product: &str, seller_id: SellerId) -> Listing {
        Listing {
            listing_id: ListingId::new(),
            product_id: ProductId::from(product),
            seller_id,
            price: Money::from_units(10),
            stock: 5,
            active: true,
        }
    }

    #[tokio::test]
    async fn unknown_products_do_not_exist() {
        let catalog = InMemoryCatalog::new();
        let info = catalog
            .resolve_product(&ProductId::from("nope"))
            .await
            .unwrap();
        assert!(!info.exists);
        assert!(!info.is_available());
    }

    #[tokio::test]
    async fn listings_resolve_by_product_and_seller() {
        let catalog = InMemoryCatalog::new();
        let seller = SellerId::new();
        let l = listing("sim-10", seller);
        catalog.add_listing(l.clone());

        let product = ProductId::from("sim-10");
        assert!(catalog.resolve_product(&product).await.unwrap().is_available());
        assert_eq!(
            catalog.get_listing(&product, seller).await.unwrap(),
            Some(l.clone())
        );
        assert!(
            catalog
                .get_listing(&product, SellerId::new())
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(catalog.listing(l.listing_id).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn offline_catalog_reports_unavailable() {
        let catalog = InMemoryCatalog::new();
        catalog.set_unavailable(true);
        assert!(
            catalog
                .resolve_product(&ProductId::from("x"))
                .await
                .is_err()
        );
    }
}
