//! Seed data for the in-memory collaborators.
//!
//! When no external catalog or identity service is wired in, `MARKET_SEED`
//! names a JSON file with the products, sellers and listings to start with:
//!
//! ```json
//! {
//!   "products": [{ "product_id": "airtime-100" }],
//!   "sellers": [{
//!     "user_id": "5d0c3c1e-7d55-4a55-9a54-2f3c1c2b1a10",
//!     "store_name": "Corner Shop",
//!     "online": true,
//!     "listings": [{ "product_id": "airtime-100", "price_cents": 9500, "stock": 50 }]
//!   }]
//! }
//! ```

use std::path::Path;

use common::{ListingId, Money, ProductId, SellerId, UserId};
use domain::ports::{InMemoryCatalog, InMemorySellerDirectory, Listing, ProductInfo};
use domain::SellerProfile;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read seed file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("seller {0} listed twice")]
    DuplicateSeller(SellerId),
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub product_id: ProductId,
    #[serde(default = "yes")]
    pub approved: bool,
    #[serde(default = "yes")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedListing {
    #[serde(default)]
    pub listing_id: Option<ListingId>,
    pub product_id: ProductId,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "yes")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSeller {
    #[serde(default)]
    pub seller_id: Option<SellerId>,
    pub user_id: UserId,
    pub store_name: String,
    #[serde(default = "yes")]
    pub approved: bool,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub listings: Vec<SeedListing>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketSeed {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub sellers: Vec<SeedSeller>,
}

/// What a seed put in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub sellers: usize,
    pub listings: usize,
    pub online: Vec<SellerId>,
}

impl MarketSeed {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Registers products, sellers and listings. Sellers without an id get a
    /// fresh one. Sellers marked online are returned for the caller to put
    /// into the presence registry.
    pub fn apply(
        &self,
        catalog: &InMemoryCatalog,
        sellers: &InMemorySellerDirectory,
    ) -> Result<SeedSummary, SeedError> {
        let mut summary = SeedSummary::default();

        for product in &self.products {
            catalog.add_product(
                product.product_id.clone(),
                ProductInfo {
                    exists: true,
                    approved: product.approved,
                    active: product.active,
                },
            );
            summary.products += 1;
        }

        let mut seen = std::collections::HashSet::new();
        for seller in &self.sellers {
            let seller_id = seller.seller_id.unwrap_or_default();
            if !seen.insert(seller_id) {
                return Err(SeedError::DuplicateSeller(seller_id));
            }

            sellers.register(SellerProfile {
                seller_id,
                user_id: seller.user_id,
                store_name: seller.store_name.clone(),
                approved: seller.approved,
            });
            summary.sellers += 1;

            for listing in &seller.listings {
                catalog.add_listing(Listing {
                    listing_id: listing.listing_id.unwrap_or_default(),
                    product_id: listing.product_id.clone(),
                    seller_id,
                    price: Money::from_cents(listing.price_cents),
                    stock: listing.stock,
                    active: listing.active,
                });
                summary.listings += 1;
            }

            if seller.online {
                summary.online.push(seller_id);
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use domain::ports::{CatalogLink, SellerDirectory};

    use super::*;

    const SEED: &str = r#"{
        "products": [{ "product_id": "airtime-100" }, { "product_id": "data-1gb", "active": false }],
        "sellers": [{
            "user_id": "5d0c3c1e-7d55-4a55-9a54-2f3c1c2b1a10",
            "store_name": "Corner Shop",
            "online": true,
            "listings": [{ "product_id": "airtime-100", "price_cents": 9500, "stock": 50 }]
        }]
    }"#;

    #[tokio::test]
    async fn seeds_catalog_and_directory() {
        let catalog = InMemoryCatalog::new();
        let directory = InMemorySellerDirectory::new();

        let summary = MarketSeed::parse(SEED)
            .unwrap()
            .apply(&catalog, &directory)
            .unwrap();
        assert_eq!(summary.products, 2);
        assert_eq!(summary.listings, 1);
        assert_eq!(summary.online.len(), 1);

        let seller_id = summary.online[0];
        let profile = directory.seller(seller_id).await.unwrap().unwrap();
        assert_eq!(profile.store_name, "Corner Shop");
        assert!(profile.approved);

        let listing = catalog
            .get_listing(&ProductId::from("airtime-100"), seller_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(listing.price, Money::from_cents(9500));

        let inactive = catalog
            .resolve_product(&ProductId::from("data-1gb"))
            .await
            .unwrap();
        assert!(!inactive.is_available());
    }

    #[test]
    fn rejects_duplicate_sellers() {
        let seller_id = SellerId::new();
        let raw = format!(
            r#"{{ "sellers": [
                {{ "seller_id": "{seller_id}", "user_id": "{}", "store_name": "a" }},
                {{ "seller_id": "{seller_id}", "user_id": "{}", "store_name": "b" }}
            ] }}"#,
            UserId::new(),
            UserId::new()
        );
        let err = MarketSeed::parse(&raw)
            .unwrap()
            .apply(&InMemoryCatalog::new(), &InMemorySellerDirectory::new())
            .unwrap_err();
        assert!(matches!(err, SeedError::DuplicateSeller(id) if id == seller_id));
    }

    #[test]
    fn malformed_seed_is_a_parse_error() {
        assert!(matches!(
            MarketSeed::parse("{ \"sellers\": 3 }"),
            Err(SeedError::Parse(_))
        ));
    }
}
