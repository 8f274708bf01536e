use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a UUID-backed identifier newtype.
///
/// Every entity gets its own type so a `NeedId` can never be passed where an
/// `OrderId` is expected. All of them convert into [`AggregateId`], the key
/// the event store uses for streams.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an event stream (one aggregate instance).
    AggregateId
);
uuid_id!(
    /// A platform user (customer, seller or admin account).
    UserId
);
uuid_id!(
    /// A seller storefront, one-to-one with a seller-role user.
    SellerId
);
uuid_id!(
    /// A seller's standing price listing for a product.
    ListingId
);
uuid_id!(
    /// A customer's broadcast request for a product.
    NeedId
);
uuid_id!(
    /// A seller's bid against a need.
    OfferId
);
uuid_id!(
    /// A unit of fulfillment.
    OrderId
);
uuid_id!(
    /// A ledger entry.
    TransactionId
);
uuid_id!(
    /// A seller payout request.
    WithdrawalId
);

macro_rules! stream_key {
    ($($name:ident),*) => {
        $(
            impl From<$name> for AggregateId {
                fn from(id: $name) -> Self {
                    AggregateId(id.0)
                }
            }
        )*
    };
}

// Types that key their own event stream.
stream_key!(UserId, SellerId, NeedId, OrderId, WithdrawalId);

/// Catalog product identifier (SKU). Owned by the catalog, opaque here.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(NeedId::new(), NeedId::new());
        assert_ne!(OrderId::new(), OrderId::new());
    }

    #[test]
    fn stream_key_preserves_uuid() {
        let need = NeedId::new();
        let aggregate: AggregateId = need.into();
        assert_eq!(aggregate.as_uuid(), need.as_uuid());
    }

    #[test]
    fn ids_parse_from_strings() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = SellerId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn product_id_string_conversion() {
        let id = ProductId::new("SKU-001");
        assert_eq!(id.as_str(), "SKU-001");

        let id2: ProductId = "SKU-002".into();
        assert_eq!(id2.as_str(), "SKU-002");
    }
}
