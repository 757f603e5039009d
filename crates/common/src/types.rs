use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for aggregate ids derived from a product SKU.
const PRODUCT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_8d3b_4b7a_9e21_5c0d_7f3a_1b01);

/// Unique identifier for an aggregate instance.
///
/// Orders and stock queries get random ids. Products are keyed by SKU, so
/// their aggregate ids are derived from the SKU and stay stable across
/// processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Stable aggregate id of the product with the given SKU.
    pub fn for_product(product_id: &ProductId) -> Self {
        Self(Uuid::new_v5(&PRODUCT_NAMESPACE, product_id.as_str().as_bytes()))
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

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

/// Supplier identifier, the code the business uses for a supplier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(String);

impl SupplierId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SupplierId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SupplierId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_new_creates_unique_ids() {
        assert_ne!(AggregateId::new(), AggregateId::new());
    }

    #[test]
    fn product_aggregate_id_is_stable_per_sku() {
        let a = AggregateId::for_product(&ProductId::new("RING-22K"));
        let b = AggregateId::for_product(&ProductId::new("RING-22K"));
        let c = AggregateId::for_product(&ProductId::new("RING-18K"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ProductId::new("SKU-1")).unwrap();
        assert_eq!(json, "\"SKU-1\"");
        let supplier: SupplierId = serde_json::from_str("\"SUP-9\"").unwrap();
        assert_eq!(supplier.as_str(), "SUP-9");
    }
}
