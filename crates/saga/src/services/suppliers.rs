//! Supplier selection trait and in-memory directory.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::SupplierId;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A supplier the business can ask for stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: SupplierId,
    pub name: String,
    /// Product categories this supplier carries.
    pub categories: BTreeSet<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl Supplier {
    pub fn new(
        supplier_id: impl Into<SupplierId>,
        name: impl Into<String>,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            supplier_id: supplier_id.into(),
            name: name.into(),
            categories: categories.into_iter().map(Into::into).collect(),
            active: true,
        }
    }

    pub fn carries(&self, category: &str) -> bool {
        self.active && self.categories.contains(category)
    }
}

/// Finds the suppliers eligible for a product category.
#[async_trait]
pub trait SupplierSelector: Send + Sync {
    /// Active suppliers carrying `category`, in a stable order.
    async fn find(&self, category: &str) -> Result<Vec<SupplierId>, SagaError>;
}

/// In-memory supplier directory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySupplierDirectory {
    suppliers: Arc<RwLock<BTreeMap<SupplierId, Supplier>>>,
}

impl InMemorySupplierDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a supplier.
    pub fn register(&self, supplier: Supplier) {
        tracing::info!(supplier_id = %supplier.supplier_id, "supplier registered");
        self.suppliers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(supplier.supplier_id.clone(), supplier);
    }

    /// Stops routing new queries to a supplier. Returns false if unknown.
    pub fn deactivate(&self, supplier_id: &SupplierId) -> bool {
        let mut suppliers = self
            .suppliers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match suppliers.get_mut(supplier_id) {
            Some(supplier) => {
                supplier.active = false;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, supplier_id: &SupplierId) -> Option<Supplier> {
        self.suppliers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(supplier_id)
            .cloned()
    }

    pub fn suppliers(&self) -> Vec<Supplier> {
        self.suppliers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SupplierSelector for InMemorySupplierDirectory {
    async fn find(&self, category: &str) -> Result<Vec<SupplierId>, SagaError> {
        Ok(self
            .suppliers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|supplier| supplier.carries(category))
            .map(|supplier| supplier.supplier_id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_filters_by_category_and_activity() {
        let directory = InMemorySupplierDirectory::new();
        directory.register(Supplier::new("SUP-A", "Acme Metals", ["jewellery", "metal"]));
        directory.register(Supplier::new("SUP-B", "Bright Gems", ["jewellery"]));
        directory.register(Supplier::new("SUP-C", "Cloth Co", ["textile"]));

        let found = directory.find("jewellery").await.unwrap();
        assert_eq!(found, vec![SupplierId::new("SUP-A"), SupplierId::new("SUP-B")]);

        assert!(directory.deactivate(&SupplierId::new("SUP-A")));
        let found = directory.find("jewellery").await.unwrap();
        assert_eq!(found, vec![SupplierId::new("SUP-B")]);

        assert!(directory.find("toys").await.unwrap().is_empty());
        assert!(!directory.deactivate(&SupplierId::new("SUP-Z")));
    }

    #[test]
    fn test_supplier_json_defaults_to_active() {
        let supplier: Supplier = serde_json::from_str(
            r#"{"supplier_id":"SUP-A","name":"Acme","categories":["metal"]}"#,
        )
        .unwrap();
        assert!(supplier.active);
        assert!(supplier.carries("metal"));
    }
}
