//! Read-only access to the merchant's product catalog
//!
//! The catalog platform is an external collaborator; this subsystem only
//! consumes its product-and-price feed. The feed is materialized at the
//! boundary as a JSON export loaded behind the `CatalogProvider` trait so the
//! engine and the violation detector never talk to the platform directly.

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

use crate::types::{CatalogProduct, CatalogProductId};

/// Read-only product feed from the merchant's catalog platform
pub trait CatalogProvider: Send + Sync {
    /// All products in the feed
    fn products(&self) -> Vec<CatalogProduct>;
    /// Look up one product by its platform id
    fn get(&self, id: &str) -> Option<CatalogProduct>;
}

/// Catalog backed by a JSON feed file (an array of products)
#[derive(Debug)]
pub struct JsonCatalog {
    products: RwLock<HashMap<CatalogProductId, CatalogProduct>>,
}

impl JsonCatalog {
    /// Load the feed from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read catalog feed '{}': {}", path.display(), e)
        })?;
        let products: Vec<CatalogProduct> = serde_json::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse catalog feed '{}': {}", path.display(), e)
        })?;
        Ok(Self::from_products(products))
    }

    /// Catalog from an in-memory product list (tests, empty deployments)
    pub fn from_products(products: Vec<CatalogProduct>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: RwLock::new(map),
        }
    }

    /// Replace the feed contents with a fresh export.
    pub fn replace(&self, products: Vec<CatalogProduct>) {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        *self.products.write() = map;
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

impl CatalogProvider for JsonCatalog {
    fn products(&self) -> Vec<CatalogProduct> {
        self.products.read().values().cloned().collect()
    }

    fn get(&self, id: &str) -> Option<CatalogProduct> {
        self.products.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_parses_feed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {
                    "id": "cp-1",
                    "title": "ECM Synchronika",
                    "vendor": "ECM",
                    "product_type": "Espresso Machines",
                    "sku": "ECM-SYN",
                    "price": "3199.00",
                    "map_price": "2999.00"
                },
                {
                    "id": "cp-2",
                    "title": "Baratza Encore",
                    "vendor": "Baratza",
                    "product_type": "Grinders",
                    "price": 169.0
                }
            ]"#,
        )
        .unwrap();

        let catalog = JsonCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);

        let machine = catalog.get("cp-1").unwrap();
        assert_eq!(machine.map_floor(), "2999.00".parse().unwrap());
        let grinder = catalog.get("cp-2").unwrap();
        assert_eq!(grinder.map_floor(), "169".parse().unwrap());
        assert!(grinder.sku.is_none());
    }

    #[test]
    fn load_reports_bad_json_with_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(&path, "not json").unwrap();
        let err = JsonCatalog::load(&path).unwrap_err();
        assert!(err.to_string().contains("catalog.json"));
    }

    #[test]
    fn replace_swaps_feed_contents() {
        let catalog = JsonCatalog::from_products(vec![]);
        assert!(catalog.is_empty());
        catalog.replace(vec![CatalogProduct {
            id: "cp-1".to_string(),
            title: "ECM Synchronika".to_string(),
            vendor: "ECM".to_string(),
            product_type: "Espresso Machines".to_string(),
            sku: None,
            price: "3199.00".parse().unwrap(),
            map_price: None,
        }]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("cp-1").is_some());
    }
}
