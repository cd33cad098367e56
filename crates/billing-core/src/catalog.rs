//! Product catalog

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{BillingError, Result};
use crate::ids::ProductId;
use crate::model::{Pricing, Product, ProductType};

/// Read access to the sellable products
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>>;

    async fn products(&self) -> Result<Vec<Product>>;
}

/// In-memory catalog
#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the domain registration product
    pub async fn with_defaults() -> Result<Self> {
        let catalog = Self::new();
        catalog
            .insert(
                Product::new(
                    "Domain Registration",
                    ProductType::Domain,
                    Pricing {
                        monthly: None,
                        yearly: Some(dec!(999)),
                    },
                )
                .with_description("Register a new domain name"),
            )
            .await?;
        Ok(catalog)
    }

    /// Add a product; names are unique
    pub async fn insert(&self, product: Product) -> Result<Product> {
        let mut products = self.products.write().await;

        if products.values().any(|p| p.name == product.name) {
            return Err(BillingError::Conflict(format!(
                "Product {} already exists",
                product.name
            )));
        }

        tracing::debug!(product = %product.name, id = %product.id, "Added catalog product");
        products.insert(product.id, product.clone());
        Ok(product)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn products(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.products.read().await.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }
}
