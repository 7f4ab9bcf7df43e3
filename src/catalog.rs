// src/catalog.rs
// In-memory snapshot of the canonical product catalog, partitioned by
// category. Batches take an Arc of a loaded cache; a reload builds a fresh
// snapshot and can therefore never race a batch already running on the old
// one.

use log::{debug, info};
use std::collections::HashMap;

use crate::db::{self, PgPool};
use crate::models::{CanonicalProduct, Category, ReconcileError};

#[derive(Debug)]
pub struct CatalogCache {
    by_category: HashMap<Category, Vec<CanonicalProduct>>,
    total: usize,
}

impl CatalogCache {
    /// Builds a cache from already-loaded products, preserving input order
    /// per category. Input order is the tie-break order for equal match
    /// scores downstream.
    pub fn from_products(products: Vec<CanonicalProduct>) -> Self {
        let mut by_category: HashMap<Category, Vec<CanonicalProduct>> = HashMap::new();
        let total = products.len();
        for product in products {
            by_category.entry(product.category).or_default().push(product);
        }
        Self { by_category, total }
    }

    /// Loads the full catalog from the database. A failure here is fatal for
    /// the batch that needed the catalog.
    pub async fn load(pool: &PgPool) -> Result<Self, ReconcileError> {
        let products = db::fetch_master_products(pool)
            .await
            .map_err(|e| ReconcileError::CatalogUnavailable(e.to_string()))?;
        let cache = Self::from_products(products);
        info!(
            "📚 Catalog loaded: {} canonical products across {} categories",
            cache.total,
            cache.by_category.len()
        );
        for category in Category::ALL {
            debug!("  {}: {} products", category, cache.candidates(category).len());
        }
        Ok(cache)
    }

    /// Rebuilds the snapshot in place. Requires exclusive access, so it can
    /// only happen between batches.
    pub async fn reload(&mut self, pool: &PgPool) -> Result<(), ReconcileError> {
        let fresh = Self::load(pool).await?;
        info!(
            "🔄 Catalog reloaded: {} products (was {})",
            fresh.total, self.total
        );
        *self = fresh;
        Ok(())
    }

    /// Candidate set for one category, in load order. Empty for categories
    /// with no products.
    pub fn candidates(&self, category: Category) -> &[CanonicalProduct] {
        self.by_category
            .get(&category)
            .map(|products| products.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
