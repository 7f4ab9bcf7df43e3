// src/matching/mod.rs
// The four-tier cascading match engine. Tiers run in strict order and the
// first acceptance wins; every tier is deterministic for a fixed catalog
// snapshot, so a record reconciled twice yields the same answer.

pub mod brand_overlap;
pub mod composite;
pub mod lexical;
pub mod semantic;

use log::debug;
use std::sync::Arc;

use crate::catalog::CatalogCache;
use crate::models::{MatchResult, ReconcileError, ScrapedRecord};
use crate::normalize::normalize_category;
use crate::semantic::SemanticMatcher;

/// Cheap-to-clone handle over a read-only catalog snapshot and an optional
/// semantic oracle, shared across batch workers.
#[derive(Clone)]
pub struct MatchEngine {
    catalog: Arc<CatalogCache>,
    semantic: Option<Arc<dyn SemanticMatcher>>,
}

impl MatchEngine {
    pub fn new(catalog: Arc<CatalogCache>, semantic: Option<Arc<dyn SemanticMatcher>>) -> Self {
        Self { catalog, semantic }
    }

    /// Reconciles one scraped record against the catalog snapshot.
    /// `Ok(None)` is the explicit no-match outcome; the only per-record
    /// error is an unusable name. Oracle failures never escape the cascade.
    pub async fn reconcile(
        &self,
        record: &ScrapedRecord,
    ) -> Result<Option<MatchResult>, ReconcileError> {
        if !record.has_usable_name() {
            return Err(ReconcileError::UnusableName);
        }
        let category = match normalize_category(&record.category_guess) {
            Some(category) => category,
            None => {
                debug!(
                    "Unrecognized category {:?} for {:?}, no candidate set",
                    record.category_guess, record.raw_name
                );
                return Ok(None);
            }
        };
        let candidates = self.catalog.candidates(category);
        if candidates.is_empty() {
            return Ok(None);
        }

        if let Some(result) = lexical::find_match(record, candidates) {
            return Ok(Some(result));
        }
        if let Some(matcher) = self.semantic.as_deref() {
            if let Some(result) = semantic::find_match(record, candidates, matcher).await {
                return Ok(Some(result));
            }
        }
        if let Some(result) = composite::find_match(record, candidates) {
            return Ok(Some(result));
        }
        Ok(brand_overlap::find_match(record, candidates))
    }
}
