// src/results.rs
// Per-batch statistics, run-level aggregation and run-row bookkeeping.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::db::{self, PgPool, RunTotals};
use crate::models::MatchMethodType;

/// Counters for one vendor batch.
#[derive(Debug, Default, Clone)]
pub struct BatchStats {
    pub records_processed: usize,
    pub matches_found: usize,
    pub matches_by_method: HashMap<MatchMethodType, usize>,
    pub new_candidates: usize,
    pub errors: usize,
    pub price_entries_written: usize,
    pub confidence_sum: f64,
    pub processing_time: Duration,
}

impl BatchStats {
    pub fn record_match(&mut self, method: MatchMethodType, confidence: f64) {
        self.matches_found += 1;
        *self.matches_by_method.entry(method).or_insert(0) += 1;
        self.confidence_sum += confidence;
    }

    pub fn match_count(&self, method: MatchMethodType) -> usize {
        self.matches_by_method.get(&method).copied().unwrap_or(0)
    }

    pub fn avg_confidence(&self) -> f64 {
        if self.matches_found == 0 {
            0.0
        } else {
            self.confidence_sum / self.matches_found as f64
        }
    }

    pub fn merge(&mut self, other: &BatchStats) {
        self.records_processed += other.records_processed;
        self.matches_found += other.matches_found;
        for (method, count) in &other.matches_by_method {
            *self.matches_by_method.entry(*method).or_insert(0) += count;
        }
        self.new_candidates += other.new_candidates;
        self.errors += other.errors;
        self.price_entries_written += other.price_entries_written;
        self.confidence_sum += other.confidence_sum;
        self.processing_time += other.processing_time;
    }

    pub fn log_batch_summary(&self, vendor: &str) {
        info!(
            "✅ Batch complete for '{}': {}/{} matched ({} lexical, {} semantic, {} composite, {} brand-overlap), {} new candidates, {} errors, avg confidence {:.1}, {:.2?}",
            vendor,
            self.matches_found,
            self.records_processed,
            self.match_count(MatchMethodType::Lexical),
            self.match_count(MatchMethodType::Semantic),
            self.match_count(MatchMethodType::Composite),
            self.match_count(MatchMethodType::BrandOverlap),
            self.new_candidates,
            self.errors,
            self.avg_confidence(),
            self.processing_time
        );
    }
}

/// Accumulates batch outcomes across vendors for the final summary and the
/// run row.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub vendors_processed: usize,
    pub totals: BatchStats,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            vendors_processed: 0,
            totals: BatchStats::default(),
        }
    }

    pub fn absorb(&mut self, batch: &BatchStats) {
        self.vendors_processed += 1;
        self.totals.merge(batch);
    }

    /// Writes the initial run row so batch logs can reference the run id.
    pub async fn record_run(&self, pool: &PgPool, description: Option<&str>) -> Result<()> {
        db::create_reconciliation_run(pool, &self.run_id, self.started_at, description).await
    }

    /// Writes the final totals onto the run row.
    pub async fn finalize_run(&self, pool: &PgPool) -> Result<()> {
        db::finalize_reconciliation_run(pool, &self.run_id, Utc::now(), &self.to_totals()).await
    }

    pub fn log_run_summary(&self) {
        info!("=== Reconciliation Run Summary ===");
        info!("  Run ID: {}", self.run_id);
        info!("  Vendors processed: {}", self.vendors_processed);
        info!("  Records processed: {}", self.totals.records_processed);
        info!(
            "  Matched: {} ({} lexical, {} semantic, {} composite, {} brand-overlap)",
            self.totals.matches_found,
            self.totals.match_count(MatchMethodType::Lexical),
            self.totals.match_count(MatchMethodType::Semantic),
            self.totals.match_count(MatchMethodType::Composite),
            self.totals.match_count(MatchMethodType::BrandOverlap)
        );
        info!("  New product candidates: {}", self.totals.new_candidates);
        info!("  Price entries written: {}", self.totals.price_entries_written);
        info!("  Errors: {}", self.totals.errors);
        info!("  Average confidence: {:.1}", self.totals.avg_confidence());
        info!("  Total processing time: {:.2?}", self.totals.processing_time);
    }

    fn to_totals(&self) -> RunTotals {
        RunTotals {
            total_vendors: self.vendors_processed as i32,
            total_records: self.totals.records_processed as i64,
            total_matched: self.totals.matches_found as i64,
            lexical_matches: self.totals.match_count(MatchMethodType::Lexical) as i64,
            semantic_matches: self.totals.match_count(MatchMethodType::Semantic) as i64,
            composite_matches: self.totals.match_count(MatchMethodType::Composite) as i64,
            brand_overlap_matches: self.totals.match_count(MatchMethodType::BrandOverlap) as i64,
            new_candidates: self.totals.new_candidates as i64,
            error_count: self.totals.errors as i64,
            avg_confidence: self.totals.avg_confidence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_match_tracks_method_counts_and_confidence() {
        let mut stats = BatchStats::default();
        stats.record_match(MatchMethodType::Lexical, 100.0);
        stats.record_match(MatchMethodType::Lexical, 96.0);
        stats.record_match(MatchMethodType::Composite, 88.0);
        assert_eq!(stats.matches_found, 3);
        assert_eq!(stats.match_count(MatchMethodType::Lexical), 2);
        assert_eq!(stats.match_count(MatchMethodType::Composite), 1);
        assert_eq!(stats.match_count(MatchMethodType::Semantic), 0);
        assert!((stats.avg_confidence() - 284.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_average_is_zero() {
        let stats = BatchStats::default();
        assert_eq!(stats.avg_confidence(), 0.0);
    }

    #[test]
    fn merge_accumulates_each_counter() {
        let mut a = BatchStats::default();
        a.records_processed = 10;
        a.record_match(MatchMethodType::Lexical, 100.0);
        a.new_candidates = 2;
        a.errors = 1;
        a.price_entries_written = 8;

        let mut b = BatchStats::default();
        b.records_processed = 5;
        b.record_match(MatchMethodType::Lexical, 95.0);
        b.record_match(MatchMethodType::Semantic, 85.0);
        b.price_entries_written = 3;

        a.merge(&b);
        assert_eq!(a.records_processed, 15);
        assert_eq!(a.matches_found, 3);
        assert_eq!(a.match_count(MatchMethodType::Lexical), 2);
        assert_eq!(a.match_count(MatchMethodType::Semantic), 1);
        assert_eq!(a.new_candidates, 2);
        assert_eq!(a.errors, 1);
        assert_eq!(a.price_entries_written, 11);
        assert!((a.avg_confidence() - 280.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn run_report_totals_map_onto_run_row() {
        let mut report = RunReport::new();
        let mut batch = BatchStats::default();
        batch.records_processed = 4;
        batch.record_match(MatchMethodType::BrandOverlap, 75.0);
        batch.new_candidates = 3;
        report.absorb(&batch);

        let totals = report.to_totals();
        assert_eq!(totals.total_vendors, 1);
        assert_eq!(totals.total_records, 4);
        assert_eq!(totals.total_matched, 1);
        assert_eq!(totals.brand_overlap_matches, 1);
        assert_eq!(totals.new_candidates, 3);
        assert_eq!(totals.avg_confidence, 75.0);
    }
}
