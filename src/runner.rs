// src/runner.rs
// Per-vendor batch orchestration: a bounded worker pool reconciles records
// against the catalog snapshot while a single writer task batches the
// outcomes into the database.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::db::{self, NewProductRow, PgPool, PriceEntryRow};
use crate::matching::MatchEngine;
use crate::models::{MatchResult, ReconcileError, ScrapedRecord};
use crate::results::BatchStats;

const OUTCOME_CHANNEL_CAPACITY: usize = 256;

enum RecordOutcome {
    Matched { result: MatchResult, record: ScrapedRecord },
    Unmatched { record: ScrapedRecord },
    Skipped { error: ReconcileError },
}

pub struct ReconciliationRunner {
    engine: MatchEngine,
    max_workers: usize,
    persist_batch_size: usize,
    cancel: Arc<AtomicBool>,
}

impl ReconciliationRunner {
    pub fn new(engine: MatchEngine, config: &PipelineConfig, cancel: Arc<AtomicBool>) -> Self {
        Self {
            engine,
            max_workers: config.max_workers,
            persist_batch_size: config.persist_batch_size,
            cancel,
        }
    }

    /// Reconciles every scraped record of one vendor. Only a missing record
    /// source is fatal; per-record and persistence failures are counted and
    /// the batch keeps going.
    pub async fn run_batch(&self, pool: &PgPool, vendor: &str) -> Result<BatchStats> {
        let records = db::fetch_scraped_records(pool, vendor).await?;
        if records.is_empty() {
            info!("🏭 Vendor '{}' has no scraped records, skipping", vendor);
            return Ok(BatchStats::default());
        }
        let vendor_id = db::get_or_create_vendor(pool, vendor).await?;

        info!(
            "🏭 Reconciling vendor '{}': {} records, {} workers",
            vendor,
            records.len(),
            self.max_workers
        );
        self.process_records(pool, vendor, vendor_id, records).await
    }

    async fn process_records(
        &self,
        pool: &PgPool,
        vendor: &str,
        vendor_id: i64,
        records: Vec<ScrapedRecord>,
    ) -> Result<BatchStats> {
        let start_time = Instant::now();
        let total = records.len();

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .context("Failed to set progress bar style")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Reconciling '{}'...", vendor));
        let pb = Arc::new(pb);

        let (tx, rx) = mpsc::channel::<RecordOutcome>(OUTCOME_CHANNEL_CAPACITY);
        let writer = spawn_writer(pool.clone(), vendor_id, self.persist_batch_size, rx);

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut workers: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(total);
        let mut dispatched = 0usize;

        for record in records {
            // Checked between records so a Ctrl-C stops dispatch without
            // tearing down workers already in flight.
            if self.cancel.load(Ordering::Relaxed) {
                warn!(
                    "🛑 Cancellation requested; stopping dispatch for '{}' after {}/{} records",
                    vendor, dispatched, total
                );
                break;
            }

            let engine = self.engine.clone();
            let tx_clone = tx.clone();
            let semaphore_clone = semaphore.clone();
            let pb_clone = pb.clone();
            workers.push(tokio::spawn(async move {
                let _permit = semaphore_clone
                    .acquire_owned()
                    .await
                    .context("Failed to acquire semaphore permit for record reconciliation")?;

                let outcome = match engine.reconcile(&record).await {
                    Ok(Some(result)) => RecordOutcome::Matched { result, record },
                    Ok(None) => RecordOutcome::Unmatched { record },
                    Err(error) => RecordOutcome::Skipped { error },
                };
                if tx_clone.send(outcome).await.is_err() {
                    warn!("Persistence writer closed before outcome could be queued");
                }
                pb_clone.inc(1);
                Ok(())
            }));
            dispatched += 1;
        }
        drop(tx);

        for join_result in join_all(workers).await {
            match join_result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("A reconciliation worker returned an error: {:?}", e),
                Err(e) => warn!("A reconciliation worker failed to join (e.g., panicked): {:?}", e),
            }
        }

        let mut stats = writer.await.context("Persistence writer task panicked")?;
        stats.processing_time = start_time.elapsed();
        pb.finish_with_message(format!("'{}' done", vendor));
        stats.log_batch_summary(vendor);
        Ok(stats)
    }
}

/// Consumes worker outcomes, tallies stats and flushes rows to the database
/// every `persist_batch_size` outcomes. A failed flush is logged and counted;
/// it never stops the writer.
fn spawn_writer(
    pool: PgPool,
    vendor_id: i64,
    persist_batch_size: usize,
    mut rx: mpsc::Receiver<RecordOutcome>,
) -> JoinHandle<BatchStats> {
    tokio::spawn(async move {
        let mut stats = BatchStats::default();
        let mut price_rows: Vec<PriceEntryRow> = Vec::new();
        let mut candidate_rows: Vec<NewProductRow> = Vec::new();

        while let Some(outcome) = rx.recv().await {
            stats.records_processed += 1;
            match outcome {
                RecordOutcome::Matched { result, record } => {
                    debug!(
                        "🎯 '{}' → '{}' via {} ({:.1})",
                        record.raw_name, result.matched_name, result.method, result.confidence
                    );
                    stats.record_match(result.method, result.confidence);
                    // A match without a scraped price has nothing to write
                    // into the price history.
                    if let Some(price) = record.price {
                        price_rows.push(PriceEntryRow {
                            master_product_id: result.canonical_id,
                            vendor_id,
                            scraped_price: price,
                            availability_status: record.availability,
                            product_url: record.url,
                            scraped_timestamp: record.scraped_at.unwrap_or_else(Utc::now),
                        });
                    }
                }
                RecordOutcome::Unmatched { record } => {
                    debug!("❓ No catalog match for '{}'", record.raw_name);
                    stats.new_candidates += 1;
                    candidate_rows.push(NewProductRow {
                        vendor_name: record.vendor,
                        category: record.category_guess,
                        raw_name: record.raw_name,
                        brand: record.brand_guess,
                        price_bdt: record.price,
                        product_url: record.url,
                    });
                }
                RecordOutcome::Skipped { error } => {
                    warn!("⚠️ Record skipped: {}", error);
                    stats.errors += 1;
                }
            }

            // The cadence counts processed records, so rowless outcomes
            // (skips, priceless matches) advance it too.
            if stats.records_processed % persist_batch_size == 0 {
                flush_outcomes(&pool, &mut price_rows, &mut candidate_rows, &mut stats).await;
            }
        }
        flush_outcomes(&pool, &mut price_rows, &mut candidate_rows, &mut stats).await;
        stats
    })
}

async fn flush_outcomes(
    pool: &PgPool,
    price_rows: &mut Vec<PriceEntryRow>,
    candidate_rows: &mut Vec<NewProductRow>,
    stats: &mut BatchStats,
) {
    if !price_rows.is_empty() {
        match db::insert_price_entries(pool, price_rows).await {
            Ok(written) => stats.price_entries_written += written as usize,
            Err(e) => {
                stats.errors += 1;
                error!("❌ Failed to flush {} price entries: {:#}", price_rows.len(), e);
            }
        }
        price_rows.clear();
    }
    if !candidate_rows.is_empty() {
        match db::insert_new_product_candidates(pool, candidate_rows).await {
            Ok(_) => {}
            Err(e) => {
                stats.errors += 1;
                error!(
                    "❌ Failed to flush {} new product candidates: {:#}",
                    candidate_rows.len(),
                    e
                );
            }
        }
        candidate_rows.clear();
    }
}
