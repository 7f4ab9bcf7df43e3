// src/main.rs
// Pipeline entry point: load the canonical catalog, reconcile every vendor's
// scraped listings against it, persist the outcomes and report the run.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reconcile_lib::catalog::CatalogCache;
use reconcile_lib::config::PipelineConfig;
use reconcile_lib::db;
use reconcile_lib::matching::MatchEngine;
use reconcile_lib::results::RunReport;
use reconcile_lib::runner::ReconciliationRunner;
use reconcile_lib::semantic::{SemanticConfig, SemanticMatcher};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    dotenv::dotenv().ok();
    info!("🚀 Starting product reconciliation pipeline");

    let pipeline_config = PipelineConfig::from_env();
    pipeline_config.log_config();
    let semantic_config = SemanticConfig::from_env();
    semantic_config.log_config();

    let pool = db::connect().await.context("Failed to connect to database")?;

    let catalog = CatalogCache::load(&pool)
        .await
        .context("Failed to load canonical product catalog")?;
    if catalog.is_empty() {
        warn!("Catalog is empty; every record will become a new-product candidate");
    }

    let semantic_matcher: Option<Arc<dyn SemanticMatcher>> = semantic_config
        .build_matcher()
        .map(|matcher| Arc::new(matcher) as Arc<dyn SemanticMatcher>);

    let vendors = if pipeline_config.vendor_filter.is_empty() {
        db::fetch_vendor_names(&pool)
            .await
            .context("Failed to list vendors with scraped records")?
    } else {
        pipeline_config.vendor_filter.clone()
    };
    if vendors.is_empty() {
        info!("No vendors with scraped records, nothing to reconcile");
        return Ok(());
    }
    info!("🗂 Reconciling {} vendor(s): {:?}", vendors.len(), vendors);

    // Ctrl-C stops dispatching new records; workers already in flight finish
    // and their outcomes are flushed.
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C received, finishing in-flight work...");
            cancel_flag.store(true, Ordering::Relaxed);
        }
    });

    let mut report = RunReport::new();
    if let Err(e) = report
        .record_run(&pool, pipeline_config.run_description.as_deref())
        .await
    {
        warn!("Could not create run record: {:#}", e);
    }

    let engine = MatchEngine::new(Arc::new(catalog), semantic_matcher);
    let runner = ReconciliationRunner::new(engine, &pipeline_config, cancel.clone());

    for vendor in &vendors {
        if cancel.load(Ordering::Relaxed) {
            warn!("🛑 Skipping remaining vendors after cancellation");
            break;
        }
        match runner.run_batch(&pool, vendor).await {
            Ok(stats) => report.absorb(&stats),
            Err(e) => {
                error!("❌ Batch for vendor '{}' failed: {:#}", vendor, e);
                report.totals.errors += 1;
            }
        }
    }

    report.log_run_summary();
    if let Err(e) = report.finalize_run(&pool).await {
        warn!("Could not finalize run record: {:#}", e);
    }

    info!("🏁 Reconciliation pipeline complete");
    Ok(())
}
