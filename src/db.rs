// src/db.rs
// Connection pool plus the pipeline's SQL surface: catalog and scraped-listing
// reads, batched price/candidate writes, and run bookkeeping.

use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config, NoTls};
use uuid::Uuid;

use crate::models::{CanonicalProduct, Category, CategorySpecs, ProductId, ScrapedRecord};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// One matched listing ready to be written as a price-history row.
#[derive(Debug, Clone)]
pub struct PriceEntryRow {
    pub master_product_id: ProductId,
    pub vendor_id: i64,
    pub scraped_price: f64,
    pub availability_status: String,
    pub product_url: Option<String>,
    pub scraped_timestamp: DateTime<Utc>,
}

/// One unmatched listing queued for catalog review.
#[derive(Debug, Clone)]
pub struct NewProductRow {
    pub vendor_name: String,
    pub category: String,
    pub raw_name: String,
    pub brand: Option<String>,
    pub price_bdt: Option<f64>,
    pub product_url: Option<String>,
}

/// Aggregate counters written back onto the run row when a run finishes.
#[derive(Debug, Default, Clone)]
pub struct RunTotals {
    pub total_vendors: i32,
    pub total_records: i64,
    pub total_matched: i64,
    pub lexical_matches: i64,
    pub semantic_matches: i64,
    pub composite_matches: i64,
    pub brand_overlap_matches: i64,
    pub new_candidates: i64,
    pub error_count: i64,
    pub avg_confidence: f64,
}

/// Reads environment variables and constructs a PostgreSQL config.
fn build_pg_config() -> Config {
    let mut config = Config::new();
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port_str = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
    let port = port_str.parse::<u16>().unwrap_or(5432);
    let dbname = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "pricetracker".to_string());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();

    info!(
        "DB Config: Host={}, Port={}, DB={}, User={}",
        host, port, dbname, user
    );
    config
        .host(&host)
        .port(port)
        .dbname(&dbname)
        .user(&user)
        .password(&password);
    config.application_name("reconciliation_pipeline");
    config.connect_timeout(Duration::from_secs(10));
    config
}

/// Initializes the database connection pool.
pub async fn connect() -> Result<PgPool> {
    let config = build_pg_config();
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    let pool = Pool::builder()
        .max_size(20)
        .min_idle(Some(2))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    // Test connection
    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    info!("Database connection pool initialized successfully.");
    Ok(pool.clone())
}

/// Bulk-reads the canonical catalog ordered by product id. That order is the
/// tie-break order for equal match scores downstream, so the ORDER BY is
/// load-bearing.
pub async fn fetch_master_products(pool: &PgPool) -> Result<Vec<CanonicalProduct>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_master_products")?;

    const SELECT_SQL: &str = "
        SELECT product_id, standard_name, category, brand, reference_price, key_specs
        FROM public.master_products
        ORDER BY product_id ASC";

    let rows = conn
        .query(SELECT_SQL, &[])
        .await
        .context("Failed to query master_products")?;

    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.get("product_id");
        let label: String = row.get("category");
        let category = match Category::from_label(&label) {
            Some(category) => category,
            None => {
                warn!(
                    "Skipping master product {} with unrecognized category '{}'",
                    id, label
                );
                continue;
            }
        };
        let key_specs: Option<serde_json::Value> = row.get("key_specs");
        products.push(CanonicalProduct {
            id: ProductId(id),
            category,
            brand: row.get("brand"),
            standardized_name: row.get("standard_name"),
            specs: CategorySpecs::from_json(category, key_specs.as_ref()),
            reference_price: row.get("reference_price"),
        });
    }
    debug!("Fetched {} master products", products.len());
    Ok(products)
}

/// Distinct vendors present in the scraped-listing source.
pub async fn fetch_vendor_names(pool: &PgPool) -> Result<Vec<String>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_vendor_names")?;

    let rows = conn
        .query(
            "SELECT DISTINCT vendor_name FROM public.raw_vendor_products ORDER BY vendor_name ASC",
            &[],
        )
        .await
        .context("Failed to query distinct vendor names")?;

    Ok(rows.iter().map(|row| row.get("vendor_name")).collect())
}

/// Reads one vendor's listings in insertion order.
pub async fn fetch_scraped_records(pool: &PgPool, vendor: &str) -> Result<Vec<ScrapedRecord>> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for fetch_scraped_records")?;

    const SELECT_SQL: &str = "
        SELECT vendor_name, category, raw_name, brand, price_bdt,
               availability_status, product_url, scraped_at
        FROM public.raw_vendor_products
        WHERE vendor_name = $1
        ORDER BY id ASC";

    let rows = conn
        .query(SELECT_SQL, &[&vendor])
        .await
        .with_context(|| format!("Failed to query raw_vendor_products for vendor '{}'", vendor))?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(ScrapedRecord {
            vendor: row.get("vendor_name"),
            raw_name: row.get::<_, Option<String>>("raw_name").unwrap_or_default(),
            brand_guess: row.get("brand"),
            category_guess: row.get::<_, Option<String>>("category").unwrap_or_default(),
            price: row.get("price_bdt"),
            url: row.get("product_url"),
            availability: row
                .get::<_, Option<String>>("availability_status")
                .unwrap_or_default(),
            scraped_at: row.get("scraped_at"),
        });
    }
    debug!("Fetched {} scraped records for vendor '{}'", records.len(), vendor);
    Ok(records)
}

/// Looks up a vendor id by name, creating the row on first sight.
pub async fn get_or_create_vendor(pool: &PgPool, name: &str) -> Result<i64> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for get_or_create_vendor")?;

    if let Some(row) = conn
        .query_opt("SELECT vendor_id FROM public.vendors WHERE name = $1", &[&name])
        .await
        .context("Failed to query vendors by name")?
    {
        return Ok(row.get("vendor_id"));
    }

    // DO UPDATE keeps RETURNING populated when two batches race on the same
    // vendor name.
    let row = conn
        .query_one(
            "INSERT INTO public.vendors (name, is_active) VALUES ($1, TRUE)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING vendor_id",
            &[&name],
        )
        .await
        .with_context(|| format!("Failed to insert vendor '{}'", name))?;

    let vendor_id: i64 = row.get("vendor_id");
    info!("Registered new vendor '{}' with id {}", name, vendor_id);
    Ok(vendor_id)
}

/// Batch insert matched listings into the price history.
pub async fn insert_price_entries(pool: &PgPool, entries: &[PriceEntryRow]) -> Result<u64> {
    if entries.is_empty() {
        return Ok(0);
    }
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for insert_price_entries")?;

    let mut query = String::from(
        "INSERT INTO public.price_entries (
            master_product_id, vendor_id, scraped_price,
            availability_status, product_url, scraped_timestamp
        ) VALUES ",
    );

    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
    let mut param_groups = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let base_idx = i * 6;
        param_groups.push(format!(
            "(${}, ${}, ${}, ${}, ${}, ${})",
            base_idx + 1,
            base_idx + 2,
            base_idx + 3,
            base_idx + 4,
            base_idx + 5,
            base_idx + 6
        ));

        params.push(&entry.master_product_id.0);
        params.push(&entry.vendor_id);
        params.push(&entry.scraped_price);
        params.push(&entry.availability_status);
        params.push(&entry.product_url);
        params.push(&entry.scraped_timestamp);
    }

    query.push_str(&param_groups.join(", "));

    conn.execute(&query, &params[..])
        .await
        .context("Failed to batch insert price_entries")
}

/// Batch insert unmatched listings for catalog review. A candidate re-seen in
/// a later run keeps its original first_seen row.
pub async fn insert_new_product_candidates(
    pool: &PgPool,
    candidates: &[NewProductRow],
) -> Result<u64> {
    if candidates.is_empty() {
        return Ok(0);
    }
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for insert_new_product_candidates")?;

    let mut query = String::from(
        "INSERT INTO public.new_product_candidates (
            vendor_name, category, raw_name, brand, price_bdt, product_url, first_seen
        ) VALUES ",
    );

    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
    let mut param_groups = Vec::new();

    for (i, candidate) in candidates.iter().enumerate() {
        let base_idx = i * 6;
        param_groups.push(format!(
            "(${}, ${}, ${}, ${}, ${}, ${}, CURRENT_TIMESTAMP)",
            base_idx + 1,
            base_idx + 2,
            base_idx + 3,
            base_idx + 4,
            base_idx + 5,
            base_idx + 6
        ));

        params.push(&candidate.vendor_name);
        params.push(&candidate.category);
        params.push(&candidate.raw_name);
        params.push(&candidate.brand);
        params.push(&candidate.price_bdt);
        params.push(&candidate.product_url);
    }

    query.push_str(&param_groups.join(", "));
    query.push_str(" ON CONFLICT (vendor_name, raw_name) DO NOTHING");

    conn.execute(&query, &params[..])
        .await
        .context("Failed to batch insert new_product_candidates")
}

/// Creates the run row up front with zeroed totals. It is updated once the
/// run completes.
pub async fn create_reconciliation_run(
    pool: &PgPool,
    run_id: &Uuid,
    started_at: DateTime<Utc>,
    description: Option<&str>,
) -> Result<()> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for create_reconciliation_run")?;

    const INSERT_SQL: &str = "
        INSERT INTO public.reconciliation_runs (
            id, started_at, description,
            total_vendors, total_records, total_matched,
            lexical_matches, semantic_matches, composite_matches, brand_overlap_matches,
            new_candidates, error_count, avg_confidence
        )
        VALUES ($1, $2, $3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0.0)";

    let run_id_str = run_id.to_string();
    conn.execute(INSERT_SQL, &[&run_id_str, &started_at, &description])
        .await
        .context("Failed to insert initial reconciliation_runs record")?;

    info!("Created reconciliation run record with ID: {}", run_id);
    Ok(())
}

/// Writes the final totals onto the run row.
pub async fn finalize_reconciliation_run(
    pool: &PgPool,
    run_id: &Uuid,
    completed_at: DateTime<Utc>,
    totals: &RunTotals,
) -> Result<()> {
    let conn = pool
        .get()
        .await
        .context("Failed to get DB connection for finalize_reconciliation_run")?;

    const UPDATE_SQL: &str = "
        UPDATE public.reconciliation_runs
        SET completed_at = $2, total_vendors = $3, total_records = $4,
            total_matched = $5, lexical_matches = $6, semantic_matches = $7,
            composite_matches = $8, brand_overlap_matches = $9,
            new_candidates = $10, error_count = $11, avg_confidence = $12
        WHERE id = $1";

    let run_id_str = run_id.to_string();
    let updated = conn
        .execute(
            UPDATE_SQL,
            &[
                &run_id_str,
                &completed_at,
                &totals.total_vendors,
                &totals.total_records,
                &totals.total_matched,
                &totals.lexical_matches,
                &totals.semantic_matches,
                &totals.composite_matches,
                &totals.brand_overlap_matches,
                &totals.new_candidates,
                &totals.error_count,
                &totals.avg_confidence,
            ],
        )
        .await
        .context("Failed to finalize reconciliation_runs record")?;

    if updated != 1 {
        warn!(
            "Expected to finalize exactly one run row for {}, updated {}",
            run_id, updated
        );
    }
    Ok(())
}
