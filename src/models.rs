// src/models.rs
// Core data model: catalog products, scraped listings, match results and the
// reconciliation error taxonomy.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Closed set of hardware categories the catalog is partitioned by.
/// Vendor-side spellings are mapped onto these by `normalize::normalize_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Cpu,
    Gpu,
    Ram,
    Motherboard,
    Psu,
    Storage,
    Case,
    Cooling,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Cpu,
        Category::Gpu,
        Category::Ram,
        Category::Motherboard,
        Category::Psu,
        Category::Storage,
        Category::Case,
        Category::Cooling,
    ];

    /// Canonical label as stored in the catalog source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cpu => "CPU",
            Category::Gpu => "GPU",
            Category::Ram => "RAM",
            Category::Motherboard => "Motherboard",
            Category::Psu => "PSU",
            Category::Storage => "Storage",
            Category::Case => "Case",
            Category::Cooling => "Cooling",
        }
    }

    /// Parses a canonical catalog label. Vendor-side spellings go through
    /// `normalize::normalize_category` instead; this only accepts the closed
    /// set the catalog itself uses.
    pub fn from_label(label: &str) -> Option<Category> {
        match label.trim().to_lowercase().as_str() {
            "cpu" => Some(Category::Cpu),
            "gpu" => Some(Category::Gpu),
            "ram" => Some(Category::Ram),
            "motherboard" => Some(Category::Motherboard),
            "psu" => Some(Category::Psu),
            "storage" => Some(Category::Storage),
            "case" => Some(Category::Case),
            "cooling" => Some(Category::Cooling),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifier of a canonical catalog product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed per-category spec payload, parsed once at catalog load.
/// Rows whose spec blob is missing or malformed degrade to `None` rather than
/// failing the load.
#[derive(Debug, Clone, PartialEq)]
pub enum CategorySpecs {
    Cpu {
        socket: Option<String>,
        core_count: Option<i32>,
        base_clock_ghz: Option<f64>,
        tdp_watts: Option<i32>,
    },
    Gpu {
        memory_gb: Option<i32>,
        memory_type: Option<String>,
        tdp_watts: Option<i32>,
    },
    Ram {
        capacity_gb: Option<i32>,
        speed_mhz: Option<i32>,
        ddr_generation: Option<String>,
    },
    Motherboard {
        socket: Option<String>,
        chipset: Option<String>,
        form_factor: Option<String>,
    },
    Psu {
        wattage: Option<i32>,
        efficiency: Option<String>,
    },
    Storage {
        capacity_gb: Option<i32>,
        interface: Option<String>,
    },
    Case {
        form_factor: Option<String>,
    },
    None,
}

impl CategorySpecs {
    /// Parse a catalog spec blob for the given category. Unknown keys are
    /// ignored; missing or malformed values leave the field unset.
    pub fn from_json(category: Category, specs: Option<&Value>) -> Self {
        let obj = match specs.and_then(|v| v.as_object()) {
            Some(obj) if !obj.is_empty() => obj,
            _ => return CategorySpecs::None,
        };
        let get = |key: &str| obj.get(key);

        match category {
            Category::Cpu => CategorySpecs::Cpu {
                socket: spec_str(get("socket_type")),
                core_count: spec_i32(get("core_count")),
                base_clock_ghz: spec_f64(get("base_clock")),
                tdp_watts: spec_i32(get("tdp_watts")),
            },
            Category::Gpu => CategorySpecs::Gpu {
                memory_gb: spec_i32(get("memory_size")),
                memory_type: spec_str(get("memory_type")),
                tdp_watts: spec_i32(get("tdp_watts")),
            },
            Category::Ram => CategorySpecs::Ram {
                capacity_gb: spec_i32(get("capacity")),
                speed_mhz: spec_i32(get("speed")),
                ddr_generation: spec_str(get("type")),
            },
            Category::Motherboard => CategorySpecs::Motherboard {
                socket: spec_str(get("socket_type")),
                chipset: spec_str(get("chipset")),
                form_factor: spec_str(get("form_factor")),
            },
            Category::Psu => CategorySpecs::Psu {
                wattage: spec_i32(get("wattage")),
                efficiency: spec_str(get("efficiency")),
            },
            Category::Storage => CategorySpecs::Storage {
                capacity_gb: spec_i32(get("capacity")),
                interface: spec_str(get("interface")),
            },
            Category::Case => CategorySpecs::Case {
                form_factor: spec_str(get("form_factor")),
            },
            Category::Cooling => CategorySpecs::None,
        }
    }
}

fn spec_str(value: Option<&Value>) -> Option<String> {
    value.and_then(|v| v.as_str()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn spec_i32(value: Option<&Value>) -> Option<i32> {
    match value {
        Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        // Catalog blobs sometimes carry "16GB" / "850W" style strings.
        Some(Value::String(s)) => {
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<i32>().ok()
        }
        _ => None,
    }
}

fn spec_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let numeric: String = s
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            numeric.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// One canonical catalog entry. Immutable once loaded into the cache.
#[derive(Debug, Clone)]
pub struct CanonicalProduct {
    pub id: ProductId,
    pub category: Category,
    pub brand: String,
    pub standardized_name: String,
    pub specs: CategorySpecs,
    pub reference_price: Option<f64>,
}

/// One vendor listing as produced by the collectors. Availability strings
/// pass through to the persistence sink untouched.
#[derive(Debug, Clone)]
pub struct ScrapedRecord {
    pub vendor: String,
    pub raw_name: String,
    pub brand_guess: Option<String>,
    pub category_guess: String,
    pub price: Option<f64>,
    pub url: Option<String>,
    pub availability: String,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl ScrapedRecord {
    pub fn has_usable_name(&self) -> bool {
        !self.raw_name.trim().is_empty()
    }
}

/// Which tier of the cascade produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMethodType {
    Lexical,
    Semantic,
    Composite,
    BrandOverlap,
}

impl MatchMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethodType::Lexical => "lexical",
            MatchMethodType::Semantic => "semantic",
            MatchMethodType::Composite => "composite",
            MatchMethodType::BrandOverlap => "brand_overlap",
        }
    }
}

impl fmt::Display for MatchMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A successful reconciliation outcome. Absence of a match is expressed as
/// `Option::None` by the engine, never as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub canonical_id: ProductId,
    pub confidence: f64,
    pub method: MatchMethodType,
    pub matched_name: String,
}

impl MatchResult {
    /// Builds a result with the confidence clamped into [0, 100].
    pub fn new(
        canonical_id: ProductId,
        confidence: f64,
        method: MatchMethodType,
        matched_name: String,
    ) -> Self {
        Self {
            canonical_id,
            confidence: confidence.clamp(0.0, 100.0),
            method,
            matched_name,
        }
    }
}

/// Failure classes of the reconciliation pipeline. Only `CatalogUnavailable`
/// is fatal for a batch; the rest are logged and the batch continues.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("scraped record has no usable product name")]
    UnusableName,

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("semantic matcher unavailable: {0}")]
    SemanticUnavailable(String),

    #[error("semantic matcher timed out after {0:?}")]
    SemanticTimeout(std::time::Duration),

    #[error("persistence failure: {0}")]
    Persistence(String),
}
