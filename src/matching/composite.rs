// src/matching/composite.rs
// Tier 3: composite weighted score over brand equality, lexical similarity,
// price proximity and spec agreement. Without a brand guess the weighted
// maximum is 60, so this tier can only clear for branded records.

use log::debug;

use crate::models::{CanonicalProduct, MatchMethodType, MatchResult, ScrapedRecord};
use crate::scoring::{best_lexical_score, price_proximity, spec_overlap};

/// Minimum composite score for a Tier 3 acceptance.
pub const COMPOSITE_MATCH_THRESHOLD: f64 = 85.0;

const BRAND_WEIGHT: f64 = 0.4;
const LEXICAL_WEIGHT: f64 = 0.3;
const PRICE_WEIGHT: f64 = 0.2;
const SPEC_WEIGHT: f64 = 0.1;

/// Weighted composite score for one candidate. The price term contributes
/// zero unless both the scraped price and the candidate reference price are
/// known and positive.
pub fn composite_score(record: &ScrapedRecord, candidate: &CanonicalProduct) -> f64 {
    let brand_component = if brand_matches(record.brand_guess.as_deref(), &candidate.brand) {
        100.0
    } else {
        0.0
    };
    let lexical_component = best_lexical_score(record, &candidate.standardized_name);
    let price_component = match (record.price, candidate.reference_price) {
        (Some(scraped), Some(reference)) => price_proximity(scraped, reference),
        _ => 0.0,
    };
    let spec_component = spec_overlap(record, candidate);

    let score = BRAND_WEIGHT * brand_component
        + LEXICAL_WEIGHT * lexical_component
        + PRICE_WEIGHT * price_component
        + SPEC_WEIGHT * spec_component;
    score.min(100.0)
}

/// Best composite candidate at or above the threshold. Ties keep the
/// candidate earliest in catalog order.
pub fn find_match(record: &ScrapedRecord, candidates: &[CanonicalProduct]) -> Option<MatchResult> {
    let mut best: Option<(f64, &CanonicalProduct)> = None;
    for candidate in candidates {
        let score = composite_score(record, candidate);
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ => best = Some((score, candidate)),
        }
    }

    let (score, candidate) = best?;
    if score < COMPOSITE_MATCH_THRESHOLD {
        return None;
    }
    debug!(
        "Tier-3 composite match at {:.1} for {:?} -> {:?}",
        score, record.raw_name, candidate.standardized_name
    );
    Some(MatchResult::new(
        candidate.id,
        score,
        MatchMethodType::Composite,
        candidate.standardized_name.clone(),
    ))
}

fn brand_matches(guess: Option<&str>, brand: &str) -> bool {
    match guess {
        Some(guess) => guess.trim().eq_ignore_ascii_case(brand.trim()),
        None => false,
    }
}
