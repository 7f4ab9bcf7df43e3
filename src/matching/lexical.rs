// src/matching/lexical.rs
// Tier 1: lexical fast path. Only near-exact name agreement clears it, so
// the common case never touches the oracle.

use log::debug;

use crate::models::{CanonicalProduct, MatchMethodType, MatchResult, ScrapedRecord};
use crate::scoring::best_lexical_score;

/// Minimum lexical score for a Tier 1 acceptance.
pub const LEXICAL_MATCH_THRESHOLD: f64 = 95.0;

/// Best-scoring candidate at or above the lexical threshold. Ties keep the
/// candidate earliest in catalog order.
pub fn find_match(record: &ScrapedRecord, candidates: &[CanonicalProduct]) -> Option<MatchResult> {
    let mut best: Option<(f64, &CanonicalProduct)> = None;
    for candidate in candidates {
        let score = best_lexical_score(record, &candidate.standardized_name);
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ => best = Some((score, candidate)),
        }
    }

    let (score, candidate) = best?;
    if score < LEXICAL_MATCH_THRESHOLD {
        return None;
    }
    debug!(
        "Tier-1 lexical match at {:.1} for {:?} -> {:?}",
        score, record.raw_name, candidate.standardized_name
    );
    Some(MatchResult::new(
        candidate.id,
        score,
        MatchMethodType::Lexical,
        candidate.standardized_name.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategorySpecs, ProductId};

    fn record(name: &str, brand: Option<&str>) -> ScrapedRecord {
        ScrapedRecord {
            vendor: "techland".into(),
            raw_name: name.into(),
            brand_guess: brand.map(|b| b.to_string()),
            category_guess: "CPU".into(),
            price: None,
            url: None,
            availability: "in_stock".into(),
            scraped_at: None,
        }
    }

    fn candidate(id: i64, name: &str) -> CanonicalProduct {
        CanonicalProduct {
            id: ProductId(id),
            category: Category::Cpu,
            brand: "AMD".into(),
            standardized_name: name.into(),
            specs: CategorySpecs::None,
            reference_price: None,
        }
    }

    #[test]
    fn exact_name_clears_the_threshold() {
        let candidates = vec![
            candidate(1, "AMD Ryzen 5 5600"),
            candidate(2, "AMD Ryzen 7 7700X"),
        ];
        let result = find_match(&record("AMD Ryzen 7 7700X", Some("AMD")), &candidates)
            .unwrap_or_else(|| panic!("expected a lexical match"));
        assert_eq!(result.canonical_id, ProductId(2));
        assert_eq!(result.method, MatchMethodType::Lexical);
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.matched_name, "AMD Ryzen 7 7700X");
    }

    #[test]
    fn messy_names_fall_through() {
        let candidates = vec![candidate(1, "AMD Ryzen 7 7700X")];
        let result = find_match(
            &record("Ryzen 7 7700X 8-Core 16-Thread Desktop Processor", Some("AMD")),
            &candidates,
        );
        assert!(result.is_none());
    }

    #[test]
    fn ties_keep_the_earlier_candidate() {
        // Two catalog rows with the same standardized name: load order decides.
        let candidates = vec![
            candidate(7, "AMD Ryzen 7 7700X"),
            candidate(8, "AMD Ryzen 7 7700X"),
        ];
        let result = find_match(&record("AMD Ryzen 7 7700X", None), &candidates)
            .unwrap_or_else(|| panic!("expected a lexical match"));
        assert_eq!(result.canonical_id, ProductId(7));
    }

    #[test]
    fn empty_candidate_set_is_a_miss() {
        assert!(find_match(&record("AMD Ryzen 7 7700X", None), &[]).is_none());
    }
}
