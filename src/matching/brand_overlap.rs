// src/matching/brand_overlap.rs
// Tier 4: last-resort term overlap, restricted to candidates of the exact
// same brand. Skipped entirely for records without a brand guess.

use log::debug;

use crate::models::{CanonicalProduct, MatchMethodType, MatchResult, ScrapedRecord};
use crate::scoring::term_overlap;

/// Minimum term-overlap score for a Tier 4 acceptance.
pub const BRAND_OVERLAP_THRESHOLD: f64 = 75.0;

/// Best same-brand candidate by key-term overlap. Ties keep the candidate
/// earliest in catalog order.
pub fn find_match(record: &ScrapedRecord, candidates: &[CanonicalProduct]) -> Option<MatchResult> {
    let brand = record
        .brand_guess
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())?;

    let mut best: Option<(f64, &CanonicalProduct)> = None;
    for candidate in candidates
        .iter()
        .filter(|c| c.brand.trim().eq_ignore_ascii_case(brand))
    {
        let score = term_overlap(&record.raw_name, &candidate.standardized_name);
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ => best = Some((score, candidate)),
        }
    }

    let (score, candidate) = best?;
    if score < BRAND_OVERLAP_THRESHOLD {
        return None;
    }
    debug!(
        "Tier-4 brand overlap match at {:.1} for {:?} -> {:?}",
        score, record.raw_name, candidate.standardized_name
    );
    Some(MatchResult::new(
        candidate.id,
        score,
        MatchMethodType::BrandOverlap,
        candidate.standardized_name.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategorySpecs, ProductId};

    fn record(name: &str, brand: Option<&str>) -> ScrapedRecord {
        ScrapedRecord {
            vendor: "skyland".into(),
            raw_name: name.into(),
            brand_guess: brand.map(|b| b.to_string()),
            category_guess: "RAM".into(),
            price: None,
            url: None,
            availability: "in_stock".into(),
            scraped_at: None,
        }
    }

    fn candidate(id: i64, name: &str, brand: &str) -> CanonicalProduct {
        CanonicalProduct {
            id: ProductId(id),
            category: Category::Ram,
            brand: brand.into(),
            standardized_name: name.into(),
            specs: CategorySpecs::None,
            reference_price: None,
        }
    }

    #[test]
    fn high_overlap_same_brand_clears() {
        let rec = record("Corsair Vengeance RGB Pro 32GB DDR4 3600", Some("Corsair"));
        let candidates = vec![candidate(1, "Corsair Vengeance RGB Pro DDR4 3600", "Corsair")];
        let result = find_match(&rec, &candidates)
            .unwrap_or_else(|| panic!("expected a brand overlap match"));
        assert_eq!(result.method, MatchMethodType::BrandOverlap);
        assert!(result.confidence >= BRAND_OVERLAP_THRESHOLD);
    }

    #[test]
    fn insufficient_overlap_is_explicitly_no_match() {
        let rec = record("Corsair Vengeance 16GB DDR5 6000", Some("Corsair"));
        let candidates = vec![candidate(1, "Corsair Vengeance RGB 32GB DDR5 6000", "Corsair")];
        assert!(find_match(&rec, &candidates).is_none());
    }

    #[test]
    fn missing_brand_guess_skips_the_tier() {
        // Identical names, but no brand guess: the tier does not run.
        let rec = record("Corsair Vengeance RGB 32GB DDR5 6000", None);
        let candidates = vec![candidate(1, "Corsair Vengeance RGB 32GB DDR5 6000", "Corsair")];
        assert!(find_match(&rec, &candidates).is_none());
    }

    #[test]
    fn other_brands_are_never_considered() {
        let rec = record("Vengeance RGB 32GB DDR5 6000", Some("G.Skill"));
        let candidates = vec![candidate(1, "Corsair Vengeance RGB 32GB DDR5 6000", "Corsair")];
        assert!(find_match(&rec, &candidates).is_none());
    }

    #[test]
    fn ties_keep_the_earlier_candidate() {
        let rec = record("Corsair Vengeance RGB 32GB DDR5 6000", Some("Corsair"));
        let candidates = vec![
            candidate(3, "Corsair Vengeance RGB 32GB DDR5 6000", "Corsair"),
            candidate(4, "Corsair Vengeance RGB 32GB DDR5 6000", "Corsair"),
        ];
        let result = find_match(&rec, &candidates)
            .unwrap_or_else(|| panic!("expected a brand overlap match"));
        assert_eq!(result.canonical_id, ProductId(3));
    }
}
