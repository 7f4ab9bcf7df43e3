// src/matching/semantic.rs
// Tier 2: semantic oracle consult. The engine hands the oracle a bounded,
// brand-preferred shortlist; any oracle failure is a tier miss, never a
// batch error.

use log::{debug, warn};
use std::cmp::Ordering;

use crate::models::{CanonicalProduct, MatchMethodType, MatchResult, ScrapedRecord};
use crate::scoring::best_lexical_score;
use crate::semantic::{SemanticCandidate, SemanticMatcher};

/// Minimum oracle confidence for a Tier 2 acceptance.
pub const SEMANTIC_MATCH_THRESHOLD: f64 = 80.0;

/// Upper bound on candidates presented to the oracle.
pub const MAX_SHORTLIST_SIZE: usize = 10;

/// Shortlist for the oracle: same-brand candidates when a brand guess
/// exists (falling back to all candidates when that filter empties), ranked
/// by lexical score. The sort is stable, so equal scores keep catalog order.
pub fn build_shortlist<'a>(
    record: &ScrapedRecord,
    candidates: &'a [CanonicalProduct],
) -> Vec<&'a CanonicalProduct> {
    let pool: Vec<&CanonicalProduct> = match record.brand_guess.as_deref() {
        Some(brand) if !brand.trim().is_empty() => {
            let needle = brand.trim().to_lowercase();
            let same_brand: Vec<&CanonicalProduct> = candidates
                .iter()
                .filter(|c| c.brand.to_lowercase().contains(&needle))
                .collect();
            if same_brand.is_empty() {
                candidates.iter().collect()
            } else {
                same_brand
            }
        }
        _ => candidates.iter().collect(),
    };

    let mut scored: Vec<(f64, &CanonicalProduct)> = pool
        .into_iter()
        .map(|c| (best_lexical_score(record, &c.standardized_name), c))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(MAX_SHORTLIST_SIZE);
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Consults the oracle over the shortlist. Absent, failing or timing-out
/// oracles and sub-threshold answers all fall through to the next tier.
pub async fn find_match(
    record: &ScrapedRecord,
    candidates: &[CanonicalProduct],
    matcher: &dyn SemanticMatcher,
) -> Option<MatchResult> {
    let shortlist = build_shortlist(record, candidates);
    if shortlist.is_empty() {
        return None;
    }
    let oracle_candidates: Vec<SemanticCandidate> = shortlist
        .iter()
        .enumerate()
        .map(|(index, c)| SemanticCandidate {
            index,
            name: c.standardized_name.clone(),
            brand: c.brand.clone(),
        })
        .collect();

    let answer = match matcher.suggest(record, &oracle_candidates).await {
        Ok(answer) => answer?,
        Err(e) => {
            warn!("⚠️ Semantic tier miss for {:?}: {}", record.raw_name, e);
            return None;
        }
    };

    if answer.confidence < SEMANTIC_MATCH_THRESHOLD {
        debug!(
            "Oracle confidence {:.1} below threshold for {:?}",
            answer.confidence, record.raw_name
        );
        return None;
    }
    let candidate = match shortlist.get(answer.candidate_index) {
        Some(candidate) => *candidate,
        None => {
            warn!(
                "Oracle named shortlist entry {} of {} for {:?}",
                answer.candidate_index,
                shortlist.len(),
                record.raw_name
            );
            return None;
        }
    };
    Some(MatchResult::new(
        candidate.id,
        answer.confidence,
        MatchMethodType::Semantic,
        candidate.standardized_name.clone(),
    ))
}
