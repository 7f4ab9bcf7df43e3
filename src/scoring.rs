// src/scoring.rs
// Pure scoring functions shared by the matching tiers. Every score is on a
// 0-100 scale and fully deterministic for a given pair of inputs.

use once_cell::sync::Lazy;
use regex::Regex;
use strsim::{normalized_levenshtein, sorensen_dice};

use crate::models::{CanonicalProduct, CategorySpecs, ScrapedRecord};
use crate::normalize::{clean_name, extract_key_terms};

/// Composite score returned by `spec_overlap` when the scraped name carries
/// no signal comparable against the candidate's specs.
pub const SPEC_NEUTRAL_SCORE: f64 = 50.0;

static COMPARE_PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

static CAPACITY_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(GB|TB)\b").unwrap());

static DDR_SIGNAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bDDR([2-5])\b").unwrap());

static MHZ_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{4,5})\s*MHZ\b").unwrap());

static DDR_SPEED_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDDR[2-5]\s*-\s*(\d{4,5})\b").unwrap());

static SOCKET_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(AM4|AM5|LGA\s?\d{4})\b").unwrap());

static CHIPSET_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([BXZH]\d{3}[A-Z]?)\b").unwrap());

static WATTAGE_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{3,4})\s*W(ATTS?)?\b").unwrap());

static INTERFACE_SIGNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(NVME|SATA)\b").unwrap());

/// Weighted lexical similarity between two product names, robust to token
/// reordering (token-sorted comparison) and to one side carrying extra
/// marketing words (bigram overlap).
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let fa = fold_for_compare(a);
    let fb = fold_for_compare(b);
    if fa.is_empty() || fb.is_empty() {
        return 0.0;
    }
    if fa == fb {
        return 100.0;
    }
    let whole = normalized_levenshtein(&fa, &fb);
    let reordered = normalized_levenshtein(&sort_tokens(&fa), &sort_tokens(&fb));
    let bigram = sorensen_dice(&fa, &fb);
    100.0 * whole.max(reordered).max(bigram)
}

/// The three comparison variants of a scraped name: as scraped, brand
/// prefixed (when a brand guess exists) and cleaned. Empty and duplicate
/// variants are dropped.
pub fn name_variants(record: &ScrapedRecord) -> Vec<String> {
    let raw = record.raw_name.trim();
    let mut variants: Vec<String> = Vec::with_capacity(3);
    if !raw.is_empty() {
        variants.push(raw.to_string());
    }
    if let Some(brand) = record.brand_guess.as_deref() {
        let brand = brand.trim();
        if !brand.is_empty() && !raw.is_empty() {
            let prefixed = format!("{} {}", brand, raw);
            if !variants.contains(&prefixed) {
                variants.push(prefixed);
            }
        }
    }
    let cleaned = clean_name(raw);
    if !cleaned.is_empty() && !variants.contains(&cleaned) {
        variants.push(cleaned);
    }
    variants
}

/// Best lexical score of any scraped-name variant against one candidate name.
pub fn best_lexical_score(record: &ScrapedRecord, candidate_name: &str) -> f64 {
    name_variants(record)
        .iter()
        .map(|variant| lexical_similarity(variant, candidate_name))
        .fold(0.0, f64::max)
}

/// Closeness of two prices: 100 for equal, falling linearly with the
/// relative difference. Non-positive inputs score 0.
pub fn price_proximity(scraped: f64, reference: f64) -> f64 {
    if scraped <= 0.0 || reference <= 0.0 {
        return 0.0;
    }
    let diff_ratio = (scraped - reference).abs() / scraped.max(reference);
    (100.0 - 100.0 * diff_ratio).max(0.0)
}

/// Shared key-term fraction of two names, scaled against the larger term set.
pub fn term_overlap(a: &str, b: &str) -> f64 {
    let terms_a = extract_key_terms(a);
    let terms_b = extract_key_terms(b);
    if terms_a.is_empty() || terms_b.is_empty() {
        return 0.0;
    }
    let shared = terms_a.intersection(&terms_b).count();
    100.0 * shared as f64 / terms_a.len().max(terms_b.len()) as f64
}

/// Hardware signals parseable out of a raw listing name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NameSignals {
    pub capacity_gb: Option<i32>,
    pub ddr_generation: Option<String>,
    pub speed_mhz: Option<i32>,
    pub socket: Option<String>,
    pub chipset: Option<String>,
    pub wattage: Option<i32>,
    pub interface: Option<String>,
}

/// Pulls comparable spec signals out of a raw name. Capacities are stored in
/// GB (TB scaled by 1000, matching the catalog convention).
pub fn parse_name_signals(name: &str) -> NameSignals {
    let mut signals = NameSignals::default();

    if let Some(caps) = CAPACITY_SIGNAL_RE.captures(name) {
        let amount: Option<i32> = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let unit = caps.get(2).map(|m| m.as_str().to_uppercase());
        signals.capacity_gb = match (amount, unit.as_deref()) {
            (Some(n), Some("TB")) => n.checked_mul(1000),
            (Some(n), Some("GB")) => Some(n),
            _ => None,
        };
    }
    if let Some(caps) = DDR_SIGNAL_RE.captures(name) {
        if let Some(generation) = caps.get(1) {
            signals.ddr_generation = Some(format!("DDR{}", generation.as_str()));
        }
    }
    signals.speed_mhz = MHZ_SIGNAL_RE
        .captures(name)
        .or_else(|| DDR_SPEED_SIGNAL_RE.captures(name))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());
    signals.socket = SOCKET_SIGNAL_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase());
    signals.chipset = CHIPSET_SIGNAL_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase());
    signals.wattage = WATTAGE_SIGNAL_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());
    signals.interface = INTERFACE_SIGNAL_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase());

    signals
}

/// Agreement between signals parsed from the scraped name and the
/// candidate's typed specs: 100 times the agreeing fraction of comparable
/// fields, or the neutral baseline when nothing is comparable.
pub fn spec_overlap(record: &ScrapedRecord, candidate: &CanonicalProduct) -> f64 {
    let signals = parse_name_signals(&record.raw_name);
    let mut comparable = 0usize;
    let mut agreeing = 0usize;

    match &candidate.specs {
        CategorySpecs::Cpu { socket, .. } => {
            compare_token(signals.socket.as_deref(), socket.as_deref(), &mut comparable, &mut agreeing);
        }
        CategorySpecs::Gpu { memory_gb, tdp_watts, .. } => {
            compare_number(signals.capacity_gb, *memory_gb, &mut comparable, &mut agreeing);
            compare_number(signals.wattage, *tdp_watts, &mut comparable, &mut agreeing);
        }
        CategorySpecs::Ram { capacity_gb, speed_mhz, ddr_generation } => {
            compare_number(signals.capacity_gb, *capacity_gb, &mut comparable, &mut agreeing);
            compare_number(signals.speed_mhz, *speed_mhz, &mut comparable, &mut agreeing);
            compare_token(
                signals.ddr_generation.as_deref(),
                ddr_generation.as_deref(),
                &mut comparable,
                &mut agreeing,
            );
        }
        CategorySpecs::Motherboard { socket, chipset, .. } => {
            compare_token(signals.socket.as_deref(), socket.as_deref(), &mut comparable, &mut agreeing);
            compare_token(signals.chipset.as_deref(), chipset.as_deref(), &mut comparable, &mut agreeing);
        }
        CategorySpecs::Psu { wattage, .. } => {
            compare_number(signals.wattage, *wattage, &mut comparable, &mut agreeing);
        }
        CategorySpecs::Storage { capacity_gb, interface } => {
            compare_number(signals.capacity_gb, *capacity_gb, &mut comparable, &mut agreeing);
            if let (Some(signal), Some(spec)) = (signals.interface.as_deref(), interface.as_deref()) {
                comparable += 1;
                if squash_token(spec).contains(&squash_token(signal)) {
                    agreeing += 1;
                }
            }
        }
        CategorySpecs::Case { .. } | CategorySpecs::None => {}
    }

    if comparable == 0 {
        SPEC_NEUTRAL_SCORE
    } else {
        100.0 * agreeing as f64 / comparable as f64
    }
}

fn compare_token(signal: Option<&str>, spec: Option<&str>, comparable: &mut usize, agreeing: &mut usize) {
    if let (Some(signal), Some(spec)) = (signal, spec) {
        *comparable += 1;
        if squash_token(signal) == squash_token(spec) {
            *agreeing += 1;
        }
    }
}

fn compare_number(signal: Option<i32>, spec: Option<i32>, comparable: &mut usize, agreeing: &mut usize) {
    if let (Some(signal), Some(spec)) = (signal, spec) {
        *comparable += 1;
        if signal == spec {
            *agreeing += 1;
        }
    }
}

// "LGA 1700" and "lga1700" compare equal.
fn squash_token(token: &str) -> String {
    token
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn fold_for_compare(s: &str) -> String {
    let lowered = s.to_lowercase();
    let depunctuated = COMPARE_PUNCT_RE.replace_all(&lowered, " ");
    depunctuated.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ProductId};

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

    fn candidate(category: Category, name: &str, brand: &str, specs: CategorySpecs) -> CanonicalProduct {
        CanonicalProduct {
            id: ProductId(1),
            category,
            brand: brand.into(),
            standardized_name: name.into(),
            specs,
            reference_price: None,
        }
    }

    #[test]
    fn identical_names_score_a_hundred() {
        assert_eq!(lexical_similarity("AMD Ryzen 7 7700X", "AMD Ryzen 7 7700X"), 100.0);
        assert_eq!(lexical_similarity("amd ryzen 7 7700x", "AMD RYZEN 7 7700X"), 100.0);
    }

    #[test]
    fn reordered_tokens_score_a_hundred() {
        assert_eq!(lexical_similarity("Ryzen 7 7700X AMD", "AMD Ryzen 7 7700X"), 100.0);
    }

    #[test]
    fn extra_marketing_words_stay_below_the_exact_band() {
        let score = lexical_similarity("AMD Ryzen 7 7700X 8-Core Processor", "AMD Ryzen 7 7700X");
        assert!(score < 95.0, "got {}", score);
        assert!(score > 40.0, "got {}", score);
    }

    #[test]
    fn unrelated_names_score_low() {
        let score = lexical_similarity("Corsair RM850x", "Noctua NH-D15");
        assert!(score < 40.0, "got {}", score);
    }

    #[test]
    fn empty_names_score_zero() {
        assert_eq!(lexical_similarity("", "AMD Ryzen 7 7700X"), 0.0);
        assert_eq!(lexical_similarity("AMD Ryzen 7 7700X", "   "), 0.0);
    }

    #[test]
    fn variants_cover_raw_branded_and_cleaned() {
        let rec = record("RTX 4070 Gaming OC 12GB", Some("Gigabyte"));
        let variants = name_variants(&rec);
        assert_eq!(
            variants,
            vec![
                "RTX 4070 Gaming OC 12GB".to_string(),
                "Gigabyte RTX 4070 Gaming OC 12GB".to_string(),
                "RTX 4070".to_string(),
            ]
        );
    }

    #[test]
    fn duplicate_variants_are_dropped() {
        let rec = record("AMD Ryzen 5 5600", None);
        assert_eq!(name_variants(&rec), vec!["AMD Ryzen 5 5600".to_string()]);
    }

    #[test]
    fn brand_prefix_variant_can_rescue_the_score() {
        let rec = record("Ryzen 7 7700X", Some("AMD"));
        let score = best_lexical_score(&rec, "AMD Ryzen 7 7700X");
        assert_eq!(score, 100.0);
    }

    #[test]
    fn price_proximity_exact_and_relative() {
        assert_eq!(price_proximity(24500.0, 24500.0), 100.0);
        let close = price_proximity(24500.0, 24000.0);
        assert!(close > 95.0 && close < 100.0, "got {}", close);
        assert_eq!(price_proximity(1000.0, 2000.0), 50.0);
        assert_eq!(price_proximity(0.0, 2000.0), 0.0);
        assert_eq!(price_proximity(1000.0, -5.0), 0.0);
    }

    #[test]
    fn term_overlap_scales_by_larger_set() {
        let score = term_overlap(
            "Corsair Vengeance 16GB DDR5 6000",
            "Corsair Vengeance RGB 32GB DDR5 6000",
        );
        // 4 shared terms of max(5, 6).
        assert!((score - 66.666).abs() < 0.1, "got {}", score);
        assert_eq!(term_overlap("Corsair", ""), 0.0);
    }

    #[test]
    fn name_signals_parse_common_patterns() {
        let signals = parse_name_signals("MSI MAG B650 Tomahawk WIFI AM5");
        assert_eq!(signals.chipset.as_deref(), Some("B650"));
        assert_eq!(signals.socket.as_deref(), Some("AM5"));

        let signals = parse_name_signals("Samsung 980 Pro 1TB NVMe M.2");
        assert_eq!(signals.capacity_gb, Some(1000));
        assert_eq!(signals.interface.as_deref(), Some("NVME"));

        let signals = parse_name_signals("Corsair RM850x 850W Gold");
        assert_eq!(signals.wattage, Some(850));

        let signals = parse_name_signals("Corsair Vengeance 16GB DDR5-6000");
        assert_eq!(signals.capacity_gb, Some(16));
        assert_eq!(signals.ddr_generation.as_deref(), Some("DDR5"));
        assert_eq!(signals.speed_mhz, Some(6000));
    }

    #[test]
    fn wattage_inside_model_tokens_is_not_a_signal() {
        let signals = parse_name_signals("Corsair RM850x");
        assert_eq!(signals.wattage, None);
    }

    #[test]
    fn spec_overlap_counts_agreeing_fields() {
        let rec = record("Corsair Vengeance 16GB DDR5 6000MHz", Some("Corsair"));
        let cand = candidate(
            Category::Ram,
            "Corsair Vengeance DDR5",
            "Corsair",
            CategorySpecs::Ram {
                capacity_gb: Some(16),
                speed_mhz: Some(6000),
                ddr_generation: Some("DDR5".into()),
            },
        );
        assert_eq!(spec_overlap(&rec, &cand), 100.0);
    }

    #[test]
    fn spec_overlap_penalizes_disagreement() {
        let rec = record("Corsair Vengeance 32GB DDR5 6000MHz", Some("Corsair"));
        let cand = candidate(
            Category::Ram,
            "Corsair Vengeance DDR5",
            "Corsair",
            CategorySpecs::Ram {
                capacity_gb: Some(16),
                speed_mhz: Some(6000),
                ddr_generation: Some("DDR5".into()),
            },
        );
        let score = spec_overlap(&rec, &cand);
        assert!((score - 66.666).abs() < 0.1, "got {}", score);
    }

    #[test]
    fn spec_overlap_without_signals_is_neutral() {
        let rec = record("Corsair Vengeance", Some("Corsair"));
        let cand = candidate(
            Category::Ram,
            "Corsair Vengeance DDR5",
            "Corsair",
            CategorySpecs::Ram {
                capacity_gb: Some(16),
                speed_mhz: Some(6000),
                ddr_generation: Some("DDR5".into()),
            },
        );
        assert_eq!(spec_overlap(&rec, &cand), SPEC_NEUTRAL_SCORE);
    }

    #[test]
    fn spec_overlap_without_candidate_specs_is_neutral() {
        let rec = record("AMD Ryzen 7 7700X AM5", Some("AMD"));
        let cand = candidate(Category::Cpu, "AMD Ryzen 7 7700X", "AMD", CategorySpecs::None);
        assert_eq!(spec_overlap(&rec, &cand), SPEC_NEUTRAL_SCORE);
    }

    #[test]
    fn newer_lga_sockets_parse_as_signals() {
        let signals = parse_name_signals("Intel Core Ultra 7 265K LGA1851");
        assert_eq!(signals.socket.as_deref(), Some("LGA1851"));

        let rec = record("ASUS Prime Z890-P WiFi LGA1851", Some("ASUS"));
        let cand = candidate(
            Category::Motherboard,
            "ASUS Prime Z890-P",
            "ASUS",
            CategorySpecs::Motherboard {
                socket: Some("LGA1851".into()),
                chipset: Some("Z890".into()),
                form_factor: Some("ATX".into()),
            },
        );
        assert_eq!(spec_overlap(&rec, &cand), 100.0);
    }

    #[test]
    fn socket_comparison_ignores_spacing() {
        let rec = record("Intel Core i5-13600K LGA 1700", Some("Intel"));
        let cand = candidate(
            Category::Cpu,
            "Intel Core i5-13600K",
            "Intel",
            CategorySpecs::Cpu {
                socket: Some("LGA1700".into()),
                core_count: Some(14),
                base_clock_ghz: Some(3.5),
                tdp_watts: Some(125),
            },
        );
        assert_eq!(spec_overlap(&rec, &cand), 100.0);
    }
}
