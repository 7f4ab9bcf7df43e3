// src/normalize.rs
// Name and category normalization applied to every scraped listing before
// matching. The synonym table here is the single source of truth for mapping
// vendor category spellings onto the closed Category set.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::Category;

/// Vendor-side category spellings, all lowercase. Unknown labels map to no
/// category at all, which downstream turns into an empty candidate set.
const CATEGORY_SYNONYMS: [(&[&str], Category); 8] = [
    (&["cpu", "processor", "processors"], Category::Cpu),
    (
        &["gpu", "graphics card", "graphics cards", "video card", "video cards", "graphics"],
        Category::Gpu,
    ),
    (&["ram", "memory"], Category::Ram),
    (&["motherboard", "motherboards", "mobo"], Category::Motherboard),
    (&["psu", "power supply", "power supplies"], Category::Psu),
    (
        &["storage", "ssd", "ssds", "hdd", "hdds", "hard drive", "hard drives"],
        Category::Storage,
    ),
    (&["case", "cases", "casing"], Category::Case),
    (&["cooling", "cooler", "coolers", "fan", "fans"], Category::Cooling),
];

/// Words carrying no product identity, dropped during key-term extraction.
const STOP_WORDS: [&str; 11] = [
    "the", "and", "or", "of", "in", "on", "at", "to", "for", "with", "by",
];

static MARKETING_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(OC|GAMING|PRO|PLUS|MAX|ULTRA|X|TI|SUPER)\s*$").unwrap());

static CAPACITY_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+\d+\s*(GB|TB)\s*$").unwrap());

static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Maps a vendor category label onto the closed category set.
pub fn normalize_category(label: &str) -> Option<Category> {
    let key = label.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    for (synonyms, category) in CATEGORY_SYNONYMS.iter() {
        if synonyms.contains(&key.as_str()) {
            return Some(*category);
        }
    }
    None
}

/// Strips trailing marketing and capacity tokens until the name stops
/// changing, so repeated application is a no-op.
pub fn clean_name(raw: &str) -> String {
    let mut name = WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned();
    loop {
        let pass = MARKETING_SUFFIX_RE.replace(&name, "").into_owned();
        let pass = CAPACITY_SUFFIX_RE.replace(&pass, "").into_owned();
        let pass = pass.trim_end().to_string();
        if pass == name {
            return name;
        }
        name = pass;
    }
}

/// Identity-bearing terms of a product name: lowercased, punctuation split,
/// stop words and very short tokens dropped.
pub fn extract_key_terms(name: &str) -> HashSet<String> {
    let lowered = name.to_lowercase();
    let depunctuated = PUNCTUATION_RE.replace_all(&lowered, " ");
    depunctuated
        .split_whitespace()
        .filter(|term| term.len() > 2 && !STOP_WORDS.contains(term))
        .map(|term| term.to_string())
        .collect()
}
