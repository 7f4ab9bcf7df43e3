// src/semantic.rs
// Semantic oracle collaborator: the trait the second matching tier calls,
// the env-driven configuration for it, and the HTTP adapter speaking the
// generateContent protocol. The oracle is optional; without an API key the
// tier is skipped entirely.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tokio::time::timeout;

use crate::models::{ReconcileError, ScrapedRecord};

/// Confidence assumed when the oracle names a candidate but omits a
/// parseable confidence line.
pub const DEFAULT_ORACLE_CONFIDENCE: f64 = 80.0;

const DEFAULT_MODEL: &str = "gemini-pro";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One shortlist entry presented to the oracle. `index` is the 0-based
/// shortlist position the answer refers back to.
#[derive(Debug, Clone)]
pub struct SemanticCandidate {
    pub index: usize,
    pub name: String,
    pub brand: String,
}

/// Oracle verdict: which shortlist entry matched and how confidently.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticAnswer {
    pub candidate_index: usize,
    pub confidence: f64,
}

#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    /// Asks the oracle which shortlist entry (if any) denotes the same
    /// physical product as the scraped record. `Ok(None)` is an explicit
    /// NO_MATCH; errors are transport or protocol failures the caller
    /// treats as a tier miss.
    async fn suggest(
        &self,
        record: &ScrapedRecord,
        candidates: &[SemanticCandidate],
    ) -> Result<Option<SemanticAnswer>, ReconcileError>;
}

#[derive(Debug, Clone)]
pub struct SemanticConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub base_url: String,
}

impl SemanticConfig {
    /// Reads oracle settings from the environment. The tier is active only
    /// when GEMINI_API_KEY is set and non-empty.
    pub fn from_env() -> Self {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let model = env::var("SEMANTIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = env::var("SEMANTIC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let base_url = env::var("SEMANTIC_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
            base_url,
        }
    }

    pub fn is_active(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn log_config(&self) {
        if self.is_active() {
            info!(
                "🤖 Semantic matching ENABLED (model: {}, timeout: {:?})",
                self.model, self.timeout
            );
        } else {
            warn!("🤖 Semantic matching DISABLED - GEMINI_API_KEY not set, tier will be skipped");
        }
    }

    /// Builds the HTTP adapter when a key is configured.
    pub fn build_matcher(&self) -> Option<GeminiMatcher> {
        self.api_key.as_ref().map(|key| {
            GeminiMatcher::new(
                key.clone(),
                self.model.clone(),
                self.base_url.clone(),
                self.timeout,
            )
        })
    }
}

/// HTTP adapter for the hosted oracle.
pub struct GeminiMatcher {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiMatcher {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
            timeout,
        }
    }
}

// Wire shapes of the generateContent exchange. Only the fields this
// pipeline sends or reads are modeled; the rest of the reply is ignored.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<PromptContent>,
}

#[derive(Debug, Serialize)]
struct PromptContent {
    parts: Vec<PromptPart>,
}

#[derive(Debug, Serialize)]
struct PromptPart {
    text: String,
}

impl GenerateRequest {
    fn from_prompt(prompt: String) -> Self {
        Self {
            contents: vec![PromptContent {
                parts: vec![PromptPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<ReplyCandidate>,
}

#[derive(Debug, Deserialize)]
struct ReplyCandidate {
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

impl GenerateReply {
    /// Text of the first part of the first candidate, when present.
    fn reply_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

#[async_trait]
impl SemanticMatcher for GeminiMatcher {
    async fn suggest(
        &self,
        record: &ScrapedRecord,
        candidates: &[SemanticCandidate],
    ) -> Result<Option<SemanticAnswer>, ReconcileError> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateRequest::from_prompt(build_matching_prompt(record, candidates));

        let call = async {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ReconcileError::SemanticUnavailable(e.to_string()))?
                .error_for_status()
                .map_err(|e| ReconcileError::SemanticUnavailable(e.to_string()))?;
            response
                .json::<GenerateReply>()
                .await
                .map_err(|e| ReconcileError::SemanticUnavailable(e.to_string()))
        };

        let payload = match timeout(self.timeout, call).await {
            Err(_) => return Err(ReconcileError::SemanticTimeout(self.timeout)),
            Ok(result) => result?,
        };

        let reply = payload.reply_text().ok_or_else(|| {
            ReconcileError::SemanticUnavailable("reply carried no text part".to_string())
        })?;
        debug!("Oracle reply for {:?}: {}", record.raw_name, reply.trim());
        Ok(parse_matching_reply(reply, candidates.len()))
    }
}

/// Plain-text matching prompt with 1-based numbered candidates.
pub fn build_matching_prompt(record: &ScrapedRecord, candidates: &[SemanticCandidate]) -> String {
    let mut prompt = String::from(
        "You are matching scraped PC component listings to a canonical product catalog.\n\n",
    );
    prompt.push_str("Scraped product:\n");
    prompt.push_str(&format!("Name: {}\n", record.raw_name.trim()));
    prompt.push_str(&format!(
        "Brand: {}\n",
        record.brand_guess.as_deref().unwrap_or("Unknown")
    ));
    prompt.push_str(&format!("Category: {}\n", record.category_guess));
    match record.price {
        Some(price) => prompt.push_str(&format!("Price: {:.2}\n", price)),
        None => prompt.push_str("Price: Unknown\n"),
    }
    prompt.push_str("\nCandidate products:\n");
    for candidate in candidates {
        prompt.push_str(&format!(
            "{}. {} (Brand: {})\n",
            candidate.index + 1,
            candidate.name,
            candidate.brand
        ));
    }
    prompt.push_str(
        "\nDoes the scraped product denote the same physical product as one of the candidates?\n\
         Respond in exactly this format:\n\
         MATCH: <candidate number or NO_MATCH>\n\
         CONFIDENCE: <0-100>\n\
         REASONING: <one short sentence>\n",
    );
    prompt
}

/// Parses the oracle's MATCH/CONFIDENCE reply. Returns `None` for NO_MATCH,
/// an out-of-range candidate number, or an unparseable reply. A named
/// candidate without a confidence line gets the default confidence.
pub fn parse_matching_reply(reply: &str, candidate_count: usize) -> Option<SemanticAnswer> {
    // Replies sometimes arrive wrapped in markdown fences.
    let cleaned = reply.replace("```", "");
    let mut chosen: Option<usize> = None;
    let mut confidence: Option<f64> = None;

    for line in cleaned.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("MATCH:") {
            let value = value.trim();
            if value.to_uppercase().starts_with("NO_MATCH") {
                return None;
            }
            let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(number) = digits.parse::<usize>() {
                if number >= 1 && number <= candidate_count {
                    chosen = Some(number - 1);
                }
            }
        } else if let Some(value) = line.strip_prefix("CONFIDENCE:") {
            let numeric: String = value
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            confidence = numeric.parse::<f64>().ok();
        }
    }

    chosen.map(|candidate_index| SemanticAnswer {
        candidate_index,
        confidence: confidence
            .unwrap_or(DEFAULT_ORACLE_CONFIDENCE)
            .clamp(0.0, 100.0),
    })
}
