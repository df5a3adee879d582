// Content Pattern Classification
// Delegates cross-review language patterns (repeated phrasing, excessive
// positivity) to an external LLM and validates whatever comes back.
//
// The boundary fails open: transport errors, unparseable output and schema
// violations all collapse to an empty red-flag list.

use crate::models::{
    ContentPatternFlags, ExcessivePositivityDetails, PhraseRepetitionDetails, RedFlag,
    RedFlagKind, Review, ReviewBombingDetails, MAX_BATCH_SIZE,
};
use crate::services::config_store::AppConfig;
use crate::services::providers::{parse_provider, resolve_api_key, ProviderClient, ProviderError, ProviderSpec};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use super::review_bombing::CLUSTER_HOURS_SPAN;

const CLASSIFIER_MAX_TOKENS: i32 = 2048;
/// Per-review text budget in the prompt (Unicode scalars).
const REVIEW_TEXT_MAX_CHARS: usize = 1200;

const PATTERN_SYSTEM_PROMPT: &str = r#"You are an analyst detecting inauthentic product reviews.
You receive a batch of reviews, each prefixed with its id in square brackets.
Look only for patterns that span several reviews:
1. phrase_repetition: the same distinctive phrase (not a generic word) appearing in two or more reviews.
2. excessive_positivity: reviews stacked with superlatives and hype keywords rather than concrete experience.

Respond with JSON only, exactly in this shape:
{"redFlags": [
  {"type": "phrase_repetition", "confidence": 0.0-1.0, "details": {"phrase": "...", "reviewIds": ["..."]}},
  {"type": "excessive_positivity", "confidence": 0.0-1.0, "details": {"reviewIds": ["..."], "keywords": ["..."]}}
]}
Use only review ids that appear in the input. Return {"redFlags": []} when nothing stands out."#;

#[derive(Error, Debug, PartialEq)]
pub enum FlagValidationError {
    #[error("unknown flag type: {0}")]
    UnknownType(String),
    #[error("{kind}: confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange { kind: String, value: f64 },
    #[error("{kind}: malformed details: {message}")]
    MalformedDetails { kind: String, message: String },
    #[error("{0}: reviewIds is empty")]
    NoReviewIds(String),
    #[error("{kind}: unknown review id {id}")]
    UnknownReviewId { kind: String, id: String },
    #[error("{kind}: review id {id} listed twice")]
    DuplicateReviewId { kind: String, id: String },
    #[error("{kind}: {message}")]
    Inconsistent { kind: String, message: String },
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("classifier timed out after {0}s")]
    Timeout(u64),
    #[error("no JSON object in classifier output")]
    NoJson,
    #[error("classifier output does not match schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("classifier flag rejected: {0}")]
    Validation(#[from] FlagValidationError),
}

/// External source of content-pattern judgments. Returns the raw model output;
/// parsing and validation stay on this side of the boundary.
#[async_trait]
pub trait PatternClassifier: Send + Sync {
    fn name(&self) -> String;
    async fn classify(&self, reviews: &[Review]) -> Result<String, ClassifierError>;
}

// ============================================================================
// Response schema
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ClassifierEnvelope {
    red_flags: Vec<RawFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFlag {
    #[serde(rename = "type")]
    kind: String,
    confidence: f64,
    details: serde_json::Value,
}

fn extract_json(content: &str) -> Result<&str, ClassifierError> {
    let content = content.trim();
    let start = content.find('{').ok_or(ClassifierError::NoJson)?;
    let end = content.rfind('}').ok_or(ClassifierError::NoJson)?;
    if end < start {
        return Err(ClassifierError::NoJson);
    }
    Ok(&content[start..=end])
}

fn typed_details<T: DeserializeOwned>(kind: &str, details: serde_json::Value) -> Result<T, FlagValidationError> {
    serde_json::from_value(details).map_err(|e| FlagValidationError::MalformedDetails {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

fn validate_flag(raw: RawFlag, known_ids: &HashSet<&str>) -> Result<RedFlag, FlagValidationError> {
    let RawFlag { kind, confidence, details } = raw;

    let parsed = match kind.as_str() {
        "review_bombing" => {
            let d: ReviewBombingDetails = typed_details(&kind, details)?;
            if d.review_count != d.review_ids.len() {
                return Err(FlagValidationError::Inconsistent {
                    message: format!("reviewCount {} but {} reviewIds", d.review_count, d.review_ids.len()),
                    kind,
                });
            }
            if d.hours_span != CLUSTER_HOURS_SPAN {
                return Err(FlagValidationError::Inconsistent {
                    message: format!("hoursSpan {} (expected {})", d.hours_span, CLUSTER_HOURS_SPAN),
                    kind,
                });
            }
            RedFlagKind::ReviewBombing(d)
        }
        "phrase_repetition" => {
            let d: PhraseRepetitionDetails = typed_details(&kind, details)?;
            if d.phrase.trim().is_empty() {
                return Err(FlagValidationError::MalformedDetails {
                    kind,
                    message: "phrase is blank".to_string(),
                });
            }
            RedFlagKind::PhraseRepetition(d)
        }
        "excessive_positivity" => RedFlagKind::ExcessivePositivity(typed_details::<ExcessivePositivityDetails>(&kind, details)?),
        _ => return Err(FlagValidationError::UnknownType(kind)),
    };

    if !(0.0..=1.0).contains(&confidence) {
        return Err(FlagValidationError::ConfidenceOutOfRange { kind, value: confidence });
    }

    let ids = parsed.review_ids();
    if ids.is_empty() {
        return Err(FlagValidationError::NoReviewIds(kind));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !known_ids.contains(id.as_str()) {
            return Err(FlagValidationError::UnknownReviewId { kind, id: id.clone() });
        }
        if !seen.insert(id.as_str()) {
            return Err(FlagValidationError::DuplicateReviewId { kind, id: id.clone() });
        }
    }

    Ok(RedFlag::new(parsed, confidence))
}

/// Parse and validate raw classifier output against `reviews`. Any flag that
/// fails validation rejects the whole response.
pub fn parse_classifier_response(content: &str, reviews: &[Review]) -> Result<Vec<RedFlag>, ClassifierError> {
    let json = extract_json(content)?;
    let envelope: ClassifierEnvelope = serde_json::from_str(json)?;
    let known_ids: HashSet<&str> = reviews.iter().map(|r| r.id.as_str()).collect();

    envelope
        .red_flags
        .into_iter()
        .map(|raw| validate_flag(raw, &known_ids).map_err(ClassifierError::from))
        .collect()
}

/// Classify content patterns for a batch. Never fails: any problem is logged
/// and an empty flag list is returned instead.
pub async fn analyze_content_patterns(
    classifier: &dyn PatternClassifier,
    reviews: &[Review],
) -> ContentPatternFlags {
    if reviews.is_empty() {
        return ContentPatternFlags::default();
    }

    let batch = &reviews[..reviews.len().min(MAX_BATCH_SIZE)];
    let started = Instant::now();

    let outcome = match classifier.classify(batch).await {
        Ok(content) => parse_classifier_response(&content, batch),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(red_flags) => {
            info!(
                "[CONTENT_PATTERNS] classifier={} reviews={} flags={} elapsed_ms={}",
                classifier.name(),
                batch.len(),
                red_flags.len(),
                started.elapsed().as_millis()
            );
            ContentPatternFlags { red_flags }
        }
        Err(e) => {
            warn!(
                "[CONTENT_PATTERNS] classifier={} unavailable, continuing with local flags only: {}",
                classifier.name(),
                e
            );
            ContentPatternFlags::default()
        }
    }
}

// ============================================================================
// LLM-backed classifier
// ============================================================================

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

fn build_user_prompt(reviews: &[Review]) -> String {
    let mut prompt = format!("Analyze these {} reviews:\n\n", reviews.len());
    for review in reviews {
        prompt.push_str(&format!(
            "[{}] rating={} verified={}\n{}\n\n",
            review.id,
            review.rating,
            review.verified,
            truncate_chars(review.text.trim(), REVIEW_TEXT_MAX_CHARS).replace('\n', " ")
        ));
    }
    prompt
}

pub struct LlmPatternClassifier {
    client: ProviderClient,
    provider: ProviderSpec,
    api_key: String,
    timeout_secs: u64,
    max_reviews: usize,
}

impl LlmPatternClassifier {
    pub fn new(app: &AppConfig) -> Result<Self, ProviderError> {
        let config = &app.classifier;
        let provider = parse_provider(&config.provider);
        let api_key = resolve_api_key(&provider.name, &app.api_keys)
            .ok_or_else(|| ProviderError::MissingApiKey(provider.name.clone()))?;
        let client = ProviderClient::configured(
            Duration::from_secs(config.timeout_secs),
            config.base_url.clone(),
            app.proxy.as_ref(),
        )?;
        Ok(Self {
            client,
            provider,
            api_key,
            timeout_secs: config.timeout_secs,
            max_reviews: config.effective_max_reviews(),
        })
    }

    /// Build from config, or `None` (with a warning) when disabled or unusable.
    pub fn from_config(app: &AppConfig) -> Option<Self> {
        if !app.classifier.enabled {
            info!("[CONTENT_PATTERNS] classifier disabled in config");
            return None;
        }
        match Self::new(app) {
            Ok(classifier) => Some(classifier),
            Err(e) => {
                warn!("[CONTENT_PATTERNS] classifier not available, using local detection: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl PatternClassifier for LlmPatternClassifier {
    fn name(&self) -> String {
        format!("{}:{}", self.provider.name, self.provider.model)
    }

    async fn classify(&self, reviews: &[Review]) -> Result<String, ClassifierError> {
        let batch = &reviews[..reviews.len().min(self.max_reviews)];
        let user_prompt = build_user_prompt(batch);
        let call = self.client.call_json(
            &self.provider,
            &self.api_key,
            PATTERN_SYSTEM_PROMPT,
            &user_prompt,
            CLASSIFIER_MAX_TOKENS,
        );

        // Single attempt; a failure degrades to local-only scoring.
        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), call).await {
            Ok(result) => {
                let result = result?;
                info!(
                    "[CONTENT_PATTERNS] provider={} latency_ms={}",
                    self.provider.name, result.latency_ms
                );
                Ok(result.content)
            }
            Err(_) => Err(ClassifierError::Timeout(self.timeout_secs)),
        }
    }
}
