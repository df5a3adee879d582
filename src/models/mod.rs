// reviewGuard Data Models
// Review batches in, red/green flags and trust assessments out

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Upper bound on reviews accepted per assessment (and sent to the classifier).
pub const MAX_BATCH_SIZE: usize = 100;

// ============ Review Input ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub rating: f64,
    pub text: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub verified: bool,
    /// Free-form posting date. Compared by exact string equality, never parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub metadata: ReviewMetadata,
}

/// Platform metadata carried through untouched; no detector reads it.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helpful_votes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_votes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_variation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_vine_review: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badges: Vec<String>,
}

impl Review {
    pub fn new(id: impl Into<String>, rating: f64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rating,
            text: text.into(),
            author: String::new(),
            verified: false,
            date: None,
            metadata: ReviewMetadata::default(),
        }
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn dated(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

// ============ Batch Validation ============

#[derive(Error, Debug, PartialEq)]
pub enum BatchValidationError {
    #[error("review batch is empty")]
    Empty,
    #[error("review batch has {0} reviews (max {max})", max = MAX_BATCH_SIZE)]
    TooLarge(usize),
    #[error("review at index {0} has a blank id")]
    BlankId(usize),
    #[error("duplicate review id: {0}")]
    DuplicateId(String),
    #[error("review {0} has blank text")]
    BlankText(String),
    #[error("review {id} has rating {rating} outside 1-5")]
    RatingOutOfRange { id: String, rating: f64 },
}

/// Request-level checks for callers without their own validation layer.
/// The detectors themselves accept any batch, including an empty one.
pub fn validate_batch(reviews: &[Review]) -> Result<(), BatchValidationError> {
    if reviews.is_empty() {
        return Err(BatchValidationError::Empty);
    }
    if reviews.len() > MAX_BATCH_SIZE {
        return Err(BatchValidationError::TooLarge(reviews.len()));
    }

    let mut seen = HashSet::with_capacity(reviews.len());
    for (idx, review) in reviews.iter().enumerate() {
        if review.id.trim().is_empty() {
            return Err(BatchValidationError::BlankId(idx));
        }
        if !seen.insert(review.id.as_str()) {
            return Err(BatchValidationError::DuplicateId(review.id.clone()));
        }
        if review.text.trim().is_empty() {
            return Err(BatchValidationError::BlankText(review.id.clone()));
        }
        if !(1.0..=5.0).contains(&review.rating) {
            return Err(BatchValidationError::RatingOutOfRange {
                id: review.id.clone(),
                rating: review.rating,
            });
        }
    }
    Ok(())
}

// ============ Flag Details ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviewBombingDetails {
    pub date: String,
    pub review_count: usize,
    pub hours_span: u32,
    pub review_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PhraseRepetitionDetails {
    pub phrase: String,
    pub review_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExcessivePositivityDetails {
    pub review_ids: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HighVerifiedPurchasesDetails {
    pub percentage: u32,
}

// ============ Flags ============

/// Suspicious pattern kinds. Serialized as `{"type": ..., "details": {...}}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "details", rename_all = "snake_case")]
pub enum RedFlagKind {
    ReviewBombing(ReviewBombingDetails),
    PhraseRepetition(PhraseRepetitionDetails),
    ExcessivePositivity(ExcessivePositivityDetails),
}

impl RedFlagKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ReviewBombing(_) => "review_bombing",
            Self::PhraseRepetition(_) => "phrase_repetition",
            Self::ExcessivePositivity(_) => "excessive_positivity",
        }
    }

    pub fn review_ids(&self) -> &[String] {
        match self {
            Self::ReviewBombing(d) => &d.review_ids,
            Self::PhraseRepetition(d) => &d.review_ids,
            Self::ExcessivePositivity(d) => &d.review_ids,
        }
    }
}

/// Authenticity signal kinds.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "details", rename_all = "snake_case")]
pub enum GreenFlagKind {
    HighVerifiedPurchases(HighVerifiedPurchasesDetails),
}

impl GreenFlagKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::HighVerifiedPurchases(_) => "high_verified_purchases",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RedFlag {
    #[serde(flatten)]
    pub kind: RedFlagKind,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GreenFlag {
    #[serde(flatten)]
    pub kind: GreenFlagKind,
    pub confidence: f64,
}

impl RedFlag {
    pub fn new(kind: RedFlagKind, confidence: f64) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl GreenFlag {
    pub fn new(kind: GreenFlagKind, confidence: f64) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

// ============ Flag Sets ============

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalFlags {
    pub red_flags: Vec<RedFlag>,
    pub green_flags: Vec<GreenFlag>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatternFlags {
    pub red_flags: Vec<RedFlag>,
}

/// Merged flags handed to the scorer. Order within each list is significant.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlagSet {
    pub red_flags: Vec<RedFlag>,
    pub green_flags: Vec<GreenFlag>,
}

impl FlagSet {
    /// Local flags first, classifier-sourced red flags appended after.
    pub fn merge(local: LocalFlags, content: ContentPatternFlags) -> Self {
        let mut red_flags = local.red_flags;
        red_flags.extend(content.red_flags);
        Self {
            red_flags,
            green_flags: local.green_flags,
        }
    }
}

// ============ Assessment Response ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustAssessment {
    pub request_id: String,
    pub trust_score: u8,
    pub red_flags: Vec<RedFlag>,
    pub green_flags: Vec<GreenFlag>,
    pub review_count: usize,
    pub classifier_used: bool,
    pub version: String,
}
