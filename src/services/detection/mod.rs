// Detection Module
// Review authenticity detection organized into specialized submodules:
// - review_bombing: same-date review clusters (red flags)
// - verified_purchase: high verified-purchase ratio (green flag)
// - local_flags: runs the deterministic detectors together
// - content_patterns: LLM classification of cross-review language patterns
// - trust_score: reduces flags into a 0-100 trust score
// - assessment: concurrent local + classifier pass, merged and scored

pub mod review_bombing;
pub mod verified_purchase;
pub mod local_flags;
pub mod content_patterns;
pub mod trust_score;
pub mod assessment;

// Re-export commonly used functions
pub use review_bombing::detect_review_bombing;
pub use verified_purchase::{detect_high_verified_purchases, verified_percentage};
pub use local_flags::detect_local_flags;
pub use content_patterns::{
    analyze_content_patterns,
    parse_classifier_response,
    ClassifierError,
    FlagValidationError,
    LlmPatternClassifier,
    PatternClassifier,
};
pub use trust_score::{calculate_trust_score, list_impact, WeightedFlag};
pub use assessment::assess_reviews;

/// Round to four decimals so repeated float sums compare cleanly.
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}
