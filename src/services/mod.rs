// reviewGuard Core Services

pub mod config_store;
pub mod providers;
pub mod detection;

pub use config_store::*;
pub use providers::*;

pub use detection::{
    analyze_content_patterns,
    assess_reviews,
    calculate_trust_score,
    detect_high_verified_purchases,
    detect_local_flags,
    detect_review_bombing,
    ClassifierError,
    FlagValidationError,
    LlmPatternClassifier,
    PatternClassifier,
};
