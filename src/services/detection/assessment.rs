// Review Batch Assessment
// Runs local detectors and the content classifier concurrently, merges their
// flags (local first) and scores the result

use crate::models::{ContentPatternFlags, FlagSet, Review, TrustAssessment};
use std::time::Instant;
use tracing::info;

use super::content_patterns::{analyze_content_patterns, PatternClassifier};
use super::local_flags::detect_local_flags;
use super::trust_score::calculate_trust_score;

pub async fn assess_reviews(
    reviews: &[Review],
    classifier: Option<&dyn PatternClassifier>,
) -> TrustAssessment {
    let started = Instant::now();

    let local = async { detect_local_flags(reviews) };
    let content = async {
        match classifier {
            Some(c) => analyze_content_patterns(c, reviews).await,
            None => ContentPatternFlags::default(),
        }
    };
    let (local, content) = tokio::join!(local, content);

    let flags = FlagSet::merge(local, content);
    let trust_score = calculate_trust_score(&flags);
    let request_id = uuid::Uuid::new_v4().to_string();

    info!(
        request_id = %request_id,
        reviews = reviews.len(),
        red_flags = flags.red_flags.len(),
        green_flags = flags.green_flags.len(),
        trust_score,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "assessment.completed"
    );

    TrustAssessment {
        request_id,
        trust_score,
        red_flags: flags.red_flags,
        green_flags: flags.green_flags,
        review_count: reviews.len(),
        classifier_used: classifier.is_some(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RedFlagKind;
    use crate::services::detection::content_patterns::tests::FakeClassifier;
    use serde_json::json;

    fn bombed_batch() -> Vec<Review> {
        (1..=5)
            .map(|i| Review::new(format!("r{}", i), 5.0, "Best product ever!").dated("2024-01-15"))
            .collect()
    }

    #[tokio::test]
    async fn test_local_only_assessment() {
        let reviews: Vec<Review> = (0..10)
            .map(|i| Review::new(format!("r{}", i), 4.0, "Works as described").verified(true))
            .collect();

        let assessment = assess_reviews(&reviews, None).await;
        assert_eq!(assessment.trust_score, 69);
        assert!(assessment.red_flags.is_empty());
        assert_eq!(assessment.green_flags.len(), 1);
        assert_eq!(assessment.review_count, 10);
        assert!(!assessment.classifier_used);
    }

    #[tokio::test]
    async fn test_classifier_flags_appended_after_local_flags() {
        let fake = FakeClassifier::replying(json!({
            "redFlags": [
                {"type": "phrase_repetition", "confidence": 0.7,
                 "details": {"phrase": "best product ever", "reviewIds": ["r1", "r2", "r3"]}},
                {"type": "excessive_positivity", "confidence": 0.6,
                 "details": {"reviewIds": ["r4"], "keywords": ["best"]}}
            ]
        }));

        let assessment = assess_reviews(&bombed_batch(), Some(&fake)).await;
        let kinds: Vec<&str> = assessment.red_flags.iter().map(|f| f.kind.type_name()).collect();
        assert_eq!(kinds, vec!["review_bombing", "phrase_repetition", "excessive_positivity"]);
        assert!(assessment.trust_score < 20);
        assert!(assessment.classifier_used);
    }

    #[tokio::test]
    async fn test_classifier_outage_falls_back_to_local_flags() {
        let fake = FakeClassifier::raw(Err("connection reset".to_string()));
        let degraded = assess_reviews(&bombed_batch(), Some(&fake)).await;
        let local = assess_reviews(&bombed_batch(), None).await;

        assert_eq!(degraded.red_flags, local.red_flags);
        assert_eq!(degraded.trust_score, local.trust_score);
        assert!(matches!(degraded.red_flags[0].kind, RedFlagKind::ReviewBombing(_)));
        // 50 - 25 * 0.9 = 27.5
        assert_eq!(local.trust_score, 28);
    }

    #[tokio::test]
    async fn test_response_serializes_camel_case() {
        let assessment = assess_reviews(&bombed_batch(), None).await;
        let value = serde_json::to_value(&assessment).unwrap();
        assert!(value.get("trustScore").is_some());
        assert!(value.get("requestId").is_some());
        assert_eq!(value["redFlags"][0]["type"], "review_bombing");
        assert_eq!(value["redFlags"][0]["details"]["reviewCount"], 5);
    }
}
