// Review Bombing Detection
// Flags abnormally large clusters of reviews posted on the same date

use crate::models::{RedFlag, RedFlagKind, Review, ReviewBombingDetails};
use std::collections::HashMap;
use tracing::debug;

use super::round4;

/// Smallest same-date group that counts as a cluster.
const MIN_CLUSTER_SIZE: usize = 4;
/// Same date string is treated as one day; no timestamp windowing.
pub const CLUSTER_HOURS_SPAN: u32 = 24;

const BASE_CONFIDENCE: f64 = 0.5;

fn size_bonus(count: usize) -> f64 {
    if count >= 10 {
        0.2
    } else if count >= 5 {
        0.1
    } else {
        0.0
    }
}

fn unverified_bonus(unverified_ratio: f64) -> f64 {
    if unverified_ratio > 0.7 {
        0.2
    } else if unverified_ratio > 0.5 {
        0.1
    } else {
        0.0
    }
}

/// Group dated reviews by exact date string, preserving first-seen date order
/// and original batch order within each group. Undated reviews are skipped.
fn group_by_date(reviews: &[Review]) -> Vec<(&str, Vec<&Review>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&Review>)> = Vec::new();

    for review in reviews {
        let Some(date) = review.date.as_deref() else {
            continue;
        };
        match index.get(date) {
            Some(&slot) => groups[slot].1.push(review),
            None => {
                index.insert(date, groups.len());
                groups.push((date, vec![review]));
            }
        }
    }

    groups
}

fn cluster_confidence(group: &[&Review]) -> f64 {
    let count = group.len();
    let unverified = group.iter().filter(|r| !r.verified).count();
    let unverified_ratio = unverified as f64 / count as f64;
    let same_rating = group.windows(2).all(|w| w[0].rating == w[1].rating);

    let mut confidence = BASE_CONFIDENCE + size_bonus(count) + unverified_bonus(unverified_ratio);
    if same_rating {
        confidence += 0.1;
    }
    round4(confidence.min(1.0))
}

/// Emit one `review_bombing` red flag per date with at least four reviews.
pub fn detect_review_bombing(reviews: &[Review]) -> Vec<RedFlag> {
    let flags: Vec<RedFlag> = group_by_date(reviews)
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_CLUSTER_SIZE)
        .map(|(date, group)| {
            let confidence = cluster_confidence(&group);
            RedFlag::new(
                RedFlagKind::ReviewBombing(ReviewBombingDetails {
                    date: date.to_string(),
                    review_count: group.len(),
                    hours_span: CLUSTER_HOURS_SPAN,
                    review_ids: group.iter().map(|r| r.id.clone()).collect(),
                }),
                confidence,
            )
        })
        .collect();

    debug!(
        reviews = reviews.len(),
        clusters = flags.len(),
        "review_bombing.detected"
    );
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(id: &str, date: &str, rating: f64, verified: bool) -> Review {
        Review::new(id, rating, "text").dated(date).verified(verified)
    }

    fn details(flag: &RedFlag) -> &ReviewBombingDetails {
        match &flag.kind {
            RedFlagKind::ReviewBombing(d) => d,
            other => panic!("unexpected flag kind {}", other.type_name()),
        }
    }

    #[test]
    fn test_five_unverified_same_rating_cluster() {
        let reviews: Vec<Review> = (0..5)
            .map(|i| dated(&format!("r{}", i), "2024-01-15", 5.0, false))
            .collect();

        let flags = detect_review_bombing(&reviews);
        assert_eq!(flags.len(), 1);
        let d = details(&flags[0]);
        assert_eq!(d.review_count, 5);
        assert_eq!(d.hours_span, 24);
        assert_eq!(d.date, "2024-01-15");
        assert_eq!(d.review_ids, vec!["r0", "r1", "r2", "r3", "r4"]);
        assert!((flags[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_groups_of_three_or_fewer_never_flag() {
        let reviews = vec![
            dated("a", "2024-01-15", 5.0, false),
            dated("b", "2024-01-15", 5.0, false),
            dated("c", "2024-01-15", 5.0, false),
        ];
        assert!(detect_review_bombing(&reviews).is_empty());
    }

    #[test]
    fn test_size_four_minimal_confidence() {
        let reviews = vec![
            dated("a", "d1", 5.0, true),
            dated("b", "d1", 4.0, true),
            dated("c", "d1", 3.0, true),
            dated("d", "d1", 2.0, false),
        ];
        let flags = detect_review_bombing(&reviews);
        assert_eq!(flags.len(), 1);
        assert!((flags[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_large_cluster_confidence_capped_at_one() {
        let reviews: Vec<Review> = (0..12)
            .map(|i| dated(&format!("r{}", i), "d1", 1.0, false))
            .collect();
        let flags = detect_review_bombing(&reviews);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].confidence, 1.0);
    }

    #[test]
    fn test_unverified_ratio_between_half_and_seventy_percent() {
        // 6 reviews, 4 unverified => ratio 0.667 => +0.1, size >= 5 => +0.1, mixed ratings
        let reviews = vec![
            dated("a", "d1", 5.0, false),
            dated("b", "d1", 4.0, false),
            dated("c", "d1", 5.0, false),
            dated("d", "d1", 5.0, false),
            dated("e", "d1", 5.0, true),
            dated("f", "d1", 5.0, true),
        ];
        let flags = detect_review_bombing(&reviews);
        assert!((flags[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_size_bonus_edges() {
        // all verified, mixed ratings: only the size bonus moves
        let cluster = |n: usize| -> Vec<Review> {
            (0..n)
                .map(|i| dated(&format!("r{}", i), "d1", if i == 0 { 1.0 } else { 5.0 }, true))
                .collect()
        };
        assert!((detect_review_bombing(&cluster(4))[0].confidence - 0.5).abs() < 1e-9);
        assert!((detect_review_bombing(&cluster(5))[0].confidence - 0.6).abs() < 1e-9);
        assert!((detect_review_bombing(&cluster(9))[0].confidence - 0.6).abs() < 1e-9);
        assert!((detect_review_bombing(&cluster(10))[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_unverified_ratio_edges_are_strict() {
        // 10 reviews, mixed ratings => base 0.5 + size 0.2
        let cluster = |unverified: usize| -> Vec<Review> {
            (0..10)
                .map(|i| dated(&format!("r{}", i), "d1", if i == 0 { 1.0 } else { 5.0 }, i >= unverified))
                .collect()
        };
        // exactly 0.5 gets no bonus, exactly 0.7 only the lower one
        assert!((detect_review_bombing(&cluster(5))[0].confidence - 0.7).abs() < 1e-9);
        assert!((detect_review_bombing(&cluster(6))[0].confidence - 0.8).abs() < 1e-9);
        assert!((detect_review_bombing(&cluster(7))[0].confidence - 0.8).abs() < 1e-9);
        assert!((detect_review_bombing(&cluster(8))[0].confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_undated_reviews_excluded_from_groups() {
        let mut reviews: Vec<Review> = (0..3)
            .map(|i| dated(&format!("r{}", i), "d1", 5.0, false))
            .collect();
        reviews.push(Review::new("undated-1", 5.0, "text"));
        reviews.push(Review::new("undated-2", 5.0, "text"));
        assert!(detect_review_bombing(&reviews).is_empty());

        reviews.push(dated("r3", "d1", 5.0, false));
        let flags = detect_review_bombing(&reviews);
        assert_eq!(flags.len(), 1);
        let d = details(&flags[0]);
        assert_eq!(d.review_count, 4);
        assert!(!d.review_ids.iter().any(|id| id.starts_with("undated")));
    }

    #[test]
    fn test_each_qualifying_date_flags_independently_in_first_seen_order() {
        let mut reviews = Vec::new();
        for i in 0..4 {
            reviews.push(dated(&format!("b{}", i), "2024-02-01", 5.0, true));
            reviews.push(dated(&format!("a{}", i), "2024-01-01", 5.0, true));
        }
        reviews.push(dated("lonely", "2024-03-01", 5.0, true));

        let flags = detect_review_bombing(&reviews);
        assert_eq!(flags.len(), 2);
        assert_eq!(details(&flags[0]).date, "2024-02-01");
        assert_eq!(details(&flags[1]).date, "2024-01-01");
    }

    #[test]
    fn test_date_equality_is_exact_string_match() {
        let reviews = vec![
            dated("a", "2024-01-15", 5.0, false),
            dated("b", "2024-01-15", 5.0, false),
            dated("c", "2024-01-15T10:00:00Z", 5.0, false),
            dated("d", "Jan 15, 2024", 5.0, false),
        ];
        assert!(detect_review_bombing(&reviews).is_empty());
    }

    #[test]
    fn test_rerun_is_identical() {
        let reviews: Vec<Review> = (0..7)
            .map(|i| dated(&format!("r{}", i), "d1", 5.0, i % 2 == 0))
            .collect();
        let first = serde_json::to_string(&detect_review_bombing(&reviews)).unwrap();
        let second = serde_json::to_string(&detect_review_bombing(&reviews)).unwrap();
        assert_eq!(first, second);
    }
}
