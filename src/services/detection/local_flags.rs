// Local Flag Aggregation
// Runs the deterministic detectors over one batch; no I/O

use crate::models::{LocalFlags, Review};

use super::review_bombing::detect_review_bombing;
use super::verified_purchase::detect_high_verified_purchases;

pub fn detect_local_flags(reviews: &[Review]) -> LocalFlags {
    LocalFlags {
        red_flags: detect_review_bombing(reviews),
        green_flags: detect_high_verified_purchases(reviews),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GreenFlagKind, RedFlagKind};

    #[test]
    fn test_empty_batch_yields_no_flags() {
        assert_eq!(detect_local_flags(&[]), LocalFlags::default());
    }

    #[test]
    fn test_combines_both_detectors() {
        let reviews: Vec<Review> = (0..10)
            .map(|i| Review::new(format!("r{}", i), 5.0, "text").dated("2024-01-15").verified(true))
            .collect();

        let flags = detect_local_flags(&reviews);
        assert_eq!(flags.red_flags.len(), 1);
        assert!(matches!(flags.red_flags[0].kind, RedFlagKind::ReviewBombing(_)));
        assert_eq!(flags.green_flags.len(), 1);
        assert!(matches!(
            flags.green_flags[0].kind,
            GreenFlagKind::HighVerifiedPurchases(_)
        ));
    }

    #[test]
    fn test_deterministic() {
        let reviews: Vec<Review> = (0..8)
            .map(|i| {
                Review::new(format!("r{}", i), (i % 5 + 1) as f64, "text")
                    .dated(if i < 5 { "d1" } else { "d2" })
                    .verified(i % 3 != 0)
            })
            .collect();
        assert_eq!(detect_local_flags(&reviews), detect_local_flags(&reviews));
    }
}
