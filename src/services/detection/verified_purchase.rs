// Verified Purchase Detection
// Rewards batches dominated by verified purchases

use crate::models::{GreenFlag, GreenFlagKind, HighVerifiedPurchasesDetails, Review};
use tracing::debug;

const MIN_VERIFIED_PERCENTAGE: u32 = 70;

/// Confidence band for a verified-purchase percentage already known to be >= 70.
fn banded_confidence(percentage: u32) -> f64 {
    match percentage {
        p if p >= 90 => 0.95,
        p if p >= 85 => 0.85,
        p if p >= 80 => 0.75,
        p if p >= 75 => 0.65,
        _ => 0.55,
    }
}

pub fn verified_percentage(reviews: &[Review]) -> Option<u32> {
    if reviews.is_empty() {
        return None;
    }
    let verified = reviews.iter().filter(|r| r.verified).count();
    Some((100.0 * verified as f64 / reviews.len() as f64).round() as u32)
}

/// Emit a single `high_verified_purchases` green flag when at least 70% of the
/// batch is verified. Below that there is no partial credit.
pub fn detect_high_verified_purchases(reviews: &[Review]) -> Vec<GreenFlag> {
    let Some(percentage) = verified_percentage(reviews) else {
        return Vec::new();
    };

    debug!(reviews = reviews.len(), percentage, "verified_purchases.ratio");

    if percentage < MIN_VERIFIED_PERCENTAGE {
        return Vec::new();
    }

    vec![GreenFlag::new(
        GreenFlagKind::HighVerifiedPurchases(HighVerifiedPurchasesDetails { percentage }),
        banded_confidence(percentage),
    )]
}
