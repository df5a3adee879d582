// Trust Score Calculation
// Reduces merged red/green flags into one 0-100 integer

use crate::models::{FlagSet, GreenFlag, GreenFlagKind, RedFlag, RedFlagKind};

const BASE_SCORE: f64 = 50.0;
const RED_DECAY: f64 = 0.8;
const GREEN_DECAY: f64 = 0.9;
/// More than this many red flags triggers the pile-on multiplier.
const PILE_ON_THRESHOLD: usize = 2;
const PILE_ON_FACTOR: f64 = 0.8;

/// A flag that contributes a signed, confidence-scaled impact to the score.
pub trait WeightedFlag {
    fn weight(&self) -> f64;
    fn confidence(&self) -> f64;
}

impl WeightedFlag for RedFlag {
    fn weight(&self) -> f64 {
        match self.kind {
            RedFlagKind::ReviewBombing(_) => -25.0,
            RedFlagKind::PhraseRepetition(_) => -15.0,
            RedFlagKind::ExcessivePositivity(_) => -10.0,
        }
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl WeightedFlag for GreenFlag {
    fn weight(&self) -> f64 {
        match self.kind {
            GreenFlagKind::HighVerifiedPurchases(_) => 20.0,
        }
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Sum of impacts for one polarity list. Decay is positional: the flag at
/// index `i` is scaled by `decay^i` whatever its kind.
pub fn list_impact<F: WeightedFlag>(flags: &[F], decay: f64) -> f64 {
    flags
        .iter()
        .enumerate()
        .map(|(i, flag)| flag.weight() * flag.confidence() * decay.powi(i as i32))
        .sum()
}

pub fn calculate_trust_score(flags: &FlagSet) -> u8 {
    let mut score = BASE_SCORE
        + list_impact(&flags.red_flags, RED_DECAY)
        + list_impact(&flags.green_flags, GREEN_DECAY);

    if flags.red_flags.len() > PILE_ON_THRESHOLD {
        score *= PILE_ON_FACTOR;
    }

    score.round().clamp(0.0, 100.0) as u8
}
