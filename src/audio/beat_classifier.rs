use serde::{Deserialize, Serialize};

use super::energy::normalized_level;
use super::FrequencySnapshot;

/// Half-open intensity interval `[lo, hi)`; `hi: None` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    pub lo: f32,
    #[serde(default)]
    pub hi: Option<f32>,
}

impl Band {
    pub fn new(name: impl Into<String>, lo: f32, hi: Option<f32>) -> Self {
        Self {
            name: name.into(),
            lo,
            hi,
        }
    }

    pub fn contains(&self, intensity: f32) -> bool {
        intensity >= self.lo && self.hi.map_or(true, |hi| intensity < hi)
    }
}

/// Which band a bin landed in. `NoOp` is a real outcome, not a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandMatch {
    Band(usize),
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinOutcome {
    pub index: usize,
    pub value: u8,
    pub intensity: f32,
    pub band: BandMatch,
}

/// Ordered band list evaluated first-match-wins.
#[derive(Debug, Clone, Default)]
pub struct BeatClassifier {
    bands: Vec<Band>,
}

impl BeatClassifier {
    pub fn new(bands: Vec<Band>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn select(&self, intensity: f32) -> BandMatch {
        self.bands
            .iter()
            .position(|band| band.contains(intensity))
            .map_or(BandMatch::NoOp, BandMatch::Band)
    }

    /// One outcome per bin, in bin order.
    pub fn classify(&self, average: f32, snapshot: &FrequencySnapshot) -> Vec<BinOutcome> {
        let level = normalized_level(average);

        snapshot
            .bins()
            .iter()
            .enumerate()
            .map(|(index, &value)| {
                let intensity = level * value as f32;
                BinOutcome {
                    index,
                    value,
                    intensity,
                    band: self.select(intensity),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::EnergyReducer;

    fn classifier() -> BeatClassifier {
        BeatClassifier::new(vec![
            Band::new("surge", 200.0, None),
            Band::new("pulse", 136.0, None),
            Band::new("ripple", 1.0, Some(136.0)),
        ])
    }

    #[test]
    fn test_one_outcome_per_bin_in_order() {
        let snapshot = FrequencySnapshot::new((0..32).map(|i| (i * 7) as u8).collect());
        let outcomes = classifier().classify(64.0, &snapshot);

        assert_eq!(outcomes.len(), 32);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.value, snapshot.bins()[i]);
        }
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        // 250 is inside both "surge" and "pulse"
        assert_eq!(classifier().select(250.0), BandMatch::Band(0));
        assert_eq!(classifier().select(150.0), BandMatch::Band(1));
        assert_eq!(classifier().select(135.9), BandMatch::Band(2));
    }

    #[test]
    fn test_unmatched_intensity_is_noop() {
        assert_eq!(classifier().select(0.5), BandMatch::NoOp);
        assert_eq!(BeatClassifier::default().select(100.0), BandMatch::NoOp);
    }

    #[test]
    fn test_all_zero_snapshot_resolves_to_noop() {
        let snapshot = FrequencySnapshot::silent(32);
        let average = EnergyReducer::reduce(&snapshot);
        let outcomes = classifier().classify(average, &snapshot);

        assert_eq!(average, 0.0);
        assert!(outcomes.iter().all(|o| o.intensity == 0.0 && o.band == BandMatch::NoOp));
    }

    #[test]
    fn test_intensity_uses_normalized_level() {
        let snapshot = FrequencySnapshot::new(vec![140]);
        let outcomes = classifier().classify(64.0, &snapshot);
        assert_eq!(outcomes[0].intensity, 140.0);
        assert_eq!(outcomes[0].band, BandMatch::Band(1));
    }

    #[test]
    fn test_band_bounds_are_half_open() {
        let band = Band::new("low", 1.0, Some(136.0));
        assert!(band.contains(1.0));
        assert!(!band.contains(136.0));
        assert!(Band::new("open", 136.0, None).contains(10_000.0));
    }
}
