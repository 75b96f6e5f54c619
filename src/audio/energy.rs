use super::FrequencySnapshot;

/// Divisor that turns an average byte level into the normalized level.
pub const NORMALIZATION_DIVISOR: f32 = 64.0;

pub struct EnergyReducer;

impl EnergyReducer {
    /// Arithmetic mean of the snapshot. An empty snapshot reduces to 0.
    pub fn reduce(snapshot: &FrequencySnapshot) -> f32 {
        if snapshot.is_empty() {
            return 0.0;
        }

        let sum: u32 = snapshot.bins().iter().map(|&b| b as u32).sum();
        sum as f32 / snapshot.len() as f32
    }
}

/// `average / 64`, deliberately unclamped: loud passages exceed 1.0.
pub fn normalized_level(average: f32) -> f32 {
    average / NORMALIZATION_DIVISOR
}
