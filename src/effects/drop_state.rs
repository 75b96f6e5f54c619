use serde::Serialize;

/// One-shot drop sequence of a track.
///
/// `Idle -> Armed` once the time gate has passed and the arm band is hit,
/// `Armed -> Consumed` when the release band is hit. `Consumed` is terminal
/// until the pipeline is rebuilt for another track.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DropState {
    #[default]
    Idle,
    Armed { armed_at: f64 },
    Consumed { released_at: f64 },
}

impl DropState {
    /// Arm if idle and `elapsed` is strictly past `min_elapsed`.
    pub fn arm(self, elapsed: f64, min_elapsed: f64) -> Self {
        match self {
            DropState::Idle if elapsed > min_elapsed => DropState::Armed { armed_at: elapsed },
            other => other,
        }
    }

    /// Consume an armed drop. The flag tells the caller to launch the transition.
    pub fn release(self, elapsed: f64) -> (Self, bool) {
        match self {
            DropState::Armed { .. } => (DropState::Consumed { released_at: elapsed }, true),
            other => (other, false),
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, DropState::Armed { .. })
    }

    pub fn is_consumed(&self) -> bool {
        matches!(self, DropState::Consumed { .. })
    }
}
