pub mod audio;
pub mod effects;
pub mod error;
pub mod player;
pub mod scene;
pub mod stage;

pub use error::{StageError, StageResult};
pub use stage::{Stage, StagePhase, TrackSession};
