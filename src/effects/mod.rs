pub mod drop_state;
pub mod mapper;
pub mod tween;
pub mod variant;

pub use drop_state::DropState;
pub use mapper::{FrameReport, VisualParameterMapper};
pub use tween::{Easing, Timeline, Timing, TweenKind};
pub use variant::{Action, BandRule, Bounds, DropConfig, LevelSource, TargetRef, VariantConfig, BUILTIN_VARIANTS};
