pub mod frame;
pub mod layout;
pub mod params;

pub use frame::{FrameHandle, FrameQueue, FrameScheduler};
pub use layout::{BarRow, CameraSpec, ObjectSpec, SceneLayout};
pub use params::{Axis, CameraPose, Channel, ObjectId, ObjectParams, ParamTarget, VisualParameterSet};
