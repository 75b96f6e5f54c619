use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Authored starting state of a scene: named objects, an optional row of
/// spectrum bars (one per analysis bin) and the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    pub camera: CameraSpec,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub bars: Option<BarRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub position: Vec3,
    #[serde(default)]
    pub look_at: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

impl ObjectSpec {
    pub fn new(name: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            position,
            scale: Vec3::ONE,
        }
    }
}

/// Bars laid out along +X from `origin`, `spacing` apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarRow {
    pub count: usize,
    pub origin: Vec3,
    pub spacing: f32,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}
