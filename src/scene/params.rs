use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::layout::SceneLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn of(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    pub fn of_mut(self, v: &mut Vec3) -> &mut f32 {
        match self {
            Axis::X => &mut v.x,
            Axis::Y => &mut v.y,
            Axis::Z => &mut v.z,
        }
    }
}

/// Opaque index of an object in a [`VisualParameterSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectParams {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub opacity: f32,
    pub color: Vec3,
}

impl ObjectParams {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            opacity: 1.0,
            color: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Position,
    Rotation,
    Scale,
}

/// A single animatable scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamTarget {
    Object { id: ObjectId, channel: Channel, axis: Axis },
    CameraPosition(Axis),
    CameraLookAt(Axis),
}

/// The renderer's table of visual parameters.
///
/// The renderer builds it from a [`SceneLayout`] and reads it every frame; the
/// pipeline only writes through the crate-private mutators and refers to
/// entries by [`ObjectId`].
#[derive(Debug, Clone)]
pub struct VisualParameterSet {
    names: Vec<String>,
    objects: Vec<ObjectParams>,
    defaults: Vec<ObjectParams>,
    bars: Vec<ObjectId>,
    camera: CameraPose,
    default_camera: CameraPose,
}

impl VisualParameterSet {
    pub fn from_layout(layout: &SceneLayout) -> Self {
        let mut names = Vec::new();
        let mut objects = Vec::new();
        let mut bars = Vec::new();

        for spec in &layout.objects {
            names.push(spec.name.clone());
            objects.push(ObjectParams {
                scale: spec.scale,
                ..ObjectParams::at(spec.position)
            });
        }

        if let Some(row) = &layout.bars {
            for i in 0..row.count {
                bars.push(ObjectId(objects.len()));
                names.push(format!("bar{}", i));
                objects.push(ObjectParams::at(row.origin + Vec3::X * row.spacing * i as f32));
            }
        }

        let camera = CameraPose {
            position: layout.camera.position,
            look_at: layout.camera.look_at,
        };

        Self {
            names,
            defaults: objects.clone(),
            objects,
            bars,
            camera,
            default_camera: camera,
        }
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.names.iter().position(|n| n == name).map(ObjectId)
    }

    pub fn name(&self, id: ObjectId) -> &str {
        &self.names[id.0]
    }

    pub fn get(&self, id: ObjectId) -> &ObjectParams {
        &self.objects[id.0]
    }

    pub fn bars(&self) -> &[ObjectId] {
        &self.bars
    }

    pub fn camera(&self) -> &CameraPose {
        &self.camera
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectParams)> {
        self.names.iter().map(String::as_str).zip(self.objects.iter())
    }

    /// True when nothing differs from the authored layout.
    pub fn is_pristine(&self) -> bool {
        self.objects == self.defaults && self.camera == self.default_camera
    }

    /// Drop every mutation and return to the authored layout, in place.
    pub fn restore_defaults(&mut self) {
        self.objects.copy_from_slice(&self.defaults);
        self.camera = self.default_camera;
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut ObjectParams {
        &mut self.objects[id.0]
    }

    pub(crate) fn value(&self, target: ParamTarget) -> f32 {
        match target {
            ParamTarget::Object { id, channel, axis } => {
                let object = &self.objects[id.0];
                axis.of(match channel {
                    Channel::Position => object.position,
                    Channel::Rotation => object.rotation,
                    Channel::Scale => object.scale,
                })
            }
            ParamTarget::CameraPosition(axis) => axis.of(self.camera.position),
            ParamTarget::CameraLookAt(axis) => axis.of(self.camera.look_at),
        }
    }

    pub(crate) fn value_mut(&mut self, target: ParamTarget) -> &mut f32 {
        match target {
            ParamTarget::Object { id, channel, axis } => {
                let object = &mut self.objects[id.0];
                axis.of_mut(match channel {
                    Channel::Position => &mut object.position,
                    Channel::Rotation => &mut object.rotation,
                    Channel::Scale => &mut object.scale,
                })
            }
            ParamTarget::CameraPosition(axis) => axis.of_mut(&mut self.camera.position),
            ParamTarget::CameraLookAt(axis) => axis.of_mut(&mut self.camera.look_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::layout::{BarRow, CameraSpec, ObjectSpec};

    fn layout() -> SceneLayout {
        SceneLayout {
            camera: CameraSpec {
                position: Vec3::new(0.0, 0.0, 2400.0),
                look_at: Vec3::ZERO,
            },
            objects: vec![ObjectSpec::new("sphere", Vec3::ZERO)],
            bars: Some(BarRow {
                count: 4,
                origin: Vec3::new(-80.0, -100.0, 2000.0),
                spacing: 4.75,
            }),
        }
    }

    #[test]
    fn test_layout_builds_named_objects_and_bars() {
        let params = VisualParameterSet::from_layout(&layout());

        assert_eq!(params.len(), 5);
        assert_eq!(params.bars().len(), 4);
        assert_eq!(params.find("sphere"), Some(ObjectId(0)));
        assert_eq!(params.find("missing"), None);

        let last_bar = params.get(params.bars()[3]);
        assert!((last_bar.position.x - (-80.0 + 3.0 * 4.75)).abs() < 1e-4);
        assert_eq!(params.name(params.bars()[1]), "bar1");

        let names: Vec<&str> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["sphere", "bar0", "bar1", "bar2", "bar3"]);
        assert!(params.iter().all(|(_, object)| object.opacity == 1.0));
    }

    #[test]
    fn test_restore_defaults_discards_mutations() {
        let mut params = VisualParameterSet::from_layout(&layout());
        let sphere = params.find("sphere").unwrap();

        params.object_mut(sphere).rotation.x = 1.2;
        *params.value_mut(ParamTarget::CameraPosition(Axis::Z)) = 10.0;
        assert!(!params.is_pristine());

        params.restore_defaults();
        assert!(params.is_pristine());
        assert_eq!(params.camera().position.z, 2400.0);
    }

    #[test]
    fn test_param_target_addresses_one_scalar() {
        let mut params = VisualParameterSet::from_layout(&layout());
        let sphere = params.find("sphere").unwrap();
        let target = ParamTarget::Object {
            id: sphere,
            channel: Channel::Scale,
            axis: Axis::Y,
        };

        *params.value_mut(target) = 3.0;
        assert_eq!(params.value(target), 3.0);
        assert_eq!(params.get(sphere).scale, Vec3::new(1.0, 3.0, 1.0));
    }
}
