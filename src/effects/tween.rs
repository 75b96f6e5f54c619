use serde::{Deserialize, Serialize};

use crate::scene::{Channel, ObjectId, ParamTarget, VisualParameterSet};

/// Easing curves, in the power-of-t family (`power_out: 4` is a quintic ease-out).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    PowerIn(u8),
    PowerOut(u8),
    PowerInOut(u8),
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::PowerIn(power) => t.powi(power as i32 + 1),
            Easing::PowerOut(power) => 1.0 - (1.0 - t).powi(power as i32 + 1),
            Easing::PowerInOut(power) => {
                let exponent = power as i32 + 1;
                if t < 0.5 {
                    0.5 * (2.0 * t).powi(exponent)
                } else {
                    1.0 - 0.5 * (2.0 * (1.0 - t)).powi(exponent)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub duration: f64,
    pub delay: f64,
    pub easing: Easing,
}

impl Timing {
    pub fn new(duration: f64, delay: f64, easing: Easing) -> Self {
        Self { duration, delay, easing }
    }
}

/// Which part of the pipeline started a tween.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TweenKind {
    Beat,
    Drop,
}

#[derive(Debug, Clone)]
struct Tween {
    target: ParamTarget,
    kind: TweenKind,
    from: Option<f32>,
    to: f32,
    start: f64,
    duration: f64,
    easing: Easing,
}

/// Time-based animations that run beside the per-frame beat mapping.
///
/// Tweens capture their starting value when their delay elapses and write the
/// eased value on every [`Timeline::advance`]. Per-frame mapping may write the
/// same parameters in between; whichever writes last wins for that frame.
#[derive(Debug, Default)]
pub struct Timeline {
    tweens: Vec<Tween>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animate `target` to `to`. Any running tween on the same parameter is replaced.
    pub fn tween(&mut self, target: ParamTarget, to: f32, timing: Timing, kind: TweenKind, now: f64) {
        self.kill(target);
        self.tweens.push(Tween {
            target,
            kind,
            from: None,
            to,
            start: now + timing.delay.max(0.0),
            duration: timing.duration.max(0.0),
            easing: timing.easing,
        });
    }

    pub fn kill(&mut self, target: ParamTarget) {
        self.tweens.retain(|t| t.target != target);
    }

    pub fn kill_channel(&mut self, object: ObjectId, channel: Channel) {
        self.tweens.retain(|t| {
            !matches!(t.target, ParamTarget::Object { id, channel: c, .. } if id == object && c == channel)
        });
    }

    pub fn advance(&mut self, now: f64, params: &mut VisualParameterSet) {
        self.tweens.retain_mut(|tween| {
            if now < tween.start {
                return true;
            }

            let from = *tween.from.get_or_insert_with(|| params.value(tween.target));
            let progress = if tween.duration <= 0.0 {
                1.0
            } else {
                ((now - tween.start) / tween.duration).clamp(0.0, 1.0)
            };

            *params.value_mut(tween.target) = from + (tween.to - from) * tween.easing.apply(progress as f32);
            progress < 1.0
        });
    }

    pub fn has_active(&self, kind: TweenKind) -> bool {
        self.tweens.iter().any(|t| t.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn clear(&mut self) {
        self.tweens.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Axis, CameraSpec, ObjectSpec, SceneLayout};
    use glam::Vec3;

    fn params() -> VisualParameterSet {
        VisualParameterSet::from_layout(&SceneLayout {
            camera: CameraSpec {
                position: Vec3::new(0.0, 0.0, 2400.0),
                look_at: Vec3::ZERO,
            },
            objects: vec![ObjectSpec::new("sphere", Vec3::ZERO)],
            bars: None,
        })
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::PowerIn(2),
            Easing::PowerOut(4),
            Easing::PowerInOut(2),
        ] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6);
        }
        assert!((Easing::PowerInOut(3).apply(0.5) - 0.5).abs() < 1e-6);
        assert!(Easing::PowerOut(4).apply(0.2) > 0.2);
    }

    #[test]
    fn test_tween_reaches_target_and_finishes() {
        let mut params = params();
        let mut timeline = Timeline::new();
        let target = ParamTarget::CameraPosition(Axis::Z);

        timeline.tween(target, 2000.0, Timing::new(2.0, 0.0, Easing::Linear), TweenKind::Drop, 10.0);
        timeline.advance(11.0, &mut params);
        assert!((params.camera().position.z - 2200.0).abs() < 1e-3);
        assert!(timeline.has_active(TweenKind::Drop));

        timeline.advance(12.5, &mut params);
        assert_eq!(params.camera().position.z, 2000.0);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_delay_defers_start_value_capture() {
        let mut params = params();
        let mut timeline = Timeline::new();
        let target = ParamTarget::CameraLookAt(Axis::X);

        timeline.tween(target, 100.0, Timing::new(1.0, 2.0, Easing::Linear), TweenKind::Drop, 0.0);
        timeline.advance(1.0, &mut params);
        assert_eq!(params.camera().look_at.x, 0.0);

        // Someone else moves the value before the tween begins
        *params.value_mut(target) = 50.0;
        timeline.advance(2.5, &mut params);
        assert!((params.camera().look_at.x - 75.0).abs() < 1e-3);
    }

    #[test]
    fn test_new_tween_overwrites_same_target() {
        let mut params = params();
        let mut timeline = Timeline::new();
        let sphere = params.find("sphere").unwrap();
        let target = ParamTarget::Object {
            id: sphere,
            channel: Channel::Rotation,
            axis: Axis::X,
        };

        timeline.tween(target, 5.0, Timing::new(1.0, 0.0, Easing::Linear), TweenKind::Beat, 0.0);
        timeline.tween(target, -5.0, Timing::new(1.0, 0.0, Easing::Linear), TweenKind::Beat, 0.0);
        assert_eq!(timeline.len(), 1);

        timeline.advance(1.0, &mut params);
        assert_eq!(params.get(sphere).rotation.x, -5.0);

        timeline.tween(target, 1.0, Timing::new(1.0, 0.0, Easing::Linear), TweenKind::Beat, 1.0);
        timeline.kill_channel(sphere, Channel::Rotation);
        assert!(timeline.is_empty());
    }
}
