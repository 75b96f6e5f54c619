use glam::Vec3;
use log::{info, trace};
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;

use super::drop_state::DropState;
use super::tween::{Timeline, Timing, TweenKind};
use super::variant::{LevelSource, ResolvedAction, ResolvedDrop, ResolvedVariant, Target, VariantConfig};
use crate::audio::{BandMatch, BeatClassifier, BinOutcome};
use crate::error::StageResult;
use crate::scene::{Axis, Channel, ObjectId, ParamTarget, VisualParameterSet};

/// What one frame of mapping did, for logging, traces and tests.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub elapsed: f64,
    pub energy: f32,
    /// Bins that landed in each band, in band order.
    pub band_hits: Vec<usize>,
    pub noop_hits: usize,
    pub armed: bool,
    pub released: bool,
    pub drop_state: DropState,
}

struct MapperState<R> {
    drop: DropState,
    rng: R,
}

/// Applies a variant's band table to the renderer's parameters, bin by bin.
pub struct VisualParameterMapper<R = StdRng> {
    classifier: BeatClassifier,
    variant: ResolvedVariant,
    state: MapperState<R>,
}

impl<R: Rng> VisualParameterMapper<R> {
    pub fn new(config: &VariantConfig, params: &VisualParameterSet, rng: R) -> StageResult<Self> {
        Ok(Self {
            classifier: config.classifier(),
            variant: config.resolve(params)?,
            state: MapperState {
                drop: DropState::Idle,
                rng,
            },
        })
    }

    pub fn classifier(&self) -> &BeatClassifier {
        &self.classifier
    }

    pub fn drop_state(&self) -> DropState {
        self.state.drop
    }

    pub fn map_frame(
        &mut self,
        elapsed: f64,
        energy: f32,
        outcomes: &[BinOutcome],
        params: &mut VisualParameterSet,
        timeline: &mut Timeline,
    ) -> FrameReport {
        let Self { variant, state, .. } = self;
        let drop = variant.drop.as_ref();

        let mut report = FrameReport {
            elapsed,
            energy,
            band_hits: vec![0; variant.bands.len()],
            noop_hits: 0,
            armed: false,
            released: false,
            drop_state: state.drop,
        };

        for outcome in outcomes {
            let bin = BinContext {
                outcome,
                energy,
                elapsed,
            };

            for action in &variant.baseline {
                state.apply(action, &bin, drop, params, timeline, &mut report);
            }

            let actions = match outcome.band {
                BandMatch::Band(index) => {
                    report.band_hits[index] += 1;
                    &variant.bands[index]
                }
                BandMatch::NoOp => {
                    report.noop_hits += 1;
                    &variant.fallback
                }
            };
            for action in actions {
                state.apply(action, &bin, drop, params, timeline, &mut report);
            }
        }

        report.drop_state = state.drop;
        trace!(
            "frame t={:.2}s energy={:.1} hits={:?} noop={}",
            elapsed,
            energy,
            report.band_hits,
            report.noop_hits
        );
        report
    }
}

struct BinContext<'a> {
    outcome: &'a BinOutcome,
    energy: f32,
    elapsed: f64,
}

impl BinContext<'_> {
    fn object(&self, target: Target, params: &VisualParameterSet) -> Option<ObjectId> {
        match target {
            Target::Bar => params.bars().get(self.outcome.index).copied(),
            Target::Object(id) => Some(id),
        }
    }

    fn level(&self, source: LevelSource) -> f32 {
        match source {
            LevelSource::Average => self.energy,
            LevelSource::Bin => self.outcome.value as f32,
            LevelSource::Intensity => self.outcome.intensity,
        }
    }
}

impl<R: Rng> MapperState<R> {
    fn apply(
        &mut self,
        action: &ResolvedAction,
        bin: &BinContext<'_>,
        drop: Option<&ResolvedDrop>,
        params: &mut VisualParameterSet,
        timeline: &mut Timeline,
        report: &mut FrameReport,
    ) {
        match action {
            ResolvedAction::Rotate { target, axis, delta } => {
                if let Some(id) = bin.object(*target, params) {
                    *axis.of_mut(&mut params.object_mut(id).rotation) += delta;
                }
            }
            ResolvedAction::ScaleToEnergy {
                target,
                axes,
                source,
                divisor,
                floor,
            } => {
                if let Some(id) = bin.object(*target, params) {
                    let scale = (bin.level(*source) / divisor).max(*floor);
                    let object = params.object_mut(id);
                    for axis in axes {
                        *axis.of_mut(&mut object.scale) = scale;
                    }
                }
            }
            ResolvedAction::Opacity { target, value } => {
                if let Some(id) = bin.object(*target, params) {
                    params.object_mut(id).opacity = *value;
                }
            }
            ResolvedAction::RandomColor { target } => {
                if let Some(id) = bin.object(*target, params) {
                    params.object_mut(id).color = Vec3::new(self.rng.random(), self.rng.random(), self.rng.random());
                }
            }
            ResolvedAction::FollowRotation {
                target,
                leader,
                axis,
                factor,
            } => {
                if let Some(id) = bin.object(*target, params) {
                    let goal = axis.of(params.get(*leader).rotation);
                    let current = axis.of_mut(&mut params.object_mut(id).rotation);
                    *current += (goal - *current) * factor;
                }
            }
            ResolvedAction::TweenRotation {
                target,
                axis,
                to,
                duration,
                easing,
            } => {
                if let Some(id) = bin.object(*target, params) {
                    timeline.tween(
                        ParamTarget::Object {
                            id,
                            channel: Channel::Rotation,
                            axis: *axis,
                        },
                        *to,
                        Timing::new(*duration, 0.0, *easing),
                        TweenKind::Beat,
                        bin.elapsed,
                    );
                }
            }
            ResolvedAction::ArmDrop => {
                if let Some(drop) = drop {
                    let next = self.drop.arm(bin.elapsed, drop.config.min_elapsed);
                    if next.is_armed() && !self.drop.is_armed() {
                        info!(
                            "🎯 Drop armed at {:.2}s (bin {}, intensity {:.1})",
                            bin.elapsed, bin.outcome.index, bin.outcome.intensity
                        );
                        report.armed = true;
                    }
                    self.drop = next;
                }
            }
            ResolvedAction::ReleaseDrop => {
                if let Some(drop) = drop {
                    let (next, fired) = self.drop.release(bin.elapsed);
                    self.drop = next;
                    if fired {
                        info!(
                            "💥 Drop released at {:.2}s (bin {}, intensity {:.1})",
                            bin.elapsed, bin.outcome.index, bin.outcome.intensity
                        );
                        launch_drop(drop, &mut self.rng, params, timeline, bin.elapsed);
                        report.released = true;
                    }
                }
            }
        }
    }
}

/// Camera swing, delayed look-at retarget and scatter, all as timeline tweens.
fn launch_drop<R: Rng>(
    drop: &ResolvedDrop,
    rng: &mut R,
    params: &mut VisualParameterSet,
    timeline: &mut Timeline,
    now: f64,
) {
    let config = &drop.config;
    let camera_target = config.camera_bounds.sample(rng);
    let camera_move = Timing::new(config.camera_duration, 0.0, config.easing);
    let retarget = Timing::new(config.camera_duration, config.look_at_delay, config.easing);
    let scatter = Timing::new(config.scatter_duration, 0.0, config.easing);

    for axis in Axis::ALL {
        timeline.tween(
            ParamTarget::CameraPosition(axis),
            axis.of(camera_target),
            camera_move,
            TweenKind::Drop,
            now,
        );
        timeline.tween(
            ParamTarget::CameraLookAt(axis),
            axis.of(config.look_at),
            retarget,
            TweenKind::Drop,
            now,
        );
    }

    for &id in &drop.scatter {
        let destination = config.scatter_bounds.sample(rng);
        for axis in Axis::ALL {
            timeline.tween(
                ParamTarget::Object {
                    id,
                    channel: Channel::Position,
                    axis,
                },
                axis.of(destination),
                scatter,
                TweenKind::Drop,
                now,
            );
        }
    }

    for &id in &drop.reset_rotations {
        timeline.kill_channel(id, Channel::Rotation);
        params.object_mut(id).rotation = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EnergyReducer, FrequencySnapshot};
    use crate::effects::tween::Easing;
    use crate::effects::variant::{Action, TargetRef};
    use rand::SeedableRng;
    use std::f32::consts::PI;

    fn setup(name: &str) -> (VisualParameterMapper, VisualParameterSet, Timeline) {
        setup_variant(VariantConfig::builtin(name).unwrap())
    }

    fn setup_variant(variant: VariantConfig) -> (VisualParameterMapper, VisualParameterSet, Timeline) {
        let params = VisualParameterSet::from_layout(&variant.layout);
        let mapper = VisualParameterMapper::new(&variant, &params, StdRng::seed_from_u64(7)).unwrap();
        (mapper, params, Timeline::new())
    }

    fn run(
        mapper: &mut VisualParameterMapper,
        params: &mut VisualParameterSet,
        timeline: &mut Timeline,
        elapsed: f64,
        energy: f32,
        bins: Vec<u8>,
    ) -> FrameReport {
        let outcomes = mapper.classifier().classify(energy, &FrequencySnapshot::new(bins));
        mapper.map_frame(elapsed, energy, &outcomes, params, timeline)
    }

    #[test]
    fn test_silence_hides_every_bar() {
        let (mut mapper, mut params, mut timeline) = setup("drop");
        let snapshot = FrequencySnapshot::silent(32);
        let energy = EnergyReducer::reduce(&snapshot);
        let outcomes = mapper.classifier().classify(energy, &snapshot);

        let report = mapper.map_frame(1.0, energy, &outcomes, &mut params, &mut timeline);

        assert_eq!(report.noop_hits, 32);
        assert!(report.band_hits.iter().all(|&h| h == 0));
        for &bar in params.bars() {
            assert_eq!(params.get(bar).opacity, 0.0);
            // Baseline still runs: bar height falls back to its floor
            assert!((params.get(bar).scale.y - 0.17).abs() < 1e-6);
        }
    }

    #[test]
    fn test_active_band_scales_to_energy() {
        let (mut mapper, mut params, mut timeline) = setup("drop");
        let mut bins = vec![0u8; 32];
        bins[3] = 140;

        let report = run(&mut mapper, &mut params, &mut timeline, 5.0, 64.0, bins);

        // Band order: arm, release, active, low
        assert_eq!(report.band_hits[2], 1);
        let ball = params.find("disco_ball").unwrap();
        assert_eq!(params.get(ball).scale.x, 1.0);
        assert_eq!(params.get(ball).scale.y, 1.0);

        let bar = params.get(params.bars()[3]);
        assert_eq!(bar.opacity, 1.0);
        assert_ne!(bar.color, Vec3::ONE);
    }

    #[test]
    fn test_color_rerolls_every_qualifying_frame() {
        let (mut mapper, mut params, mut timeline) = setup("bars");
        let bar = params.bars()[0];
        let mut bins = vec![0u8; 32];
        bins[0] = 200;

        run(&mut mapper, &mut params, &mut timeline, 1.0, 64.0, bins.clone());
        let first = params.get(bar).color;
        run(&mut mapper, &mut params, &mut timeline, 1.1, 64.0, bins);
        assert_ne!(params.get(bar).color, first);
    }

    #[test]
    fn test_baseline_rotation_runs_per_bin() {
        let (mut mapper, mut params, mut timeline) = setup("bars");
        run(&mut mapper, &mut params, &mut timeline, 1.0, 0.0, vec![0; 32]);

        let ball = params.find("disco_ball").unwrap();
        assert!((params.get(ball).rotation.x - 32.0 * 0.001).abs() < 1e-5);
    }

    #[test]
    fn test_arm_is_gated_by_elapsed_time() {
        let (mut mapper, mut params, mut timeline) = setup("drop");
        let mut bins = vec![0u8; 32];
        bins[0] = 224;

        // 99/64 * 224 = 346.5, inside the arm band
        let early = run(&mut mapper, &mut params, &mut timeline, 10.0, 99.0, bins.clone());
        assert_eq!(early.band_hits[0], 1);
        assert!(!early.armed);
        assert_eq!(mapper.drop_state(), DropState::Idle);

        let late = run(&mut mapper, &mut params, &mut timeline, 50.0, 99.0, bins);
        assert!(late.armed);
        assert!(mapper.drop_state().is_armed());
        // Arming alone leaves the camera where it was
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_release_launches_drop_once() {
        let (mut mapper, mut params, mut timeline) = setup("drop");
        let mut arm = vec![0u8; 32];
        arm[0] = 224;
        let mut release = vec![0u8; 32];
        release[0] = 209;

        let sphere = params.find("sphere").unwrap();
        run(&mut mapper, &mut params, &mut timeline, 50.0, 99.0, arm.clone());
        assert!(params.get(sphere).rotation.x != 0.0);

        let fired = run(&mut mapper, &mut params, &mut timeline, 50.1, 64.0, release.clone());
        assert!(fired.released);
        assert!(mapper.drop_state().is_consumed());
        assert!(timeline.has_active(TweenKind::Drop));
        // 3 camera axes, 3 look-at axes, 3 per scattered bar
        assert_eq!(timeline.len(), 6 + 3 * 32);

        // Baseline rotation of the remaining bins runs after the reset
        assert!(params.get(sphere).rotation.x < 32.0 * 0.00009);

        let rearm = run(&mut mapper, &mut params, &mut timeline, 80.0, 99.0, arm);
        assert!(!rearm.armed);
        let again = run(&mut mapper, &mut params, &mut timeline, 80.1, 64.0, release);
        assert!(!again.released);
        assert!(mapper.drop_state().is_consumed());
    }

    #[test]
    fn test_drop_animation_moves_camera_within_bounds() {
        let (mut mapper, mut params, mut timeline) = setup("drop");
        let mut arm = vec![0u8; 32];
        arm[0] = 224;
        let mut release = vec![0u8; 32];
        release[0] = 209;

        run(&mut mapper, &mut params, &mut timeline, 50.0, 99.0, arm);
        run(&mut mapper, &mut params, &mut timeline, 50.1, 64.0, release);

        timeline.advance(50.1, &mut params);
        timeline.advance(60.0, &mut params);
        assert!(timeline.is_empty());

        let camera = params.camera();
        assert!((1600.0..=2600.0).contains(&camera.position.z));
        assert!((-600.0..=600.0).contains(&camera.position.x));
        assert_eq!(camera.look_at, Vec3::new(0.0, 0.0, 2000.0));
    }

    #[test]
    fn test_follow_rotation_eases_toward_leader() {
        let (mut mapper, mut params, mut timeline) = setup("drop");
        run(&mut mapper, &mut params, &mut timeline, 1.0, 0.0, vec![0; 32]);

        let ball = params.find("disco_ball").unwrap();
        let ring = params.find("ring").unwrap();
        let leader = params.get(ball).rotation.y;
        let follower = params.get(ring).rotation.y;
        assert!(follower > 0.0);
        assert!(follower < leader);
    }

    #[test]
    fn test_surge_tweens_sphere_toward_minus_pi() {
        let (mut mapper, mut params, mut timeline) = setup("disco");
        let sphere = params.find("sphere").unwrap();
        let ball = params.find("disco_ball").unwrap();
        let mut bins = vec![0u8; 32];
        bins[0] = 250;

        let report = run(&mut mapper, &mut params, &mut timeline, 2.0, 64.0, bins.clone());
        assert_eq!(report.band_hits, vec![1, 0, 0]);
        assert!(timeline.has_active(TweenKind::Beat));
        // Surge carries the pulse boost as well
        assert_eq!(params.get(ball).scale.x, 1.0);
        assert_eq!(params.get(ball).scale.y, 1.0);

        // A second qualifying frame restarts the tween rather than stacking one
        run(&mut mapper, &mut params, &mut timeline, 2.1, 64.0, bins);
        assert_eq!(timeline.len(), 1);

        let before = params.get(sphere).rotation.x;
        timeline.advance(2.1, &mut params);
        timeline.advance(2.6, &mut params);
        let halfway = params.get(sphere).rotation.x;
        assert!(halfway < before);
        assert!(halfway > -PI);

        timeline.advance(3.2, &mut params);
        assert!((params.get(sphere).rotation.x + PI).abs() < 1e-5);
        assert!(!timeline.has_active(TweenKind::Beat));
    }

    #[test]
    fn test_release_kills_running_rotation_tween() {
        let mut variant = VariantConfig::builtin("drop").unwrap();
        variant.bands[0].actions.push(Action::TweenRotation {
            target: TargetRef::object("sphere"),
            axis: Axis::X,
            to: -PI,
            duration: 5.0,
            easing: Easing::PowerOut(4),
        });
        let (mut mapper, mut params, mut timeline) = setup_variant(variant);
        let sphere = params.find("sphere").unwrap();

        run(&mut mapper, &mut params, &mut timeline, 50.0, 99.0, vec![224]);
        assert!(mapper.drop_state().is_armed());
        assert!(timeline.has_active(TweenKind::Beat));
        timeline.advance(50.0, &mut params);
        timeline.advance(50.5, &mut params);
        assert!(params.get(sphere).rotation.x < -1.0);

        let report = run(&mut mapper, &mut params, &mut timeline, 51.0, 64.0, vec![209]);
        assert!(report.released);
        assert!(!timeline.has_active(TweenKind::Beat));
        assert_eq!(params.get(sphere).rotation.x, 0.0);

        // Only the drop's camera, look-at and bar scatter tweens remain
        timeline.advance(51.0, &mut params);
        timeline.advance(60.0, &mut params);
        assert!(timeline.is_empty());
        assert_eq!(params.get(sphere).rotation.x, 0.0);
    }
}
