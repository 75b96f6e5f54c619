use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::audio::{EnergyReducer, PlaybackClock, SourceConnection, SpectrumSampler};
use crate::effects::{DropState, FrameReport, Timeline, TweenKind, VariantConfig, VisualParameterMapper};
use crate::error::StageResult;
use crate::scene::{FrameHandle, FrameScheduler, VisualParameterSet};

const STATUS_INTERVAL: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StagePhase {
    /// No track loaded.
    Idle,
    /// Per-frame classify and map running.
    Playing,
    /// Drop armed, or its animation still in flight.
    Transitioning,
}

/// Everything a freshly started track hands to the stage.
pub struct TrackSession {
    pub sampler: Box<dyn SpectrumSampler>,
    pub clock: Box<dyn PlaybackClock>,
    pub connection: Box<dyn SourceConnection>,
    pub duration_seconds: f64,
}

struct Pipeline {
    session: TrackSession,
    mapper: VisualParameterMapper,
    timeline: Timeline,
    frame: Option<FrameHandle>,
    frames_mapped: u64,
}

/// Owns the one active sampling pipeline and rebuilds it per track.
///
/// The renderer owns the [`VisualParameterSet`] and the [`FrameScheduler`];
/// the stage only borrows them for the duration of each call.
pub struct Stage {
    variant: VariantConfig,
    seed: Option<u64>,
    pipeline: Option<Pipeline>,
}

impl Stage {
    pub fn new(variant: VariantConfig) -> Self {
        Self {
            variant,
            seed: None,
            pipeline: None,
        }
    }

    /// Fix the colour and scatter randomness, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn variant(&self) -> &VariantConfig {
        &self.variant
    }

    /// Tear down whatever is running, then start mapping `session`.
    ///
    /// On error the session's source is disconnected and the stage stays idle.
    pub fn load(
        &mut self,
        mut session: TrackSession,
        scheduler: &mut dyn FrameScheduler,
        params: &mut VisualParameterSet,
    ) -> StageResult<()> {
        self.reset(scheduler, params);

        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mapper = match VisualParameterMapper::new(&self.variant, params, rng) {
            Ok(mapper) => mapper,
            Err(e) => {
                session.connection.disconnect();
                return Err(e);
            }
        };

        info!(
            "🎵 Stage loaded with variant '{}' ({:.1}s, {} bins, {} bands)",
            self.variant.name,
            session.duration_seconds,
            session.sampler.bin_count(),
            mapper.classifier().bands().len()
        );

        self.pipeline = Some(Pipeline {
            session,
            mapper,
            timeline: Timeline::new(),
            frame: Some(scheduler.request_frame()),
            frames_mapped: 0,
        });
        Ok(())
    }

    /// Run one sample, reduce, classify and map cycle, then schedule the next.
    ///
    /// Handles other than the one this stage last requested are ignored.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        scheduler: &mut dyn FrameScheduler,
        params: &mut VisualParameterSet,
    ) -> Option<FrameReport> {
        let pipeline = self.pipeline.as_mut()?;
        if pipeline.frame != Some(handle) {
            trace!("Ignoring stale frame {:?}", handle);
            return None;
        }
        pipeline.frame = None;

        let elapsed = pipeline.session.clock.current_time();
        let snapshot = pipeline.session.sampler.sample();
        let energy = EnergyReducer::reduce(&snapshot);
        let outcomes = pipeline.mapper.classifier().classify(energy, &snapshot);
        let report = pipeline
            .mapper
            .map_frame(elapsed, energy, &outcomes, params, &mut pipeline.timeline);

        pipeline.frames_mapped += 1;
        if pipeline.frames_mapped % STATUS_INTERVAL == 0 {
            debug!(
                "📊 t={:.1}s energy={:.1} hits={:?} noop={} tweens={} drop={:?}",
                elapsed,
                energy,
                report.band_hits,
                report.noop_hits,
                pipeline.timeline.len(),
                report.drop_state
            );
        }

        pipeline.frame = Some(scheduler.request_frame());
        Some(report)
    }

    /// Step the eased animations to the current playback time.
    pub fn advance_animations(&mut self, params: &mut VisualParameterSet) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            let now = pipeline.session.clock.current_time();
            pipeline.timeline.advance(now, params);
        }
    }

    /// Stop the source, cancel the pending frame, drop every animation and
    /// restore the scene to its layout defaults. Calling it again is harmless.
    pub fn reset(&mut self, scheduler: &mut dyn FrameScheduler, params: &mut VisualParameterSet) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Some(handle) = pipeline.frame.take() {
                scheduler.cancel_frame(handle);
            }
            pipeline.session.connection.disconnect();
            pipeline.timeline.clear();
            info!("Stage reset after {} frames", pipeline.frames_mapped);
        }
        params.restore_defaults();
    }

    pub fn phase(&self) -> StagePhase {
        match &self.pipeline {
            None => StagePhase::Idle,
            Some(p) if p.mapper.drop_state().is_armed() || p.timeline.has_active(TweenKind::Drop) => {
                StagePhase::Transitioning
            }
            Some(_) => StagePhase::Playing,
        }
    }

    pub fn drop_state(&self) -> DropState {
        self.pipeline
            .as_ref()
            .map_or(DropState::Idle, |p| p.mapper.drop_state())
    }

    pub fn elapsed(&self) -> f64 {
        self.pipeline
            .as_ref()
            .map_or(0.0, |p| p.session.clock.current_time())
    }

    /// True once the loaded track has played through or its source went away.
    pub fn is_finished(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| {
            !p.session.connection.is_connected()
                || p.session.connection.is_finished()
                || (p.session.duration_seconds > 0.0 && p.session.clock.current_time() >= p.session.duration_seconds)
        })
    }
}
