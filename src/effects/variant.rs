use anyhow::{Context, Result};
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

use super::tween::Easing;
use crate::audio::{AnalyserConfig, Band, BeatClassifier};
use crate::error::{StageError, StageResult};
use crate::scene::{Axis, BarRow, CameraSpec, ObjectId, ObjectSpec, SceneLayout, VisualParameterSet};

/// What an action writes to: the bar bound to the current bin, or a named object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    Bar,
    Object(String),
}

impl TargetRef {
    pub fn object(name: &str) -> Self {
        TargetRef::Object(name.to_string())
    }
}

/// Input of a scale-to-energy mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    /// Frame energy level (average byte value).
    Average,
    /// Raw byte value of the current bin.
    Bin,
    /// Beat intensity of the current bin.
    Intensity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Rotate {
        target: TargetRef,
        axis: Axis,
        delta: f32,
    },
    ScaleToEnergy {
        target: TargetRef,
        axes: Vec<Axis>,
        source: LevelSource,
        divisor: f32,
        #[serde(default)]
        floor: f32,
    },
    Opacity {
        target: TargetRef,
        value: f32,
    },
    RandomColor {
        target: TargetRef,
    },
    FollowRotation {
        target: TargetRef,
        leader: String,
        axis: Axis,
        factor: f32,
    },
    TweenRotation {
        target: TargetRef,
        axis: Axis,
        to: f32,
        duration: f64,
        easing: Easing,
    },
    ArmDrop,
    ReleaseDrop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRule {
    #[serde(flatten)]
    pub band: Band,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec3 {
        Vec3::new(
            rng.random_range(self.min.x..=self.max.x),
            rng.random_range(self.min.y..=self.max.y),
            rng.random_range(self.min.z..=self.max.z),
        )
    }

    fn is_ordered(&self) -> bool {
        self.min.cmple(self.max).all()
    }
}

/// Scripted camera move and scatter launched when an armed drop is released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropConfig {
    #[serde(default = "default_min_elapsed")]
    pub min_elapsed: f64,
    pub camera_bounds: Bounds,
    pub camera_duration: f64,
    pub look_at: Vec3,
    #[serde(default)]
    pub look_at_delay: f64,
    pub scatter_bounds: Bounds,
    pub scatter_duration: f64,
    #[serde(default)]
    pub scatter_bars: bool,
    #[serde(default)]
    pub scatter_objects: Vec<String>,
    #[serde(default)]
    pub reset_rotations: Vec<String>,
    pub easing: Easing,
}

fn default_min_elapsed() -> f64 {
    45.0
}

/// One visualization: scene layout plus the declarative band table driving it.
///
/// `baseline` runs for every bin on every frame, then the first matching band's
/// actions run, or `fallback` when no band matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    pub layout: SceneLayout,
    #[serde(default)]
    pub baseline: Vec<Action>,
    pub bands: Vec<BandRule>,
    #[serde(default)]
    pub fallback: Vec<Action>,
    #[serde(default)]
    pub drop: Option<DropConfig>,
}

pub const BUILTIN_VARIANTS: &[&str] = &["disco", "bars", "drop"];

impl VariantConfig {
    pub fn builtin(name: &str) -> StageResult<Self> {
        match name {
            "disco" => Ok(Self::disco()),
            "bars" => Ok(Self::bars()),
            "drop" => Ok(Self::drop_scene()),
            other => Err(StageError::UnknownVariant(other.to_string())),
        }
    }

    pub fn all_builtin() -> Vec<Self> {
        vec![Self::disco(), Self::bars(), Self::drop_scene()]
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading variant file {:?}", path.as_ref()))?;
        let variant: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing variant file {:?}", path.as_ref()))?;
        // Also rejects object names missing from the layout
        variant.resolve(&VisualParameterSet::from_layout(&variant.layout))?;
        Ok(variant)
    }

    /// The variant in `file` when one is given, otherwise the built-in `name`.
    pub fn load(name: &str, file: Option<&Path>) -> Result<Self> {
        match file {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::builtin(name)?),
        }
    }

    pub fn classifier(&self) -> BeatClassifier {
        BeatClassifier::new(self.bands.iter().map(|rule| rule.band.clone()).collect())
    }

    fn all_actions(&self) -> impl Iterator<Item = &Action> {
        self.baseline
            .iter()
            .chain(self.bands.iter().flat_map(|rule| rule.actions.iter()))
            .chain(self.fallback.iter())
    }

    pub fn validate(&self) -> StageResult<()> {
        self.analyser.validate()?;

        let invalid = |reason: String| StageError::InvalidVariant {
            variant: self.name.clone(),
            reason,
        };

        for rule in &self.bands {
            let band = &rule.band;
            if !band.lo.is_finite() {
                return Err(invalid(format!("band '{}' has a non-finite lower bound", band.name)));
            }
            if let Some(hi) = band.hi {
                if !(hi > band.lo) {
                    return Err(invalid(format!("band '{}' is empty ({} >= {})", band.name, band.lo, hi)));
                }
            }
        }

        for action in self.all_actions() {
            match action {
                Action::ScaleToEnergy { divisor, .. } if *divisor == 0.0 => {
                    return Err(invalid("scale_to_energy divisor must be non-zero".to_string()));
                }
                Action::ArmDrop | Action::ReleaseDrop if self.drop.is_none() => {
                    return Err(StageError::MissingDrop(self.name.clone()));
                }
                _ => {}
            }
        }

        if let Some(drop) = &self.drop {
            if !drop.camera_bounds.is_ordered() || !drop.scatter_bounds.is_ordered() {
                return Err(invalid("drop bounds must have min <= max on every axis".to_string()));
            }
        }

        Ok(())
    }

    /// Bind object names to handles in the renderer's parameter table.
    pub(crate) fn resolve(&self, params: &VisualParameterSet) -> StageResult<ResolvedVariant> {
        self.validate()?;

        let lookup = |name: &str| {
            params.find(name).ok_or_else(|| StageError::UnknownObject {
                variant: self.name.clone(),
                object: name.to_string(),
            })
        };
        let target = |target: &TargetRef| -> StageResult<Target> {
            match target {
                TargetRef::Bar => Ok(Target::Bar),
                TargetRef::Object(name) => lookup(name).map(Target::Object),
            }
        };
        let actions = |list: &[Action]| -> StageResult<Vec<ResolvedAction>> {
            list.iter()
                .map(|action| {
                    Ok(match action {
                        Action::Rotate { target: t, axis, delta } => ResolvedAction::Rotate {
                            target: target(t)?,
                            axis: *axis,
                            delta: *delta,
                        },
                        Action::ScaleToEnergy { target: t, axes, source, divisor, floor } => ResolvedAction::ScaleToEnergy {
                            target: target(t)?,
                            axes: axes.clone(),
                            source: *source,
                            divisor: *divisor,
                            floor: *floor,
                        },
                        Action::Opacity { target: t, value } => ResolvedAction::Opacity {
                            target: target(t)?,
                            value: *value,
                        },
                        Action::RandomColor { target: t } => ResolvedAction::RandomColor { target: target(t)? },
                        Action::FollowRotation { target: t, leader, axis, factor } => ResolvedAction::FollowRotation {
                            target: target(t)?,
                            leader: lookup(leader)?,
                            axis: *axis,
                            factor: *factor,
                        },
                        Action::TweenRotation { target: t, axis, to, duration, easing } => ResolvedAction::TweenRotation {
                            target: target(t)?,
                            axis: *axis,
                            to: *to,
                            duration: *duration,
                            easing: *easing,
                        },
                        Action::ArmDrop => ResolvedAction::ArmDrop,
                        Action::ReleaseDrop => ResolvedAction::ReleaseDrop,
                    })
                })
                .collect()
        };

        let drop = match &self.drop {
            Some(config) => {
                let mut scatter = Vec::new();
                if config.scatter_bars {
                    scatter.extend_from_slice(params.bars());
                }
                for name in &config.scatter_objects {
                    scatter.push(lookup(name)?);
                }
                let reset_rotations = config
                    .reset_rotations
                    .iter()
                    .map(|name| lookup(name))
                    .collect::<StageResult<Vec<_>>>()?;

                Some(ResolvedDrop {
                    config: config.clone(),
                    scatter,
                    reset_rotations,
                })
            }
            None => None,
        };

        Ok(ResolvedVariant {
            baseline: actions(&self.baseline)?,
            bands: self
                .bands
                .iter()
                .map(|rule| actions(&rule.actions))
                .collect::<StageResult<Vec<_>>>()?,
            fallback: actions(&self.fallback)?,
            drop,
        })
    }

    /// Outer textured sphere, a mirrored torus knot and a ring just in front of it.
    fn disco() -> Self {
        let sphere = || TargetRef::object("sphere");
        let ball = || TargetRef::object("disco_ball");
        let ring = || TargetRef::object("ring");

        let ball_scale = Action::ScaleToEnergy {
            target: ball(),
            axes: vec![Axis::X, Axis::Y],
            source: LevelSource::Average,
            divisor: 64.0,
            floor: 0.0,
        };
        let boost = vec![
            ball_scale.clone(),
            Action::Rotate { target: sphere(), axis: Axis::X, delta: 0.001 },
            Action::Rotate { target: sphere(), axis: Axis::Y, delta: -0.001 },
            Action::Rotate { target: ball(), axis: Axis::X, delta: 0.001 },
        ];

        let mut surge = vec![Action::TweenRotation {
            target: sphere(),
            axis: Axis::X,
            to: -PI,
            duration: 1.0,
            easing: Easing::PowerOut(4),
        }];
        surge.extend(boost.iter().cloned());

        Self {
            name: "disco".to_string(),
            description: "Spinning disco ball inside a patterned sphere, ring ripples on quiet bins".to_string(),
            analyser: AnalyserConfig::default(),
            layout: SceneLayout {
                camera: CameraSpec {
                    position: Vec3::new(0.0, 0.0, 2400.0),
                    look_at: Vec3::ZERO,
                },
                objects: vec![
                    ObjectSpec::new("sphere", Vec3::ZERO),
                    ObjectSpec::new("disco_ball", Vec3::new(0.0, 0.0, 2000.0)),
                    ObjectSpec::new("ring", Vec3::new(0.0, 0.0, 1999.0)),
                ],
                bars: None,
            },
            baseline: vec![
                Action::Rotate { target: sphere(), axis: Axis::X, delta: 0.00009 },
                Action::Rotate { target: sphere(), axis: Axis::Y, delta: -0.00001 },
                Action::Rotate { target: ball(), axis: Axis::X, delta: 0.0009 },
            ],
            bands: vec![
                BandRule {
                    band: Band::new("surge", 200.0, None),
                    actions: surge,
                },
                BandRule {
                    band: Band::new("pulse", 136.0, Some(200.0)),
                    actions: boost,
                },
                BandRule {
                    band: Band::new("ripple", 1.0, Some(136.0)),
                    actions: vec![
                        Action::ScaleToEnergy {
                            target: ring(),
                            axes: vec![Axis::X, Axis::Y],
                            source: LevelSource::Average,
                            divisor: 32.0,
                            floor: 0.0,
                        },
                        Action::Rotate { target: ring(), axis: Axis::Y, delta: 0.001 },
                    ],
                },
            ],
            fallback: Vec::new(),
            drop: None,
        }
    }

    /// A 32-bar equalizer under a mirrored ball.
    fn bars() -> Self {
        let ball_scale = Action::ScaleToEnergy {
            target: TargetRef::object("disco_ball"),
            axes: vec![Axis::X, Axis::Y],
            source: LevelSource::Average,
            divisor: 64.0,
            floor: 0.0,
        };

        Self {
            name: "bars".to_string(),
            description: "Equalizer bars with colour flashes on loud bins".to_string(),
            analyser: AnalyserConfig::default(),
            layout: equalizer_layout(),
            baseline: equalizer_baseline(),
            bands: vec![
                BandRule {
                    band: Band::new("flash", 160.0, None),
                    actions: vec![Action::RandomColor { target: TargetRef::Bar }, ball_scale.clone()],
                },
                BandRule {
                    band: Band::new("swell", 80.0, Some(160.0)),
                    actions: vec![ball_scale],
                },
            ],
            fallback: Vec::new(),
            drop: None,
        }
    }

    /// Equalizer with a one-shot camera drop after the intro.
    fn drop_scene() -> Self {
        let mut layout = equalizer_layout();
        layout.objects.push(ObjectSpec::new("ring", Vec3::new(0.0, 100.0, 10.0)));

        let mut baseline = equalizer_baseline();
        baseline.push(Action::FollowRotation {
            target: TargetRef::object("ring"),
            leader: "disco_ball".to_string(),
            axis: Axis::Y,
            factor: 0.05,
        });

        let show = Action::Opacity { target: TargetRef::Bar, value: 1.0 };
        let hide = Action::Opacity { target: TargetRef::Bar, value: 0.0 };
        let recolor = Action::RandomColor { target: TargetRef::Bar };

        Self {
            name: "drop".to_string(),
            description: "Equalizer that scatters and swings the camera once the track drops".to_string(),
            analyser: AnalyserConfig::default(),
            layout,
            baseline,
            bands: vec![
                BandRule {
                    band: Band::new("arm", 340.0, Some(350.0)),
                    actions: vec![Action::ArmDrop, show.clone()],
                },
                BandRule {
                    band: Band::new("release", 205.0, Some(215.0)),
                    actions: vec![Action::ReleaseDrop, show.clone(), recolor.clone()],
                },
                BandRule {
                    band: Band::new("active", 136.0, None),
                    actions: vec![
                        show,
                        recolor,
                        Action::ScaleToEnergy {
                            target: TargetRef::object("disco_ball"),
                            axes: vec![Axis::X, Axis::Y],
                            source: LevelSource::Average,
                            divisor: 64.0,
                            floor: 0.0,
                        },
                    ],
                },
                BandRule {
                    band: Band::new("low", 1.0, Some(136.0)),
                    actions: vec![
                        hide.clone(),
                        Action::ScaleToEnergy {
                            target: TargetRef::object("ring"),
                            axes: vec![Axis::X, Axis::Y],
                            source: LevelSource::Average,
                            divisor: 32.0,
                            floor: 0.5,
                        },
                    ],
                },
            ],
            fallback: vec![hide],
            drop: Some(DropConfig {
                min_elapsed: default_min_elapsed(),
                camera_bounds: Bounds {
                    min: Vec3::new(-600.0, -300.0, 1600.0),
                    max: Vec3::new(600.0, 300.0, 2600.0),
                },
                camera_duration: 6.0,
                look_at: Vec3::new(0.0, 0.0, 2000.0),
                look_at_delay: 2.0,
                scatter_bounds: Bounds {
                    min: Vec3::new(-400.0, -300.0, 1500.0),
                    max: Vec3::new(400.0, 300.0, 2300.0),
                },
                scatter_duration: 4.0,
                scatter_bars: true,
                scatter_objects: Vec::new(),
                reset_rotations: vec!["sphere".to_string(), "disco_ball".to_string()],
                easing: Easing::PowerInOut(2),
            }),
        }
    }
}

fn equalizer_layout() -> SceneLayout {
    SceneLayout {
        camera: CameraSpec {
            position: Vec3::new(0.0, 0.0, 2400.0),
            look_at: Vec3::ZERO,
        },
        objects: vec![
            ObjectSpec::new("sphere", Vec3::ZERO),
            ObjectSpec::new("disco_ball", Vec3::new(0.0, 100.0, 0.0)),
        ],
        bars: Some(BarRow {
            count: 32,
            origin: Vec3::new(-80.0, -100.0, 2000.0),
            spacing: 4.75,
        }),
    }
}

fn equalizer_baseline() -> Vec<Action> {
    let sphere = || TargetRef::object("sphere");
    let ball = || TargetRef::object("disco_ball");

    vec![
        Action::Rotate { target: sphere(), axis: Axis::X, delta: 0.00009 },
        Action::Rotate { target: sphere(), axis: Axis::Y, delta: -0.0001 },
        Action::Rotate { target: ball(), axis: Axis::X, delta: 0.001 },
        Action::Rotate { target: ball(), axis: Axis::Y, delta: 0.001 },
        Action::ScaleToEnergy {
            target: TargetRef::Bar,
            axes: vec![Axis::Y],
            source: LevelSource::Bin,
            divisor: 64.0,
            floor: 0.17,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Target {
    Bar,
    Object(ObjectId),
}

/// [`Action`] with every object name replaced by its handle.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResolvedAction {
    Rotate { target: Target, axis: Axis, delta: f32 },
    ScaleToEnergy { target: Target, axes: Vec<Axis>, source: LevelSource, divisor: f32, floor: f32 },
    Opacity { target: Target, value: f32 },
    RandomColor { target: Target },
    FollowRotation { target: Target, leader: ObjectId, axis: Axis, factor: f32 },
    TweenRotation { target: Target, axis: Axis, to: f32, duration: f64, easing: Easing },
    ArmDrop,
    ReleaseDrop,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedDrop {
    pub config: DropConfig,
    pub scatter: Vec<ObjectId>,
    pub reset_rotations: Vec<ObjectId>,
}

#[derive(Debug, Clone)]
pub(crate) struct ResolvedVariant {
    pub baseline: Vec<ResolvedAction>,
    pub bands: Vec<Vec<ResolvedAction>>,
    pub fallback: Vec<ResolvedAction>,
    pub drop: Option<ResolvedDrop>,
}
