//! Pipeline configuration.
//!
//! Every section falls back to the values of the reference deployment, so an
//! empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::displacement::{DEFAULT_GRID_SPACING, DEFAULT_WINDOW_SIZE, FieldParams};
use crate::error::{Error, Result};
use crate::heatmap::{Colormap, DEFAULT_OVERLAY_ALPHA, HeatmapRenderer};
use crate::io::{object_from_json, object_to_json};
use crate::landmarks::RoiKind;
use crate::stabilizer::{DEFAULT_ALPHA, DEFAULT_MOTION_FLOOR, TemporalStabilizer};
use crate::tracker::LucasKanadeTracker;
use crate::types::Roi;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub window_size: [f64; 2],
    pub spacing: [f64; 2],
    /// Sampling region in pixels, whole frame when absent.
    pub roi: Option<Roi>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            spacing: DEFAULT_GRID_SPACING,
            roi: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub alpha: f64,
    pub motion_floor: f64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            motion_floor: DEFAULT_MOTION_FLOOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub overlay_alpha: f64,
    pub colormap: Colormap,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            overlay_alpha: DEFAULT_OVERLAY_ALPHA,
            colormap: Colormap::Jet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub half_window: usize,
    pub levels: usize,
    pub max_iterations: usize,
    pub epsilon: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let lk = LucasKanadeTracker::default();
        Self {
            half_window: lk.half_window,
            levels: lk.levels,
            max_iterations: lk.max_iterations,
            epsilon: lk.epsilon,
        }
    }
}

/// How the reference image of each frame pair is chosen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceConfig {
    #[default]
    PreviousFrame,
    FixedBaseline,
    PeriodicRefresh {
        period: usize,
    },
    StimulusBaseline {
        #[serde(default = "default_lead_ms")]
        lead_ms: i64,
        #[serde(default = "default_buffer_ms")]
        buffer_ms: i64,
    },
}

fn default_lead_ms() -> i64 {
    5000
}

fn default_buffer_ms() -> i64 {
    7000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub grid: GridConfig,
    pub stabilizer: StabilizerConfig,
    pub heatmap: HeatmapConfig,
    pub tracker: TrackerConfig,
    pub reference: ReferenceConfig,
    pub roi_kind: RoiKind,
    /// Black out pixels outside the face mask before tracking.
    pub mask_images: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            stabilizer: StabilizerConfig::default(),
            heatmap: HeatmapConfig::default(),
            tracker: TrackerConfig::default(),
            reference: ReferenceConfig::default(),
            roi_kind: RoiKind::default(),
            mask_images: true,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<PipelineConfig> {
        let config: PipelineConfig = object_from_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        object_to_json(path, self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidParameter(msg));
        let s = &self.stabilizer;
        if !(s.alpha > 0.0 && s.alpha <= 1.0) {
            return invalid(format!("stabilizer.alpha must be in (0, 1], got {}", s.alpha));
        }
        if !(s.motion_floor >= 0.0) {
            return invalid(format!(
                "stabilizer.motion_floor must be non-negative, got {}",
                s.motion_floor
            ));
        }
        let g = &self.grid;
        if g.spacing.iter().any(|&v| !(v > 0.0)) {
            return invalid(format!("grid.spacing must be positive, got {:?}", g.spacing));
        }
        if g.window_size.iter().any(|&v| !(v > 0.0)) {
            return invalid(format!(
                "grid.window_size must be positive, got {:?}",
                g.window_size
            ));
        }
        if let Some(roi) = &g.roi {
            if !(roi.xmax > roi.xmin && roi.ymax > roi.ymin) {
                return Err(Error::InvalidRegion(format!("grid.roi is empty: {:?}", roi)));
            }
        }
        if !(0.0..=1.0).contains(&self.heatmap.overlay_alpha) {
            return invalid(format!(
                "heatmap.overlay_alpha must be in [0, 1], got {}",
                self.heatmap.overlay_alpha
            ));
        }
        let t = &self.tracker;
        if t.levels == 0 || t.max_iterations == 0 || !(t.epsilon > 0.0) {
            return invalid(format!("tracker settings out of range: {:?}", t));
        }
        match self.reference {
            ReferenceConfig::PeriodicRefresh { period: 0 } => {
                invalid("reference.period must be at least 1".to_string())
            }
            ReferenceConfig::StimulusBaseline { lead_ms, buffer_ms }
                if lead_ms < 0 || buffer_ms < lead_ms =>
            {
                invalid(format!(
                    "reference.buffer_ms ({}) must cover lead_ms ({}) and both be non-negative",
                    buffer_ms, lead_ms
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn field_params(&self) -> FieldParams {
        FieldParams {
            roi: self.grid.roi,
            window_size: self.grid.window_size,
            grid_spacing: self.grid.spacing,
        }
    }

    pub fn create_tracker(&self) -> LucasKanadeTracker {
        LucasKanadeTracker::new(
            self.tracker.half_window,
            self.tracker.levels,
            self.tracker.max_iterations,
            self.tracker.epsilon,
        )
    }

    pub fn create_stabilizer(&self) -> Result<TemporalStabilizer> {
        TemporalStabilizer::new(self.stabilizer.alpha, self.stabilizer.motion_floor)
    }

    pub fn create_renderer(&self) -> Result<HeatmapRenderer> {
        HeatmapRenderer::new(self.heatmap.colormap, self.heatmap.overlay_alpha)
    }
}
