//! Per-frame orchestration: reference selection, masking, field computation,
//! stabilisation and rendering.

use std::sync::Arc;

use image::{GrayImage, RgbaImage};
use indicatif::ParallelProgressIterator;
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::alignment::RigidTransform;
use crate::config::PipelineConfig;
use crate::displacement::{FieldParams, FieldResult, compute_field};
use crate::error::{Error, Result};
use crate::grid::{Grid, GridMeta};
use crate::heatmap::HeatmapRenderer;
use crate::landmarks::pixels_to_points;
use crate::mask::FaceMask;
use crate::reference::{ReferencePolicy, create_policy};
use crate::stabilizer::{HeatmapStats, TemporalStabilizer, stats};
use crate::tracker::PointTracker;

/// Everything the session needs to know about one incoming frame.
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub index: usize,
    pub timestamp_ms: i64,
    pub image: Arc<GrayImage>,
    pub mask: Option<FaceMask>,
    /// Landmark pixels whose motion is reported.
    pub query_pixels: Vec<[i32; 2]>,
}

impl FrameInput {
    pub fn new(index: usize, timestamp_ms: i64, image: GrayImage) -> FrameInput {
        FrameInput {
            index,
            timestamp_ms,
            image: Arc::new(image),
            mask: None,
            query_pixels: Vec::new(),
        }
    }

    pub fn with_mask(mut self, mask: FaceMask) -> FrameInput {
        self.mask = Some(mask);
        self
    }

    pub fn with_query_pixels(mut self, query_pixels: Vec<[i32; 2]>) -> FrameInput {
        self.query_pixels = query_pixels;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HeatmapFrame {
    pub index: usize,
    pub timestamp_ms: i64,
    /// Smoothed and floored grid.
    pub grid: Grid,
    pub stats: HeatmapStats,
    pub heatmap: RgbaImage,
    pub transform: RigidTransform,
    pub landmark_values: Vec<f64>,
    pub landmark_points: Vec<[i32; 2]>,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Processed(Box<HeatmapFrame>),
    /// The frame was dropped; the previous heatmap stays current.
    Skipped {
        index: usize,
        timestamp_ms: i64,
        reason: String,
    },
}

impl FrameOutcome {
    pub fn index(&self) -> usize {
        match self {
            FrameOutcome::Processed(frame) => frame.index,
            FrameOutcome::Skipped { index, .. } => *index,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, FrameOutcome::Processed(_))
    }

    pub fn frame(&self) -> Option<&HeatmapFrame> {
        match self {
            FrameOutcome::Processed(frame) => Some(&**frame),
            FrameOutcome::Skipped { .. } => None,
        }
    }
}

/// Row of the session report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSummary {
    pub frame_index: usize,
    pub timestamp_ms: i64,
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<HeatmapStats>,
}

impl From<&FrameOutcome> for FrameSummary {
    fn from(outcome: &FrameOutcome) -> Self {
        match outcome {
            FrameOutcome::Processed(frame) => FrameSummary {
                frame_index: frame.index,
                timestamp_ms: frame.timestamp_ms,
                processed: true,
                reason: None,
                stats: Some(frame.stats),
            },
            FrameOutcome::Skipped {
                index,
                timestamp_ms,
                reason,
            } => FrameSummary {
                frame_index: *index,
                timestamp_ms: *timestamp_ms,
                processed: false,
                reason: Some(reason.clone()),
                stats: None,
            },
        }
    }
}

/// Everything carried from one frame to the next.
///
/// Work happens on a copy that replaces the original only when the call
/// succeeds, so an error leaves the session as it was.
struct SessionState {
    policy: Box<dyn ReferencePolicy>,
    stabilizer: TemporalStabilizer,
    grid_meta: Option<GridMeta>,
}

impl Clone for SessionState {
    fn clone(&self) -> Self {
        SessionState {
            policy: self.policy.boxed_clone(),
            stabilizer: self.stabilizer.clone(),
            grid_meta: self.grid_meta,
        }
    }
}

impl SessionState {
    /// Applies the stabilizer to a field result, or turns a per-frame failure into a skip.
    fn finish(
        &mut self,
        renderer: &HeatmapRenderer,
        input: &FrameInput,
        field: Result<FieldResult>,
    ) -> Result<FrameOutcome> {
        let field = match field {
            Ok(field) => field,
            Err(e) if e.is_frame_skip() => {
                warn!("frame {} skipped: {}", input.index, e);
                return Ok(FrameOutcome::Skipped {
                    index: input.index,
                    timestamp_ms: input.timestamp_ms,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let grid = self.stabilizer.update(&field.grid)?;
        self.policy
            .commit(input.index, input.timestamp_ms, &input.image);
        let stats = stats(&grid);
        debug!(
            "frame {}: max {:.4}, mean {:.4}, {} of {} cells moving",
            input.index, stats.max, stats.mean, stats.non_zero_count, stats.total_count
        );
        self.grid_meta = Some(grid.meta);
        Ok(FrameOutcome::Processed(Box::new(HeatmapFrame {
            index: input.index,
            timestamp_ms: input.timestamp_ms,
            heatmap: renderer.render(&grid),
            grid,
            stats,
            transform: field.transform,
            landmark_values: field.landmark_values,
            landmark_points: input.query_pixels.clone(),
        })))
    }
}

pub struct HeatmapSession<T: PointTracker> {
    tracker: T,
    params: FieldParams,
    mask_images: bool,
    renderer: HeatmapRenderer,
    state: SessionState,
}

/// Masks both images when requested and computes the field of one frame pair.
fn field_for<T: PointTracker>(
    tracker: &T,
    params: &FieldParams,
    mask_images: bool,
    reference: &GrayImage,
    input: &FrameInput,
) -> Result<FieldResult> {
    let query_points = pixels_to_points(&input.query_pixels);
    match (&input.mask, mask_images) {
        (Some(mask), true) => compute_field(
            tracker,
            &mask.apply(reference)?,
            &mask.apply(&input.image)?,
            Some(mask),
            params,
            &query_points,
        ),
        (mask, _) => compute_field(
            tracker,
            reference,
            &input.image,
            mask.as_ref(),
            params,
            &query_points,
        ),
    }
}

impl<T: PointTracker> HeatmapSession<T> {
    pub fn new(tracker: T, config: &PipelineConfig) -> Result<HeatmapSession<T>> {
        config.validate()?;
        Ok(HeatmapSession {
            tracker,
            params: config.field_params(),
            mask_images: config.mask_images,
            renderer: config.create_renderer()?,
            state: SessionState {
                policy: create_policy(&config.reference)?,
                stabilizer: config.create_stabilizer()?,
                grid_meta: None,
            },
        })
    }

    pub fn from_parts(
        tracker: T,
        params: FieldParams,
        policy: Box<dyn ReferencePolicy>,
        stabilizer: TemporalStabilizer,
        renderer: HeatmapRenderer,
    ) -> HeatmapSession<T> {
        HeatmapSession {
            tracker,
            params,
            mask_images: true,
            renderer,
            state: SessionState {
                policy,
                stabilizer,
                grid_meta: None,
            },
        }
    }

    pub fn renderer(&self) -> &HeatmapRenderer {
        &self.renderer
    }

    pub fn stabilizer(&self) -> &TemporalStabilizer {
        &self.state.stabilizer
    }

    /// Metadata of the most recent processed grid.
    pub fn grid_meta(&self) -> Option<&GridMeta> {
        self.state.grid_meta.as_ref()
    }

    pub fn notify_event(&mut self, timestamp_ms: i64) {
        self.state.policy.notify_event(timestamp_ms);
    }

    pub fn reset(&mut self) {
        self.state.policy.reset();
        self.state.stabilizer.reset();
        self.state.grid_meta = None;
    }

    pub fn process_frame(&mut self, input: &FrameInput) -> Result<FrameOutcome> {
        let mut state = self.state.clone();
        let reference = state
            .policy
            .select(input.index, input.timestamp_ms, &input.image);
        let field = field_for(
            &self.tracker,
            &self.params,
            self.mask_images,
            &reference,
            input,
        );
        let outcome = state.finish(&self.renderer, input, field)?;
        self.state = state;
        Ok(outcome)
    }

    /// Fields are computed in parallel, stabilisation runs in input order.
    ///
    /// References are chosen up front as if every frame succeeds; a frame
    /// whose reference changes because an earlier one was skipped is
    /// recomputed. Inputs must already be sorted by frame index. On error
    /// the session is left untouched.
    pub fn process_sequence(&mut self, inputs: &[FrameInput]) -> Result<Vec<FrameOutcome>> {
        if inputs.windows(2).any(|w| w[0].index >= w[1].index) {
            return Err(Error::InvalidParameter(
                "frames must be given in increasing index order".to_string(),
            ));
        }
        let mut planned = self.state.policy.boxed_clone();
        let references: Vec<Arc<GrayImage>> = inputs
            .iter()
            .map(|input| {
                let reference = planned.select(input.index, input.timestamp_ms, &input.image);
                planned.commit(input.index, input.timestamp_ms, &input.image);
                reference
            })
            .collect();

        let (tracker, params, mask_images) = (&self.tracker, &self.params, self.mask_images);
        let fields: Vec<Result<FieldResult>> = inputs
            .par_iter()
            .zip(references.par_iter())
            .progress_count(inputs.len() as u64)
            .map(|(input, reference)| field_for(tracker, params, mask_images, reference, input))
            .collect();

        let mut state = self.state.clone();
        let outcomes = inputs
            .iter()
            .zip(references.iter().zip(fields))
            .map(|(input, (planned_reference, field))| {
                let reference = state
                    .policy
                    .select(input.index, input.timestamp_ms, &input.image);
                let field = if Arc::ptr_eq(&reference, planned_reference) {
                    field
                } else {
                    debug!("frame {}: reference changed, recomputing", input.index);
                    field_for(tracker, params, mask_images, &reference, input)
                };
                state.finish(&self.renderer, input, field)
            })
            .collect::<Result<Vec<_>>>()?;
        self.state = state;
        Ok(outcomes)
    }
}
