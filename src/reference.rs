//! Reference-frame selection.
//!
//! Every frame is tracked against one reference image. Which image that is
//! depends on the experiment, so the choice sits behind [`ReferencePolicy`].

use std::collections::VecDeque;
use std::sync::Arc;

use image::GrayImage;
use log::{debug, info};

use crate::config::ReferenceConfig;
use crate::error::{Error, Result};

pub trait ReferencePolicy: Send {
    /// Reference image for the frame `current`.
    fn select(
        &mut self,
        index: usize,
        timestamp_ms: i64,
        current: &Arc<GrayImage>,
    ) -> Arc<GrayImage>;

    /// `current` produced a heatmap. Skipped frames are never committed.
    fn commit(&mut self, _index: usize, _timestamp_ms: i64, _current: &Arc<GrayImage>) {}

    /// A stimulus (audio cue, instruction) happened at `timestamp_ms`.
    fn notify_event(&mut self, _timestamp_ms: i64) {}

    fn reset(&mut self);

    fn name(&self) -> &'static str;

    fn boxed_clone(&self) -> Box<dyn ReferencePolicy>;
}

/// Each frame against the last processed one; the first frame is compared with itself.
#[derive(Debug, Clone, Default)]
pub struct PreviousFrame {
    previous: Option<Arc<GrayImage>>,
}

impl PreviousFrame {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferencePolicy for PreviousFrame {
    fn select(&mut self, _index: usize, _timestamp_ms: i64, current: &Arc<GrayImage>) -> Arc<GrayImage> {
        self.previous.clone().unwrap_or_else(|| current.clone())
    }

    fn commit(&mut self, _index: usize, _timestamp_ms: i64, current: &Arc<GrayImage>) {
        self.previous = Some(current.clone());
    }

    fn reset(&mut self) {
        self.previous = None;
    }

    fn name(&self) -> &'static str {
        "previous_frame"
    }

    fn boxed_clone(&self) -> Box<dyn ReferencePolicy> {
        Box::new(self.clone())
    }
}

/// The first frame of the session is the reference for every frame.
#[derive(Debug, Clone, Default)]
pub struct FixedBaseline {
    baseline: Option<Arc<GrayImage>>,
}

impl FixedBaseline {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferencePolicy for FixedBaseline {
    fn select(&mut self, _index: usize, _timestamp_ms: i64, current: &Arc<GrayImage>) -> Arc<GrayImage> {
        self.baseline.get_or_insert_with(|| current.clone()).clone()
    }

    fn reset(&mut self) {
        self.baseline = None;
    }

    fn name(&self) -> &'static str {
        "fixed_baseline"
    }

    fn boxed_clone(&self) -> Box<dyn ReferencePolicy> {
        Box::new(self.clone())
    }
}

/// A fixed baseline replaced every `period` frames.
///
/// The frame that triggers the refresh becomes the new baseline and is
/// measured against itself.
#[derive(Debug, Clone)]
pub struct PeriodicRefresh {
    period: usize,
    baseline: Option<(usize, Arc<GrayImage>)>,
}

impl PeriodicRefresh {
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(Error::InvalidParameter(
                "refresh period must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            period,
            baseline: None,
        })
    }
}

impl ReferencePolicy for PeriodicRefresh {
    fn select(&mut self, index: usize, _timestamp_ms: i64, current: &Arc<GrayImage>) -> Arc<GrayImage> {
        if let Some((start, img)) = &self.baseline {
            if index.saturating_sub(*start) < self.period {
                return img.clone();
            }
        }
        debug!("reference refreshed at frame {}", index);
        self.baseline = Some((index, current.clone()));
        current.clone()
    }

    fn reset(&mut self) {
        self.baseline = None;
    }

    fn name(&self) -> &'static str {
        "periodic_refresh"
    }

    fn boxed_clone(&self) -> Box<dyn ReferencePolicy> {
        Box::new(self.clone())
    }
}

/// Baseline taken `lead_ms` before a stimulus.
///
/// Keeps a rolling `buffer_ms` window of recent frames. Until an event is
/// notified it behaves like [`PreviousFrame`]; afterwards the latest buffered
/// frame at or before `event - lead_ms` is the reference for the rest of the
/// session. When every buffered frame is newer than that, the oldest one is used.
#[derive(Debug, Clone)]
pub struct StimulusBaseline {
    lead_ms: i64,
    buffer_ms: i64,
    buffer: VecDeque<(i64, Arc<GrayImage>)>,
    pending_target: Option<i64>,
    baseline: Option<Arc<GrayImage>>,
    previous: Option<Arc<GrayImage>>,
}

impl StimulusBaseline {
    pub fn new(lead_ms: i64, buffer_ms: i64) -> Result<Self> {
        if lead_ms < 0 || buffer_ms < lead_ms {
            return Err(Error::InvalidParameter(format!(
                "buffer {} ms must cover a non-negative lead of {} ms",
                buffer_ms, lead_ms
            )));
        }
        Ok(Self {
            lead_ms,
            buffer_ms,
            buffer: VecDeque::new(),
            pending_target: None,
            baseline: None,
            previous: None,
        })
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    fn resolve(&mut self, target_ms: i64) -> bool {
        let closest = self
            .buffer
            .iter()
            .filter(|(t, _)| *t <= target_ms)
            .min_by_key(|(t, _)| target_ms - t)
            .or_else(|| self.buffer.front())
            .map(|(t, img)| (*t, img.clone()));
        match closest {
            Some((t, img)) => {
                info!("stimulus baseline set to frame at {} ms (target {} ms)", t, target_ms);
                self.baseline = Some(img);
                true
            }
            None => false,
        }
    }
}

impl ReferencePolicy for StimulusBaseline {
    fn select(&mut self, _index: usize, timestamp_ms: i64, current: &Arc<GrayImage>) -> Arc<GrayImage> {
        let fallback = self.previous.clone().unwrap_or_else(|| current.clone());

        self.buffer.push_back((timestamp_ms, current.clone()));
        while let Some((t, _)) = self.buffer.front() {
            if timestamp_ms - t > self.buffer_ms {
                self.buffer.pop_front();
            } else {
                break;
            }
        }

        if let Some(target) = self.pending_target {
            if self.resolve(target) {
                self.pending_target = None;
            }
        }
        self.baseline.clone().unwrap_or(fallback)
    }

    fn notify_event(&mut self, timestamp_ms: i64) {
        let target = timestamp_ms - self.lead_ms;
        if !self.resolve(target) {
            self.pending_target = Some(target);
        }
    }

    fn commit(&mut self, _index: usize, _timestamp_ms: i64, current: &Arc<GrayImage>) {
        self.previous = Some(current.clone());
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.pending_target = None;
        self.baseline = None;
        self.previous = None;
    }

    fn name(&self) -> &'static str {
        "stimulus_baseline"
    }

    fn boxed_clone(&self) -> Box<dyn ReferencePolicy> {
        Box::new(self.clone())
    }
}

pub fn create_policy(config: &ReferenceConfig) -> Result<Box<dyn ReferencePolicy>> {
    match *config {
        ReferenceConfig::PreviousFrame => Ok(Box::new(PreviousFrame::new())),
        ReferenceConfig::FixedBaseline => Ok(Box::new(FixedBaseline::new())),
        ReferenceConfig::PeriodicRefresh { period } => Ok(Box::new(PeriodicRefresh::new(period)?)),
        ReferenceConfig::StimulusBaseline { lead_ms, buffer_ms } => {
            Ok(Box::new(StimulusBaseline::new(lead_ms, buffer_ms)?))
        }
    }
}
