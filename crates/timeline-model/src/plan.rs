//! Render plans: what one encoder invocation (or one batch) will produce.

use serde::Serialize;

use crate::segment::Segment;
use crate::settings::RenderSettings;

/// Ordered segments plus the settings they are rendered with.
///
/// A plan is fixed once built; durations are measured in whole output
/// frames so that batch plans and single-pass plans add up identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    segments: Vec<Segment>,
    settings: RenderSettings,
    expected_frames: u64,
    input_count: usize,
}

impl RenderPlan {
    pub fn new(segments: Vec<Segment>, settings: RenderSettings) -> Self {
        let expected_frames = segments
            .iter()
            .map(|segment| rendered_frames(segment, &settings))
            .sum();
        let input_count = segments.iter().map(Segment::input_count).sum();
        Self {
            segments,
            settings,
            expected_frames,
            input_count,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Encoder inputs across all segments.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Total output frames.
    pub fn expected_frames(&self) -> u64 {
        self.expected_frames
    }

    /// Total output duration, snapped to the frame grid.
    pub fn expected_duration_secs(&self) -> f64 {
        self.settings.fps.secs_for_frames(self.expected_frames)
    }

    /// Segments that produce at least one output frame.
    pub fn rendered_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .filter(|segment| rendered_frames(segment, &self.settings) > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.expected_frames == 0
    }
}

/// Output frames a segment contributes.
///
/// Gaps render as a fixed-length slate; covered spans render their own
/// length. Both are rounded to the nearest whole frame.
pub fn rendered_frames(segment: &Segment, settings: &RenderSettings) -> u64 {
    let secs = match segment {
        Segment::Gap { .. } => settings.slate.duration_secs,
        _ => segment.timeline_duration_secs(),
    };
    settings.fps.frames_in(secs)
}

/// Segments grouped into independently encodable batches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPlan {
    batches: Vec<Vec<Segment>>,
}

impl BatchPlan {
    pub fn new(batches: Vec<Vec<Segment>>) -> Self {
        Self { batches }
    }

    pub fn batches(&self) -> &[Vec<Segment>] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Encoder inputs per batch.
    pub fn input_counts(&self) -> Vec<usize> {
        self.batches
            .iter()
            .map(|batch| batch.iter().map(Segment::input_count).sum())
            .collect()
    }

    /// One render plan per batch, in timeline order.
    pub fn into_render_plans(self, settings: &RenderSettings) -> Vec<RenderPlan> {
        self.batches
            .into_iter()
            .map(|segments| RenderPlan::new(segments, settings.clone()))
            .collect()
    }
}
