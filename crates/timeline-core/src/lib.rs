//! Chronocam Timeline Core
//!
//! Turns a set of independently timestamped camera clips into one
//! chronological timeline:
//! - **Intervals:** cut the clips at every start and end
//! - **Classification:** gap slate, single camera, or two-camera overlap
//! - **Labels:** slate text from the absolute times around each gap
//! - **Batching:** group segments into encodable batches at gap boundaries
//!
//! This crate is pure computation. No I/O, no encoder.

pub mod batch;
pub mod classify;
pub mod intervals;
pub mod label;

pub use batch::BatchSplitter;
pub use classify::{SegmentClassifier, SkippedGap};
pub use label::LabelFormatter;

use chronocam_timeline_model::clip::ClipDescriptor;
use chronocam_timeline_model::plan::RenderPlan;
use chronocam_timeline_model::segment::{Segment, SegmentKind};
use chronocam_timeline_model::settings::RenderSettings;
use chronocam_timeline_model::time::TimelineOrigin;
use serde::Serialize;

/// Result of assembling a clip list into a timeline.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledTimeline {
    #[serde(skip)]
    pub origin: Option<TimelineOrigin>,
    pub segments: Vec<Segment>,
    pub skipped_gaps: Vec<SkippedGap>,
}

impl AssembledTimeline {
    pub fn count(&self, kind: SegmentKind) -> usize {
        self.segments.iter().filter(|s| s.kind() == kind).count()
    }

    /// Freeze into a single-pass render plan.
    pub fn into_plan(self, settings: RenderSettings) -> RenderPlan {
        RenderPlan::new(self.segments, settings)
    }
}

/// Sweep, classify and merge a clip list.
///
/// The output is a pure function of the clips and settings.
pub fn assemble_timeline(clips: &[ClipDescriptor], settings: &RenderSettings) -> AssembledTimeline {
    let intervals = intervals::build_intervals(clips);
    let classification = SegmentClassifier::from_settings(settings).classify(&intervals);

    let timeline = AssembledTimeline {
        origin: intervals::timeline_origin(clips),
        segments: classification.segments,
        skipped_gaps: classification.skipped_gaps,
    };

    tracing::info!(
        clips = clips.len(),
        segments = timeline.segments.len(),
        single = timeline.count(SegmentKind::Single),
        overlap = timeline.count(SegmentKind::Overlap),
        gap = timeline.count(SegmentKind::Gap),
        skipped_gaps = timeline.skipped_gaps.len(),
        "Assembled timeline"
    );

    timeline
}
