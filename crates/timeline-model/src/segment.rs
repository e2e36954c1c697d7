//! Atomic intervals and classified timeline segments.

use chrono::Duration;
use serde::Serialize;

use crate::clip::ClipDescriptor;
use crate::time::{duration_secs, TimelineInstant};

/// A half-open span `[start, end)` during which the set of active clips
/// does not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start: TimelineInstant,
    pub end: TimelineInstant,
    /// Active clips ordered by start, camera id, then path.
    pub active: Vec<ClipDescriptor>,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end.offset() - self.start.offset()
    }

    pub fn duration_secs(&self) -> f64 {
        duration_secs(self.duration())
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Segment kind, used for summaries and merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Gap,
    Single,
    Overlap,
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gap => "gap",
            Self::Single => "single",
            Self::Overlap => "overlap",
        };
        f.write_str(name)
    }
}

/// One classified piece of the output timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// No coverage; rendered as a slate carrying `label`.
    Gap {
        start: TimelineInstant,
        end: TimelineInstant,
        label: String,
    },
    /// Exactly one camera covers the span.
    Single {
        clip: ClipDescriptor,
        start: TimelineInstant,
        end: TimelineInstant,
    },
    /// Two cameras composed side by side; any further active clips are
    /// listed in `excluded` and not shown.
    Overlap {
        clip_a: ClipDescriptor,
        clip_b: ClipDescriptor,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        excluded: Vec<ClipDescriptor>,
        start: TimelineInstant,
        end: TimelineInstant,
    },
}

impl Segment {
    pub fn start(&self) -> TimelineInstant {
        match self {
            Self::Gap { start, .. } | Self::Single { start, .. } | Self::Overlap { start, .. } => {
                *start
            }
        }
    }

    pub fn end(&self) -> TimelineInstant {
        match self {
            Self::Gap { end, .. } | Self::Single { end, .. } | Self::Overlap { end, .. } => *end,
        }
    }

    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Gap { .. } => SegmentKind::Gap,
            Self::Single { .. } => SegmentKind::Single,
            Self::Overlap { .. } => SegmentKind::Overlap,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap { .. })
    }

    /// Encoder inputs this segment needs (a gap slate is synthesized).
    pub fn input_count(&self) -> usize {
        match self {
            Self::Gap { .. } => 0,
            Self::Single { .. } => 1,
            Self::Overlap { .. } => 2,
        }
    }

    /// Clips actually shown, in pane order.
    pub fn participants(&self) -> Vec<&ClipDescriptor> {
        match self {
            Self::Gap { .. } => Vec::new(),
            Self::Single { clip, .. } => vec![clip],
            Self::Overlap { clip_a, clip_b, .. } => vec![clip_a, clip_b],
        }
    }

    /// Clips active during the span but not shown.
    pub fn excluded(&self) -> &[ClipDescriptor] {
        match self {
            Self::Overlap { excluded, .. } => excluded,
            _ => &[],
        }
    }

    /// Length of the span on the timeline.
    pub fn timeline_duration(&self) -> Duration {
        self.end().offset() - self.start().offset()
    }

    pub fn timeline_duration_secs(&self) -> f64 {
        duration_secs(self.timeline_duration())
    }
}
