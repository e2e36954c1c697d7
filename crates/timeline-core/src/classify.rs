//! Segment classification.
//!
//! Each atomic interval becomes a gap, a single-camera span or a two-camera
//! overlap, depending on how many clips are active. Touching intervals that
//! show the same clips are merged afterwards.

use chrono::Duration;
use serde::Serialize;

use chronocam_timeline_model::segment::{Interval, Segment};
use chronocam_timeline_model::settings::{RenderSettings, ShortGapPolicy};
use chronocam_timeline_model::time::{secs_to_duration, TimelineInstant};

use crate::label::LabelFormatter;

/// An empty span that was too short for a slate and left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedGap {
    pub start: TimelineInstant,
    pub end: TimelineInstant,
}

/// Turns atomic intervals into timeline segments.
#[derive(Debug, Clone)]
pub struct SegmentClassifier {
    min_gap: Duration,
    short_gap_policy: ShortGapPolicy,
    labels: LabelFormatter,
}

/// Classifier output.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub segments: Vec<Segment>,
    pub skipped_gaps: Vec<SkippedGap>,
}

impl SegmentClassifier {
    pub fn new(min_gap: Duration, short_gap_policy: ShortGapPolicy, labels: LabelFormatter) -> Self {
        Self {
            min_gap,
            short_gap_policy,
            labels,
        }
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self::new(
            secs_to_duration(settings.min_gap_secs),
            settings.short_gap_policy,
            LabelFormatter::new(settings.slate.label.clone(), settings.slate.time_format),
        )
    }

    pub fn classify(&self, intervals: &[Interval]) -> Classification {
        let mut out = Classification::default();

        for interval in intervals {
            let Some(segment) = self.classify_one(interval, &mut out.skipped_gaps) else {
                continue;
            };
            match out.segments.last_mut() {
                Some(previous) if can_merge(previous, &segment) => merge_into(previous, segment),
                _ => out.segments.push(segment),
            }
        }

        out
    }

    fn classify_one(&self, interval: &Interval, skipped: &mut Vec<SkippedGap>) -> Option<Segment> {
        let (start, end) = (interval.start, interval.end);
        match interval.active.as_slice() {
            [] => {
                if interval.duration() < self.min_gap
                    && self.short_gap_policy == ShortGapPolicy::Skip
                {
                    tracing::debug!(
                        at = %start.absolute(),
                        secs = interval.duration_secs(),
                        "Skipping short gap"
                    );
                    skipped.push(SkippedGap { start, end });
                    return None;
                }
                Some(Segment::Gap {
                    start,
                    end,
                    label: self.labels.format(start.absolute(), end.absolute()),
                })
            }
            [clip] => Some(Segment::Single {
                clip: clip.clone(),
                start,
                end,
            }),
            [clip_a, clip_b, rest @ ..] => {
                if !rest.is_empty() {
                    tracing::warn!(
                        at = %start.absolute(),
                        shown_a = %clip_a.display_name(),
                        shown_b = %clip_b.display_name(),
                        excluded = rest.len(),
                        "More than two cameras active; extra cameras are not shown"
                    );
                }
                Some(Segment::Overlap {
                    clip_a: clip_a.clone(),
                    clip_b: clip_b.clone(),
                    excluded: rest.to_vec(),
                    start,
                    end,
                })
            }
        }
    }
}

fn can_merge(previous: &Segment, next: &Segment) -> bool {
    !previous.is_gap()
        && previous.kind() == next.kind()
        && previous.end() == next.start()
        && previous.participants() == next.participants()
}

fn merge_into(previous: &mut Segment, next: Segment) {
    match (previous, next) {
        (Segment::Single { end, .. }, Segment::Single { end: next_end, .. }) => *end = next_end,
        (
            Segment::Overlap { end, excluded, .. },
            Segment::Overlap {
                end: next_end,
                excluded: next_excluded,
                ..
            },
        ) => {
            *end = next_end;
            for clip in next_excluded {
                if !excluded.contains(&clip) {
                    excluded.push(clip);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervals::build_intervals;
    use chronocam_timeline_model::clip::ClipDescriptor;
    use chronocam_timeline_model::segment::SegmentKind;
    use chronocam_timeline_model::time::AbsoluteTime;

    fn clip(name: &str, cam: &str, start: &str, end: &str) -> ClipDescriptor {
        ClipDescriptor::new(
            name,
            cam,
            AbsoluteTime::parse(start).unwrap(),
            AbsoluteTime::parse(end).unwrap(),
        )
        .unwrap()
    }

    fn classifier(policy: ShortGapPolicy) -> SegmentClassifier {
        SegmentClassifier::new(Duration::seconds(1), policy, LabelFormatter::default())
    }

    #[test]
    fn test_short_gap_is_skipped_by_default() {
        let clips = [
            clip("a.mp4", "A", "2025-05-21T10:00:00", "2025-05-21T10:00:10"),
            clip("b.mp4", "B", "2025-05-21T10:00:10.500", "2025-05-21T10:00:20"),
        ];
        let result = classifier(ShortGapPolicy::Skip).classify(&build_intervals(&clips));
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.skipped_gaps.len(), 1);
        assert_eq!(result.skipped_gaps[0].start.offset_secs(), 10.0);
    }

    #[test]
    fn test_short_gap_slate_policy_keeps_gap() {
        let clips = [
            clip("a.mp4", "A", "2025-05-21T10:00:00", "2025-05-21T10:00:10"),
            clip("b.mp4", "B", "2025-05-21T10:00:10.500", "2025-05-21T10:00:20"),
        ];
        let result = classifier(ShortGapPolicy::Slate).classify(&build_intervals(&clips));
        let kinds: Vec<_> = result.segments.iter().map(Segment::kind).collect();
        assert_eq!(
            kinds,
            vec![SegmentKind::Single, SegmentKind::Gap, SegmentKind::Single]
        );
        assert!(result.skipped_gaps.is_empty());
    }

    #[test]
    fn test_gap_at_threshold_is_kept() {
        let clips = [
            clip("a.mp4", "A", "2025-05-21T10:00:00", "2025-05-21T10:00:10"),
            clip("b.mp4", "B", "2025-05-21T10:00:11", "2025-05-21T10:00:20"),
        ];
        let result = classifier(ShortGapPolicy::Skip).classify(&build_intervals(&clips));
        assert_eq!(result.segments[1].kind(), SegmentKind::Gap);
    }

    #[test]
    fn test_overlap_spans_merge_when_shown_clips_match() {
        // C joins and leaves while A and B stay on screen.
        let a = clip("a.mp4", "A", "2025-05-21T10:00:00", "2025-05-21T10:01:00");
        let b = clip("b.mp4", "B", "2025-05-21T10:00:00", "2025-05-21T10:01:00");
        let c = clip("c.mp4", "C", "2025-05-21T10:00:20", "2025-05-21T10:00:40");
        let result = classifier(ShortGapPolicy::Skip).classify(&build_intervals(&[a, b, c.clone()]));
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].excluded(), &[c]);
        assert_eq!(result.segments[0].timeline_duration_secs(), 60.0);
    }

    #[test]
    fn test_gap_label_uses_absolute_neighbours() {
        let clips = [
            clip("a.mp4", "A", "2025-05-21T19:30:00", "2025-05-21T19:35:12"),
            clip("b.mp4", "B", "2025-05-21T19:40:15", "2025-05-21T19:45:00"),
        ];
        let result = classifier(ShortGapPolicy::Skip).classify(&build_intervals(&clips));
        match &result.segments[1] {
            Segment::Gap { label, .. } => {
                assert_eq!(label, "GAP\n19:35:12 to 19:40:15\nDuration: 5m 3s")
            }
            other => panic!("expected gap, got {other:?}"),
        }
    }
}
