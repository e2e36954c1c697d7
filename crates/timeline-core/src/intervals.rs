//! Atomic interval sweep.
//!
//! Every clip start and end is a boundary. Between two consecutive
//! boundaries the set of active clips is constant, so the timeline is cut
//! into half-open intervals that exactly partition
//! `[earliest start, latest end)`.

use std::collections::BTreeSet;

use chronocam_timeline_model::clip::ClipDescriptor;
use chronocam_timeline_model::segment::Interval;
use chronocam_timeline_model::time::{AbsoluteTime, TimelineOrigin};

/// The earliest clip start, or `None` for an empty clip list.
pub fn timeline_origin(clips: &[ClipDescriptor]) -> Option<TimelineOrigin> {
    clips
        .iter()
        .map(ClipDescriptor::start)
        .min()
        .map(TimelineOrigin::new)
}

/// Cut the clip list into atomic intervals.
///
/// Active sets are ordered by start, camera id, then path. An empty clip
/// list yields no intervals.
pub fn build_intervals(clips: &[ClipDescriptor]) -> Vec<Interval> {
    let Some(origin) = timeline_origin(clips) else {
        return Vec::new();
    };

    let boundaries: Vec<AbsoluteTime> = clips
        .iter()
        .flat_map(|clip| [clip.start(), clip.end()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut by_start: Vec<&ClipDescriptor> = clips.iter().collect();
    by_start.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));

    let mut intervals = Vec::with_capacity(boundaries.len().saturating_sub(1));
    let mut active: Vec<&ClipDescriptor> = Vec::new();
    let mut next = 0;

    for window in boundaries.windows(2) {
        let (from, to) = (window[0], window[1]);

        active.retain(|clip| clip.end() > from);
        while next < by_start.len() && by_start[next].start() <= from {
            if by_start[next].end() > from {
                active.push(by_start[next]);
            }
            next += 1;
        }

        intervals.push(Interval {
            start: origin.place(from),
            end: origin.place(to),
            active: active.iter().map(|clip| (*clip).clone()).collect(),
        });
    }

    tracing::debug!(
        clips = clips.len(),
        boundaries = boundaries.len(),
        intervals = intervals.len(),
        "Built atomic intervals"
    );

    intervals
}
