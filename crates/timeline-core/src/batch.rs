//! Continuity-preserving batch splitting.
//!
//! Long timelines are encoded in several independent batches. A batch may
//! only end where coverage already breaks, so the splitter cuts at gap
//! slates: every gap travels with the covered run that follows it, and
//! runs are packed greedily up to the target input count.

use chronocam_timeline_model::plan::BatchPlan;
use chronocam_timeline_model::segment::Segment;

/// Default encoder inputs per batch.
pub const DEFAULT_BATCH_INPUTS: usize = 150;

/// Groups segments into batches without cutting covered runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSplitter {
    target_inputs: usize,
}

impl Default for BatchSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_INPUTS)
    }
}

impl BatchSplitter {
    /// A target of zero is treated as one.
    pub fn new(target_inputs: usize) -> Self {
        Self {
            target_inputs: target_inputs.max(1),
        }
    }

    pub fn target_inputs(&self) -> usize {
        self.target_inputs
    }

    pub fn split(&self, segments: &[Segment]) -> BatchPlan {
        let mut batches: Vec<Vec<Segment>> = Vec::new();
        let mut current: Vec<Segment> = Vec::new();
        let mut current_inputs = 0usize;

        for run in runs(segments) {
            let run_inputs: usize = run.iter().map(Segment::input_count).sum();
            if !current.is_empty() && current_inputs + run_inputs > self.target_inputs {
                batches.push(std::mem::take(&mut current));
                current_inputs = 0;
            }
            if run_inputs > self.target_inputs {
                tracing::warn!(
                    inputs = run_inputs,
                    target = self.target_inputs,
                    "Uninterrupted coverage exceeds the batch size; encoding it as one oversized batch"
                );
            }
            current.extend_from_slice(run);
            current_inputs += run_inputs;
        }
        if !current.is_empty() {
            batches.push(current);
        }

        tracing::info!(
            batches = batches.len(),
            target = self.target_inputs,
            "Split timeline into batches"
        );
        BatchPlan::new(batches)
    }
}

/// Cut points: every gap opens a new run.
fn runs(segments: &[Segment]) -> Vec<&[Segment]> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_gap() && i > start {
            out.push(&segments[start..i]);
            start = i;
        }
    }
    if start < segments.len() {
        out.push(&segments[start..]);
    }
    out
}
