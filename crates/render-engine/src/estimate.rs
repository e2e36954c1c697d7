//! Command-length estimation and the single-pass / batch decision.
//!
//! Operating systems cap the total length of a process command line. The
//! estimate is computed from the plan alone, before any command is built,
//! and always errs on the long side of what the emitter produces.

use std::path::Path;

use serde::Serialize;

use chronocam_common::error::{ChronocamError, ChronocamResult};
use chronocam_timeline_model::plan::RenderPlan;
use chronocam_timeline_model::segment::Segment;
use chronocam_timeline_model::settings::{BatchSettings, RenderSettings};

use crate::command::{codec_args, EncoderCommand, HEAD_ARGS, HWACCEL_ARGS};

/// Longest command line the operating system accepts.
pub const ARGV_HARD_LIMIT: usize = 32_768;

/// Estimated length at which rendering switches to batches.
pub const DEFAULT_ARGV_THRESHOLD: usize = 29_000;

/// Extra characters added on top of the computed estimate.
const SLACK_CHARS: usize = 64;

/// Decimal places used for `-ss` and `-t` values.
const FRACTION_CHARS: usize = 7;

/// How a plan will be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    SinglePass,
    Batched,
}

/// Predicted command size for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandEstimate {
    pub input_count: usize,
    /// Upper bound on the command line length, in bytes.
    pub argv_chars: usize,
    /// Approximate size of the filter script written alongside.
    pub filter_script_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSizeEstimator {
    threshold: usize,
    force_batch: bool,
}

impl Default for CommandSizeEstimator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ARGV_THRESHOLD,
            force_batch: false,
        }
    }
}

impl CommandSizeEstimator {
    pub fn new(threshold: usize, force_batch: bool) -> Self {
        Self {
            threshold: threshold.min(ARGV_HARD_LIMIT),
            force_batch,
        }
    }

    pub fn from_settings(batch: &BatchSettings) -> Self {
        Self::new(batch.argv_threshold, batch.force_batch)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Estimate the command for `plan` rendered to `output` with its
    /// filter script at `filter_script_path`.
    pub fn estimate(
        &self,
        plan: &RenderPlan,
        filter_script_path: &Path,
        output: &Path,
    ) -> CommandEstimate {
        let settings = plan.settings();
        let frame_secs = settings.fps.frame_secs();
        let per_input_fixed = joined_len(&["-ss", "-t", "-i"])
            + if settings.hardware_decode {
                joined_len(&HWACCEL_ARGS)
            } else {
                0
            };

        let mut input_count = 0usize;
        let mut inputs_chars = 0usize;
        let mut filter_script_bytes = 0usize;

        for segment in plan.rendered_segments() {
            for clip in segment.participants() {
                let width = numeric_width(clip.duration_secs() + frame_secs);
                inputs_chars += per_input_fixed
                    + 2 * (width + 1)
                    + clip.path().to_string_lossy().len()
                    + 1;
                input_count += 1;
            }
            filter_script_bytes += segment_script_bytes(segment, settings);
        }

        let tail = joined_len(&[
            "-filter_complex_script",
            "-map",
            "[vout]",
            "-fps_mode",
            "passthrough",
            "-an",
        ]) + filter_script_path.to_string_lossy().len()
            + 1
            + codec_args(settings).iter().map(|a| a.len() + 1).sum::<usize>()
            + output.to_string_lossy().len()
            + 1;

        let argv_chars = settings.ffmpeg_path.to_string_lossy().len()
            + joined_len(&HEAD_ARGS)
            + inputs_chars
            + tail
            + SLACK_CHARS;

        CommandEstimate {
            input_count,
            argv_chars,
            filter_script_bytes: filter_script_bytes + 16 + 4 * input_count,
        }
    }

    /// Single pass below the threshold, batches at or above it.
    pub fn decide(&self, estimate: &CommandEstimate) -> RenderMode {
        if self.force_batch || estimate.argv_chars >= self.threshold {
            RenderMode::Batched
        } else {
            RenderMode::SinglePass
        }
    }
}

/// Reject a built command that the operating system would refuse.
pub fn ensure_within_limit(command: &EncoderCommand) -> ChronocamResult<()> {
    let len = command.argv_len();
    if len >= ARGV_HARD_LIMIT {
        return Err(ChronocamError::command_generation(format!(
            "Encoder command for {} is {len} characters ({} inputs), over the {ARGV_HARD_LIMIT} character limit",
            command.output.display(),
            command.input_count,
        )));
    }
    Ok(())
}

/// Each argument plus its separating space.
fn joined_len(args: &[&str]) -> usize {
    args.iter().map(|a| a.len() + 1).sum()
}

/// Upper bound on `format!("{:.6}", v)` for `0 <= v < bound`.
fn numeric_width(bound: f64) -> usize {
    // Rounding to six places can carry into the next integer.
    let integer = bound.max(0.0).floor() as u64 + 1;
    integer.to_string().len() + FRACTION_CHARS
}

fn segment_script_bytes(segment: &Segment, settings: &RenderSettings) -> usize {
    let chain = 300;
    match segment {
        Segment::Gap { label, .. } => {
            let lines = label.lines().count().max(1);
            120 + settings.slate.background.len() + lines * (140 + settings.slate.text_color.len())
                + 2 * label.len()
        }
        Segment::Single { .. } => chain,
        Segment::Overlap { .. } => 2 * chain + 140,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::build_encoder_command;
    use chronocam_timeline_model::clip::ClipDescriptor;
    use chronocam_timeline_model::time::{AbsoluteTime, TimelineOrigin};
    use chrono::Duration;

    fn long_plan(clips: usize, path_len: usize, settings: RenderSettings) -> RenderPlan {
        let base = AbsoluteTime::parse("2025-05-21T00:00:00").unwrap();
        let origin = TimelineOrigin::new(base);
        let segments = (0..clips)
            .map(|i| {
                let start = base.checked_add(Duration::seconds(60 * i as i64)).unwrap();
                let end = start.checked_add(Duration::seconds(60)).unwrap();
                let path = format!("/{}/{i:05}.mp4", "d".repeat(path_len));
                let clip = ClipDescriptor::new(path, "cam", start, end).unwrap();
                Segment::Single {
                    clip,
                    start: origin.place(start),
                    end: origin.place(end),
                }
            })
            .collect();
        RenderPlan::new(segments, settings)
    }

    #[test]
    fn test_numeric_width_bounds_formatting() {
        assert_eq!(numeric_width(9.5), 2 + FRACTION_CHARS);
        assert!(format!("{:.6}", 9.9999999).len() <= numeric_width(9.9999999));
        assert!(format!("{:.6}", 0.0).len() <= numeric_width(0.0));
    }

    #[test]
    fn test_small_plan_is_single_pass() {
        let plan = long_plan(3, 10, RenderSettings::default());
        let estimator = CommandSizeEstimator::default();
        let estimate = estimator.estimate(&plan, Path::new("/tmp/g"), Path::new("/out.mp4"));
        assert_eq!(estimate.input_count, 3);
        assert_eq!(estimator.decide(&estimate), RenderMode::SinglePass);
    }

    #[test]
    fn test_long_paths_trigger_batches() {
        let plan = long_plan(300, 80, RenderSettings::default());
        let estimator = CommandSizeEstimator::default();
        let estimate = estimator.estimate(&plan, Path::new("/tmp/g"), Path::new("/out.mp4"));
        assert!(estimate.argv_chars >= DEFAULT_ARGV_THRESHOLD);
        assert_eq!(estimator.decide(&estimate), RenderMode::Batched);
    }

    #[test]
    fn test_force_batch_overrides() {
        let plan = long_plan(1, 4, RenderSettings::default());
        let estimator = CommandSizeEstimator::new(DEFAULT_ARGV_THRESHOLD, true);
        let estimate = estimator.estimate(&plan, Path::new("g"), Path::new("o.mp4"));
        assert_eq!(estimator.decide(&estimate), RenderMode::Batched);
    }

    #[test]
    fn test_estimate_covers_emitted_command() {
        for hardware_decode in [false, true] {
            let settings = RenderSettings {
                hardware_decode,
                ..RenderSettings::default()
            };
            let plan = long_plan(40, 33, settings);
            let (script, out) = (Path::new("/tmp/work/batch_0001.txt"), Path::new("/cases/out.mp4"));
            let estimate = CommandSizeEstimator::default().estimate(&plan, script, out);
            let command = build_encoder_command(&plan, script, out).unwrap();
            assert!(estimate.argv_chars >= command.argv_len());
        }
    }

    #[test]
    fn test_hard_limit_rejects_huge_command() {
        let plan = long_plan(400, 120, RenderSettings::default());
        let command = build_encoder_command(&plan, Path::new("g"), Path::new("o.mp4")).unwrap();
        assert!(matches!(
            ensure_within_limit(&command),
            Err(ChronocamError::CommandGeneration { .. })
        ));
    }
}
