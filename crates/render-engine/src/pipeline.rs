//! Top-level render pipeline.

use std::path::{Path, PathBuf};

use chronocam_common::error::{ChronocamError, ChronocamResult};
use chronocam_timeline_core::{assemble_timeline, AssembledTimeline, BatchSplitter};
use chronocam_timeline_model::clip::{validate_clip_list, ClipDescriptor};
use chronocam_timeline_model::plan::{BatchPlan, RenderPlan};
use chronocam_timeline_model::settings::RenderSettings;
use serde::Serialize;

use crate::command::{build_encoder_command, EncoderCommand};
use crate::coordinator::{
    concatenate, output_written, BatchCoordinator, BatchReport, BatchStatus,
};
use crate::estimate::{ensure_within_limit, CommandEstimate, CommandSizeEstimator, RenderMode};
use crate::ffmpeg::{command_exists, program_name, run_encoder, EncoderJob, ProcessControl};
use crate::state::{RenderState, RenderStateMachine};
use crate::workspace::RenderWorkspace;

/// Container used for intermediate batch files.
const BATCH_EXTENSION: &str = "mp4";

/// Everything needed for one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub clips: Vec<ClipDescriptor>,
    pub settings: RenderSettings,
    pub output: PathBuf,
}

/// A completed render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    pub output: PathBuf,
    pub mode: RenderMode,
    pub expected_duration_secs: f64,
    pub segments: usize,
    pub skipped_gaps: usize,
    /// Empty for single-pass renders.
    pub batches: Vec<BatchReport>,
    /// Working directory left on disk when retention was requested.
    pub retained_workspace: Option<PathBuf>,
    pub states: Vec<RenderState>,
}

/// What a render would do, computed without touching the disk.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPreview {
    pub timeline: AssembledTimeline,
    pub estimate: CommandEstimate,
    pub mode: RenderMode,
    pub expected_duration_secs: f64,
    /// Batch grouping when the render would be batched.
    pub batches: Option<BatchPlan>,
}

/// Assemble the timeline and decide how it would be encoded.
pub fn preview_render(
    clips: &[ClipDescriptor],
    settings: &RenderSettings,
    output: &Path,
) -> ChronocamResult<RenderPreview> {
    settings.validate()?;
    validate_clip_list(clips)?;

    let timeline = assemble_timeline(clips, settings);
    let plan = RenderPlan::new(timeline.segments.clone(), settings.clone());
    let estimator = CommandSizeEstimator::from_settings(&settings.batch);
    // Same path length as the workspace script name.
    let script = output.with_file_name(".chronocam-XXXXXX/timeline.filter");
    let estimate = estimator.estimate(&plan, &script, output);
    let mode = estimator.decide(&estimate);
    let batches = (mode == RenderMode::Batched)
        .then(|| BatchSplitter::new(settings.batch.batch_size).split(&timeline.segments));

    Ok(RenderPreview {
        expected_duration_secs: plan.expected_duration_secs(),
        timeline,
        estimate,
        mode,
        batches,
    })
}

/// Render a clip list to `request.output`.
///
/// Validation happens before any encoder is started. On failure the state
/// machine ends in `Failed` or `Cancelled` and the workspace is removed
/// unless retention was requested.
pub async fn render_timeline(
    request: RenderRequest,
    control: ProcessControl,
) -> ChronocamResult<RenderOutcome> {
    let mut sm = RenderStateMachine::new();
    let result = run_pipeline(&request, &control, &mut sm).await;
    if let Err(e) = &result {
        sm.fail_with(e);
        tracing::error!(state = %sm.state(), error = %e, "Render failed");
    }
    result.map(|mut outcome| {
        outcome.states = sm.history().to_vec();
        outcome
    })
}

async fn run_pipeline(
    request: &RenderRequest,
    control: &ProcessControl,
    sm: &mut RenderStateMachine,
) -> ChronocamResult<RenderOutcome> {
    let settings = &request.settings;
    let output = request.output.as_path();

    // Validating
    settings.validate()?;
    validate_clip_list(&request.clips)?;
    if output.is_dir() {
        return Err(ChronocamError::validation(format!(
            "Output path {} is a directory",
            output.display()
        )));
    }
    if !command_exists(&settings.ffmpeg_path) {
        return Err(ChronocamError::process(
            settings.ffmpeg_path.display().to_string(),
            "encoder not found (expected ffmpeg in PATH or at the configured path)",
        ));
    }

    sm.transition(RenderState::Estimating)?;
    let timeline = assemble_timeline(&request.clips, settings);
    let segments = timeline.segments.len();
    let skipped_gaps = timeline.skipped_gaps.len();
    let plan = RenderPlan::new(timeline.segments, settings.clone());
    if plan.is_empty() {
        return Err(ChronocamError::validation(
            "Timeline has nothing to render: every segment is shorter than one frame",
        ));
    }

    let workspace = RenderWorkspace::create(output, settings.batch.keep_temp_files)?;
    let estimator = CommandSizeEstimator::from_settings(&settings.batch);
    let estimate = estimator.estimate(&plan, &workspace.filter_script_path(None), output);
    let mode = estimator.decide(&estimate);
    tracing::info!(
        inputs = estimate.input_count,
        argv_chars = estimate.argv_chars,
        filter_script_bytes = estimate.filter_script_bytes,
        threshold = estimator.threshold(),
        ?mode,
        "Estimated encoder command"
    );

    let expected_duration_secs = plan.expected_duration_secs();
    let batches = match mode {
        RenderMode::SinglePass => {
            sm.transition(RenderState::SinglePass)?;
            render_single_pass(&plan, &workspace, output, control, sm).await?;
            Vec::new()
        }
        RenderMode::Batched => {
            sm.transition(RenderState::Batching)?;
            render_batches(&plan, &workspace, output, control, sm).await?
        }
    };

    sm.transition(RenderState::Completed)?;
    let retained_workspace = workspace.finish();
    tracing::info!(
        output = %output.display(),
        duration_secs = expected_duration_secs,
        "Render complete"
    );

    Ok(RenderOutcome {
        output: output.to_path_buf(),
        mode,
        expected_duration_secs,
        segments,
        skipped_gaps,
        batches,
        retained_workspace,
        states: Vec::new(),
    })
}

async fn render_single_pass(
    plan: &RenderPlan,
    workspace: &RenderWorkspace,
    output: &Path,
    control: &ProcessControl,
    sm: &mut RenderStateMachine,
) -> ChronocamResult<()> {
    let command = build_encoder_command(plan, &workspace.filter_script_path(None), output)?;
    ensure_within_limit(&command)?;

    sm.transition(RenderState::Encoding)?;
    command.write_filter_script()?;
    let job = EncoderJob {
        label: "single pass".to_string(),
        program: command.program.clone(),
        args: command.args.clone(),
        total_frames: command.expected_frames,
        expected_duration_secs: command.expected_duration_secs,
    };
    tracing::info!(
        inputs = command.input_count,
        frames = command.expected_frames,
        "Encoding timeline in a single pass"
    );
    run_encoder(&job, control).await?;

    if !output_written(output) {
        return Err(ChronocamError::process(
            program_name(&command.program),
            format!(
                "encoder exited cleanly but wrote no output to {}",
                output.display()
            ),
        ));
    }
    Ok(())
}

/// Build every batch command up front so an oversized batch fails before
/// any encoder starts.
fn batch_commands(
    plan: &RenderPlan,
    workspace: &RenderWorkspace,
) -> ChronocamResult<Vec<EncoderCommand>> {
    let settings = plan.settings();
    let batch_plan = BatchSplitter::new(settings.batch.batch_size).split(plan.segments());
    tracing::info!(
        batches = batch_plan.len(),
        inputs = ?batch_plan.input_counts(),
        "Split timeline into batches"
    );

    let mut commands = Vec::new();
    for (i, batch) in batch_plan
        .into_render_plans(settings)
        .into_iter()
        .enumerate()
    {
        // A batch of sub-frame segments has nothing to encode.
        if batch.is_empty() {
            continue;
        }
        let index = commands.len() + 1;
        let command = build_encoder_command(
            &batch,
            &workspace.filter_script_path(Some(index)),
            &workspace.batch_output_path(index, BATCH_EXTENSION),
        )?;
        ensure_within_limit(&command).map_err(|e| {
            tracing::error!(batch = i + 1, "Batch command exceeds the argument limit");
            e
        })?;
        commands.push(command);
    }
    Ok(commands)
}

async fn render_batches(
    plan: &RenderPlan,
    workspace: &RenderWorkspace,
    output: &Path,
    control: &ProcessControl,
    sm: &mut RenderStateMachine,
) -> ChronocamResult<Vec<BatchReport>> {
    let commands = batch_commands(plan, workspace)?;
    let total = commands.len();
    let total_frames: u64 = commands.iter().map(|c| c.expected_frames).sum();

    sm.transition(RenderState::Encoding)?;
    let reports = BatchCoordinator::new(plan.settings().batch.parallelism, control.clone())
        .run(commands)
        .await;

    let finished: Vec<PathBuf> = reports
        .iter()
        .filter(|r| r.succeeded())
        .map(|r| r.output.clone())
        .collect();
    let cancelled = control.cancel.is_cancelled();
    if cancelled || finished.len() < total {
        let retained = if workspace.keeps_files() {
            finished.clone()
        } else {
            Vec::new()
        };
        let failures = reports
            .iter()
            .filter_map(|r| match &r.status {
                BatchStatus::Succeeded => None,
                BatchStatus::Failed { error } => Some(format!("batch {}: {error}", r.index)),
                BatchStatus::Cancelled => Some(format!("batch {}: cancelled", r.index)),
                BatchStatus::NotAttempted => Some(format!("batch {}: not attempted", r.index)),
            })
            .collect();
        if cancelled {
            tracing::info!(succeeded = finished.len(), total, "Batches stopped by cancellation");
        }
        return Err(ChronocamError::BatchesIncomplete {
            succeeded: finished.len(),
            total,
            cancelled,
            failures,
            retained,
        });
    }

    sm.transition(RenderState::Concatenating)?;
    concatenate(
        &plan.settings().ffmpeg_path,
        &finished,
        &workspace.concat_list_path(),
        output,
        plan.expected_duration_secs(),
        total_frames,
        control,
    )
    .await?;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronocam_timeline_model::time::AbsoluteTime;

    fn clip(path: &str, cam: &str, start: &str, end: &str) -> ClipDescriptor {
        ClipDescriptor::new(
            path,
            cam,
            AbsoluteTime::parse(start).unwrap(),
            AbsoluteTime::parse(end).unwrap(),
        )
        .unwrap()
    }

    fn clips(count: usize) -> Vec<ClipDescriptor> {
        (0..count)
            .map(|i| {
                let start = format!("2025-05-21T10:{:02}:00", i * 2);
                let end = format!("2025-05-21T10:{:02}:30", i * 2);
                clip(&format!("/footage/cam1/clip_{i:03}.mp4"), "cam1", &start, &end)
            })
            .collect()
    }

    #[test]
    fn test_preview_small_timeline_is_single_pass() {
        let preview = preview_render(
            &clips(3),
            &RenderSettings::default(),
            Path::new("/renders/out.mp4"),
        )
        .unwrap();
        assert_eq!(preview.mode, RenderMode::SinglePass);
        assert!(preview.batches.is_none());
        assert_eq!(preview.estimate.input_count, 3);
        // Three 30s clips and two 5s slates.
        assert!((preview.expected_duration_secs - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_preview_forced_batching_groups_segments() {
        let mut settings = RenderSettings::default();
        settings.batch.force_batch = true;
        settings.batch.batch_size = 2;
        let preview =
            preview_render(&clips(5), &settings, Path::new("/renders/out.mp4")).unwrap();
        assert_eq!(preview.mode, RenderMode::Batched);
        let batches = preview.batches.unwrap();
        assert!(batches.len() >= 2);
        assert!(batches.input_counts().iter().all(|&n| n <= 2));
    }

    #[test]
    fn test_preview_rejects_empty_clip_list() {
        let err = preview_render(&[], &RenderSettings::default(), Path::new("out.mp4"))
            .unwrap_err();
        assert!(matches!(err, ChronocamError::InputValidation { .. }));
    }

    #[tokio::test]
    async fn test_missing_encoder_fails_during_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = PathBuf::from("/nonexistent/bin/ffmpeg");
        let request = RenderRequest {
            clips: clips(2),
            settings,
            output: dir.path().join("out.mp4"),
        };

        let err = render_timeline(request, ProcessControl::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChronocamError::ExternalProcess { .. }));
        // Nothing was created next to the output.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_output_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let request = RenderRequest {
            clips: clips(1),
            settings: RenderSettings::default(),
            output: dir.path().to_path_buf(),
        };
        let err = render_timeline(request, ProcessControl::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChronocamError::InputValidation { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pipeline_states_follow_single_pass_path() {
        let tools = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut sm = RenderStateMachine::new();
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = crate::test_support::writing_encoder(tools.path());
        let request = RenderRequest {
            clips: clips(2),
            settings,
            output: dir.path().join("out.mp4"),
        };
        let outcome = run_pipeline(&request, &ProcessControl::default(), &mut sm)
            .await
            .unwrap();
        assert_eq!(outcome.mode, RenderMode::SinglePass);
        assert_eq!(
            sm.history(),
            &[
                RenderState::Validating,
                RenderState::Estimating,
                RenderState::SinglePass,
                RenderState::Encoding,
                RenderState::Completed,
            ]
        );
        assert!(outcome.retained_workspace.is_none());
        assert!(output_written(&dir.path().join("out.mp4")));
    }

    #[tokio::test]
    async fn test_single_pass_without_output_fails() {
        if !command_exists(Path::new("true")) {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut settings = RenderSettings::default();
        // Exits successfully without producing anything.
        settings.ffmpeg_path = PathBuf::from("true");
        let request = RenderRequest {
            clips: clips(2),
            settings,
            output: dir.path().join("out.mp4"),
        };

        let err = render_timeline(request, ProcessControl::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChronocamError::ExternalProcess { .. }));
        assert!(err.to_string().contains("wrote no output"));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_batched_render_concatenates_after_all_batches() {
        let tools = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = crate::test_support::writing_encoder(tools.path());
        settings.batch.force_batch = true;
        settings.batch.batch_size = 2;
        settings.batch.keep_temp_files = true;
        let request = RenderRequest {
            clips: clips(5),
            settings,
            output: dir.path().join("out.mp4"),
        };

        let outcome = render_timeline(request, ProcessControl::default())
            .await
            .unwrap();
        assert_eq!(outcome.mode, RenderMode::Batched);
        assert!(outcome.batches.len() >= 2);
        assert!(outcome.batches.iter().all(BatchReport::succeeded));
        assert!(outcome.batches.iter().all(|r| output_written(&r.output)));
        assert_eq!(
            outcome.states,
            vec![
                RenderState::Validating,
                RenderState::Estimating,
                RenderState::Batching,
                RenderState::Encoding,
                RenderState::Concatenating,
                RenderState::Completed,
            ]
        );
        assert!(output_written(&outcome.output));
        let kept = outcome.retained_workspace.unwrap();
        assert!(kept.join("concat.txt").exists());
        assert!(kept.join("batch_0001.filter").exists());
    }

    #[tokio::test]
    async fn test_batches_without_output_report_incomplete() {
        if !command_exists(Path::new("true")) {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = PathBuf::from("true");
        settings.batch.force_batch = true;
        settings.batch.batch_size = 1;
        let request = RenderRequest {
            clips: clips(3),
            settings,
            output: dir.path().join("out.mp4"),
        };

        let err = render_timeline(request, ProcessControl::default())
            .await
            .unwrap_err();
        let ChronocamError::BatchesIncomplete {
            succeeded,
            cancelled,
            failures,
            ..
        } = err
        else {
            panic!("expected incomplete batches, got {err:?}");
        };
        assert_eq!(succeeded, 0);
        assert!(!cancelled);
        assert!(failures.iter().all(|f| f.contains("wrote no output")));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[tokio::test]
    async fn test_failing_batches_report_incomplete() {
        if !command_exists(Path::new("false")) {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = PathBuf::from("false");
        settings.batch.force_batch = true;
        settings.batch.batch_size = 1;
        let request = RenderRequest {
            clips: clips(3),
            settings,
            output: dir.path().join("out.mp4"),
        };

        let err = render_timeline(request, ProcessControl::default())
            .await
            .unwrap_err();
        let ChronocamError::BatchesIncomplete {
            succeeded,
            total,
            cancelled,
            failures,
            retained,
        } = err
        else {
            panic!("expected incomplete batches, got {err:?}");
        };
        assert_eq!(succeeded, 0);
        assert!(total >= 3);
        assert!(!cancelled);
        assert_eq!(failures.len(), total);
        assert!(failures[0].starts_with("batch 1: "));
        assert!(retained.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_batch_render_keeps_per_batch_results() {
        let tools = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        // First batch finishes at once; every later batch hangs until killed.
        let encoder = crate::test_support::shell_script(
            tools.path(),
            "slow-ffmpeg.sh",
            "for last; do :; done\ncase \"$last\" in\n  *batch_0001*) printf x > \"$last\" ;;\n  *) exec sleep 5 ;;\nesac",
        );
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = encoder;
        settings.batch.force_batch = true;
        settings.batch.batch_size = 1;
        settings.batch.parallelism = 1;
        settings.batch.keep_temp_files = true;
        let request = RenderRequest {
            clips: clips(3),
            settings,
            output: dir.path().join("out.mp4"),
        };
        let control = ProcessControl::default();
        let token = control.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            token.cancel();
        });

        let err = render_timeline(request, control).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(err.to_string().starts_with("Render cancelled: 1 of "));
        let ChronocamError::BatchesIncomplete {
            succeeded,
            total,
            cancelled,
            failures,
            retained,
        } = err
        else {
            panic!("expected cancelled batches, got {err:?}");
        };
        assert!(cancelled);
        assert_eq!(succeeded, 1);
        assert!(total >= 3);
        assert_eq!(failures.len(), total - 1);
        assert_eq!(failures[0], "batch 2: cancelled");
        for (i, failure) in failures.iter().enumerate().skip(1) {
            assert_eq!(failure, &format!("batch {}: not attempted", i + 2));
        }
        assert_eq!(retained.len(), 1);
        assert!(retained[0].ends_with("batch_0001.mp4"));
        assert!(output_written(&retained[0]));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_ends_cancelled() {
        if !command_exists(Path::new("true")) {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut settings = RenderSettings::default();
        settings.ffmpeg_path = PathBuf::from("true");
        let control = ProcessControl::default();
        control.cancel.cancel();
        let request = RenderRequest {
            clips: clips(2),
            settings,
            output: dir.path().join("out.mp4"),
        };

        let err = render_timeline(request, control).await.unwrap_err();
        assert!(err.is_cancellation());
    }
}
