//! Render a clip list to video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chronocam_common::config::AppConfig;
use chronocam_common::error::ChronocamError;
use chronocam_render_engine::pipeline::{render_timeline, RenderRequest};
use chronocam_render_engine::{EncodeProgress, ProcessControl, ProgressCallback, RenderMode};
use chronocam_timeline_model::clip::load_clip_list;

use super::RenderArgs;

pub async fn run(
    config: &AppConfig,
    clips_path: PathBuf,
    output: PathBuf,
    keep_temp: bool,
    args: RenderArgs,
) -> anyhow::Result<()> {
    let mut settings = args.resolve(config)?;
    settings.batch.keep_temp_files |= keep_temp;
    let clips = load_clip_list(&clips_path)?;
    tracing::debug!(
        clips = clips.len(),
        output = %output.display(),
        settings = %settings,
        "Starting render"
    );

    println!("Rendering {} clips from {}", clips.len(), clips_path.display());
    println!("  Output: {}", output.display());
    println!("  Settings: {settings}");

    let progress_cb: ProgressCallback = Arc::new(|p: EncodeProgress| {
        print!(
            "\r  [{}] {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.job,
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
        if p.complete {
            println!();
        }
        std::io::stdout().flush().ok();
    });

    let control = ProcessControl {
        timeout: settings.process_timeout_secs.map(Duration::from_secs),
        progress: Some(progress_cb),
        ..ProcessControl::default()
    };

    let cancel = control.cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling render");
            eprintln!("\nCancelling render...");
            cancel.cancel();
        }
    });

    let request = RenderRequest {
        clips,
        settings,
        output,
    };
    let result = render_timeline(request, control).await;
    ctrl_c.abort();

    match result {
        Ok(outcome) => {
            println!("\nRender complete: {}", outcome.output.display());
            println!(
                "  Duration: {:.3}s, {} segments, {} short gaps skipped",
                outcome.expected_duration_secs, outcome.segments, outcome.skipped_gaps
            );
            if outcome.mode == RenderMode::Batched {
                println!("  Encoded in {} batches", outcome.batches.len());
            }
            if let Some(dir) = &outcome.retained_workspace {
                println!("  Working files kept in {}", dir.display());
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!(cancelled = e.is_cancellation(), error = ?e, "Render did not complete");
            eprintln!("\nRender failed: {e}");
            match &e {
                ChronocamError::ExternalProcess {
                    stderr_tail: Some(tail),
                    ..
                } => eprintln!("{tail}"),
                ChronocamError::BatchesIncomplete {
                    failures, retained, ..
                } => {
                    for failure in failures {
                        eprintln!("  {failure}");
                    }
                    if !retained.is_empty() {
                        eprintln!("Finished batch outputs:");
                        for path in retained {
                            eprintln!("  {}", path.display());
                        }
                    }
                }
                _ => {}
            }
            Err(e.into())
        }
    }
}
