//! Show how a clip list would be rendered.

use std::path::PathBuf;

use chronocam_common::config::AppConfig;
use chronocam_render_engine::pipeline::{preview_render, RenderPreview};
use chronocam_render_engine::RenderMode;
use chronocam_timeline_model::clip::load_clip_list;
use chronocam_timeline_model::segment::{Segment, SegmentKind};

use super::RenderArgs;

pub fn run(
    config: &AppConfig,
    clips_path: PathBuf,
    output: PathBuf,
    json: bool,
    args: RenderArgs,
) -> anyhow::Result<()> {
    let settings = args.resolve(config)?;
    let clips = load_clip_list(&clips_path)?;
    tracing::debug!(clips = clips.len(), settings = %settings, "Loaded clip list");
    let preview = preview_render(&clips, &settings, &output)?;
    tracing::debug!(
        mode = ?preview.mode,
        segments = preview.timeline.segments.len(),
        "Planned render"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("Timeline for {} ({} clips)", clips_path.display(), clips.len());
    println!("  Settings: {settings}");
    println!("{}", "=".repeat(96));
    print_segments(&preview);
    println!("{}", "=".repeat(96));
    print_summary(&preview, settings.batch.argv_threshold);
    Ok(())
}

fn print_segments(preview: &RenderPreview) {
    println!(
        "{:>5}  {:<8} {:<19}  {:<19}  {:>9}  CONTENT",
        "#", "KIND", "START", "END", "SECS"
    );
    for (i, segment) in preview.timeline.segments.iter().enumerate() {
        println!(
            "{:>5}  {:<8} {:<19}  {:<19}  {:>9.3}  {}",
            i + 1,
            segment.kind().to_string(),
            segment.start().absolute().to_string(),
            segment.end().absolute().to_string(),
            segment.timeline_duration_secs(),
            describe(segment),
        );
    }
}

fn describe(segment: &Segment) -> String {
    match segment {
        Segment::Gap { label, .. } => label.replace('\n', " / "),
        Segment::Single { clip, .. } => format!("{} {}", clip.camera_id(), clip.display_name()),
        Segment::Overlap {
            clip_a,
            clip_b,
            excluded,
            ..
        } => {
            let mut text = format!(
                "{} {} | {} {}",
                clip_a.camera_id(),
                clip_a.display_name(),
                clip_b.camera_id(),
                clip_b.display_name()
            );
            if !excluded.is_empty() {
                let names: Vec<&str> = excluded.iter().map(|c| c.camera_id()).collect();
                text.push_str(&format!(" (not shown: {})", names.join(", ")));
            }
            text
        }
    }
}

fn print_summary(preview: &RenderPreview, threshold: usize) {
    let timeline = &preview.timeline;
    println!(
        "Segments: {} single, {} overlap, {} gap ({} short gaps skipped)",
        timeline.count(SegmentKind::Single),
        timeline.count(SegmentKind::Overlap),
        timeline.count(SegmentKind::Gap),
        timeline.skipped_gaps.len(),
    );
    println!("Expected duration: {:.3}s", preview.expected_duration_secs);
    println!(
        "Command estimate: {} inputs, {} chars (threshold {threshold}), filter script ~{} bytes",
        preview.estimate.input_count, preview.estimate.argv_chars, preview.estimate.filter_script_bytes,
    );
    match (&preview.mode, &preview.batches) {
        (RenderMode::Batched, Some(batches)) => {
            println!("Mode: batched ({} batches)", batches.len());
            for (i, (batch, inputs)) in batches
                .batches()
                .iter()
                .zip(batches.input_counts())
                .enumerate()
            {
                println!(
                    "  Batch {:>4}: {:>4} segments, {:>4} inputs",
                    i + 1,
                    batch.len(),
                    inputs
                );
            }
        }
        _ => println!("Mode: single pass"),
    }
}
