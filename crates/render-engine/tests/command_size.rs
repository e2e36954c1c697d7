use std::path::Path;

use chronocam_common::clock::FrameRate;
use chronocam_render_engine::command::build_encoder_command;
use chronocam_render_engine::estimate::{CommandSizeEstimator, RenderMode};
use chronocam_timeline_core::{assemble_timeline, BatchSplitter};
use chronocam_timeline_model::clip::ClipDescriptor;
use chronocam_timeline_model::plan::RenderPlan;
use chronocam_timeline_model::settings::{RenderSettings, ShortGapPolicy, VideoCodec};
use chronocam_timeline_model::time::AbsoluteTime;
use proptest::prelude::*;

fn base() -> AbsoluteTime {
    AbsoluteTime::parse("2025-05-21T08:00:00").unwrap()
}

fn at(offset_ms: i64) -> AbsoluteTime {
    base()
        .checked_add(chrono::Duration::milliseconds(offset_ms))
        .unwrap()
}

/// (camera, start ms, length ms, path stem length)
fn clip_strategy() -> impl Strategy<Value = (u8, i64, i64, usize)> {
    (0u8..3, 0i64..600_000, 40i64..240_000, 1usize..120)
}

fn build_clips(raw: &[(u8, i64, i64, usize)]) -> Vec<ClipDescriptor> {
    raw.iter()
        .enumerate()
        .map(|(i, &(camera, start, len, stem))| {
            let path = format!("/mnt/evidence/cam{camera}/{}_{i}.mp4", "x".repeat(stem));
            ClipDescriptor::new(path, format!("cam{camera}"), at(start), at(start + len)).unwrap()
        })
        .collect()
}

fn frame_rate_strategy() -> impl Strategy<Value = FrameRate> {
    prop_oneof![
        Just(FrameRate::FPS_25),
        Just(FrameRate::FPS_30),
        Just(FrameRate::NTSC_30),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn estimate_never_undercounts_emitted_command(
        raw in prop::collection::vec(clip_strategy(), 1..40),
        fps in frame_rate_strategy(),
        hardware_decode in any::<bool>(),
        nvenc in any::<bool>(),
        slate_short_gaps in any::<bool>(),
    ) {
        let clips = build_clips(&raw);
        let mut settings = RenderSettings::default();
        settings.fps = fps;
        settings.hardware_decode = hardware_decode;
        settings.codec = if nvenc { VideoCodec::H264Nvenc } else { VideoCodec::H264 };
        if slate_short_gaps {
            settings.short_gap_policy = ShortGapPolicy::Slate;
        }

        let timeline = assemble_timeline(&clips, &settings);
        let plan = RenderPlan::new(timeline.segments, settings);
        prop_assume!(!plan.is_empty());

        let script = Path::new("/tmp/.chronocam-abc123/timeline.filter");
        let output = Path::new("/srv/renders/case-0042/output.mp4");
        let estimate = CommandSizeEstimator::default().estimate(&plan, script, output);
        let command = build_encoder_command(&plan, script, output).unwrap();

        prop_assert_eq!(estimate.input_count, command.input_count);
        prop_assert!(
            estimate.argv_chars >= command.argv_len(),
            "estimate {} < actual {}",
            estimate.argv_chars,
            command.argv_len()
        );
    }

    #[test]
    fn batch_commands_cover_single_pass_frames(
        raw in prop::collection::vec(clip_strategy(), 1..30),
        batch_size in 1usize..6,
    ) {
        let clips = build_clips(&raw);
        let settings = RenderSettings::default();
        let timeline = assemble_timeline(&clips, &settings);
        let plan = RenderPlan::new(timeline.segments.clone(), settings.clone());
        prop_assume!(!plan.is_empty());

        let dir = Path::new("/tmp/work");
        let single = build_encoder_command(&plan, &dir.join("t.filter"), &dir.join("o.mp4")).unwrap();

        let batches = BatchSplitter::new(batch_size).split(&timeline.segments);
        let mut frames = 0u64;
        let mut inputs = 0usize;
        for (i, batch) in batches.into_render_plans(&settings).iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let command = build_encoder_command(
                batch,
                &dir.join(format!("b{i}.filter")),
                &dir.join(format!("b{i}.mp4")),
            )
            .unwrap();
            frames += command.expected_frames;
            inputs += command.input_count;
        }

        prop_assert_eq!(frames, single.expected_frames);
        prop_assert_eq!(inputs, single.input_count);
    }
}

#[test]
fn hundreds_of_clips_switch_to_batches() {
    let raw: Vec<(u8, i64, i64, usize)> = (0..400)
        .map(|i| (0u8, i as i64 * 60_000, 30_000, 48))
        .collect();
    let clips = build_clips(&raw);
    let settings = RenderSettings::default();
    let timeline = assemble_timeline(&clips, &settings);
    let plan = RenderPlan::new(timeline.segments, settings);

    let estimator = CommandSizeEstimator::default();
    let estimate = estimator.estimate(
        &plan,
        Path::new("/tmp/.chronocam-abc123/timeline.filter"),
        Path::new("out.mp4"),
    );
    assert_eq!(estimate.input_count, 400);
    assert_eq!(estimator.decide(&estimate), RenderMode::Batched);
}
