//! Encoder command lines.

use std::path::{Path, PathBuf};

use chronocam_common::error::ChronocamResult;
use chronocam_timeline_model::plan::RenderPlan;
use chronocam_timeline_model::settings::{RenderSettings, VideoCodec};

use crate::filtergraph::{build_filter_graph, EncoderInput};

/// Flags that open every encoder command.
pub const HEAD_ARGS: [&str; 6] = ["-y", "-hide_banner", "-nostats", "-progress", "pipe:1", "-nostdin"];

/// Per-input flags requesting GPU decode.
pub const HWACCEL_ARGS: [&str; 4] = ["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"];

/// A fully built encoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Filter graph text; must be written to `filter_script_path` before running.
    pub filter_script: String,
    pub filter_script_path: PathBuf,
    pub output: PathBuf,
    pub input_count: usize,
    pub expected_frames: u64,
    pub expected_duration_secs: f64,
}

impl EncoderCommand {
    /// Length of the command line with arguments joined by single spaces.
    pub fn argv_len(&self) -> usize {
        self.program.to_string_lossy().len()
            + self.args.iter().map(|arg| arg.len() + 1).sum::<usize>()
    }

    /// Persist the filter script next to where the command expects it.
    pub fn write_filter_script(&self) -> ChronocamResult<()> {
        std::fs::write(&self.filter_script_path, &self.filter_script)?;
        Ok(())
    }
}

/// Build the single encoder command for a plan.
pub fn build_encoder_command(
    plan: &RenderPlan,
    filter_script_path: &Path,
    output: &Path,
) -> ChronocamResult<EncoderCommand> {
    let settings = plan.settings();
    let graph = build_filter_graph(plan)?;

    let mut args: Vec<String> = HEAD_ARGS.iter().map(|a| a.to_string()).collect();
    for input in &graph.inputs {
        push_input_args(&mut args, input, settings.hardware_decode);
    }
    args.extend([
        "-filter_complex_script".to_string(),
        filter_script_path.to_string_lossy().into_owned(),
        "-map".to_string(),
        "[vout]".to_string(),
        "-fps_mode".to_string(),
        "passthrough".to_string(),
        "-an".to_string(),
    ]);
    args.extend(codec_args(settings));
    args.push(output.to_string_lossy().into_owned());

    tracing::debug!(
        inputs = graph.inputs.len(),
        streams = graph.streams,
        script_len = graph.script.len(),
        "Built encoder command"
    );

    Ok(EncoderCommand {
        program: settings.ffmpeg_path.clone(),
        args,
        filter_script: graph.script,
        filter_script_path: filter_script_path.to_path_buf(),
        output: output.to_path_buf(),
        input_count: graph.inputs.len(),
        expected_frames: graph.expected_frames,
        expected_duration_secs: settings.fps.secs_for_frames(graph.expected_frames),
    })
}

fn push_input_args(args: &mut Vec<String>, input: &EncoderInput, hardware_decode: bool) {
    if hardware_decode {
        args.extend(HWACCEL_ARGS.iter().map(|a| a.to_string()));
    }
    args.extend([
        "-ss".to_string(),
        format!("{:.6}", input.seek_secs),
        "-t".to_string(),
        format!("{:.6}", input.duration_secs),
        "-i".to_string(),
        input.path.to_string_lossy().into_owned(),
    ]);
}

/// Output encoder arguments for the configured codec.
pub fn codec_args(settings: &RenderSettings) -> Vec<String> {
    let gop = settings.fps.two_second_gop().to_string();
    let encoder = settings.codec.encoder_name().to_string();

    let mut args = match settings.codec {
        VideoCodec::H264 | VideoCodec::Hevc => vec![
            "-c:v".to_string(),
            encoder,
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            "20".to_string(),
        ],
        VideoCodec::H264Nvenc | VideoCodec::HevcNvenc => vec![
            "-c:v".to_string(),
            encoder,
            "-preset".to_string(),
            "p5".to_string(),
            "-rc".to_string(),
            "vbr".to_string(),
            "-cq".to_string(),
            "20".to_string(),
            "-b:v".to_string(),
            "0".to_string(),
            "-bf".to_string(),
            "2".to_string(),
            "-spatial-aq".to_string(),
            "1".to_string(),
            "-temporal-aq".to_string(),
            "1".to_string(),
        ],
    };
    args.extend([
        "-g".to_string(),
        gop,
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args
}
