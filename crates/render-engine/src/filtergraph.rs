//! Filter graph generation for a render plan.
//!
//! Every rendered segment becomes one labelled stream `[sN]` of exactly
//! the planned number of frames, all normalized to the output size, rate
//! and pixel format, and the streams are joined with a single `concat`.

use std::fmt::Write as _;
use std::path::PathBuf;

use chronocam_common::clock::FrameRate;
use chronocam_common::error::{ChronocamError, ChronocamResult};
use chronocam_timeline_model::clip::ClipDescriptor;
use chronocam_timeline_model::plan::{rendered_frames, RenderPlan};
use chronocam_timeline_model::segment::Segment;
use chronocam_timeline_model::settings::{PaneAlignment, RenderSettings, SplitOrientation};
use chronocam_timeline_model::time::{duration_secs, TimelineInstant};

/// One real file input of the encoder command.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderInput {
    pub path: PathBuf,
    /// Seek offset into the clip (`-ss`).
    pub seek_secs: f64,
    /// Length to read (`-t`).
    pub duration_secs: f64,
    /// Full clip length; bounds both numeric fields.
    pub clip_secs: f64,
}

/// Filter script plus the inputs it references by index.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub script: String,
    pub inputs: Vec<EncoderInput>,
    pub streams: usize,
    pub expected_frames: u64,
}

/// Build the filter graph for a plan.
///
/// Segments that render no frames (a zero-length slate, or a covered span
/// shorter than half a frame) are left out.
pub fn build_filter_graph(plan: &RenderPlan) -> ChronocamResult<FilterGraph> {
    let settings = plan.settings();
    let mut script = String::new();
    let mut inputs = Vec::new();
    let mut streams = 0usize;
    let mut expected_frames = 0u64;

    for segment in plan.segments() {
        let frames = rendered_frames(segment, settings);
        if frames == 0 {
            continue;
        }
        let out = format!("[s{streams}]");

        match segment {
            Segment::Gap { label, .. } => {
                push_line(&mut script, &slate_chain(label, frames, settings, &out));
            }
            Segment::Single { clip, start, .. } => {
                let index = push_input(&mut inputs, clip, *start, frames, settings.fps);
                let (w, h) = (settings.width, settings.height);
                let chain = normalize_chain(index, w, h, ("(ow-iw)/2", "(oh-ih)/2"), frames, settings);
                push_line(&mut script, &format!("{chain}{out}"));
            }
            Segment::Overlap {
                clip_a,
                clip_b,
                start,
                ..
            } => {
                let a = push_input(&mut inputs, clip_a, *start, frames, settings.fps);
                let b = push_input(&mut inputs, clip_b, *start, frames, settings.fps);
                let (pane_w, pane_h) = settings.layout.pane_size(settings.width, settings.height);
                let pad = alignment_padding(settings.layout.orientation, settings.layout.alignment);

                let pane_a = format!("[p{streams}a]");
                let pane_b = format!("[p{streams}b]");
                let chain_a = normalize_chain(a, pane_w, pane_h, pad, frames, settings);
                let chain_b = normalize_chain(b, pane_w, pane_h, pad, frames, settings);
                push_line(&mut script, &format!("{chain_a}{pane_a}"));
                push_line(&mut script, &format!("{chain_b}{pane_b}"));

                let layout = match settings.layout.orientation {
                    SplitOrientation::SideBySide => "0_0|w0_0",
                    SplitOrientation::Stacked => "0_0|0_h0",
                };
                // Odd output sizes leave a strip the panes do not cover.
                let stack = format!(
                    "{pane_a}{pane_b}xstack=inputs=2:layout={layout}:fill=black,\
                     pad={w}:{h}:0:0:color=black,setsar=1,format=yuv420p{out}",
                    w = settings.width,
                    h = settings.height,
                );
                push_line(&mut script, &stack);
            }
        }

        streams += 1;
        expected_frames += frames;
    }

    if streams == 0 {
        return Err(ChronocamError::command_generation(
            "Timeline has nothing to render: every segment is shorter than one frame",
        ));
    }

    let labels: String = (0..streams).map(|i| format!("[s{i}]")).collect();
    let _ = write!(script, "{labels}concat=n={streams}:v=1:a=0[vout]");

    Ok(FilterGraph {
        script,
        inputs,
        streams,
        expected_frames,
    })
}

fn push_line(script: &mut String, line: &str) {
    script.push_str(line);
    script.push_str(";\n");
}

fn push_input(
    inputs: &mut Vec<EncoderInput>,
    clip: &ClipDescriptor,
    start: TimelineInstant,
    frames: u64,
    fps: FrameRate,
) -> usize {
    inputs.push(EncoderInput {
        path: clip.path().to_path_buf(),
        seek_secs: duration_secs(clip.seek_to(start.absolute())),
        duration_secs: fps.secs_for_frames(frames),
        clip_secs: clip.duration_secs(),
    });
    inputs.len() - 1
}

/// Decode-side normalization ending in exactly `frames` frames.
fn normalize_chain(
    index: usize,
    width: u32,
    height: u32,
    (pad_x, pad_y): (&str, &str),
    frames: u64,
    settings: &RenderSettings,
) -> String {
    let download = if settings.hardware_decode {
        "hwdownload,format=nv12,"
    } else {
        ""
    };
    format!(
        "[{index}:v]{download}settb=AVTB,setpts=PTS-STARTPTS,fps={fps}:round=near,\
         scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:{pad_x}:{pad_y}:color=black,setsar=1,format=yuv420p,\
         tpad=stop_mode=clone:stop={frames},trim=end_frame={frames}",
        fps = settings.fps,
    )
}

fn slate_chain(label: &str, frames: u64, settings: &RenderSettings, out: &str) -> String {
    let slate = &settings.slate;
    let font_size = slate.font_size_for(settings.height);
    let line_height = font_size * 3 / 2;
    let lines: Vec<&str> = label.lines().filter(|l| !l.trim().is_empty()).collect();
    let block = line_height * lines.len() as u32;

    let mut chain = format!(
        "color=c={bg}:size={w}x{h}:rate={fps}:duration={dur:.6}",
        bg = escape_filter_value(&slate.background),
        w = settings.width,
        h = settings.height,
        fps = settings.fps,
        dur = settings.fps.secs_for_frames(frames),
    );
    for (i, line) in lines.iter().enumerate() {
        let y_offset = line_height * i as u32;
        let _ = write!(
            chain,
            ",drawtext=expansion=none:text={text}:fontsize={font_size}:fontcolor={color}:\
             x=(w-text_w)/2:y=(h-{block})/2+{y_offset}",
            text = escape_drawtext(line.trim()),
            color = escape_filter_value(&slate.text_color),
        );
    }
    let _ = write!(chain, ",setsar=1,format=yuv420p,trim=end_frame={frames}{out}");
    chain
}

fn alignment_padding(
    orientation: SplitOrientation,
    alignment: PaneAlignment,
) -> (&'static str, &'static str) {
    match (orientation, alignment) {
        (SplitOrientation::SideBySide, PaneAlignment::Top) => ("(ow-iw)/2", "0"),
        (SplitOrientation::SideBySide, PaneAlignment::Bottom) => ("(ow-iw)/2", "oh-ih"),
        (SplitOrientation::Stacked, PaneAlignment::Left) => ("0", "(oh-ih)/2"),
        (SplitOrientation::Stacked, PaneAlignment::Right) => ("ow-iw", "(oh-ih)/2"),
        _ => ("(ow-iw)/2", "(oh-ih)/2"),
    }
}

/// Escape text for a drawtext `text` option inside a filter script.
///
/// The value passes through two parsers: the filter option parser and
/// the filtergraph parser, so it is escaped for each in turn.
pub fn escape_drawtext(text: &str) -> String {
    escape_graph(&escape_option(text))
}

fn escape_filter_value(value: &str) -> String {
    escape_graph(&escape_option(value))
}

fn escape_option(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':', '=', '%'])
}

fn escape_graph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronocam_timeline_model::settings::SplitLayout;
    use chronocam_timeline_model::time::{AbsoluteTime, TimelineOrigin};

    fn t(s: &str) -> AbsoluteTime {
        AbsoluteTime::parse(s).unwrap()
    }

    fn overlap_plan(settings: RenderSettings) -> RenderPlan {
        let origin = TimelineOrigin::new(t("2025-05-21T10:00:00"));
        let a = ClipDescriptor::new("/cam/a.mp4", "A", t("2025-05-21T10:00:00"), t("2025-05-21T10:01:40"))
            .unwrap();
        let b = ClipDescriptor::new("/cam/b.mp4", "B", t("2025-05-21T10:00:50"), t("2025-05-21T10:02:30"))
            .unwrap();
        let segments = vec![
            Segment::Single {
                clip: a.clone(),
                start: origin.place(a.start()),
                end: origin.place(b.start()),
            },
            Segment::Overlap {
                clip_a: a.clone(),
                clip_b: b.clone(),
                excluded: Vec::new(),
                start: origin.place(b.start()),
                end: origin.place(a.end()),
            },
            Segment::Gap {
                start: origin.place(b.end()),
                end: origin.place(t("2025-05-21T10:05:00")),
                label: "GAP\n10:02:30 to 10:05:00\nDuration: 2m 30s".to_string(),
            },
        ];
        RenderPlan::new(segments, settings)
    }

    #[test]
    fn test_inputs_follow_segment_order_with_seeks() {
        let graph = build_filter_graph(&overlap_plan(RenderSettings::default())).unwrap();
        assert_eq!(graph.inputs.len(), 3);
        assert_eq!(graph.inputs[0].seek_secs, 0.0);
        assert_eq!(graph.inputs[1].path, PathBuf::from("/cam/a.mp4"));
        assert_eq!(graph.inputs[1].seek_secs, 50.0);
        assert_eq!(graph.inputs[2].path, PathBuf::from("/cam/b.mp4"));
        assert_eq!(graph.inputs[2].seek_secs, 0.0);
        assert_eq!(graph.inputs[2].duration_secs, 50.0);
        assert_eq!(graph.streams, 3);
        assert_eq!(graph.expected_frames, (50 + 50 + 5) * 30);
    }

    #[test]
    fn test_script_shape() {
        let graph = build_filter_graph(&overlap_plan(RenderSettings::default())).unwrap();
        let script = &graph.script;
        assert!(script.contains("[0:v]settb=AVTB,setpts=PTS-STARTPTS,fps=30:round=near"));
        assert!(script.contains("scale=960:1080:force_original_aspect_ratio=decrease"));
        assert!(script.contains("xstack=inputs=2:layout=0_0|w0_0:fill=black"));
        assert!(script.contains("color=c=#1a1a1a:size=1920x1080:rate=30:duration=5.000000"));
        assert_eq!(script.matches("drawtext=").count(), 3);
        assert!(script.contains("expansion=none"));
        assert!(script.ends_with("[s0][s1][s2]concat=n=3:v=1:a=0[vout]"));
    }

    #[test]
    fn test_stacked_layout_and_alignment() {
        let settings = RenderSettings {
            layout: SplitLayout {
                orientation: SplitOrientation::Stacked,
                alignment: PaneAlignment::Left,
            },
            ..RenderSettings::default()
        };
        let graph = build_filter_graph(&overlap_plan(settings)).unwrap();
        assert!(graph.script.contains("layout=0_0|0_h0"));
        assert!(graph.script.contains("pad=1920:540:0:(oh-ih)/2:color=black"));
    }

    #[test]
    fn test_zero_slate_is_left_out() {
        let mut settings = RenderSettings::default();
        settings.slate.duration_secs = 0.0;
        let graph = build_filter_graph(&overlap_plan(settings)).unwrap();
        assert_eq!(graph.streams, 2);
        assert!(!graph.script.contains("drawtext"));
    }

    #[test]
    fn test_hardware_decode_downloads_frames() {
        let settings = RenderSettings {
            hardware_decode: true,
            ..RenderSettings::default()
        };
        let graph = build_filter_graph(&overlap_plan(settings)).unwrap();
        assert!(graph.script.contains("[0:v]hwdownload,format=nv12,settb=AVTB"));
    }

    #[test]
    fn test_drawtext_escaping() {
        assert_eq!(escape_drawtext("19:35:12"), "19\\\\:35\\\\:12");
        assert_eq!(escape_drawtext("a,b"), "a\\,b");
        assert_eq!(escape_drawtext("it's"), "it\\\\\\'s");
        assert_eq!(escape_drawtext("50%"), "50\\\\%");
    }

    #[test]
    fn test_empty_plan_is_an_error() {
        let plan = RenderPlan::new(Vec::new(), RenderSettings::default());
        assert!(matches!(
            build_filter_graph(&plan),
            Err(ChronocamError::CommandGeneration { .. })
        ));
    }
}
