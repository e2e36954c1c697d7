pub mod check;
pub mod plan;
pub mod render;

use std::path::PathBuf;

use chronocam_common::config::AppConfig;
use chronocam_common::error::ChronocamResult;
use chronocam_timeline_model::settings::{
    LabelPreset, PaneAlignment, RenderSettings, ShortGapPolicy, SplitOrientation,
};
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LayoutArg {
    SideBySide,
    Stacked,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AlignArg {
    Top,
    Center,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShortGapArg {
    Skip,
    Slate,
}

/// Render options shared by `plan` and `render`. Unset options fall back
/// to the config file.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Encoder binary (name on PATH or absolute path)
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Output width
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height
    #[arg(long)]
    pub height: Option<u32>,

    /// Output frame rate (30, 29.97, 30000/1001)
    #[arg(long)]
    pub fps: Option<String>,

    /// Video codec: h264, hevc, h264_nvenc, hevc_nvenc
    #[arg(long)]
    pub codec: Option<String>,

    /// Overlap layout
    #[arg(long, value_enum)]
    pub layout: Option<LayoutArg>,

    /// Pane alignment inside the overlap canvas
    #[arg(long, value_enum)]
    pub align: Option<AlignArg>,

    /// Seconds each gap slate is shown (0 disables slates)
    #[arg(long)]
    pub slate_secs: Option<f64>,

    /// Empty spans shorter than this are not slated
    #[arg(long)]
    pub min_gap_secs: Option<f64>,

    /// What to do with empty spans shorter than the minimum
    #[arg(long, value_enum)]
    pub short_gaps: Option<ShortGapArg>,

    /// Slate label: gap, nothing_of_interest, motion_gap, chronology_gap, custom
    #[arg(long)]
    pub label: Option<String>,

    /// Text for the custom label
    #[arg(long)]
    pub label_text: Option<String>,

    /// Slate time format: time_only, date_time, duration_multiline
    #[arg(long)]
    pub time_format: Option<String>,

    /// Slate font size in pixels
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Slate background color
    #[arg(long)]
    pub background: Option<String>,

    /// Slate text color
    #[arg(long)]
    pub text_color: Option<String>,

    /// Maximum encoder inputs per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Always render in batches
    #[arg(long)]
    pub force_batch: bool,

    /// Estimated command length at which batching starts
    #[arg(long)]
    pub argv_threshold: Option<usize>,

    /// Batches encoded at once
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Decode inputs on the GPU
    #[arg(long)]
    pub hwaccel: bool,

    /// Kill an encoder process after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl RenderArgs {
    /// Config defaults with command-line overrides applied.
    pub fn resolve(&self, config: &AppConfig) -> ChronocamResult<RenderSettings> {
        let mut defaults = config.render.clone();
        if let Some(fps) = &self.fps {
            defaults.fps = fps.clone();
        }
        if let Some(codec) = &self.codec {
            defaults.codec = codec.clone();
        }
        let mut settings = RenderSettings::from_defaults(&defaults)?;

        if let Some(path) = &self.ffmpeg {
            settings.ffmpeg_path = path.clone();
        }
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(layout) = self.layout {
            settings.layout.orientation = match layout {
                LayoutArg::SideBySide => SplitOrientation::SideBySide,
                LayoutArg::Stacked => SplitOrientation::Stacked,
            };
        }
        if let Some(align) = self.align {
            settings.layout.alignment = match align {
                AlignArg::Top => PaneAlignment::Top,
                AlignArg::Center => PaneAlignment::Center,
                AlignArg::Bottom => PaneAlignment::Bottom,
                AlignArg::Left => PaneAlignment::Left,
                AlignArg::Right => PaneAlignment::Right,
            };
        }
        if let Some(secs) = self.slate_secs {
            settings.slate.duration_secs = secs;
        }
        if let Some(secs) = self.min_gap_secs {
            settings.min_gap_secs = secs;
        }
        if let Some(policy) = self.short_gaps {
            settings.short_gap_policy = match policy {
                ShortGapArg::Skip => ShortGapPolicy::Skip,
                ShortGapArg::Slate => ShortGapPolicy::Slate,
            };
        }
        match (&self.label, &self.label_text) {
            (Some(name), text) => {
                settings.slate.label = LabelPreset::from_name(name, text.as_deref())?;
            }
            (None, Some(text)) => settings.slate.label = LabelPreset::Custom(text.clone()),
            (None, None) => {}
        }
        if let Some(style) = &self.time_format {
            settings.slate.time_format = style.parse()?;
        }
        if let Some(size) = self.font_size {
            settings.slate.font_size = Some(size);
        }
        if let Some(color) = &self.background {
            settings.slate.background = color.clone();
        }
        if let Some(color) = &self.text_color {
            settings.slate.text_color = color.clone();
        }
        if let Some(size) = self.batch_size {
            settings.batch.batch_size = size;
        }
        settings.batch.force_batch |= self.force_batch;
        if let Some(threshold) = self.argv_threshold {
            settings.batch.argv_threshold = threshold;
        }
        if let Some(parallel) = self.parallel {
            settings.batch.parallelism = parallel;
        }
        settings.hardware_decode |= self.hwaccel;
        if let Some(secs) = self.timeout_secs {
            settings.process_timeout_secs = (secs > 0).then_some(secs);
        }

        settings.validate()?;
        Ok(settings)
    }
}
