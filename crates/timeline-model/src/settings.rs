//! Resolved render settings.
//!
//! These are the concrete values one render invocation runs with, after
//! configuration defaults and command-line overrides have been merged.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chronocam_common::clock::FrameRate;
use chronocam_common::config::RenderDefaults;
use chronocam_common::error::{ChronocamError, ChronocamResult};
use serde::{Deserialize, Serialize};

/// Longest custom slate label accepted.
pub const MAX_CUSTOM_LABEL_CHARS: usize = 50;

/// Complete settings for one render invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Output resolution in pixels.
    pub width: u32,
    pub height: u32,

    /// Output frame rate.
    pub fps: FrameRate,

    /// Output video codec.
    pub codec: VideoCodec,

    /// Two-pane layout used for overlapping coverage.
    #[serde(default)]
    pub layout: SplitLayout,

    /// Gap slate appearance and text.
    #[serde(default)]
    pub slate: SlateSettings,

    /// Empty spans shorter than this (seconds) are handled by `short_gap_policy`.
    pub min_gap_secs: f64,

    /// What to do with empty spans shorter than `min_gap_secs`.
    #[serde(default)]
    pub short_gap_policy: ShortGapPolicy,

    /// Batching and parallelism.
    #[serde(default)]
    pub batch: BatchSettings,

    /// Request GPU decoding for every input (`-hwaccel cuda`).
    #[serde(default)]
    pub hardware_decode: bool,

    /// Kill an encoder process that runs longer than this.
    #[serde(default)]
    pub process_timeout_secs: Option<u64>,

    /// Encoder binary.
    pub ffmpeg_path: PathBuf,
}

/// Output video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    H264,
    Hevc,
    H264Nvenc,
    HevcNvenc,
}

impl VideoCodec {
    /// Encoder name passed to `-c:v`.
    pub fn encoder_name(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Hevc => "libx265",
            Self::H264Nvenc => "h264_nvenc",
            Self::HevcNvenc => "hevc_nvenc",
        }
    }

    pub fn is_nvenc(&self) -> bool {
        matches!(self, Self::H264Nvenc | Self::HevcNvenc)
    }
}

impl FromStr for VideoCodec {
    type Err = ChronocamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "libx264" | "avc" => Ok(Self::H264),
            "hevc" | "h265" | "libx265" => Ok(Self::Hevc),
            "h264_nvenc" => Ok(Self::H264Nvenc),
            "hevc_nvenc" | "h265_nvenc" => Ok(Self::HevcNvenc),
            other => Err(ChronocamError::config(format!(
                "Unknown codec: {other}. Use: h264, hevc, h264_nvenc, hevc_nvenc"
            ))),
        }
    }
}

/// Pane arrangement for two-camera overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitOrientation {
    /// Left | Right.
    #[default]
    SideBySide,
    /// Top / Bottom.
    Stacked,
}

/// Where a scaled pane sits inside its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaneAlignment {
    Top,
    #[default]
    Center,
    Bottom,
    Left,
    Right,
}

/// Overlap layout configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SplitLayout {
    pub orientation: SplitOrientation,
    pub alignment: PaneAlignment,
}

impl SplitLayout {
    /// Size of one pane for the given output size.
    pub fn pane_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.orientation {
            SplitOrientation::SideBySide => (even(width / 2), height),
            SplitOrientation::Stacked => (width, even(height / 2)),
        }
    }
}

fn even(v: u32) -> u32 {
    (v / 2 * 2).max(2)
}

/// Fixed slate label texts, or caller-supplied text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelPreset {
    #[default]
    Gap,
    NothingOfInterest,
    MotionGap,
    ChronologyGap,
    Custom(String),
}

impl LabelPreset {
    /// Resolve a preset name; `custom` takes the supplied text.
    pub fn from_name(name: &str, custom_text: Option<&str>) -> ChronocamResult<Self> {
        match name.trim() {
            "gap" => Ok(Self::Gap),
            "nothing_of_interest" => Ok(Self::NothingOfInterest),
            "motion_gap" => Ok(Self::MotionGap),
            "chronology_gap" => Ok(Self::ChronologyGap),
            "custom" => Ok(Self::Custom(custom_text.unwrap_or_default().to_string())),
            other => Err(ChronocamError::config(format!(
                "Unknown label preset: {other}. Use: gap, nothing_of_interest, motion_gap, chronology_gap, custom"
            ))),
        }
    }

    /// The text shown on the slate.
    pub fn text(&self) -> &str {
        match self {
            Self::Gap => "GAP",
            Self::NothingOfInterest => "Nothing of Interest",
            Self::MotionGap => "Motion Gap",
            Self::ChronologyGap => "Gap in Chronology",
            Self::Custom(text) if !text.trim().is_empty() => text.trim(),
            Self::Custom(_) => "GAP",
        }
    }
}

/// How gap times are laid out on the slate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormatStyle {
    /// `HH:MM:SS to HH:MM:SS` with a short duration line.
    #[default]
    TimeOnly,
    /// Weekday, date and time on one line with a delta.
    DateTime,
    /// Two lines with an expanded `N hr M min S sec` duration.
    DurationMultiline,
}

impl FromStr for TimeFormatStyle {
    type Err = ChronocamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "time_only" => Ok(Self::TimeOnly),
            "date_time" => Ok(Self::DateTime),
            "duration_multiline" => Ok(Self::DurationMultiline),
            other => Err(ChronocamError::config(format!(
                "Unknown time format: {other}. Use: time_only, date_time, duration_multiline"
            ))),
        }
    }
}

/// Gap slate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlateSettings {
    /// Seconds each slate is shown (0 disables slates).
    pub duration_secs: f64,
    pub background: String,
    pub text_color: String,
    /// Font size in pixels; derived from output height when absent.
    pub font_size: Option<u32>,
    pub label: LabelPreset,
    pub time_format: TimeFormatStyle,
}

impl Default for SlateSettings {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            background: "#1a1a1a".to_string(),
            text_color: "white".to_string(),
            font_size: None,
            label: LabelPreset::Gap,
            time_format: TimeFormatStyle::TimeOnly,
        }
    }
}

impl SlateSettings {
    pub fn font_size_for(&self, height: u32) -> u32 {
        self.font_size
            .unwrap_or_else(|| ((height as f64 * 0.028) as u32).max(24))
    }
}

/// Handling of empty spans shorter than the minimum gap duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShortGapPolicy {
    /// No slate and no frames; the span is recorded as skipped.
    #[default]
    Skip,
    /// Emit a slate regardless of length.
    Slate,
}

/// Batching and concurrency settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Target encoder inputs per batch.
    pub batch_size: usize,
    /// Always render in batches.
    pub force_batch: bool,
    /// Estimated argv length at which batching kicks in.
    pub argv_threshold: usize,
    /// Batches encoded concurrently.
    pub parallelism: usize,
    /// Keep the working directory and batch outputs after the render.
    pub keep_temp_files: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 150,
            force_batch: false,
            argv_threshold: 29_000,
            parallelism: 1,
            keep_temp_files: false,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: FrameRate::FPS_30,
            codec: VideoCodec::H264,
            layout: SplitLayout::default(),
            slate: SlateSettings::default(),
            min_gap_secs: 1.0,
            short_gap_policy: ShortGapPolicy::Skip,
            batch: BatchSettings::default(),
            hardware_decode: false,
            process_timeout_secs: None,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl RenderSettings {
    /// Build settings from configuration defaults.
    pub fn from_defaults(defaults: &RenderDefaults) -> ChronocamResult<Self> {
        let fps = defaults
            .fps
            .parse::<FrameRate>()
            .map_err(|e| ChronocamError::config(e.to_string()))?;
        let settings = Self {
            width: defaults.width,
            height: defaults.height,
            fps,
            codec: defaults.codec.parse()?,
            slate: SlateSettings {
                duration_secs: defaults.slate_duration_secs,
                ..SlateSettings::default()
            },
            min_gap_secs: defaults.min_gap_secs,
            batch: BatchSettings {
                batch_size: defaults.batch_size,
                argv_threshold: defaults.argv_threshold,
                parallelism: defaults.parallelism,
                ..BatchSettings::default()
            },
            process_timeout_secs: (defaults.process_timeout_secs > 0)
                .then_some(defaults.process_timeout_secs),
            ffmpeg_path: PathBuf::from(&defaults.ffmpeg_path),
            ..Self::default()
        };
        Ok(settings)
    }

    /// Check that the settings describe a renderable output.
    pub fn validate(&self) -> ChronocamResult<()> {
        if self.width < 2 || self.height < 2 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ChronocamError::config(format!(
                "Output resolution must be even and non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.slate.duration_secs.is_finite() || self.slate.duration_secs < 0.0 {
            return Err(ChronocamError::config("Slate duration must be zero or positive"));
        }
        if !self.min_gap_secs.is_finite() || self.min_gap_secs < 0.0 {
            return Err(ChronocamError::config("Minimum gap duration must be zero or positive"));
        }
        if self.batch.batch_size == 0 {
            return Err(ChronocamError::config("Batch size must be at least 1"));
        }
        if self.batch.parallelism == 0 {
            return Err(ChronocamError::config("Parallelism must be at least 1"));
        }
        if let LabelPreset::Custom(text) = &self.slate.label {
            if text.trim().chars().count() > MAX_CUSTOM_LABEL_CHARS {
                return Err(ChronocamError::config(format!(
                    "Custom slate label is limited to {MAX_CUSTOM_LABEL_CHARS} characters"
                )));
            }
        }
        if self.hardware_decode && !self.codec.is_nvenc() {
            tracing::debug!(
                codec = self.codec.encoder_name(),
                "Hardware decode requested with a software encoder"
            );
        }
        Ok(())
    }
}

impl fmt::Display for RenderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {}fps {}",
            self.width,
            self.height,
            self.fps,
            self.codec.encoder_name()
        )
    }
}
