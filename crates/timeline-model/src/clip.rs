//! Source clip descriptors.
//!
//! A [`ClipDescriptor`] is the resolved, validated description of one
//! camera file: where it lives, which camera recorded it and the absolute
//! wall-clock span it covers. The upstream metadata parser hands records
//! over as [`ClipRecord`]s; conversion into descriptors is the only place
//! where missing or inverted timestamps are caught.

use std::path::{Path, PathBuf};

use chronocam_common::clock::FrameRate;
use chronocam_common::error::ChronocamError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::time::{duration_secs, secs_to_duration, AbsoluteTime, TimeParseError};

/// One source clip with an absolute time range and camera identity.
///
/// The end is always strictly after the start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ClipRecord")]
pub struct ClipDescriptor {
    path: PathBuf,
    camera_id: String,
    start: AbsoluteTime,
    end: AbsoluteTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_rate: Option<FrameRate>,
}

impl ClipDescriptor {
    /// Create a descriptor, rejecting empty camera ids and non-positive durations.
    pub fn new(
        path: impl Into<PathBuf>,
        camera_id: impl Into<String>,
        start: AbsoluteTime,
        end: AbsoluteTime,
    ) -> Result<Self, ClipError> {
        let path = path.into();
        let camera_id = camera_id.into().trim().to_string();
        if camera_id.is_empty() {
            return Err(ClipError::MissingCameraId { path });
        }
        if end <= start {
            return Err(ClipError::NonPositiveDuration { path, start, end });
        }
        Ok(Self {
            path,
            camera_id,
            start,
            end,
            frame_rate: None,
        })
    }

    /// Attach the clip's native frame rate.
    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn start(&self) -> AbsoluteTime {
        self.start
    }

    pub fn end(&self) -> AbsoluteTime {
        self.end
    }

    pub fn frame_rate(&self) -> Option<FrameRate> {
        self.frame_rate
    }

    pub fn duration(&self) -> Duration {
        self.end.since(self.start)
    }

    pub fn duration_secs(&self) -> f64 {
        duration_secs(self.duration())
    }

    /// Whether the clip covers any part of `[from, to)`.
    pub fn is_active_during(&self, from: AbsoluteTime, to: AbsoluteTime) -> bool {
        self.start < to && self.end > from
    }

    /// Seek offset into this clip for an absolute instant, clamped at zero.
    pub fn seek_to(&self, at: AbsoluteTime) -> Duration {
        at.since(self.start).max(Duration::zero())
    }

    /// Ordering used everywhere clips must be ranked: earliest start,
    /// then camera id, then path.
    pub fn ordering_key(&self) -> (AbsoluteTime, &str, &Path) {
        (self.start, self.camera_id.as_str(), self.path.as_path())
    }

    /// Short human-readable name for logs.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Raw clip record as produced by the upstream metadata parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipRecord {
    /// File path or opaque identifier.
    #[serde(alias = "file_path", alias = "id")]
    pub path: PathBuf,

    /// Camera identifier; defaults to the parent directory name.
    #[serde(default, alias = "camera", alias = "camera_path")]
    pub camera_id: Option<String>,

    /// Absolute start (ISO 8601).
    #[serde(default, alias = "start_time")]
    pub start: Option<String>,

    /// Absolute end (ISO 8601).
    #[serde(default, alias = "end_time")]
    pub end: Option<String>,

    /// Duration in seconds; used when `end` is absent.
    #[serde(default)]
    pub duration_secs: Option<f64>,

    /// Native frame rate (`29.97` or `"30000/1001"`).
    #[serde(default)]
    pub frame_rate: Option<RecordFrameRate>,
}

/// Frame rate as written by the upstream parser: a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordFrameRate {
    Number(f64),
    Text(String),
}

impl RecordFrameRate {
    fn resolve(&self) -> Result<FrameRate, chronocam_common::clock::FrameRateParseError> {
        match self {
            Self::Number(value) => value.to_string().parse(),
            Self::Text(text) => text.parse(),
        }
    }
}

impl TryFrom<ClipRecord> for ClipDescriptor {
    type Error = ClipError;

    fn try_from(record: ClipRecord) -> Result<Self, Self::Error> {
        let camera_id = record
            .camera_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| {
                record
                    .path
                    .parent()
                    .and_then(|parent| parent.file_name())
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .ok_or_else(|| ClipError::MissingCameraId {
                path: record.path.clone(),
            })?;

        let start_raw = record.start.ok_or_else(|| ClipError::MissingTimestamp {
            path: record.path.clone(),
            field: "start",
        })?;
        let start = AbsoluteTime::parse(&start_raw)?;

        let end = match (record.end, record.duration_secs) {
            (Some(end_raw), _) => AbsoluteTime::parse(&end_raw)?,
            (None, Some(secs)) if secs.is_finite() => start
                .checked_add(secs_to_duration(secs))
                .ok_or_else(|| ClipError::MissingTimestamp {
                    path: record.path.clone(),
                    field: "end",
                })?,
            (None, _) => {
                return Err(ClipError::MissingTimestamp {
                    path: record.path,
                    field: "end",
                })
            }
        };

        let mut clip = ClipDescriptor::new(record.path, camera_id, start, end)?;
        if let Some(fps) = record.frame_rate {
            match fps.resolve() {
                Ok(rate) => clip = clip.with_frame_rate(rate),
                Err(e) => {
                    tracing::warn!(clip = %clip.display_name(), error = %e, "Ignoring clip frame rate");
                }
            }
        }
        Ok(clip)
    }
}

/// Errors raised while turning records into clip descriptors.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("clip {path} is missing its {field} timestamp")]
    MissingTimestamp { path: PathBuf, field: &'static str },

    #[error("clip {path} has no camera id")]
    MissingCameraId { path: PathBuf },

    #[error("clip {path} ends at {end}, which is not after its start {start}")]
    NonPositiveDuration {
        path: PathBuf,
        start: AbsoluteTime,
        end: AbsoluteTime,
    },

    #[error(transparent)]
    Timestamp(#[from] TimeParseError),

    #[error("clip list is empty")]
    EmptyClipList,

    #[error("clip #{index}: {source}")]
    AtIndex {
        index: usize,
        #[source]
        source: Box<ClipError>,
    },

    #[error("clip list is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<ClipError> for ChronocamError {
    fn from(err: ClipError) -> Self {
        ChronocamError::validation(err.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClipListDocument {
    Bare(Vec<ClipRecord>),
    Wrapped { clips: Vec<ClipRecord> },
}

/// Parse a clip list (a JSON array of records, or `{ "clips": [...] }`).
///
/// Every record is validated; the first invalid record is reported with
/// its position in the list.
pub fn parse_clip_list(json: &str) -> Result<Vec<ClipDescriptor>, ClipError> {
    let records = match serde_json::from_str::<ClipListDocument>(json)? {
        ClipListDocument::Bare(records) => records,
        ClipListDocument::Wrapped { clips } => clips,
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            ClipDescriptor::try_from(record).map_err(|source| ClipError::AtIndex {
                index,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Load and validate a clip list file.
pub fn load_clip_list(path: impl AsRef<Path>) -> Result<Vec<ClipDescriptor>, ChronocamError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ChronocamError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_clip_list(&content)?)
}

/// Reject clip lists the renderer cannot use.
pub fn validate_clip_list(clips: &[ClipDescriptor]) -> Result<(), ClipError> {
    if clips.is_empty() {
        return Err(ClipError::EmptyClipList);
    }
    Ok(())
}
