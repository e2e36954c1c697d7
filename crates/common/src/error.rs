//! Error types shared across Chronocam crates.

use std::path::PathBuf;

/// Top-level error type for Chronocam operations.
#[derive(Debug, thiserror::Error)]
pub enum ChronocamError {
    #[error("Invalid input: {message}")]
    InputValidation { message: String },

    #[error("Command generation failed: {message}")]
    CommandGeneration { message: String },

    #[error("{program} failed: {message}")]
    ExternalProcess {
        program: String,
        message: String,
        /// Last lines the process wrote to stderr, if any.
        stderr_tail: Option<String>,
        timed_out: bool,
    },

    #[error("Concatenation failed: {message}")]
    Concatenation { message: String },

    #[error("Render cancelled: {message}")]
    Cancelled { message: String },

    #[error("Render {}: {succeeded} of {total} batches succeeded", incomplete_word(.cancelled))]
    BatchesIncomplete {
        succeeded: usize,
        total: usize,
        /// Set when the batches stopped because the render was cancelled.
        cancelled: bool,
        /// One line per batch that did not succeed.
        failures: Vec<String>,
        /// Outputs that were rendered before the failure (kept only on request).
        retained: Vec<PathBuf>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn incomplete_word(cancelled: &bool) -> &'static str {
    if *cancelled {
        "cancelled"
    } else {
        "incomplete"
    }
}

/// Result type alias using ChronocamError.
pub type ChronocamResult<T> = Result<T, ChronocamError>;

impl ChronocamError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::InputValidation {
            message: msg.into(),
        }
    }

    pub fn command_generation(msg: impl Into<String>) -> Self {
        Self::CommandGeneration {
            message: msg.into(),
        }
    }

    pub fn process(program: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExternalProcess {
            program: program.into(),
            message: msg.into(),
            stderr_tail: None,
            timed_out: false,
        }
    }

    pub fn concatenation(msg: impl Into<String>) -> Self {
        Self::Concatenation {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this failure came from cancellation rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. }
                | Self::BatchesIncomplete {
                    cancelled: true,
                    ..
                }
        )
    }

    /// Actionable hint to show alongside the technical cause.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::InputValidation { .. } => {
                "Check the clip list: every clip needs a camera id, a start timestamp, and an end after its start."
            }
            Self::CommandGeneration { .. } => {
                "Reduce the batch size, disable hardware decode, or move clips to shorter paths."
            }
            Self::ExternalProcess {
                timed_out: true, ..
            } => "Increase the process timeout or reduce the batch size so each encode finishes sooner.",
            Self::ExternalProcess { .. } => {
                "Verify the encoder installation (run `chronocam check`) and that every source clip is readable."
            }
            Self::Concatenation { .. } => {
                "Free disk space for temporary files and re-run with --keep-temp to inspect batch outputs."
            }
            Self::Cancelled { .. }
            | Self::BatchesIncomplete {
                cancelled: true, ..
            } => "Re-run the render when ready; no output was finalized.",
            Self::BatchesIncomplete { .. } => {
                "Re-run with --keep-temp to inspect failed batches, or reduce the batch size."
            }
            Self::Config { .. } => "Fix the configuration value or remove the config file to use defaults.",
            Self::FileNotFound { .. } => "Verify the path exists and is readable.",
            Self::Io(_) => "Free disk space for temporary files and check directory permissions.",
            Self::Json(_) => "Check that the clip list is valid JSON.",
            Self::Other(_) => "Re-run with --verbose for details.",
        }
    }
}
