//! Batch execution and final concatenation.
//!
//! Batches are independent encoder invocations. Up to `parallelism` of
//! them run at once; reports come back in timeline order regardless of
//! which batch finished first. A failed batch does not stop the others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chronocam_common::error::{ChronocamError, ChronocamResult};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::command::{EncoderCommand, HEAD_ARGS};
use crate::ffmpeg::{run_encoder, EncoderJob, ProcessControl};

/// Outcome of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded,
    Failed { error: String },
    Cancelled,
    NotAttempted,
}

/// Per-batch report, in timeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// One-based batch number.
    pub index: usize,
    pub output: PathBuf,
    pub status: BatchStatus,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.status == BatchStatus::Succeeded
    }
}

/// Runs batch commands with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    parallelism: usize,
    control: ProcessControl,
}

impl BatchCoordinator {
    pub fn new(parallelism: usize, control: ProcessControl) -> Self {
        Self {
            parallelism: parallelism.max(1),
            control,
        }
    }

    /// Encode every batch and report each outcome.
    pub async fn run(&self, commands: Vec<EncoderCommand>) -> Vec<BatchReport> {
        let total = commands.len();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut reports: Vec<BatchReport> = commands
            .iter()
            .enumerate()
            .map(|(i, command)| BatchReport {
                index: i + 1,
                output: command.output.clone(),
                status: BatchStatus::Failed {
                    error: "batch task ended without a result".to_string(),
                },
            })
            .collect();

        tracing::info!(batches = total, parallelism = self.parallelism, "Encoding batches");

        let mut tasks = JoinSet::new();
        for (i, command) in commands.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let control = self.control.clone();
            tasks.spawn(async move {
                let status = run_batch(i + 1, total, command, semaphore, control).await;
                (i, status)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, status)) => reports[i].status = status,
                Err(e) => tracing::error!(error = %e, "Batch task panicked"),
            }
        }

        let succeeded = reports.iter().filter(|r| r.succeeded()).count();
        tracing::info!(succeeded, total, "Batches finished");
        reports
    }
}

async fn run_batch(
    index: usize,
    total: usize,
    command: EncoderCommand,
    semaphore: Arc<Semaphore>,
    control: ProcessControl,
) -> BatchStatus {
    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => permit.ok(),
        _ = control.cancel.cancelled() => None,
    };
    let Some(_permit) = permit else {
        return BatchStatus::NotAttempted;
    };
    if control.cancel.is_cancelled() {
        return BatchStatus::NotAttempted;
    }

    if let Err(e) = command.write_filter_script() {
        return BatchStatus::Failed {
            error: format!("Failed to write filter script: {e}"),
        };
    }

    let job = EncoderJob {
        label: format!("batch {index}/{total}"),
        program: command.program.clone(),
        args: command.args.clone(),
        total_frames: command.expected_frames,
        expected_duration_secs: command.expected_duration_secs,
    };
    match run_encoder(&job, &control).await {
        Ok(()) if output_written(&command.output) => BatchStatus::Succeeded,
        Ok(()) => {
            tracing::error!(batch = index, output = %command.output.display(), "Batch wrote no output");
            BatchStatus::Failed {
                error: format!(
                    "encoder exited cleanly but wrote no output to {}",
                    command.output.display()
                ),
            }
        }
        Err(e) if e.is_cancellation() => BatchStatus::Cancelled,
        Err(e) => {
            tracing::error!(batch = index, error = %e, "Batch failed");
            BatchStatus::Failed {
                error: describe(&e),
            }
        }
    }
}

/// True when `path` is a non-empty file.
pub(crate) fn output_written(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn describe(error: &ChronocamError) -> String {
    match error {
        ChronocamError::ExternalProcess {
            stderr_tail: Some(tail),
            ..
        } => format!("{error}\n{tail}"),
        _ => error.to_string(),
    }
}

/// Concat demuxer list: one `file '<path>'` line per input.
pub fn concat_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|path| {
            let path = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{path}'\n")
        })
        .collect()
}

/// Join batch outputs, in order, into the final file without re-encoding.
pub async fn concatenate(
    program: &Path,
    files: &[PathBuf],
    list_path: &Path,
    output: &Path,
    expected_duration_secs: f64,
    total_frames: u64,
    control: &ProcessControl,
) -> ChronocamResult<()> {
    if files.is_empty() {
        return Err(ChronocamError::concatenation("No batch outputs to join"));
    }
    let mut absolute = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        if !output_written(file) {
            return Err(ChronocamError::concatenation(format!(
                "Batch {} output {} is missing or empty",
                i + 1,
                file.display()
            )));
        }
        let path = std::fs::canonicalize(file).map_err(|e| {
            ChronocamError::concatenation(format!(
                "Cannot resolve batch {} output {}: {e}",
                i + 1,
                file.display()
            ))
        })?;
        absolute.push(path);
    }
    std::fs::write(list_path, concat_list(&absolute)).map_err(|e| {
        ChronocamError::concatenation(format!(
            "Failed to write concat list {}: {e}",
            list_path.display()
        ))
    })?;

    let mut args: Vec<String> = HEAD_ARGS.iter().map(|a| a.to_string()).collect();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().into_owned(),
    ]);

    let job = EncoderJob {
        label: "concat".to_string(),
        program: program.to_path_buf(),
        args,
        total_frames,
        expected_duration_secs,
    };

    tracing::info!(parts = files.len(), output = %output.display(), "Concatenating batches");
    run_encoder(&job, control).await.map_err(|e| {
        if e.is_cancellation() {
            e
        } else {
            ChronocamError::concatenation(describe(&e))
        }
    })?;

    if !output_written(output) {
        return Err(ChronocamError::concatenation(format!(
            "Joiner exited cleanly but {} is missing or empty",
            output.display()
        )));
    }
    Ok(())
}
