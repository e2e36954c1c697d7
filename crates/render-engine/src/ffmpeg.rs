//! Encoder process execution.
//!
//! Runs one encoder invocation, parsing `-progress pipe:1` output from
//! stdout while stderr is drained concurrently. The child is killed when
//! the render is cancelled, when the optional timeout expires, or when the
//! future is dropped.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chronocam_common::error::{ChronocamError, ChronocamResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Warn when the encoder clock has not moved for this long.
const STALL_WARN_SECS: u64 = 10;

/// How long a killed encoder's stderr may stay open before it is abandoned.
/// A grandchild that inherited the pipe can hold it long after the kill.
const STDERR_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Progress callback shared across concurrently running encoders.
pub type ProgressCallback = Arc<dyn Fn(EncodeProgress) + Send + Sync>;

/// Progress report for one encoder process.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// Which job this is (`single pass`, `batch 3/7`, `concat`).
    pub job: String,
    /// Current progress [0.0, 1.0].
    pub progress: f64,
    pub frames_rendered: u64,
    pub total_frames: u64,
    /// Estimated time remaining in seconds.
    pub eta_secs: f64,
    pub complete: bool,
}

/// One encoder invocation.
#[derive(Debug, Clone)]
pub struct EncoderJob {
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub total_frames: u64,
    pub expected_duration_secs: f64,
}

/// Controls shared by every process of a render.
#[derive(Clone, Default)]
pub struct ProcessControl {
    pub cancel: CancellationToken,
    pub timeout: Option<Duration>,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for ProcessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessControl")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("timeout", &self.timeout)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run an encoder job to completion.
pub async fn run_encoder(job: &EncoderJob, control: &ProcessControl) -> ChronocamResult<()> {
    let program = program_name(&job.program);
    if control.cancel.is_cancelled() {
        return Err(ChronocamError::cancelled(format!("{} was not started", job.label)));
    }

    tracing::debug!(job = %job.label, args = ?job.args, "Running encoder");
    let mut cmd = Command::new(&job.program);
    cmd.args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| ChronocamError::process(&program, format!("Failed to start: {e}")))?;

    tracing::info!(
        job = %job.label,
        pid = child.id(),
        args_len = job.args.len(),
        total_frames = job.total_frames,
        "Encoder process started"
    );

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ChronocamError::process(&program, "Failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ChronocamError::process(&program, "Failed to capture stderr"))?;

    // Drain stderr concurrently so a full pipe never blocks the encoder.
    let mut stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let mut stderr = stderr;
        match stderr.read_to_end(&mut buf).await {
            Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
            Err(err) => format!("<failed to read stderr: {err}>"),
        }
    });

    let outcome = {
        let run = async {
            follow_progress(stdout, job, control.progress.as_ref(), start).await;
            child.wait().await
        };
        let limited = async {
            match control.timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(status) => Outcome::Exited(status),
                    Err(_) => Outcome::TimedOut,
                },
                None => Outcome::Exited(run.await),
            }
        };
        tokio::select! {
            outcome = limited => outcome,
            _ = control.cancel.cancelled() => Outcome::Cancelled,
        }
    };

    if !matches!(outcome, Outcome::Exited(_)) {
        if let Err(e) = child.kill().await {
            tracing::warn!(job = %job.label, error = %e, "Failed to kill encoder");
        }
    }

    let stderr_output = if matches!(outcome, Outcome::Exited(_)) {
        (&mut stderr_task)
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
    } else {
        match tokio::time::timeout(STDERR_DRAIN_GRACE, &mut stderr_task).await {
            Ok(joined) => {
                joined.unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            }
            Err(_) => {
                stderr_task.abort();
                tracing::warn!(job = %job.label, "Encoder stderr still open after kill");
                String::new()
            }
        }
    };
    let tail = stderr_tail(&stderr_output);

    match outcome {
        Outcome::Cancelled => {
            tracing::info!(job = %job.label, "Encoder stopped by cancellation");
            Err(ChronocamError::cancelled(format!("{} was stopped", job.label)))
        }
        Outcome::TimedOut => Err(ChronocamError::ExternalProcess {
            program,
            message: format!(
                "{} timed out after {:.0}s",
                job.label,
                start.elapsed().as_secs_f64()
            ),
            stderr_tail: tail,
            timed_out: true,
        }),
        Outcome::Exited(Err(e)) => Err(ChronocamError::ExternalProcess {
            program,
            message: format!("Failed to wait on {}: {e}", job.label),
            stderr_tail: tail,
            timed_out: false,
        }),
        Outcome::Exited(Ok(status)) if !status.success() => Err(ChronocamError::ExternalProcess {
            program,
            message: format!("{} exited with {status}", job.label),
            stderr_tail: tail,
            timed_out: false,
        }),
        Outcome::Exited(Ok(_)) => {
            tracing::info!(
                job = %job.label,
                elapsed_secs = start.elapsed().as_secs_f64(),
                "Encoder process finished"
            );
            if let Some(cb) = &control.progress {
                cb(EncodeProgress {
                    job: job.label.clone(),
                    progress: 1.0,
                    frames_rendered: job.total_frames,
                    total_frames: job.total_frames,
                    eta_secs: 0.0,
                    complete: true,
                });
            }
            Ok(())
        }
    }
}

async fn follow_progress(
    stdout: tokio::process::ChildStdout,
    job: &EncoderJob,
    progress: Option<&ProgressCallback>,
    start: Instant,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut state = ProgressState::default();
    let mut last_progress_secs = 0.0f64;
    let mut last_progress_wall = Instant::now();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(job = %job.label, error = %e, "Failed reading encoder progress");
                break;
            }
        };
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key != "progress" {
            continue;
        }

        if state.out_time_secs > last_progress_secs + 0.001 {
            last_progress_secs = state.out_time_secs;
            last_progress_wall = Instant::now();
        }
        if let Some(cb) = progress {
            cb(progress_report(
                &job.label,
                &state,
                job.total_frames,
                job.expected_duration_secs,
                start.elapsed().as_secs_f64(),
            ));
        }
        if last_progress_wall.elapsed().as_secs() >= STALL_WARN_SECS {
            tracing::warn!(
                job = %job.label,
                out_time_secs = state.out_time_secs,
                elapsed_secs = start.elapsed().as_secs_f64(),
                "No encoder progress for {STALL_WARN_SECS}s"
            );
            last_progress_wall = Instant::now();
        }
    }
}

/// Accumulated `-progress` key/value state.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ProgressState {
    pub out_time_secs: f64,
    pub frame: Option<u64>,
    pub complete: bool,
}

impl ProgressState {
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, ffmpeg reports microseconds here.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "frame" => {
                self.frame = value.trim().parse().ok();
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

pub(crate) fn progress_report(
    job: &str,
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> EncodeProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let frames_rendered = state
        .frame
        .unwrap_or_else(|| (progress * total_frames as f64).round() as u64)
        .min(total_frames);
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    EncodeProgress {
        job: job.to_string(),
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        complete: state.complete,
    }
}

fn stderr_tail(output: &str) -> Option<String> {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    Some(lines[skip..].join("\n"))
}

pub(crate) fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Whether `binary` resolves to an executable (a path, or a name on `PATH`).
pub fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate = dir.join(binary);
                candidate.is_file() || candidate.with_extension("exe").is_file()
            })
        })
        .unwrap_or(false)
}

/// First line of `<encoder> -version`.
pub async fn encoder_version(program: &Path) -> ChronocamResult<String> {
    let name = program_name(program);
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ChronocamError::process(&name, format!("Failed to start: {e}")))?;
    if !output.status.success() {
        return Err(ChronocamError::process(
            &name,
            format!("-version exited with {}", output.status),
        ));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}
