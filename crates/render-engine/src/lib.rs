//! Chronocam Render Engine
//!
//! Turns an assembled CCTV timeline into encoder invocations and runs
//! them, either as one pass or as independently encoded batches joined
//! without re-encoding.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clips.json ──┐
//!              ├── Assemble (intervals → segments)
//! settings ────┘         │
//!                        ├── Estimate command size
//!                        │         │
//!              ┌─────────┴─────────┴──────────┐
//!              ▼                              ▼
//!        Single pass                    Split into batches
//!   (one filter graph script)      (cut at gaps, bounded inputs)
//!              │                              │
//!              │                  Encode batches (bounded parallel)
//!              │                              │
//!              │                   Concat demuxer, stream copy
//!              ▼                              ▼
//!                         output.mp4
//! ```

pub mod command;
pub mod coordinator;
pub mod estimate;
pub mod ffmpeg;
pub mod filtergraph;
pub mod pipeline;
pub mod state;
pub mod workspace;

#[cfg(all(test, unix))]
mod test_support;

pub use command::{build_encoder_command, EncoderCommand};
pub use coordinator::{BatchCoordinator, BatchReport, BatchStatus};
pub use estimate::{CommandEstimate, CommandSizeEstimator, RenderMode};
pub use ffmpeg::{
    command_exists, encoder_version, run_encoder, EncodeProgress, EncoderJob, ProcessControl,
    ProgressCallback,
};
pub use filtergraph::{build_filter_graph, FilterGraph};
pub use pipeline::{preview_render, render_timeline, RenderOutcome, RenderPreview, RenderRequest};
pub use state::{RenderState, RenderStateMachine};
