//! # chronocam-timeline-model
//!
//! Data model for multi-camera CCTV timelines.
//!
//! Source clips carry absolute wall-clock spans ([`clip::ClipDescriptor`]).
//! The timeline core turns them into atomic intervals and classified
//! segments ([`segment`]), which are grouped into render plans ([`plan`])
//! and encoded with resolved [`settings::RenderSettings`].

pub mod clip;
pub mod plan;
pub mod segment;
pub mod settings;
pub mod time;

pub use clip::{ClipDescriptor, ClipError, ClipRecord};
pub use plan::{BatchPlan, RenderPlan};
pub use segment::{Interval, Segment, SegmentKind};
pub use settings::RenderSettings;
pub use time::{AbsoluteTime, TimelineInstant, TimelineOrigin};
