//! exploreHD Stream - pipeline description and lifecycle
//!
//! A `StreamPipeline` turns a `StreamInformation` into a GStreamer launch
//! description and supervises one execution of it at a time on a dedicated
//! thread. Execution goes through the `PipelineLauncher` seam; the default
//! launcher runs `gst-launch-1.0` as a child process.

pub mod description;
pub mod error;
pub mod launcher;
pub mod pipeline;

pub use description::build_description;
pub use error::StreamError;
pub use launcher::{GstLaunch, PipelineExit, PipelineLauncher, RunningPipeline};
pub use pipeline::StreamPipeline;
