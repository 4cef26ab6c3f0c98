//! # roq-pipe: media pipelines over RoQ
//!
//! `roq-pipe` connects a local media pipeline to a [roq_lite::Session].
//! The pipeline engine itself (encoding, decoding, RTP packetization) is abstracted behind [Pipeline],
//! while this crate provides the glue:
//!
//! - [SendAdapter]: a [FrameProducer] that sends every pulled sample on its own unit.
//! - [ReceiveAdapter]: a [FrameConsumer] that reads one unit per request and pushes it into the pipeline.
//! - [Controller]: drives the pipeline and releases the session once the pipeline is done.
//!
//! Two engines are available:
//! - [synthetic]: in-process streaming threads, always built and used for testing.
//! - `gst`: GStreamer `appsink`/`appsrc` pipelines, requires the `gstreamer` feature.
mod error;
mod flow;
mod lifecycle;
mod pipeline;
mod receiver;
mod sample;
mod sender;

pub mod rtp;
pub mod synthetic;

#[cfg(feature = "gstreamer")]
pub mod gst;

// export the roq-lite version in use
pub use roq_lite;

pub use error::*;
pub use flow::*;
pub use lifecycle::*;
pub use pipeline::*;
pub use receiver::*;
pub use sample::*;
pub use sender::*;
