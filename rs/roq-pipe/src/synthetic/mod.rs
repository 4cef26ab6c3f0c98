//! An in-process engine with one streaming thread per pipeline.
//!
//! [SendPipeline] pulls samples from a channel (for example fed by a [TestPattern]) and hands them to a
//! [crate::FrameProducer]. [RecvPipeline] asks a [crate::FrameConsumer] for data and hands it to a [Render].
mod bus;
mod monitor;
mod pattern;
mod recv;
mod send;

pub use monitor::*;
pub use pattern::*;
pub use recv::*;
pub use send::*;

pub(crate) use bus::*;
