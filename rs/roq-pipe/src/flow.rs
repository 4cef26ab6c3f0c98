use bytes::Bytes;

use crate::Sample;

/// The successful outcome of a streaming callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSuccess {
	Ok,
}

/// Why a streaming callback stopped the flow of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
	/// There is no more data; the pipeline should finish.
	#[error("end of stream")]
	Eos,

	/// The pipeline is shutting down.
	#[error("flushing")]
	Flushing,

	/// A fatal error; the pipeline posts an error on its bus.
	#[error("error")]
	Error,
}

pub type FlowResult = Result<FlowSuccess, FlowError>;

/// The pipeline produced a sample whose contents can't be read.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid sample: {0}")]
pub struct SampleError(pub String);

/// The pull side of a pipeline's output, handed to [FrameProducer::on_new_sample].
pub trait SampleSource {
	/// Take the newest sample, or None if the pipeline has nothing left.
	fn pull_sample(&self) -> Result<Option<Sample>, SampleError>;
}

/// The push side of a pipeline's input, handed to [FrameConsumer::on_need_data].
pub trait SampleSink {
	/// Hand a buffer to the pipeline, which takes ownership of it.
	fn push_buffer(&self, payload: Bytes) -> FlowResult;

	/// Tell the pipeline no more buffers will be pushed.
	fn end_of_stream(&self) -> FlowResult;
}

/// Called by the engine whenever the pipeline produced a sample.
///
/// Invoked on the engine's streaming threads, possibly concurrently.
pub trait FrameProducer: Send + Sync + 'static {
	fn on_new_sample(&self, source: &dyn SampleSource) -> FlowResult;
}

/// Called by the engine whenever the pipeline wants more input.
///
/// Invoked on the engine's streaming threads, possibly concurrently.
/// `length` is a hint of how many bytes the pipeline would like.
pub trait FrameConsumer: Send + Sync + 'static {
	fn on_need_data(&self, sink: &dyn SampleSink, length: usize);
}
