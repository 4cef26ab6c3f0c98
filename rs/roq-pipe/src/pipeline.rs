use crate::PipelineError;

/// A message popped from the pipeline bus.
#[derive(Debug, Clone)]
pub enum Message {
	/// Every sink received end-of-stream.
	Eos,
	/// An element failed; the pipeline can't continue.
	Error(PipelineError),
	/// Anything else (state changes, latency, QoS...), which is ignored.
	Other(String),
}

/// A media pipeline as seen by the [crate::Controller].
pub trait Pipeline: Send + Sync + 'static {
	/// Start the flow of data.
	fn play(&self) -> Result<(), PipelineError>;

	/// Stop the flow of data and release the engine's resources.
	fn stop(&self) -> Result<(), PipelineError>;

	/// Inject an end-of-stream event, returning false if the pipeline refused it.
	fn send_eos(&self) -> bool;

	/// Block until the next bus message, returning None once the bus is flushing.
	fn pop_message(&self) -> Option<Message>;
}
