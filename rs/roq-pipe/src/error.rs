use derive_more::Display;

/// An error reported on the pipeline bus.
#[derive(Debug, Clone, Display, thiserror::Error)]
#[display("{element}: {message}")]
pub struct PipelineError {
	/// The element that posted the error.
	pub element: String,
	pub message: String,
	/// Additional engine-specific details.
	pub debug: Option<String>,
}

impl PipelineError {
	pub fn new(element: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			element: element.into(),
			message: message.into(),
			debug: None,
		}
	}

	pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
		self.debug = Some(debug.into());
		self
	}
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
	/// The pipeline reported an error on its bus, or failed to change state.
	#[error("pipeline error: {0}")]
	Pipeline(#[from] PipelineError),

	/// The media engine could not be initialized or the pipeline could not be built.
	#[error("engine error: {0}")]
	Engine(String),

	#[error("already started")]
	Running,

	#[error("panic")]
	Panic,
}
