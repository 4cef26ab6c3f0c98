use roq_lite::SendFlow;
use tokio::runtime::Handle;

use crate::{FlowError, FlowResult, FlowSuccess, FrameProducer, SampleSource};

/// Sends every sample the pipeline produces as its own unit on a [SendFlow].
///
/// Samples are sent at most once; a failed send is reported to the pipeline and never retried.
pub struct SendAdapter {
	flow: SendFlow,
	runtime: Handle,
}

impl SendAdapter {
	/// Must be called from within a tokio runtime, which is used to drive the sends.
	pub fn new(flow: SendFlow) -> Self {
		Self::with_runtime(flow, Handle::current())
	}

	pub fn with_runtime(flow: SendFlow, runtime: Handle) -> Self {
		Self { flow, runtime }
	}

	async fn send(&self, payload: &[u8]) -> Result<usize, roq_lite::Error> {
		let mut unit = self.flow.new_send_unit().await?;
		let size = unit.write_rtp(payload).await?;
		unit.close()?;
		Ok(size)
	}
}

impl FrameProducer for SendAdapter {
	fn on_new_sample(&self, source: &dyn SampleSource) -> FlowResult {
		let sample = match source.pull_sample() {
			Ok(Some(sample)) => sample,
			Ok(None) => return Err(FlowError::Eos),
			Err(err) => {
				tracing::warn!(flow = %self.flow.id(), %err, "failed to pull sample");
				return Err(FlowError::Error);
			}
		};

		// Streaming threads are not runtime threads, so blocking here is fine.
		match self.runtime.block_on(self.send(&sample.payload)) {
			Ok(size) => {
				tracing::trace!(flow = %self.flow.id(), size, "sent sample");
				Ok(FlowSuccess::Ok)
			}
			Err(err) => {
				tracing::warn!(flow = %self.flow.id(), %err, size = sample.len(), "failed to send sample");
				Err(FlowError::Error)
			}
		}
	}
}
