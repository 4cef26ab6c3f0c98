use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use roq_lite::ReceiveFlow;
use tokio::runtime::Handle;

use crate::{FrameConsumer, SampleSink, Shutdown};

/// The largest RTP packet the receiver accepts.
pub const MAX_PACKET_SIZE: usize = 64_000;

/// Feeds the pipeline one unit from a [ReceiveFlow] per request.
///
/// Once the flow ends, fails, or the shutdown signal fires, end-of-stream is signalled and no more reads are issued.
pub struct ReceiveAdapter {
	flow: ReceiveFlow,
	runtime: Handle,
	shutdown: Shutdown,

	// Reused for every read.
	buffer: Mutex<Vec<u8>>,
	ended: AtomicBool,
}

impl ReceiveAdapter {
	/// Must be called from within a tokio runtime, which is used to drive the reads.
	pub fn new(flow: ReceiveFlow, shutdown: Shutdown) -> Self {
		Self::with_runtime(flow, shutdown, Handle::current())
	}

	pub fn with_runtime(flow: ReceiveFlow, shutdown: Shutdown, runtime: Handle) -> Self {
		Self {
			flow,
			runtime,
			shutdown,
			buffer: Mutex::new(vec![0; MAX_PACKET_SIZE]),
			ended: AtomicBool::new(false),
		}
	}

	pub fn is_ended(&self) -> bool {
		self.ended.load(Ordering::Acquire)
	}

	fn end(&self, sink: &dyn SampleSink) {
		if self.ended.swap(true, Ordering::AcqRel) {
			return;
		}

		if let Err(err) = sink.end_of_stream() {
			tracing::debug!(%err, "pipeline refused end-of-stream");
		}
	}
}

impl FrameConsumer for ReceiveAdapter {
	fn on_need_data(&self, sink: &dyn SampleSink, _length: usize) {
		if self.is_ended() {
			return;
		}

		let mut buffer = self.buffer.lock();

		let res = self.runtime.block_on(async {
			tokio::select! {
				res = self.flow.read(&mut buffer[..]) => Some(res),
				_ = self.shutdown.wait() => None,
			}
		});

		let size = match res {
			Some(Ok(Some(size))) => size,
			Some(Ok(None)) => {
				tracing::debug!(flow = %self.flow.id(), "end of flow");
				return self.end(sink);
			}
			Some(Err(err)) => {
				tracing::warn!(flow = %self.flow.id(), %err, "failed to read unit");
				return self.end(sink);
			}
			None => {
				tracing::debug!(flow = %self.flow.id(), "read cancelled");
				return self.end(sink);
			}
		};

		tracing::trace!(flow = %self.flow.id(), size, "received unit");

		if let Err(err) = sink.push_buffer(Bytes::copy_from_slice(&buffer[..size])) {
			tracing::debug!(%err, "pipeline refused buffer");
			self.end(sink);
		}
	}
}
