use std::{cell::Cell, sync::Arc, thread};

use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::mpsc};

use super::Bus;
use crate::{
	FlowError, FrameProducer, Message, Pipeline, PipelineError, Sample, SampleError, SampleSource, Shutdown,
};

/// A sending pipeline whose samples come from a channel.
///
/// Each sample is handed to the [FrameProducer] on the streaming thread.
/// The pipeline reaches end-of-stream when the channel is closed, when end-of-stream is requested
/// and the channel is momentarily empty, or when the producer returns [FlowError::Eos].
pub struct SendPipeline {
	producer: Arc<dyn FrameProducer>,
	source: Mutex<Option<mpsc::Receiver<Sample>>>,
	runtime: Handle,

	bus: Arc<Bus>,
	eos: Shutdown,
	thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SendPipeline {
	/// Must be called from within a tokio runtime, which is used to wait for samples.
	pub fn new(source: mpsc::Receiver<Sample>, producer: impl FrameProducer) -> Self {
		Self {
			producer: Arc::new(producer),
			source: Mutex::new(Some(source)),
			runtime: Handle::current(),
			bus: Default::default(),
			eos: Shutdown::new(),
			thread: Default::default(),
		}
	}
}

impl Pipeline for SendPipeline {
	fn play(&self) -> Result<(), PipelineError> {
		let source = self
			.source
			.lock()
			.take()
			.ok_or_else(|| PipelineError::new("sendpipeline", "already playing"))?;

		let stream = Stream {
			producer: self.producer.clone(),
			source,
			runtime: self.runtime.clone(),
			bus: self.bus.clone(),
			eos: self.eos.clone(),
		};

		let thread = thread::Builder::new()
			.name("roq-send".to_string())
			.spawn(move || stream.run())
			.map_err(|err| PipelineError::new("sendpipeline", err.to_string()))?;

		*self.thread.lock() = Some(thread);
		Ok(())
	}

	fn stop(&self) -> Result<(), PipelineError> {
		self.eos.trigger();
		self.bus.flush();

		let thread = self.thread.lock().take();
		match thread.map(|thread| thread.join()) {
			Some(Err(_)) => Err(PipelineError::new("sendpipeline", "streaming thread panicked")),
			_ => Ok(()),
		}
	}

	fn send_eos(&self) -> bool {
		self.eos.trigger();
		true
	}

	fn pop_message(&self) -> Option<Message> {
		self.bus.pop()
	}
}

struct Stream {
	producer: Arc<dyn FrameProducer>,
	source: mpsc::Receiver<Sample>,
	runtime: Handle,
	bus: Arc<Bus>,
	eos: Shutdown,
}

impl Stream {
	fn run(self) {
		let Self {
			producer,
			mut source,
			runtime,
			bus,
			eos,
		} = self;

		bus.post(Message::Other("stream-start".to_string()));

		loop {
			let next = runtime.block_on(async {
				tokio::select! {
					biased;
					sample = source.recv() => sample,
					_ = eos.wait() => None,
				}
			});

			let Some(sample) = next else {
				tracing::debug!("end of stream");
				return bus.post(Message::Eos);
			};

			let pending = Pending(Cell::new(Some(sample)));

			match producer.on_new_sample(&pending) {
				Ok(_) => {}
				Err(FlowError::Eos) => return bus.post(Message::Eos),
				Err(FlowError::Flushing) => return,
				Err(FlowError::Error) => {
					let err = PipelineError::new("sink", "internal data stream error")
						.with_debug("the new-sample callback returned an error");
					return bus.post(Message::Error(err));
				}
			}
		}
	}
}

/// The sample waiting to be pulled by the producer.
struct Pending(Cell<Option<Sample>>);

impl SampleSource for Pending {
	fn pull_sample(&self) -> Result<Option<Sample>, SampleError> {
		Ok(self.0.take())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::FlowSuccess;

	/// Records every sample it pulls.
	struct Collect(mpsc::UnboundedSender<Sample>);

	impl FrameProducer for Collect {
		fn on_new_sample(&self, source: &dyn SampleSource) -> crate::FlowResult {
			let sample = source.pull_sample().map_err(|_| FlowError::Error)?.ok_or(FlowError::Eos)?;
			self.0.send(sample).map_err(|_| FlowError::Error)?;
			Ok(FlowSuccess::Ok)
		}
	}

	struct Fail;

	impl FrameProducer for Fail {
		fn on_new_sample(&self, _source: &dyn SampleSource) -> crate::FlowResult {
			Err(FlowError::Error)
		}
	}

	fn pop(pipeline: &SendPipeline) -> Option<Message> {
		loop {
			match pipeline.pop_message() {
				Some(Message::Other(_)) => continue,
				other => return other,
			}
		}
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn test_samples_then_eos() {
		let (tx, rx) = mpsc::channel(8);
		let (collected, mut output) = mpsc::unbounded_channel();

		let pipeline = Arc::new(SendPipeline::new(rx, Collect(collected)));
		pipeline.play().unwrap();

		for i in 0..3u8 {
			tx.send(Sample::new(vec![i; 4])).await.unwrap();
		}
		drop(tx);

		let message = tokio::task::spawn_blocking({
			let pipeline = pipeline.clone();
			move || pop(&pipeline)
		})
		.await
		.unwrap();
		assert!(matches!(message, Some(Message::Eos)));

		for i in 0..3u8 {
			assert_eq!(output.recv().await.unwrap().payload, vec![i; 4]);
		}

		tokio::task::spawn_blocking(move || pipeline.stop()).await.unwrap().unwrap();
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn test_eos_while_idle() {
		let (_tx, rx) = mpsc::channel(8);
		let (collected, _output) = mpsc::unbounded_channel();

		let pipeline = Arc::new(SendPipeline::new(rx, Collect(collected)));
		pipeline.play().unwrap();
		assert!(pipeline.play().is_err());

		assert!(pipeline.send_eos());

		let message = tokio::task::spawn_blocking(move || pop(&pipeline)).await.unwrap();
		assert!(matches!(message, Some(Message::Eos)));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn test_producer_error() {
		let (tx, rx) = mpsc::channel(8);

		let pipeline = Arc::new(SendPipeline::new(rx, Fail));
		pipeline.play().unwrap();
		tx.send(Sample::new(&b"rtp"[..])).await.unwrap();

		let message = tokio::task::spawn_blocking(move || pop(&pipeline)).await.unwrap();
		assert!(matches!(message, Some(Message::Error(_))));
	}
}
