use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread,
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::Bus;
use crate::{
	FlowError, FlowResult, FlowSuccess, FrameConsumer, Message, Pipeline, PipelineError, SampleSink, Shutdown,
	rtp::RtpError,
};

/// The byte count requested from the consumer on every need-data call.
const NEED_DATA: usize = 4096;

/// The final stage of a [RecvPipeline], standing in for decode and display.
pub trait Render: Send + 'static {
	fn render(&mut self, packet: Bytes) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
	#[error("invalid rtp: {0}")]
	Rtp(#[from] RtpError),

	#[error("closed")]
	Closed,
}

impl Render for mpsc::UnboundedSender<Bytes> {
	fn render(&mut self, packet: Bytes) -> Result<(), RenderError> {
		self.send(packet).map_err(|_| RenderError::Closed)
	}
}

/// A receiving pipeline that asks a [FrameConsumer] for buffers until end-of-stream.
pub struct RecvPipeline {
	consumer: Arc<dyn FrameConsumer>,
	render: Mutex<Option<Box<dyn Render>>>,

	bus: Arc<Bus>,
	eos: Shutdown,
	thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RecvPipeline {
	pub fn new(consumer: impl FrameConsumer, render: impl Render) -> Self {
		Self {
			consumer: Arc::new(consumer),
			render: Mutex::new(Some(Box::new(render))),
			bus: Default::default(),
			eos: Shutdown::new(),
			thread: Default::default(),
		}
	}
}

impl Pipeline for RecvPipeline {
	fn play(&self) -> Result<(), PipelineError> {
		let render = self
			.render
			.lock()
			.take()
			.ok_or_else(|| PipelineError::new("recvpipeline", "already playing"))?;

		let consumer = self.consumer.clone();
		let input = Input {
			render: Mutex::new(render),
			ended: AtomicBool::new(false),
			error: Mutex::new(None),
			eos: self.eos.clone(),
		};
		let bus = self.bus.clone();

		let thread = thread::Builder::new()
			.name("roq-recv".to_string())
			.spawn(move || input.run(consumer.as_ref(), &bus))
			.map_err(|err| PipelineError::new("recvpipeline", err.to_string()))?;

		*self.thread.lock() = Some(thread);
		Ok(())
	}

	fn stop(&self) -> Result<(), PipelineError> {
		self.eos.trigger();
		self.bus.flush();

		let thread = self.thread.lock().take();
		match thread.map(|thread| thread.join()) {
			Some(Err(_)) => Err(PipelineError::new("recvpipeline", "streaming thread panicked")),
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

/// The ingestion point handed to the consumer.
struct Input {
	render: Mutex<Box<dyn Render>>,
	ended: AtomicBool,
	error: Mutex<Option<PipelineError>>,
	eos: Shutdown,
}

impl Input {
	fn run(self, consumer: &dyn FrameConsumer, bus: &Bus) {
		bus.post(Message::Other("stream-start".to_string()));

		while !self.ended.load(Ordering::Acquire) && !self.eos.is_triggered() {
			consumer.on_need_data(&self, NEED_DATA);
		}

		match self.error.lock().take() {
			Some(err) => bus.post(Message::Error(err)),
			None => {
				tracing::debug!("end of stream");
				bus.post(Message::Eos)
			}
		}
	}
}

impl SampleSink for Input {
	fn push_buffer(&self, payload: Bytes) -> FlowResult {
		if self.ended.load(Ordering::Acquire) {
			return Err(FlowError::Eos);
		}

		if let Err(err) = self.render.lock().render(payload) {
			tracing::warn!(%err, "failed to render");
			*self.error.lock() = Some(PipelineError::new("render", err.to_string()));
			self.ended.store(true, Ordering::Release);
			return Err(FlowError::Error);
		}

		Ok(FlowSuccess::Ok)
	}

	fn end_of_stream(&self) -> FlowResult {
		match self.ended.swap(true, Ordering::AcqRel) {
			false => Ok(FlowSuccess::Ok),
			true => Err(FlowError::Eos),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::atomic::AtomicUsize;

	/// Pushes a fixed number of buffers, then ends the stream.
	struct Count {
		remaining: AtomicUsize,
	}

	impl FrameConsumer for Count {
		fn on_need_data(&self, sink: &dyn SampleSink, _length: usize) {
			match self.remaining.fetch_sub(1, Ordering::AcqRel) {
				0 => {
					sink.end_of_stream().unwrap();
				}
				n => {
					let _ = sink.push_buffer(Bytes::from(vec![n as u8; 2]));
				}
			}
		}
	}

	#[test]
	fn test_push_until_end() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let consumer = Count {
			remaining: AtomicUsize::new(3),
		};

		let pipeline = RecvPipeline::new(consumer, tx);
		pipeline.play().unwrap();

		loop {
			match pipeline.pop_message() {
				Some(Message::Eos) => break,
				Some(Message::Other(_)) => continue,
				other => panic!("unexpected message: {other:?}"),
			}
		}

		assert_eq!(rx.try_recv().unwrap(), vec![3u8; 2]);
		assert_eq!(rx.try_recv().unwrap(), vec![2u8; 2]);
		assert_eq!(rx.try_recv().unwrap(), vec![1u8; 2]);
		assert!(rx.try_recv().is_err());

		pipeline.stop().unwrap();
	}

	#[test]
	fn test_render_error() {
		let (tx, rx) = mpsc::unbounded_channel();
		drop(rx);

		let consumer = Count {
			remaining: AtomicUsize::new(3),
		};

		let pipeline = RecvPipeline::new(consumer, tx);
		pipeline.play().unwrap();

		loop {
			match pipeline.pop_message() {
				Some(Message::Error(err)) => {
					assert_eq!(err.element, "render");
					break;
				}
				Some(Message::Other(_)) => continue,
				other => panic!("unexpected message: {other:?}"),
			}
		}

		pipeline.stop().unwrap();
	}
}
