//! GStreamer pipelines bridged through `appsink` and `appsrc`.
//!
//! The sender encodes a test pattern to VP8 and packetizes it into RTP,
//! the receiver depacketizes, decodes and displays it.

use std::{
	str::FromStr,
	sync::{
		Arc, Weak,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::{
	Error, FlowError, FlowResult, FlowSuccess, FrameConsumer, FrameProducer, Message, Pipeline, PipelineError, Sample,
	SampleError, SampleSink, SampleSource, rtp,
};

const SEND: &str = "videotestsrc ! clocksync ! vp8enc ! rtpvp8pay mtu=64000 ! appsink name=sink";
const RECV: &str =
	"appsrc name=src ! rtpjitterbuffer ! rtpvp8depay ! vp8dec ! videoconvert ! clocksync ! autovideosink";

static ENGINE: Mutex<Weak<Guard>> = parking_lot::const_mutex(Weak::new());

// GStreamer can't be initialized again once deinitialized.
static DEINITIALIZED: AtomicBool = AtomicBool::new(false);

/// Keeps GStreamer initialized for the process.
///
/// Every [GstPipeline] holds a clone, so GStreamer is deinitialized once the last handle and pipeline are gone.
#[derive(Clone)]
pub struct Engine(Arc<Guard>);

struct Guard;

impl Engine {
	/// Initialize GStreamer, or return the engine that is already running.
	pub fn init() -> Result<Self, Error> {
		let mut engine = ENGINE.lock();
		if let Some(guard) = engine.upgrade() {
			return Ok(Self(guard));
		}

		if DEINITIALIZED.load(Ordering::Acquire) {
			return Err(Error::Engine("gstreamer was already deinitialized".to_string()));
		}

		gst::init().map_err(|err| Error::Engine(err.to_string()))?;
		tracing::debug!(version = %gst::version_string(), "gstreamer initialized");

		let guard = Arc::new(Guard);
		*engine = Arc::downgrade(&guard);

		Ok(Self(guard))
	}
}

impl Drop for Guard {
	fn drop(&mut self) {
		DEINITIALIZED.store(true, Ordering::Release);
		tracing::debug!("gstreamer deinitialized");

		// SAFETY: every pipeline holds an engine handle and releases its elements before it.
		unsafe { gst::deinit() };
	}
}

/// A GStreamer pipeline driven by the [crate::Controller].
pub struct GstPipeline {
	pipeline: gst::Pipeline,
	bus: gst::Bus,

	// Dropped after the elements above.
	_engine: Engine,
}

impl GstPipeline {
	fn launch(engine: &Engine, description: &str) -> Result<Self, Error> {
		let pipeline = gst::parse::launch(description)
			.map_err(|err| Error::Engine(err.to_string()))?
			.downcast::<gst::Pipeline>()
			.map_err(|_| Error::Engine("not a pipeline".to_string()))?;

		let bus = pipeline
			.bus()
			.ok_or_else(|| Error::Engine("pipeline without a bus".to_string()))?;

		Ok(Self {
			pipeline,
			bus,
			_engine: engine.clone(),
		})
	}

	fn element<T: IsA<gst::Element>>(&self, name: &str) -> Result<T, Error> {
		self.pipeline
			.by_name(name)
			.ok_or_else(|| Error::Engine(format!("missing element: {name}")))?
			.downcast::<T>()
			.map_err(|_| Error::Engine(format!("unexpected element type: {name}")))
	}

	/// Test source, VP8 encoder and RTP payloader feeding the producer.
	pub fn sender(engine: &Engine, producer: impl FrameProducer) -> Result<Self, Error> {
		let this = Self::launch(engine, SEND)?;

		let sink: gst_app::AppSink = this.element("sink")?;
		sink.set_callbacks(
			gst_app::AppSinkCallbacks::builder()
				.new_sample(move |sink| to_gst(producer.on_new_sample(&AppSinkSource(sink))))
				.build(),
		);

		Ok(this)
	}

	/// Jitter buffer, RTP depayloader, VP8 decoder and video sink fed by the consumer.
	pub fn receiver(engine: &Engine, consumer: impl FrameConsumer) -> Result<Self, Error> {
		let this = Self::launch(engine, RECV)?;

		let caps = gst::Caps::from_str(rtp::CAPS).map_err(|err| Error::Engine(err.to_string()))?;

		let src: gst_app::AppSrc = this.element("src")?;
		src.set_caps(Some(&caps));
		src.set_is_live(true);
		src.set_format(gst::Format::Time);
		src.set_callbacks(
			gst_app::AppSrcCallbacks::builder()
				.need_data(move |src, length| consumer.on_need_data(&AppSrcSink(src), length as usize))
				.build(),
		);

		Ok(this)
	}

	fn set_state(&self, state: gst::State) -> Result<(), PipelineError> {
		self.pipeline
			.set_state(state)
			.map(|_| ())
			.map_err(|err| PipelineError::new(self.pipeline.name().as_str(), err.to_string()))
	}
}

impl Pipeline for GstPipeline {
	fn play(&self) -> Result<(), PipelineError> {
		self.set_state(gst::State::Playing)
	}

	fn stop(&self) -> Result<(), PipelineError> {
		let res = self.set_state(gst::State::Null);
		self.bus.set_flushing(true);
		res
	}

	fn send_eos(&self) -> bool {
		self.pipeline.send_event(gst::event::Eos::new())
	}

	fn pop_message(&self) -> Option<Message> {
		let message = self.bus.timed_pop(gst::ClockTime::NONE)?;

		Some(match message.view() {
			gst::MessageView::Eos(_) => Message::Eos,
			gst::MessageView::Error(err) => {
				let element = err.src().map(|src| src.path_string().to_string()).unwrap_or_default();
				let mut error = PipelineError::new(element, err.error().to_string());
				if let Some(debug) = err.debug() {
					error = error.with_debug(debug.as_str());
				}
				Message::Error(error)
			}
			_ => Message::Other(format!("{:?}", message.type_())),
		})
	}
}

impl Drop for GstPipeline {
	fn drop(&mut self) {
		let _ = self.pipeline.set_state(gst::State::Null);
	}
}

fn to_gst(res: FlowResult) -> Result<gst::FlowSuccess, gst::FlowError> {
	match res {
		Ok(FlowSuccess::Ok) => Ok(gst::FlowSuccess::Ok),
		Err(FlowError::Eos) => Err(gst::FlowError::Eos),
		Err(FlowError::Flushing) => Err(gst::FlowError::Flushing),
		Err(FlowError::Error) => Err(gst::FlowError::Error),
	}
}

fn from_gst(res: Result<gst::FlowSuccess, gst::FlowError>) -> FlowResult {
	match res {
		Ok(_) => Ok(FlowSuccess::Ok),
		Err(gst::FlowError::Eos) => Err(FlowError::Eos),
		Err(gst::FlowError::Flushing) => Err(FlowError::Flushing),
		Err(_) => Err(FlowError::Error),
	}
}

struct AppSinkSource<'a>(&'a gst_app::AppSink);

impl SampleSource for AppSinkSource<'_> {
	fn pull_sample(&self) -> Result<Option<Sample>, SampleError> {
		// Fails only once the appsink is at end-of-stream or flushing.
		let Ok(sample) = self.0.pull_sample() else {
			return Ok(None);
		};

		let buffer = sample
			.buffer()
			.ok_or_else(|| SampleError("sample without a buffer".to_string()))?;
		let map = buffer.map_readable().map_err(|err| SampleError(err.to_string()))?;

		Ok(Some(Sample {
			pts: buffer.pts().map(|pts| Duration::from_nanos(pts.nseconds())),
			payload: Bytes::copy_from_slice(map.as_slice()),
		}))
	}
}

struct AppSrcSink<'a>(&'a gst_app::AppSrc);

impl SampleSink for AppSrcSink<'_> {
	fn push_buffer(&self, payload: Bytes) -> FlowResult {
		from_gst(self.0.push_buffer(gst::Buffer::from_slice(payload)))
	}

	fn end_of_stream(&self) -> FlowResult {
		from_gst(self.0.end_of_stream())
	}
}
