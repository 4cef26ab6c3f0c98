use std::sync::Arc;

use roq_lite::{SendFlow, Session};
use roq_pipe::{
	Controller, SendAdapter, Shutdown,
	synthetic::{SendPipeline, TestPattern},
};
use tokio::sync::mpsc;

use crate::{Config, Source, Throughput};

/// Accept a single client and send it our video until the source ends or we're told to stop.
pub async fn server(config: Config, stats: Arc<Throughput>) -> anyhow::Result<()> {
	let server = roq_native::Server::bind(&config.addr, config.listener, &config.quic)
		.await?
		.with_stats(stats);

	let session = tokio::select! {
		res = server.accept() => res?,
		_ = crate::terminated() => return Ok(()),
	};

	let flow = session.new_send_flow(config.flow)?;

	let res = match config.source {
		Source::TestPattern => test_pattern(session, flow).await,
		Source::Gstreamer => gstreamer(session, flow).await,
	};

	// Only the one session; make sure the peer hears about it closing.
	server.close();
	server.wait_idle().await;

	res
}

async fn test_pattern(session: Session, flow: SendFlow) -> anyhow::Result<()> {
	let (samples, source) = mpsc::channel(16);
	let pattern = TestPattern::default().spawn(samples);

	let pipeline = SendPipeline::new(source, SendAdapter::new(flow));
	let res = crate::drive(Controller::new(pipeline, session, Shutdown::new())).await;

	pattern.abort();
	res
}

#[cfg(feature = "gstreamer")]
async fn gstreamer(session: Session, flow: SendFlow) -> anyhow::Result<()> {
	use roq_pipe::gst::{Engine, GstPipeline};

	let engine = Engine::init()?;

	let pipeline = GstPipeline::sender(&engine, SendAdapter::new(flow))?;
	let res = crate::drive(Controller::new(pipeline, session, Shutdown::new())).await;

	drop(engine);
	res
}

#[cfg(not(feature = "gstreamer"))]
async fn gstreamer(session: Session, _flow: SendFlow) -> anyhow::Result<()> {
	session.close(roq_lite::Code::Internal, "unsupported source");
	anyhow::bail!("the gstreamer source requires the `gstreamer` feature")
}
