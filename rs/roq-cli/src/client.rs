use std::{sync::Arc, time::Duration};

use roq_lite::{ReceiveFlow, Session};
use roq_pipe::{
	Controller, ReceiveAdapter, Shutdown,
	synthetic::{RecvPipeline, RtpMonitor},
};

use crate::{Config, Sink, Throughput};

/// Connect to the server and receive its video until it finishes or we're told to stop.
pub async fn client(config: Config, stats: Arc<Throughput>) -> anyhow::Result<()> {
	let client = config.dialer.init(&config.quic)?.with_stats(stats);

	tracing::info!(addr = %config.addr, flow = config.flow, "connecting");

	let session = tokio::select! {
		res = client.connect(&config.addr) => res?,
		_ = crate::terminated() => return Ok(()),
	};

	let flow = session.new_receive_flow(config.flow)?;

	let res = match config.sink {
		Sink::Monitor => monitor(session, flow).await,
		Sink::Gstreamer => gstreamer(session, flow).await,
	};

	// Give the close frame a chance to reach the server.
	tokio::time::sleep(Duration::from_millis(100)).await;

	res
}

async fn monitor(session: Session, flow: ReceiveFlow) -> anyhow::Result<()> {
	let shutdown = Shutdown::new();
	let monitor = RtpMonitor::new();

	let pipeline = RecvPipeline::new(ReceiveAdapter::new(flow, shutdown.clone()), monitor.clone());
	let res = crate::drive(Controller::new(pipeline, session, shutdown)).await;

	let stats = monitor.stats();
	tracing::info!(
		packets = stats.packets,
		bytes = stats.bytes,
		frames = stats.frames,
		lost = stats.lost,
		late = stats.late,
		"received"
	);

	res
}

#[cfg(feature = "gstreamer")]
async fn gstreamer(session: Session, flow: ReceiveFlow) -> anyhow::Result<()> {
	use roq_pipe::gst::{Engine, GstPipeline};

	let engine = Engine::init()?;
	let shutdown = Shutdown::new();

	let pipeline = GstPipeline::receiver(&engine, ReceiveAdapter::new(flow, shutdown.clone()))?;
	let res = crate::drive(Controller::new(pipeline, session, shutdown)).await;

	drop(engine);
	res
}

#[cfg(not(feature = "gstreamer"))]
async fn gstreamer(session: Session, _flow: ReceiveFlow) -> anyhow::Result<()> {
	session.close(roq_lite::Code::Internal, "unsupported sink");
	anyhow::bail!("the gstreamer sink requires the `gstreamer` feature")
}
