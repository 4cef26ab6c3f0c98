mod client;
mod config;
mod server;
mod throughput;

use std::{sync::Arc, time::Duration};

use client::*;
use config::*;
use server::*;
use throughput::*;

use roq_pipe::{Controller, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let config = Config::load()?;
	config.log.init();

	let stats = Arc::new(Throughput::default());
	let report = match config.stats_interval {
		0 => None,
		secs => Some(stats.spawn_report(Duration::from_secs(secs))),
	};

	let res = match config.server {
		true => server(config, stats.clone()).await,
		false => client(config, stats.clone()).await,
	};

	if let Some(report) = report {
		report.abort();
	}

	tracing::info!(
		rx_bytes = stats.rx_bytes(),
		tx_bytes = stats.tx_bytes(),
		rx_packets = stats.rx_packets(),
		tx_packets = stats.tx_packets(),
		"done"
	);

	res
}

/// Run the controller until the pipeline finishes, draining it on Ctrl-C or SIGTERM.
async fn drive<P: Pipeline>(controller: Controller<P>) -> anyhow::Result<()> {
	#[cfg(unix)]
	// Notify systemd that we're ready.
	let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

	let signal = tokio::spawn({
		let controller = controller.clone();
		async move {
			terminated().await;
			tracing::info!("shutting down");
			controller.close();
		}
	});

	let res = controller.run().await;

	// The task holds a clone of the controller, which must be gone before the engine is.
	signal.abort();
	let _ = signal.await;

	Ok(res?)
}

/// Resolves on the first Ctrl-C or SIGTERM.
async fn terminated() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		match signal(SignalKind::terminate()) {
			Ok(mut term) => tokio::select! {
				_ = tokio::signal::ctrl_c() => {},
				_ = term.recv() => {},
			},
			Err(err) => {
				tracing::warn!(%err, "failed to listen for SIGTERM");
				let _ = tokio::signal::ctrl_c().await;
			}
		}
	}

	#[cfg(not(unix))]
	let _ = tokio::signal::ctrl_c().await;
}
