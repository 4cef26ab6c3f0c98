use std::{
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use roq_lite::Stats;

/// Counts RTP bytes and packets in both directions.
#[derive(Default)]
pub struct Throughput {
	rx: AtomicU64,
	tx: AtomicU64,
	rx_packets: AtomicU64,
	tx_packets: AtomicU64,
}

impl Stats for Throughput {
	fn add_rx_bytes(&self, bytes: u64) {
		self.rx.fetch_add(bytes, Ordering::Relaxed);
	}

	fn add_tx_bytes(&self, bytes: u64) {
		self.tx.fetch_add(bytes, Ordering::Relaxed);
	}

	fn add_rx_packets(&self, packets: u64) {
		self.rx_packets.fetch_add(packets, Ordering::Relaxed);
	}

	fn add_tx_packets(&self, packets: u64) {
		self.tx_packets.fetch_add(packets, Ordering::Relaxed);
	}
}

impl Throughput {
	pub fn rx_bytes(&self) -> u64 {
		self.rx.load(Ordering::Relaxed)
	}

	pub fn tx_bytes(&self) -> u64 {
		self.tx.load(Ordering::Relaxed)
	}

	pub fn rx_packets(&self) -> u64 {
		self.rx_packets.load(Ordering::Relaxed)
	}

	pub fn tx_packets(&self) -> u64 {
		self.tx_packets.load(Ordering::Relaxed)
	}

	/// Log the rate every `interval` until the task is aborted.
	pub fn spawn_report(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
		let this = self.clone();

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			ticker.tick().await;

			let (mut rx, mut tx) = (0, 0);
			loop {
				ticker.tick().await;

				let (rx_total, tx_total) = (this.rx_bytes(), this.tx_bytes());
				let secs = interval.as_secs_f64();

				tracing::info!(
					rx_kbps = rate(rx_total - rx, secs),
					tx_kbps = rate(tx_total - tx, secs),
					rx_total,
					tx_total,
					rx_packets = this.rx_packets(),
					tx_packets = this.tx_packets(),
					"throughput"
				);

				(rx, tx) = (rx_total, tx_total);
			}
		})
	}
}

fn rate(bytes: u64, secs: f64) -> u64 {
	(bytes as f64 * 8.0 / 1000.0 / secs) as u64
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_counts() {
		let stats = Throughput::default();
		stats.add_rx_bytes(1000);
		stats.add_rx_bytes(500);
		stats.add_tx_bytes(42);
		stats.add_rx_packets(2);

		assert_eq!(stats.rx_bytes(), 1500);
		assert_eq!(stats.tx_bytes(), 42);
		assert_eq!(stats.rx_packets(), 2);
		assert_eq!(stats.tx_packets(), 0);
	}

	#[test]
	fn test_rate() {
		assert_eq!(rate(125_000, 1.0), 1000);
		assert_eq!(rate(125_000, 5.0), 200);
		assert_eq!(rate(0, 5.0), 0);
	}
}
