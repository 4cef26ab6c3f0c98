//! Byte and packet accounting for RoQ sessions.
//!
//! Every RTP packet is counted once, when it's written to a frame transfer unit or datagram, or when it's
//! handed to a receive flow. Flow identifiers, length prefixes and transport-level effects such as
//! retransmissions are not included, so the totals reflect the media bitrate.
//!
//! Units parked for an unknown flow are counted once the flow is registered, and never if it isn't.

/// A sink for RTP accounting, shared by every flow of a session.
///
/// Called from the session's tasks; implementations should be fast and non-blocking (e.g., atomics).
pub trait Stats: Send + Sync + 'static {
	/// Record RTP bytes received for a registered flow.
	fn add_rx_bytes(&self, bytes: u64);

	/// Record RTP bytes written to a unit or datagram.
	fn add_tx_bytes(&self, bytes: u64);

	/// Record RTP packets received for a registered flow.
	fn add_rx_packets(&self, _packets: u64) {}

	/// Record RTP packets written to a unit or datagram.
	fn add_tx_packets(&self, _packets: u64) {}
}

/// Default stats sink that does nothing.
#[derive(Default)]
pub struct NoopStats;

impl Stats for NoopStats {
	fn add_rx_bytes(&self, _bytes: u64) {}
	fn add_tx_bytes(&self, _bytes: u64) {}
}
