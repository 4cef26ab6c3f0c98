use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::{Render, RenderError};
use crate::rtp::{Header, PAYLOAD_TYPE};

/// Counters collected by an [RtpMonitor].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
	pub packets: u64,
	pub bytes: u64,
	/// Packets with the marker bit set, which ends a frame for video.
	pub frames: u64,
	/// Packets missing according to sequence numbers.
	pub lost: u64,
	/// Packets that arrived after a later sequence number.
	pub late: u64,
}

/// A [Render] that validates RTP headers and tracks sequence gaps.
///
/// Clones share the same counters, so keep one to read [RtpMonitor::stats] after handing another to a pipeline.
#[derive(Clone, Default)]
pub struct RtpMonitor {
	state: Arc<Mutex<MonitorState>>,
}

#[derive(Default)]
struct MonitorState {
	stats: MonitorStats,
	ssrc: Option<u32>,
	next: Option<u16>,
}

impl RtpMonitor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stats(&self) -> MonitorStats {
		self.state.lock().stats
	}
}

impl Render for RtpMonitor {
	fn render(&mut self, packet: Bytes) -> Result<(), RenderError> {
		let (header, payload) = Header::parse(&packet)?;

		let mut state = self.state.lock();

		if header.payload_type != PAYLOAD_TYPE {
			tracing::debug!(payload_type = header.payload_type, "unexpected payload type");
		}

		if state.ssrc != Some(header.ssrc) {
			tracing::info!(ssrc = header.ssrc, "new stream");
			state.ssrc = Some(header.ssrc);
			state.next = None;
		}

		if let Some(next) = state.next {
			let gap = header.sequence.wrapping_sub(next);
			if gap >= 0x8000 {
				// Behind the expected sequence number.
				state.stats.late += 1;
				state.stats.packets += 1;
				state.stats.bytes += payload.len() as u64;
				return Ok(());
			}

			if gap > 0 {
				tracing::debug!(expected = next, got = header.sequence, "sequence gap");
				state.stats.lost += gap as u64;
			}
		}

		state.next = Some(header.sequence.wrapping_add(1));
		state.stats.packets += 1;
		state.stats.bytes += payload.len() as u64;
		if header.marker {
			state.stats.frames += 1;
		}

		Ok(())
	}
}
