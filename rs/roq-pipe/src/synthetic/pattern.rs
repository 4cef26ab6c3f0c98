use std::time::Duration;

use tokio::sync::mpsc;

use crate::{
	Sample,
	rtp::{CLOCK_RATE, Header, PAYLOAD_TYPE},
};

/// Generates RTP packets at a fixed frame rate, one packet per frame.
///
/// Stands in for an encoder and payloader; the payload is filler.
#[derive(Debug, Clone)]
pub struct TestPattern {
	pub frame_rate: u32,
	pub payload_size: usize,
	pub ssrc: u32,

	/// Stop after this many frames, closing the channel.
	pub frames: Option<u64>,
}

impl Default for TestPattern {
	fn default() -> Self {
		Self {
			frame_rate: 30,
			payload_size: 1000,
			ssrc: 0x524f_5121,
			frames: None,
		}
	}
}

impl TestPattern {
	pub fn spawn(self, samples: mpsc::Sender<Sample>) -> tokio::task::JoinHandle<()> {
		tokio::spawn(self.run(samples))
	}

	/// Produce packets until the receiver is dropped or the frame limit is reached.
	pub async fn run(self, samples: mpsc::Sender<Sample>) {
		let frame_rate = self.frame_rate.max(1);
		let period = Duration::from_secs(1) / frame_rate;
		let step = CLOCK_RATE / frame_rate;

		let mut interval = tokio::time::interval(period);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		let mut frame = 0u64;
		while self.frames.is_none_or(|frames| frame < frames) {
			interval.tick().await;

			let header = Header {
				marker: true,
				payload_type: PAYLOAD_TYPE,
				sequence: frame as u16,
				timestamp: (frame as u32).wrapping_mul(step),
				ssrc: self.ssrc,
			};

			let payload = vec![frame as u8; self.payload_size];
			let sample = Sample::new(header.packet(&payload)).with_pts(period.saturating_mul(frame as u32));

			if samples.send(sample).await.is_err() {
				tracing::debug!(frame, "pattern stopped");
				return;
			}

			frame += 1;
		}

		tracing::debug!(frame, "pattern finished");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_packets() {
		let (tx, mut rx) = mpsc::channel(16);

		let pattern = TestPattern {
			frame_rate: 25,
			payload_size: 10,
			frames: Some(3),
			..Default::default()
		};
		pattern.spawn(tx);

		for frame in 0..3u16 {
			let sample = rx.recv().await.unwrap();
			assert_eq!(sample.len(), Header::SIZE + 10);
			assert_eq!(sample.pts, Some(Duration::from_millis(40) * frame as u32));

			let (header, payload) = Header::parse(&sample.payload).unwrap();
			assert_eq!(header.sequence, frame);
			assert_eq!(header.timestamp, 3600 * frame as u32);
			assert_eq!(header.payload_type, PAYLOAD_TYPE);
			assert!(payload.iter().all(|b| *b == frame as u8));
		}

		// The channel is closed after the last frame.
		assert!(rx.recv().await.is_none());
	}
}
