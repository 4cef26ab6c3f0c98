use std::time::Duration;

use bytes::Bytes;
use derive_more::Debug;

/// A timestamped block of media bytes produced by the pipeline.
///
/// On the sending side this is one RTP packet as emitted by the payloader.
#[derive(Clone, Debug, Default)]
pub struct Sample {
	/// The presentation timestamp, if the engine assigned one.
	pub pts: Option<Duration>,

	#[debug("{} bytes", payload.len())]
	pub payload: Bytes,
}

impl Sample {
	pub fn new(payload: impl Into<Bytes>) -> Self {
		Self {
			pts: None,
			payload: payload.into(),
		}
	}

	pub fn with_pts(mut self, pts: Duration) -> Self {
		self.pts = Some(pts);
		self
	}

	pub fn len(&self) -> usize {
		self.payload.len()
	}

	pub fn is_empty(&self) -> bool {
		self.payload.is_empty()
	}
}
