use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{Error, FlowId, session::Shared};

/// An inbound media flow.
///
/// Every read yields the payload of exactly one unit, in the order the units' streams were opened.
/// Safe to share between tasks; concurrent readers each get distinct units.
pub struct ReceiveFlow {
	shared: Arc<Shared>,
	id: FlowId,
	queue: async_channel::Receiver<Bytes>,

	// A unit that didn't fit into the caller's buffer.
	stash: Mutex<Option<Bytes>>,
}

impl ReceiveFlow {
	pub(crate) fn new(shared: Arc<Shared>, id: FlowId, queue: async_channel::Receiver<Bytes>) -> Self {
		Self {
			shared,
			id,
			queue,
			stash: Default::default(),
		}
	}

	pub fn id(&self) -> FlowId {
		self.id
	}

	/// Copy the next unit's payload into `buf`.
	///
	/// Returns `Some(size)` for each unit (an empty unit is `Some(0)`), or `None` once the peer closed the
	/// session and every delivered unit was read.
	/// A unit larger than `buf` results in [Error::BufferTooSmall] and remains queued for the next read.
	pub async fn read(&self, buf: &mut [u8]) -> Result<Option<usize>, Error> {
		let Some(unit) = self.read_unit().await? else {
			return Ok(None);
		};

		if unit.len() > buf.len() {
			let needed = unit.len();
			*self.stash.lock() = Some(unit);
			return Err(Error::BufferTooSmall {
				needed,
				capacity: buf.len(),
			});
		}

		buf[..unit.len()].copy_from_slice(&unit);
		Ok(Some(unit.len()))
	}

	/// Return the next unit's payload without copying it.
	pub async fn read_unit(&self) -> Result<Option<Bytes>, Error> {
		if let Some(unit) = self.stash.lock().take() {
			return Ok(Some(unit));
		}

		match self.queue.recv().await {
			Ok(unit) => Ok(Some(unit)),
			Err(_) => self.shared.end_of_flow().map(|_| None),
		}
	}
}

impl Drop for ReceiveFlow {
	fn drop(&mut self) {
		self.shared.release_recv(self.id);
	}
}
