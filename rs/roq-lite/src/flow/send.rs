use std::sync::Arc;

use bytes::BytesMut;

use crate::{Code, Error, FlowId, coding::*, session::Shared};

/// An outbound media flow.
///
/// Each RTP packet is sent on its own [SendUnit]; see [SendFlow::new_send_unit].
/// The identifier is released when the flow is dropped.
pub struct SendFlow {
	shared: Arc<Shared>,
	id: FlowId,
}

impl SendFlow {
	pub(crate) fn new(shared: Arc<Shared>, id: FlowId) -> Self {
		Self { shared, id }
	}

	pub fn id(&self) -> FlowId {
		self.id
	}

	/// Open a new unidirectional stream for exactly one write.
	///
	/// Waits for stream credit from the peer, which is how a slow receiver pushes back.
	pub async fn new_send_unit(&self) -> Result<SendUnit, Error> {
		self.shared.open_unit(self.id).await
	}

	/// Send a single RTP packet as an unreliable datagram.
	pub fn send_datagram(&self, packet: &[u8]) -> Result<(), Error> {
		self.shared.send_datagram(self.id, packet)
	}
}

impl Drop for SendFlow {
	fn drop(&mut self) {
		self.shared.release_send(self.id);
	}
}

/// A short-lived stream carrying one media sample.
///
/// Call [SendUnit::close] once the packet is written.
/// Unlike the Quinn default, the stream is reset if the unit is dropped without closing it.
pub struct SendUnit {
	shared: Arc<Shared>,
	flow: FlowId,
	stream: Option<quinn::SendStream>,
	buffer: BytesMut,
}

impl SendUnit {
	pub(crate) fn new(shared: Arc<Shared>, flow: FlowId, stream: quinn::SendStream) -> Self {
		Self {
			shared,
			flow,
			stream: Some(stream),
			buffer: Default::default(),
		}
	}

	pub fn flow(&self) -> FlowId {
		self.flow
	}

	/// Write one length-prefixed RTP packet, returning the number of payload bytes written.
	pub async fn write_rtp(&mut self, packet: &[u8]) -> Result<usize, Error> {
		let stream = self.stream.as_mut().ok_or(Error::ClosedStream)?;

		self.buffer.clear();
		VarInt::try_from(packet.len())?.encode(&mut self.buffer);

		stream.write_all(&self.buffer).await?;
		stream.write_all(packet).await?;

		self.shared.stats.add_tx_bytes(packet.len() as u64);
		self.shared.stats.add_tx_packets(1);

		Ok(packet.len())
	}

	/// Finish the stream, handing it to the session until the peer acknowledges it.
	pub fn close(mut self) -> Result<(), Error> {
		let mut stream = self.stream.take().ok_or(Error::ClosedStream)?;
		stream.finish()?;
		self.shared.track(stream);
		Ok(())
	}
}

impl Drop for SendUnit {
	fn drop(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			let _ = stream.reset(Code::Cancel.into());
		}
	}
}
