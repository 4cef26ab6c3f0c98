use std::{
	collections::{HashMap, HashSet, VecDeque},
	net::SocketAddr,
	sync::Arc,
};

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream::FuturesOrdered};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
	Code, DatagramUnit, Error, FlowId, NoopStats, ReceiveFlow, SendFlow, SendUnit, Stats, StreamUnit,
	coding::Encode,
};

/// The ALPN string negotiated by both endpoints.
pub const ALPN: &str = "roq-10";

/// The largest stream unit accepted from the peer, including framing.
pub const MAX_UNIT_SIZE: usize = 1 << 20;

/// Units buffered per receive flow before the session stops accepting new streams.
const FLOW_QUEUE: usize = 128;

/// Units buffered for a flow that has not been registered yet; the oldest are dropped first.
const MAX_PARKED: usize = 64;

/// Unregistered flows with buffered units; units for any further flows are dropped.
pub const MAX_PARKED_FLOWS: usize = 8;

/// Which side of the QUIC handshake this session was created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	/// Dialed the connection.
	Initiator,
	/// Accepted the connection.
	Responder,
}

/// An RTP-over-QUIC session, wrapping a single QUIC connection.
///
/// Media is exchanged over numbered flows, see [Session::new_send_flow] and [Session::new_receive_flow].
/// The handle is cheap to clone; every clone refers to the same connection.
#[derive(Clone)]
pub struct Session {
	shared: Arc<Shared>,
}

impl Session {
	/// Wrap an established connection, spawning the task that dispatches inbound units.
	///
	/// Must be called from within a tokio runtime.
	pub fn new(conn: quinn::Connection, role: Role) -> Self {
		Self::new_with_stats(conn, role, Arc::new(NoopStats))
	}

	/// Same as [Session::new], reporting RTP payload bytes to the given [Stats] sink.
	pub fn new_with_stats(conn: quinn::Connection, role: Role, stats: Arc<dyn Stats>) -> Self {
		let (inflight, _) = watch::channel(0);

		let shared = Arc::new(Shared {
			conn,
			role,
			state: Default::default(),
			inflight,
			stats,
		});

		tokio::spawn(run_recv(shared.clone()));

		tracing::debug!(?role, remote = %shared.conn.remote_address(), "session established");

		Self { shared }
	}

	/// Register an outbound flow.
	pub fn new_send_flow(&self, id: impl Into<FlowId>) -> Result<SendFlow, Error> {
		let id = id.into();

		let mut state = self.shared.state.lock();
		if !state.send.insert(id) {
			return Err(Error::FlowInUse(id));
		}

		tracing::debug!(flow = %id, "send flow registered");
		Ok(SendFlow::new(self.shared.clone(), id))
	}

	/// Register an inbound flow.
	///
	/// Units that arrived for this identifier before registration are delivered first.
	pub fn new_receive_flow(&self, id: impl Into<FlowId>) -> Result<ReceiveFlow, Error> {
		let id = id.into();

		let mut state = self.shared.state.lock();

		if !state.receiving.insert(id) {
			return Err(Error::FlowInUse(id));
		}

		let parked = state.parked.remove(&id).unwrap_or_default();
		let (tx, rx) = async_channel::bounded(FLOW_QUEUE.max(parked.len()).max(1));
		for packet in parked {
			self.shared.stats.add_rx_bytes(packet.len() as u64);
			self.shared.stats.add_rx_packets(1);

			// Can't fail; the channel is large enough and we hold the receiver.
			let _ = tx.try_send(packet);
		}

		// Once the session is gone, the flow only yields what was already parked.
		if state.closed.is_none() {
			state.recv.insert(id, tx);
		}

		tracing::debug!(flow = %id, "receive flow registered");
		Ok(ReceiveFlow::new(self.shared.clone(), id, rx))
	}

	/// Close the connection immediately, abandoning any data that is still in flight.
	///
	/// Calling this more than once has no further effect.
	pub fn close(&self, code: Code, reason: &str) {
		self.shared.state.lock().shutdown = true;
		self.shared.conn.close(code.into(), reason.as_bytes());
	}

	/// Stop opening new units, wait until every closed unit was acknowledged, then close gracefully.
	///
	/// There is no timeout; a peer that never acknowledges keeps this pending until the connection times out.
	pub async fn finish(&self) {
		self.shared.state.lock().shutdown = true;

		let mut inflight = self.shared.inflight.subscribe();
		// Can't fail; we hold the sender.
		let _ = inflight.wait_for(|count| *count == 0).await;

		self.shared.conn.close(Code::NoError.into(), b"");
	}

	/// Block until the connection is closed, returning an error unless it was closed gracefully.
	pub async fn closed(&self) -> Result<(), Error> {
		let err = self.shared.conn.closed().await;
		match crate::error::is_graceful(&err) {
			true => Ok(()),
			false => Err(err.into()),
		}
	}

	pub fn role(&self) -> Role {
		self.shared.role
	}

	pub fn remote_address(&self) -> SocketAddr {
		self.shared.conn.remote_address()
	}

	/// The largest RTP packet that fits in a datagram, or None if the peer doesn't support datagrams.
	pub fn max_datagram_size(&self) -> Option<usize> {
		self.shared.conn.max_datagram_size()
	}
}

#[derive(Default)]
struct State {
	send: HashSet<FlowId>,

	// Every registered receive flow, even after the session closed.
	receiving: HashSet<FlowId>,
	recv: HashMap<FlowId, async_channel::Sender<Bytes>>,

	// Units for flows that haven't been registered (yet).
	parked: HashMap<FlowId, VecDeque<Bytes>>,

	// No new units may be opened.
	shutdown: bool,

	// Set once the connection is gone and no more units will be dispatched.
	closed: Option<quinn::ConnectionError>,
}

pub(crate) struct Shared {
	conn: quinn::Connection,
	role: Role,
	state: Mutex<State>,

	// The number of closed units not yet acknowledged by the peer.
	inflight: watch::Sender<usize>,

	pub(crate) stats: Arc<dyn Stats>,
}

impl Shared {
	pub(crate) async fn open_unit(self: &Arc<Self>, flow: FlowId) -> Result<SendUnit, Error> {
		if self.state.lock().shutdown {
			return Err(Error::shutting_down());
		}

		let mut stream = self.conn.open_uni().await?;

		let mut header = BytesMut::with_capacity(8);
		flow.encode(&mut header);
		stream.write_all(&header).await?;

		Ok(SendUnit::new(self.clone(), flow, stream))
	}

	pub(crate) fn send_datagram(&self, flow: FlowId, packet: &[u8]) -> Result<(), Error> {
		if self.state.lock().shutdown {
			return Err(Error::shutting_down());
		}

		let mut buf = BytesMut::with_capacity(8 + packet.len());
		flow.encode(&mut buf);
		buf.extend_from_slice(packet);

		match self.conn.max_datagram_size() {
			Some(max) if buf.len() > max => return Err(Error::TooLarge(packet.len())),
			// The peer doesn't accept datagrams; let quinn report it.
			_ => {}
		}

		self.conn.send_datagram(buf.freeze())?;
		self.stats.add_tx_bytes(packet.len() as u64);
		self.stats.add_tx_packets(1);

		Ok(())
	}

	/// Keep the session open until the peer acknowledged the finished stream.
	pub(crate) fn track(self: &Arc<Self>, mut stream: quinn::SendStream) {
		self.inflight.send_modify(|count| *count += 1);

		let shared = self.clone();
		tokio::spawn(async move {
			if let Err(err) = stream.stopped().await {
				tracing::trace!(%err, "unit not acknowledged");
			}
			shared.inflight.send_modify(|count| *count -= 1);
		});
	}

	pub(crate) fn release_send(&self, flow: FlowId) {
		self.state.lock().send.remove(&flow);
	}

	pub(crate) fn release_recv(&self, flow: FlowId) {
		let mut state = self.state.lock();
		state.receiving.remove(&flow);
		state.recv.remove(&flow);
	}

	/// The result of reading from a flow whose queue was closed.
	pub(crate) fn end_of_flow(&self) -> Result<(), Error> {
		match &self.state.lock().closed {
			Some(err) if !crate::error::is_graceful(err) => Err(err.clone().into()),
			_ => Ok(()),
		}
	}

	/// Hand a packet to its flow, waiting while the flow's queue is full.
	async fn deliver(&self, flow: FlowId, packet: Bytes) {
		let queue = {
			let mut state = self.state.lock();
			match state.recv.get(&flow) {
				Some(queue) => queue.clone(),
				None => return state.park(flow, packet),
			}
		};

		self.stats.add_rx_bytes(packet.len() as u64);
		self.stats.add_rx_packets(1);

		if queue.send(packet).await.is_err() {
			tracing::debug!(%flow, "flow dropped while delivering");
		}
	}

	/// Hand a datagram to its flow, dropping it if the flow's queue is full.
	fn deliver_datagram(&self, unit: DatagramUnit) {
		let mut state = self.state.lock();
		let Some(queue) = state.recv.get(&unit.flow) else {
			return state.park(unit.flow, unit.packet);
		};

		let size = unit.packet.len();
		match queue.try_send(unit.packet) {
			Ok(()) => {
				self.stats.add_rx_bytes(size as u64);
				self.stats.add_rx_packets(1);
			}
			Err(_) => tracing::debug!(flow = %unit.flow, "flow queue full, dropping datagram"),
		}
	}

	fn close(&self, err: quinn::ConnectionError) {
		let mut state = self.state.lock();
		state.shutdown = true;
		state.closed = Some(err);

		// Dropping the senders lets readers drain their queues and then observe the end.
		state.recv.clear();
	}
}

impl Drop for Shared {
	fn drop(&mut self) {
		// No-op if the connection was already closed.
		self.conn.close(Code::Cancel.into(), b"dropped");
	}
}

impl State {
	fn park(&mut self, flow: FlowId, packet: Bytes) {
		if !self.parked.contains_key(&flow) && self.parked.len() >= MAX_PARKED_FLOWS {
			tracing::warn!(%flow, "too many unknown flows, dropping unit");
			return;
		}

		let parked = self.parked.entry(flow).or_default();
		if parked.len() >= MAX_PARKED {
			tracing::warn!(%flow, "too many units for unknown flow, dropping oldest");
			parked.pop_front();
		}
		parked.push_back(packet);
	}
}

#[tracing::instrument("session", skip_all, fields(role = ?shared.role))]
async fn run_recv(shared: Arc<Shared>) {
	// NOTE: The task only holds the connection, so dropping every Session handle still closes it.
	let conn = shared.conn.clone();
	let shared = Arc::downgrade(&shared);

	// Units are read concurrently but handed over in the order their streams were opened.
	let mut units = FuturesOrdered::new();
	let mut datagrams = true;

	let err = loop {
		tokio::select! {
			res = conn.accept_uni() => match res {
				Ok(stream) => units.push_back(read_unit(stream)),
				Err(err) => break err,
			},
			Some(unit) = units.next(), if !units.is_empty() => {
				let Some(shared) = shared.upgrade() else { return };
				if let Some(unit) = unit {
					for packet in unit.packets {
						shared.deliver(unit.flow, packet).await;
					}
				}
			},
			res = conn.read_datagram(), if datagrams => match res {
				Ok(datagram) => {
					let Some(shared) = shared.upgrade() else { return };
					match DatagramUnit::decode(datagram) {
						Ok(unit) => shared.deliver_datagram(unit),
						Err(err) => tracing::debug!(%err, "invalid datagram"),
					}
				}
				Err(err) => {
					tracing::trace!(%err, "no more datagrams");
					datagrams = false;
				}
			},
		}
	};

	// Hand over anything that was fully received before the connection closed.
	while let Some(unit) = units.next().await {
		let Some(shared) = shared.upgrade() else { return };
		if let Some(unit) = unit {
			for packet in unit.packets {
				shared.deliver(unit.flow, packet).await;
			}
		}
	}

	match crate::error::is_graceful(&err) {
		true => tracing::info!("session closed"),
		false => tracing::warn!(%err, "session terminated"),
	}

	if let Some(shared) = shared.upgrade() {
		shared.close(err);
	}
}

/// Read an entire unit; a unit that can't be read is dropped, as media tolerates loss.
async fn read_unit(mut stream: quinn::RecvStream) -> Option<StreamUnit> {
	let data = match stream.read_to_end(MAX_UNIT_SIZE).await {
		Ok(data) => data,
		Err(err) => {
			tracing::debug!(%err, "dropping unit");
			let _ = stream.stop(Code::Cancel.into());
			return None;
		}
	};

	match StreamUnit::decode(Bytes::from(data)) {
		Ok(unit) => Some(unit),
		Err(err) => {
			tracing::warn!(%err, "malformed unit");
			None
		}
	}
}
