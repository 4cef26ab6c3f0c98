use std::time::Duration;

use roq_lite::{Code, Error, FlowId, MAX_PARKED_FLOWS, Role, Session};
use roq_native::{Client, ClientConfig, Server, ServerConfig, TransportConfig};
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the server endpoint (kept alive for the test), the client session and the server session.
async fn pair() -> (Server, Session, Session) {
	let transport = TransportConfig::default();

	let server = Server::bind("127.0.0.1:0", ServerConfig::default(), &transport)
		.await
		.unwrap();
	let addr = server.local_addr().unwrap().to_string();

	let client = Client::new(ClientConfig::default(), &transport).unwrap();

	let (client, accepted) = tokio::join!(client.connect(&addr), server.accept());
	(server, client.unwrap(), accepted.unwrap())
}

async fn send(session: &Session, flow: u32, packets: &[&[u8]]) {
	let flow = session.new_send_flow(flow).unwrap();
	for packet in packets {
		let mut unit = flow.new_send_unit().await.unwrap();
		assert_eq!(unit.write_rtp(packet).await.unwrap(), packet.len());
		unit.close().unwrap();
	}
}

#[tokio::test]
async fn roles() {
	let (_server, client, server) = pair().await;
	assert_eq!(client.role(), Role::Initiator);
	assert_eq!(server.role(), Role::Responder);
}

#[tokio::test]
async fn relays_units_in_order() {
	let (_server, receiver, sender) = pair().await;

	let packets: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i; 1000]).collect();

	let flow = receiver.new_receive_flow(0).unwrap();
	let outbound = sender.new_send_flow(0).unwrap();

	for packet in &packets {
		let mut unit = outbound.new_send_unit().await.unwrap();
		unit.write_rtp(packet).await.unwrap();
		unit.close().unwrap();
	}

	let mut buf = vec![0u8; 64_000];
	for packet in &packets {
		let size = timeout(TIMEOUT, flow.read(&mut buf)).await.unwrap().unwrap();
		assert_eq!(size, Some(1000));
		assert_eq!(&buf[..1000], &packet[..]);
	}

	timeout(TIMEOUT, sender.finish()).await.unwrap();

	let end = timeout(TIMEOUT, flow.read(&mut buf)).await.unwrap().unwrap();
	assert_eq!(end, None);
	assert!(timeout(TIMEOUT, receiver.closed()).await.unwrap().is_ok());
}

#[tokio::test]
async fn flow_in_use() {
	let (_server, client, _accepted) = pair().await;

	let first = client.new_send_flow(0).unwrap();
	assert!(matches!(client.new_send_flow(0), Err(Error::FlowInUse(id)) if id == FlowId::new(0)));

	// The directions are independent.
	let _recv = client.new_receive_flow(0).unwrap();
	assert!(matches!(client.new_receive_flow(0), Err(Error::FlowInUse(_))));

	drop(first);
	client.new_send_flow(0).unwrap();
}

#[tokio::test]
async fn buffer_too_small_keeps_unit() {
	let (_server, receiver, sender) = pair().await;
	let flow = receiver.new_receive_flow(0).unwrap();

	send(&sender, 0, &[&[7u8; 100]]).await;

	let mut small = [0u8; 10];
	let err = timeout(TIMEOUT, flow.read(&mut small)).await.unwrap().unwrap_err();
	assert!(matches!(
		err,
		Error::BufferTooSmall {
			needed: 100,
			capacity: 10
		}
	));

	let mut buf = [0u8; 200];
	let size = timeout(TIMEOUT, flow.read(&mut buf)).await.unwrap().unwrap();
	assert_eq!(size, Some(100));
	assert!(buf[..100].iter().all(|b| *b == 7));
}

#[tokio::test]
async fn empty_unit() {
	let (_server, receiver, sender) = pair().await;
	let flow = receiver.new_receive_flow(3).unwrap();

	send(&sender, 3, &[b"", b"after"]).await;

	let mut buf = [0u8; 16];
	assert_eq!(timeout(TIMEOUT, flow.read(&mut buf)).await.unwrap().unwrap(), Some(0));
	assert_eq!(timeout(TIMEOUT, flow.read(&mut buf)).await.unwrap().unwrap(), Some(5));
	assert_eq!(&buf[..5], b"after");
}

#[tokio::test]
async fn units_before_registration() {
	let (_server, receiver, sender) = pair().await;

	send(&sender, 0, &[b"early"]).await;
	tokio::time::sleep(Duration::from_millis(100)).await;

	let flow = receiver.new_receive_flow(0).unwrap();
	let unit = timeout(TIMEOUT, flow.read_unit()).await.unwrap().unwrap();
	assert_eq!(unit.as_deref(), Some(&b"early"[..]));
}

#[tokio::test]
async fn flows_are_separate() {
	let (_server, receiver, sender) = pair().await;
	let one = receiver.new_receive_flow(1).unwrap();
	let two = receiver.new_receive_flow(2).unwrap();

	send(&sender, 2, &[b"two"]).await;
	send(&sender, 1, &[b"one"]).await;

	let unit = timeout(TIMEOUT, one.read_unit()).await.unwrap().unwrap();
	assert_eq!(unit.as_deref(), Some(&b"one"[..]));

	let unit = timeout(TIMEOUT, two.read_unit()).await.unwrap().unwrap();
	assert_eq!(unit.as_deref(), Some(&b"two"[..]));
}

#[tokio::test]
async fn dropped_unit_is_skipped() {
	let (_server, receiver, sender) = pair().await;
	let flow = receiver.new_receive_flow(0).unwrap();
	let outbound = sender.new_send_flow(0).unwrap();

	let mut abandoned = outbound.new_send_unit().await.unwrap();
	abandoned.write_rtp(b"never").await.unwrap();
	drop(abandoned);

	let mut unit = outbound.new_send_unit().await.unwrap();
	unit.write_rtp(b"kept").await.unwrap();
	unit.close().unwrap();

	let unit = timeout(TIMEOUT, flow.read_unit()).await.unwrap().unwrap();
	assert_eq!(unit.as_deref(), Some(&b"kept"[..]));
}

#[tokio::test]
async fn datagram() {
	let (_server, receiver, sender) = pair().await;
	let flow = receiver.new_receive_flow(0).unwrap();
	let outbound = sender.new_send_flow(0).unwrap();

	assert!(sender.max_datagram_size().is_some());
	outbound.send_datagram(b"rtp").unwrap();

	let unit = timeout(TIMEOUT, flow.read_unit()).await.unwrap().unwrap();
	assert_eq!(unit.as_deref(), Some(&b"rtp"[..]));

	let huge = vec![0u8; 64_000];
	assert!(matches!(outbound.send_datagram(&huge), Err(Error::TooLarge(64_000))));
}

#[tokio::test]
async fn abrupt_close_is_an_error() {
	let (_server, receiver, sender) = pair().await;
	let flow = receiver.new_receive_flow(0).unwrap();

	sender.close(Code::Internal, "boom");

	let res = timeout(TIMEOUT, flow.read_unit()).await.unwrap();
	assert!(matches!(res, Err(Error::SessionClosed(_))));
	assert!(receiver.closed().await.is_err());
}

#[tokio::test]
async fn no_units_after_shutdown() {
	let (_server, _receiver, sender) = pair().await;
	let flow = sender.new_send_flow(0).unwrap();

	sender.close(Code::Cancel, "");
	sender.close(Code::Cancel, "");

	assert!(matches!(flow.new_send_unit().await, Err(Error::SessionClosed(_))));
	assert!(matches!(flow.send_datagram(b"x"), Err(Error::SessionClosed(_))));
}

#[tokio::test]
async fn unknown_flows_are_bounded() {
	let (_server, receiver, sender) = pair().await;

	// Units arrive in the order their streams were opened, so the last one is read after the others were parked.
	let last = receiver.new_receive_flow(1000).unwrap();
	for id in 0..MAX_PARKED_FLOWS as u32 + 4 {
		send(&sender, id, &[b"parked"]).await;
	}
	send(&sender, 1000, &[b"last"]).await;

	let mut buf = [0u8; 16];
	assert_eq!(timeout(TIMEOUT, last.read(&mut buf)).await.unwrap().unwrap(), Some(4));

	let kept = receiver.new_receive_flow(0).unwrap();
	assert_eq!(timeout(TIMEOUT, kept.read(&mut buf)).await.unwrap().unwrap(), Some(6));
	assert_eq!(&buf[..6], b"parked");

	let dropped = receiver.new_receive_flow(MAX_PARKED_FLOWS as u32).unwrap();

	timeout(TIMEOUT, sender.finish()).await.unwrap();
	assert_eq!(timeout(TIMEOUT, dropped.read(&mut buf)).await.unwrap().unwrap(), None);
}

#[tokio::test]
async fn flow_in_use_after_close() {
	let (_server, client, accepted) = pair().await;

	timeout(TIMEOUT, accepted.finish()).await.unwrap();
	timeout(TIMEOUT, client.closed()).await.unwrap().unwrap();

	let first = client.new_receive_flow(0).unwrap();
	assert!(matches!(client.new_receive_flow(0), Err(Error::FlowInUse(_))));

	drop(first);
	let _again = client.new_receive_flow(0).unwrap();
}

#[tokio::test]
async fn stats_count_rtp() {
	use std::sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	};

	#[derive(Default)]
	struct Counts {
		rx_bytes: AtomicU64,
		tx_bytes: AtomicU64,
		rx_packets: AtomicU64,
		tx_packets: AtomicU64,
	}

	impl roq_lite::Stats for Counts {
		fn add_rx_bytes(&self, bytes: u64) {
			self.rx_bytes.fetch_add(bytes, Ordering::SeqCst);
		}

		fn add_tx_bytes(&self, bytes: u64) {
			self.tx_bytes.fetch_add(bytes, Ordering::SeqCst);
		}

		fn add_rx_packets(&self, packets: u64) {
			self.rx_packets.fetch_add(packets, Ordering::SeqCst);
		}

		fn add_tx_packets(&self, packets: u64) {
			self.tx_packets.fetch_add(packets, Ordering::SeqCst);
		}
	}

	let transport = TransportConfig::default();
	let counts = Arc::new(Counts::default());

	let server = Server::bind("127.0.0.1:0", ServerConfig::default(), &transport)
		.await
		.unwrap()
		.with_stats(counts.clone());
	let addr = server.local_addr().unwrap().to_string();
	let client = Client::new(ClientConfig::default(), &transport)
		.unwrap()
		.with_stats(counts.clone());

	let (receiver, sender) = tokio::join!(client.connect(&addr), server.accept());
	let (receiver, sender) = (receiver.unwrap(), sender.unwrap());

	let flow = receiver.new_receive_flow(0).unwrap();
	send(&sender, 0, &[b"abc", b"defgh"]).await;

	let mut buf = [0u8; 16];
	for _ in 0..2 {
		timeout(TIMEOUT, flow.read(&mut buf)).await.unwrap().unwrap().unwrap();
	}

	// Both ends share the sink; framing isn't counted.
	assert_eq!(counts.tx_bytes.load(Ordering::SeqCst), 8);
	assert_eq!(counts.tx_packets.load(Ordering::SeqCst), 2);
	assert_eq!(counts.rx_bytes.load(Ordering::SeqCst), 8);
	assert_eq!(counts.rx_packets.load(Ordering::SeqCst), 2);
}
