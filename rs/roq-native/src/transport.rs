use std::{net::SocketAddr, time::Duration};

use clap::Args;
use serde::{Deserialize, Serialize};

use roq_lite::{ALPN, Code};

use crate::Error;

/// QUIC transport parameters shared by the client and server.
///
/// Every RTP packet is sent on its own stream, so the stream limit caps how many packets can be in flight.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TransportConfig {
	/// The number of concurrent unidirectional streams the peer may open.
	#[arg(id = "quic-max-streams", long = "quic-max-streams", env = "ROQ_QUIC_MAX_STREAMS", default_value_t = 1000)]
	pub max_streams: u32,

	/// How often to send keep-alive packets while the connection is quiet.
	#[arg(
		id = "quic-keep-alive",
		long = "quic-keep-alive",
		env = "ROQ_QUIC_KEEP_ALIVE",
		default_value = "5s",
		value_parser = humantime::parse_duration,
	)]
	#[serde(with = "humantime_serde")]
	pub keep_alive: Duration,

	/// Close the connection after this long without hearing from the peer.
	#[arg(
		id = "quic-idle-timeout",
		long = "quic-idle-timeout",
		env = "ROQ_QUIC_IDLE_TIMEOUT",
		default_value = "30s",
		value_parser = humantime::parse_duration,
	)]
	#[serde(with = "humantime_serde")]
	pub idle_timeout: Duration,
}

impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			max_streams: 1000,
			keep_alive: Duration::from_secs(5),
			idle_timeout: Duration::from_secs(30),
		}
	}
}

impl TransportConfig {
	pub(crate) fn build(&self) -> Result<quinn::TransportConfig, Error> {
		let mut config = quinn::TransportConfig::default();
		config.max_concurrent_uni_streams(self.max_streams.into());
		config.max_concurrent_bidi_streams(0u32.into());
		config.keep_alive_interval((!self.keep_alive.is_zero()).then_some(self.keep_alive));

		// A zero timeout disables it.
		let idle = match self.idle_timeout.is_zero() {
			true => None,
			false => Some(self.idle_timeout.try_into()?),
		};
		config.max_idle_timeout(idle);

		Ok(config)
	}
}

/// Resolve `host:port`, returning the first address.
pub(crate) async fn resolve(addr: &str) -> Result<SocketAddr, Error> {
	let mut addrs = tokio::net::lookup_host(addr).await.map_err(|source| Error::Resolve {
		addr: addr.to_string(),
		source,
	})?;

	addrs.next().ok_or_else(|| Error::NoAddress(addr.to_string()))
}

/// Close the connection unless the RoQ ALPN was negotiated.
pub(crate) fn check_alpn(conn: &quinn::Connection) -> Result<(), Error> {
	let protocol = conn
		.handshake_data()
		.and_then(|data| data.downcast::<quinn::crypto::rustls::HandshakeData>().ok())
		.and_then(|data| data.protocol);

	match protocol {
		Some(protocol) if protocol == ALPN.as_bytes() => Ok(()),
		protocol => {
			let protocol = protocol.map(|p| String::from_utf8_lossy(&p).into_owned());
			conn.close(Code::Protocol.into(), b"unsupported protocol");
			Err(Error::Protocol(protocol))
		}
	}
}
