use std::{
	net::{Ipv4Addr, Ipv6Addr, SocketAddr},
	path::PathBuf,
	sync::Arc,
};

use clap::Args;
use roq_lite::{ALPN, NoopStats, Role, Session, Stats};
use serde::{Deserialize, Serialize};

use crate::{
	Error, TransportConfig, crypto,
	transport::{check_alpn, resolve},
};

/// Client-side TLS and socket options.
#[derive(Args, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
#[non_exhaustive]
pub struct ClientConfig {
	/// Listen for UDP packets on the given address; defaults to an ephemeral port.
	#[arg(id = "client-bind", long = "client-bind", env = "ROQ_CLIENT_BIND")]
	pub bind: Option<SocketAddr>,

	/// Verify the server against these PEM root certificates.
	///
	/// When none are given the server certificate is NOT verified.
	#[arg(id = "tls-root", long = "tls-root", env = "ROQ_CLIENT_TLS_ROOT", value_delimiter = ',')]
	pub tls_root: Vec<PathBuf>,
}

impl ClientConfig {
	pub fn init(self, transport: &TransportConfig) -> Result<Client, Error> {
		Client::new(self, transport)
	}
}

/// Dials RoQ servers.
#[derive(Clone)]
pub struct Client {
	config: quinn::ClientConfig,
	bind: Option<SocketAddr>,
	stats: Arc<dyn Stats>,
}

impl Client {
	pub fn new(config: ClientConfig, transport: &TransportConfig) -> Result<Self, Error> {
		let provider = crypto::provider();

		let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
			.with_protocol_versions(&[&rustls::version::TLS13])?;

		let mut tls = match config.tls_root.is_empty() {
			true => {
				tracing::warn!("TLS server certificate verification is disabled");
				builder
					.dangerous()
					.with_custom_certificate_verifier(Arc::new(crypto::NoCertificateVerification::new(provider)))
					.with_no_client_auth()
			}
			false => {
				let mut roots = rustls::RootCertStore::empty();
				for path in &config.tls_root {
					for cert in crypto::load_certs(path)? {
						roots.add(cert)?;
					}
				}
				builder.with_root_certificates(roots).with_no_client_auth()
			}
		};

		tls.alpn_protocols = vec![ALPN.as_bytes().to_vec()];

		let tls = quinn::crypto::rustls::QuicClientConfig::try_from(tls)?;
		let mut client = quinn::ClientConfig::new(Arc::new(tls));
		client.transport_config(Arc::new(transport.build()?));

		Ok(Self {
			config: client,
			bind: config.bind,
			stats: Arc::new(NoopStats),
		})
	}

	/// Report the RTP payload bytes of every session to the given sink.
	pub fn with_stats(mut self, stats: Arc<dyn Stats>) -> Self {
		self.stats = stats;
		self
	}

	/// Dial `host:port` and wait for the handshake to complete.
	///
	/// The host is also used as the TLS server name.
	#[tracing::instrument("connect", skip_all, fields(%addr))]
	pub async fn connect(&self, addr: &str) -> Result<Session, Error> {
		let remote = resolve(addr).await?;

		let bind = match self.bind {
			Some(bind) => bind,
			None if remote.is_ipv6() => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
			None => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
		};

		let endpoint = quinn::Endpoint::client(bind).map_err(|source| Error::Bind { addr: bind, source })?;

		let host = server_name(addr);
		tracing::debug!(%remote, %host, "dialing");

		let conn = endpoint.connect_with(self.config.clone(), remote, host)?.await?;
		check_alpn(&conn)?;

		tracing::info!(%remote, "connected");

		Ok(Session::new_with_stats(conn, Role::Initiator, self.stats.clone()))
	}
}

/// The host portion of `host:port`, without IPv6 brackets.
fn server_name(addr: &str) -> &str {
	let host = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr);
	host.trim_start_matches('[').trim_end_matches(']')
}
