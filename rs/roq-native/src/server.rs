use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Args;
use roq_lite::{ALPN, NoopStats, Role, Session, Stats};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};

use crate::{
	Error, TransportConfig, crypto,
	transport::{check_alpn, resolve},
};

/// Server-side TLS options.
///
/// Without a certificate file, an ephemeral self-signed certificate is generated on every start.
#[derive(Args, Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
#[non_exhaustive]
pub struct ServerConfig {
	/// Load the certificate chain from this PEM file.
	#[arg(id = "tls-cert", long = "tls-cert", env = "ROQ_SERVER_TLS_CERT", requires = "tls-key")]
	pub tls_cert: Option<PathBuf>,

	/// Load the private key from this PEM file.
	#[arg(id = "tls-key", long = "tls-key", env = "ROQ_SERVER_TLS_KEY", requires = "tls-cert")]
	pub tls_key: Option<PathBuf>,

	/// The names to put in the generated certificate.
	#[arg(
		id = "tls-generate",
		long = "tls-generate",
		env = "ROQ_SERVER_TLS_GENERATE",
		value_delimiter = ',',
		default_value = "localhost"
	)]
	pub tls_generate: Vec<String>,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			tls_cert: None,
			tls_key: None,
			tls_generate: vec!["localhost".to_string()],
		}
	}
}

impl ServerConfig {
	fn credential(&self) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
		match (&self.tls_cert, &self.tls_key) {
			(Some(cert), Some(key)) => Ok((crypto::load_certs(cert)?, crypto::load_key(key)?)),
			(Some(path), None) | (None, Some(path)) => Err(Error::CredentialFile {
				path: path.clone(),
				reason: "both --tls-cert and --tls-key are required".to_string(),
			}),
			(None, None) => {
				tracing::debug!(names = ?self.tls_generate, "generating self-signed certificate");
				crypto::generate(&self.tls_generate)
			}
		}
	}
}

/// Accepts RoQ sessions on a bound UDP socket.
pub struct Server {
	endpoint: quinn::Endpoint,
	stats: Arc<dyn Stats>,
}

impl Server {
	/// Resolve `host:port` and start listening.
	pub async fn bind(addr: &str, config: ServerConfig, transport: &TransportConfig) -> Result<Self, Error> {
		let local = resolve(addr).await?;

		let (chain, key) = config.credential()?;

		let mut tls = rustls::ServerConfig::builder_with_provider(crypto::provider())
			.with_protocol_versions(&[&rustls::version::TLS13])?
			.with_no_client_auth()
			.with_single_cert(chain, key)?;
		tls.alpn_protocols = vec![ALPN.as_bytes().to_vec()];

		let tls = quinn::crypto::rustls::QuicServerConfig::try_from(tls)?;
		let mut server = quinn::ServerConfig::with_crypto(Arc::new(tls));
		server.transport_config(Arc::new(transport.build()?));

		let endpoint = quinn::Endpoint::server(server, local).map_err(|source| Error::Bind { addr: local, source })?;

		tracing::info!(addr = %endpoint.local_addr()?, "listening");

		Ok(Self {
			endpoint,
			stats: Arc::new(NoopStats),
		})
	}

	/// Report the RTP payload bytes of every session to the given sink.
	pub fn with_stats(mut self, stats: Arc<dyn Stats>) -> Self {
		self.stats = stats;
		self
	}

	/// Block until a client completes the handshake.
	///
	/// Connections that fail the handshake or negotiate another protocol are returned as errors;
	/// the caller decides whether to keep accepting.
	pub async fn accept(&self) -> Result<Session, Error> {
		let incoming = self.endpoint.accept().await.ok_or(Error::Closed)?;
		let remote = incoming.remote_address();

		let conn = incoming.accept()?.await?;
		check_alpn(&conn)?;

		tracing::info!(%remote, "accepted");

		Ok(Session::new_with_stats(conn, Role::Responder, self.stats.clone()))
	}

	pub fn local_addr(&self) -> Result<SocketAddr, Error> {
		Ok(self.endpoint.local_addr()?)
	}

	/// Stop accepting connections and close any that remain.
	pub fn close(&self) {
		self.endpoint.close(roq_lite::Code::NoError.into(), b"");
	}

	/// Wait until every connection finished closing, so the peers receive the close frame.
	pub async fn wait_idle(&self) {
		self.endpoint.wait_idle().await;
	}
}
