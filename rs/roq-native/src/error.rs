use std::{io, path::PathBuf};

/// Errors while establishing a session.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("failed to resolve {addr}: {source}")]
	Resolve { addr: String, source: io::Error },

	#[error("no address found for {0}")]
	NoAddress(String),

	#[error("failed to bind {addr}: {source}")]
	Bind { addr: std::net::SocketAddr, source: io::Error },

	#[error("connect error: {0}")]
	Connect(#[from] quinn::ConnectError),

	#[error("handshake failed: {0}")]
	Handshake(#[from] quinn::ConnectionError),

	/// The peer did not negotiate the RoQ ALPN.
	#[error("unsupported protocol: {0:?}")]
	Protocol(Option<String>),

	#[error("failed to generate credential: {0}")]
	Credential(#[from] rcgen::Error),

	#[error("invalid credential file {path}: {reason}")]
	CredentialFile { path: PathBuf, reason: String },

	#[error("tls error: {0}")]
	Tls(#[from] rustls::Error),

	#[error("no initial cipher suite: {0}")]
	CipherSuite(#[from] quinn::crypto::rustls::NoInitialCipherSuite),

	#[error("invalid idle timeout")]
	IdleTimeout(#[from] quinn::VarIntBoundsExceeded),

	#[error("io error: {0}")]
	Io(#[from] io::Error),

	/// The endpoint stopped accepting connections.
	#[error("endpoint closed")]
	Closed,
}
