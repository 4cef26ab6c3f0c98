use std::{fs, io, path::Path, sync::Arc};

use rustls::{
	DigitallySignedStruct, SignatureScheme,
	client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
	crypto::CryptoProvider,
	pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime},
};

use crate::Error;

/// The process-wide provider if one was installed, otherwise the one selected by feature flags.
pub(crate) fn provider() -> Arc<CryptoProvider> {
	if let Some(provider) = CryptoProvider::get_default() {
		return provider.clone();
	}

	#[cfg(feature = "aws-lc-rs")]
	return Arc::new(rustls::crypto::aws_lc_rs::default_provider());

	#[cfg(all(feature = "ring", not(feature = "aws-lc-rs")))]
	return Arc::new(rustls::crypto::ring::default_provider());

	#[cfg(not(any(feature = "aws-lc-rs", feature = "ring")))]
	panic!("no crypto provider; enable the aws-lc-rs or ring feature");
}

/// Generate an ephemeral self-signed certificate for the given names.
pub(crate) fn generate(names: &[String]) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
	let key = rcgen::KeyPair::generate()?;
	let cert = rcgen::CertificateParams::new(names.to_vec())?.self_signed(&key)?;

	let chain = vec![cert.der().clone()];
	let key = PrivatePkcs8KeyDer::from(key.serialize_der()).into();

	Ok((chain, key))
}

pub(crate) fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
	let mut reader = io::BufReader::new(fs::File::open(path)?);
	let chain = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;

	if chain.is_empty() {
		return Err(Error::CredentialFile {
			path: path.to_owned(),
			reason: "no certificates".to_string(),
		});
	}

	Ok(chain)
}

pub(crate) fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
	let mut reader = io::BufReader::new(fs::File::open(path)?);
	rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| Error::CredentialFile {
		path: path.to_owned(),
		reason: "no private key".to_string(),
	})
}

/// Accepts any server certificate, while still checking that the handshake was signed by it.
#[derive(Debug)]
pub(crate) struct NoCertificateVerification(Arc<CryptoProvider>);

impl NoCertificateVerification {
	pub fn new(provider: Arc<CryptoProvider>) -> Self {
		Self(provider)
	}
}

impl ServerCertVerifier for NoCertificateVerification {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_server_name: &ServerName<'_>,
		_ocsp: &[u8],
		_now: UnixTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		rustls::crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		rustls::crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.0.signature_verification_algorithms.supported_schemes()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generate() {
		let (chain, key) = generate(&["localhost".to_string()]).unwrap();
		assert_eq!(chain.len(), 1);
		assert!(matches!(key, PrivateKeyDer::Pkcs8(_)));
	}

	#[test]
	fn test_missing_file() {
		let err = load_certs(Path::new("/nonexistent/cert.pem")).unwrap_err();
		assert!(matches!(err, Error::Io(_)));
	}
}
