use std::sync::Arc;

use crate::{FlowId, coding};

/// An application error code, sent with the QUIC CONNECTION_CLOSE or RESET_STREAM frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive)]
#[repr(u32)]
pub enum Code {
	/// The session finished normally.
	NoError = 0,
	/// The local endpoint gave up on the session or stream.
	Cancel = 1,
	/// The peer violated the wire format or flow rules.
	Protocol = 2,
	/// Something went wrong locally.
	Internal = 3,
}

impl From<Code> for quinn::VarInt {
	fn from(code: Code) -> Self {
		quinn::VarInt::from_u32(code.into())
	}
}

/// A list of possible errors that can occur during the session.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	/// The connection is gone, or the local endpoint is shutting it down.
	#[error("session closed: {0}")]
	SessionClosed(Arc<quinn::ConnectionError>),

	/// The flow identifier is already registered for this direction.
	#[error("flow {0} already in use")]
	FlowInUse(FlowId),

	/// The next unit does not fit into the caller's buffer; it stays queued.
	#[error("buffer too small: unit is {needed} bytes, buffer holds {capacity}")]
	BufferTooSmall { needed: usize, capacity: usize },

	#[error("too large: {0} bytes")]
	TooLarge(usize),

	#[error("write error: {0}")]
	Write(Arc<quinn::WriteError>),

	#[error("stream closed")]
	ClosedStream,

	#[error("datagram error: {0}")]
	Datagram(Arc<quinn::SendDatagramError>),

	#[error("decode error: {0}")]
	Decode(#[from] coding::DecodeError),
}

impl Error {
	/// Returned when the local endpoint already started shutting the session down.
	pub(crate) fn shutting_down() -> Self {
		Self::SessionClosed(Arc::new(quinn::ConnectionError::LocallyClosed))
	}
}

impl From<quinn::ConnectionError> for Error {
	fn from(err: quinn::ConnectionError) -> Self {
		Self::SessionClosed(Arc::new(err))
	}
}

impl From<quinn::WriteError> for Error {
	fn from(err: quinn::WriteError) -> Self {
		match err {
			quinn::WriteError::ConnectionLost(err) => err.into(),
			quinn::WriteError::ClosedStream => Self::ClosedStream,
			err => Self::Write(Arc::new(err)),
		}
	}
}

impl From<quinn::ClosedStream> for Error {
	fn from(_: quinn::ClosedStream) -> Self {
		Self::ClosedStream
	}
}

impl From<quinn::SendDatagramError> for Error {
	fn from(err: quinn::SendDatagramError) -> Self {
		match err {
			quinn::SendDatagramError::ConnectionLost(err) => err.into(),
			err => Self::Datagram(Arc::new(err)),
		}
	}
}

impl From<coding::BoundsExceeded> for Error {
	fn from(_: coding::BoundsExceeded) -> Self {
		Self::Decode(coding::DecodeError::BoundsExceeded)
	}
}

/// Whether the connection ended without an application error.
pub(crate) fn is_graceful(err: &quinn::ConnectionError) -> bool {
	match err {
		quinn::ConnectionError::LocallyClosed => true,
		quinn::ConnectionError::ApplicationClosed(close) => close.error_code == Code::NoError.into(),
		_ => false,
	}
}
