use std::fmt;

use crate::coding::{BoundsExceeded, Decode, DecodeError, Encode, VarInt};

/// Identifies a media flow within a session.
///
/// Both endpoints must use the same identifier for a flow to be considered the same media channel.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId(VarInt);

impl FlowId {
	pub const fn new(id: u32) -> Self {
		Self(VarInt::from_u32(id))
	}

	pub const fn into_inner(self) -> u64 {
		self.0.into_inner()
	}
}

impl From<u32> for FlowId {
	fn from(id: u32) -> Self {
		Self::new(id)
	}
}

impl TryFrom<u64> for FlowId {
	type Error = BoundsExceeded;

	fn try_from(id: u64) -> Result<Self, Self::Error> {
		VarInt::try_from(id).map(Self)
	}
}

impl fmt::Debug for FlowId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for FlowId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for FlowId {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(Self)
	}
}

impl Encode for FlowId {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		self.0.encode(w)
	}
}
