use std::fmt;

use crate::coding::{Decode, DecodeError, Encode};

/// The value was too large to fit in a [VarInt].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("value exceeds varint bounds")]
pub struct BoundsExceeded;

/// A QUIC variable-length integer, limited to 62 bits.
///
/// The two most significant bits of the first byte encode the length: 1, 2, 4 or 8 bytes.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
	/// The largest representable value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The smallest representable value.
	pub const ZERO: Self = Self(0);

	pub const fn from_u32(x: u32) -> Self {
		Self(x as u64)
	}

	pub const fn from_u64(x: u64) -> Option<Self> {
		if x <= Self::MAX.0 { Some(Self(x)) } else { None }
	}

	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes needed to encode this value.
	pub const fn size(self) -> usize {
		match self.0 {
			0..0x40 => 1,
			0x40..0x4000 => 2,
			0x4000..0x4000_0000 => 4,
			_ => 8,
		}
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self::from_u32(x)
	}
}

impl From<u16> for VarInt {
	fn from(x: u16) -> Self {
		Self(x as u64)
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x as u64)
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: u64) -> Result<Self, Self::Error> {
		Self::from_u64(x).ok_or(BoundsExceeded)
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: usize) -> Result<Self, Self::Error> {
		Self::try_from(x as u64)
	}
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Short);
		}

		let size = 1 << (r.chunk()[0] >> 6);
		if r.remaining() < size {
			return Err(DecodeError::Short);
		}

		let x = match size {
			1 => (r.get_u8() & 0x3f) as u64,
			2 => (r.get_u16() & 0x3fff) as u64,
			4 => (r.get_u32() & 0x3fff_ffff) as u64,
			_ => r.get_u64() & 0x3fff_ffff_ffff_ffff,
		};

		Ok(Self(x))
	}
}

impl Encode for VarInt {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		match self.size() {
			1 => w.put_u8(self.0 as u8),
			2 => w.put_u16(0x4000 | self.0 as u16),
			4 => w.put_u32(0x8000_0000 | self.0 as u32),
			_ => w.put_u64(0xc000_0000_0000_0000 | self.0),
		}
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(u64::from)
	}
}

impl Encode for u64 {
	/// Encode a varint, panicking if the value is larger than 2^62.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		VarInt::try_from(*self).expect("varint too large").encode(w)
	}
}

impl Decode for usize {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let v = u64::decode(r)?;
		usize::try_from(v).map_err(|_| DecodeError::BoundsExceeded)
	}
}

impl Encode for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		(*self as u64).encode(w)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use bytes::{Bytes, BytesMut};

	#[test]
	fn test_sizes() {
		assert_eq!(VarInt::from_u32(0).size(), 1);
		assert_eq!(VarInt::from_u32(63).size(), 1);
		assert_eq!(VarInt::from_u32(64).size(), 2);
		assert_eq!(VarInt::from_u32(16_383).size(), 2);
		assert_eq!(VarInt::from_u32(16_384).size(), 4);
		assert_eq!(VarInt::from_u32(1_073_741_823).size(), 4);
		assert_eq!(VarInt::from_u32(1_073_741_824).size(), 8);
		assert_eq!(VarInt::MAX.size(), 8);
	}

	#[test]
	fn test_rfc9000_examples() {
		// Sample encodings from RFC 9000, appendix A.1
		let cases: [(&[u8], u64); 4] = [
			(&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c], 151_288_809_941_952_652),
			(&[0x9d, 0x7f, 0x3e, 0x7d], 494_878_333),
			(&[0x7b, 0xbd], 15_293),
			(&[0x25], 37),
		];

		for (wire, value) in cases {
			let mut buf = Bytes::copy_from_slice(wire);
			assert_eq!(u64::decode(&mut buf).unwrap(), value);
			assert!(buf.is_empty());

			let mut out = BytesMut::new();
			value.encode(&mut out);
			assert_eq!(&out[..], wire);
		}
	}

	#[test]
	fn test_non_minimal_encoding() {
		// 37 encoded in two bytes is still valid.
		let mut buf = Bytes::from_static(&[0x40, 0x25]);
		assert_eq!(u64::decode(&mut buf).unwrap(), 37);
	}

	#[test]
	fn test_short() {
		let mut buf = Bytes::from_static(&[0x9d, 0x7f]);
		assert!(matches!(VarInt::decode(&mut buf), Err(DecodeError::Short)));

		let mut empty = Bytes::new();
		assert!(matches!(VarInt::decode(&mut empty), Err(DecodeError::Short)));
	}

	#[test]
	fn test_bounds() {
		assert!(VarInt::from_u64(1 << 62).is_none());
		assert_eq!(VarInt::try_from(u64::MAX), Err(BoundsExceeded));
		assert_eq!(VarInt::from_u64((1 << 62) - 1), Some(VarInt::MAX));
	}
}
