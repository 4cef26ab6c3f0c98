mod id;
mod recv;
mod send;

pub use id::*;
pub use recv::*;
pub use send::*;

use bytes::{Buf, Bytes};

use crate::coding::{Decode, DecodeError};

/// The contents of one inbound unidirectional stream.
///
/// A stream starts with the flow identifier, followed by any number of length-prefixed RTP packets.
#[derive(Debug)]
pub(crate) struct StreamUnit {
	pub flow: FlowId,
	pub packets: Vec<Bytes>,
}

impl StreamUnit {
	pub fn decode(mut buf: Bytes) -> Result<Self, DecodeError> {
		let flow = FlowId::decode(&mut buf)?;

		let mut packets = Vec::new();
		while buf.has_remaining() {
			packets.push(Bytes::decode(&mut buf)?);
		}

		Ok(Self { flow, packets })
	}
}

/// A single RTP packet carried in a QUIC datagram, prefixed by the flow identifier.
#[derive(Debug)]
pub(crate) struct DatagramUnit {
	pub flow: FlowId,
	pub packet: Bytes,
}

impl DatagramUnit {
	pub fn decode(mut buf: Bytes) -> Result<Self, DecodeError> {
		let flow = FlowId::decode(&mut buf)?;
		Ok(Self { flow, packet: buf })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::coding::Encode;
	use bytes::BytesMut;

	#[test]
	fn test_stream_unit_multiple_packets() {
		let mut buf = BytesMut::new();
		FlowId::new(7).encode(&mut buf);
		Bytes::from_static(b"first").encode(&mut buf);
		Bytes::new().encode(&mut buf);
		Bytes::from_static(b"third").encode(&mut buf);

		let unit = StreamUnit::decode(buf.freeze()).unwrap();
		assert_eq!(unit.flow, FlowId::new(7));
		assert_eq!(unit.packets.len(), 3);
		assert_eq!(unit.packets[0], "first");
		assert!(unit.packets[1].is_empty());
		assert_eq!(unit.packets[2], "third");
	}

	#[test]
	fn test_stream_unit_without_packets() {
		let unit = StreamUnit::decode(Bytes::from_static(&[0x00])).unwrap();
		assert_eq!(unit.flow, FlowId::new(0));
		assert!(unit.packets.is_empty());
	}

	#[test]
	fn test_stream_unit_truncated_packet() {
		// flow 0, length 10, only 3 bytes of payload
		let buf = Bytes::from_static(&[0x00, 0x0a, 1, 2, 3]);
		assert_eq!(StreamUnit::decode(buf).unwrap_err(), DecodeError::Short);
	}

	#[test]
	fn test_stream_unit_empty() {
		assert_eq!(StreamUnit::decode(Bytes::new()).unwrap_err(), DecodeError::Short);
	}

	#[test]
	fn test_datagram_unit() {
		// Two-byte varint flow id (300) followed by the raw packet.
		let buf = Bytes::from_static(&[0x41, 0x2c, 0x80, 0x60, 0x00, 0x01]);
		let unit = DatagramUnit::decode(buf).unwrap();
		assert_eq!(unit.flow, FlowId::new(300));
		assert_eq!(unit.packet, &[0x80, 0x60, 0x00, 0x01][..]);
	}
}
