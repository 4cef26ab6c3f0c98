//! The RTP profile relayed by this crate, and just enough RTP to generate and check packets.

use bytes::{BufMut, Bytes, BytesMut};

/// RTP clock rate for video.
pub const CLOCK_RATE: u32 = 90_000;

/// The dynamic payload type used for VP8.
pub const PAYLOAD_TYPE: u8 = 96;

pub const ENCODING_NAME: &str = "VP8";

/// Caps describing the RTP stream handed to the receiving pipeline.
pub const CAPS: &str =
	"application/x-rtp,media=(string)video,clock-rate=(int)90000,encoding-name=(string)VP8,payload=(int)96";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtpError {
	#[error("packet too short")]
	Short,

	#[error("unsupported version: {0}")]
	Version(u8),

	#[error("invalid padding")]
	Padding,
}

/// The fixed RTP header (RFC 3550, section 5.1), without CSRCs or extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
	pub marker: bool,
	pub payload_type: u8,
	pub sequence: u16,
	pub timestamp: u32,
	pub ssrc: u32,
}

impl Header {
	pub const SIZE: usize = 12;

	/// Parse the header, returning it along with the payload.
	pub fn parse(packet: &[u8]) -> Result<(Self, &[u8]), RtpError> {
		if packet.len() < Self::SIZE {
			return Err(RtpError::Short);
		}

		let version = packet[0] >> 6;
		if version != 2 {
			return Err(RtpError::Version(version));
		}

		let padding = packet[0] & 0x20 != 0;
		let extension = packet[0] & 0x10 != 0;
		let csrcs = (packet[0] & 0x0f) as usize;

		let header = Self {
			marker: packet[1] & 0x80 != 0,
			payload_type: packet[1] & 0x7f,
			sequence: u16::from_be_bytes([packet[2], packet[3]]),
			timestamp: u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]),
			ssrc: u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]),
		};

		let mut offset = Self::SIZE + csrcs * 4;
		if extension {
			let ext = packet.get(offset + 2..offset + 4).ok_or(RtpError::Short)?;
			offset += 4 + u16::from_be_bytes([ext[0], ext[1]]) as usize * 4;
		}

		let mut end = packet.len();
		if padding {
			let pad = *packet.last().ok_or(RtpError::Short)? as usize;
			if pad == 0 || pad > end {
				return Err(RtpError::Padding);
			}
			end -= pad;
		}

		let payload = packet.get(offset..end).ok_or(RtpError::Short)?;
		Ok((header, payload))
	}

	pub fn encode<B: BufMut>(&self, buf: &mut B) {
		buf.put_u8(0x80);
		buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7f));
		buf.put_u16(self.sequence);
		buf.put_u32(self.timestamp);
		buf.put_u32(self.ssrc);
	}

	/// Build a packet with this header and the given payload.
	pub fn packet(&self, payload: &[u8]) -> Bytes {
		let mut buf = BytesMut::with_capacity(Self::SIZE + payload.len());
		self.encode(&mut buf);
		buf.extend_from_slice(payload);
		buf.freeze()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn header() -> Header {
		Header {
			marker: true,
			payload_type: PAYLOAD_TYPE,
			sequence: 65_535,
			timestamp: 3_000,
			ssrc: 0xdead_beef,
		}
	}

	#[test]
	fn test_packet() {
		let packet = header().packet(b"vp8");
		assert_eq!(packet.len(), Header::SIZE + 3);
		assert_eq!(packet[0], 0x80);
		assert_eq!(packet[1], 0x80 | 96);

		let (parsed, payload) = Header::parse(&packet).unwrap();
		assert_eq!(parsed, header());
		assert_eq!(payload, b"vp8");
	}

	#[test]
	fn test_csrc_and_extension() {
		let mut packet = header().packet(&[]).to_vec();
		// One CSRC and a one-word extension.
		packet[0] |= 0x10 | 0x01;
		packet.extend_from_slice(&[0, 0, 0, 1]);
		packet.extend_from_slice(&[0xbe, 0xde, 0x00, 0x01, 1, 2, 3, 4]);
		packet.extend_from_slice(b"data");

		let (_, payload) = Header::parse(&packet).unwrap();
		assert_eq!(payload, b"data");
	}

	#[test]
	fn test_padding() {
		let mut packet = header().packet(b"data\0\0\x03").to_vec();
		packet[0] |= 0x20;

		let (_, payload) = Header::parse(&packet).unwrap();
		assert_eq!(payload, b"data");
	}

	#[test]
	fn test_invalid() {
		assert_eq!(Header::parse(&[0x80; 4]), Err(RtpError::Short));
		assert_eq!(Header::parse(&[0x40; 12]), Err(RtpError::Version(1)));

		let mut packet = header().packet(&[]).to_vec();
		packet[0] |= 0x01;
		assert_eq!(Header::parse(&packet), Err(RtpError::Short));
	}
}
