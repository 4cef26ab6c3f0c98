//! Encoding and decoding of the RoQ wire format.
//!
//! Everything on the wire is either a QUIC variable-length integer or a length-prefixed byte string.
mod decode;
mod encode;
mod varint;

pub use decode::*;
pub use encode::*;
pub use varint::*;
