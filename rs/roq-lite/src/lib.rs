//! # roq-lite: RTP over QUIC
//!
//! `roq-lite` carries RTP packets over a single QUIC connection, following the RoQ mapping (ALPN `roq-10`).
//! Only the parts needed to relay a live stream are implemented; there is no RTCP and no congestion feedback.
//!
//! ## API
//!
//! A [Session] wraps an established [quinn::Connection].
//! Media is exchanged over numbered flows, one identifier per direction:
//! - [Session::new_send_flow] returns a [SendFlow].
//! - [SendFlow::new_send_unit] opens a [SendUnit], a unidirectional stream carrying one RTP packet.
//! - [SendUnit::write_rtp] writes the packet and [SendUnit::close] finishes the stream.
//! - [Session::new_receive_flow] returns a [ReceiveFlow].
//! - [ReceiveFlow::read] yields one packet per unit, in the order the units were opened.
//!
//! A flow may also use datagrams via [SendFlow::send_datagram], which are delivered unreliably.
//!
//! ## Wire Format
//!
//! Every unidirectional stream starts with the flow identifier as a QUIC varint,
//! followed by RTP packets each prefixed with their length as a varint.
//! Datagrams carry the flow identifier followed by a single RTP packet.

mod error;
mod flow;
mod session;
mod stats;

pub mod coding;

pub use error::*;
pub use flow::*;
pub use session::*;
pub use stats::*;
