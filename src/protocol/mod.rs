//! RTSP protocol implementation (RFC 2326).
//!
//! Text-based signaling: request parsing, response building, SDP
//! generation for DESCRIBE, and per-session method dispatch.
//!
//! ## Message format (RFC 2326 §4)
//!
//! ```text
//! SETUP rtsp://server/stream RTSP/1.0\r\n
//! CSeq: 3\r\n
//! Transport: RTP/AVP;unicast;client_port=5004-5005\r\n
//! \r\n
//! ```
//!
//! The supported method set is OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE,
//! and TEARDOWN; anything else is logged and deliberately left without
//! a response (lenient-server behavior).

pub mod handler;
pub mod request;
pub mod response;
pub mod sdp;

pub use handler::RequestHandler;
pub use request::RtspRequest;
pub use response::RtspResponse;
