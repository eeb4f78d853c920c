//! Single-stream RTSP media server.
//!
//! Accepts RTSP control connections (OPTIONS / DESCRIBE / SETUP / PLAY /
//! PAUSE / TEARDOWN), negotiates a UDP transport per session, and pushes
//! one live or file-backed elementary stream (H.264, Opus or PCMU) to the
//! client as RTP packets with periodic RTCP Sender Reports.
//!
//! Producers (capture/encode, outside this crate) push [`Frame`]s into the
//! server's [`FrameBuffer`]; each playing session's stream controller
//! drains the buffer, packetizes (FU-A fragmentation for oversized H.264
//! NAL units), and sends over the session's negotiated UDP ports.

pub mod buffer;
pub mod error;
pub mod media;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stream;
pub mod transport;

pub use buffer::{Frame, FrameBuffer};
pub use error::{Result, RtspError};
pub use media::MediaKind;
pub use server::{Server, ServerConfig};
pub use stream::{StreamCommand, StreamState};
