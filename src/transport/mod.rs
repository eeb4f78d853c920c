//! Network transports: TCP for RTSP signaling, UDP for RTP/RTCP media.
//!
//! - **TCP** ([`tcp`]): one control connection per client, one thread per
//!   connection, carrying RTSP request/response signaling.
//! - **UDP** ([`udp`]): one sender per session, bound during SETUP to the
//!   client's negotiated RTP and RTCP ports.

pub mod tcp;
pub mod udp;

pub use udp::UdpTransport;

/// Outbound media sink for one session's stream (send-only).
///
/// The stream controller is written against this seam so the wire can be
/// swapped out in tests; the production implementation is
/// [`UdpTransport`].
pub trait RtpSink: Send + Sync {
    /// Send one RTP packet. Returns bytes sent.
    fn send_rtp(&self, packet: &[u8]) -> crate::Result<usize>;

    /// Send one RTCP packet. Returns bytes sent.
    fn send_rtcp(&self, packet: &[u8]) -> crate::Result<usize>;
}
