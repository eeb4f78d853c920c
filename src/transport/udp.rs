use std::net::{SocketAddr, UdpSocket};

use crate::error::{Result, RtspError};
use crate::session::ClientSession;
use crate::transport::RtpSink;

/// Per-session UDP sender for RTP and RTCP.
///
/// Binds two ephemeral sockets and addresses them at the client IP and
/// the ports negotiated during SETUP. This layer knows nothing about
/// packet contents; the stream controller hands it finished wire bytes.
#[derive(Debug)]
pub struct UdpTransport {
    rtp_socket: UdpSocket,
    rtcp_socket: UdpSocket,
    rtp_addr: SocketAddr,
    rtcp_addr: SocketAddr,
}

impl UdpTransport {
    /// Create the sender pair for a session that has completed SETUP.
    pub fn for_session(session: &ClientSession) -> Result<Self> {
        let ports = session
            .ports()
            .ok_or(RtspError::TransportNotConfigured(session.id()))?;

        let rtp_socket = UdpSocket::bind("0.0.0.0:0")?;
        let rtcp_socket = UdpSocket::bind("0.0.0.0:0")?;
        let rtp_addr = SocketAddr::new(session.ip(), ports.rtp);
        let rtcp_addr = SocketAddr::new(session.ip(), ports.rtcp);

        tracing::debug!(
            session_id = session.id(),
            rtp = %rtp_addr,
            rtcp = %rtcp_addr,
            "UDP transport created"
        );

        Ok(Self {
            rtp_socket,
            rtcp_socket,
            rtp_addr,
            rtcp_addr,
        })
    }
}

impl RtpSink for UdpTransport {
    fn send_rtp(&self, packet: &[u8]) -> Result<usize> {
        Ok(self.rtp_socket.send_to(packet, self.rtp_addr)?)
    }

    fn send_rtcp(&self, packet: &[u8]) -> Result<usize> {
        Ok(self.rtcp_socket.send_to(packet, self.rtcp_addr)?)
    }
}
