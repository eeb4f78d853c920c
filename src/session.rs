//! Per-connection client session state.
//!
//! One [`ClientSession`] is created for each accepted control connection
//! and lives until the connection closes or TEARDOWN completes. Its
//! identity is immutable; the RTP/RTCP client ports are written exactly
//! once, by SETUP, and read-only afterwards.

use std::net::IpAddr;

use parking_lot::RwLock;
use rand::RngExt;

/// Client RTP/RTCP ports negotiated during SETUP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub rtp: u16,
    pub rtcp: u16,
}

/// Identity and negotiated transport parameters for one client.
///
/// The session id is a random non-zero 32-bit value used both as the
/// RTSP `Session:` header value and, by SDP convention, as the version
/// field in the origin line.
#[derive(Debug)]
pub struct ClientSession {
    id: u32,
    ip: IpAddr,
    ports: RwLock<Option<PortPair>>,
}

impl ClientSession {
    pub fn new(ip: IpAddr) -> Self {
        let mut rng = rand::rng();
        let id = loop {
            let candidate = rng.random::<u32>();
            if candidate != 0 {
                break candidate;
            }
        };
        tracing::debug!(session_id = id, client_ip = %ip, "session created");
        Self {
            id,
            ip,
            ports: RwLock::new(None),
        }
    }

    /// Stable session identifier, echoed in the `Session:` header.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// SDP origin-line version; equals the session id by construction.
    pub fn version(&self) -> u32 {
        self.id
    }

    /// Client IP the control connection arrived from; RTP and RTCP are
    /// sent to this address.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Negotiated client ports, `None` until SETUP completes.
    pub fn ports(&self) -> Option<PortPair> {
        *self.ports.read()
    }

    /// Record the client ports from SETUP. The first write wins; a
    /// repeated SETUP on the same session is logged and ignored.
    pub fn set_ports(&self, rtp: u16, rtcp: u16) {
        let mut ports = self.ports.write();
        if ports.is_some() {
            tracing::warn!(session_id = self.id, "ignoring repeated port negotiation");
            return;
        }
        tracing::debug!(session_id = self.id, rtp, rtcp, "client ports negotiated");
        *ports = Some(PortPair { rtp, rtcp });
    }
}
