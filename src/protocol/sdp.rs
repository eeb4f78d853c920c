//! SDP generation for DESCRIBE responses (RFC 4566).
//!
//! ```text
//! v=0                                     ← protocol version
//! o=- <session-id> <session-version> IN IP4 <addr>
//! s=<session-name>
//! c=IN IP4 <addr>
//! t=0 0                                   ← unbounded live stream
//! a=tool:rtsp-media
//! a=sendonly
//! m=<video|audio> <rtp-port> RTP/AVP <pt>
//! a=rtpmap:<pt> <codec>/<clock>[/<channels>]
//! [a=fmtp:<pt> packetization-mode=1;...]  ← H.264 only
//! ```
//!
//! The origin line uses the client session's id and version (which are
//! equal by construction); the `m=` port is the client's negotiated RTP
//! port, or 0 when DESCRIBE precedes SETUP.

use crate::media::{MediaKind, h264};
use crate::server::ServerConfig;
use crate::session::ClientSession;

/// Generate the DESCRIBE body for the server's configured stream.
pub fn generate_sdp(config: &ServerConfig, session: &ClientSession, ip: &str) -> String {
    let kind = config.media;
    let pt = kind.payload_type();
    let rtp_port = session.ports().map(|p| p.rtp).unwrap_or(0);

    let mut sdp: Vec<String> = Vec::new();
    sdp.push("v=0".to_string());
    sdp.push(format!(
        "o=- {} {} IN IP4 {}",
        session.id(),
        session.version(),
        ip
    ));
    sdp.push(format!("s={}", config.session_name));
    sdp.push(format!("c=IN IP4 {}", ip));
    sdp.push("t=0 0".to_string());
    sdp.push("a=tool:rtsp-media".to_string());
    sdp.push("a=sendonly".to_string());
    sdp.push(format!(
        "m={} {} RTP/AVP {}",
        kind.media_type(),
        rtp_port,
        pt
    ));
    sdp.push(format!("a=rtpmap:{} {}", pt, kind.rtpmap()));

    if kind == MediaKind::H264 {
        // rtpmap before fmtp — clients parse attributes in order
        // (RFC 6184 §8.2.1).
        let mut fmtp = format!("a=fmtp:{} packetization-mode=1", pt);
        if let Some((sps, pps)) = &config.h264_parameter_sets {
            if let Some(pl) = h264::profile_level_id(sps) {
                fmtp.push_str(&format!(";profile-level-id={}", pl));
            }
            fmtp.push_str(&format!(
                ";sprop-parameter-sets={}",
                h264::sprop_parameter_sets(sps, pps)
            ));
        }
        sdp.push(fmtp);
    }

    tracing::debug!(session_id = session.id(), "SDP: {}", sdp.join(" | "));

    format!("{}\r\n", sdp.join("\r\n"))
}
