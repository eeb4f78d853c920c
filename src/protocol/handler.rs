use std::net::SocketAddr;
use std::sync::Arc;

use crate::buffer::FrameBuffer;
use crate::protocol::request::RtspRequest;
use crate::protocol::response::RtspResponse;
use crate::protocol::sdp;
use crate::server::ServerConfig;
use crate::session::ClientSession;
use crate::stream::{MediaStreamController, StreamCommand, StreamHandle};
use crate::transport::UdpTransport;

/// Dispatches RTSP methods for one control connection's session.
///
/// Owns the session's stream controller lifecycle: SETUP negotiates
/// ports, creates the UDP transport, and spawns the controller in Init
/// state; PLAY/PAUSE/TEARDOWN forward commands into its state machine.
///
/// Requests with no usable CSeq and unsupported methods get no response
/// at all — the request is logged and dropped, the connection stays up.
pub struct RequestHandler {
    session: Arc<ClientSession>,
    buffer: Arc<FrameBuffer>,
    config: Arc<ServerConfig>,
    client_addr: SocketAddr,
    stream: Option<StreamHandle>,
    finished: bool,
}

impl RequestHandler {
    pub fn new(
        session: Arc<ClientSession>,
        buffer: Arc<FrameBuffer>,
        config: Arc<ServerConfig>,
        client_addr: SocketAddr,
    ) -> Self {
        RequestHandler {
            session,
            buffer,
            config,
            client_addr,
            stream: None,
            finished: false,
        }
    }

    /// The session's stream handle, once SETUP has created one. The
    /// connection layer uses it to tear the stream down on disconnect.
    pub fn stream_handle(&self) -> Option<&StreamHandle> {
        self.stream.as_ref()
    }

    /// Whether TEARDOWN has completed; the connection loop exits after
    /// writing the final response.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Handle one request. `None` means no response is sent.
    pub fn handle(&mut self, request: &RtspRequest) -> Option<RtspResponse> {
        let Some(cseq) = request.cseq() else {
            tracing::warn!(method = %request.method, "request without usable CSeq, dropping");
            return None;
        };
        let cseq = cseq.to_string();

        match request.method.as_str() {
            "OPTIONS" => Some(self.handle_options(&cseq)),
            "DESCRIBE" => Some(self.handle_describe(&cseq, request)),
            "SETUP" => self.handle_setup(&cseq, request),
            "PLAY" => Some(self.handle_stream_cmd(&cseq, StreamCommand::Play)),
            "PAUSE" => Some(self.handle_stream_cmd(&cseq, StreamCommand::Pause)),
            "TEARDOWN" => Some(self.handle_teardown(&cseq)),
            _ => {
                tracing::warn!(method = %request.method, %cseq, "unsupported RTSP method, ignoring");
                None
            }
        }
    }

    fn session_value(&self) -> String {
        self.session.id().to_string()
    }

    fn handle_options(&self, cseq: &str) -> RtspResponse {
        tracing::debug!(%cseq, "OPTIONS");
        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Public", "OPTIONS, DESCRIBE, SETUP, PLAY, PAUSE, TEARDOWN")
    }

    /// Host advertised in the SDP origin/connection lines: configured
    /// public host, else the host part of the request URI, else the
    /// address the connection arrived on.
    fn sdp_host(&self, uri: &str) -> String {
        if let Some(host) = &self.config.public_host {
            return host.clone();
        }

        if let Some(after_scheme) = uri.strip_prefix("rtsp://") {
            let host = after_scheme
                .split('/')
                .next()
                .and_then(|host_port| host_port.split(':').next())
                .unwrap_or("")
                .trim();
            if !host.is_empty() {
                return host.to_string();
            }
        }
        self.client_addr.ip().to_string()
    }

    fn handle_describe(&self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        tracing::debug!(%cseq, uri = %request.uri, "DESCRIBE");

        if !request.accepts_sdp() {
            tracing::warn!(%cseq, "DESCRIBE does not accept application/sdp");
            return RtspResponse::not_acceptable().add_header("CSeq", cseq);
        }

        let host = self.sdp_host(&request.uri);
        let body = sdp::generate_sdp(&self.config, &self.session, &host);

        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Content-Type", "application/sdp")
            .add_header("Content-Base", &request.uri)
            .with_body(body)
    }

    fn handle_setup(&mut self, cseq: &str, request: &RtspRequest) -> Option<RtspResponse> {
        // Only RTP/AVP over UDP is implemented; interleaved TCP transport
        // (RFC 2326 §10.12) is out of scope.
        if let Some(transport) = request.get_header("Transport")
            && (transport.contains("RTP/AVP/TCP") || transport.contains("interleaved="))
        {
            tracing::warn!(%cseq, transport, "client requested interleaved TCP transport");
            return Some(
                RtspResponse::new(461, "Unsupported Transport")
                    .add_header("CSeq", cseq)
                    .add_header("Unsupported", "RTP/AVP/TCP (interleaved); use RTP/AVP (UDP)"),
            );
        }

        let Some((rtp_port, rtcp_port)) = request.client_ports() else {
            tracing::warn!(%cseq, "SETUP without client_port pair, dropping request");
            return None;
        };

        if self.stream.is_some() {
            tracing::warn!(%cseq, session_id = self.session.id(), "duplicate SETUP");
            return Some(RtspResponse::method_not_valid().add_header("CSeq", cseq));
        }

        self.session.set_ports(rtp_port, rtcp_port);

        let transport = match UdpTransport::for_session(&self.session) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(%cseq, error = %e, "failed to create UDP transport");
                return Some(RtspResponse::internal_error().add_header("CSeq", cseq));
            }
        };

        match MediaStreamController::spawn(
            self.buffer.clone(),
            Arc::new(transport),
            self.config.media,
        ) {
            Ok((handle, _join)) => {
                self.stream = Some(handle);
            }
            Err(e) => {
                tracing::error!(%cseq, error = %e, "failed to spawn stream controller");
                return Some(RtspResponse::internal_error().add_header("CSeq", cseq));
            }
        }

        tracing::info!(
            session_id = self.session.id(),
            client = %self.client_addr.ip(),
            rtp_port,
            rtcp_port,
            "stream set up"
        );

        Some(
            RtspResponse::ok()
                .add_header("CSeq", cseq)
                .add_header(
                    "Transport",
                    &format!("RTP/AVP;unicast;client_port={}-{}", rtp_port, rtcp_port),
                )
                .add_header("Session", &self.session_value()),
        )
    }

    fn handle_stream_cmd(&mut self, cseq: &str, cmd: StreamCommand) -> RtspResponse {
        let Some(stream) = &self.stream else {
            tracing::warn!(%cseq, ?cmd, "stream command before SETUP");
            return RtspResponse::method_not_valid().add_header("CSeq", cseq);
        };

        stream.set_cmd(cmd);
        tracing::info!(session_id = self.session.id(), ?cmd, "stream command");

        RtspResponse::ok()
            .add_header("CSeq", cseq)
            .add_header("Session", &self.session_value())
    }

    fn handle_teardown(&mut self, cseq: &str) -> RtspResponse {
        let response = self.handle_stream_cmd(cseq, StreamCommand::Teardown);
        if response.status_code == 200 {
            self.finished = true;
            tracing::info!(session_id = self.session.id(), "session torn down");
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;
    use crate::stream::StreamState;

    fn make_handler() -> RequestHandler {
        let addr: SocketAddr = "127.0.0.1:54321".parse().unwrap();
        RequestHandler::new(
            Arc::new(ClientSession::new(IpAddr::V4(Ipv4Addr::LOCALHOST))),
            Arc::new(FrameBuffer::new()),
            Arc::new(ServerConfig::default()),
            addr,
        )
    }

    fn req(raw: &str) -> RtspRequest {
        RtspRequest::parse(raw).unwrap()
    }

    fn setup_request() -> RtspRequest {
        req("SETUP rtsp://127.0.0.1/stream RTSP/1.0\r\n\
             CSeq: 3\r\n\
             Transport: RTP/AVP;unicast;client_port=5004-5005\r\n\r\n")
    }

    #[test]
    fn options_lists_methods() {
        let mut h = make_handler();
        let resp = h
            .handle(&req("OPTIONS rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 1\r\n\r\n"))
            .expect("response");
        let s = resp.serialize();
        assert!(s.starts_with("RTSP/1.0 200 OK"));
        assert!(s.contains("CSeq: 1\r\n"));
        for method in ["OPTIONS", "DESCRIBE", "SETUP", "PLAY", "PAUSE", "TEARDOWN"] {
            assert!(s.contains(method), "Public must list {method}");
        }
    }

    #[test]
    fn missing_cseq_drops_request() {
        let mut h = make_handler();
        assert!(
            h.handle(&req("OPTIONS rtsp://127.0.0.1/stream RTSP/1.0\r\n\r\n"))
                .is_none()
        );
    }

    #[test]
    fn unsupported_method_gets_no_response() {
        let mut h = make_handler();
        assert!(
            h.handle(&req("RECORD rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 9\r\n\r\n"))
                .is_none()
        );
    }

    #[test]
    fn describe_requires_sdp_accept() {
        let mut h = make_handler();
        let resp = h
            .handle(&req("DESCRIBE rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 2\r\n\r\n"))
            .expect("response");
        assert_eq!(resp.status_code, 406);
    }

    #[test]
    fn describe_returns_sdp_body() {
        let mut h = make_handler();
        let resp = h
            .handle(&req(
                "DESCRIBE rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 2\r\nAccept: application/sdp\r\n\r\n",
            ))
            .expect("response");
        assert_eq!(resp.status_code, 200);
        let s = resp.serialize();
        assert!(s.contains("Content-Type: application/sdp"));
        assert!(s.contains("m=video 0 RTP/AVP 96"));
        assert!(s.contains("a=rtpmap:96 H264/90000"));
    }

    #[test]
    fn play_before_setup_is_455() {
        let mut h = make_handler();
        let resp = h
            .handle(&req("PLAY rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 4\r\n\r\n"))
            .expect("response");
        assert_eq!(resp.status_code, 455);
    }

    #[test]
    fn setup_negotiates_ports_and_starts_stream() {
        let mut h = make_handler();
        let resp = h.handle(&setup_request()).expect("response");
        assert_eq!(resp.status_code, 200);
        let s = resp.serialize();
        assert!(s.contains("Transport: RTP/AVP;unicast;client_port=5004-5005"));
        assert!(s.contains(&format!("Session: {}", h.session.id())));

        assert_eq!(h.session.ports().map(|p| (p.rtp, p.rtcp)), Some((5004, 5005)));
        let handle = h.stream_handle().expect("controller spawned");
        assert_eq!(handle.state(), StreamState::Init);

        handle.set_cmd(StreamCommand::Teardown);
    }

    #[test]
    fn setup_without_ports_drops_request() {
        let mut h = make_handler();
        let resp = h.handle(&req(
            "SETUP rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 3\r\nTransport: RTP/AVP;unicast\r\n\r\n",
        ));
        assert!(resp.is_none());
        assert!(h.stream_handle().is_none());
    }

    #[test]
    fn setup_interleaved_is_461() {
        let mut h = make_handler();
        let resp = h
            .handle(&req(
                "SETUP rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 3\r\nTransport: RTP/AVP/TCP;interleaved=0-1\r\n\r\n",
            ))
            .expect("response");
        assert_eq!(resp.status_code, 461);
    }

    #[test]
    fn full_lifecycle_play_pause_teardown() {
        let mut h = make_handler();
        h.handle(&setup_request()).expect("setup");

        let resp = h
            .handle(&req("PLAY rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 4\r\n\r\n"))
            .expect("play");
        assert_eq!(resp.status_code, 200);
        assert_eq!(h.stream_handle().unwrap().state(), StreamState::Play);

        let resp = h
            .handle(&req("PAUSE rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 5\r\n\r\n"))
            .expect("pause");
        assert_eq!(resp.status_code, 200);
        assert_eq!(h.stream_handle().unwrap().state(), StreamState::Pause);

        assert!(!h.finished());
        let resp = h
            .handle(&req("TEARDOWN rtsp://127.0.0.1/stream RTSP/1.0\r\nCSeq: 6\r\n\r\n"))
            .expect("teardown");
        assert_eq!(resp.status_code, 200);
        assert!(h.finished());
        assert_eq!(h.stream_handle().unwrap().state(), StreamState::Teardown);
    }

    #[test]
    fn duplicate_setup_is_455() {
        let mut h = make_handler();
        h.handle(&setup_request()).expect("setup");
        let resp = h.handle(&setup_request()).expect("response");
        assert_eq!(resp.status_code, 455);

        h.stream_handle().unwrap().set_cmd(StreamCommand::Teardown);
    }
}
