use crate::error::{ParseErrorKind, RtspError};

/// A parsed RTSP request (RFC 2326 §6).
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. The helper
/// accessors ([`cseq`](Self::cseq), [`client_ports`](Self::client_ports),
/// [`accepts_sdp`](Self::accepts_sdp)) return `None`/`false` for absent
/// or malformed values instead of erroring, matching the dispatch
/// table's "abort this request" semantics.
#[derive(Debug)]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, DESCRIBE, SETUP, ...), the first
    /// whitespace-delimited token of the request line.
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:8554/stream`).
    pub uri: String,
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    /// Headers as ordered (name, value) pairs, names stored as received.
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    /// Parse a complete request: request line, headers, trailing blank line.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines.next().ok_or(RtspError::Parse {
            kind: ParseErrorKind::EmptyRequest,
        })?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(RtspError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let method = parts[0].to_string();
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        if version != "RTSP/1.0" {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let colon_pos = line.find(':').ok_or(RtspError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            headers.push((
                line[..colon_pos].trim().to_string(),
                line[colon_pos + 1..].trim().to_string(),
            ));
        }

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
        })
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The CSeq sequence number (RFC 2326 §12.17), parsed as an integer.
    ///
    /// `None` when the header is absent or non-numeric; the dispatcher
    /// aborts that single request in that case.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq")?.trim().parse().ok()
    }

    /// The `client_port=<rtp>-<rtcp>` pair from the Transport header
    /// (RFC 2326 §12.39). Scans every header so a malformed request that
    /// put the parameter elsewhere still negotiates.
    pub fn client_ports(&self) -> Option<(u16, u16)> {
        for (_, value) in &self.headers {
            let Some(idx) = value.find("client_port=") else {
                continue;
            };
            let ports = &value[idx + "client_port=".len()..];
            let ports = ports.split(';').next().unwrap_or(ports);
            let (rtp, rtcp) = ports.split_once('-')?;
            return Some((rtp.trim().parse().ok()?, rtcp.trim().parse().ok()?));
        }
        None
    }

    /// Whether the client accepts an SDP description: true iff any
    /// header value contains `application/sdp`.
    pub fn accepts_sdp(&self) -> bool {
        self.headers
            .iter()
            .any(|(_, value)| value.contains("application/sdp"))
    }
}
