/// An RTSP response (RFC 2326 §7).
///
/// Builder-style: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then [`serialize`](Self::serialize).
/// `Content-Length` is appended automatically when a body is present.
#[must_use]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Server identification string included in every response (RFC 2326 §12.36).
pub const SERVER_AGENT: &str = "rtsp-media/0.1";

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![("Server".to_string(), SERVER_AGENT.to_string())],
            body: None,
        }
    }

    /// 200 OK (RFC 2326 §7.1.1).
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// 406 Not Acceptable — DESCRIBE without `Accept: application/sdp`.
    pub fn not_acceptable() -> Self {
        Self::new(406, "Not Acceptable")
    }

    /// 455 Method Not Valid in This State — PLAY/PAUSE/TEARDOWN before
    /// SETUP has started a stream (RFC 2326 §11.3.6).
    pub fn method_not_valid() -> Self {
        Self::new(455, "Method Not Valid in This State")
    }

    /// 500 Internal Server Error.
    pub fn internal_error() -> Self {
        Self::new(500, "Internal Server Error")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize to the RTSP text wire format, computing `Content-Length`
    /// for the body if one is present (RFC 2326 §12.14).
    pub fn serialize(&self) -> String {
        let mut response = format!("RTSP/1.0 {} {}\r\n", self.status_code, self.status_text);

        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }

        if let Some(body) = &self.body {
            response.push_str(&format!("Content-Length: {}\r\n", body.len()));
            response.push_str("\r\n");
            response.push_str(body);
        } else {
            response.push_str("\r\n");
        }
        response
    }
}
