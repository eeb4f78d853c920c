//! RTSP server front door.
//!
//! [`Server`] owns the shared frame buffer and the listener lifecycle.
//! The application pushes encoded frames into [`Server::frame_buffer`]
//! while connected clients pull them out through their per-session
//! stream controllers.

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::buffer::FrameBuffer;
use crate::error::{Result, RtspError};
use crate::media::MediaKind;
use crate::transport::tcp;

/// Static description of the media the server announces over SDP.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Codec carried on the single stream.
    pub media: MediaKind,
    /// Host advertised in SDP origin and Content-Base. When unset the
    /// request URI host (or, failing that, the connection address) is
    /// used instead.
    pub public_host: Option<String>,
    /// Session name for the SDP `s=` line.
    pub session_name: String,
    /// H.264 SPS and PPS, used for `sprop-parameter-sets` and
    /// `profile-level-id` in the DESCRIBE answer. Ignored for audio.
    pub h264_parameter_sets: Option<(Vec<u8>, Vec<u8>)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            media: MediaKind::H264,
            public_host: None,
            session_name: "Stream".to_string(),
            h264_parameter_sets: None,
        }
    }
}

/// Single-stream RTSP server.
pub struct Server {
    bind_addr: String,
    buffer: Arc<FrameBuffer>,
    running: Arc<AtomicBool>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Server with default configuration (H.264, payload type 96).
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    pub fn with_config(bind_addr: impl Into<String>, config: ServerConfig) -> Self {
        Server {
            bind_addr: bind_addr.into(),
            buffer: Arc::new(FrameBuffer::new()),
            running: Arc::new(AtomicBool::new(false)),
            config: Arc::new(config),
        }
    }

    /// Bind the control port and start accepting clients in a
    /// background thread. Returns immediately.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }

        let listener = match TcpListener::bind(&self.bind_addr) {
            Ok(l) => l,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        listener.set_nonblocking(true)?;

        tracing::info!(addr = %self.bind_addr, "RTSP server listening");

        let buffer = self.buffer.clone();
        let config = self.config.clone();
        let running = self.running.clone();
        thread::Builder::new()
            .name("rtsp-accept".to_string())
            .spawn(move || tcp::accept_loop(listener, buffer, config, running))?;

        Ok(())
    }

    /// Signal the accept loop and all connection threads to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("RTSP server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared buffer to feed encoded frames into.
    pub fn frame_buffer(&self) -> Arc<FrameBuffer> {
        self.buffer.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
