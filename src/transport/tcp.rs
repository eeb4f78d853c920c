use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::buffer::FrameBuffer;
use crate::protocol::{RequestHandler, RtspRequest};
use crate::server::ServerConfig;
use crate::session::ClientSession;
use crate::stream::StreamCommand;

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
/// Each accepted connection gets its own thread and its own session.
pub fn accept_loop(
    listener: TcpListener,
    buffer: Arc<FrameBuffer>,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let b = buffer.clone();
                let c = config.clone();
                let r = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, b, c, r);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// One RTSP control connection: blocking reads of CRLF-framed requests,
/// dispatch through the session's [`RequestHandler`], response writes.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    handler: RequestHandler,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Entry point: create the session and run the request loop until
    /// the client disconnects or tears the session down.
    pub fn handle(
        stream: TcpStream,
        buffer: Arc<FrameBuffer>,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        let session = Arc::new(ClientSession::new(peer_addr.ip()));
        tracing::info!(%peer_addr, session_id = session.id(), "client connected");

        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let handler = RequestHandler::new(session, buffer, config, peer_addr);
        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            writer: stream,
            handler,
            peer_addr,
        };

        let reason = conn.run(&running);
        conn.cleanup();

        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    /// RTSP request/response loop. Returns the reason for exiting.
    fn run(&mut self, running: &Arc<AtomicBool>) -> &'static str {
        while running.load(Ordering::SeqCst) {
            let mut request_text = String::new();
            loop {
                let mut line = String::new();
                match self.reader.read_line(&mut line) {
                    Ok(0) => return "connection closed by client",
                    Ok(_) => {
                        request_text.push_str(&line);
                        if line == "\r\n" || line == "\n" {
                            break;
                        }
                    }
                    Err(_) => return "read error",
                }
            }

            if request_text.trim().is_empty() {
                continue;
            }

            let request = match RtspRequest::parse(&request_text) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                    continue;
                }
            };

            tracing::debug!(
                peer = %self.peer_addr,
                method = %request.method,
                uri = %request.uri,
                "request"
            );

            if let Some(response) = self.handler.handle(&request) {
                tracing::debug!(peer = %self.peer_addr, status = response.status_code, "response");
                if self
                    .writer
                    .write_all(response.serialize().as_bytes())
                    .is_err()
                {
                    return "write error";
                }
            }

            if self.handler.finished() {
                return "session torn down";
            }
        }

        "server shutting down"
    }

    /// Make sure the stream controller exits when the connection goes
    /// away without a TEARDOWN.
    fn cleanup(&self) {
        if let Some(stream) = self.handler.stream_handle() {
            stream.set_cmd(StreamCommand::Teardown);
        }
    }
}
