//! Per-session media stream controller.
//!
//! Created during SETUP, running on its own thread, the controller owns
//! the PLAY/PAUSE/TEARDOWN state machine and the packetization loop: it
//! drains the shared [`FrameBuffer`], turns each frame into RTP packets
//! for the session's codec, pushes them through the session's
//! [`RtpSink`], and emits an RTCP Sender Report every
//! [`SR_PACKET_INTERVAL`] packets.
//!
//! ## State machine
//!
//! ```text
//! Init ──PLAY──▶ Play ◀──PLAY── Pause
//!                  │   ──PAUSE──▶
//!   any ──TEARDOWN──▶ Teardown (terminal)
//! ```
//!
//! While in Init or Pause the loop blocks on a condition variable — no
//! polling. Teardown is cooperative: the loop observes it on its next
//! iteration (at most one wait or one frame-send later) and exits.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::buffer::FrameBuffer;
use crate::media::rtcp::SenderReport;
use crate::media::rtp::RtpHeader;
use crate::media::{MediaKind, h264};
use crate::transport::RtpSink;

/// RTP packets between consecutive Sender Reports.
pub const SR_PACKET_INTERVAL: u32 = 100;

/// Pause between buffer polls while playing with nothing queued. Keeps
/// drain latency in the low milliseconds without pegging a core.
const EMPTY_POLL: Duration = Duration::from_millis(2);

/// Stream playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created by SETUP, waiting for the first PLAY.
    Init,
    /// Draining the frame buffer and sending RTP.
    Play,
    /// Suspended; resumes on PLAY.
    Pause,
    /// Terminal; the control loop has exited or is about to.
    Teardown,
}

/// Command sent into the state machine by the request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    Play,
    Pause,
    Teardown,
}

struct Shared {
    state: Mutex<StreamState>,
    cond: Condvar,
}

/// Cloneable command/introspection handle for a running controller.
#[derive(Clone)]
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// Apply a command to the state machine and wake the control loop.
    ///
    /// Invalid transitions (anything out of Teardown, PAUSE outside of
    /// Play) are ignored with a log line rather than treated as errors.
    pub fn set_cmd(&self, cmd: StreamCommand) {
        let mut state = self.shared.state.lock();
        let next = match (*state, cmd) {
            (StreamState::Teardown, _) => None,
            (_, StreamCommand::Teardown) => Some(StreamState::Teardown),
            (StreamState::Init | StreamState::Pause, StreamCommand::Play) => {
                Some(StreamState::Play)
            }
            (StreamState::Play, StreamCommand::Pause) => Some(StreamState::Pause),
            _ => None,
        };

        match next {
            Some(next) => {
                tracing::debug!(from = ?*state, to = ?next, "stream state transition");
                *state = next;
            }
            None => {
                tracing::debug!(state = ?*state, ?cmd, "ignoring stream command");
            }
        }
        self.shared.cond.notify_all();
    }

    /// Current state snapshot.
    pub fn state(&self) -> StreamState {
        *self.shared.state.lock()
    }
}

/// Owns the control loop for one session's media stream.
pub struct MediaStreamController {
    buffer: Arc<FrameBuffer>,
    sink: Arc<dyn RtpSink>,
    kind: MediaKind,
    shared: Arc<Shared>,
}

impl MediaStreamController {
    /// Spawn the control loop on its own thread, starting in
    /// [`StreamState::Init`].
    ///
    /// The returned handle drives the state machine; the join handle lets
    /// the caller wait for loop exit (dropping it detaches the thread,
    /// which the connection layer does).
    pub fn spawn(
        buffer: Arc<FrameBuffer>,
        sink: Arc<dyn RtpSink>,
        kind: MediaKind,
    ) -> crate::Result<(StreamHandle, thread::JoinHandle<()>)> {
        let shared = Arc::new(Shared {
            state: Mutex::new(StreamState::Init),
            cond: Condvar::new(),
        });
        let handle = StreamHandle {
            shared: shared.clone(),
        };
        let controller = MediaStreamController {
            buffer,
            sink,
            kind,
            shared,
        };

        let join = thread::Builder::new()
            .name("media-stream".to_string())
            .spawn(move || controller.run())?;

        Ok((handle, join))
    }

    fn run(self) {
        let mut header = RtpHeader::with_random_identity(self.kind.payload_type());
        let mut packet_count: u32 = 0;
        let mut octet_count: u32 = 0;

        tracing::debug!(kind = ?self.kind, ssrc = header.ssrc, "media stream loop started");

        loop {
            {
                let mut state = self.shared.state.lock();
                match *state {
                    // Blocked until a command arrives; re-check after any
                    // wakeup (spurious or Teardown-while-paused).
                    StreamState::Init | StreamState::Pause => {
                        self.shared.cond.wait(&mut state);
                        continue;
                    }
                    StreamState::Teardown => break,
                    StreamState::Play => {}
                }
            }

            match self.buffer.pop() {
                Some(frame) if frame.data.is_empty() => {
                    // Expected during stream start-up, not a fault.
                    tracing::trace!("skipping empty frame");
                }
                Some(frame) => {
                    self.send_frame(&mut header, &frame.data, &mut packet_count, &mut octet_count);
                }
                None => thread::sleep(EMPTY_POLL),
            }
        }

        tracing::debug!(
            kind = ?self.kind,
            packets = packet_count,
            octets = octet_count,
            "media stream loop exited"
        );
    }

    /// Packetize and send one frame, then tick the media clock.
    ///
    /// Send failures are logged and skipped — streaming is best-effort,
    /// a lost packet never stops the loop.
    fn send_frame(
        &self,
        header: &mut RtpHeader,
        data: &[u8],
        packet_count: &mut u32,
        octet_count: &mut u32,
    ) {
        let packets = if self.kind.is_video() {
            h264::packetize_frame(header, data, h264::MAX_RTP_DATA_SIZE)
        } else {
            // One codec frame per packet, marker set (end of frame).
            vec![header.packet(true, data)]
        };

        for packet in &packets {
            if let Err(e) = self.sink.send_rtp(packet) {
                tracing::warn!(error = %e, "RTP send failed");
            }
            *packet_count = packet_count.wrapping_add(1);
            *octet_count = octet_count.wrapping_add((packet.len() - 12) as u32);

            if *packet_count % SR_PACKET_INTERVAL == 0 {
                let sr = SenderReport {
                    ssrc: header.ssrc,
                    rtp_timestamp: header.timestamp(),
                    packet_count: *packet_count,
                    octet_count: *octet_count,
                };
                if let Err(e) = self.sink.send_rtcp(&sr.to_bytes()) {
                    tracing::warn!(error = %e, "RTCP send failed");
                }
            }
        }

        header.advance_timestamp(self.kind.timestamp_step());
    }
}
