//! Bounded frame hand-off between producers and the stream controller.
//!
//! Capture/encode threads push encoded frames in; the per-session
//! [`MediaStreamController`](crate::stream::MediaStreamController) pops
//! them out. The buffer is deliberately lossy: a `push` against a full
//! buffer drops the frame instead of blocking the producer, and a `pop`
//! against an empty buffer returns `None` instead of waiting. For live
//! media, stale frames are worth less than producer latency.

use parking_lot::Mutex;

/// Default number of frame slots (matches a ~10-frame jitter window).
pub const DEFAULT_CAPACITY: usize = 10;

/// One timestamped chunk of encoded media (an access unit for video,
/// one codec frame for audio).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded payload bytes (Annex B bitstream for H.264).
    pub data: Vec<u8>,
    /// Media-clock timestamp assigned by the producer.
    pub timestamp: u32,
}

/// Pre-allocated slot storage. The backing `Vec` is cleared and refilled
/// on reuse, never shrunk, so steady-state pushes allocate nothing.
#[derive(Debug, Default)]
struct Slot {
    data: Vec<u8>,
    timestamp: u32,
}

#[derive(Debug)]
struct Inner {
    slots: Vec<Slot>,
    head: usize,
    tail: usize,
    count: usize,
}

/// Fixed-capacity circular frame queue.
///
/// Invariant: `0 <= count <= capacity`. Frames come out in push order
/// (FIFO), except frames dropped while full. All methods take the one
/// internal lock for their full duration and never call each other, so
/// there is no lock re-entry.
#[derive(Debug)]
pub struct FrameBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "frame buffer capacity must be non-zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        Self {
            inner: Mutex::new(Inner {
                slots,
                head: 0,
                tail: 0,
                count: 0,
            }),
            capacity,
        }
    }

    /// Copy a frame into the slot at `tail`.
    ///
    /// If the buffer is full the frame is silently dropped — lossy
    /// back-pressure, the producer is never blocked or notified.
    pub fn push(&self, frame: &Frame) {
        let mut inner = self.inner.lock();
        if inner.count == self.capacity {
            tracing::trace!(
                capacity = self.capacity,
                timestamp = frame.timestamp,
                "frame buffer full, dropping frame"
            );
            return;
        }

        let tail = inner.tail;
        let slot = &mut inner.slots[tail];
        slot.data.clear();
        slot.data.extend_from_slice(&frame.data);
        slot.timestamp = frame.timestamp;

        inner.tail = (inner.tail + 1) % self.capacity;
        inner.count += 1;
    }

    /// Copy the frame at `head` out, or `None` when empty. Never blocks.
    ///
    /// The slot's storage stays in place for reuse; the caller gets an
    /// independent copy, so producer and consumer never share bytes.
    pub fn pop(&self) -> Option<Frame> {
        let mut inner = self.inner.lock();
        if inner.count == 0 {
            return None;
        }

        let head = inner.head;
        let frame = Frame {
            data: inner.slots[head].data.clone(),
            timestamp: inner.slots[head].timestamp,
        };

        inner.head = (inner.head + 1) % self.capacity;
        inner.count -= 1;
        Some(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().count == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().count == self.capacity
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
