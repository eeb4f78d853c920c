use rand::RngExt;

/// RTP fixed header state and serialization (RFC 3550 §5.1).
///
/// ```text
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// |                           Timestamp                           |
/// |                             SSRC                              |
/// ```
///
/// One instance exists per media stream and carries the running packet
/// state: the 16-bit wrapping sequence number (incremented on every
/// [`write`](Self::write)), the 32-bit media-clock timestamp (advanced
/// once per frame), and the SSRC, which is fixed for the stream's
/// lifetime. Version is always 2; padding, extension, and CSRC count
/// are always 0.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpHeader {
    /// Create header state with an explicit SSRC and initial sequence 0.
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header state created"
        );
        Self {
            pt,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Create with a random SSRC and a random initial sequence number.
    ///
    /// RFC 3550 §8.1 wants the SSRC chosen randomly to avoid collisions
    /// between independent streams; a random sequence start makes known-
    /// plaintext guessing harder (§5.1).
    pub fn with_random_identity(pt: u8) -> Self {
        let mut rng = rand::rng();
        let mut header = Self::new(pt, rng.random::<u32>());
        header.sequence = rng.random::<u16>();
        header
    }

    /// Sequence number the next packet will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Current RTP timestamp.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Serialize the 12-byte header and advance the sequence number.
    ///
    /// `marker` signals the last packet of an access unit (RFC 6184 §5.1
    /// for H.264; for single-packet audio frames it is simply set).
    /// Multi-byte fields are written in network byte order.
    pub fn write(&mut self, marker: bool) -> [u8; 12] {
        let mut header = [0u8; 12];
        header[0] = 2 << 6;
        header[1] = ((marker as u8) << 7) | (self.pt & 0x7F);
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Build a complete RTP packet: 12-byte header followed by `payload`.
    pub fn packet(&mut self, marker: bool, payload: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(12 + payload.len());
        packet.extend_from_slice(&self.write(marker));
        packet.extend_from_slice(payload);
        packet
    }

    /// Advance the RTP timestamp by the media-clock step for one frame.
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header() -> RtpHeader {
        RtpHeader::new(96, 0xAABBCCDD)
    }

    #[test]
    fn version_is_2() {
        let mut h = make_header();
        let buf = h.write(false);
        assert_eq!(buf[0] >> 6, 2);
        // P, X, CC all zero
        assert_eq!(buf[0] & 0x3F, 0);
    }

    #[test]
    fn marker_bit() {
        let mut h = make_header();
        let no_marker = h.write(false);
        assert_eq!(no_marker[1] & 0x80, 0);

        let with_marker = h.write(true);
        assert_eq!(with_marker[1] & 0x80, 0x80);
    }

    #[test]
    fn payload_type_field() {
        let mut h = make_header();
        let buf = h.write(false);
        assert_eq!(buf[1] & 0x7F, 96);
    }

    #[test]
    fn sequence_increments_per_packet() {
        let mut h = make_header();
        let b1 = h.write(false);
        let b2 = h.write(false);
        let seq1 = u16::from_be_bytes([b1[2], b1[3]]);
        let seq2 = u16::from_be_bytes([b2[2], b2[3]]);
        assert_eq!(seq2, seq1.wrapping_add(1));
    }

    #[test]
    fn sequence_wraps_at_u16_max() {
        let mut h = make_header();
        h.sequence = u16::MAX;
        let buf = h.write(false);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), u16::MAX);
        assert_eq!(h.sequence(), 0);
    }

    #[test]
    fn ssrc_written_big_endian() {
        let mut h = make_header();
        let buf = h.write(false);
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            0xAABBCCDD
        );
    }

    #[test]
    fn timestamp_advances_and_wraps() {
        let mut h = make_header();
        h.advance_timestamp(3000);
        assert_eq!(h.timestamp(), 3000);
        h.timestamp = u32::MAX;
        h.advance_timestamp(1);
        assert_eq!(h.timestamp(), 0);
    }

    #[test]
    fn packet_prepends_header() {
        let mut h = make_header();
        let pkt = h.packet(true, &[0x01, 0x02, 0x03]);
        assert_eq!(pkt.len(), 15);
        assert_eq!(&pkt[12..], &[0x01, 0x02, 0x03]);
        assert_eq!(pkt[1] & 0x80, 0x80);
    }

    #[test]
    fn random_identity_differs() {
        let h1 = RtpHeader::with_random_identity(96);
        let h2 = RtpHeader::with_random_identity(96);
        assert_ne!((h1.ssrc, h1.sequence), (h2.ssrc, h2.sequence));
    }
}
