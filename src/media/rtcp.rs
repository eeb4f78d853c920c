//! RTCP Sender Reports (RFC 3550 §6.4.1).
//!
//! The server is send-only, so the only RTCP record it emits is the SR:
//! a running summary of how much it has sent plus a wall-clock anchor
//! that lets receivers map RTP timestamps to absolute time. The stream
//! controller emits one every [`crate::stream::SR_PACKET_INTERVAL`]
//! RTP packets; counters only ever grow.

use std::time::{SystemTime, UNIX_EPOCH};

/// Serialized length: 4-byte RTCP header + 6 payload words.
pub const SENDER_REPORT_LEN: usize = 28;

/// RTCP packet type for Sender Reports.
const RTCP_PT_SR: u8 = 200;

/// Payload length in 32-bit words minus one (RFC 3550 §6.4.1).
const SR_LENGTH_WORDS: u16 = 6;

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch.
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

/// One Sender Report record. Not idempotent — callers pass the current
/// running counters, which increase monotonically for the stream's life.
#[derive(Debug, Clone, Copy)]
pub struct SenderReport {
    pub ssrc: u32,
    /// RTP timestamp corresponding to "now" on the media clock.
    pub rtp_timestamp: u32,
    /// Total RTP packets sent so far.
    pub packet_count: u32,
    /// Total payload octets sent so far (headers excluded).
    pub octet_count: u32,
}

impl SenderReport {
    /// Serialize with the current wall-clock time as the NTP anchor.
    pub fn to_bytes(&self) -> [u8; SENDER_REPORT_LEN] {
        self.write(ntp_now())
    }

    /// Serialize with an explicit 64-bit NTP timestamp.
    ///
    /// Layout (network byte order): `V=2|P=0|RC=0`, PT=200, length=6,
    /// SSRC, NTP MSW, NTP LSW, RTP timestamp, packet count, octet count.
    pub fn write(&self, ntp: u64) -> [u8; SENDER_REPORT_LEN] {
        let mut buf = [0u8; SENDER_REPORT_LEN];
        buf[0] = 2 << 6;
        buf[1] = RTCP_PT_SR;
        buf[2..4].copy_from_slice(&SR_LENGTH_WORDS.to_be_bytes());
        buf[4..8].copy_from_slice(&self.ssrc.to_be_bytes());
        buf[8..12].copy_from_slice(&((ntp >> 32) as u32).to_be_bytes());
        buf[12..16].copy_from_slice(&(ntp as u32).to_be_bytes());
        buf[16..20].copy_from_slice(&self.rtp_timestamp.to_be_bytes());
        buf[20..24].copy_from_slice(&self.packet_count.to_be_bytes());
        buf[24..28].copy_from_slice(&self.octet_count.to_be_bytes());
        buf
    }
}

/// Current wall-clock time as a 64-bit NTP fixed-point timestamp.
pub fn ntp_now() -> u64 {
    let unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    ntp_from_unix_ms(unix_ms)
}

/// Convert milliseconds since the Unix epoch to NTP format: seconds
/// since 1900 in the high 32 bits, the millisecond remainder scaled to
/// a 2^32 fraction in the low 32 bits.
pub fn ntp_from_unix_ms(unix_ms: u64) -> u64 {
    let seconds = unix_ms / 1000 + NTP_UNIX_OFFSET_SECS;
    let fraction = ((unix_ms % 1000) << 32) / 1000;
    (seconds << 32) | fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntp_integer_half_is_offset_unix_seconds() {
        // 2024-01-01T00:00:00Z
        let ntp = ntp_from_unix_ms(1_704_067_200_000);
        assert_eq!(ntp >> 32, 1_704_067_200 + 2_208_988_800);
        assert_eq!(ntp & 0xFFFF_FFFF, 0);
    }

    #[test]
    fn ntp_fraction_scales_milliseconds() {
        let ntp = ntp_from_unix_ms(500);
        // 500 ms is exactly half of 2^32.
        assert_eq!(ntp & 0xFFFF_FFFF, 1u64 << 31);

        let ntp = ntp_from_unix_ms(250);
        assert_eq!(ntp & 0xFFFF_FFFF, 1u64 << 30);
    }

    #[test]
    fn ntp_fraction_within_one_ulp_of_exact() {
        for ms in [1u64, 333, 667, 999] {
            let got = ntp_from_unix_ms(ms) & 0xFFFF_FFFF;
            let exact = ((ms as f64) * 4_294_967_296.0 / 1000.0).round() as u64;
            assert!(got.abs_diff(exact) <= 1, "ms={ms}: got {got}, exact {exact}");
        }
    }

    #[test]
    fn sender_report_layout() {
        let sr = SenderReport {
            ssrc: 0x1122_3344,
            rtp_timestamp: 0x5566_7788,
            packet_count: 100,
            octet_count: 16_000,
        };
        let buf = sr.write(0xAAAA_BBBB_CCCC_DDDD);

        assert_eq!(buf.len(), SENDER_REPORT_LEN);
        assert_eq!(buf[0] >> 6, 2, "version");
        assert_eq!(buf[0] & 0x3F, 0, "padding and report count");
        assert_eq!(buf[1], 200, "packet type");
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 6, "length words");
        assert_eq!(
            u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            0x1122_3344
        );
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            0xAAAA_BBBB,
            "NTP MSW"
        );
        assert_eq!(
            u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            0xCCCC_DDDD,
            "NTP LSW"
        );
        assert_eq!(
            u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
            0x5566_7788
        );
        assert_eq!(u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]), 100);
        assert_eq!(
            u32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]),
            16_000
        );
    }

    #[test]
    fn ntp_now_is_after_2024() {
        let ntp = ntp_now();
        assert!(ntp >> 32 > 1_704_067_200 + 2_208_988_800);
    }
}
