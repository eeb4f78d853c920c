//! H.264 RTP packetization (RFC 6184).
//!
//! Two packetization modes:
//!
//! - **Single NAL Unit** (§5.6): a NAL unit that fits in one RTP packet
//!   is carried verbatim after the 12-byte header.
//! - **FU-A fragmentation** (§5.8): an oversized NAL unit is split across
//!   packets; each fragment carries two extra bytes before the data:
//!
//!   ```text
//!   FU indicator:  [F|NRI|Type=28]   (forbidden+NRI copied from the NAL)
//!   FU header:     [S|E|R|NAL type]  (S on first, E on last fragment)
//!   ```
//!
//! The RTP marker bit is set only on the last packet of an access unit —
//! the single-NAL packet, or the fragment carrying the End bit.

use base64::prelude::{BASE64_STANDARD, Engine as _};

use super::rtp::RtpHeader;

const MAX_UDP_PACKET_SIZE: usize = 65_535;
const IPV4_HEADER_SIZE: usize = 20;
const UDP_HEADER_SIZE: usize = 8;
const RTP_HEADER_SIZE: usize = 12;
const FU_SIZE: usize = 2;

/// Largest NAL fragment that fits the path MTU budget.
pub const MAX_RTP_DATA_SIZE: usize =
    MAX_UDP_PACKET_SIZE - IPV4_HEADER_SIZE - UDP_HEADER_SIZE - RTP_HEADER_SIZE - FU_SIZE;

/// Largest RTP packet this module ever produces.
pub const MAX_RTP_PACKET_LEN: usize = MAX_RTP_DATA_SIZE + RTP_HEADER_SIZE + FU_SIZE;

const NAL_TYPE_MASK: u8 = 0x1F;
const NAL_NRI_MASK: u8 = 0x60;
const FU_A_TYPE: u8 = 28;
const FU_START: u8 = 0x80;
const FU_END: u8 = 0x40;

const NAL_TYPE_SPS: u8 = 7;

/// Packetize one Annex B access unit (frame) into RTP packets.
///
/// Extracts NAL units from the start-code-delimited bitstream and
/// packetizes each one; the RTP marker bit lands on the frame's final
/// packet. The timestamp in `header` is not advanced — all packets of
/// one access unit share it, and the caller ticks the clock per frame.
pub fn packetize_frame(header: &mut RtpHeader, frame: &[u8], max_fragment: usize) -> Vec<Vec<u8>> {
    let nal_units = extract_nal_units(frame);
    let mut packets = Vec::new();

    for (i, nal) in nal_units.iter().enumerate() {
        let end_of_unit = i == nal_units.len() - 1;
        packetize_nal(header, nal, max_fragment, end_of_unit, &mut packets);
    }

    tracing::trace!(
        nal_count = nal_units.len(),
        rtp_packets = packets.len(),
        frame_bytes = frame.len(),
        seq = header.sequence(),
        ts = header.timestamp(),
        "frame packetized"
    );

    packets
}

/// Packetize a single NAL unit, appending packets to `out`.
///
/// `max_fragment` is the chunk limit (normally [`MAX_RTP_DATA_SIZE`]):
/// at or below it the NAL goes out whole with `marker = end_of_unit`;
/// above it the NAL header byte is stripped and the remainder is cut
/// into `max_fragment`-sized FU-A chunks, each packet consuming one
/// sequence number.
pub fn packetize_nal(
    header: &mut RtpHeader,
    nal_unit: &[u8],
    max_fragment: usize,
    end_of_unit: bool,
    out: &mut Vec<Vec<u8>>,
) {
    if nal_unit.is_empty() {
        return;
    }

    if nal_unit.len() <= max_fragment {
        // Single NAL Unit mode (RFC 6184 §5.6)
        out.push(header.packet(end_of_unit, nal_unit));
        return;
    }

    // FU-A fragmentation (RFC 6184 §5.8)
    let nal_header = nal_unit[0];
    let fu_indicator = (nal_header & NAL_NRI_MASK) | FU_A_TYPE;
    let payload = &nal_unit[1..];

    let mut offset = 0usize;
    let mut first = true;
    let fragments_before = out.len();

    while offset < payload.len() {
        let remaining = payload.len() - offset;
        let last_fragment = remaining <= max_fragment;
        let chunk = &payload[offset..offset + remaining.min(max_fragment)];

        let mut fu_header = nal_header & NAL_TYPE_MASK;
        if first {
            fu_header |= FU_START;
        }
        if last_fragment {
            fu_header |= FU_END;
        }

        let marker = end_of_unit && last_fragment;
        let mut packet = Vec::with_capacity(RTP_HEADER_SIZE + FU_SIZE + chunk.len());
        packet.extend_from_slice(&header.write(marker));
        packet.push(fu_indicator);
        packet.push(fu_header);
        packet.extend_from_slice(chunk);
        out.push(packet);

        offset += chunk.len();
        first = false;
    }

    tracing::trace!(
        nal_type = nal_header & NAL_TYPE_MASK,
        nal_size = nal_unit.len(),
        fragments = out.len() - fragments_before,
        "FU-A fragmented NAL unit"
    );
}

/// Extract NAL units from an H.264 Annex B bitstream.
///
/// Handles both 4-byte (`00 00 00 01`) and 3-byte (`00 00 01`) start
/// codes, including mixed usage within one buffer, and returns the NAL
/// bytes between them with the start codes stripped.
pub fn extract_nal_units(data: &[u8]) -> Vec<Vec<u8>> {
    // (nal_data_start_index, start_code_length)
    let mut starts: Vec<(usize, usize)> = Vec::new();
    let mut i = 0usize;

    while i < data.len() {
        if data.len() - i >= 4 && data[i..i + 4] == [0, 0, 0, 1] {
            starts.push((i + 4, 4));
            i += 4;
        } else if data.len() - i >= 3 && data[i..i + 3] == [0, 0, 1] {
            starts.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut nal_units = Vec::with_capacity(starts.len());
    for (idx, &(start, _)) in starts.iter().enumerate() {
        let end = match starts.get(idx + 1) {
            Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
            None => data.len(),
        };
        if start < end {
            nal_units.push(data[start..end].to_vec());
        }
    }

    nal_units
}

/// `profile-level-id` fmtp parameter from an SPS NAL (RFC 6184 §8.1):
/// bytes 1–3 are profile_idc, constraint flags, and level_idc.
pub fn profile_level_id(sps: &[u8]) -> Option<String> {
    if sps.len() < 4 || sps[0] & NAL_TYPE_MASK != NAL_TYPE_SPS {
        return None;
    }
    Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
}

/// `sprop-parameter-sets` fmtp parameter: base64 SPS and PPS, comma
/// separated (RFC 6184 §8.1).
pub fn sprop_parameter_sets(sps: &[u8], pps: &[u8]) -> String {
    format!(
        "{},{}",
        BASE64_STANDARD.encode(sps),
        BASE64_STANDARD.encode(pps)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> RtpHeader {
        RtpHeader::new(96, 0xAABBCCDD)
    }

    fn nal_of_size(size: usize) -> Vec<u8> {
        let mut nal = vec![0x65u8]; // IDR slice, NRI = 3
        nal.extend((1..size).map(|i| i as u8));
        nal
    }

    fn seq_of(packet: &[u8]) -> u16 {
        u16::from_be_bytes([packet[2], packet[3]])
    }

    // --- NAL extraction ---

    #[test]
    fn extract_single_nal_4byte_start_code() {
        let nals = extract_nal_units(&[0, 0, 0, 1, 0x65, 0xAA, 0xBB]);
        assert_eq!(nals, vec![vec![0x65, 0xAA, 0xBB]]);
    }

    #[test]
    fn extract_single_nal_3byte_start_code() {
        let nals = extract_nal_units(&[0, 0, 1, 0x67, 0x42, 0x00]);
        assert_eq!(nals, vec![vec![0x67, 0x42, 0x00]]);
    }

    #[test]
    fn extract_mixed_start_codes() {
        let mut data = vec![0, 0, 0, 1, 0x67, 0x42];
        data.extend_from_slice(&[0, 0, 1, 0x68, 0xCE]);
        let nals = extract_nal_units(&data);
        assert_eq!(nals, vec![vec![0x67, 0x42], vec![0x68, 0xCE]]);
    }

    #[test]
    fn extract_handles_garbage() {
        assert!(extract_nal_units(&[]).is_empty());
        assert!(extract_nal_units(&[0xFF, 0xFE, 0x00]).is_empty());
    }

    // --- Packetization ---

    #[test]
    fn small_nal_single_packet_with_marker() {
        let mut h = header();
        let mut out = Vec::new();
        packetize_nal(&mut h, &[0x65, 0xAA, 0xBB], 1400, true, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 12 + 3);
        assert_eq!(out[0][1] & 0x80, 0x80, "marker set");
        assert_eq!(&out[0][12..], &[0x65, 0xAA, 0xBB], "no FU bytes");
    }

    #[test]
    fn small_nal_not_last_in_unit_has_no_marker() {
        let mut h = header();
        let mut out = Vec::new();
        packetize_nal(&mut h, &[0x67, 0x42], 1400, false, &mut out);
        assert_eq!(out[0][1] & 0x80, 0);
    }

    #[test]
    fn fragments_reassemble_to_original() {
        // Boundary sizes around the fragment limit L.
        const L: usize = 16;
        for size in [L - 1, L, L + 1, 2 * L, 2 * L + 1] {
            let nal = nal_of_size(size);
            let mut h = header();
            let mut out = Vec::new();
            packetize_nal(&mut h, &nal, L, true, &mut out);

            if size <= L {
                assert_eq!(out.len(), 1, "size {size}: single packet");
                assert_eq!(&out[0][12..], &nal[..]);
                continue;
            }

            // Strip RTP header + FU indicator/header, concatenate.
            let mut reassembled = Vec::new();
            for pkt in &out {
                reassembled.extend_from_slice(&pkt[14..]);
            }
            assert_eq!(reassembled, nal[1..], "size {size}: payload bytes");
        }
    }

    #[test]
    fn fu_a_start_and_end_bits() {
        const L: usize = 16;
        let nal = nal_of_size(3 * L);
        let mut h = header();
        let mut out = Vec::new();
        packetize_nal(&mut h, &nal, L, true, &mut out);
        assert!(out.len() > 2);

        let starts = out.iter().filter(|p| p[13] & FU_START != 0).count();
        let ends = out.iter().filter(|p| p[13] & FU_END != 0).count();
        assert_eq!(starts, 1, "exactly one Start bit");
        assert_eq!(ends, 1, "exactly one End bit");
        assert_ne!(out[0][13] & FU_START, 0, "first fragment has Start");
        assert_ne!(out.last().unwrap()[13] & FU_END, 0, "last fragment has End");

        // Marker only on the End fragment.
        for (i, pkt) in out.iter().enumerate() {
            let expect = if i == out.len() - 1 { 0x80 } else { 0 };
            assert_eq!(pkt[1] & 0x80, expect, "marker on packet {i}");
        }
    }

    #[test]
    fn fu_indicator_preserves_nri() {
        let nal = nal_of_size(40); // 0x65: NRI = 0x60, type = 5
        let mut h = header();
        let mut out = Vec::new();
        packetize_nal(&mut h, &nal, 16, true, &mut out);

        for pkt in &out {
            assert_eq!(pkt[12], 0x60 | FU_A_TYPE, "FU indicator");
            assert_eq!(pkt[13] & NAL_TYPE_MASK, 5, "original NAL type");
        }
    }

    #[test]
    fn fragments_share_timestamp_and_consume_sequences() {
        let nal = nal_of_size(100);
        let mut h = header();
        let mut out = Vec::new();
        packetize_nal(&mut h, &nal, 16, true, &mut out);

        let ts0 = &out[0][4..8];
        let first_seq = seq_of(&out[0]);
        for (i, pkt) in out.iter().enumerate() {
            assert_eq!(&pkt[4..8], ts0, "timestamp constant across fragments");
            assert_eq!(seq_of(pkt), first_seq.wrapping_add(i as u16));
        }
    }

    #[test]
    fn frame_marker_on_last_nal_only() {
        let mut frame = vec![0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1E];
        frame.extend_from_slice(&[0, 0, 0, 1, 0x68, 0xCE, 0x38]);
        frame.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88, 0x80, 0x00]);

        let mut h = header();
        let out = packetize_frame(&mut h, &frame, 1400);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][1] & 0x80, 0);
        assert_eq!(out[1][1] & 0x80, 0);
        assert_eq!(out[2][1] & 0x80, 0x80);
    }

    #[test]
    fn mtu_budget() {
        assert_eq!(MAX_RTP_DATA_SIZE, 65_535 - 20 - 8 - 12 - 2);
        assert_eq!(MAX_RTP_PACKET_LEN, MAX_RTP_DATA_SIZE + 14);
    }

    // --- SDP helpers ---

    #[test]
    fn profile_level_id_from_sps() {
        let sps = [0x67, 0x42, 0x00, 0x1E, 0xAB];
        assert_eq!(profile_level_id(&sps).as_deref(), Some("42001e"));
        assert!(profile_level_id(&[0x68, 0xCE, 0x38, 0x80]).is_none());
        assert!(profile_level_id(&[0x67, 0x42]).is_none());
    }

    #[test]
    fn sprop_encodes_both_sets() {
        let sprop = sprop_parameter_sets(&[0x67, 0x42], &[0x68, 0xCE]);
        let (sps, pps) = sprop.split_once(',').expect("comma separated");
        assert_eq!(BASE64_STANDARD.decode(sps).unwrap(), vec![0x67, 0x42]);
        assert_eq!(BASE64_STANDARD.decode(pps).unwrap(), vec![0x68, 0xCE]);
    }
}
