//! Media packetization: RTP headers, RTCP Sender Reports, and H.264
//! FU-A fragmentation.
//!
//! The wire formats live here as pure byte-level encoders — explicit
//! shift/mask serialization, never native bit-field layouts, so the
//! output is identical on every platform.

pub mod h264;
pub mod rtcp;
pub mod rtp;

/// The codec carried by the server's single stream.
///
/// Fixed payload-type mapping (RFC 3551 plus the conventional dynamic
/// assignments): H.264 → 96, Opus → 111, PCMU → 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// H.264 video, 90 kHz clock, packetized per RFC 6184.
    H264,
    /// Opus audio, 48 kHz clock, stereo (RFC 7587).
    Opus,
    /// G.711 µ-law audio, 8 kHz clock (RFC 3551 §4.5.14).
    Pcmu,
}

impl MediaKind {
    /// RTP payload type number for the `PT` header field and SDP `m=` line.
    pub fn payload_type(self) -> u8 {
        match self {
            Self::H264 => 96,
            Self::Opus => 111,
            Self::Pcmu => 0,
        }
    }

    /// RTP media clock rate in Hz.
    pub fn clock_rate(self) -> u32 {
        match self {
            Self::H264 => 90_000,
            Self::Opus => 48_000,
            Self::Pcmu => 8_000,
        }
    }

    /// RTP timestamp advance per frame.
    ///
    /// Video ticks a fixed per-frame step (30 fps at 90 kHz); audio ticks
    /// the samples-per-frame of a 20 ms packet at the codec clock rate.
    pub fn timestamp_step(self) -> u32 {
        match self {
            Self::H264 => 3_000,
            Self::Opus => 960,
            Self::Pcmu => 160,
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, Self::H264)
    }

    /// SDP media type for the `m=` line.
    pub fn media_type(self) -> &'static str {
        if self.is_video() { "video" } else { "audio" }
    }

    /// Codec part of the SDP `a=rtpmap` attribute, including the clock
    /// rate and (for audio) channel count.
    pub fn rtpmap(self) -> &'static str {
        match self {
            Self::H264 => "H264/90000",
            Self::Opus => "opus/48000/2",
            Self::Pcmu => "PCMU/8000",
        }
    }
}
