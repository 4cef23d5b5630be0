//! Errors returned while decoding CSI records.

/// Error returned by the header codec, the bitstream decoder and the frame
/// reader.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Fewer bytes are available than a fixed-size field requires.
    #[error("not enough bytes: need {needed}, got {got}")]
    ShortBuffer { needed: usize, got: usize },
    /// The bitstream ends before every sample has been extracted.
    #[error("truncated CSI bitstream: need {needed} bytes, got {got}")]
    TruncatedStream { needed: usize, got: usize },
    /// A declared length does not fit the bytes that are actually there.
    #[error("invalid {field} {declared}: only {available} bytes available")]
    InvalidLength {
        field: &'static str,
        declared: usize,
        available: usize,
    },
    /// Antenna or tone count is zero or larger than the protocol allows.
    #[error("unsupported geometry: nr={nr} nc={nc} num_tones={num_tones}")]
    UnsupportedGeometry { nr: u8, nc: u8, num_tones: u8 },
    /// The matrix handed to the packer does not have `(nr * nc, num_tones)` shape.
    #[error("matrix shape {got:?} does not match geometry {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// A component does not fit in the 10-bit two's complement range.
    #[error("component {0} out of range")]
    ComponentOutOfRange(i16),
}

impl Error {
    /// Whether the error leaves the stream position intact, so that the
    /// following frame can still be read.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream { .. } | Self::UnsupportedGeometry { .. }
        )
    }
}
