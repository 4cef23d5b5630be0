//! HT channel widths reported in the `chan_bw` header field.

/// Error returned when the `chan_bw` header field is not a known bandwidth.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("invalid bandwidth code {0}")]
pub struct InvalidBandwidth(pub u8);

/// Channel bandwidth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Bandwidth {
    /// 20 MHz.
    Bw20,
    /// 40 MHz.
    Bw40,
}

impl Bandwidth {
    pub const fn mhz(&self) -> u8 {
        match self {
            Bandwidth::Bw20 => 20,
            Bandwidth::Bw40 => 40,
        }
    }

    /// Number of HT subcarriers reported for this bandwidth.
    ///
    /// | PHY standard     | Subcarrier range       | Subcarriers |
    /// |------------------|------------------------|-------------|
    /// | 802.11n, 20 MHz  | –28 to –1, +1 to +28   | 56          |
    /// | 802.11n, 40 MHz  | –58 to –2, +2 to +58   | 114         |
    pub const fn num_tones(&self) -> u8 {
        match self {
            Bandwidth::Bw20 => 56,
            Bandwidth::Bw40 => 114,
        }
    }
}

impl TryFrom<u8> for Bandwidth {
    type Error = InvalidBandwidth;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Bw20),
            1 => Ok(Self::Bw40),
            other => Err(InvalidBandwidth(other)),
        }
    }
}

impl From<Bandwidth> for u8 {
    fn from(value: Bandwidth) -> Self {
        match value {
            Bandwidth::Bw20 => 0,
            Bandwidth::Bw40 => 1,
        }
    }
}
