//! Metadata header reported by the Atheros CSI driver in front of every
//! CSI bitstream.
//!
//! The header is 25 bytes, packed without padding, little endian:
//!
//! ```c
//! struct csi_status {
//!     uint64 tstamp;      // TSF timestamp (us)
//!     uint16 csi_len;     // CSI bitstream length in bytes
//!     uint16 channel;     // center frequency (MHz)
//!     uint8  phyerr;      // 0 if received without error
//!     uint8  noise;       // noise floor (dB)
//!     uint8  rate;
//!     uint8  chanBW;      // 0: 20 MHz, 1: 40 MHz
//!     uint8  num_tones;
//!     uint8  nr;          // receive antennas
//!     uint8  nc;          // transmit antennas
//!     uint8  rssi;
//!     uint8  rssi_0;
//!     uint8  rssi_1;
//!     uint8  rssi_2;
//!     uint16 payload_len;
//! } __attribute__((packed));
//! ```

use uom::si::{
    f64::{Frequency, Time},
    frequency::megahertz,
    time::microsecond,
};

use crate::{
    bitstream::Geometry,
    ieee80211::{Bandwidth, InvalidBandwidth},
    Error,
};

/// Serialized header size in bytes.
pub const HEADER_LEN: usize = 25;

/// A decoded CSI metadata header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct CsiHeader {
    /// TSF timestamp of the received packet in microseconds.
    pub timestamp: u64,
    /// Length of the CSI bitstream in bytes.
    pub csi_len: u16,
    /// Center frequency of the channel in MHz.
    pub channel: u16,
    /// PHY error code, 0 if the packet was received successfully.
    pub phyerr: u8,
    /// Noise floor in dB.
    pub noise: u8,
    /// Data rate of the received packet.
    pub rate: u8,
    /// Channel bandwidth code, see [`Bandwidth`].
    pub chan_bw: u8,
    /// Number of subcarriers.
    pub num_tones: u8,
    /// Number of receive antennas.
    pub nr: u8,
    /// Number of transmit antennas.
    pub nc: u8,
    /// RSSI of all active chains combined.
    pub rssi: u8,
    pub rssi_0: u8,
    pub rssi_1: u8,
    pub rssi_2: u8,
    /// Length of the application payload in bytes.
    pub payload_len: u16,
}

impl CsiHeader {
    /// Parses a header from the first [`HEADER_LEN`] bytes of `b`.
    ///
    /// ```
    /// # use csi::header::{CsiHeader, HEADER_LEN};
    /// let mut b = [0u8; HEADER_LEN];
    /// b[8..10].copy_from_slice(&840u16.to_le_bytes());
    /// b[10..12].copy_from_slice(&2437u16.to_le_bytes());
    ///
    /// let header = CsiHeader::from_slice(&b).unwrap();
    /// assert_eq!(header.csi_len, 840);
    /// assert_eq!(header.channel, 2437);
    /// ```
    pub fn from_slice(b: &[u8]) -> Result<Self, Error> {
        if b.len() < HEADER_LEN {
            return Err(Error::ShortBuffer {
                needed: HEADER_LEN,
                got: b.len(),
            });
        }

        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&b[0..8]);

        Ok(Self {
            timestamp: u64::from_le_bytes(timestamp),
            csi_len: u16::from_le_bytes([b[8], b[9]]),
            channel: u16::from_le_bytes([b[10], b[11]]),
            phyerr: b[12],
            noise: b[13],
            rate: b[14],
            chan_bw: b[15],
            num_tones: b[16],
            nr: b[17],
            nc: b[18],
            rssi: b[19],
            rssi_0: b[20],
            rssi_1: b[21],
            rssi_2: b[22],
            payload_len: u16::from_le_bytes([b[23], b[24]]),
        })
    }

    /// Serializes the header. Inverse of [`CsiHeader::from_slice`].
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];

        out[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        out[8..10].copy_from_slice(&self.csi_len.to_le_bytes());
        out[10..12].copy_from_slice(&self.channel.to_le_bytes());
        out[12] = self.phyerr;
        out[13] = self.noise;
        out[14] = self.rate;
        out[15] = self.chan_bw;
        out[16] = self.num_tones;
        out[17] = self.nr;
        out[18] = self.nc;
        out[19] = self.rssi;
        out[20] = self.rssi_0;
        out[21] = self.rssi_1;
        out[22] = self.rssi_2;
        out[23..25].copy_from_slice(&self.payload_len.to_le_bytes());

        out
    }

    /// Whether a CSI bitstream follows the header.
    pub const fn has_csi(&self) -> bool {
        self.csi_len > 0
    }

    /// Antenna and tone counts of the CSI matrix.
    pub const fn geometry(&self) -> Geometry {
        Geometry {
            nr: self.nr,
            nc: self.nc,
            num_tones: self.num_tones,
        }
    }

    /// Returns the channel bandwidth.
    pub fn bandwidth(&self) -> Result<Bandwidth, InvalidBandwidth> {
        Bandwidth::try_from(self.chan_bw)
    }

    /// TSF timestamp.
    pub fn tsf(&self) -> Time {
        Time::new::<microsecond>(self.timestamp as f64)
    }

    /// Center frequency of the channel.
    pub fn frequency(&self) -> Frequency {
        Frequency::new::<megahertz>(self.channel as f64)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use uom::si::{frequency::gigahertz, time::second};

    use super::{CsiHeader, HEADER_LEN};
    use crate::{ieee80211::Bandwidth, Error};

    fn sample() -> CsiHeader {
        CsiHeader {
            timestamp: 0x0102_0304_0506_0708,
            csi_len: 840,
            channel: 2437,
            phyerr: 0,
            noise: 0x9c,
            rate: 0x8b,
            chan_bw: 0,
            num_tones: 56,
            nr: 3,
            nc: 2,
            rssi: 41,
            rssi_0: 35,
            rssi_1: 37,
            rssi_2: 33,
            payload_len: 766,
        }
    }

    #[test]
    fn field_layout() {
        let b = sample().to_bytes();

        assert_eq!(b[0..8], [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(b[8..10], 840u16.to_le_bytes());
        assert_eq!(b[10..12], 2437u16.to_le_bytes());
        assert_eq!(b[13], 0x9c);
        assert_eq!(b[16..19], [56, 3, 2]);
        assert_eq!(b[19..23], [41, 35, 37, 33]);
        assert_eq!(b[23..25], 766u16.to_le_bytes());
    }

    #[test]
    fn short_buffer() {
        let b = sample().to_bytes();

        assert_eq!(
            CsiHeader::from_slice(&b[..24]),
            Err(Error::ShortBuffer {
                needed: HEADER_LEN,
                got: 24
            })
        );
        assert!(CsiHeader::from_slice(&[]).is_err());
    }

    #[test]
    fn ignores_trailing_bytes() {
        let mut b = sample().to_bytes().to_vec();
        b.extend_from_slice(&[0xff; 10]);

        assert_eq!(CsiHeader::from_slice(&b), Ok(sample()));
    }

    #[test]
    fn derived_units() {
        let header = sample();

        assert_eq!(header.bandwidth(), Ok(Bandwidth::Bw20));
        assert!((header.frequency().get::<gigahertz>() - 2.437).abs() < 1e-9);
        assert!((header.tsf().get::<second>() - 0x0102_0304_0506_0708u64 as f64 * 1e-6).abs() < 1.);
        assert_eq!(header.geometry().pairs(), 6);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            timestamp in any::<u64>(),
            lens in any::<[u16; 3]>(),
            bytes in any::<[u8; 11]>(),
        ) {
            let header = CsiHeader {
                timestamp,
                csi_len: lens[0],
                channel: lens[1],
                phyerr: bytes[0],
                noise: bytes[1],
                rate: bytes[2],
                chan_bw: bytes[3],
                num_tones: bytes[4],
                nr: bytes[5],
                nc: bytes[6],
                rssi: bytes[7],
                rssi_0: bytes[8],
                rssi_1: bytes[9],
                rssi_2: bytes[10],
                payload_len: lens[2],
            };

            prop_assert_eq!(CsiHeader::from_slice(&header.to_bytes()), Ok(header));
        }
    }
}
