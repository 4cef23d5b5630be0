//! Bit-packed CSI matrix.
//!
//! The driver packs every complex sample as two 10-bit two's complement
//! integers, imaginary part first, into a stream of little endian 16-bit
//! words. The least significant bits of a word are consumed first, and a
//! component straddling a word boundary continues in the low bits of the
//! next word.
//!
//! Samples appear subcarrier by subcarrier, and within a subcarrier for
//! every transmit antenna, for every receive antenna:
//!
//! ```text
//! for t in 0..num_tones { for c in 0..nc { for r in 0..nr { imag, real } } }
//! ```

use ndarray::Array2;
use num_complex::Complex;

use crate::Error;

/// Number of bits per real or imaginary component.
pub const BIT_RESOLUTION: u32 = 10;

/// Highest number of transmit or receive antennas.
pub const MAX_ANTENNAS: u8 = 3;

/// Highest number of subcarriers (802.11n, 40 MHz).
pub const MAX_TONES: u8 = 114;

const MASK: u32 = (1 << BIT_RESOLUTION) - 1;
const SIGN_BIT: u16 = 1 << (BIT_RESOLUTION - 1);
const MIN_COMPONENT: i16 = -(1 << (BIT_RESOLUTION - 1));
const MAX_COMPONENT: i16 = (1 << (BIT_RESOLUTION - 1)) - 1;

/// Dimensions of a CSI matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Geometry {
    /// Number of receive antennas.
    pub nr: u8,
    /// Number of transmit antennas.
    pub nc: u8,
    /// Number of subcarriers.
    pub num_tones: u8,
}

impl Geometry {
    pub const fn new(nr: u8, nc: u8, num_tones: u8) -> Self {
        Self { nr, nc, num_tones }
    }

    /// Number of (transmit, receive) antenna pairs.
    pub const fn pairs(&self) -> usize {
        self.nr as usize * self.nc as usize
    }

    /// Number of 10-bit components in the bitstream.
    pub const fn components(&self) -> usize {
        self.pairs() * self.num_tones as usize * 2
    }

    /// Number of bytes the bitstream occupies, rounded up to whole 16-bit
    /// words.
    ///
    /// ```
    /// # use csi::bitstream::Geometry;
    /// // 56 * 3 * 2 * 2 * 10 bits = 420 words
    /// assert_eq!(Geometry::new(3, 2, 56).required_len(), 840);
    /// // 20 bits still need two words
    /// assert_eq!(Geometry::new(1, 1, 1).required_len(), 4);
    /// ```
    pub const fn required_len(&self) -> usize {
        let bits = self.components() * BIT_RESOLUTION as usize;
        bits.div_ceil(16) * 2
    }

    /// Shape of the decoded matrix: one row per antenna pair, one column per
    /// subcarrier.
    pub const fn shape(&self) -> (usize, usize) {
        (self.pairs(), self.num_tones as usize)
    }

    /// Row of the (transmit, receive) antenna pair.
    pub const fn pair_index(&self, tx: u8, rx: u8) -> usize {
        tx as usize * self.nr as usize + rx as usize
    }

    /// Checks that every dimension is non-zero and within protocol bounds.
    pub const fn validate(&self) -> Result<(), Error> {
        let antennas_ok = self.nr > 0
            && self.nc > 0
            && self.nr <= MAX_ANTENNAS
            && self.nc <= MAX_ANTENNAS;
        let tones_ok = self.num_tones > 0 && self.num_tones <= MAX_TONES;

        if antennas_ok && tones_ok {
            Ok(())
        } else {
            Err(Error::UnsupportedGeometry {
                nr: self.nr,
                nc: self.nc,
                num_tones: self.num_tones,
            })
        }
    }
}

/// Interprets the low 10 bits of `raw` as a two's complement integer.
///
/// ```
/// # use csi::bitstream::sign_extend;
/// assert_eq!(sign_extend(511), 511);
/// assert_eq!(sign_extend(512), -512);
/// assert_eq!(sign_extend(1023), -1);
/// ```
pub const fn sign_extend(raw: u16) -> i16 {
    let v = raw & MASK as u16;
    if v & SIGN_BIT != 0 {
        v as i16 - (1 << BIT_RESOLUTION)
    } else {
        v as i16
    }
}

fn read_word(b: &[u8], at: usize) -> u32 {
    u16::from_le_bytes([b[at], b[at + 1]]) as u32
}

/// Unpacks the CSI matrix from `payload`, starting at `start_offset`.
///
/// Returns an array of shape `(nr * nc, num_tones)`; row `tx * nr + rx`
/// holds the samples of that antenna pair.
///
/// ```
/// # use csi::bitstream::{decode, Geometry};
/// let g = Geometry::new(3, 2, 56);
/// let m = decode(&vec![0; g.required_len()], g, 0).unwrap();
/// assert_eq!(m.dim(), (6, 56));
/// ```
pub fn decode(
    payload: &[u8],
    geometry: Geometry,
    start_offset: usize,
) -> Result<Array2<Complex<i16>>, Error> {
    geometry.validate()?;

    let needed = geometry.required_len();
    let got = payload.len().saturating_sub(start_offset);
    if got < needed {
        return Err(Error::TruncatedStream { needed, got });
    }

    let b = &payload[start_offset..start_offset + needed];
    let Geometry { nr, nc, num_tones } = geometry;
    let mut out = Array2::from_elem(geometry.shape(), Complex::new(0, 0));

    let mut acc = read_word(b, 0);
    let mut bits_left = 16;
    let mut cursor = 2;

    // `b` holds exactly `needed` bytes, so a refill never runs past the end
    let mut next = || {
        if bits_left < BIT_RESOLUTION {
            acc |= read_word(b, cursor) << bits_left;
            bits_left += 16;
            cursor += 2;
        }
        let v = sign_extend((acc & MASK) as u16);
        acc >>= BIT_RESOLUTION;
        bits_left -= BIT_RESOLUTION;
        v
    };

    for t in 0..num_tones as usize {
        for c in 0..nc {
            for r in 0..nr {
                let im = next();
                let re = next();
                out[[geometry.pair_index(c, r), t]] = Complex::new(re, im);
            }
        }
    }

    Ok(out)
}

/// Packs `matrix` into the bitstream format. Inverse of [`decode`] with a
/// start offset of 0.
pub fn encode(matrix: &Array2<Complex<i16>>, geometry: Geometry) -> Result<Vec<u8>, Error> {
    geometry.validate()?;

    if matrix.dim() != geometry.shape() {
        return Err(Error::ShapeMismatch {
            expected: geometry.shape(),
            got: matrix.dim(),
        });
    }

    let Geometry { nr, nc, num_tones } = geometry;
    let mut out = Vec::with_capacity(geometry.required_len());
    let mut acc = 0u32;
    let mut bits = 0;

    let mut push = |v: i16| -> Result<(), Error> {
        if !(MIN_COMPONENT..=MAX_COMPONENT).contains(&v) {
            return Err(Error::ComponentOutOfRange(v));
        }
        acc |= (v as u16 as u32 & MASK) << bits;
        bits += BIT_RESOLUTION;
        while bits >= 16 {
            out.extend_from_slice(&(acc as u16).to_le_bytes());
            acc >>= 16;
            bits -= 16;
        }
        Ok(())
    };

    for t in 0..num_tones as usize {
        for c in 0..nc {
            for r in 0..nr {
                let z = matrix[[geometry.pair_index(c, r), t]];
                push(z.im)?;
                push(z.re)?;
            }
        }
    }

    if bits > 0 {
        out.extend_from_slice(&(acc as u16).to_le_bytes());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use num_complex::Complex;
    use proptest::prelude::*;

    use super::{decode, encode, sign_extend, Geometry, BIT_RESOLUTION};
    use crate::Error;

    #[test]
    fn sign_extension() {
        for v in 0..1024u16 {
            let expected = if v < 512 { v as i16 } else { v as i16 - 1024 };
            assert_eq!(sign_extend(v), expected, "raw {v}");
        }
    }

    #[test]
    fn all_zero_payload() {
        let g = Geometry::new(3, 2, 56);
        let m = decode(&vec![0; g.required_len()], g, 0).unwrap();

        assert_eq!(m.dim(), (6, 56));
        assert!(m.iter().all(|z| *z == Complex::new(0, 0)));
    }

    #[test]
    fn extreme_first_sample() {
        let g = Geometry::new(3, 2, 56);
        let mut b = vec![0u8; g.required_len()];
        // imag = -512 (0b10_0000_0000) in bits 0..10, real = 511 in bits 10..20
        let bits: u32 = 0x200 | (0x1ff << 10);
        b[0..2].copy_from_slice(&(bits as u16).to_le_bytes());
        b[2..4].copy_from_slice(&((bits >> 16) as u16).to_le_bytes());

        let m = decode(&b, g, 0).unwrap();

        assert_eq!(m[[0, 0]], Complex::new(511, -512));
        assert_eq!(m.iter().filter(|z| **z != Complex::new(0, 0)).count(), 1);
    }

    #[test]
    fn traversal_order() {
        let g = Geometry::new(2, 2, 3);
        // value encodes (tone, pair) so misplaced samples are obvious
        let m = Array2::from_shape_fn(g.shape(), |(pair, t)| {
            Complex::new((t * 10 + pair) as i16, -((t * 10 + pair) as i16))
        });
        let b = encode(&m, g).unwrap();

        // second component in the stream is the real part of (t=0, c=0, r=0),
        // the third is the imaginary part of (t=0, c=0, r=1)
        let bits = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        assert_eq!(sign_extend((bits >> BIT_RESOLUTION) as u16), 0);
        assert_eq!(sign_extend((bits >> (2 * BIT_RESOLUTION)) as u16), -1);

        assert_eq!(decode(&b, g, 0).unwrap(), m);
    }

    #[test]
    fn start_offset() {
        let g = Geometry::new(1, 1, 4);
        let m = Array2::from_shape_fn(g.shape(), |(_, t)| Complex::new(t as i16, -(t as i16)));
        let mut b = vec![0xaa; 25];
        b.extend(encode(&m, g).unwrap());

        assert_eq!(decode(&b, g, 25).unwrap(), m);
    }

    #[test]
    fn truncated() {
        let g = Geometry::new(3, 2, 56);
        let b = vec![0u8; g.required_len() - 1];

        assert_eq!(
            decode(&b, g, 0),
            Err(Error::TruncatedStream {
                needed: 840,
                got: 839
            })
        );
        assert_eq!(
            decode(&b, g, 1000),
            Err(Error::TruncatedStream {
                needed: 840,
                got: 0
            })
        );
    }

    #[test]
    fn unsupported_geometry() {
        let b = vec![0u8; 4096];

        for g in [
            Geometry::new(0, 1, 56),
            Geometry::new(1, 0, 56),
            Geometry::new(1, 1, 0),
            Geometry::new(4, 1, 56),
            Geometry::new(1, 1, 115),
        ] {
            assert!(matches!(
                decode(&b, g, 0),
                Err(Error::UnsupportedGeometry { .. })
            ));
        }
    }

    #[test]
    fn encode_rejects_bad_input() {
        let g = Geometry::new(1, 1, 2);

        let wrong_shape = Array2::from_elem((2, 2), Complex::new(0, 0));
        assert_eq!(
            encode(&wrong_shape, g),
            Err(Error::ShapeMismatch {
                expected: (1, 2),
                got: (2, 2)
            })
        );

        let too_large = Array2::from_elem((1, 2), Complex::new(512, 0));
        assert_eq!(encode(&too_large, g), Err(Error::ComponentOutOfRange(512)));
    }

    fn matrix_strategy() -> impl Strategy<Value = (Geometry, Array2<Complex<i16>>)> {
        (1u8..=3, 1u8..=3, 1u8..=114).prop_flat_map(|(nr, nc, num_tones)| {
            let g = Geometry::new(nr, nc, num_tones);
            let (rows, cols) = g.shape();
            proptest::collection::vec((-512i16..=511, -512i16..=511), rows * cols).prop_map(
                move |v| {
                    let samples = v.into_iter().map(|(re, im)| Complex::new(re, im)).collect();
                    (g, Array2::from_shape_vec((rows, cols), samples).unwrap())
                },
            )
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip((g, m) in matrix_strategy()) {
            let b = encode(&m, g).unwrap();
            prop_assert_eq!(b.len(), g.required_len());
            prop_assert_eq!(decode(&b, g, 0).unwrap(), m);
        }

        #[test]
        fn prop_short_buffer_never_panics(
            (g, m) in matrix_strategy(),
            cut in 1usize..64,
        ) {
            let b = encode(&m, g).unwrap();
            let short = &b[..b.len().saturating_sub(cut)];
            let is_truncated = matches!(decode(short, g, 0), Err(Error::TruncatedStream { .. }));
            prop_assert!(is_truncated);
        }
    }
}
