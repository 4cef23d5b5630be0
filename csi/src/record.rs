//! Decoded CSI records.

use ndarray::{Array2, ArrayView1};
use num_complex::Complex;

use crate::{bitstream, header::CsiHeader, Error};

/// A CSI header together with its decoded matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsiRecord {
    header: CsiHeader,
    csi: Option<Array2<Complex<i16>>>,
}

impl CsiRecord {
    /// Decodes the bitstream in `csi` (starting at `start_offset`) according
    /// to `header`.
    ///
    /// No bits are read when `header.csi_len` is 0; the record then carries
    /// no matrix regardless of `csi`.
    pub fn decode(header: CsiHeader, csi: &[u8], start_offset: usize) -> Result<Self, Error> {
        let csi = if header.has_csi() {
            Some(bitstream::decode(csi, header.geometry(), start_offset)?)
        } else {
            None
        };

        Ok(Self { header, csi })
    }

    pub fn header(&self) -> &CsiHeader {
        &self.header
    }

    /// The CSI matrix, one row per antenna pair (`tx * nr + rx`) and one
    /// column per subcarrier. `None` if the frame carried no CSI.
    pub fn csi(&self) -> Option<&Array2<Complex<i16>>> {
        self.csi.as_ref()
    }

    /// Number of antenna pairs with samples, 0 without CSI.
    pub fn pairs(&self) -> usize {
        self.csi.as_ref().map_or(0, |csi| csi.nrows())
    }

    /// Samples of a single (transmit, receive) antenna pair.
    pub fn pair(&self, tx: u8, rx: u8) -> Option<ArrayView1<'_, Complex<i16>>> {
        let csi = self.csi.as_ref()?;
        if tx >= self.header.nc || rx >= self.header.nr {
            return None;
        }
        Some(csi.row(self.header.geometry().pair_index(tx, rx)))
    }

    /// Iterates over the antenna pairs in row order.
    pub fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, Complex<i16>>> {
        self.csi.iter().flat_map(|csi| csi.rows())
    }

    pub fn into_parts(self) -> (CsiHeader, Option<Array2<Complex<i16>>>) {
        (self.header, self.csi)
    }
}
