//! CSI processing.

use ndarray::{Array, ArrayBase, Axis, Data, Dimension, Ix1};
use ndarray_stats::QuantileExt;
use num_complex::Complex;

use crate::record::CsiRecord;

/// Magnitude of every sample.
pub fn magnitude<D: Dimension>(
    csi: &ArrayBase<impl Data<Elem = Complex<i16>>, D>,
) -> Array<f64, D> {
    csi.mapv(|z| Complex::new(z.re as f64, z.im as f64).norm())
}

/// Magnitude of every sample in dB (`20 * log10(|z|)`).
///
/// Zero samples map to negative infinity.
pub fn magnitude_db<D: Dimension>(
    csi: &ArrayBase<impl Data<Elem = Complex<i16>>, D>,
) -> Array<f64, D> {
    magnitude(csi).mapv(|m| 20. * m.log10())
}

/// Summary statistics over the magnitudes of one antenna pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStats {
    pub mean: f64,
    /// Population variance.
    pub variance: f64,
    pub max: f64,
    pub min: f64,
}

impl PairStats {
    /// Computes statistics over `magnitudes`. Returns `None` for an empty
    /// input or if any value is NaN.
    pub fn new(magnitudes: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Option<Self> {
        Some(Self {
            mean: magnitudes.mean()?,
            variance: magnitudes.var(0.),
            max: *magnitudes.max().ok()?,
            min: *magnitudes.min().ok()?,
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Statistics for every antenna pair of a record, in row order.
///
/// ```
/// # use csi::{bitstream::{encode, Geometry}, header::CsiHeader, record::CsiRecord};
/// # use ndarray::Array2;
/// # use num_complex::Complex;
/// let g = Geometry::new(1, 1, 2);
/// let m = Array2::from_shape_vec((1, 2), vec![Complex::new(3, 4), Complex::new(0, 0)]).unwrap();
/// let b = encode(&m, g).unwrap();
/// let header = CsiHeader { csi_len: b.len() as u16, nr: 1, nc: 1, num_tones: 2, ..Default::default() };
/// let record = CsiRecord::decode(header, &b, 0).unwrap();
///
/// let stats = csi::proc::pair_stats(&record);
/// assert_eq!(stats[0].mean, 2.5);
/// assert_eq!(stats[0].range(), 5.);
/// ```
pub fn pair_stats(record: &CsiRecord) -> Vec<PairStats> {
    let Some(csi) = record.csi() else {
        return vec![];
    };

    magnitude(csi)
        .axis_iter(Axis(0))
        .filter_map(|row| PairStats::new(&row))
        .collect()
}

/// Spread between the strongest and weakest subcarrier of every antenna
/// pair, in dB.
///
/// A pair with a zero sample has an infinite spread.
pub fn db_range(record: &CsiRecord) -> Vec<f64> {
    record
        .rows()
        .filter_map(|row| {
            let db = magnitude_db(&row);
            Some(db.max().ok()? - db.min().ok()?)
        })
        .collect()
}
