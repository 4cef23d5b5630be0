//! Decoder for Channel State Information reported by the Atheros CSI
//! driver, either read live from the capture device or from a log file.
//!
//! ```
//! use csi::frame::{FrameReader, Framing, LogWriter, Policy};
//! use csi::{bitstream::{encode, Geometry}, header::CsiHeader};
//! use ndarray::Array2;
//! use num_complex::Complex;
//!
//! let g = Geometry::new(2, 1, 56);
//! let m = Array2::from_elem(g.shape(), Complex::new(17, -3));
//! let header = CsiHeader { nr: 2, nc: 1, num_tones: 56, ..Default::default() };
//!
//! let mut log = LogWriter::new(vec![]);
//! log.write_record(&header, &encode(&m, g)?, &[])?;
//! let log = log.into_inner();
//!
//! for record in FrameReader::new(&log, Framing::File).records(Policy::Abort) {
//!     assert_eq!(record?.csi(), Some(&m));
//! }
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

pub mod bitstream;
mod error;
pub mod frame;
pub mod header;
pub mod ieee80211;
pub mod proc;
pub mod record;

pub use error::Error;
pub use frame::{FrameReader, FrameView, Framing, Policy};
pub use header::CsiHeader;
pub use record::CsiRecord;
