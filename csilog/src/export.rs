//! CSV exporters over a stream of decoded records.

use std::io::Write;

use csi::{
    proc::{magnitude, pair_stats},
    CsiRecord,
};
use tracing::debug;

/// Turns records into CSV rows.
pub trait Exporter {
    /// Column names.
    fn header(&self) -> Vec<String>;

    /// The row for `record`, or `None` if the record does not belong in
    /// the table.
    fn row(&self, record: &CsiRecord) -> Option<Vec<String>>;
}

/// Size of a magnitude table. Rows are only produced for records with
/// exactly this many antenna pairs and subcarriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub pairs: usize,
    pub tones: usize,
}

impl Shape {
    fn matches(&self, record: &CsiRecord) -> bool {
        record
            .csi()
            .is_some_and(|csi| csi.dim() == (self.pairs, self.tones))
    }
}

/// One column per (pair, subcarrier) holding the rounded magnitude.
#[derive(Debug, Clone, Copy)]
pub struct MagnitudeTable(pub Shape);

impl Exporter for MagnitudeTable {
    fn header(&self) -> Vec<String> {
        let Shape { pairs, tones } = self.0;
        (0..pairs)
            .flat_map(|p| (0..tones).map(move |t| format!("{p}-{t}")))
            .collect()
    }

    fn row(&self, record: &CsiRecord) -> Option<Vec<String>> {
        if !self.0.matches(record) {
            return None;
        }
        let mag = magnitude(record.csi()?);
        Some(mag.iter().map(|m| (m.round() as i64).to_string()).collect())
    }
}

/// Average and variance of every pair, then max, min and range of every
/// pair, truncated to integers. Any record with `pairs` antenna pairs gets a
/// row, whatever its subcarrier count.
#[derive(Debug, Clone, Copy)]
pub struct StatsSummary {
    pub pairs: usize,
}

impl Exporter for StatsSummary {
    fn header(&self) -> Vec<String> {
        let pairs = self.pairs;
        let mut out = vec![];
        out.extend((0..pairs).map(|i| format!("Average-{i}")));
        out.extend((0..pairs).map(|i| format!("Variance-{i}")));
        for i in 0..pairs {
            out.extend([format!("Max-{i}"), format!("Min-{i}"), format!("Range-{i}")]);
        }
        out
    }

    fn row(&self, record: &CsiRecord) -> Option<Vec<String>> {
        if record.csi().is_none() || record.pairs() != self.pairs {
            return None;
        }
        let stats = pair_stats(record);
        let int = |v: f64| (v as i64).to_string();

        let mut out = vec![];
        out.extend(stats.iter().map(|s| int(s.mean)));
        out.extend(stats.iter().map(|s| int(s.variance)));
        for s in &stats {
            out.extend([int(s.max), int(s.min), int(s.range())]);
        }
        Some(out)
    }
}

/// Counts reported by [`export`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub records: usize,
    pub rows: usize,
}

/// Writes one row per matching record to `out`, preceded by the header row
/// if `write_header` is set.
pub fn export<W: Write>(
    records: impl IntoIterator<Item = Result<CsiRecord, csi::Error>>,
    exporter: &dyn Exporter,
    out: W,
    write_header: bool,
) -> anyhow::Result<Summary> {
    let mut writer = csv::Writer::from_writer(out);
    let mut summary = Summary::default();

    if write_header {
        writer.write_record(exporter.header())?;
    }

    for record in records {
        let record = record?;
        summary.records += 1;

        match exporter.row(&record) {
            Some(row) => {
                writer.write_record(row)?;
                summary.rows += 1;
            }
            None => debug!(
                timestamp = record.header().timestamp,
                pairs = record.pairs(),
                "record does not match the table shape"
            ),
        }
    }

    writer.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use csi::{
        bitstream::{encode, Geometry},
        CsiHeader, CsiRecord,
    };
    use ndarray::Array2;
    use num_complex::Complex;

    use super::{export, Exporter, MagnitudeTable, Shape, StatsSummary};

    fn record(nr: u8, nc: u8, num_tones: u8, z: Complex<i16>) -> CsiRecord {
        let g = Geometry::new(nr, nc, num_tones);
        let b = encode(&Array2::from_elem(g.shape(), z), g).unwrap();
        let header = CsiHeader {
            csi_len: b.len() as u16,
            nr,
            nc,
            num_tones,
            ..Default::default()
        };
        CsiRecord::decode(header, &b, 0).unwrap()
    }

    #[test]
    fn magnitude_table() {
        let table = MagnitudeTable(Shape { pairs: 2, tones: 3 });

        assert_eq!(
            table.header(),
            ["0-0", "0-1", "0-2", "1-0", "1-1", "1-2"]
        );
        assert_eq!(
            table.row(&record(2, 1, 3, Complex::new(3, 4))).unwrap(),
            ["5"; 6]
        );
        assert!(table.row(&record(1, 1, 3, Complex::new(3, 4))).is_none());
        assert!(table.row(&record(2, 1, 4, Complex::new(3, 4))).is_none());
    }

    #[test]
    fn magnitude_rounding() {
        let table = MagnitudeTable(Shape { pairs: 1, tones: 1 });

        // |1 + 2i| = 2.236
        assert_eq!(table.row(&record(1, 1, 1, Complex::new(1, 2))).unwrap(), ["2"]);
        // |2 + 2i| = 2.828
        assert_eq!(table.row(&record(1, 1, 1, Complex::new(2, 2))).unwrap(), ["3"]);
    }

    #[test]
    fn stats_summary() {
        let table = StatsSummary { pairs: 2 };

        assert_eq!(
            table.header(),
            [
                "Average-0",
                "Average-1",
                "Variance-0",
                "Variance-1",
                "Max-0",
                "Min-0",
                "Range-0",
                "Max-1",
                "Min-1",
                "Range-1"
            ]
        );
        assert_eq!(
            table.row(&record(1, 2, 4, Complex::new(-6, 8))).unwrap(),
            ["10", "10", "0", "0", "10", "10", "0", "10", "10", "0"]
        );
        assert!(table.row(&record(1, 1, 4, Complex::new(-6, 8))).is_none());
    }

    #[test]
    fn stats_summary_any_tone_count() {
        let table = StatsSummary { pairs: 2 };

        // 40 MHz record, 114 subcarriers
        let row = table.row(&record(2, 1, 114, Complex::new(3, 4))).unwrap();
        assert_eq!(row, ["5", "5", "0", "0", "5", "5", "0", "5", "5", "0"]);
    }

    #[test]
    fn writes_csv() {
        let records = vec![
            Ok(record(1, 1, 2, Complex::new(3, 4))),
            Ok(record(2, 1, 2, Complex::new(3, 4))),
            Ok(record(1, 1, 2, Complex::new(0, 1))),
        ];
        let mut out = vec![];
        let table = MagnitudeTable(Shape { pairs: 1, tones: 2 });

        let summary = export(records, &table, &mut out, true).unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.rows, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "0-0,0-1\n5,5\n1,1\n");
    }

    #[test]
    fn append_without_header() {
        let mut out = vec![];
        let table = StatsSummary { pairs: 1 };

        export(
            vec![Ok(record(1, 1, 2, Complex::new(0, 2)))],
            &table,
            &mut out,
            false,
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "2,0,2,2,0\n");
    }

    #[test]
    fn stops_at_first_error() {
        let records = vec![
            Ok(record(1, 1, 2, Complex::new(3, 4))),
            Err(csi::Error::TruncatedStream { needed: 8, got: 2 }),
        ];

        assert!(export(
            records,
            &MagnitudeTable(Shape { pairs: 1, tones: 2 }),
            vec![],
            true
        )
        .is_err());
    }
}
