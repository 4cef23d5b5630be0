use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use csi::{
    frame::{Records, DEFAULT_TRAILING_MARGIN},
    proc::db_range,
    FrameReader, Framing, Policy,
};
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use uom::si::{frequency::gigahertz, time::second};

use crate::export::{Exporter, MagnitudeTable, Shape, StatsSummary};

mod export;

/// Inspect and export CSI log files.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct Input {
    /// CSI log file.
    log: PathBuf,
    /// What to do with malformed records.
    #[arg(long, value_enum, default_value_t = OnError::Skip)]
    policy: OnError,
    /// Bytes at the end of the log below which the tail is ignored.
    #[arg(long, default_value_t = DEFAULT_TRAILING_MARGIN)]
    margin: usize,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a summary line for every record.
    Dump {
        #[command(flatten)]
        input: Input,
    },
    /// Write a CSV table with one row per record.
    Export {
        #[command(flatten)]
        input: Input,
        /// Output CSV file.
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Magnitude)]
        format: Format,
        /// Only export records with this many antenna pairs.
        #[arg(long, default_value_t = 2)]
        pairs: usize,
        /// Only export records with this many subcarriers (magnitude format).
        #[arg(long, default_value_t = 56)]
        tones: usize,
        /// Append to the output instead of overwriting it. No header row is
        /// written.
        #[arg(long)]
        append: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnError {
    Abort,
    Skip,
}

impl From<OnError> for Policy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => Policy::Abort,
            OnError::Skip => Policy::Skip,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Rounded magnitude of every subcarrier.
    Magnitude,
    /// Per-pair average, variance, max, min and range.
    Stats,
}

fn records<'a>(log: &'a [u8], input: &Input) -> Records<'a> {
    FrameReader::new(log, Framing::File)
        .with_trailing_margin(input.margin)
        .records(input.policy.into())
}

fn read_log(input: &Input) -> anyhow::Result<Vec<u8>> {
    let log = fs::read(&input.log).with_context(|| format!("reading {:?}", input.log))?;
    info!(path = ?input.log, bytes = log.len(), "read log");
    Ok(log)
}

fn dump(input: &Input) -> anyhow::Result<()> {
    let log = read_log(input)?;
    let mut records = records(&log, input);
    let mut stdout = io::stdout().lock();
    let mut n = 0;

    for record in records.by_ref() {
        let record = record?;
        let h = record.header();
        let bw = match h.bandwidth() {
            Ok(bw) => {
                if record.csi().is_some() && h.num_tones != bw.num_tones() {
                    warn!(
                        timestamp = h.timestamp,
                        num_tones = h.num_tones,
                        "subcarrier count does not match {} MHz",
                        bw.mhz()
                    );
                }
                format!("{} MHz", bw.mhz())
            }
            Err(e) => e.to_string(),
        };
        let spread = db_range(&record)
            .iter()
            .map(|r| format!("{r:.1}"))
            .collect::<Vec<_>>()
            .join("/");

        writeln!(
            stdout,
            "{:>14.6} s {:.3} GHz {bw:>8} rate={:#04x} rssi={}/{}/{}/{} {}x{}x{} phyerr={} payload={} range={spread} dB",
            h.tsf().get::<second>(),
            h.frequency().get::<gigahertz>(),
            h.rate,
            h.rssi,
            h.rssi_0,
            h.rssi_1,
            h.rssi_2,
            h.nr,
            h.nc,
            h.num_tones,
            h.phyerr,
            h.payload_len,
        )?;
        n += 1;
    }

    info!(records = n, skipped = records.skipped(), "done");
    Ok(())
}

fn run_export(
    input: &Input,
    out: &Path,
    exporter: &dyn Exporter,
    append: bool,
) -> anyhow::Result<()> {
    let log = read_log(input)?;
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(out)
        .with_context(|| format!("opening {out:?}"))?;

    let summary = export::export(
        records(&log, input),
        exporter,
        BufWriter::new(file),
        !append,
    )?;

    info!(
        records = summary.records,
        rows = summary.rows,
        path = ?out,
        "exported"
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Dump { input } => dump(&input),
        Command::Export {
            input,
            out,
            format,
            pairs,
            tones,
            append,
        } => {
            let shape = Shape { pairs, tones };
            let exporter: Box<dyn Exporter> = match format {
                Format::Magnitude => Box::new(MagnitudeTable(shape)),
                Format::Stats => Box::new(StatsSummary { pairs }),
            };
            run_export(&input, &out, exporter.as_ref(), append)
        }
    }
}
