//! Framing of CSI records as they arrive from the Atheros CSI driver or as
//! they are stored in a log file.
//!
//! A read from the capture device returns one buffer per received packet:
//!
//! ```text
//! [25-byte header][CSI bitstream][application payload] ... [u16 frame length]
//! ```
//!
//! The header is the driver's `CSI_ST_LEN`-byte status block plus the
//! 2-byte payload length, so the bitstream starts at
//! [`CSI_PAYLOAD_OFFSET`]. The last two bytes of the buffer hold the length
//! of the frame, which is what gets written to the log.
//!
//! A log file is a concatenation of records:
//!
//! ```text
//! [u16 record length][25-byte header][csi_len bytes][payload_len bytes]
//! ```

use std::io::{self, Write};

use tracing::{debug, warn};

use crate::{
    header::{CsiHeader, HEADER_LEN},
    record::CsiRecord,
    Error,
};

/// Length of the driver's status block.
pub const CSI_ST_LEN: usize = 23;

/// Offset of the CSI bitstream in a live capture buffer.
pub const CSI_PAYLOAD_OFFSET: usize = CSI_ST_LEN + 2;

/// Size of the length field in front of every log record, and of the
/// trailer of a live capture buffer.
pub const RECORD_LEN_SIZE: usize = 2;

/// Once fewer bytes than this remain in a log, the rest is treated as a
/// truncated final record.
pub const DEFAULT_TRAILING_MARGIN: usize = 420;

/// How frames are laid out in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// A single buffer read from the capture device.
    Live,
    /// A log file of length-prefixed records.
    File,
}

/// What to do with a frame that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Return the error and stop.
    #[default]
    Abort,
    /// Log the error and carry on with the next frame, if there is one.
    Skip,
}

/// A single frame borrowed from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    header: CsiHeader,
    raw: &'a [u8],
    frame_len: u16,
}

impl<'a> FrameView<'a> {
    pub fn header(&self) -> &CsiHeader {
        &self.header
    }

    /// Header, CSI bitstream and application payload, without the length
    /// field.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// The CSI bitstream, exactly `csi_len` bytes. `None` if the frame has
    /// no CSI.
    pub fn csi(&self) -> Option<&'a [u8]> {
        self.header
            .has_csi()
            .then(|| &self.raw[HEADER_LEN..HEADER_LEN + self.header.csi_len as usize])
    }

    /// Application payload following the CSI bitstream.
    pub fn payload(&self) -> &'a [u8] {
        let start = HEADER_LEN + self.header.csi_len as usize;
        &self.raw[start..start + self.payload_skip()]
    }

    /// Number of application payload bytes to skip.
    pub fn payload_skip(&self) -> usize {
        self.header.payload_len as usize
    }

    /// Frame length reported by the driver (live) or stored in front of the
    /// record (file).
    pub fn frame_len(&self) -> u16 {
        self.frame_len
    }

    /// Decodes the CSI matrix.
    pub fn decode(&self) -> Result<CsiRecord, Error> {
        CsiRecord::decode(self.header, self.csi().unwrap_or_default(), 0)
    }

    /// Parses a live capture buffer.
    pub fn parse_live(b: &'a [u8]) -> Result<Self, Error> {
        let needed = HEADER_LEN + RECORD_LEN_SIZE;
        if b.len() < needed {
            return Err(Error::ShortBuffer {
                needed,
                got: b.len(),
            });
        }

        let header = CsiHeader::from_slice(b)?;
        let body = b.len() - RECORD_LEN_SIZE;
        let frame_len = u16::from_le_bytes([b[body], b[body + 1]]);

        if frame_len as usize > b.len() {
            return Err(Error::InvalidLength {
                field: "frame length",
                declared: frame_len as usize,
                available: b.len(),
            });
        }

        let raw = &b[..body];
        check_lengths(&header, raw.len() - CSI_PAYLOAD_OFFSET)?;

        let len = CSI_PAYLOAD_OFFSET + header.csi_len as usize + header.payload_len as usize;
        // the log record is cut at `frame_len`, so it must cover the whole frame
        if (frame_len as usize) < len {
            return Err(Error::InvalidLength {
                field: "frame length",
                declared: frame_len as usize,
                available: len,
            });
        }

        Ok(Self {
            header,
            raw: &raw[..len],
            frame_len,
        })
    }

    /// Parses the log record at the start of `b`. Returns the frame and the
    /// number of bytes it occupies.
    pub fn parse_record(b: &'a [u8]) -> Result<(Self, usize), Error> {
        let needed = RECORD_LEN_SIZE + HEADER_LEN;
        if b.len() < needed {
            return Err(Error::ShortBuffer {
                needed,
                got: b.len(),
            });
        }

        let frame_len = u16::from_le_bytes([b[0], b[1]]);
        let b = &b[RECORD_LEN_SIZE..];
        let header = CsiHeader::from_slice(b)?;
        check_lengths(&header, b.len() - HEADER_LEN)?;

        let len = HEADER_LEN + header.csi_len as usize + header.payload_len as usize;

        Ok((
            Self {
                header,
                raw: &b[..len],
                frame_len,
            },
            RECORD_LEN_SIZE + len,
        ))
    }
}

/// Checks that the CSI bitstream and the application payload fit in the
/// `available` bytes after the header.
fn check_lengths(header: &CsiHeader, available: usize) -> Result<(), Error> {
    let csi_len = header.csi_len as usize;
    if csi_len > available {
        return Err(Error::InvalidLength {
            field: "csi_len",
            declared: csi_len,
            available,
        });
    }

    let payload_len = header.payload_len as usize;
    if payload_len > available - csi_len {
        return Err(Error::InvalidLength {
            field: "payload_len",
            declared: payload_len,
            available: available - csi_len,
        });
    }

    Ok(())
}

/// Splits a byte source into frames.
///
/// ```
/// # use csi::{frame::{FrameReader, Framing, LogWriter}, header::CsiHeader};
/// let mut log = LogWriter::new(vec![]);
/// log.write_record(&CsiHeader::default(), &[], &[]).unwrap();
/// let log = log.into_inner();
///
/// let frames = FrameReader::new(&log, Framing::File).collect::<Result<Vec<_>, _>>().unwrap();
/// assert_eq!(frames.len(), 1);
/// assert!(frames[0].csi().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    src: &'a [u8],
    pos: usize,
    framing: Framing,
    trailing_margin: usize,
    yielded: usize,
    done: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(src: &'a [u8], framing: Framing) -> Self {
        Self {
            src,
            pos: 0,
            framing,
            trailing_margin: DEFAULT_TRAILING_MARGIN,
            yielded: 0,
            done: false,
        }
    }

    /// Sets the number of bytes below which the tail of a log is discarded.
    /// Pass 0 to read every record. Has no effect on live buffers.
    pub fn with_trailing_margin(mut self, trailing_margin: usize) -> Self {
        self.trailing_margin = trailing_margin;
        self
    }

    /// Byte offset of the next frame.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next frame, `None` at the end of the source.
    pub fn next_frame(&mut self) -> Result<Option<FrameView<'a>>, Error> {
        if self.done {
            return Ok(None);
        }

        let res = self.read_frame();
        match &res {
            Ok(Some(_)) => self.yielded += 1,
            Ok(None) | Err(_) => self.done = true,
        }
        res
    }

    fn read_frame(&mut self) -> Result<Option<FrameView<'a>>, Error> {
        let rest = &self.src[self.pos..];

        match self.framing {
            Framing::Live => {
                if self.yielded > 0 {
                    return Ok(None);
                }
                let frame = FrameView::parse_live(rest)?;
                self.pos = self.src.len();
                Ok(Some(frame))
            }
            Framing::File => {
                if rest.is_empty() {
                    return Ok(None);
                }
                if self.yielded > 0 && rest.len() < self.trailing_margin {
                    debug!(
                        offset = self.pos,
                        remaining = rest.len(),
                        "discarding trailing bytes"
                    );
                    return Ok(None);
                }
                let (frame, consumed) = FrameView::parse_record(rest)?;
                self.pos += consumed;
                Ok(Some(frame))
            }
        }
    }

    /// Decodes every frame into a [`CsiRecord`], handling failures according
    /// to `policy`.
    pub fn records(self, policy: Policy) -> Records<'a> {
        Records {
            frames: self,
            policy,
            skipped: 0,
        }
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<FrameView<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

impl std::iter::FusedIterator for FrameReader<'_> {}

/// Iterator over decoded records, see [`FrameReader::records`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    frames: FrameReader<'a>,
    policy: Policy,
    skipped: usize,
}

impl Records<'_> {
    /// Number of frames dropped under [`Policy::Skip`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for Records<'_> {
    type Item = Result<CsiRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let offset = self.frames.position();
            let res = match self.frames.next_frame() {
                Ok(Some(frame)) => frame.decode(),
                Ok(None) => return None,
                Err(e) => Err(e),
            };

            match (res, self.policy) {
                (Ok(record), _) => return Some(Ok(record)),
                (Err(e), Policy::Abort) => {
                    self.frames.done = true;
                    return Some(Err(e));
                }
                (Err(e), Policy::Skip) => {
                    self.skipped += 1;
                    if e.is_recoverable() {
                        warn!(offset, error = %e, "skipping malformed frame");
                    } else {
                        warn!(offset, error = %e, "stopping at malformed frame");
                        return None;
                    }
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Records<'_> {}

/// Writes frames in the log file format.
#[derive(Debug)]
pub struct LogWriter<W> {
    inner: W,
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Appends a live frame, keeping the first `frame_len` bytes as reported
    /// by the driver.
    pub fn write_frame(&mut self, frame: &FrameView<'_>) -> io::Result<()> {
        let raw = frame.raw();
        let len = (frame.frame_len() as usize).min(raw.len());
        self.inner.write_all(&(len as u16).to_le_bytes())?;
        self.inner.write_all(&raw[..len])
    }

    /// Appends a record built from its parts. `csi_len` and `payload_len`
    /// are taken from the slices, not from `header`.
    pub fn write_record(&mut self, header: &CsiHeader, csi: &[u8], payload: &[u8]) -> io::Result<()> {
        let too_long = |_| io::Error::new(io::ErrorKind::InvalidInput, "record too long");
        let header = CsiHeader {
            csi_len: u16::try_from(csi.len()).map_err(too_long)?,
            payload_len: u16::try_from(payload.len()).map_err(too_long)?,
            ..*header
        };
        let len = u16::try_from(HEADER_LEN + csi.len() + payload.len()).map_err(too_long)?;

        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&header.to_bytes())?;
        self.inner.write_all(csi)?;
        self.inner.write_all(payload)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
