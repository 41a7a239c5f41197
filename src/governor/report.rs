//! # Throughput Reports (report.rs)
//!
//! The human-readable side of the governor: the per-epoch report record,
//! the sink abstraction it is emitted through, and the startup banner.
//!
//! ## The Classic Report Stream
//!
//! ```text
//!     -- weir 0.1.0 --
//!     -- linux x86_64 --
//!     -- Compiled: Aug 22 2026 10:15:00 --
//!     Bps:  500; Tot:    500
//!     Bps:  500; Tot:   1000
//!     Bps:    0; Tot:   1000
//! ```
//!
//! `Bps` is the just-finished epoch's byte count, `Tot` the running
//! total. One line per tick, quiet epochs included, so the stream
//! doubles as a heartbeat.

use std::fmt;
use std::io;

use tracing::warn;

/// One epoch's throughput record.
///
/// Produced exactly once per tick by
/// [`EpochReporter::on_tick`](crate::EpochReporter::on_tick) and handed
/// to the configured [`ReportSink`].
///
/// # Example
///
/// ```rust
/// use weir::EpochReport;
///
/// let report = EpochReport {
///     epoch_bytes: 500,
///     total_bytes: 1500,
/// };
/// assert_eq!(report.format_line(), "Bps:  500; Tot:   1500");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochReport {
    /// Bytes received in the epoch that just ended.
    pub epoch_bytes: u64,

    /// Running total, including this epoch.
    pub total_bytes: u64,
}

impl EpochReport {
    /// Formats the record as the classic report line (no terminator).
    ///
    /// The counts are right-aligned to widths 4 and 6; larger values
    /// simply widen the field.
    pub fn format_line(&self) -> String {
        format!("Bps: {:4}; Tot: {:6}", self.epoch_bytes, self.total_bytes)
    }
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_line())
    }
}

/// Destination for per-epoch report records.
///
/// The tick handler emits into this; how the record leaves the process
/// (serial console, log file, test buffer) is the sink's business.
/// Implementations must not block for long: the tick handler runs the
/// emit inline.
pub trait ReportSink {
    /// Consumes one epoch's record.
    fn emit(&mut self, report: &EpochReport);
}

/// Sink that writes report lines to any [`io::Write`], CRLF-terminated.
///
/// CRLF is the serial-terminal convention, so the stream renders
/// correctly on a raw console as well as in a normal terminal. Write
/// failures are logged and swallowed; a wedged console must not take
/// the tick handler down with it.
///
/// # Example
///
/// ```rust
/// use weir::{EpochReport, ReportSink, TextSink};
///
/// let mut sink = TextSink::new(Vec::new());
/// sink.emit(&EpochReport { epoch_bytes: 500, total_bytes: 500 });
///
/// let bytes = sink.into_inner();
/// assert_eq!(bytes, b"Bps:  500; Tot:    500\r\n");
/// ```
#[derive(Debug)]
pub struct TextSink<W: io::Write> {
    writer: W,
}

impl<W: io::Write> TextSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> ReportSink for TextSink<W> {
    fn emit(&mut self, report: &EpochReport) {
        if let Err(e) = write!(self.writer, "{}\r\n", report.format_line()) {
            warn!("Report write failed: {}", e);
            return;
        }
        // Reports are a heartbeat; push them out right away
        if let Err(e) = self.writer.flush() {
            warn!("Report flush failed: {}", e);
        }
    }
}

/// Sink that collects records in memory.
///
/// The natural sink for tests and for embedders who want to inspect
/// the stream programmatically.
///
/// # Example
///
/// ```rust
/// use weir::{EpochReport, MemorySink, ReportSink};
///
/// let mut sink = MemorySink::new();
/// sink.emit(&EpochReport { epoch_bytes: 7, total_bytes: 7 });
///
/// assert_eq!(sink.len(), 1);
/// assert_eq!(sink.records()[0].total_bytes, 7);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<EpochReport>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records emitted so far, oldest first.
    pub fn records(&self) -> &[EpochReport] {
        &self.records
    }

    /// The most recent record, if any.
    pub fn last(&self) -> Option<&EpochReport> {
        self.records.last()
    }

    /// Number of records collected.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been emitted yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ReportSink for MemorySink {
    fn emit(&mut self, report: &EpochReport) {
        self.records.push(*report);
    }
}

/// The three informational lines printed once at startup.
///
/// Purely cosmetic: names the program, the platform it runs on, and
/// when it was built, before the report stream begins.
///
/// # Example
///
/// ```rust
/// use weir::Banner;
///
/// let banner = Banner::for_crate();
/// let text = banner.to_string();
///
/// assert_eq!(text.lines().count(), 3);
/// assert!(text.contains("weir"));
/// ```
#[derive(Debug, Clone)]
pub struct Banner {
    /// Program name.
    pub name: String,
    /// Program version.
    pub version: String,
    /// Host platform description.
    pub platform: String,
    /// Build timestamp.
    pub built: String,
}

impl Banner {
    /// Builds the banner from this crate's build information.
    pub fn for_crate() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            built: env!("WEIR_BUILD_TIMESTAMP").to_string(),
        }
    }

    /// Writes the banner CRLF-terminated, for serial-style consoles.
    pub fn write_crlf<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        write!(
            writer,
            "-- {} {} --\r\n-- {} --\r\n-- Compiled: {} --\r\n",
            self.name, self.version, self.platform, self.built
        )
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-- {} {} --\n-- {} --\n-- Compiled: {} --",
            self.name, self.version, self.platform, self.built
        )
    }
}
