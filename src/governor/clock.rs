//! # Epoch Clock Threads
//!
//! This module provides the tick source that drives an [`EpochReporter`].
//! On embedded targets the equivalent job is done by a hardware timer
//! interrupt; here a dedicated OS thread fires on a fixed deadline grid.
//!
//! ## Architecture
//!
//! ```text
//!     Tick Delivery:
//!
//!     spawn_epoch_clock            spawn_stoppable_epoch_clock
//!           │                                │
//!           ▼                                ▼
//!     ┌───────────────┐              ┌───────────────┐
//!     │  sleep until  │              │ recv_timeout  │◄── stop_tx.send(())
//!     │ next deadline │              │ until deadline│
//!     └───────┬───────┘              └───────┬───────┘
//!             │ deadline                     │ timeout
//!             ▼                              ▼
//!     reporter.on_tick(...)         reporter.on_tick(...)
//!             │                              │
//!             └──── next += interval ────────┘
//! ```
//!
//! ## Deadline Grid
//!
//! Ticks are scheduled against absolute deadlines (`next += interval`)
//! rather than by sleeping a fixed duration after each tick, so slow
//! sinks do not stretch the epoch length. A deadline that has already
//! passed when a tick finishes is skipped, never fired twice, so every
//! emitted report still corresponds to exactly one elapsed epoch.

use super::{link::LinkDriver, report::ReportSink, reporter::EpochReporter};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tracing::info;

/// Starts a detached epoch clock thread.
///
/// The thread takes ownership of the reporter, link handle, and sink,
/// and runs indefinitely, calling [`EpochReporter::on_tick`] once per
/// epoch interval. The interval is read from the reporter's governor.
///
/// Use [`spawn_stoppable_epoch_clock`] instead when the clock must be
/// shut down cleanly or the sink inspected afterwards.
///
/// # Returns
///
/// A `JoinHandle` for the clock thread.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use weir::{spawn_epoch_clock, EpochReporter, GovernorConfig, RateGovernor, SimLink, TextSink};
///
/// let governor = Arc::new(RateGovernor::with_config(GovernorConfig::new(1, 500, 1000)));
/// let link = Arc::new(SimLink::new());
/// governor.start(&link).unwrap();
///
/// let reporter = EpochReporter::new(governor);
/// let handle = spawn_epoch_clock(reporter, link, TextSink::new(std::io::stdout()));
///
/// // The clock is now ticking in the background
/// // It will run until the process exits
/// drop(handle);
/// ```
pub fn spawn_epoch_clock<L, S>(
    mut reporter: EpochReporter,
    link: L,
    mut sink: S,
) -> thread::JoinHandle<()>
where
    L: LinkDriver + Send + 'static,
    S: ReportSink + Send + 'static,
{
    let interval = reporter.governor().epoch_interval();

    thread::Builder::new()
        .name("weir-epoch".to_string())
        .spawn(move || {
            info!("Started epoch clock (interval: {}ms)", interval.as_millis());

            let mut next = Instant::now() + interval;
            loop {
                thread::sleep(next.saturating_duration_since(Instant::now()));
                reporter.on_tick(&link, &mut sink);

                next += interval;
                while next <= Instant::now() {
                    next += interval;
                }
            }
        })
        .expect("Failed to spawn epoch clock thread")
}

/// Starts an epoch clock thread that can be stopped.
///
/// Similar to [`spawn_epoch_clock`], but the thread listens for a stop
/// signal between deadlines. On shutdown it hands the reporter, link
/// handle, and sink back through the `JoinHandle`, so a test or a
/// shutdown path can inspect the accumulated reports.
///
/// Dropping the returned `Sender` stops the clock too.
///
/// # Returns
///
/// A tuple of:
/// - `JoinHandle` yielding `(reporter, link, sink)` on join
/// - `Sender` to signal the thread to stop
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use weir::{spawn_stoppable_epoch_clock, EpochReporter, GovernorConfig, MemorySink,
///            RateGovernor, SimLink};
///
/// let governor = Arc::new(RateGovernor::with_config(GovernorConfig::new(1, 500, 20)));
/// let link = Arc::new(SimLink::new());
/// governor.start(&link).unwrap();
///
/// let reporter = EpochReporter::new(governor);
/// let (handle, stop_tx) = spawn_stoppable_epoch_clock(reporter, link, MemorySink::new());
///
/// std::thread::sleep(Duration::from_millis(70));
/// stop_tx.send(()).unwrap();
/// let (_reporter, _link, sink) = handle.join().unwrap();
/// assert!(!sink.records().is_empty());
/// ```
pub fn spawn_stoppable_epoch_clock<L, S>(
    mut reporter: EpochReporter,
    link: L,
    mut sink: S,
) -> (thread::JoinHandle<(EpochReporter, L, S)>, mpsc::Sender<()>)
where
    L: LinkDriver + Send + 'static,
    S: ReportSink + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();
    let interval = reporter.governor().epoch_interval();

    let handle = thread::Builder::new()
        .name("weir-epoch".to_string())
        .spawn(move || {
            info!(
                "Started stoppable epoch clock (interval: {}ms)",
                interval.as_millis()
            );

            let mut next = Instant::now() + interval;
            loop {
                match stop_rx.recv_timeout(next.saturating_duration_since(Instant::now())) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        info!("Epoch clock stopping");
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        reporter.on_tick(&link, &mut sink);

                        next += interval;
                        while next <= Instant::now() {
                            next += interval;
                        }
                    }
                }
            }

            (reporter, link, sink)
        })
        .expect("Failed to spawn epoch clock thread");

    (handle, stop_tx)
}
