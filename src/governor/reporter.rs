//! # Epoch Reporter (reporter.rs)
//!
//! The tick-side handler: drains the epoch counter, accumulates the
//! running total, emits the report line, and resumes a link the
//! governor paused. One reporter per governor, driven by whatever tick
//! source the embedder wires up (see
//! [`spawn_epoch_clock`](crate::spawn_epoch_clock) for the built-in
//! thread).
//!
//! ## What One Tick Does
//!
//! ```text
//!     on_tick():
//!
//!     1. sample = counter.sample_and_reset()     (atomic drain)
//!     2. total += sample                         (saturating)
//!     3. sink.emit("Bps: sample; Tot: total")    (always, even 0)
//!     4. if intake paused:
//!           release flow control
//!           arm one transfer unit
//!           armed = true
//! ```
//!
//! Step 1 is a single atomic swap, so a completion racing the tick is
//! counted in exactly one epoch. Step 4 is unconditional when the
//! governor paused: even a zero-byte epoch resumes a paused link.

use std::sync::Arc;

use tracing::debug;

use super::core::RateGovernor;
use super::link::LinkDriver;
use super::report::{EpochReport, ReportSink};

/// Tick-side handler paired with one [`RateGovernor`].
///
/// Owns the running total in the sense that nothing else writes it:
/// the reporter adds each epoch's sample exactly once per tick.
/// `on_tick` takes `&mut self` and the type is deliberately not
/// `Clone`, so one reporter means one serialized tick stream; wrap it
/// in a `Mutex` if your clock and your shutdown path both need it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use weir::{EpochReporter, MemorySink, RateGovernor, SimLink};
///
/// let governor = Arc::new(RateGovernor::new(1, 500));
/// let link = SimLink::new();
/// let mut sink = MemorySink::new();
///
/// governor.start(&link).unwrap();
/// let mut reporter = EpochReporter::new(Arc::clone(&governor));
///
/// // A quiet epoch still produces a record
/// reporter.on_tick(&link, &mut sink);
/// assert_eq!(sink.records()[0].epoch_bytes, 0);
/// ```
#[derive(Debug)]
pub struct EpochReporter {
    governor: Arc<RateGovernor>,
}

impl EpochReporter {
    /// Creates the reporter for `governor`.
    pub fn new(governor: Arc<RateGovernor>) -> Self {
        Self { governor }
    }

    /// The governor this reporter drains.
    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    /// Handles one epoch tick.
    ///
    /// Emits exactly one record into `sink` (zero-byte epochs
    /// included), then resumes intake if the governor suspended it
    /// this epoch. Runs to completion without blocking, matching the
    /// completion handler's discipline.
    ///
    /// ## Panics
    ///
    /// Panics if the link refuses the resume re-arm. While intake is
    /// paused nothing is outstanding, so the receive slot must be
    /// free; a refusal means the driver and the armed flag disagree
    /// about reality.
    pub fn on_tick<L: LinkDriver, S: ReportSink>(&mut self, link: &L, sink: &mut S) {
        let g = &*self.governor;

        let sample = g.epoch_bytes.sample_and_reset();

        // Sole writer of the total, so load+store is race-free here.
        // Saturating: a long-lived link pins at u64::MAX rather than
        // wrapping the report back to small numbers.
        let total = g.total_bytes.load(g.ordering.load()).saturating_add(sample);
        g.total_bytes.store(total, g.ordering.store());

        g.last_epoch_bytes.store(sample, g.ordering.store());
        g.total_epochs.fetch_add(1, g.ordering.rmw());

        // One record per tick, unconditionally
        sink.emit(&EpochReport {
            epoch_bytes: sample,
            total_bytes: total,
        });

        if !g.armed.0.load(g.ordering.load()) {
            // The governor spent the budget this epoch: reopen intake.
            // Arm before flipping the flag, so a panic on arm leaves
            // the flag truthfully unarmed.
            link.set_flow_control(false);
            link.arm_receive(g.transfer_unit)
                .expect("resume re-arm refused; nothing can be outstanding while paused");
            g.armed.0.store(true, g.ordering.store());
            g.total_resumptions.fetch_add(1, g.ordering.rmw());

            debug!("Intake resumed after a {} byte epoch", sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::link::SimLink;
    use crate::governor::report::MemorySink;

    fn started(transfer_unit: u32, rate_threshold: u64) -> (Arc<RateGovernor>, SimLink) {
        let governor = Arc::new(RateGovernor::new(transfer_unit, rate_threshold));
        let link = SimLink::new();
        governor.start(&link).unwrap();
        (governor, link)
    }

    fn pump(governor: &RateGovernor, link: &SimLink) -> u64 {
        while link.try_deliver().is_some() {
            governor.on_receive_complete(link);
        }
        link.delivered_bytes()
    }

    #[test]
    fn test_one_record_per_tick_including_zero() {
        let (governor, link) = started(1, 500);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        for _ in 0..3 {
            reporter.on_tick(&link, &mut sink);
        }

        assert_eq!(sink.len(), 3);
        for record in sink.records() {
            assert_eq!(record.epoch_bytes, 0);
            assert_eq!(record.total_bytes, 0);
        }
        assert_eq!(governor.metrics().total_epochs, 3);
    }

    #[test]
    fn test_record_carries_sample_and_running_total() {
        let (governor, link) = started(1, 500);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        for _ in 0..5 {
            link.try_deliver().unwrap();
            governor.on_receive_complete(&link);
        }
        reporter.on_tick(&link, &mut sink);

        for _ in 0..3 {
            link.try_deliver().unwrap();
            governor.on_receive_complete(&link);
        }
        reporter.on_tick(&link, &mut sink);

        assert_eq!(
            sink.records(),
            &[
                EpochReport {
                    epoch_bytes: 5,
                    total_bytes: 5
                },
                EpochReport {
                    epoch_bytes: 3,
                    total_bytes: 8
                },
            ]
        );
    }

    #[test]
    fn test_tick_resumes_suspended_link() {
        let (governor, link) = started(1, 10);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        assert_eq!(pump(&governor, &link), 10);
        assert!(!governor.is_armed());
        assert!(link.is_flow_asserted());

        reporter.on_tick(&link, &mut sink);

        assert!(governor.is_armed());
        assert!(link.is_armed());
        assert!(!link.is_flow_asserted());
        assert_eq!(sink.last().unwrap().epoch_bytes, 10);
        assert_eq!(governor.metrics().total_resumptions, 1);

        // Intake really is open again
        assert_eq!(link.try_deliver(), Some(1));
    }

    #[test]
    fn test_tick_leaves_armed_link_alone() {
        let (governor, link) = started(1, 500);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        let arms_before = link.arm_count();
        reporter.on_tick(&link, &mut sink);

        assert_eq!(link.arm_count(), arms_before);
        assert_eq!(governor.metrics().total_resumptions, 0);
    }

    #[test]
    fn test_second_epoch_accumulates_after_resume() {
        let (governor, link) = started(1, 10);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        pump(&governor, &link);
        reporter.on_tick(&link, &mut sink);

        // Sender comes back with less than the budget
        for _ in 0..4 {
            link.try_deliver().unwrap();
            governor.on_receive_complete(&link);
        }
        reporter.on_tick(&link, &mut sink);

        assert_eq!(
            sink.records(),
            &[
                EpochReport {
                    epoch_bytes: 10,
                    total_bytes: 10
                },
                EpochReport {
                    epoch_bytes: 4,
                    total_bytes: 14
                },
            ]
        );
    }

    #[test]
    fn test_total_saturates_instead_of_wrapping() {
        use std::sync::atomic::Ordering;

        let (governor, link) = started(1, 500);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        governor.total_bytes.store(u64::MAX - 2, Ordering::Release);
        for _ in 0..5 {
            link.try_deliver().unwrap();
            governor.on_receive_complete(&link);
        }
        reporter.on_tick(&link, &mut sink);

        assert_eq!(sink.last().unwrap().total_bytes, u64::MAX);
        assert_eq!(governor.metrics().total_bytes, u64::MAX);
    }

    #[test]
    #[should_panic(expected = "resume re-arm refused")]
    fn test_resume_panics_when_arm_refused() {
        let (governor, link) = started(1, 10);
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = MemorySink::new();

        pump(&governor, &link);
        link.inject_arm_failure(true);
        reporter.on_tick(&link, &mut sink);
    }
}
