//! # Link Driver Boundary (link.rs)
//!
//! The seam between the governed logic and the receive hardware. The
//! governor never touches registers or ports; it talks to anything
//! implementing [`LinkDriver`], which keeps the two handlers pure and
//! unit-testable.
//!
//! ## The Seam
//!
//! ```text
//!     Governor / Reporter                 LinkDriver impl
//!     ───────────────────                 ───────────────
//!     "arm a unit"        ─────────────►  start a receive of N bytes
//!     "flow on/off"       ─────────────►  drive the flow-control line
//!                         ◄─────────────  completion event (caller
//!                                          invokes on_receive_complete)
//! ```
//!
//! The driver holds at most ONE outstanding armed unit. Arming while a
//! unit is pending is a contract violation and fails with
//! [`HardwareFault::ReceiverBusy`].
//!
//! [`SimLink`] ships in the library so embedders can exercise the full
//! arm/deliver/flow cycle without hardware.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Fault raised by a link driver when a receive cannot be armed.
///
/// Each variant maps to a distinct failure domain. During startup these
/// propagate as configuration faults; inside the handlers they are
/// invariant violations and the handlers panic rather than continue
/// with the armed flag out of sync with the hardware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareFault {
    /// A receive was requested while one is still outstanding.
    #[error("receiver busy: a {pending}-byte receive is already armed")]
    ReceiverBusy {
        /// Size of the receive that is still pending.
        pending: u32,
    },

    /// The peripheral refused the request outright.
    #[error("peripheral failure: {0}")]
    PeripheralFailure(&'static str),
}

/// Serial framing parameters for the governed link.
///
/// Purely descriptive: the governor itself never reads these, but a
/// driver (or a banner line) typically wants to show what the wire is
/// configured for. The default is the classic 115200 8N1 setup with
/// hardware handshaking.
///
/// # Example
///
/// ```rust
/// use weir::LinkParams;
///
/// let params = LinkParams::default();
/// assert_eq!(params.to_string(), "115200 8N1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Line rate in bits per second.
    pub baud: u32,
    /// Data bits per character (usually 8).
    pub data_bits: u8,
    /// Parity scheme.
    pub parity: Parity,
    /// Stop bits (usually 1).
    pub stop_bits: u8,
}

/// Parity scheme for [`LinkParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit.
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            baud: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl std::fmt::Display for LinkParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud, self.data_bits, parity, self.stop_bits
        )
    }
}

/// Receive-side hardware abstraction the governor drives.
///
/// Implementations own the physical receive machinery and the
/// flow-control output line. The contract is small on purpose:
///
/// - [`arm_receive`](Self::arm_receive) starts a transfer of exactly
///   `unit` bytes. At most one transfer may be outstanding; a second
///   arm before completion is [`HardwareFault::ReceiverBusy`].
/// - [`set_flow_control`](Self::set_flow_control) drives the line that
///   tells the peer to pause (`true`) or resume (`false`) sending.
/// - When an armed transfer finishes, the implementation raises its
///   completion event by calling
///   [`RateGovernor::on_receive_complete`](crate::RateGovernor::on_receive_complete).
///
/// Drivers do not buffer beyond the single armed unit; backpressure is
/// the governor's job, expressed through the flow-control line.
pub trait LinkDriver {
    /// Arms a receive of exactly `unit` bytes.
    fn arm_receive(&self, unit: u32) -> Result<(), HardwareFault>;

    /// Asserts (`true`) or releases (`false`) the flow-control line.
    fn set_flow_control(&self, asserted: bool);
}

// Shared drivers pass through unchanged, so a clock thread and a
// delivery loop can hold the same link.
impl<L: LinkDriver + ?Sized> LinkDriver for std::sync::Arc<L> {
    fn arm_receive(&self, unit: u32) -> Result<(), HardwareFault> {
        (**self).arm_receive(unit)
    }

    fn set_flow_control(&self, asserted: bool) {
        (**self).set_flow_control(asserted)
    }
}

/// In-memory link driver for tests, demos, and embedder unit tests.
///
/// Models a receive peripheral faithfully enough to exercise every
/// governor path: a single armed slot, a flow-control line, delivery
/// accounting, and switchable arm-failure injection.
///
/// The test (or demo) plays the role of the sending peer: it calls
/// [`try_deliver`](Self::try_deliver) to complete the armed transfer,
/// then feeds the completion to the governor.
///
/// # Example
///
/// ```rust
/// use weir::{HardwareFault, LinkDriver, SimLink};
///
/// let link = SimLink::new();
///
/// link.arm_receive(1).unwrap();
/// assert!(matches!(
///     link.arm_receive(1),
///     Err(HardwareFault::ReceiverBusy { pending: 1 })
/// ));
///
/// // The "peer" sends a byte: the armed slot is consumed
/// assert_eq!(link.try_deliver(), Some(1));
/// assert_eq!(link.try_deliver(), None); // nothing armed anymore
/// assert_eq!(link.delivered_bytes(), 1);
/// ```
#[derive(Debug)]
pub struct SimLink {
    params: LinkParams,
    /// Size of the armed receive; 0 means nothing is outstanding
    armed_unit: AtomicU32,
    flow_asserted: AtomicBool,
    delivered_bytes: AtomicU64,
    arm_count: AtomicU64,
    fail_arms: AtomicBool,
}

impl SimLink {
    /// Creates a simulated link with default (115200 8N1) framing.
    pub fn new() -> Self {
        Self::with_params(LinkParams::default())
    }

    /// Creates a simulated link with explicit framing parameters.
    pub fn with_params(params: LinkParams) -> Self {
        Self {
            params,
            armed_unit: AtomicU32::new(0),
            flow_asserted: AtomicBool::new(false),
            delivered_bytes: AtomicU64::new(0),
            arm_count: AtomicU64::new(0),
            fail_arms: AtomicBool::new(false),
        }
    }

    /// Framing parameters this link was created with.
    pub fn params(&self) -> LinkParams {
        self.params
    }

    /// Completes the armed transfer, if any.
    ///
    /// Returns the number of bytes "received" (the armed unit size) or
    /// `None` when nothing is armed, which is exactly the state of a
    /// governed link that has withheld intake. The caller forwards a
    /// `Some` result to the governor as a completion event.
    pub fn try_deliver(&self) -> Option<u32> {
        let unit = self.armed_unit.swap(0, Ordering::AcqRel);
        if unit == 0 {
            return None;
        }
        self.delivered_bytes
            .fetch_add(unit as u64, Ordering::Relaxed);
        Some(unit)
    }

    /// Whether the flow-control line currently tells the peer to pause.
    pub fn is_flow_asserted(&self) -> bool {
        self.flow_asserted.load(Ordering::Acquire)
    }

    /// Whether a receive is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed_unit.load(Ordering::Acquire) != 0
    }

    /// Total bytes delivered through [`try_deliver`](Self::try_deliver).
    pub fn delivered_bytes(&self) -> u64 {
        self.delivered_bytes.load(Ordering::Relaxed)
    }

    /// Number of successful arm requests so far.
    pub fn arm_count(&self) -> u64 {
        self.arm_count.load(Ordering::Relaxed)
    }

    /// Makes subsequent arm requests fail with
    /// [`HardwareFault::PeripheralFailure`].
    ///
    /// Used to test the fail-loudly handler contract.
    pub fn inject_arm_failure(&self, fail: bool) {
        self.fail_arms.store(fail, Ordering::Release);
    }
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkDriver for SimLink {
    fn arm_receive(&self, unit: u32) -> Result<(), HardwareFault> {
        if self.fail_arms.load(Ordering::Acquire) {
            return Err(HardwareFault::PeripheralFailure("injected arm failure"));
        }
        match self
            .armed_unit
            .compare_exchange(0, unit, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.arm_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(pending) => Err(HardwareFault::ReceiverBusy { pending }),
        }
    }

    fn set_flow_control(&self, asserted: bool) {
        self.flow_asserted.store(asserted, Ordering::Release);
    }
}
