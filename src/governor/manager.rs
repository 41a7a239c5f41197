//! # Multi-Port Governor Manager
//!
//! This module provides a manager for governing several serial links at
//! once, one governor per named port. It's designed for gateway-style
//! hosts that fan a handful of UARTs, USB adapters, or PTYs into a
//! single process and want the same intake policy on each.
//!
//! ## Architecture
//!
//! ```text
//!     Port Governance Architecture:
//!
//!     Receive completions:
//!     "ttyS0"   ──┐
//!     "ttyS1"   ──┤
//!     "ttyUSB0" ──┼──► Port Manager ──► Individual Governors
//!     "ttyACM0" ──┘         │
//!                           ▼
//!                   ┌────────────────┐
//!                   │  DashMap       │
//!                   │  ┌──────────┐  │
//!                   │  │port → PS │  │  PS = PortState
//!                   │  │port → PS │  │       (governor + reporter)
//!                   │  └──────────┘  │
//!                   └────────────────┘
//! ```
//!
//! ## Key Features
//!
//! 1. **Per-Port Isolation**: Each port gets its own epoch budget
//! 2. **Bounded Table**: Limits tracked ports so a misconfigured caller
//!    cannot grow the map without bound
//! 3. **Idle Reclamation**: Detaches ports that stop carrying traffic
//! 4. **Lock-Free Routing**: Uses DashMap for concurrent access

use super::{
    config::GovernorConfig,
    core::RateGovernor,
    link::{HardwareFault, LinkDriver},
    report::ReportSink,
    reporter::EpochReporter,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

// Configuration constants

/// Maximum number of ports that can be governed simultaneously.
///
/// Serial endpoints are operator-provisioned, so the bound is small.
/// At capacity, new attachments are refused rather than evicting a
/// port that may still have a live link behind it.
const MAX_TRACKED_PORTS: usize = 512;

/// Occupancy at which cleanup turns aggressive (90% of max).
const PRESSURE_THRESHOLD: usize = (MAX_TRACKED_PORTS * 90) / 100;

/// One port's governed state: the governor itself plus the reporter
/// that drains it on ticks.
///
/// The reporter is the sole writer of the running total, so it sits
/// behind a mutex: two tick sources hitting the same port serialize
/// here instead of double-reporting.
pub struct PortState {
    governor: Arc<RateGovernor>,
    reporter: Mutex<EpochReporter>,
}

impl PortState {
    fn new(config: GovernorConfig) -> Self {
        let governor = Arc::new(RateGovernor::with_config(config));
        let reporter = Mutex::new(EpochReporter::new(governor.clone()));
        Self { governor, reporter }
    }

    /// The port's governor.
    #[inline]
    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Runs one epoch tick for this port.
    pub fn on_tick<L: LinkDriver, S: ReportSink>(&self, link: &L, sink: &mut S) {
        let mut reporter = self
            .reporter
            .lock()
            .expect("reporter lock poisoned by an earlier tick panic");
        reporter.on_tick(link, sink);
    }
}

impl std::fmt::Debug for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortState")
            .field("governor", &self.governor)
            .finish()
    }
}

/// Manager for per-port rate governing.
///
/// This struct manages a collection of governors, one for each named
/// serial port. It provides automatic cleanup of idle ports and keeps
/// the table bounded.
///
/// ## Usage Patterns
///
/// ### Gateway Integration
///
/// ```rust
/// use weir::{GovernorConfig, PortGovernorManager, SimLink};
/// use std::sync::Arc;
///
/// let config = GovernorConfig::new(1, 500, 1000);
/// let manager = Arc::new(PortGovernorManager::new(config));
///
/// let link = SimLink::new();
/// let governor = manager.attach("ttyS0", &link).unwrap();
///
/// // In the receive path:
/// if link.try_deliver().is_some() {
///     manager.on_receive_complete("ttyS0", &link);
/// }
/// # assert_eq!(governor.metrics().total_completions, 1);
/// ```
///
/// ### With Automatic Cleanup
///
/// ```rust
/// use weir::{GovernorConfig, PortGovernorManager};
/// use std::sync::Arc;
///
/// let config = GovernorConfig::new(1, 500, 1000);
/// let manager = Arc::new(PortGovernorManager::with_cleanup_settings(
///     config,
///     60_000,  // Sweep every minute
///     300_000, // Detach ports quiet for 5 minutes
/// ));
///
/// let (handle, stop_tx) = manager.clone().start_stoppable_cleanup_thread();
/// # stop_tx.send(()).unwrap();
/// # handle.join().unwrap();
/// ```
///
/// ## Memory Management
///
/// The manager keeps its table bounded through:
///
/// 1. **Bounded Tracking**: Maximum 512 ports
/// 2. **Refusal At Capacity**: New ports are rejected, never evicted
/// 3. **Periodic Cleanup**: Idle ports are detached regularly
#[derive(Clone)]
pub struct PortGovernorManager {
    /// Concurrent hash map storing port name to governed state.
    /// DashMap provides lock-free concurrent access with sharding.
    ports: Arc<DashMap<String, Arc<PortState>, ahash::RandomState>>,

    /// Current count of attached ports.
    /// Used for fast capacity checks without iterating the map.
    active_count: Arc<AtomicUsize>,

    /// Configuration template for creating new governors.
    config: GovernorConfig,

    /// Interval between cleanup sweeps (milliseconds).
    cleanup_interval_ms: u64,

    /// Duration after which a port is considered idle (milliseconds).
    inactive_duration_ms: u64,

    /// Total number of governors created since startup.
    total_attached: Arc<AtomicU64>,

    /// Total number of governors detached since startup.
    total_detached: Arc<AtomicU64>,
}

impl PortGovernorManager {
    /// Creates a new port governor manager with default settings.
    ///
    /// Default settings:
    /// - Cleanup interval: 60 seconds
    /// - Idle duration: 5 minutes
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for individual governors
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::new(config);
    /// ```
    pub fn new(config: GovernorConfig) -> Self {
        // Size shards to the host rather than the (small) port table
        // (dashmap requires a power of two greater than 1)
        let num_shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(2, 64);

        let initial_capacity = (MAX_TRACKED_PORTS / num_shards).max(8);

        Self {
            ports: Arc::new(DashMap::with_capacity_and_hasher_and_shard_amount(
                initial_capacity,
                ahash::RandomState::new(),
                num_shards,
            )),
            active_count: Arc::new(AtomicUsize::new(0)),
            config,
            cleanup_interval_ms: 60_000,
            inactive_duration_ms: 300_000,
            total_attached: Arc::new(AtomicU64::new(0)),
            total_detached: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a new manager with custom cleanup settings.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for individual governors
    /// * `cleanup_interval_ms` - How often to sweep for idle ports
    /// * `inactive_duration_ms` - How long before a port counts as idle
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::with_cleanup_settings(
    ///     config,
    ///     30_000,   // Sweep every 30 seconds
    ///     120_000,  // Detach ports quiet for 2 minutes
    /// );
    /// ```
    pub fn with_cleanup_settings(
        config: GovernorConfig,
        cleanup_interval_ms: u64,
        inactive_duration_ms: u64,
    ) -> Self {
        let mut manager = Self::new(config);
        manager.cleanup_interval_ms = cleanup_interval_ms;
        manager.inactive_duration_ms = inactive_duration_ms;
        manager
    }

    /// Gets or creates the governed state for the named port.
    ///
    /// This is the core method that manages governor creation and
    /// retrieval. It handles:
    /// - Fast path: Return existing state
    /// - Slow path: Create new state with capacity checks
    ///
    /// Creation is passive. The new governor holds no link until
    /// [`attach`](Self::attach) or [`RateGovernor::start`] runs.
    ///
    /// # Arguments
    ///
    /// * `port` - The port name to look up, e.g. `"ttyS0"`
    ///
    /// # Returns
    ///
    /// - `Some(state)` if successful
    /// - `None` if the table is full
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::new(config);
    /// if let Some(state) = manager.get_port("ttyS0") {
    ///     assert!(!state.governor().is_armed());
    /// }
    /// ```
    #[inline]
    pub fn get_port(&self, port: &str) -> Option<Arc<PortState>> {
        // Fast path: check if the port is already tracked
        // This is the common case and avoids any allocation
        if let Some(state) = self.ports.get(port) {
            return Some(state.clone());
        }

        // Slow path: need to create new state
        let current = self.active_count.load(Ordering::Acquire);

        // Early rejection if at capacity
        if current >= MAX_TRACKED_PORTS {
            warn!("Port table full, refusing port: {}", port);
            return None;
        }

        // Use entry API for atomic insert-or-get
        let entry = self.ports.entry(port.to_string());

        match entry {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                // Another thread created it while we were checking
                Some(occupied.get().clone())
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                // Reserve our slot atomically
                let prev = self.active_count.fetch_add(1, Ordering::AcqRel);

                // Check for race condition where we exceeded the limit
                if prev >= MAX_TRACKED_PORTS {
                    // Rollback our increment
                    self.active_count.fetch_sub(1, Ordering::AcqRel);
                    warn!("Port table capacity race detected, refusing port: {}", port);
                    return None;
                }

                let state = Arc::new(PortState::new(self.config.clone()));
                vacant.insert(state.clone());

                self.total_attached.fetch_add(1, Ordering::Relaxed);
                debug!("Created governor for port: {} (total: {})", port, prev + 1);

                Some(state)
            }
        }
    }

    /// Attaches a port and opens its intake.
    ///
    /// Combines [`get_port`](Self::get_port) with
    /// [`RateGovernor::start`]: the link's flow control is released and
    /// the first receive armed.
    ///
    /// # Arguments
    ///
    /// * `port` - The port name to attach
    /// * `link` - The link driver serving the port
    ///
    /// # Returns
    ///
    /// The port's governor, or a fault if the table is full or the
    /// link refuses to arm. Attaching the same port twice fails with
    /// [`HardwareFault::ReceiverBusy`] since the first receive is
    /// still armed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager, SimLink};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::new(config);
    ///
    /// let link = SimLink::new();
    /// let governor = manager.attach("ttyUSB0", &link).unwrap();
    /// assert!(governor.is_armed());
    /// ```
    pub fn attach<L: LinkDriver>(
        &self,
        port: &str,
        link: &L,
    ) -> Result<Arc<RateGovernor>, HardwareFault> {
        let state = self
            .get_port(port)
            .ok_or(HardwareFault::PeripheralFailure("port table full"))?;

        state.governor.start(link)?;
        info!("Attached port {}", port);
        Ok(state.governor.clone())
    }

    /// Routes a receive completion to the named port's governor.
    ///
    /// # Arguments
    ///
    /// * `port` - The port the completion arrived on
    /// * `link` - The link driver serving the port
    ///
    /// # Returns
    ///
    /// - `true` if the port is tracked and the event was counted
    /// - `false` if the port is unknown
    #[inline(always)]
    pub fn on_receive_complete<L: LinkDriver>(&self, port: &str, link: &L) -> bool {
        match self.ports.get(port) {
            Some(state) => {
                state.governor.on_receive_complete(link);
                true
            }
            None => false,
        }
    }

    /// Routes an epoch tick to the named port's reporter.
    ///
    /// # Arguments
    ///
    /// * `port` - The port whose epoch elapsed
    /// * `link` - The link driver serving the port
    /// * `sink` - Destination for the epoch report
    ///
    /// # Returns
    ///
    /// - `true` if the port is tracked and a report was emitted
    /// - `false` if the port is unknown
    #[inline]
    pub fn on_tick<L: LinkDriver, S: ReportSink>(
        &self,
        port: &str,
        link: &L,
        sink: &mut S,
    ) -> bool {
        match self.ports.get(port) {
            Some(state) => {
                state.on_tick(link, sink);
                true
            }
            None => false,
        }
    }

    /// Detaches the named port and forgets its governor.
    ///
    /// The link itself is untouched. Flow control stays wherever the
    /// governor left it, so release it on the link before detaching if
    /// the port should keep receiving unmanaged.
    ///
    /// # Returns
    ///
    /// `true` if the port was tracked.
    pub fn detach(&self, port: &str) -> bool {
        match self.ports.remove(port) {
            Some(_) => {
                self.active_count.fetch_sub(1, Ordering::AcqRel);
                self.total_detached.fetch_add(1, Ordering::Relaxed);
                info!("Detached port {}", port);
                true
            }
            None => false,
        }
    }

    /// Performs routine cleanup of idle ports.
    ///
    /// This method detaches ports whose governors have seen no
    /// completions recently, freeing table capacity.
    ///
    /// ## Cleanup Strategy
    ///
    /// - Normal mode: Detach ports idle for `inactive_duration_ms`
    /// - High usage mode: More aggressive (half the duration)
    /// - Also shrinks the internal map if significantly oversized
    pub fn cleanup(&self) {
        let before = self.active_count.load(Ordering::Acquire);

        // Adjust threshold based on current usage
        let threshold = if before > PRESSURE_THRESHOLD {
            self.inactive_duration_ms / 2
        } else {
            self.inactive_duration_ms
        };

        let mut removed = 0;

        self.ports.retain(|port, state| {
            if !state.governor.is_inactive(threshold) {
                true
            } else {
                debug!("Detaching idle port: {}", port);
                removed += 1;
                self.active_count.fetch_sub(1, Ordering::AcqRel);
                false
            }
        });

        if removed > 0 {
            self.total_detached.fetch_add(removed, Ordering::Relaxed);
            debug!("Cleanup detached {} idle ports", removed);
        }

        self.shrink_to_fit();
    }

    /// Shrinks the internal map if it has significant overcapacity.
    pub fn shrink_to_fit(&self) {
        let current_size = self.active_count.load(Ordering::Acquire);
        let capacity = self.ports.capacity();

        // Shrink if capacity is more than 4x the current size
        if capacity > current_size * 4 && capacity > 256 {
            self.ports.shrink_to_fit();
            debug!("Shrunk port map capacity from {} to ~{}", capacity, current_size);
        }
    }

    /// Returns the number of currently attached ports.
    #[inline]
    pub fn active_ports(&self) -> usize {
        self.active_count.load(Ordering::Acquire)
    }

    /// Returns comprehensive statistics about the manager.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::new(config);
    /// let stats = manager.stats();
    /// println!("{}", stats.summary());
    ///
    /// if stats.is_near_capacity() {
    ///     println!("Warning: port table nearly full");
    /// }
    /// ```
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            active_ports: self.active_ports(),
            total_attached: self.total_attached.load(Ordering::Relaxed),
            total_detached: self.total_detached.load(Ordering::Relaxed),
            capacity_used: self.active_ports() as f64 / MAX_TRACKED_PORTS as f64,
            max_capacity: MAX_TRACKED_PORTS,
        }
    }

    /// Starts an automatic cleanup thread.
    ///
    /// The thread runs indefinitely, sweeping for idle ports at
    /// regular intervals.
    ///
    /// # Returns
    ///
    /// A `JoinHandle` for the cleanup thread.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = Arc::new(PortGovernorManager::new(config));
    /// let handle = manager.clone().start_cleanup_thread();
    ///
    /// // The cleanup thread is now running in the background
    /// // It will run until the program exits
    /// ```
    pub fn start_cleanup_thread(self: Arc<Self>) -> thread::JoinHandle<()> {
        let manager = self.clone();

        thread::Builder::new()
            .name("weir-cleanup".to_string())
            .spawn(move || {
                info!(
                    "Started cleanup thread (interval: {}ms, idle threshold: {}ms)",
                    manager.cleanup_interval_ms, manager.inactive_duration_ms
                );

                loop {
                    thread::sleep(Duration::from_millis(manager.cleanup_interval_ms));
                    manager.cleanup();

                    let active = manager.active_ports();
                    if active > PRESSURE_THRESHOLD {
                        warn!(
                            "High port usage: {} attached ({}% of capacity)",
                            active,
                            (active * 100) / MAX_TRACKED_PORTS
                        );
                    }
                }
            })
            .expect("Failed to spawn cleanup thread")
    }

    /// Starts a stoppable cleanup thread.
    ///
    /// Similar to `start_cleanup_thread`, but can be stopped by
    /// sending a signal through the returned channel.
    ///
    /// # Returns
    ///
    /// A tuple of:
    /// - `JoinHandle` for the cleanup thread
    /// - `Sender` to signal the thread to stop
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = Arc::new(PortGovernorManager::new(config));
    /// let (handle, stop_tx) = manager.clone().start_stoppable_cleanup_thread();
    ///
    /// // Later, to stop the thread:
    /// stop_tx.send(()).unwrap();
    /// handle.join().unwrap();
    /// ```
    pub fn start_stoppable_cleanup_thread(
        self: Arc<Self>,
    ) -> (thread::JoinHandle<()>, mpsc::Sender<()>) {
        let (stop_tx, stop_rx) = mpsc::channel();
        let manager = self.clone();

        let handle = thread::Builder::new()
            .name("weir-cleanup".to_string())
            .spawn(move || {
                info!(
                    "Started stoppable cleanup thread (interval: {}ms)",
                    manager.cleanup_interval_ms
                );

                loop {
                    match stop_rx.recv_timeout(Duration::from_millis(manager.cleanup_interval_ms)) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("Cleanup thread stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            manager.cleanup();

                            let active = manager.active_ports();
                            if active > PRESSURE_THRESHOLD {
                                warn!(
                                    "High port usage: {} attached ({}% of capacity)",
                                    active,
                                    (active * 100) / MAX_TRACKED_PORTS
                                );
                            }
                        }
                    }
                }
            })
            .expect("Failed to spawn cleanup thread");

        (handle, stop_tx)
    }

    /// Detaches all ports.
    ///
    /// This removes every governed port and resets the manager to an
    /// empty state. Useful for testing or emergency resets.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::new(config);
    /// manager.clear();
    /// assert_eq!(manager.active_ports(), 0);
    /// ```
    pub fn clear(&self) {
        let count = self.ports.len();
        self.ports.clear();
        self.active_count.store(0, Ordering::Release);
        self.total_detached.fetch_add(count as u64, Ordering::Relaxed);
        info!("Detached all {} ports", count);
    }
}

impl std::fmt::Debug for PortGovernorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortGovernorManager")
            .field("active_ports", &self.active_ports())
            .field("cleanup_interval_ms", &self.cleanup_interval_ms)
            .field("inactive_duration_ms", &self.inactive_duration_ms)
            .finish()
    }
}

/// Statistics for the port governor manager.
///
/// ## Metrics Explained
///
/// - **active_ports**: Current number of attached ports
/// - **total_attached**: Lifetime count of governors created
/// - **total_detached**: Lifetime count of governors removed
/// - **capacity_used**: Fraction of the table in use
/// - **max_capacity**: Maximum number of ports that can be tracked
#[derive(Debug, Clone)]
pub struct ManagerStats {
    /// Number of currently attached ports.
    pub active_ports: usize,

    /// Total number of governors created since startup.
    pub total_attached: u64,

    /// Total number of governors detached since startup.
    pub total_detached: u64,

    /// Fraction of capacity currently in use (0.0 to 1.0).
    pub capacity_used: f64,

    /// Maximum number of ports that can be tracked.
    pub max_capacity: usize,
}

impl ManagerStats {
    /// Returns a human-readable summary of the statistics.
    ///
    /// # Example
    ///
    /// ```rust
    /// use weir::{GovernorConfig, PortGovernorManager};
    ///
    /// let config = GovernorConfig::new(1, 500, 1000);
    /// let manager = PortGovernorManager::new(config);
    /// println!("{}", manager.stats().summary());
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "Port Governor Manager Stats:\n\
             ├─ Capacity:\n\
             │  ├─ Active Ports: {}/{}\n\
             │  ├─ Capacity Used: {:.2}%\n\
             │  └─ Available Slots: {}\n\
             └─ Lifetime:\n\
                ├─ Total Attached: {}\n\
                ├─ Total Detached: {}\n\
                └─ Net Active: {}",
            self.active_ports,
            self.max_capacity,
            self.capacity_used * 100.0,
            self.max_capacity - self.active_ports,
            self.total_attached,
            self.total_detached,
            self.total_attached.saturating_sub(self.total_detached)
        )
    }

    /// Checks if the manager is approaching capacity.
    ///
    /// Returns `true` if using more than 80% of the table.
    pub fn is_near_capacity(&self) -> bool {
        self.capacity_used > 0.8
    }

    /// Returns the detach-to-attach ratio.
    ///
    /// A ratio near 1.0 means most attached ports have since been
    /// detached. A low ratio on a long-lived process means the port
    /// population is stable.
    pub fn churn_ratio(&self) -> f64 {
        if self.total_attached == 0 {
            0.0
        } else {
            self.total_detached as f64 / self.total_attached as f64
        }
    }
}

impl std::fmt::Display for ManagerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::link::SimLink;
    use crate::governor::report::MemorySink;

    fn drain(manager: &PortGovernorManager, port: &str, link: &SimLink, max: usize) -> u64 {
        let mut total = 0;
        for _ in 0..max {
            match link.try_deliver() {
                Some(unit) => {
                    assert!(manager.on_receive_complete(port, link));
                    total += unit as u64;
                }
                None => break,
            }
        }
        total
    }

    #[test]
    fn test_per_port_isolation() {
        let config = GovernorConfig::new(1, 5, 1000);
        let manager = PortGovernorManager::new(config);

        let link_a = SimLink::new();
        let link_b = SimLink::new();
        manager.attach("ttyS0", &link_a).unwrap();
        manager.attach("ttyS1", &link_b).unwrap();

        // Each port spends its own budget
        assert_eq!(drain(&manager, "ttyS0", &link_a, 100), 5);
        assert_eq!(drain(&manager, "ttyS1", &link_b, 100), 5);

        assert!(link_a.is_flow_asserted());
        assert!(link_b.is_flow_asserted());
        assert_eq!(manager.active_ports(), 2);
    }

    #[test]
    fn test_get_port_returns_same_state() {
        let manager = PortGovernorManager::new(GovernorConfig::default());

        let first = manager.get_port("ttyUSB0").unwrap();
        let second = manager.get_port("ttyUSB0").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.active_ports(), 1);
        assert_eq!(manager.stats().total_attached, 1);
    }

    #[test]
    fn test_double_attach_is_receiver_busy() {
        let manager = PortGovernorManager::new(GovernorConfig::default());
        let link = SimLink::new();

        manager.attach("ttyACM0", &link).unwrap();
        let err = manager.attach("ttyACM0", &link).unwrap_err();

        assert!(matches!(err, HardwareFault::ReceiverBusy { pending: 1 }));
    }

    #[test]
    fn test_unknown_port_events_are_ignored() {
        let manager = PortGovernorManager::new(GovernorConfig::default());
        let link = SimLink::new();
        let mut sink = MemorySink::new();

        assert!(!manager.on_receive_complete("ttyS9", &link));
        assert!(!manager.on_tick("ttyS9", &link, &mut sink));
        assert!(sink.is_empty());
        assert_eq!(manager.active_ports(), 0);
    }

    #[test]
    fn test_on_tick_reports_and_accumulates() {
        let config = GovernorConfig::new(1, 500, 1000);
        let manager = PortGovernorManager::new(config);
        let link = SimLink::new();
        let mut sink = MemorySink::new();

        manager.attach("ttyS0", &link).unwrap();
        assert_eq!(drain(&manager, "ttyS0", &link, 3), 3);

        assert!(manager.on_tick("ttyS0", &link, &mut sink));
        assert!(manager.on_tick("ttyS0", &link, &mut sink));

        assert_eq!(sink.records()[0].epoch_bytes, 3);
        assert_eq!(sink.records()[0].total_bytes, 3);
        assert_eq!(sink.records()[1].epoch_bytes, 0);
        assert_eq!(sink.records()[1].total_bytes, 3);
    }

    #[test]
    fn test_on_tick_resumes_suspended_port() {
        let config = GovernorConfig::new(1, 5, 1000);
        let manager = PortGovernorManager::new(config);
        let link = SimLink::new();
        let mut sink = MemorySink::new();

        let governor = manager.attach("ttyS0", &link).unwrap();
        assert_eq!(drain(&manager, "ttyS0", &link, 100), 5);
        assert!(link.is_flow_asserted());
        assert!(!governor.is_armed());

        assert!(manager.on_tick("ttyS0", &link, &mut sink));

        assert!(!link.is_flow_asserted());
        assert!(governor.is_armed());
        assert_eq!(sink.last().unwrap().epoch_bytes, 5);
    }

    #[test]
    fn test_detach() {
        let manager = PortGovernorManager::new(GovernorConfig::default());
        let link = SimLink::new();

        manager.attach("ttyS0", &link).unwrap();
        assert_eq!(manager.active_ports(), 1);

        assert!(manager.detach("ttyS0"));
        assert!(!manager.detach("ttyS0"));

        assert_eq!(manager.active_ports(), 0);
        assert_eq!(manager.stats().total_detached, 1);
    }

    #[test]
    fn test_capacity_limit() {
        let manager = PortGovernorManager::new(GovernorConfig::default());

        // Manually set the active count to MAX rather than attaching
        // hundreds of ports
        manager.active_count.store(MAX_TRACKED_PORTS, Ordering::Release);

        assert!(manager.get_port("ttyS0").is_none());

        let link = SimLink::new();
        let err = manager.attach("ttyS0", &link).unwrap_err();
        assert!(matches!(err, HardwareFault::PeripheralFailure(_)));

        // Reset
        manager.active_count.store(0, Ordering::Release);
    }

    #[test]
    fn test_cleanup_detaches_idle_ports() {
        let manager = PortGovernorManager::with_cleanup_settings(
            GovernorConfig::default(),
            1000,
            50, // Very short idle duration for testing
        );

        for i in 0..10 {
            manager.get_port(&format!("ttyS{}", i));
        }

        assert_eq!(manager.active_ports(), 10);

        // Wait for them to go idle
        thread::sleep(Duration::from_millis(100));

        manager.cleanup();

        assert_eq!(manager.active_ports(), 0);
        assert_eq!(manager.stats().total_detached, 10);
    }

    #[test]
    fn test_cleanup_keeps_busy_ports() {
        let manager = PortGovernorManager::with_cleanup_settings(
            GovernorConfig::default(),
            1000,
            150,
        );

        let busy_link = SimLink::new();
        manager.attach("ttyS0", &busy_link).unwrap();
        manager.get_port("ttyS1");

        thread::sleep(Duration::from_millis(200));

        // Traffic refreshes ttyS0's idle clock
        drain(&manager, "ttyS0", &busy_link, 1);

        manager.cleanup();

        assert_eq!(manager.active_ports(), 1);
        assert!(manager.get_port("ttyS0").is_some());
    }

    #[test]
    fn test_manager_stats() {
        let manager = PortGovernorManager::new(GovernorConfig::default());

        for i in 0..5 {
            manager.get_port(&format!("ttyS{}", i));
        }

        let stats = manager.stats();
        assert_eq!(stats.active_ports, 5);
        assert_eq!(stats.total_attached, 5);
        assert_eq!(stats.total_detached, 0);
        assert!(stats.capacity_used > 0.0);
        assert!(!stats.is_near_capacity());
        assert_eq!(stats.churn_ratio(), 0.0);

        let summary = stats.summary();
        assert!(summary.contains("Active Ports: 5"));
    }

    #[test]
    fn test_clear() {
        let manager = PortGovernorManager::new(GovernorConfig::default());

        for i in 0..10 {
            manager.get_port(&format!("ttyUSB{}", i));
        }

        assert_eq!(manager.active_ports(), 10);

        manager.clear();

        assert_eq!(manager.active_ports(), 0);
        assert_eq!(manager.stats().total_detached, 10);
    }

    #[test]
    fn test_concurrent_get_port_race() {
        let manager = Arc::new(PortGovernorManager::new(GovernorConfig::default()));

        // Multiple threads racing to create the same port
        let mut handles = vec![];
        for _ in 0..10 {
            let manager_clone = manager.clone();
            handles.push(thread::spawn(move || {
                manager_clone.get_port("ttyUSB0").is_some()
            }));
        }

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // All should succeed
        assert!(results.iter().all(|&r| r));

        // Should have created only one governor
        assert_eq!(manager.active_ports(), 1);
        assert_eq!(manager.stats().total_attached, 1);
    }

    #[test]
    fn test_concurrent_completions_across_ports() {
        let config = GovernorConfig::new(1, 10_000, 1000);
        let manager = Arc::new(PortGovernorManager::new(config));

        let mut handles = vec![];
        for thread_id in 0..8 {
            let manager_clone = manager.clone();
            handles.push(thread::spawn(move || {
                let port = format!("ttyS{}", thread_id);
                let link = SimLink::new();
                manager_clone.attach(&port, &link).unwrap();

                let mut delivered = 0u64;
                for _ in 0..500 {
                    if link.try_deliver().is_some() {
                        manager_clone.on_receive_complete(&port, &link);
                        delivered += 1;
                    }
                }
                (port, delivered)
            }));
        }

        for handle in handles {
            let (port, delivered) = handle.join().unwrap();
            assert_eq!(delivered, 500);
            let state = manager.get_port(&port).unwrap();
            assert_eq!(state.governor().metrics().epoch_bytes, 500);
        }

        assert_eq!(manager.active_ports(), 8);
    }

    #[test]
    fn test_stoppable_cleanup_thread() {
        let manager = Arc::new(PortGovernorManager::with_cleanup_settings(
            GovernorConfig::default(),
            40,
            30,
        ));

        for i in 0..5 {
            manager.get_port(&format!("ttyS{}", i));
        }

        let (handle, stop_tx) = manager.clone().start_stoppable_cleanup_thread();

        // Let at least one sweep run after the ports go idle
        thread::sleep(Duration::from_millis(150));

        stop_tx.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(manager.active_ports(), 0);
    }

    #[test]
    fn test_cleanup_thread() {
        let manager = Arc::new(PortGovernorManager::with_cleanup_settings(
            GovernorConfig::default(),
            40,
            30,
        ));

        for i in 0..5 {
            manager.get_port(&format!("ttyACM{}", i));
        }

        let handle = manager.clone().start_cleanup_thread();

        thread::sleep(Duration::from_millis(150));

        assert_eq!(manager.active_ports(), 0);

        // Thread continues running until the process exits
        drop(handle);
    }
}
