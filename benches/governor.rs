//! # Governor Benchmarks
//!
//! Comprehensive performance benchmarks for the rate governor library.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use weir::{
    EpochReport, EpochReporter, GovernorConfig, HardwareFault, LinkDriver, MemoryOrdering,
    PortGovernorManager, RateGovernor, ReportSink, SimLink, TextSink,
};

/// Link driver that accepts every request and holds no state.
///
/// Keeps the measurements on the governor itself instead of on the
/// simulated receive slot.
struct OpenLink;

impl LinkDriver for OpenLink {
    fn arm_receive(&self, _unit: u32) -> Result<(), HardwareFault> {
        Ok(())
    }

    fn set_flow_control(&self, _asserted: bool) {}
}

/// Sink that drops every record.
struct NullSink;

impl ReportSink for NullSink {
    fn emit(&mut self, _report: &EpochReport) {}
}

/// Benchmark the two paths of the completion handler
fn bench_receive_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive_complete");
    group.throughput(Throughput::Elements(1));

    // Budget never runs out: every completion re-arms
    group.bench_function("armed_path", |b| {
        let governor = RateGovernor::new(1, u64::MAX / 2);
        let link = OpenLink;

        b.iter(|| governor.on_receive_complete(&link));
    });

    // Budget spent on the first byte: every completion lands on the
    // flow-control branch
    group.bench_function("suspended_path", |b| {
        let governor = RateGovernor::new(1, 1);
        let link = OpenLink;

        b.iter(|| governor.on_receive_complete(&link));
    });

    group.finish();
}

/// Benchmark different transfer unit sizes
fn bench_transfer_units(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_units");

    for unit in [1u32, 4, 16, 64] {
        group.throughput(Throughput::Bytes(unit as u64));
        group.bench_with_input(BenchmarkId::from_parameter(unit), &unit, |b, &unit| {
            let config = GovernorConfig::new(unit, u64::MAX / 2, 1000);
            let governor = RateGovernor::with_config(config);
            let link = OpenLink;

            b.iter(|| governor.on_receive_complete(&link));
        });
    }

    group.finish();
}

/// Benchmark different memory orderings
fn bench_memory_orderings(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_orderings");

    let orderings = [
        ("Relaxed", MemoryOrdering::Relaxed),
        ("AcquireRelease", MemoryOrdering::AcquireRelease),
        ("Sequential", MemoryOrdering::Sequential),
    ];

    for (name, ordering) in orderings {
        group.bench_function(name, |b| {
            let config = GovernorConfig::new(1, u64::MAX / 2, 1000).with_ordering(ordering);
            let governor = RateGovernor::with_config(config);
            let link = OpenLink;

            b.iter(|| governor.on_receive_complete(&link));
        });
    }

    group.finish();
}

/// Benchmark concurrent completion handling
fn bench_concurrent_completions(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_completions");

    for num_threads in [2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let governor = Arc::new(RateGovernor::new(1, u64::MAX / 2));

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        governor.reset(); // Fresh epoch between iterations
                        let governor_clone = governor.clone();

                        let start = std::time::Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let governor = governor_clone.clone();
                                thread::spawn(move || {
                                    let link = OpenLink;
                                    for _ in 0..1000 {
                                        governor.on_receive_complete(&link);
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the full deliver/complete cycle against the simulated link
fn bench_receive_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive_cycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("deliver_then_complete", |b| {
        let governor = RateGovernor::new(1, u64::MAX / 2);
        let link = SimLink::new();
        governor.start(&link).unwrap();

        b.iter(|| {
            std::hint::black_box(link.try_deliver());
            governor.on_receive_complete(&link);
        });
    });

    group.finish();
}

/// Benchmark the epoch tick handler
fn bench_epoch_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("epoch_tick");

    group.bench_function("tick_idle", |b| {
        let governor = Arc::new(RateGovernor::new(1, u64::MAX / 2));
        let mut reporter = EpochReporter::new(governor);
        let link = OpenLink;
        let mut sink = NullSink;

        b.iter(|| reporter.on_tick(&link, &mut sink));
    });

    group.bench_function("tick_format_and_write", |b| {
        let governor = Arc::new(RateGovernor::new(1, u64::MAX / 2));
        let mut reporter = EpochReporter::new(governor);
        let link = OpenLink;
        let mut sink = TextSink::new(std::io::sink());

        b.iter(|| reporter.on_tick(&link, &mut sink));
    });

    group.bench_function("tick_resume", |b| {
        let governor = Arc::new(RateGovernor::new(1, 64));
        let link = OpenLink;
        let mut reporter = EpochReporter::new(Arc::clone(&governor));
        let mut sink = NullSink;

        b.iter_batched(
            || {
                // Drive the epoch to its cutoff so the tick has to resume
                for _ in 0..64 {
                    governor.on_receive_complete(&link);
                }
            },
            |_| reporter.on_tick(&link, &mut sink),
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

/// Benchmark metrics collection
fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    group.bench_function("get_metrics", |b| {
        let governor = RateGovernor::new(1, u64::MAX / 2);
        let link = OpenLink;

        // Generate some activity
        for _ in 0..500 {
            governor.on_receive_complete(&link);
        }

        b.iter(|| std::hint::black_box(governor.metrics()));
    });

    group.bench_function("link_health", |b| {
        let governor = RateGovernor::new(1, 100);
        let link = OpenLink;

        // Drive the epoch past its budget so the snapshot shows a pause
        for _ in 0..100 {
            governor.on_receive_complete(&link);
        }

        b.iter(|| {
            let metrics = governor.metrics();
            std::hint::black_box(metrics.link_health())
        });
    });

    group.finish();
}

/// Benchmark the port governor manager
fn bench_port_manager(c: &mut Criterion) {
    let mut group = c.benchmark_group("port_manager");

    group.bench_function("get_port", |b| {
        let config = GovernorConfig::new(1, 500, 1000);
        let manager = PortGovernorManager::new(config);

        b.iter(|| std::hint::black_box(manager.get_port("ttyS0")));
    });

    group.bench_function("completion_routed", |b| {
        let config = GovernorConfig::new(1, u64::MAX / 2, 1000);
        let manager = PortGovernorManager::new(config);
        let link = OpenLink;
        manager.attach("ttyS0", &link).unwrap();

        b.iter(|| std::hint::black_box(manager.on_receive_complete("ttyS0", &link)));
    });

    group.bench_function("multiple_ports", |b| {
        let config = GovernorConfig::new(1, u64::MAX / 2, 1000);
        let manager = PortGovernorManager::new(config);
        let link = OpenLink;

        // Routing only counts for ports the manager knows about
        let names: Vec<String> = (0..=255).map(|i| format!("ttyS{}", i)).collect();
        for name in &names {
            manager.get_port(name);
        }
        let mut counter = 0u8;

        b.iter(|| {
            counter = counter.wrapping_add(1);
            std::hint::black_box(manager.on_receive_complete(&names[counter as usize], &link))
        });
    });

    group.finish();
}

/// Benchmark concurrent manager access
fn bench_port_manager_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("port_manager_concurrent");

    for num_threads in [4, 8, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let config = GovernorConfig::new(1, u64::MAX / 2, 1000);
                let manager = PortGovernorManager::new(config);

                for thread_id in 0..num_threads {
                    manager.get_port(&format!("ttyS{}", thread_id));
                }

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        let start = std::time::Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|thread_id| {
                                let manager = manager.clone();
                                thread::spawn(move || {
                                    let link = OpenLink;
                                    let port = format!("ttyS{}", thread_id);
                                    for _ in 0..100 {
                                        manager.on_receive_complete(&port, &link);
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

/// Benchmark manager cleanup operations
fn bench_port_manager_cleanup(c: &mut Criterion) {
    let mut group = c.benchmark_group("port_manager_cleanup");

    group.bench_function("cleanup_100_ports", |b| {
        let config = GovernorConfig::new(1, 500, 1000);
        let manager = PortGovernorManager::with_cleanup_settings(
            config, 1000, 1, // Very short inactive duration for benchmark
        );

        b.iter_batched(
            || {
                // Setup: populate 100 ports
                for i in 0..100 {
                    manager.get_port(&format!("ttyS{}", i));
                }
                // Wait to make them inactive
                thread::sleep(Duration::from_millis(5));
            },
            |_| {
                manager.cleanup();
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

/// Benchmark reset operations
fn bench_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset");

    group.bench_function("reset_governor", |b| {
        let governor = RateGovernor::new(1, u64::MAX / 2);
        let link = OpenLink;

        // Accumulate counters worth clearing
        for _ in 0..500 {
            governor.on_receive_complete(&link);
        }

        b.iter(|| {
            governor.reset();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_receive_complete,
    bench_transfer_units,
    bench_memory_orderings,
    bench_concurrent_completions,
    bench_receive_cycle,
    bench_epoch_tick,
    bench_metrics,
    bench_port_manager,
    bench_port_manager_concurrent,
    bench_port_manager_cleanup,
    bench_reset,
);

criterion_main!(benches);
