//! Basic usage example for the weir crate.

use std::sync::Arc;
use weir::{EpochReporter, GovernorConfig, MemoryOrdering, MemorySink, RateGovernor, SimLink};

fn main() {
    println!("=== Basic Rate Governor Example ===\n");

    // Example 1: Simple governed intake
    simple_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Custom configuration
    custom_config_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Epoch reports
    report_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Monitoring metrics
    metrics_example();

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 5: Suspension and resumption
    resumption_example();
}

fn simple_example() {
    println!("1. Simple Governed Intake:");

    // Govern a link to 10 bytes per epoch
    let governor = RateGovernor::new(1, 10);
    let link = SimLink::new();
    governor.start(&link).expect("link refused the first arm");

    println!("   Created governor with a 10-byte epoch budget");

    // The peer tries to push 15 bytes
    let mut accepted = 0;
    let mut held = 0;

    for i in 1..=15 {
        if link.try_deliver().is_some() {
            governor.on_receive_complete(&link);
            accepted += 1;
            println!("   Byte {} - ✅ Accepted", i);
        } else {
            held += 1;
            println!("   Byte {} - ⛔ Flow control holding", i);
        }
    }

    println!("   Results: {} accepted, {} held back", accepted, held);
    println!(
        "   Flow-control line asserted: {}",
        link.is_flow_asserted()
    );
}

fn custom_config_example() {
    println!("2. Custom Configuration:");

    // Accept 4 KiB per second, armed 16 bytes at a time
    let config = GovernorConfig::bytes_per_second(4096)
        .with_transfer_unit(16)
        .with_ordering(MemoryOrdering::Relaxed); // Use relaxed ordering for better performance

    println!("   Configuration:");
    println!("   - Transfer unit: {} bytes per arm", config.transfer_unit);
    println!("   - Epoch budget: {} bytes", config.rate_threshold);
    println!(
        "   - Effective rate: {} bytes/second",
        config.effective_rate_per_second()
    );
    println!(
        "   - Worst-case epoch: {} bytes",
        config.max_epoch_bytes()
    );
    println!("   - Memory ordering: {:?}", config.ordering);

    let governor = RateGovernor::with_config(config);
    let link = SimLink::new();
    governor.start(&link).expect("link refused the first arm");

    // Count whole transfers before the budget bites
    let mut transfers = 0u64;
    while link.try_deliver().is_some() {
        governor.on_receive_complete(&link);
        transfers += 1;
    }

    println!(
        "   Budget test: {} transfers ({} bytes) before the pause",
        transfers,
        transfers * 16
    );
}

fn report_example() {
    println!("3. Epoch Reports:");

    let governor = Arc::new(RateGovernor::new(1, 500));
    let link = SimLink::new();
    governor.start(&link).expect("link refused the first arm");

    let mut reporter = EpochReporter::new(Arc::clone(&governor));
    let mut sink = MemorySink::new();

    // Three epochs of uneven traffic
    for bytes in [120u32, 500, 0] {
        for _ in 0..bytes {
            if link.try_deliver().is_some() {
                governor.on_receive_complete(&link);
            }
        }
        reporter.on_tick(&link, &mut sink);
    }

    println!("   Reports ({} epochs):", sink.len());
    for report in sink.records() {
        println!("   {}", report.format_line());
    }
}

fn metrics_example() {
    println!("4. Monitoring and Metrics:");

    let governor = RateGovernor::new(1, 20);
    let link = SimLink::new();
    governor.start(&link).expect("link refused the first arm");

    // Saturate the epoch
    while link.try_deliver().is_some() {
        governor.on_receive_complete(&link);
    }

    let metrics = governor.metrics();

    println!("   Governor Metrics:");
    println!(
        "   - Epoch bytes: {}/{}",
        metrics.epoch_bytes, metrics.rate_threshold
    );
    println!("   - Budget used: {:.2}%", metrics.utilization() * 100.0);
    println!("   - Budget remaining: {} bytes", metrics.budget_remaining());
    println!("   - Completions: {}", metrics.total_completions);
    println!("   - Suspensions: {}", metrics.total_suspensions);
    println!("   - Reception armed: {}", metrics.reception_armed);

    // Check link health
    let health = metrics.link_health();
    println!("   - Link health: {:?}", health);
    println!("   - Meaning: {}", health.describe());
}

fn resumption_example() {
    println!("5. Suspension and Resumption:");

    let governor = Arc::new(RateGovernor::new(1, 5));
    let link = SimLink::new();
    governor.start(&link).expect("link refused the first arm");

    println!("   Configuration: 5 bytes per epoch");

    for i in 1..=5 {
        if link.try_deliver().is_some() {
            governor.on_receive_complete(&link);
            println!("   Byte {} received", i);
        }
    }

    println!(
        "   Budget spent, flow asserted: {}",
        link.is_flow_asserted()
    );

    // Try to deliver without waiting (should fail)
    if link.try_deliver().is_none() {
        println!("   ⛔ Peer is held: nothing armed");
    }

    // The epoch tick releases the peer
    println!("   Ticking the epoch...");
    let mut reporter = EpochReporter::new(Arc::clone(&governor));
    let mut sink = MemorySink::new();
    reporter.on_tick(&link, &mut sink);

    println!(
        "   Report: {}",
        sink.last().expect("tick always reports").format_line()
    );
    println!("   Flow asserted: {}", link.is_flow_asserted());

    // Intake flows again
    if link.try_deliver().is_some() {
        governor.on_receive_complete(&link);
        println!("   ✅ Byte received after resumption!");
    }

    // Demonstrate reset
    println!("\n   Resetting the governor...");
    governor.reset();

    let metrics = governor.metrics();
    println!("   After reset:");
    println!("   - Total bytes: {}", metrics.total_bytes);
    println!("   - Total epochs: {}", metrics.total_epochs);
    println!("   - Suspensions: {}", metrics.total_suspensions);
}
