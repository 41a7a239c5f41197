//! Reproduces the classic hard-handshake console session: a saturating
//! sender held to 500 bytes per second, one report line per epoch.
//!
//! Run with: `cargo run --example hard_handshake`
//!
//! Set `RUST_LOG=debug` to watch the governor suspend and resume.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use weir::{
    spawn_stoppable_epoch_clock, Banner, EpochReporter, GovernorConfig, RateGovernor, SimLink,
    TextSink,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut stdout = std::io::stdout();
    Banner::for_crate()
        .write_crlf(&mut stdout)
        .expect("console write failed");

    // The reference setup: byte-at-a-time reception, 500 bytes per
    // one-second epoch
    let config = GovernorConfig::new(1, 500, 1000);
    let governor = Arc::new(RateGovernor::with_config(config));
    let link = Arc::new(SimLink::new());

    governor.start(&link).expect("link refused the first arm");

    let reporter = EpochReporter::new(Arc::clone(&governor));
    let sink = TextSink::new(std::io::stdout());
    let (clock, stop_clock) = spawn_stoppable_epoch_clock(reporter, Arc::clone(&link), sink);

    // The peer: pushes bytes as fast as the flow-control line allows
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let sender = {
        let governor = Arc::clone(&governor);
        let link = Arc::clone(&link);
        thread::spawn(move || {
            let mut sent = 0u64;
            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
                    Err(mpsc::TryRecvError::Empty) => {}
                }
                match link.try_deliver() {
                    Some(unit) => {
                        sent += unit as u64;
                        governor.on_receive_complete(&link);
                    }
                    None => thread::sleep(Duration::from_millis(1)),
                }
            }
            sent
        })
    };

    thread::sleep(Duration::from_secs(5));

    stop_tx.send(()).ok();
    let sent = sender.join().expect("sender thread panicked");
    stop_clock.send(()).ok();
    let (reporter, _link, _sink) = clock.join().expect("clock thread panicked");

    println!();
    println!("Peer pushed {} bytes in 5 seconds", sent);
    println!("{}", reporter.governor().metrics().summary());
}
