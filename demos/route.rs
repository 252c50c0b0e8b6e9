//! Routing example.
//!
//! Captures the default output mix and plays it on the first two output
//! devices: the first with bass boost and a limiter, the second 120 ms late
//! with a touch of reverb.
//!
//! Run with: cargo run --example route
//! Logging is controlled by `RUST_LOG`, e.g. `RUST_LOG=echo_route=debug`.

use std::time::Duration;

use echo_route::effects::{BassBoost, Limiter, Reverb};
use echo_route::{event_channel, list_output_devices, OutputSink, Router, RouterEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("echo_route=info")),
        )
        .init();

    let devices = list_output_devices()?;
    if devices.len() < 2 {
        println!("Need at least two output devices, found {}", devices.len());
        return Ok(());
    }

    let (callback, mut events) = event_channel();
    let mut router = Router::builder().event_callback(callback).build();

    let mut devices = devices.into_iter();
    if let Some(device) = devices.next() {
        let sink = OutputSink::new(device);
        sink.add_effect(BassBoost::new().with_frequency(90.0).with_gain_db(6.0));
        sink.add_effect(Limiter::new().with_threshold_db(-1.0));
        router.add_sink(sink)?;
    }
    if let Some(device) = devices.next() {
        let sink = OutputSink::new(device).with_volume(0.7).with_delay_ms(120);
        sink.add_effect(Reverb::new().with_room_size(0.3).with_wet(0.2));
        router.add_sink(sink)?;
    }

    router.start()?;
    println!("Routing for 10 seconds...");

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            Some(event) = events.recv() => match event {
                RouterEvent::BufferOverflow { .. } => tracing::debug!(%event, "overflow"),
                other => println!("{other}"),
            },
        }
    }

    let stats = router.stats();
    router.stop();

    println!("Stats: {stats:?}");
    for sink in router.sinks() {
        println!("{}: {:?}", sink.name(), sink.stats());
    }

    Ok(())
}
