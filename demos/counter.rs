//! Counter demo — the smallest full assembly.
//!
//! Wires a front-end/backend pair, installs the counter worker role, and
//! drives it the way the launcher UI would: subscribe to updates, trigger
//! a few commands, print what comes back.
//!
//! Run with: `cargo run --example counter`

use std::sync::Arc;
use std::time::Duration;

use launchwire::bus::{self, BusConfig};
use launchwire::workers::counter;
use launchwire::EndpointRegistry;

#[tokio::main]
async fn main() -> launchwire::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut registry = EndpointRegistry::new();
    counter::register(&mut registry)?;

    let (frontend, backend) = bus::pair(Arc::new(registry), BusConfig::default());
    let manager = Arc::new(counter::manager(backend.event_sink()));
    counter::install(&backend, manager.clone())?;

    let subscription = frontend.subscribe(counter::UPDATED, |update: counter::CounterUpdate| {
        println!("counter/updated -> {}", update.value);
    })?;

    for _ in 0..3 {
        let value: i64 = frontend.trigger(counter::INCREMENT, &()).await?;
        println!("increment -> {value}");
    }
    let value: i64 = frontend.trigger(counter::DECREMENT, &()).await?;
    println!("decrement -> {value}");

    // Let the last event delivery drain before tearing down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    subscription.release();
    manager.destroy().await;
    frontend.close();

    Ok(())
}
