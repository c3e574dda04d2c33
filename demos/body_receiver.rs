//! Body receiver - prints the freshest body bag, at the consumer's own pace
//!
//! Run with: cargo run --example body_receiver [READ_INTERVAL_MS]
//!
//! With a broker (pair with `transmitter --features amqp`):
//!   cargo run --example body_receiver --features amqp -- 250
//!
//! The receiver reads once per READ_INTERVAL_MS (default 100). Frames that
//! arrive in between replace each other, so every read shows the current
//! bodies and the overwritten count grows instead of a backlog. Without the
//! `amqp` feature an in-process publisher sends a frame every 16ms.
//!
//! Press Ctrl+C to stop.

use std::time::Duration;

use skeleton_bus::{BodyBag, BodySubscription, BrokerConfig, Error, MessageBus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skeleton_bus=info".parse()?)
                .add_directive("body_receiver=info".parse()?),
        )
        .init();

    let read_interval = match std::env::args().nth(1) {
        Some(ms) => Duration::from_millis(ms.parse()?),
        None => Duration::from_millis(100),
    };

    let config = BrokerConfig::from_env()?;
    config.validate()?;

    #[cfg(feature = "amqp")]
    let bus = skeleton_bus::AmqpBus::connect(&config).await?;

    #[cfg(not(feature = "amqp"))]
    let bus = {
        let bus = skeleton_bus::LocalBus::new();
        spawn_simulated_sender(bus.clone(), &config).await?;
        bus
    };

    bus.declare_exchange(&config.exchange).await?;
    let mut bodies = BodySubscription::bind(
        bus.clone(),
        &config.exchange,
        &config.body_binding_key,
        &config.queue,
    )
    .await?;

    let mut ticker = tokio::time::interval(read_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let bag = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            bag = bodies.dequeue() => bag,
        };
        match bag {
            Ok(bag) => print_bag(&bag),
            Err(Error::Closed) => break,
            Err(e) => tracing::warn!(error = %e, "Dropped frame"),
        }
    }

    let stats = bodies.stats();
    println!(
        "Messages: {} received, {} delivered, {} overwritten, {} expired, {} undecodable",
        stats.received, stats.delivered, stats.overwritten, stats.expired, stats.decode_errors
    );
    bodies.dispose().await?;
    Ok(())
}

fn print_bag(bag: &BodyBag) {
    if bag.is_empty() {
        println!("{}: nobody tracked", bag.sensor_id);
        return;
    }
    for body in &bag.items {
        println!("{}: {} frame {}", bag.sensor_id, body, body.priority);
    }
}

#[cfg(not(feature = "amqp"))]
async fn spawn_simulated_sender(
    bus: skeleton_bus::LocalBus,
    config: &BrokerConfig,
) -> skeleton_bus::Result<()> {
    use skeleton_bus::transport::BODY_TOPIC;
    use skeleton_bus::{BagPublisher, BodyRecord};

    let publisher = BagPublisher::from_config(bus, config)?;
    publisher.declare().await?;

    tokio::spawn(async move {
        let sensor = publisher.sender_id().to_string();
        let mut ticker = tokio::time::interval(Duration::from_millis(16));
        for frame in 0u64.. {
            ticker.tick().await;
            let mut body = BodyRecord::with_skeleton(&sensor, 1);
            // Frame counter, so skipped frames show up in the output
            body.priority = (frame % 1_000_000) as i32;
            let bag = BodyBag::new(sensor.as_str(), vec![body]);
            if let Err(e) = publisher.publish_bag(BODY_TOPIC, &bag).await {
                tracing::warn!(error = %e, "Simulated publish failed");
            }
        }
    });
    Ok(())
}
