//! Gesture receiver - prints detected gestures
//!
//! Run with: cargo run --example gesture_receiver
//!
//! With a broker (pair with `transmitter --features amqp`):
//!   cargo run --example gesture_receiver --features amqp
//!
//! Gesture bags share the last-value rules of body bags: a consumer that
//! falls behind sees only the newest gestures. Without the `amqp` feature
//! an in-process publisher sends a gesture every second.
//!
//! Press Ctrl+C to stop.

use skeleton_bus::{BrokerConfig, Error, GestureSubscription, MessageBus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skeleton_bus=info".parse()?)
                .add_directive("gesture_receiver=info".parse()?),
        )
        .init();

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
    let mut gestures = GestureSubscription::bind(
        bus.clone(),
        &config.exchange,
        &config.gesture_binding_key,
        &config.queue,
    )
    .await?;
    tracing::info!(binding_key = %gestures.binding_key(), "Waiting for gestures");

    loop {
        let bag = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            bag = gestures.dequeue() => bag,
        };
        match bag {
            Ok(bag) => {
                for gesture in &bag.items {
                    println!("{}: {}", bag.sensor_id, gesture);
                }
            }
            Err(Error::Closed) => break,
            Err(e) => tracing::warn!(error = %e, "Dropped frame"),
        }
    }

    gestures.dispose().await?;
    Ok(())
}

#[cfg(not(feature = "amqp"))]
async fn spawn_simulated_sender(
    bus: skeleton_bus::LocalBus,
    config: &BrokerConfig,
) -> skeleton_bus::Result<()> {
    use std::time::Duration;

    use skeleton_bus::transport::GESTURE_TOPIC;
    use skeleton_bus::{BagPublisher, Gesture, GestureBag};

    let publisher = BagPublisher::from_config(bus, config)?;
    publisher.declare().await?;

    tokio::spawn(async move {
        let sensor = publisher.sender_id().to_string();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        for step in 0u32.. {
            ticker.tick().await;
            let gesture = if step % 2 == 0 {
                Gesture::discrete("Wave", 1, 0.87)
            } else {
                Gesture::continuous("Swipe", 1, (step % 10) as f32 / 10.0)
            };
            let bag = GestureBag::new(sensor.as_str(), vec![gesture]);
            if let Err(e) = publisher.publish_bag(GESTURE_TOPIC, &bag).await {
                tracing::warn!(error = %e, "Simulated publish failed");
            }
        }
    });
    Ok(())
}
