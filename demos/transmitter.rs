//! Transmitter - publishes frames from a simulated sensor
//!
//! Run with: cargo run --example transmitter
//!
//! With a broker:
//!   cargo run --example transmitter --features amqp
//!
//! Broker settings come from SKELETON_BUS_* environment variables
//! (SKELETON_BUS_HOST, SKELETON_BUS_PORT, SKELETON_BUS_EXCHANGE,
//! SKELETON_BUS_SENDER_ID, ...). Without the `amqp` feature frames go to an
//! in-process bus and a local subscriber prints what it receives.
//!
//! The simulated sensor runs on its own thread at 30 frames per second,
//! the way a hardware driver calls back. One body walks in, raises and
//! lowers its left arm, sits down, and leaves; the cycle then repeats after
//! a stretch with nobody in view. Only the first empty frame of each such
//! stretch is sent.
//!
//! Press Ctrl+C to stop.

use std::thread;
use std::time::Duration;

use skeleton_bus::body::{Gesture, Joint, JointType, TrackingState, Vector3};
use skeleton_bus::sensor::DEFAULT_FRAME_QUEUE;
use skeleton_bus::{BagPublisher, BodyRecord, BrokerConfig, FrameDistributor, FrameSink};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const CYCLE_FRAMES: u64 = 300;

#[cfg(feature = "amqp")]
async fn connect(config: &BrokerConfig) -> skeleton_bus::Result<skeleton_bus::AmqpBus> {
    skeleton_bus::AmqpBus::connect(config).await
}

#[cfg(not(feature = "amqp"))]
async fn connect(_config: &BrokerConfig) -> skeleton_bus::Result<skeleton_bus::LocalBus> {
    Ok(skeleton_bus::LocalBus::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skeleton_bus=info".parse()?)
                .add_directive("transmitter=info".parse()?),
        )
        .init();

    let config = BrokerConfig::from_env()?;
    config.validate()?;

    let bus = connect(&config).await?;
    let publisher = BagPublisher::from_config(bus.clone(), &config)?;
    publisher.declare().await?;

    #[cfg(not(feature = "amqp"))]
    spawn_local_subscriber(bus.clone(), &config).await?;

    let mut distributor = FrameDistributor::with_default_evaluators(publisher, &config.sitting);

    let (sink, frames) = FrameSink::with_generated_id(DEFAULT_FRAME_QUEUE);
    tracing::info!(
        sensor = %sink.sensor_id(),
        exchange = %config.exchange,
        "Simulated sensor starting"
    );
    thread::spawn(move || simulate_sensor(sink));

    distributor
        .run_until(frames, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let stats = distributor.stats();
    println!(
        "Frames: {} received, {} published ({} empty), {} skipped, {} errors, {} bytes/frame",
        stats.frames_received,
        stats.frames_published,
        stats.empty_frames_published,
        stats.frames_skipped,
        stats.publish_errors,
        stats.bytes_per_frame()
    );

    send_goodbye(distributor.publisher().bus()).await;
    Ok(())
}

#[cfg(feature = "amqp")]
async fn send_goodbye(bus: &skeleton_bus::AmqpBus) {
    if let Err(e) = bus.close().await {
        tracing::warn!(error = %e, "Broker close failed");
    }
}

#[cfg(not(feature = "amqp"))]
async fn send_goodbye(_bus: &skeleton_bus::LocalBus) {}

#[cfg(not(feature = "amqp"))]
async fn spawn_local_subscriber(
    bus: skeleton_bus::LocalBus,
    config: &BrokerConfig,
) -> skeleton_bus::Result<()> {
    use skeleton_bus::BodySubscription;

    let bodies =
        BodySubscription::bind(bus, &config.exchange, &config.body_binding_key, &config.queue).await?;
    tokio::spawn(async move {
        loop {
            match bodies.dequeue().await {
                Ok(bag) => {
                    let flags: Vec<String> =
                        bag.items.iter().map(|b| b.ambiguity.to_string()).collect();
                    println!("[local] {} bodies from {} {:?}", bag.len(), bag.sensor_id, flags);
                }
                Err(skeleton_bus::Error::Closed) => break,
                Err(e) => tracing::warn!(error = %e, "Dropped frame"),
            }
        }
    });
    Ok(())
}

/// Driver thread: builds one frame per tick and hands it to the sink
fn simulate_sensor(sink: FrameSink) {
    let mut frame: u64 = 0;
    loop {
        let tick = frame % CYCLE_FRAMES;
        let bodies = if tick < 240 {
            vec![simulated_body(&sink, tick)]
        } else {
            Vec::new()
        };

        let rejected = sink.rejected();
        if !sink.on_body_frame(bodies) && sink.rejected() == rejected {
            // Distributor gone
            break;
        }
        if tick == 60 {
            sink.on_gesture_frame(vec![Gesture::discrete("RaiseHand", 1, 0.92)]);
        }

        frame += 1;
        thread::sleep(FRAME_INTERVAL);
    }
    tracing::info!(rejected = sink.rejected(), "Simulated sensor stopped");
}

/// A standing skeleton facing the sensor, 2.5m away
fn simulated_body(sink: &FrameSink, tick: u64) -> BodyRecord {
    let mut body = sink.body(1);
    let z = 2.5;

    let sitting = (160..240).contains(&tick);
    let hip_y = if sitting { -0.5 } else { -0.1 };
    let knee_y = if sitting { -0.45 } else { -0.5 };
    let ankle_y = -0.9;
    let drop = if sitting { -0.4 } else { 0.0 };

    let joints = [
        (JointType::SpineBase, 0.0, hip_y),
        (JointType::SpineMid, 0.0, 0.15 + drop),
        (JointType::SpineShoulder, 0.0, 0.4 + drop),
        (JointType::Neck, 0.0, 0.45 + drop),
        (JointType::Head, 0.0, 0.6 + drop),
        (JointType::ShoulderLeft, -0.2, 0.38 + drop),
        (JointType::ShoulderRight, 0.2, 0.38 + drop),
        (JointType::ElbowRight, 0.25, 0.1 + drop),
        (JointType::WristRight, 0.27, -0.1 + drop),
        (JointType::HandRight, 0.28, -0.15 + drop),
        (JointType::HandTipRight, 0.28, -0.2 + drop),
        (JointType::ThumbRight, 0.26, -0.15 + drop),
        (JointType::HipLeft, -0.1, hip_y),
        (JointType::HipRight, 0.1, hip_y),
        (JointType::KneeLeft, -0.1, knee_y),
        (JointType::KneeRight, 0.1, knee_y),
        (JointType::AnkleLeft, -0.1, ankle_y),
        (JointType::AnkleRight, 0.1, ankle_y),
        (JointType::FootLeft, -0.1, ankle_y - 0.05),
        (JointType::FootRight, 0.1, ankle_y - 0.05),
    ];
    for (joint_type, x, y) in joints {
        body.set_joint(Joint::new(joint_type, Vector3::new(x, y, z), TrackingState::Tracked));
    }

    // Left arm goes up, then out of view (inferred) for a while
    let arm_state = if (90..130).contains(&tick) {
        TrackingState::Inferred
    } else {
        TrackingState::Tracked
    };
    let raise = if (40..90).contains(&tick) { 0.5 } else { 0.0 };
    let arm = [
        (JointType::ElbowLeft, -0.25, 0.1 + raise + drop),
        (JointType::WristLeft, -0.27, -0.1 + 2.0 * raise + drop),
        (JointType::HandLeft, -0.28, -0.15 + 2.0 * raise + drop),
        (JointType::HandTipLeft, -0.28, -0.2 + 2.0 * raise + drop),
        (JointType::ThumbLeft, -0.26, -0.15 + 2.0 * raise + drop),
    ];
    for (joint_type, x, y) in arm {
        body.set_joint(Joint::new(joint_type, Vector3::new(x, y, z), arm_state));
    }

    body
}
