//! Driver simulator — synthetic field device for exercising a hub
//!
//! Walks a jittered route through a full service: approach to the
//! origin, on-site dwell, loading, then the trip to the destination.
//! GPS fixes flow through the real report policy and the real channel,
//! so a running hub sees traffic indistinguishable from a device.
//!
//! ```bash
//! cargo run --bin driver-sim -- --hub 127.0.0.1:9400 --service-id svc-1
//! ```

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use servitrack::channel::{ChannelConfig, ChannelEvent, TcpTransport, TrackingChannel};
use servitrack::hub::protocol::{RegisterDriver, UpdateLocation};
use servitrack::reporter::{LocationReporter, ReportDecision};
use servitrack::types::{Coordinate, ServiceStage};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "driver-sim", about = "Servitrack synthetic driver")]
struct CliArgs {
    /// Hub channel address
    #[arg(long, default_value = "127.0.0.1:9400")]
    hub: String,

    /// Service to report against (must be registered on the hub)
    #[arg(long, default_value = "svc-demo")]
    service_id: String,

    /// Driver identity announced on connect
    #[arg(long, default_value = "drv-sim")]
    driver_id: String,

    /// Milliseconds between simulated GPS fixes
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Service origin, "lat,lng"
    #[arg(long, default_value = "18.4861,-69.9312")]
    origin: String,

    /// Service destination, "lat,lng"
    #[arg(long, default_value = "18.5432,-69.8571")]
    destination: String,
}

fn parse_coordinate(raw: &str) -> Result<Coordinate> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("expected \"lat,lng\", got {raw:?}"))?;
    Ok(Coordinate::new(lat.trim().parse()?, lng.trim().parse()?))
}

/// One leg of the simulated service, in fix ticks.
struct Phase {
    stage: ServiceStage,
    from: Coordinate,
    to: Coordinate,
    ticks: u32,
}

fn lerp(from: Coordinate, to: Coordinate, t: f64) -> Coordinate {
    Coordinate::new(
        from.lat + (to.lat - from.lat) * t,
        from.lng + (to.lng - from.lng) * t,
    )
}

/// GPS-like jitter, roughly ±8 m.
fn jitter(c: Coordinate, rng: &mut impl Rng) -> Coordinate {
    let wobble = 8.0 / 111_195.0;
    Coordinate::new(
        c.lat + rng.gen_range(-wobble..wobble),
        c.lng + rng.gen_range(-wobble..wobble),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let origin = parse_coordinate(&args.origin)?;
    let destination = parse_coordinate(&args.destination)?;

    // Start roughly 2 km south of the origin.
    let start = Coordinate::new(origin.lat - 2_000.0 / 111_195.0, origin.lng);

    let phases = [
        Phase {
            stage: ServiceStage::Accepted,
            from: start,
            to: origin,
            ticks: 30,
        },
        Phase {
            stage: ServiceStage::DriverOnSite,
            from: origin,
            to: origin,
            ticks: 10,
        },
        Phase {
            stage: ServiceStage::Loading,
            from: origin,
            to: origin,
            ticks: 10,
        },
        Phase {
            stage: ServiceStage::InProgress,
            from: origin,
            to: destination,
            ticks: 60,
        },
    ];

    info!(hub = %args.hub, service = %args.service_id, "Driver simulator starting");

    let config = servitrack::TrackerConfig::load();
    let transport = TcpTransport::new(args.hub.clone())
        .with_connect_timeout(config.channel.connect_timeout());
    let channel_config = ChannelConfig {
        reconnect_backoff: config.channel.reconnect_backoff(),
    };
    let (handle, mut events) = TrackingChannel::spawn(transport, channel_config);

    // Queued if the hub is not up yet; flushes on the first connect.
    handle.send(
        RegisterDriver {
            driver_id: args.driver_id.clone(),
        }
        .into_message(),
    );

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Open { generation } => {
                    info!(generation, "Channel open");
                }
                ChannelEvent::ConnectionLost => {
                    warn!("Connection lost — reports will queue until reconnect");
                }
                ChannelEvent::Message(msg) => {
                    debug!(kind = %msg.kind, "Hub message");
                }
            }
        }
    });

    let mut reporter = LocationReporter::new(config.reporter.clone());
    let mut rng = rand::thread_rng();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.tick_ms));

    for phase in &phases {
        info!(stage = %phase.stage, ticks = phase.ticks, "Entering phase");
        for step in 0..phase.ticks {
            ticker.tick().await;
            let t = f64::from(step) / f64::from(phase.ticks.max(1));
            let fix = jitter(lerp(phase.from, phase.to, t), &mut rng);
            let now_ms = chrono::Utc::now().timestamp_millis();

            // No device speed: exercises the derived-speed fallback.
            let decision = reporter.assess(fix, now_ms, None, phase.stage, Some(origin));
            match decision {
                ReportDecision::Send { sample, reason } => {
                    debug!(?reason, position = %sample.coordinate, "Transmitting fix");
                    handle.send(
                        UpdateLocation {
                            service_id: args.service_id.clone(),
                            driver_id: args.driver_id.clone(),
                            position: sample,
                        }
                        .into_message(),
                    );
                }
                ReportDecision::Hold => {
                    debug!(position = %fix, "Fix held back");
                }
            }
        }
    }

    info!("Route complete, closing channel");
    handle.close();
    Ok(())
}
