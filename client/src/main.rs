use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use shared::ObserverMode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Throttle held for the whole run (-1 to 1)
    #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
    throttle: f32,

    /// Steering throw, or the weave amplitude when weaving (-1 to 1)
    #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
    steering: f32,

    /// Seconds per steering weave; 0 holds the steering constant
    #[arg(short, long, default_value = "6.0")]
    weave_period: f32,

    /// How other karts are smoothed between snapshots: hermite or replay
    #[arg(short, long, default_value = "hermite")]
    observer_mode: ObserverMode,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Seconds between pose reports
    #[arg(short, long, default_value = "1.0")]
    report_interval: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.tick_rate == 0 || args.report_interval <= 0.0 {
        return Err("tick rate and report interval must be positive".into());
    }

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!(
        "Driving with throttle {:.2}, steering {:.2}, observers use {}",
        args.throttle, args.steering, args.observer_mode
    );

    let config = ClientConfig {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        throttle: args.throttle,
        steering: args.steering,
        weave_period: args.weave_period,
        observer_mode: args.observer_mode,
        fake_ping_ms: args.fake_ping,
        report_interval: Duration::from_secs_f64(args.report_interval),
    };

    let mut client = Client::new(&args.server, config).await?;
    client.run().await?;

    Ok(())
}
