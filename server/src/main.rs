use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, ServerMessage};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Snapshot broadcasts per second
    #[arg(short, long, default_value = "1.0")]
    snapshot_rate: f64,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds a client may run ahead of world time before its moves are refused
    #[arg(long, default_value = "0.0")]
    clock_slack: f64,

    /// Karts driven by the server itself
    #[arg(short, long, default_value = "0")]
    bots: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.tick_rate == 0 || args.snapshot_rate <= 0.0 {
        return Err("tick rate and snapshot rate must be positive".into());
    }

    let config = ServerConfig {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        snapshot_interval: Duration::from_secs_f64(1.0 / args.snapshot_rate),
        max_clients: args.max_clients,
        clock_slack: args.clock_slack,
        bots: args.bots,
    };

    let address = format!("{}:{}", args.host, args.port);
    info!("Starting server on {}", address);

    let mut server = Server::new(&address, config).await?;

    let shutdown = server.message_sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    server.run().await?;

    Ok(())
}
