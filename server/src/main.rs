use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_MAX_CLIENTS};
use server::network::{Server, ServerResult};
use shared::{FRAME_RATE, GRID_SIZE};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = FRAME_RATE)]
    tick_rate: u32,
    /// Width and height of the board in cells
    #[clap(short, long, default_value_t = GRID_SIZE)]
    grid_size: i32,
    /// Maximum number of connected clients
    #[clap(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,
    /// Seconds of silence before a client is dropped
    #[clap(long, default_value = "5")]
    client_timeout: u64,
}

/// Parses command-line arguments and runs the room server until Ctrl+C.
#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    let args = Args::parse();
    let config = ServerConfig::new(
        args.tick_rate,
        args.grid_size,
        args.max_clients,
        Duration::from_secs(args.client_timeout),
    )?;

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
