use clap::Parser;
use log::{error, info};
use server::config::MatchConfig;
use server::error::BoxError;
use server::network::Server;
use shared::TICK_RATE;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,

    #[command(flatten)]
    config: MatchConfig,
}

/// Parses the command line, binds the listener and runs until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!(
        "Starting match server: {} players max, {}s matches, map radius {}",
        args.config.max_players, args.config.match_time, args.config.map_radius
    );

    let server = Server::new(&address, args.tick_rate, args.config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
