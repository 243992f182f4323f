use std::net::SocketAddr;

use brickroom_relay::config::{DEFAULT_BIND, DEFAULT_MAX_MESSAGE_KIB};
use brickroom_relay::{serve, RelayConfig, RunMode};
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "brickroom-relay", version, about = "Room relay for brickroom editors")]
struct Args {
    #[arg(long, env = "BRICKROOM_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,
    #[arg(long, env = "BRICKROOM_MODE", value_enum, default_value_t = RunMode::Dev)]
    mode: RunMode,
    #[arg(long, env = "BRICKROOM_MAX_MESSAGE_KIB", default_value_t = DEFAULT_MAX_MESSAGE_KIB)]
    max_message_kib: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.mode.default_log_filter()),
    )
    .init();

    let config = RelayConfig {
        bind: args.bind,
        mode: args.mode,
        max_message_bytes: args.max_message_kib.saturating_mul(1024),
    };
    let listener = TcpListener::bind(config.bind).await?;
    serve(listener, config).await?;
    Ok(())
}
