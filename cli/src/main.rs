use std::path::PathBuf;

use brickroom::sync::RoomConnection;
use brickroom::{connect_room_with_retry, Editor, RemoteOutcome, WsRoomLink, DEFAULT_RELAY_URL};
use brickroom_core::{RoomEvent, RoomId, ServerMsg, DEFAULT_ROOM_ID};
use clap::{Args, Parser, Subcommand};
use tokio::time::{Duration, Instant};

mod bot;
mod gallery;

use bot::BotCommand;
use gallery::GalleryCommand;

#[derive(Parser)]
#[command(name = "brickroom-cli", version, about = "Room, bot and gallery tools for brickroom")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room and print every event it carries.
    Watch {
        #[command(flatten)]
        room: RoomArgs,
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    Bot {
        #[command(subcommand)]
        command: BotCommand,
    },
    Gallery {
        #[arg(long, env = "BRICKROOM_GALLERY_DIR", default_value = "gallery")]
        dir: PathBuf,
        #[command(subcommand)]
        command: GalleryCommand,
    },
}

#[derive(Args, Clone, Debug)]
struct RoomArgs {
    #[arg(long, env = "BRICKROOM_WS_URL", default_value = DEFAULT_RELAY_URL)]
    url: String,
    #[arg(long, default_value = DEFAULT_ROOM_ID)]
    room: String,
    #[arg(long, default_value_t = 5)]
    connect_attempts: u32,
    /// Delay before the first reconnect; doubles on each failure.
    #[arg(long, default_value_t = 500)]
    retry_ms: u64,
}

impl RoomArgs {
    async fn join(
        &self,
    ) -> Result<(Editor<WsRoomLink>, RoomConnection), Box<dyn std::error::Error>> {
        let room_id = RoomId::parse(&self.room)?;
        let connection = connect_room_with_retry(
            &self.url,
            &room_id,
            self.connect_attempts.max(1),
            Duration::from_millis(self.retry_ms),
        )
        .await?;
        let editor = Editor::joining(room_id, connection.link());
        Ok((editor, connection))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            room,
            duration_secs,
        } => watch(room, duration_secs).await,
        Commands::Bot { command } => bot::run(command).await,
        Commands::Gallery { dir, command } => gallery::run(dir, command).await,
    }
}

async fn watch(
    room: RoomArgs,
    duration_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut editor, mut connection) = room.join().await?;
    let deadline = duration_secs.map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        let msg = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match connection.recv_timeout(remaining).await {
                    Some(msg) => msg,
                    None if Instant::now() >= deadline => break,
                    None => return Err(err_msg("relay closed the connection")),
                }
            }
            None => match connection.recv().await {
                Some(msg) => msg,
                None => return Err(err_msg("relay closed the connection")),
            },
        };
        if let Some(line) = describe(&msg) {
            println!("{line}");
        }
        if let RemoteOutcome::Rejected(reason) = editor.apply_server_msg(msg) {
            println!("  rejected: {reason}");
        }
    }

    println!("{} bricks in {}", editor.bricks().len(), editor.room_id());
    drop(editor);
    connection.finish().await;
    Ok(())
}

fn describe(msg: &ServerMsg) -> Option<String> {
    let line = match msg {
        ServerMsg::Welcome { session_id } => format!("welcome: session {session_id}"),
        ServerMsg::Joined { room_id, peers } => format!("joined {room_id} ({peers} peers)"),
        ServerMsg::Event { event, .. } => match event {
            RoomEvent::Place { brick } => format!(
                "place-brick {} {} {} at {:?}",
                brick.id, brick.kind, brick.color, brick.position
            ),
            RoomEvent::Remove { brick_id } => format!("remove-brick {brick_id}"),
            RoomEvent::Clear => "clear".to_string(),
        },
        ServerMsg::SnapshotRequest { requester, .. } => {
            format!("snapshot requested by session {requester}")
        }
        ServerMsg::Snapshot { bricks, .. } => format!("snapshot: {} bricks", bricks.len()),
        ServerMsg::Pong { .. } => return None,
        ServerMsg::Error { code, message } => format!("error {code}: {message}"),
    };
    Some(line)
}

/// Waits for the relay to confirm the join and, when peers are present, for
/// their snapshot. Returns the peer count.
async fn sync_room(
    editor: &mut Editor<WsRoomLink>,
    connection: &mut RoomConnection,
    wait: Duration,
) -> Result<u32, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + wait;
    let mut peers = None;
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Some(msg) = connection.recv_timeout(remaining).await else {
            break;
        };
        let is_snapshot = matches!(msg, ServerMsg::Snapshot { .. });
        match editor.apply_server_msg(msg) {
            RemoteOutcome::Joined { peers: 0 } => return Ok(0),
            RemoteOutcome::Joined { peers: count } => peers = Some(count),
            RemoteOutcome::ServerError { code, message } => {
                editor.abandon_snapshot();
                return Err(err_msg(&format!("relay refused join ({code}): {message}")));
            }
            RemoteOutcome::Applied if is_snapshot => {
                if let Some(count) = peers {
                    return Ok(count);
                }
            }
            _ => {}
        }
    }
    match peers {
        Some(count) => {
            editor.abandon_snapshot();
            log::warn!("no snapshot from {count} peers; continuing with an empty room");
            Ok(count)
        }
        None => Err(err_msg("timed out waiting to join the room")),
    }
}

fn err_msg(msg: &str) -> Box<dyn std::error::Error> {
    Box::new(std::io::Error::other(msg.to_string()))
}
