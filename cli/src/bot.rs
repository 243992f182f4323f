use super::*;

use brickroom::{ClickOutcome, PointerEvent};
use brickroom_core::{BrickType, BRICK_PALETTE};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(clap::Subcommand)]
pub(super) enum BotCommand {
    /// Place and remove random bricks through the placement engine.
    Run {
        #[command(flatten)]
        room: RoomArgs,
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 250)]
        think_min_ms: u64,
        #[arg(long, default_value_t = 1200)]
        think_max_ms: u64,
        /// Half-width of the square of ground the bot builds on.
        #[arg(long, default_value_t = 6.0)]
        span: f64,
        #[arg(long, default_value_t = 0.15)]
        remove_rate: f64,
        #[arg(long, default_value_t = 0.4)]
        stack_rate: f64,
    },
}

#[derive(Clone, Copy, Debug)]
struct BotConfig {
    duration_secs: u64,
    think_min_ms: u64,
    think_max_ms: u64,
    span: f64,
    remove_rate: f64,
    stack_rate: f64,
}

#[derive(Debug, Default)]
struct BotStats {
    placed: u32,
    rejected: u32,
    removed: u32,
    remote: u32,
}

pub(super) async fn run(command: BotCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        BotCommand::Run {
            room,
            duration_secs,
            seed,
            think_min_ms,
            think_max_ms,
            span,
            remove_rate,
            stack_rate,
        } => {
            let config = BotConfig {
                duration_secs,
                think_min_ms,
                think_max_ms,
                span,
                remove_rate,
                stack_rate,
            };
            run_bot(room, config, seed).await
        }
    }
}

fn validate_bot_config(config: BotConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.think_min_ms > config.think_max_ms {
        return Err(err_msg("think-min-ms must be <= think-max-ms"));
    }
    if !(config.span.is_finite() && config.span > 0.0) {
        return Err(err_msg("span must be a positive number"));
    }
    for (name, rate) in [
        ("remove-rate", config.remove_rate),
        ("stack-rate", config.stack_rate),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(err_msg(&format!("{name} must be within 0..=1")));
        }
    }
    Ok(())
}

async fn run_bot(
    room: RoomArgs,
    config: BotConfig,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_bot_config(config)?;
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    eprintln!("bot seed: {seed}");

    let (mut editor, mut connection) = room.join().await?;
    let peers = sync_room(&mut editor, &mut connection, Duration::from_secs(10)).await?;
    eprintln!(
        "joined {} with {peers} peers and {} bricks",
        editor.room_id(),
        editor.bricks().len()
    );

    let mut stats = BotStats::default();
    let end_at = Instant::now() + Duration::from_secs(config.duration_secs);
    while Instant::now() < end_at {
        let think = rng.random_range(config.think_min_ms..=config.think_max_ms);
        let think_until = Instant::now() + Duration::from_millis(think);
        while let Some(msg) = connection
            .recv_timeout(think_until.saturating_duration_since(Instant::now()))
            .await
        {
            if let RemoteOutcome::Applied = editor.apply_server_msg(msg) {
                stats.remote += 1;
            }
        }
        if Instant::now() < think_until {
            // The reader ended before the think window did.
            return Err(err_msg("relay closed the connection"));
        }

        let pointer = choose_pointer(&editor, config, &mut rng);
        editor.select_type(BrickType::ALL[rng.random_range(0..BrickType::ALL.len())]);
        editor.select_color(BRICK_PALETTE[rng.random_range(0..BRICK_PALETTE.len())]);
        if rng.random_bool(0.5) {
            editor.rotate();
        }
        match editor.handle_pointer(pointer) {
            ClickOutcome::Placed(_) => stats.placed += 1,
            ClickOutcome::Removed(_) => stats.removed += 1,
            ClickOutcome::Rejected => stats.rejected += 1,
            ClickOutcome::Ignored => {}
        }
    }

    println!(
        "placed={} rejected={} removed={} remote_applied={} bricks={}",
        stats.placed,
        stats.rejected,
        stats.removed,
        stats.remote,
        editor.bricks().len()
    );
    drop(editor);
    connection.finish().await;
    Ok(())
}

fn choose_pointer(
    editor: &Editor<WsRoomLink>,
    config: BotConfig,
    rng: &mut StdRng,
) -> PointerEvent {
    let bricks = editor.bricks().as_slice();
    if !bricks.is_empty() {
        let target = &bricks[rng.random_range(0..bricks.len())];
        if rng.random_bool(config.remove_rate) {
            return PointerEvent::Brick {
                brick_id: target.id.clone(),
                point: target.center(),
                normal: Some(DVec3::Y),
                alt_key: true,
            };
        }
        if rng.random_bool(config.stack_rate) {
            let top = target.center() + DVec3::new(0.0, 0.5, 0.0);
            return PointerEvent::Brick {
                brick_id: target.id.clone(),
                point: top,
                normal: Some(DVec3::Y),
                alt_key: false,
            };
        }
    }
    PointerEvent::Ground {
        point: DVec3::new(
            rng.random_range(-config.span..config.span),
            0.0,
            rng.random_range(-config.span..config.span),
        ),
    }
}
