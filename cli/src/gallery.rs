use super::*;

use brickroom::{Author, Gallery};

#[derive(clap::Subcommand)]
pub(super) enum GalleryCommand {
    /// List saved creations, newest first.
    List,
    /// Print one creation as JSON.
    Show { id: String },
    /// Save the current bricks of a room as a new creation.
    Save {
        #[command(flatten)]
        room: RoomArgs,
        #[arg(long)]
        name: String,
        #[arg(long, env = "BRICKROOM_AUTHOR_ID")]
        author_id: Option<String>,
        #[arg(long, env = "BRICKROOM_AUTHOR_NAME")]
        author_name: Option<String>,
        /// PNG file or a text file holding a PNG data URL.
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
    /// Replace a room's bricks with a saved creation.
    Load {
        #[command(flatten)]
        room: RoomArgs,
        id: String,
    },
}

pub(super) async fn run(
    dir: PathBuf,
    command: GalleryCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let gallery = Gallery::open(dir).await?;
    match command {
        GalleryCommand::List => {
            for creation in gallery.list_creations().await? {
                println!(
                    "{}  {:<24} {:<16} {:>4} bricks  {}",
                    creation.id,
                    creation.name,
                    creation.author_name,
                    creation.brick_count(),
                    creation.created_at_ms
                );
            }
        }
        GalleryCommand::Show { id } => {
            let creation = gallery.load_creation(&id).await?;
            println!("{}", serde_json::to_string_pretty(&creation)?);
        }
        GalleryCommand::Save {
            room,
            name,
            author_id,
            author_name,
            thumbnail,
        } => {
            let author = author_id.map(|id| Author {
                id,
                display_name: author_name,
            });
            let capture = match thumbnail {
                Some(path) => Some(tokio::fs::read(path).await?),
                None => None,
            };

            let (mut editor, mut connection) = room.join().await?;
            let peers = sync_room(&mut editor, &mut connection, Duration::from_secs(10)).await?;
            if peers == 0 {
                return Err(err_msg("room is empty; nothing to save"));
            }
            let bricks = editor.bricks().to_vec();
            drop(editor);
            connection.close();

            let creation = gallery
                .save_creation(author.as_ref(), &name, bricks, capture.as_deref())
                .await?;
            println!(
                "saved {} ({} bricks) as {}",
                creation.name,
                creation.brick_count(),
                creation.id
            );
        }
        GalleryCommand::Load { room, id } => {
            let creation = gallery.load_creation(&id).await?;
            let (mut editor, mut connection) = room.join().await?;
            sync_room(&mut editor, &mut connection, Duration::from_secs(10)).await?;
            editor.load_creation(&creation);
            println!(
                "loaded {} ({} bricks) into {}",
                creation.name,
                creation.brick_count(),
                editor.room_id()
            );
            drop(editor);
            connection.finish().await;
        }
    }
    Ok(())
}
