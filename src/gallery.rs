//! Filesystem gallery of saved creations.
//!
//! Layout under the gallery root:
//! `creations/<id>.json` holds the creation and `thumbnails/<id>.png` its
//! thumbnail, when one was captured.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use brickroom_core::creation::sort_newest_first;
use brickroom_core::id::CREATION_ID_LEN;
use brickroom_core::{
    generate_creation_id, is_valid_token, Brick, Creation, ANONYMOUS_AUTHOR, CREATION_VERSION,
};
use brickroom_image_pipeline::{ThumbnailError, ThumbnailPipeline};

const CREATIONS_DIR: &str = "creations";
const THUMBNAILS_DIR: &str = "thumbnails";

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("sign in to save creations")]
    Unauthenticated,
    #[error("creation name is empty")]
    MissingName,
    #[error("invalid creation id {0:?}")]
    InvalidId(String),
    #[error("creation {0} not found")]
    NotFound(String),
    #[error("creation {id} belongs to another author")]
    NotOwner { id: String },
    #[error("gallery io: {0}")]
    Io(#[from] io::Error),
    #[error("creation json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("thumbnail: {0}")]
    Thumbnail(#[from] ThumbnailError),
}

/// The signed-in user saving a creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub display_name: Option<String>,
}

impl Author {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn name_or_anonymous(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => ANONYMOUS_AUTHOR,
        }
    }
}

pub struct Gallery {
    root: PathBuf,
    thumbnails: ThumbnailPipeline,
}

impl Gallery {
    /// Opens (creating if needed) a gallery rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, GalleryError> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(CREATIONS_DIR)).await?;
        tokio::fs::create_dir_all(root.join(THUMBNAILS_DIR)).await?;
        Ok(Self {
            root,
            thumbnails: ThumbnailPipeline::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves the bricks as a new creation. `thumbnail_capture` is raw image
    /// bytes or a PNG data URL; it is downscaled before it is stored.
    pub async fn save_creation(
        &self,
        author: Option<&Author>,
        name: &str,
        bricks: Vec<Brick>,
        thumbnail_capture: Option<&[u8]>,
    ) -> Result<Creation, GalleryError> {
        let author = author.ok_or(GalleryError::Unauthenticated)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GalleryError::MissingName);
        }

        let id = generate_creation_id();
        let staged = self.stage_thumbnail(&id, thumbnail_capture).await?;
        let creation = Creation {
            version: CREATION_VERSION,
            id,
            name: name.to_string(),
            author_id: author.id.clone(),
            author_name: author.name_or_anonymous().to_string(),
            bricks,
            thumbnail: staged
                .as_ref()
                .map(|thumb| thumb.relative.clone())
                .unwrap_or_default(),
            created_at_ms: now_ms(),
            updated_at_ms: None,
        };
        self.commit(&creation, staged).await?;
        log::info!(
            "saved creation {} ({} bricks) for {}",
            creation.id,
            creation.brick_count(),
            creation.author_id
        );
        Ok(creation)
    }

    /// Replaces the bricks (and optionally the thumbnail) of an existing
    /// creation owned by `author`.
    pub async fn overwrite_creation(
        &self,
        author: Option<&Author>,
        id: &str,
        bricks: Vec<Brick>,
        thumbnail_capture: Option<&[u8]>,
    ) -> Result<Creation, GalleryError> {
        let author = author.ok_or(GalleryError::Unauthenticated)?;
        let mut creation = self.load_creation(id).await?;
        if creation.author_id != author.id {
            return Err(GalleryError::NotOwner { id: id.to_string() });
        }
        let staged = self.stage_thumbnail(id, thumbnail_capture).await?;
        if let Some(thumb) = &staged {
            creation.thumbnail = thumb.relative.clone();
        }
        creation.bricks = bricks;
        creation.updated_at_ms = Some(now_ms());
        self.commit(&creation, staged).await?;
        Ok(creation)
    }

    /// Every readable creation, newest first.
    pub async fn list_creations(&self) -> Result<Vec<Creation>, GalleryError> {
        let mut entries = tokio::fs::read_dir(self.root.join(CREATIONS_DIR)).await?;
        let mut creations = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match read_creation(&path).await {
                Ok(creation) => creations.push(creation),
                Err(err) => log::warn!("skipping {}: {err}", path.display()),
            }
        }
        sort_newest_first(&mut creations);
        Ok(creations)
    }

    pub async fn load_creation(&self, id: &str) -> Result<Creation, GalleryError> {
        let path = self.creation_path(id)?;
        match read_creation(&path).await {
            Err(GalleryError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                Err(GalleryError::NotFound(id.to_string()))
            }
            other => other,
        }
    }

    /// Absolute path of a creation's stored thumbnail, if it has one.
    pub fn thumbnail_path(&self, creation: &Creation) -> Option<PathBuf> {
        if creation.thumbnail.is_empty() {
            return None;
        }
        Some(self.root.join(&creation.thumbnail))
    }

    fn creation_path(&self, id: &str) -> Result<PathBuf, GalleryError> {
        if !is_valid_token(id, CREATION_ID_LEN) {
            return Err(GalleryError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(CREATIONS_DIR).join(format!("{id}.json")))
    }

    /// Writes the thumbnail next to its final path; [`Gallery::commit`]
    /// moves it into place once the creation itself is stored.
    async fn stage_thumbnail(
        &self,
        id: &str,
        capture: Option<&[u8]>,
    ) -> Result<Option<StagedThumbnail>, GalleryError> {
        let Some(capture) = capture else {
            return Ok(None);
        };
        let thumbnail = self.thumbnails.process_capture(capture)?;
        let relative = format!("{THUMBNAILS_DIR}/{id}.png");
        let path = self.root.join(&relative);
        let tmp = path.with_extension("png.tmp");
        tokio::fs::write(&tmp, &thumbnail.png).await?;
        Ok(Some(StagedThumbnail {
            relative,
            path,
            tmp,
        }))
    }

    async fn commit(
        &self,
        creation: &Creation,
        thumbnail: Option<StagedThumbnail>,
    ) -> Result<(), GalleryError> {
        if let Err(err) = self.write_creation(creation).await {
            if let Some(thumb) = thumbnail {
                if let Err(cleanup) = tokio::fs::remove_file(&thumb.tmp).await {
                    log::warn!("leaving {}: {cleanup}", thumb.tmp.display());
                }
            }
            return Err(err);
        }
        if let Some(thumb) = thumbnail {
            tokio::fs::rename(&thumb.tmp, &thumb.path).await?;
        }
        Ok(())
    }

    async fn write_creation(&self, creation: &Creation) -> Result<(), GalleryError> {
        let path = self.creation_path(&creation.id)?;
        let json = serde_json::to_vec_pretty(creation)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

struct StagedThumbnail {
    relative: String,
    path: PathBuf,
    tmp: PathBuf,
}

async fn read_creation(path: &Path) -> Result<Creation, GalleryError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
