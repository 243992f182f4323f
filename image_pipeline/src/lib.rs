use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

pub const THUMBNAIL_MAX_DIM_DEFAULT: u32 = 512;
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image encode failed: {0}")]
    Encode(String),
    #[error("invalid data url: {0}")]
    DataUrl(String),
    #[error("invalid image dimensions")]
    Dimensions,
}

#[derive(Debug, Clone, Copy)]
pub struct ThumbnailConfig {
    pub max_dim: Option<u32>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dim: Some(THUMBNAIL_MAX_DIM_DEFAULT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

pub struct ThumbnailPipeline {
    config: ThumbnailConfig,
}

impl ThumbnailPipeline {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Accepts either raw image bytes or a `data:image/png;base64,` capture.
    pub fn process_capture(&self, capture: &[u8]) -> Result<Thumbnail, ThumbnailError> {
        if capture.starts_with(b"data:") {
            let text = std::str::from_utf8(capture)
                .map_err(|err| ThumbnailError::DataUrl(err.to_string()))?;
            let bytes = decode_data_url(text)?;
            return self.process(&bytes);
        }
        self.process(capture)
    }

    pub fn process(&self, bytes: &[u8]) -> Result<Thumbnail, ThumbnailError> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|err| ThumbnailError::Decode(err.to_string()))?
            .to_rgba8();
        let rgba = resize_rgba8_to_max_dim(rgba, self.config.max_dim);
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(ThumbnailError::Dimensions);
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&rgba, width, height, ExtendedColorType::Rgba8)
            .map_err(|err| ThumbnailError::Encode(err.to_string()))?;

        Ok(Thumbnail { width, height, png })
    }
}

impl Default for ThumbnailPipeline {
    fn default() -> Self {
        Self::new(ThumbnailConfig::default())
    }
}

pub fn decode_data_url(url: &str) -> Result<Vec<u8>, ThumbnailError> {
    let trimmed = url.trim();
    let Some(payload) = trimmed.strip_prefix(PNG_DATA_URL_PREFIX) else {
        return Err(ThumbnailError::DataUrl(
            "expected a base64 png data url".to_string(),
        ));
    };
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|err| ThumbnailError::DataUrl(err.to_string()))
}

pub fn encode_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}

fn resize_rgba8_to_max_dim(rgba: RgbaImage, max_dim: Option<u32>) -> RgbaImage {
    let Some(max_dim) = max_dim else {
        return rgba;
    };
    if max_dim == 0 {
        return rgba;
    }
    let (width, height) = rgba.dimensions();
    let max_axis = width.max(height);
    if max_axis <= max_dim {
        return rgba;
    }
    let scale = max_dim as f32 / max_axis as f32;
    let next_width = ((width as f32) * scale).round().max(1.0) as u32;
    let next_height = ((height as f32) * scale).round().max(1.0) as u32;
    image::imageops::resize(&rgba, next_width, next_height, FilterType::Triangle)
}
