// src/keyframe.rs - still-image capture for the audit trail
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::{Result, VerifyError};
use crate::report::Keyframe;

pub const JPEG_MIME: &str = "image/jpeg";
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Synchronous "current visual frame" accessor used for keyframe capture.
pub trait KeyframeSource: Send {
    fn current_frame(&mut self) -> Result<DynamicImage>;
}

impl<F> KeyframeSource for F
where
    F: FnMut() -> Result<DynamicImage> + Send,
{
    fn current_frame(&mut self) -> Result<DynamicImage> {
        self()
    }
}

/// Serves stills from a directory in file-name order, wrapping at the end.
pub struct ImageSequenceSource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    current: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let mut frames: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(VerifyError::Capture(format!(
                "no images found in {}",
                dir.display()
            )));
        }

        debug!(dir = %dir.display(), count = frames.len(), "keyframe directory opened");
        Ok(Self { dir, frames, current: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyframeSource for ImageSequenceSource {
    fn current_frame(&mut self) -> Result<DynamicImage> {
        let path = &self.frames[self.current % self.frames.len()];
        self.current = (self.current + 1) % self.frames.len();
        image::open(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to load keyframe image");
            VerifyError::from(e)
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scales to `width`x`height` and encodes as JPEG at `quality` (1-100).
pub fn compress_jpeg(image: &DynamicImage, width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();
    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), quality.clamp(1, 100));
        encoder.encode_image(&rgb)?;
    }
    Ok(bytes)
}

/// Compresses a captured still and embeds it for the report.
pub fn encode_keyframe(
    image: &DynamicImage,
    captured_at_ms: u64,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Keyframe> {
    let jpeg = compress_jpeg(image, width, height, quality)?;
    Ok(Keyframe {
        captured_at_ms,
        mime_type: JPEG_MIME.to_string(),
        data: base64_encode(&jpeg),
    })
}

/// Standard base64 with padding.
pub fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0] as usize;
        let b1 = chunk.get(1).copied().unwrap_or(0) as usize;
        let b2 = chunk.get(2).copied().unwrap_or(0) as usize;

        let combined = (b0 << 16) | (b1 << 8) | b2;

        result.push(ALPHABET[(combined >> 18) & 0x3F] as char);
        result.push(ALPHABET[(combined >> 12) & 0x3F] as char);
        result.push(if chunk.len() > 1 { ALPHABET[(combined >> 6) & 0x3F] as char } else { '=' });
        result.push(if chunk.len() > 2 { ALPHABET[combined & 0x3F] as char } else { '=' });
    }

    result
}
