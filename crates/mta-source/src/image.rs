use std::path::{Path, PathBuf};

use image::DynamicImage;
use mta_core::error::{ConvertError, Result};
use mta_core::frame::{PixelBuffer, Rotation};

/// Where an encoded still image comes from.
#[derive(Clone, Debug)]
pub enum ImageInput {
    /// File on disk; format detected from its content.
    Path(PathBuf),
    /// Encoded bytes already in memory (PNG, JPEG, BMP, GIF).
    Bytes(Vec<u8>),
}

impl ImageInput {
    /// Decode to an RGBA pixel buffer, optionally rotated.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Decode` for unsupported or corrupt data.
    pub fn decode(&self, rotation: Option<Rotation>) -> Result<PixelBuffer> {
        match self {
            Self::Path(path) => load_image(path, rotation),
            Self::Bytes(bytes) => decode_image(bytes, rotation),
        }
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Charge une image depuis le disque.
///
/// # Errors
/// `Io` si le fichier est illisible, `Decode` si le contenu n'est pas une image.
///
/// # Example
/// ```no_run
/// use mta_source::image::load_image;
/// use std::path::Path;
/// let pb = load_image(Path::new("photo.png"), None).unwrap();
/// ```
pub fn load_image(path: &Path, rotation: Option<Rotation>) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path).map_err(|e| ConvertError::io(path, e))?;
    let pb = decode_image(&bytes, rotation).map_err(|e| match e {
        ConvertError::Decode { frame, message } => ConvertError::Decode {
            frame,
            message: format!("{}: {message}", path.display()),
        },
        other => other,
    })?;
    log::info!(
        "Image chargée: {}x{} depuis {}",
        pb.width(),
        pb.height(),
        path.display()
    );
    Ok(pb)
}

/// Decode encoded bytes, format guessed from the magic number.
///
/// # Errors
/// `Decode` for unknown formats, corrupt data or zero-sized images.
pub fn decode_image(bytes: &[u8], rotation: Option<Rotation>) -> Result<PixelBuffer> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ConvertError::decode(format!("cannot decode image: {e}")))?;
    let img = match rotation {
        Some(r) => rotate(&img, r),
        None => img,
    };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(ConvertError::decode("image has no pixels"));
    }
    PixelBuffer::from_rgba(width, height, rgba.into_raw())
}

fn rotate(img: &DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Clockwise90 => img.rotate90(),
        Rotation::Rotate180 => img.rotate180(),
        Rotation::CounterClockwise90 => img.rotate270(),
    }
}
