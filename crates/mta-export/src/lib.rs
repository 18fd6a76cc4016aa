/// Output writers: plain/ANSI text, rasterized images, and MP4 video via an
/// `ffmpeg` subprocess.
pub mod font;
pub mod image_out;
pub mod muxer;
pub mod rasterizer;
pub mod sink;
pub mod text;

use std::path::Path;

use mta_core::error::{ConvertError, Result};

/// Refuse to clobber an existing file unless `overwrite` is set.
///
/// Called before any conversion work so a refused write costs nothing.
///
/// # Errors
/// `Io` with `AlreadyExists` when `path` exists and `overwrite` is false.
pub fn check_output_path(path: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(ConvertError::io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "output exists (pass --overwrite to replace it)",
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_core::error::ErrorKind;

    #[test]
    fn existing_output_refused_without_overwrite() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = check_output_path(file.path(), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(check_output_path(file.path(), true).is_ok());
    }

    #[test]
    fn new_output_allowed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_output_path(&dir.path().join("out.txt"), false).is_ok());
    }
}
