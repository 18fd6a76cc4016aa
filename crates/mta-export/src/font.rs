use std::path::{Path, PathBuf};

use mta_core::error::{ConvertError, Result};

/// Common monospace fonts, probed in order when no font is configured.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/ubuntu/UbuntuMono-R.ttf",
    "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/System/Library/Fonts/Monaco.ttf",
    "/Library/Fonts/Courier New.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "C:\\Windows\\Fonts\\cour.ttf",
];

/// Locate a font: the configured path if any, else the first existing
/// candidate.
///
/// # Errors
/// `Encode` when nothing usable exists.
pub fn locate_font(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .ok_or_else(|| {
            ConvertError::encode(
                "no monospace font found; set output.font_path in the config file",
            )
        })
}

/// Read the font bytes for rasterized output.
///
/// # Errors
/// `Io` if the font file cannot be read, `Encode` if none is found.
pub fn load_font(configured: Option<&Path>) -> Result<Vec<u8>> {
    let path = locate_font(configured)?;
    if configured.is_none() {
        log::warn!("Aucune police configurée, utilisation de {}", path.display());
    }
    std::fs::read(&path).map_err(|e| ConvertError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_core::error::ErrorKind;

    #[test]
    fn configured_path_wins() {
        let p = Path::new("/tmp/custom.ttf");
        assert_eq!(locate_font(Some(p)).unwrap(), p);
    }

    #[test]
    fn unreadable_configured_font_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_font(Some(&dir.path().join("missing.ttf"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
