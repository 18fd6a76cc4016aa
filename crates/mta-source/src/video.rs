// Décodage vidéo via ffmpeg en subprocess (std::process::Command).
// Prérequis : `ffmpeg` et `ffprobe` accessibles dans PATH.
//
//   - `probe_video`  : ffprobe → width/height/fps/nb_frames du flux principal
//   - `VideoDecoder` : ffmpeg → flux RGBA brut sur stdout, une frame par lecture
//
// ffmpeg applique par défaut la matrice de rotation du conteneur (vidéos de
// téléphone) alors que ffprobe rapporte la taille non tournée : on désactive
// l'autorotation et on fixe la taille de sortie pour que chaque lecture de
// w×h×4 octets soit bien une frame w×h.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use mta_core::error::{ConvertError, Result};
use mta_core::frame::{PixelBuffer, Rotation};
use mta_core::traits::{FrameSource, SourceHandle};

/// Métadonnées extraites via ffprobe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Declared rate (e.g. 23.976, 30.0). 0.0 when the container has none.
    pub fps: f64,
    /// Frame count from `nb_frames`, else estimated from the duration.
    pub frame_count: Option<usize>,
}

impl VideoInfo {
    /// Frame dimensions after `rotation`.
    #[must_use]
    pub fn rotated_size(&self, rotation: Option<Rotation>) -> (u32, u32) {
        match rotation {
            Some(Rotation::Clockwise90 | Rotation::CounterClockwise90) => {
                (self.height, self.width)
            }
            _ => (self.width, self.height),
        }
    }
}

/// Interroge `ffprobe` pour obtenir les métadonnées du flux vidéo principal.
///
/// # Errors
/// `Io` si le fichier n'existe pas, `Decode` si ffprobe est introuvable ou
/// ne trouve aucun flux vidéo.
pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    std::fs::metadata(path).map_err(|e| ConvertError::io(path, e))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            ConvertError::decode(format!(
                "cannot run ffprobe ({e}); is it installed and on PATH?"
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConvertError::decode(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(|e| {
        ConvertError::decode(format!("{}: {e}", path.display()))
    })?;
    log::info!(
        "probe_video: {}x{} @ {:.3}fps, {}",
        info.width,
        info.height,
        info.fps,
        path.display()
    );
    Ok(info)
}

/// Parse `key=value` lines printed by ffprobe.
///
/// `r_frame_rate` wins over `avg_frame_rate`; a missing or `0/0` rate
/// yields `fps = 0.0`. `nb_frames` gives the frame count; without it
/// (`N/A` in many containers) the count is `duration × fps`.
///
/// # Errors
/// A message when width or height is absent or zero.
pub fn parse_probe_output(text: &str) -> std::result::Result<VideoInfo, String> {
    let mut width = 0u32;
    let mut height = 0u32;
    let mut r_rate = None;
    let mut avg_rate = None;
    let mut nb_frames = None;
    let mut duration = None;

    for line in text.lines() {
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        let val = val.trim();
        match key.trim() {
            "width" => width = val.parse().unwrap_or(0),
            "height" => height = val.parse().unwrap_or(0),
            "r_frame_rate" => r_rate = parse_frame_rate(val),
            "avg_frame_rate" => avg_rate = parse_frame_rate(val),
            "nb_frames" => nb_frames = val.parse::<usize>().ok().filter(|&n| n > 0),
            "duration" => {
                duration = val.parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0);
            }
            _ => {}
        }
    }

    if width == 0 || height == 0 {
        return Err("no decodable video stream".to_string());
    }
    let fps = r_rate.or(avg_rate).unwrap_or(0.0);
    let frame_count = nb_frames.or_else(|| {
        duration
            .filter(|_| fps > 0.0)
            .map(|d| (d * fps).round() as usize)
            .filter(|&n| n > 0)
    });
    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// `"30000/1001"` → 29.97, `"25"` → 25.0. `None` for zero or malformed rates.
///
/// # Example
/// ```
/// use mta_source::video::parse_frame_rate;
/// assert_eq!(parse_frame_rate("24/1"), Some(24.0));
/// assert_eq!(parse_frame_rate("0/0"), None);
/// ```
#[must_use]
pub fn parse_frame_rate(val: &str) -> Option<f64> {
    let (num, den) = match val.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (val.trim().parse::<f64>().ok()?, 1.0),
    };
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Filtre ffmpeg appliquant la rotation demandée.
fn rotation_filter(rotation: Rotation) -> &'static str {
    match rotation {
        Rotation::Clockwise90 => "transpose=1",
        Rotation::Rotate180 => "hflip,vflip",
        Rotation::CounterClockwise90 => "transpose=2",
    }
}

/// Arguments ffmpeg du décodeur.
///
/// `-noautorotate` keeps the stream in the orientation ffprobe reported;
/// the trailing `scale` pins the output to `width`×`height` (already
/// rotated) so the raw frame size cannot drift from what is read.
fn decoder_args(
    path: &Path,
    rotation: Option<Rotation>,
    width: u32,
    height: u32,
) -> Vec<OsString> {
    let filter = match rotation {
        Some(r) => format!("{},scale={width}:{height}", rotation_filter(r)),
        None => format!("scale={width}:{height}"),
    };
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-noautorotate",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_owned());
    args.push("-vf".into());
    args.push(filter.into());
    // Pas de duplication/suppression de frames : une frame décodée = une lecture.
    args.extend(
        ["-vsync", "0", "-an", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

/// Décodeur vidéo : lit les frames RGBA produites par un processus ffmpeg.
///
/// Frames arrive in stream order, one per [`FrameSource::next_frame`] call.
/// The child process is killed on drop.
pub struct VideoDecoder {
    path: PathBuf,
    child: Child,
    stdout: ChildStdout,
    /// Collects ffmpeg's stderr for error messages.
    stderr: Option<JoinHandle<String>>,
    info: VideoInfo,
    width: u32,
    height: u32,
    frames_read: usize,
    finished: bool,
    handle: SourceHandle,
}

impl VideoDecoder {
    /// Probe `path` and start decoding.
    ///
    /// # Errors
    /// `Io` for a missing file, `Decode` if ffprobe/ffmpeg cannot be run or
    /// the file holds no video stream.
    ///
    /// # Example
    /// ```no_run
    /// use mta_source::video::VideoDecoder;
    /// use std::path::Path;
    /// let decoder = VideoDecoder::open(Path::new("clip.mp4"), None).unwrap();
    /// println!("{:?}", decoder.info());
    /// ```
    pub fn open(path: &Path, rotation: Option<Rotation>) -> Result<Self> {
        let info = probe_video(path)?;
        let (width, height) = info.rotated_size(rotation);

        let mut child = Command::new("ffmpeg")
            .args(decoder_args(path, rotation, width, height))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ConvertError::decode(format!(
                    "cannot run ffmpeg ({e}); is it installed and on PATH?"
                ))
            })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConvertError::decode("ffmpeg stdout not captured"));
        };
        // Vidé en continu : un pipe stderr plein bloquerait ffmpeg.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        log::info!(
            "Décodeur ouvert: {width}x{height} @ {:.3}fps, {}",
            info.fps,
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            child,
            stdout,
            stderr,
            info,
            width,
            height,
            frames_read: 0,
            finished: false,
            handle: SourceHandle::new(),
        })
    }

    #[must_use]
    pub fn info(&self) -> VideoInfo {
        self.info
    }

    /// Output frame size, rotation applied.
    #[must_use]
    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Handle that makes the next read fail, for early termination.
    #[must_use]
    pub fn handle(&self) -> SourceHandle {
        self.handle.clone()
    }

    /// ffmpeg's stderr once the process has exited, as an error suffix.
    fn diagnostics(&mut self) -> String {
        let text = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        stderr_suffix(&text)
    }

    fn shutdown(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.finished = true;
    }

    /// Reap ffmpeg after EOF and turn a failed exit into a decode error.
    fn finish_stream(&mut self) -> Result<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| ConvertError::io(&self.path, e))?;
        if status.success() {
            log::info!(
                "Décodeur: EOF après {} frame(s), {}",
                self.frames_read,
                self.path.display()
            );
            Ok(())
        } else {
            let diag = self.diagnostics();
            Err(ConvertError::decode(format!(
                "ffmpeg exited with {status} while decoding {}{diag}",
                self.path.display()
            )))
        }
    }
}

impl FrameSource for VideoDecoder {
    fn frame_rate(&self) -> f64 {
        self.info.fps
    }

    fn frame_count_hint(&self) -> Option<usize> {
        self.info.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<PixelBuffer>> {
        if let Err(e) = self.handle.check() {
            self.shutdown();
            return Err(e);
        }
        if self.finished {
            return Ok(None);
        }

        let frame_bytes = self.width as usize * self.height as usize * 4;
        let mut data = vec![0u8; frame_bytes];
        let read = read_frame(&mut self.stdout, &mut data)
            .map_err(|e| ConvertError::io(&self.path, e))?;

        if read == 0 {
            self.finish_stream()?;
            return Ok(None);
        }
        if read < frame_bytes {
            self.shutdown();
            let diag = self.diagnostics();
            return Err(ConvertError::decode(format!(
                "truncated frame: {read} of {frame_bytes} bytes{diag}"
            )));
        }

        self.frames_read += 1;
        PixelBuffer::from_rgba(self.width, self.height, data).map(Some)
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        if !self.finished {
            self.shutdown();
        }
    }
}

/// `": <text>"` for non-blank stderr output, empty otherwise.
fn stderr_suffix(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else {
        format!(": {text}")
    }
}

/// Fill `buf` from `reader`; returns the byte count actually read.
///
/// Less than `buf.len()` only at EOF.
///
/// # Errors
/// Propagates I/O errors other than `Interrupted`.
pub fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0usize;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_core::error::ErrorKind;
    use std::io::Cursor;

    #[test]
    fn probe_output_parsed() {
        let text = "width=1920\nheight=1080\nr_frame_rate=30000/1001\navg_frame_rate=0/0\n";
        let info = parse_probe_output(text).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 29.97).abs() < 0.001);
    }

    #[test]
    fn avg_rate_used_when_r_rate_missing() {
        let info = parse_probe_output("width=4\nheight=2\nr_frame_rate=0/0\navg_frame_rate=25/1").unwrap();
        assert!((info.fps - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_rate_is_zero() {
        let info = parse_probe_output("width=4\nheight=2\n").unwrap();
        assert!(info.fps.abs() < f64::EPSILON);
    }

    #[test]
    fn frame_count_from_nb_frames_or_duration() {
        let info = parse_probe_output("width=4\nheight=2\nr_frame_rate=25/1\nnb_frames=250\nduration=9.9").unwrap();
        assert_eq!(info.frame_count, Some(250));

        let info = parse_probe_output("width=4\nheight=2\nr_frame_rate=30/1\nnb_frames=N/A\nduration=10.0").unwrap();
        assert_eq!(info.frame_count, Some(300));

        let info = parse_probe_output("width=4\nheight=2\nnb_frames=N/A\nduration=10.0").unwrap();
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn decoder_disables_autorotation_and_pins_size() {
        let args = decoder_args(Path::new("clip.mp4"), None, 1920, 1080);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let flag = args.iter().position(|a| a == "-noautorotate").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(flag < input, "-noautorotate must precede -i");
        assert_eq!(args[input + 1], "clip.mp4");
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "scale=1920:1080");
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn decoder_rotation_filter_precedes_scale() {
        let info = VideoInfo {
            width: 1920,
            height: 1080,
            fps: 30.0,
            frame_count: None,
        };
        let rot = Some(Rotation::Clockwise90);
        let (w, h) = info.rotated_size(rot);
        let args = decoder_args(Path::new("clip.mp4"), rot, w, h);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "transpose=1,scale=1080:1920");
        assert_eq!(args.iter().filter(|a| *a == "-noautorotate").count(), 1);
    }

    #[test]
    fn ffmpeg_stderr_carried_into_errors() {
        assert_eq!(
            stderr_suffix("  [mov,mp4] moov atom not found\n"),
            ": [mov,mp4] moov atom not found"
        );
        assert_eq!(stderr_suffix(" \n"), "");
    }

    #[test]
    fn no_stream_rejected() {
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("width=0\nheight=10").is_err());
    }

    #[test]
    fn frame_rate_forms() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("60/2"), Some(30.0));
        assert_eq!(parse_frame_rate("abc"), None);
        assert_eq!(parse_frame_rate("1/0"), None);
    }

    #[test]
    fn read_frame_reports_short_read() {
        let mut full = Cursor::new(vec![1u8; 8]);
        let mut buf = [0u8; 8];
        assert_eq!(read_frame(&mut full, &mut buf).unwrap(), 8);
        assert_eq!(read_frame(&mut full, &mut buf).unwrap(), 0);

        let mut short = Cursor::new(vec![1u8; 5]);
        assert_eq!(read_frame(&mut short, &mut buf).unwrap(), 5);
    }

    #[test]
    fn rotated_size_swaps_for_quarter_turns() {
        let info = VideoInfo {
            width: 640,
            height: 360,
            fps: 24.0,
            frame_count: None,
        };
        assert_eq!(info.rotated_size(Some(Rotation::Clockwise90)), (360, 640));
        assert_eq!(info.rotated_size(Some(Rotation::Rotate180)), (640, 360));
        assert_eq!(info.rotated_size(None), (640, 360));
    }

    #[test]
    fn open_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = VideoDecoder::open(&dir.path().join("none.mp4"), None)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
