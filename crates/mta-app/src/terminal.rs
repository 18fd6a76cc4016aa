use std::io::Write;
use std::time::{Duration, Instant};

use mta_core::error::{ConvertError, Result};
use mta_core::frame::{ConvertedFrame, LineEnding};
use mta_core::traits::FrameSink;
use mta_export::text::print_grid;

/// Efface l'écran et replace le curseur en haut à gauche.
const CLEAR_HOME: &str = "\x1b[2J\x1b[H";
const HOME: &str = "\x1b[H";
const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h\x1b[0m";

/// Sink that plays frames in the terminal, paced at the output rate.
///
/// The screen is cleared once, then each frame redraws from the home
/// position.
pub struct TerminalPlayer<W: Write> {
    out: W,
    frame_period: Duration,
    ending: LineEnding,
    next_deadline: Option<Instant>,
    shown: usize,
}

impl<W: Write> TerminalPlayer<W> {
    /// `fps` ≤ 0 or non-finite plays as fast as frames arrive.
    #[must_use]
    pub fn new(out: W, fps: f64, ending: LineEnding) -> Self {
        let frame_period = if fps.is_finite() && fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self {
            out,
            frame_period,
            ending,
            next_deadline: None,
            shown: 0,
        }
    }

    #[must_use]
    pub fn frames_shown(&self) -> usize {
        self.shown
    }

    fn emit(&mut self, s: &str) -> Result<()> {
        self.out
            .write_all(s.as_bytes())
            .map_err(|e| ConvertError::io("<stdout>", e))
    }

    fn wait_turn(&self) {
        if let Some(deadline) = self.next_deadline {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
        }
    }
}

impl<W: Write> FrameSink for TerminalPlayer<W> {
    fn accept(&mut self, frame: ConvertedFrame) -> Result<()> {
        if self.shown == 0 {
            self.emit(HIDE_CURSOR)?;
            self.emit(CLEAR_HOME)?;
        } else {
            self.wait_turn();
            self.emit(HOME)?;
        }
        print_grid(&mut self.out, &frame.chars, frame.colors.as_ref(), self.ending)?;
        self.next_deadline = Some(Instant::now() + self.frame_period);
        self.shown += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.emit(SHOW_CURSOR)?;
        self.out
            .flush()
            .map_err(|e| ConvertError::io("<stdout>", e))
    }

    fn abort(&mut self) {
        let _ = self.emit(SHOW_CURSOR);
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_core::frame::CharacterGrid;

    fn frame(index: usize, ch: char) -> ConvertedFrame {
        let mut chars = CharacterGrid::new(2, 1);
        chars.set(0, 0, ch);
        ConvertedFrame {
            index,
            chars,
            colors: None,
        }
    }

    #[test]
    fn clears_once_then_homes() {
        let mut player = TerminalPlayer::new(Vec::new(), 0.0, LineEnding::Lf);
        player.accept(frame(0, 'a')).unwrap();
        player.accept(frame(1, 'b')).unwrap();
        player.finish().unwrap();
        let out = String::from_utf8(player.out).unwrap();
        assert_eq!(out.matches("\x1b[2J").count(), 1);
        assert!(out.contains("a \n"));
        assert!(out.contains("\x1b[Hb \n"));
        assert!(out.ends_with(SHOW_CURSOR));
        assert_eq!(player.shown, 2);
    }

    #[test]
    fn paced_at_output_rate() {
        let mut player = TerminalPlayer::new(Vec::new(), 50.0, LineEnding::Lf);
        let start = Instant::now();
        for i in 0..4 {
            player.accept(frame(i, '#')).unwrap();
        }
        // Three inter-frame gaps of 20 ms.
        assert!(start.elapsed() >= Duration::from_millis(55));
    }
}
