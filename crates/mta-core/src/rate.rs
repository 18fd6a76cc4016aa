use crate::error::{ConvertError, Result};

/// Which decoded frames get converted.
///
/// Frames are dropped at a fixed stride, never resampled or interpolated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameRatePolicy {
    /// Convert every decoded frame.
    #[default]
    EveryFrame,
    /// Convert at most N frames per second of source time.
    Cap(u32),
}

impl FrameRatePolicy {
    /// `None` → every frame, `Some(n)` → cap at `n`.
    #[must_use]
    pub fn from_max_fps(max_fps: Option<u32>) -> Self {
        max_fps.map_or(Self::EveryFrame, Self::Cap)
    }

    /// # Errors
    /// `InvalidConfig` for a cap of zero.
    pub fn validate(self) -> Result<()> {
        match self {
            Self::Cap(0) => Err(ConvertError::config("max_fps must be at least 1")),
            _ => Ok(()),
        }
    }

    /// Selection stride for a source declaring `source_fps`.
    ///
    /// `round(S / N)`, never below 1. A source without a usable rate
    /// cannot be capped and keeps every frame.
    ///
    /// # Example
    /// ```
    /// use mta_core::rate::FrameRatePolicy;
    /// assert_eq!(FrameRatePolicy::Cap(10).stride(30.0), 3);
    /// assert_eq!(FrameRatePolicy::Cap(10).stride(29.97), 3);
    /// assert_eq!(FrameRatePolicy::Cap(60).stride(24.0), 1);
    /// assert_eq!(FrameRatePolicy::EveryFrame.stride(30.0), 1);
    /// ```
    #[must_use]
    pub fn stride(self, source_fps: f64) -> usize {
        match self {
            Self::EveryFrame | Self::Cap(0) => 1,
            Self::Cap(cap) => {
                if !source_fps.is_finite() || source_fps <= 0.0 {
                    log::warn!("source declares no usable frame rate, max_fps {cap} ignored");
                    return 1;
                }
                ((source_fps / f64::from(cap)).round() as usize).max(1)
            }
        }
    }
}

/// Deterministic stride selector scoped to one pipeline run.
///
/// Always keeps frame 0, then every `stride`-th frame. The counter only
/// moves forward, so selection does not drift with timestamps.
///
/// # Example
/// ```
/// use mta_core::rate::{FrameRatePolicy, FrameSelector};
/// let mut sel = FrameSelector::new(FrameRatePolicy::Cap(10), 30.0);
/// let kept: Vec<bool> = (0..6).map(|_| sel.admit()).collect();
/// assert_eq!(kept, [true, false, false, true, false, false]);
/// ```
#[derive(Debug)]
pub struct FrameSelector {
    stride: usize,
    source_fps: f64,
    next_index: usize,
}

impl FrameSelector {
    #[must_use]
    pub fn new(policy: FrameRatePolicy, source_fps: f64) -> Self {
        Self {
            stride: policy.stride(source_fps),
            source_fps,
            next_index: 0,
        }
    }

    /// Decide for the next decoded frame. Advances the counter.
    pub fn admit(&mut self) -> bool {
        let keep = self.next_index % self.stride == 0;
        self.next_index += 1;
        keep
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// How many of `decoded` frames this selector keeps: `ceil(decoded / stride)`.
    #[must_use]
    pub fn selected_of(&self, decoded: usize) -> usize {
        decoded.div_ceil(self.stride)
    }

    /// Frames seen so far.
    #[must_use]
    pub fn seen(&self) -> usize {
        self.next_index
    }

    /// Rate of the selected frames, `S / stride`; keeps the source duration
    /// when the selection is encoded. Falls back to 30 for unusable sources.
    #[must_use]
    pub fn output_fps(&self) -> f64 {
        if self.source_fps.is_finite() && self.source_fps > 0.0 {
            self.source_fps / self.stride as f64
        } else {
            30.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_30_to_10_keeps_every_third() {
        let mut sel = FrameSelector::new(FrameRatePolicy::Cap(10), 30.0);
        let kept: Vec<usize> = (0..300).filter(|_| sel.admit()).collect();
        assert_eq!(kept.len(), 100);
        assert!(kept.iter().all(|i| i % 3 == 0));
        assert_eq!(sel.seen(), 300);
        assert_eq!(sel.selected_of(300), 100);
        assert_eq!(sel.selected_of(301), 101);
        assert_eq!(sel.selected_of(0), 0);
    }

    #[test]
    fn kept_indices_are_multiples_of_stride() {
        let mut sel = FrameSelector::new(FrameRatePolicy::Cap(12), 60.0);
        let kept: Vec<usize> = (0..20).filter(|_| sel.admit()).collect();
        assert_eq!(kept, vec![0, 5, 10, 15]);
    }

    #[test]
    fn cap_above_source_keeps_all() {
        let mut sel = FrameSelector::new(FrameRatePolicy::Cap(120), 25.0);
        assert!((0..50).all(|_| sel.admit()));
        assert!((sel.output_fps() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unusable_source_rate_keeps_all() {
        assert_eq!(FrameRatePolicy::Cap(10).stride(0.0), 1);
        assert_eq!(FrameRatePolicy::Cap(10).stride(f64::NAN), 1);
    }

    #[test]
    fn output_rate_divides_source() {
        let sel = FrameSelector::new(FrameRatePolicy::Cap(10), 30.0);
        assert!((sel.output_fps() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_cap_invalid() {
        assert!(FrameRatePolicy::Cap(0).validate().is_err());
        assert!(FrameRatePolicy::Cap(1).validate().is_ok());
    }
}
