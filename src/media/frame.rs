use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Normalized color triple, each channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Quantize back to 8-bit channels for byte-oriented outputs
    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }
}

/// Grid or image size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `50x50`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let width = w
            .trim()
            .parse()
            .map_err(|e| format!("bad width {w:?}: {e}"))?;
        let height = h
            .trim()
            .parse()
            .map_err(|e| format!("bad height {h:?}: {e}"))?;
        Ok(Self { width, height })
    }
}

/// Decoded frame: row-major samples with the origin at the bottom-left
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    resolution: Resolution,
    pixels: Vec<Rgb>,
}

impl FrameBuffer {
    /// Returns `None` unless `pixels` holds exactly width*height samples
    pub fn new(resolution: Resolution, pixels: Vec<Rgb>) -> Option<Self> {
        (pixels.len() == resolution.pixel_count()).then_some(Self { resolution, pixels })
    }

    pub(crate) fn from_samples(resolution: Resolution, pixels: Vec<Rgb>) -> Self {
        debug_assert_eq!(pixels.len(), resolution.pixel_count());
        Self { resolution, pixels }
    }

    /// Solid-color frame
    pub fn filled(resolution: Resolution, color: Rgb) -> Self {
        Self {
            resolution,
            pixels: vec![color; resolution.pixel_count()],
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// Point on a video's timeline, in seconds
///
/// Index keys such as `"1"` and `"1.0"` parse to the same value; only the
/// numeric value takes part in ordering and delay computation.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(f64);

impl Timestamp {
    pub fn from_secs(secs: f64) -> Self {
        // Fold -0.0 into 0.0 so both sort as the same key
        Self(if secs == 0.0 { 0.0 } else { secs })
    }

    /// Parses an index key; rejects anything that is not a finite number
    pub fn parse(key: &str) -> Option<Self> {
        key.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Self::from_secs)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_buffer_rejects_wrong_length() {
        let res = Resolution::new(2, 2);
        assert!(FrameBuffer::new(res, vec![Rgb::BLACK; 3]).is_none());
        let fb = FrameBuffer::new(res, vec![Rgb::BLACK; 4]).unwrap();
        assert_eq!(fb.len(), 4);
    }

    #[test]
    fn timestamps_compare_numerically() {
        assert_eq!(Timestamp::parse("1"), Timestamp::parse("1.0"));
        assert_eq!(Timestamp::parse("-0"), Timestamp::parse("0.0"));
        assert!(Timestamp::parse("0.04") < Timestamp::parse("0.12"));
        assert!(Timestamp::parse("10") > Timestamp::parse("9.5"));
        assert!(Timestamp::parse("NaN").is_none());
        assert!(Timestamp::parse("inf").is_none());
        assert!(Timestamp::parse("frame").is_none());
    }

    #[test]
    fn resolution_parses_cli_form() {
        assert_eq!("50x40".parse::<Resolution>().unwrap(), Resolution::new(50, 40));
        assert!("50".parse::<Resolution>().is_err());
        assert!("ax2".parse::<Resolution>().is_err());
    }

    #[test]
    fn rgb8_round_trips_extremes() {
        assert_eq!(Rgb::new(1.0, 0.0, 0.5).to_rgb8(), [255, 0, 128]);
    }
}
