//! Binary PPM (P6) decoding with nearest-neighbor resampling

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use tracing::{instrument, trace, warn};

use crate::error::DecodeError;
use crate::media::{FrameBuffer, Resolution, Rgb};

/// Longest header line accepted, after trimming
pub const MAX_HEADER_LINE: usize = 100;

/// Parsed P6 image, samples still raw
#[derive(Debug, Clone)]
pub struct PpmImage {
    width: u32,
    height: u32,
    max_value: u32,
    /// Exactly width*height*3 bytes, top-left origin
    samples: Bytes,
}

impl PpmImage {
    /// Parse a binary `P6` image
    ///
    /// Width and height must be positive and max-value must not be negative;
    /// such headers describe no image and fail with
    /// [`DecodeError::BadHeader`]. A max-value of 0 or above 255 only logs a
    /// warning: samples are normalized by the declared value, and 0 yields
    /// black.
    pub fn parse(data: impl Into<Bytes>) -> Result<Self, DecodeError> {
        let data: Bytes = data.into();
        let mut pos = 0;

        // Magic must be the first token of the first line
        let first = trim(next_line(&data, &mut pos).unwrap_or_default());
        let mut magic_line = split_tokens(first);
        match magic_line.next() {
            Some(b"P6") => {}
            other => {
                return Err(DecodeError::BadMagic {
                    found: String::from_utf8_lossy(other.unwrap_or(first)).into_owned(),
                })
            }
        }

        // width, height, max-value
        let mut fields: Vec<i64> = Vec::with_capacity(3);
        push_fields(magic_line, &mut fields)?;

        while fields.len() < 3 {
            let line = next_line(&data, &mut pos)
                .ok_or_else(|| DecodeError::header("header ended before width/height/max-value"))?;
            let line = trim(line);
            if line.is_empty() {
                return Err(DecodeError::header("empty header line"));
            }
            if line.len() > MAX_HEADER_LINE {
                return Err(DecodeError::header(format!(
                    "header line of {} bytes exceeds {MAX_HEADER_LINE}",
                    line.len()
                )));
            }
            if line.starts_with(b"#") {
                continue;
            }
            push_fields(split_tokens(line), &mut fields)?;
        }

        let (width, height, max_value) = (fields[0], fields[1], fields[2]);
        if width <= 0 || height <= 0 {
            return Err(DecodeError::header(format!(
                "non-positive dimensions {width}x{height}"
            )));
        }
        if max_value < 0 {
            return Err(DecodeError::header(format!(
                "negative max-value {max_value}"
            )));
        }
        let to_u32 = |v: i64| {
            u32::try_from(v).map_err(|_| DecodeError::header(format!("header value {v} too large")))
        };
        let (width, height, max_value) = (to_u32(width)?, to_u32(height)?, to_u32(max_value)?);

        if max_value == 0 || max_value > 255 {
            warn!("Max value {}, expected 255. Normalizing anyway", max_value);
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| DecodeError::header(format!("dimensions {width}x{height} overflow")))?;
        let actual = data.len() - pos;
        if actual < expected {
            return Err(DecodeError::BadPayload { expected, actual });
        }

        trace!("P6 header {}x{} max {}", width, height, max_value);

        Ok(Self {
            width,
            height,
            max_value,
            samples: data.slice(pos..pos + expected),
        })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    /// Nearest-neighbor resample to `target` (source size when `None`)
    ///
    /// Output rows are flipped so row 0 is the bottom row of the source.
    pub fn resample(&self, target: Option<Resolution>) -> Result<FrameBuffer, DecodeError> {
        let target = target.unwrap_or_else(|| self.resolution());
        if target.width == 0 || target.height == 0 {
            return Err(DecodeError::BadTargetResolution {
                width: target.width,
                height: target.height,
            });
        }

        let (ow, oh) = (self.width as usize, self.height as usize);
        let (tw, th) = (target.width as usize, target.height as usize);
        let x_scale = ow as f64 / tw as f64;
        let y_scale = oh as f64 / th as f64;

        let mut pixels = Vec::with_capacity(tw * th);
        for ty in 0..th {
            let oy_raw = (ty as f64 * y_scale).floor() as usize;
            let oy = (oh - 1).saturating_sub(oy_raw);
            for tx in 0..tw {
                let ox = ((tx as f64 * x_scale).floor() as usize).min(ow - 1);
                let i = (oy * ow + ox) * 3;
                pixels.push(self.normalize(&self.samples[i..i + 3]));
            }
        }

        Ok(FrameBuffer::from_samples(target, pixels))
    }

    fn normalize(&self, px: &[u8]) -> Rgb {
        if self.max_value == 0 {
            return Rgb::BLACK;
        }
        let max = self.max_value as f32;
        Rgb::new(
            f32::from(px[0]) / max,
            f32::from(px[1]) / max,
            f32::from(px[2]) / max,
        )
    }
}

/// Decode P6 bytes and resample to `target`
pub fn decode_ppm(
    data: impl Into<Bytes>,
    target: Option<Resolution>,
) -> Result<FrameBuffer, DecodeError> {
    PpmImage::parse(data)?.resample(target)
}

/// Read and decode a P6 file
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_ppm(path: &Path, target: Option<Resolution>) -> Result<FrameBuffer, DecodeError> {
    let started = Instant::now();

    let data = std::fs::read(path).map_err(|source| DecodeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let frame = decode_ppm(data, target)?;

    metrics::histogram!("decode_time_us").record(started.elapsed().as_micros() as f64);
    Ok(frame)
}

/// Next `\n`-terminated line, without the terminator
fn next_line<'a>(data: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    if *pos >= data.len() {
        return None;
    }
    let rest = &data[*pos..];
    match rest.iter().position(|&b| b == b'\n') {
        Some(n) => {
            *pos += n + 1;
            Some(&rest[..n])
        }
        None => {
            *pos = data.len();
            Some(rest)
        }
    }
}

fn trim(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

/// Whitespace-separated tokens, stopping at a `#` comment
fn split_tokens(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .take_while(|t| !t.starts_with(b"#"))
}

fn push_fields<'a>(
    tokens: impl Iterator<Item = &'a [u8]>,
    fields: &mut Vec<i64>,
) -> Result<(), DecodeError> {
    for token in tokens {
        if fields.len() == 3 {
            break;
        }
        let value = std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                DecodeError::header(format!(
                    "bad dims/max token {:?}",
                    String::from_utf8_lossy(token)
                ))
            })?;
        fields.push(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ppm(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    /// 2x2 image: top row red, green; bottom row blue, white
    fn quad() -> Vec<u8> {
        ppm(
            "P6\n2 2\n255\n",
            &[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
        )
    }

    #[test]
    fn identity_decode_flips_rows() {
        let fb = decode_ppm(quad(), None).unwrap();
        assert_eq!(fb.resolution(), Resolution::new(2, 2));
        // Row 0 of the output is the bottom source row
        assert_eq!(
            fb.pixels(),
            &[
                Rgb::new(0.0, 0.0, 1.0),
                Rgb::new(1.0, 1.0, 1.0),
                Rgb::new(1.0, 0.0, 0.0),
                Rgb::new(0.0, 1.0, 0.0),
            ]
        );
    }

    #[test]
    fn channels_divide_by_255_exactly() {
        let raw = [0u8, 1, 2, 127, 128, 200, 254, 255, 31];
        let fb = decode_ppm(ppm("P6\n3 1\n255\n", &raw), None).unwrap();
        let flat: Vec<f32> = fb.pixels().iter().flat_map(|p| [p.r, p.g, p.b]).collect();
        let expected: Vec<f32> = raw.iter().map(|&b| b as f32 / 255.0).collect();
        assert_eq!(flat, expected);
    }

    #[test]
    fn header_tolerates_comments_and_split_lines() {
        let data = ppm(
            "P6\n# made by hand\n2\n# still header\n2 255\n",
            &[9; 12],
        );
        let img = PpmImage::parse(data).unwrap();
        assert_eq!(img.resolution(), Resolution::new(2, 2));
        assert_eq!(img.max_value(), 255);

        let inline = ppm("P6 2 2 255\n", &[9; 12]);
        assert!(PpmImage::parse(inline).is_ok());
    }

    #[test]
    fn payload_may_contain_newline_bytes() {
        let data = ppm("P6\n1 1\n255\n", b"\n\n\n");
        let fb = decode_ppm(data, None).unwrap();
        assert_eq!(fb.pixels()[0].r, 10.0 / 255.0);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let err = decode_ppm(ppm("P3\n2 2\n255\n", &[0; 12]), None).unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { ref found } if found == "P3"));

        let err = decode_ppm(Vec::new(), None).unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { .. }));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let long = format!("P6\n{}\n2 2 255\n", "1".repeat(101));
        let cases = [
            "P6\n\n2 2 255\n".to_string(),
            "P6\ntwo 2\n255\n".to_string(),
            "P6\n0 2\n255\n".to_string(),
            "P6\n2 -1\n255\n".to_string(),
            "P6\n2 2\n-3\n".to_string(),
            "P6\n2 2\n".to_string(),
            long,
        ];
        for header in cases {
            let err = decode_ppm(ppm(&header, &[0; 12]), None).unwrap_err();
            assert!(matches!(err, DecodeError::BadHeader(_)), "{header:?}: {err}");
        }
    }

    #[test]
    fn short_payload_is_fatal() {
        let err = decode_ppm(ppm("P6\n2 2\n255\n", &[0; 11]), None).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::BadPayload {
                expected: 12,
                actual: 11
            }
        ));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let fb = decode_ppm(ppm("P6\n1 1\n255\n", &[255, 255, 255, 7, 7]), None).unwrap();
        assert_eq!(fb.pixels(), &[Rgb::new(1.0, 1.0, 1.0)]);
    }

    #[test]
    fn only_negative_max_value_is_a_header_error() {
        let err = decode_ppm(ppm("P6\n1 1\n-1\n", &[9; 3]), None).unwrap_err();
        assert!(matches!(err, DecodeError::BadHeader(ref m) if m.contains("negative")));

        for header in ["P6\n1 1\n0\n", "P6\n1 1\n65535\n"] {
            assert!(decode_ppm(ppm(header, &[9; 3]), None).is_ok(), "{header:?}");
        }
    }

    #[test]
    fn zero_max_value_yields_black() {
        let fb = decode_ppm(ppm("P6\n1 1\n0\n", &[200, 100, 50]), None).unwrap();
        assert_eq!(fb.pixels(), &[Rgb::BLACK]);
    }

    #[test]
    fn large_max_value_normalizes_by_declared_max() {
        let fb = decode_ppm(ppm("P6\n1 1\n1000\n", &[250, 0, 0]), None).unwrap();
        assert_eq!(fb.pixels()[0].r, 0.25);
    }

    #[test]
    fn zero_target_is_rejected() {
        let err = decode_ppm(quad(), Some(Resolution::new(0, 4))).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::BadTargetResolution {
                width: 0,
                height: 4
            }
        ));
    }

    #[test]
    fn upscale_uses_row_major_addressing_for_non_square_targets() {
        // 4x2 target from the 2x2 quad: every source pixel is doubled horizontally
        let fb = decode_ppm(quad(), Some(Resolution::new(4, 2))).unwrap();
        assert_eq!(fb.len(), 8);
        let blue = Rgb::new(0.0, 0.0, 1.0);
        let white = Rgb::new(1.0, 1.0, 1.0);
        let red = Rgb::new(1.0, 0.0, 0.0);
        let green = Rgb::new(0.0, 1.0, 0.0);
        assert_eq!(
            fb.pixels(),
            &[blue, blue, white, white, red, red, green, green]
        );
    }

    #[test]
    fn downscale_picks_nearest_source_pixel() {
        let fb = decode_ppm(quad(), Some(Resolution::new(1, 1))).unwrap();
        // ty=0 maps to the bottom source row, tx=0 to the first column
        assert_eq!(fb.pixels(), &[Rgb::new(0.0, 0.0, 1.0)]);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_ppm(Path::new("/definitely/not/here.ppm"), None).unwrap_err();
        assert!(matches!(err, DecodeError::Read { .. }));
    }
}
