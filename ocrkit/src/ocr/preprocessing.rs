use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_with, Interpolation};
use imageproc::geometry::{convex_hull, min_area_rect};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::image_ref::ImageRef;
use crate::error::{OcrKitError, Result};

/// Neighbourhood size of the adaptive threshold, in pixels.
const ADAPTIVE_BLOCK_SIZE: u32 = 11;
/// Subtracted from the weighted local mean before comparing.
const ADAPTIVE_C: i16 = 2;

/// A named preprocessing operation applied before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Otsu,
    Adaptive,
    Deskew,
}

impl Strategy {
    /// The order the retry controller walks through.
    pub const ROTATION: [Strategy; 3] = [Strategy::Otsu, Strategy::Adaptive, Strategy::Deskew];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Otsu => "otsu",
            Strategy::Adaptive => "adaptive",
            Strategy::Deskew => "deskew",
        }
    }

    fn apply(&self, img: &DynamicImage) -> DynamicImage {
        match self {
            Strategy::Otsu => DynamicImage::ImageLuma8(binarize_otsu(&img.to_luma8())),
            Strategy::Adaptive => {
                let binary = adaptive_gaussian_threshold(&img.to_luma8());
                DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(binary).to_rgb8())
            }
            Strategy::Deskew => match deskew_angle(&img.to_luma8()) {
                Some(angle) => {
                    debug!(angle_degrees = angle, "Rotating to correct skew");
                    DynamicImage::ImageRgb8(rotate_replicate(&img.to_rgb8(), angle))
                }
                None => {
                    debug!("No foreground pixels, leaving image unrotated");
                    img.clone()
                }
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = OcrKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "otsu" => Ok(Strategy::Otsu),
            "adaptive" => Ok(Strategy::Adaptive),
            "deskew" => Ok(Strategy::Deskew),
            _ => Err(OcrKitError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A derived image written to scratch space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessedImage {
    pub path: PathBuf,
    pub source: PathBuf,
    pub strategy: Strategy,
}

impl PreprocessedImage {
    /// Delete the scratch file. A file that is already gone is not an error.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Apply `strategy` to `src` and write the result to `<scratch>/<stem>_<suffix>.<ext>`.
pub fn preprocess(
    src: &ImageRef,
    strategy: Strategy,
    scratch: &Path,
    suffix: &str,
) -> Result<PreprocessedImage> {
    let dest = src.derived_path(scratch, suffix);
    preprocess_to(src, strategy, dest)
}

/// Apply `strategy` to `src` and write the result to `dest`, encoded in the
/// source's format.
pub fn preprocess_to(
    src: &ImageRef,
    strategy: Strategy,
    dest: PathBuf,
) -> Result<PreprocessedImage> {
    let img = src.open()?;
    let processed = strategy.apply(&img);
    src.write_derived(&processed, &dest)?;

    info!(
        source = %src.path().display(),
        derived = %dest.display(),
        strategy = %strategy,
        "Preprocessed image"
    );

    Ok(PreprocessedImage {
        path: dest,
        source: src.path().to_path_buf(),
        strategy,
    })
}

/// Global Otsu binarization: pixels above the computed level become white.
///
/// A uniform image has no meaningful split and is returned as-is, which keeps
/// blank pages blank and makes repeated application a no-op.
fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if min >= max {
        return gray.clone();
    }

    let level = otsu_level(gray);
    debug!(level, "Otsu threshold computed");
    threshold(gray, level, ThresholdType::Binary)
}

/// Adaptive threshold against a Gaussian-weighted local mean.
///
/// Sigma is derived from the block size the same way OpenCV sizes its kernel,
/// so a block of 11 gives sigma 2.0.
fn adaptive_gaussian_threshold(gray: &GrayImage) -> GrayImage {
    let sigma = 0.3 * ((ADAPTIVE_BLOCK_SIZE as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(gray, sigma);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as i16;
        let cutoff = local_mean.get_pixel(x, y)[0] as i16 - ADAPTIVE_C;
        if value > cutoff {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Skew correction angle in degrees for the non-zero pixels of `gray`.
///
/// The minimum-area rectangle around the foreground gives an angle in
/// `[-90, 0)`; angles below -45 are folded so the nearest side is brought
/// back to the axis. Returns `None` when there is nothing to measure.
pub(crate) fn deskew_angle(gray: &GrayImage) -> Option<f32> {
    // The hull of every row's outermost foreground pixels equals the hull of
    // all foreground pixels.
    let mut points = Vec::new();
    for y in 0..gray.height() {
        let mut first = None;
        let mut last = None;
        for x in 0..gray.width() {
            if gray.get_pixel(x, y)[0] != 0 {
                first.get_or_insert(x);
                last = Some(x);
            }
        }
        if let (Some(l), Some(r)) = (first, last) {
            points.push(Point::new(l as i32, y as i32));
            if r != l {
                points.push(Point::new(r as i32, y as i32));
            }
        }
    }

    if points.is_empty() {
        return None;
    }

    // Single pixel or a line: nothing to straighten.
    if points.len() < 3 {
        return Some(0.0);
    }
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return Some(0.0);
    }

    let corners = min_area_rect(&hull);
    let raw = rect_angle(&corners);
    let angle = if raw < -45.0 { -(90.0 + raw) } else { -raw };
    Some(angle)
}

/// Angle of the rectangle's first side folded into `[-90, 0)`.
fn rect_angle(corners: &[Point<i32>; 4]) -> f32 {
    let dx = (corners[1].x - corners[0].x) as f32;
    let dy = (corners[1].y - corners[0].y) as f32;
    let degrees = dy.atan2(dx).to_degrees();
    degrees.rem_euclid(90.0) - 90.0
}

/// Bicubic sampling reads one pixel before and two after the sample point,
/// and rejects points whose floor sits on the last three columns or rows.
const BICUBIC_PAD: u32 = 3;

/// Rotate about the centre by `degrees` (clockwise on screen for positive
/// values) with bicubic sampling. Samples falling outside the image are taken
/// from the nearest edge pixel.
fn rotate_replicate(img: &RgbImage, degrees: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }

    // Surround the source with replicated edge pixels so every clamped sample
    // has a full bicubic neighbourhood.
    let pad = BICUBIC_PAD;
    let padded = RgbImage::from_fn(w + 2 * pad, h + 2 * pad, |x, y| {
        let sx = x.saturating_sub(pad).min(w - 1);
        let sy = y.saturating_sub(pad).min(h - 1);
        *img.get_pixel(sx, sy)
    });

    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;
    let (sin, cos) = degrees.to_radians().sin_cos();
    let offset = pad as f32;
    let (max_x, max_y) = ((w - 1) as f32, (h - 1) as f32);

    let rotated = warp_with(
        &padded,
        move |x, y| {
            // Inverse rotation: map each output pixel back into the source.
            let dx = x - offset - cx;
            let dy = y - offset - cy;
            let sx = (cos * dx + sin * dy + cx).clamp(0.0, max_x);
            let sy = (-sin * dx + cos * dy + cy).clamp(0.0, max_y);
            (sx + offset, sy + offset)
        },
        Interpolation::Bicubic,
        Rgb([255, 255, 255]),
    );

    image::imageops::crop_imm(&rotated, pad, pad, w, h).to_image()
}
