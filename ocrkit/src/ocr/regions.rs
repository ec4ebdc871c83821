use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::image_ref::ImageRef;
use crate::config::RegionConfig;
use crate::error::Result;

/// Axis-aligned bounding box of a block of ink, in source pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub crop_path: Option<PathBuf>,
}

/// Find text blocks in `src` and optionally write a crop of each one.
///
/// Only outermost contours are considered; boxes must be strictly wider than
/// `min_width` and strictly taller than `min_height`. Regions come back in
/// contour-tracing order, which is not reading order.
pub fn detect_regions(src: &ImageRef, config: &RegionConfig, scratch: &Path) -> Result<Vec<Region>> {
    let img = src.open()?;
    let mask = ink_mask(&img.to_luma8(), config.binary_threshold);

    let contours = find_contours::<i32>(&mask);
    debug!(contours = contours.len(), "Traced contours");

    let mut regions = Vec::new();
    for contour in contours.iter().filter(|c| is_external(c)) {
        let Some((x, y, width, height)) = bounding_box(contour) else {
            continue;
        };
        if width <= config.min_width || height <= config.min_height {
            continue;
        }

        let crop_path = if config.write_crops {
            let dest = src.derived_path(scratch, &format!("region_{}", regions.len()));
            let crop = img.crop_imm(x, y, width, height);
            src.write_derived(&crop, &dest)?;
            Some(dest)
        } else {
            None
        };

        regions.push(Region {
            x,
            y,
            width,
            height,
            crop_path,
        });
    }

    info!(
        source = %src.path().display(),
        regions = regions.len(),
        "Detected text regions"
    );
    Ok(regions)
}

/// Ink (pixels at or below `level`) becomes foreground for contour tracing.
fn ink_mask(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] <= level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn is_external(contour: &Contour<i32>) -> bool {
    contour.border_type == BorderType::Outer && contour.parent.is_none()
}

/// Inclusive extent of the contour points as `(x, y, width, height)`.
fn bounding_box(contour: &Contour<i32>) -> Option<(u32, u32, u32, u32)> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
