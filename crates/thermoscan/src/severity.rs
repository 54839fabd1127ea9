//! Contrast/area severity score.
//!
//! `severity = min(1, 0.7 · contrast + 0.3 · area_norm)`, rounded to four
//! decimals, where `contrast` compares the mean brightness of the hot pixels
//! with an 11×11 ring around them and `area_norm` is the box area against 5 %
//! of the image.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;

use crate::bbox::BBox;
use crate::merge::AnomalyBlob;
use crate::stats::{linear_percentile, mean};

const CONTRAST_WEIGHT: f64 = 0.7;
const AREA_WEIGHT: f64 = 0.3;
/// Box area that saturates the area term, as a share of the image.
const AREA_SATURATION_FRAC: f64 = 0.05;
/// Ring radius; an 11×11 square element.
const RING_RADIUS: u8 = 5;
/// Brightness percentile marking hot pixels of a bare box.
const BOX_HOT_PERCENTILE: f64 = 85.0;

fn round4(v: f64) -> f64 {
    (v * 1e4).round() / 1e4
}

/// Combine a contrast in `[0, 1]` and an area term into the final score.
pub fn severity_score(contrast: f64, area_norm: f64) -> f64 {
    let s = CONTRAST_WEIGHT * contrast.max(0.0) + AREA_WEIGHT * area_norm.clamp(0.0, 1.0);
    round4(s.min(1.0))
}

/// Severity of the region `roi` of brightness plane `value`, with hot pixels
/// chosen by `is_hot(x, y)` (image coordinates).
///
/// `roi` must lie inside `value`. Returns 0 when nothing in `roi` is hot.
pub fn region_severity(value: &GrayImage, roi: BBox, is_hot: impl Fn(u32, u32) -> bool) -> f64 {
    let (img_w, img_h) = value.dimensions();
    let hot = GrayImage::from_fn(roi.w, roi.h, |lx, ly| {
        Luma([if is_hot(roi.x + lx, roi.y + ly) { 255 } else { 0 }])
    });
    let v_at = |lx: u32, ly: u32| value.get_pixel(roi.x + lx, roi.y + ly)[0] as f64;

    let Some(hot_mean) = mean(
        hot.enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(|(lx, ly, _)| v_at(lx, ly)),
    ) else {
        return 0.0;
    };

    let rim = dilate(&hot, Norm::LInf, RING_RADIUS);
    let ring_mean = mean(
        rim.enumerate_pixels()
            .filter(|(lx, ly, p)| p[0] != 0 && hot.get_pixel(*lx, *ly)[0] == 0)
            .map(|(lx, ly, _)| v_at(lx, ly)),
    );
    let bg_mean = match ring_mean {
        Some(m) => m,
        None => mean(hot.enumerate_pixels().map(|(lx, ly, _)| v_at(lx, ly))).unwrap_or(0.0),
    };

    let contrast = ((hot_mean - bg_mean) / 255.0).max(0.0);
    let image_area = img_w as f64 * img_h as f64;
    let area_norm = (roi.area() as f64 / (image_area * AREA_SATURATION_FRAC).max(1.0)).min(1.0);
    severity_score(contrast, area_norm)
}

/// Severity of a detected blob: its own mask marks the hot pixels.
pub fn blob_severity(blob: &AnomalyBlob, value: &GrayImage) -> f64 {
    let (w, h) = value.dimensions();
    let roi = blob.bbox.clamped_to(w, h);
    region_severity(value, roi, |x, y| blob.mask.contains(x, y))
}

/// Severity of a bare box (added or edited by a reviewer).
///
/// The box is clamped into the image; pixels at or above the 85th brightness
/// percentile of the box count as hot.
pub fn bbox_severity(value: &GrayImage, bbox: BBox) -> f64 {
    let (w, h) = value.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let roi = bbox.clamped_to(w, h);
    let samples: Vec<f64> = (roi.y..roi.y2())
        .flat_map(|y| (roi.x..roi.x2()).map(move |x| (x, y)))
        .map(|(x, y)| value.get_pixel(x, y)[0] as f64)
        .collect();
    let Some(p) = linear_percentile(&samples, BOX_HOT_PERCENTILE) else {
        return 0.0;
    };
    let thr = p.floor() as u8;
    region_severity(value, roi, |x, y| value.get_pixel(x, y)[0] >= thr)
}
