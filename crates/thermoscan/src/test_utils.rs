//! Synthetic thermal scenes and feature fixtures shared by unit tests.

use image::{Rgb, RgbImage};

use crate::bbox::BBox;
use crate::features::FeatureVector;

/// Cool palette background (HSV value 80, below every hot band).
pub(crate) const BACKGROUND: Rgb<u8> = Rgb([20, 20, 80]);
/// Saturated red-hot pixel, hue ≈ 5.
pub(crate) const RED_HOT: Rgb<u8> = Rgb([255, 40, 0]);
/// Saturated yellow-hot pixel, hue ≈ 24.
pub(crate) const YELLOW_HOT: Rgb<u8> = Rgb([255, 200, 0]);

pub(crate) fn thermal_scene(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, BACKGROUND)
}

/// Fill `bbox` (clipped to the image) with `color`.
pub(crate) fn paint_rect(img: &mut RgbImage, bbox: BBox, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for y in bbox.y..bbox.y2().min(h) {
        for x in bbox.x..bbox.x2().min(w) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Fill the disk of `radius` around `center` with `color`.
pub(crate) fn paint_disk(img: &mut RgbImage, center: [f32; 2], radius: f32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            if dx * dx + dy * dy <= radius * radius {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// A long thin red conductor on a 640×480 image.
///
/// Casts seven wire votes and one joint vote (small area) under default
/// thresholds.
pub(crate) fn wire_features(coverage: f64) -> FeatureVector {
    FeatureVector {
        aspect_ratio: 10.0,
        length: 320.0,
        extent: 0.1,
        circularity: 0.1,
        eccentricity: Some(10.0),
        skeleton_len: 320,
        skeleton_norm: 0.95,
        thickness: 4.0,
        red_ratio: 0.9,
        skeleton_coverage: Some(coverage),
        hot_patch_frac: 0.2,
        hotspot: [300, 240],
        area_px: 1280,
        image_size: [640, 480],
    }
}

/// A compact hot terminal on a 640×480 image.
///
/// Casts five joint votes and no wire votes under default thresholds.
pub(crate) fn joint_features(red_ratio: f64) -> FeatureVector {
    FeatureVector {
        aspect_ratio: 1.2,
        length: 30.0,
        extent: 0.6,
        circularity: 0.7,
        eccentricity: Some(1.1),
        skeleton_len: 35,
        skeleton_norm: 0.3,
        thickness: 20.0,
        red_ratio,
        skeleton_coverage: Some(0.9),
        hot_patch_frac: 0.9,
        hotspot: [100, 100],
        area_px: 700,
        image_size: [640, 480],
    }
}
