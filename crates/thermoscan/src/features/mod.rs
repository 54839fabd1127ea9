//! Per-blob geometric and color descriptors.

pub mod shape;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::geometry::{arc_length, contour_area};
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::mask::{count_nonzero, RegionMask};
use crate::merge::AnomalyBlob;
use crate::segment::HotMasks;
use crate::skeleton::skeletonize_region;

/// Measurements the classifier votes on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureVector {
    /// Long / short side of the minimum-area rectangle.
    pub aspect_ratio: f64,
    /// Long side of the minimum-area rectangle (px).
    pub length: f64,
    /// Contour area over bounding-box area.
    pub extent: f64,
    /// `4πA / P²`; 1 for a disk, near 0 for slivers.
    pub circularity: f64,
    /// Principal-axis ratio of the mask pixels. `None` for an empty mask.
    pub eccentricity: Option<f64>,
    /// Skeleton pixel count.
    pub skeleton_len: u32,
    /// Skeleton length over bounding-box diagonal.
    pub skeleton_norm: f64,
    /// Mask pixels per skeleton pixel.
    pub thickness: f64,
    /// Red-hot share of the hot pixels in the mask.
    pub red_ratio: f64,
    /// Share of the dilated skeleton that is hot. `None` without a skeleton.
    pub skeleton_coverage: Option<f64>,
    /// Largest 8-connected hot patch over mask area.
    pub hot_patch_frac: f64,
    /// Brightest pixel of the largest hot patch, `[x, y]`.
    pub hotspot: [u32; 2],
    /// Mask pixel count.
    pub area_px: u32,
    /// Source image `[width, height]`.
    pub image_size: [u32; 2],
}

impl FeatureVector {
    pub fn image_diagonal(&self) -> f64 {
        (self.image_size[0] as f64).hypot(self.image_size[1] as f64)
    }

    /// Thickness relative to the smaller image dimension.
    pub fn thickness_frac(&self) -> f64 {
        self.thickness / self.image_size[0].min(self.image_size[1]).max(1) as f64
    }

    /// Length relative to the image diagonal.
    pub fn length_frac(&self) -> f64 {
        self.length / self.image_diagonal().max(1.0)
    }

    /// Mask area relative to the image area.
    pub fn area_frac(&self) -> f64 {
        let total = self.image_size[0] as f64 * self.image_size[1] as f64;
        self.area_px as f64 / total.max(1.0)
    }

    pub fn thickness_to_length(&self) -> f64 {
        self.thickness / self.length.max(1.0)
    }
}

/// Compute the descriptors of `blob`.
///
/// Returns `None` when the blob mask covers no hot pixel.
pub fn extract_features(blob: &AnomalyBlob, masks: &HotMasks) -> Option<FeatureVector> {
    let (img_w, img_h) = masks.dimensions();
    let mask = &blob.mask;
    let bbox = blob.bbox;

    let (mut red, mut yellow, mut hot) = (0u32, 0u32, 0u32);
    for (x, y) in mask.iter_set() {
        if x >= img_w || y >= img_h {
            continue;
        }
        red += masks.is_red(x, y) as u32;
        yellow += masks.is_yellow(x, y) as u32;
        hot += masks.is_hot(x, y) as u32;
    }
    if hot == 0 {
        return None;
    }

    let area: f64 = blob.contours.iter().map(|c| contour_area(c)).sum();
    let perimeter = blob
        .contours
        .iter()
        .map(|c| arc_length(c, true))
        .sum::<f64>()
        .max(1.0);

    let (mut rw, mut rh) =
        shape::min_area_rect_sides(&blob.contour_points()).unwrap_or((0.0, 0.0));
    if rw < 1.0 || rh < 1.0 {
        (rw, rh) = (bbox.w as f64, bbox.h as f64);
    }
    let long = rw.max(rh);
    let short = rw.min(rh);

    let area_px = mask.count();
    let skeleton = skeletonize_region(mask);
    let skeleton_len = skeleton.count();

    let (hot_patch_frac, hotspot) = largest_hot_patch(mask, masks, area_px);

    Some(FeatureVector {
        aspect_ratio: (long + 1e-6) / (short + 1e-6),
        length: long,
        extent: area / (bbox.area().max(1) as f64),
        circularity: 4.0 * std::f64::consts::PI * area / (perimeter * perimeter),
        eccentricity: shape::pixel_eccentricity(mask),
        skeleton_len,
        skeleton_norm: skeleton_len as f64 / bbox.diagonal().max(1.0),
        thickness: area_px as f64 / skeleton_len.max(1) as f64,
        red_ratio: red as f64 / (red + yellow).max(1) as f64,
        skeleton_coverage: skeleton_coverage(&skeleton, mask, masks),
        hot_patch_frac,
        hotspot,
        area_px,
        image_size: [img_w, img_h],
    })
}

/// `|dilate(skeleton) ∩ hot ∩ mask| / |dilate(skeleton)|`, 3×3 dilation.
fn skeleton_coverage(skeleton: &RegionMask, mask: &RegionMask, masks: &HotMasks) -> Option<f64> {
    if skeleton.count() == 0 {
        return None;
    }
    let (img_w, img_h) = masks.dimensions();
    let grown = dilate(&skeleton.padded(1), Norm::LInf, 1);
    let denom = count_nonzero(&grown);
    let (ox, oy) = (skeleton.bbox().x as i64 - 1, skeleton.bbox().y as i64 - 1);

    let mut on_hot = 0u32;
    for (lx, ly, p) in grown.enumerate_pixels() {
        if p[0] == 0 {
            continue;
        }
        let (x, y) = (ox + lx as i64, oy + ly as i64);
        if x < 0 || y < 0 || x >= img_w as i64 || y >= img_h as i64 {
            continue;
        }
        let (x, y) = (x as u32, y as u32);
        if mask.contains(x, y) && masks.is_hot(x, y) {
            on_hot += 1;
        }
    }
    Some(on_hot as f64 / denom.max(1) as f64)
}

/// Fraction and brightest pixel of the largest 8-connected hot patch inside `mask`.
fn largest_hot_patch(mask: &RegionMask, masks: &HotMasks, area_px: u32) -> (f64, [u32; 2]) {
    let bbox = mask.bbox();
    let (img_w, img_h) = masks.dimensions();
    let hot_in = GrayImage::from_fn(bbox.w, bbox.h, |lx, ly| {
        let (x, y) = (bbox.x + lx, bbox.y + ly);
        let on = x < img_w && y < img_h && mask.contains(x, y) && masks.is_hot(x, y);
        Luma([if on { 255 } else { 0 }])
    });
    let labels = connected_components(&hot_in, Connectivity::Eight, Luma([0u8]));

    let mut sizes: Vec<u32> = Vec::new();
    for p in labels.pixels() {
        let l = p[0] as usize;
        if l == 0 {
            continue;
        }
        if sizes.len() <= l {
            sizes.resize(l + 1, 0);
        }
        sizes[l] += 1;
    }
    let mut best_label = 0usize;
    let mut best_size = 0u32;
    for (l, &n) in sizes.iter().enumerate() {
        if n > best_size {
            best_label = l;
            best_size = n;
        }
    }

    let mut hotspot = [bbox.x, bbox.y];
    let mut best_v: Option<u8> = None;
    for (lx, ly, p) in labels.enumerate_pixels() {
        let member = if best_label > 0 {
            p[0] as usize == best_label
        } else {
            hot_in.get_pixel(lx, ly)[0] != 0
        };
        if !member {
            continue;
        }
        let (x, y) = (bbox.x + lx, bbox.y + ly);
        let v = masks.value.get_pixel(x, y)[0];
        if best_v.map_or(true, |b| v > b) {
            best_v = Some(v);
            hotspot = [x, y];
        }
    }

    (best_size as f64 / area_px.max(1) as f64, hotspot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::merge::{merge_candidates, MergeConfig};
    use crate::segment::{segment, SegmentConfig};
    use crate::test_utils::{paint_rect, thermal_scene, RED_HOT, YELLOW_HOT};
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    fn blobs_of(img: &RgbImage) -> (Vec<AnomalyBlob>, HotMasks) {
        let cfg = SegmentConfig {
            ignore_right_ratio: 0.0,
            ..Default::default()
        };
        let seg = segment(img, &cfg);
        let (w, h) = img.dimensions();
        let blobs = merge_candidates(seg.candidates, w, h, &MergeConfig::default());
        (blobs, seg.masks)
    }

    #[test]
    fn horizontal_bar_is_elongated_and_thin() {
        let mut img = thermal_scene(400, 200);
        paint_rect(&mut img, BBox::new(50, 100, 240, 6), RED_HOT);
        let (blobs, masks) = blobs_of(&img);
        assert_eq!(blobs.len(), 1);
        let f = extract_features(&blobs[0], &masks).unwrap();

        assert!(f.aspect_ratio > 20.0, "ar {}", f.aspect_ratio);
        assert!(f.length >= 240.0 && f.length <= 244.0, "length {}", f.length);
        assert!(f.circularity < 0.15, "circ {}", f.circularity);
        assert!(f.eccentricity.unwrap() > 20.0);
        assert!(f.skeleton_norm > 0.8, "sk_norm {}", f.skeleton_norm);
        assert!(f.thickness < 12.0, "thickness {}", f.thickness);
        assert_relative_eq!(f.red_ratio, 1.0);
        assert!(f.skeleton_coverage.unwrap() > 0.6);
        assert_eq!(f.image_size, [400, 200]);
    }

    #[test]
    fn square_is_compact() {
        let mut img = thermal_scene(200, 200);
        paint_rect(&mut img, BBox::new(60, 60, 30, 30), YELLOW_HOT);
        let (blobs, masks) = blobs_of(&img);
        let f = extract_features(&blobs[0], &masks).unwrap();

        assert_relative_eq!(f.aspect_ratio, 1.0, epsilon = 1e-3);
        assert!(f.extent > 0.85, "extent {}", f.extent);
        assert!(f.circularity > 0.7, "circ {}", f.circularity);
        assert_relative_eq!(f.eccentricity.unwrap(), 1.0, epsilon = 1e-6);
        assert_eq!(f.red_ratio, 0.0);
        // Thinning a square leaves its diagonals.
        assert!(f.skeleton_len >= 60 && f.skeleton_len <= 70, "sk {}", f.skeleton_len);
        assert!(f.thickness > 14.0, "thickness {}", f.thickness);
    }

    #[test]
    fn hotspot_is_brightest_pixel_of_largest_patch() {
        let mut img = thermal_scene(200, 120);
        paint_rect(&mut img, BBox::new(40, 40, 60, 20), Rgb([230, 30, 0]));
        img.put_pixel(70, 50, RED_HOT);
        let (blobs, masks) = blobs_of(&img);
        let f = extract_features(&blobs[0], &masks).unwrap();
        assert_eq!(f.hotspot, [70, 50]);
        // The blob mask is grown by dilation, so the patch is a bit smaller than it.
        assert!(f.hot_patch_frac > 0.8 && f.hot_patch_frac <= 1.0);
    }

    #[test]
    fn mixed_colors_give_partial_red_ratio() {
        let mut img = thermal_scene(200, 120);
        paint_rect(&mut img, BBox::new(40, 40, 30, 20), RED_HOT);
        paint_rect(&mut img, BBox::new(70, 40, 30, 20), YELLOW_HOT);
        let (blobs, masks) = blobs_of(&img);
        assert_eq!(blobs.len(), 1);
        let f = extract_features(&blobs[0], &masks).unwrap();
        assert_relative_eq!(f.red_ratio, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn blob_without_hot_pixels_has_no_features() {
        let img = thermal_scene(100, 100);
        let masks = crate::segment::hot_masks(&img, &SegmentConfig::default());
        let bbox = BBox::new(10, 10, 20, 20);
        let blob = AnomalyBlob {
            bbox,
            centroid: bbox.centroid(),
            mask: RegionMask::from_fn(bbox, |_, _| true),
            contours: vec![],
            area_px: 400,
            severity: 0.0,
            members: 1,
        };
        assert!(extract_features(&blob, &masks).is_none());
    }

    #[test]
    fn derived_ratios() {
        let f = FeatureVector {
            aspect_ratio: 1.0,
            length: 50.0,
            extent: 0.5,
            circularity: 0.5,
            eccentricity: Some(1.0),
            skeleton_len: 10,
            skeleton_norm: 0.5,
            thickness: 10.0,
            red_ratio: 0.5,
            skeleton_coverage: None,
            hot_patch_frac: 0.5,
            hotspot: [0, 0],
            area_px: 300,
            image_size: [300, 400],
        };
        assert_relative_eq!(f.image_diagonal(), 500.0);
        assert_relative_eq!(f.thickness_frac(), 10.0 / 300.0);
        assert_relative_eq!(f.length_frac(), 0.1);
        assert_relative_eq!(f.area_frac(), 300.0 / 120_000.0);
        assert_relative_eq!(f.thickness_to_length(), 0.2);
    }
}
