//! Hot-region segmentation.
//!
//! Pixels are classified by HSV band membership into red-hot and yellow-hot
//! masks, the legend strip at the right edge is blanked, and the combined mask
//! is cleaned with open → close → dilate before external contours are
//! extracted as blob candidates.

pub mod hsv;

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::contour_area;
use imageproc::morphology::{close, dilate, open};
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::bbox::BBox;
use crate::features::shape::points_bbox;
use crate::mask::{pad_zeros, RegionMask};

const ON: Luma<u8> = Luma([255]);

/// Inclusive HSV range on the 8-bit OpenCV scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HsvBand {
    /// Hue range, `[0, 180)`.
    pub hue: [u8; 2],
    pub saturation: [u8; 2],
    pub value: [u8; 2],
}

impl HsvBand {
    pub fn contains(&self, [h, s, v]: [u8; 3]) -> bool {
        (self.hue[0]..=self.hue[1]).contains(&h)
            && (self.saturation[0]..=self.saturation[1]).contains(&s)
            && (self.value[0]..=self.value[1]).contains(&v)
    }
}

/// Segmentation parameters. None of these are touched by recalibration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Band treated as red-hot.
    pub red_band: HsvBand,
    /// Band treated as yellow/orange-hot.
    pub yellow_band: HsvBand,
    /// Right-hand fraction of the image (legend / scale bar) excluded from all masks.
    pub ignore_right_ratio: f32,
    /// Minimum contour polygon area for a candidate (pixels²).
    pub min_area_px: f64,
    /// Opening radius (square structuring element, `2r + 1` wide).
    pub open_radius: u8,
    /// Closing radius.
    pub close_radius: u8,
    /// Final dilation radius applied before contour extraction.
    pub grow_radius: u8,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            red_band: HsvBand {
                hue: [0, 20],
                saturation: [60, 255],
                value: [180, 255],
            },
            yellow_band: HsvBand {
                hue: [20, 40],
                saturation: [60, 255],
                value: [180, 255],
            },
            ignore_right_ratio: 0.10,
            min_area_px: 60.0,
            open_radius: 1,
            close_radius: 2,
            grow_radius: 1,
        }
    }
}

/// Per-image hot masks plus the brightness plane they were derived from.
#[derive(Debug, Clone)]
pub struct HotMasks {
    pub red: GrayImage,
    pub yellow: GrayImage,
    /// `red ∪ yellow`.
    pub hot: GrayImage,
    /// HSV value channel of the full image (legend included).
    pub value: GrayImage,
}

impl HotMasks {
    pub fn dimensions(&self) -> (u32, u32) {
        self.hot.dimensions()
    }

    pub fn is_hot(&self, x: u32, y: u32) -> bool {
        self.hot.get_pixel(x, y)[0] != 0
    }

    pub fn is_red(&self, x: u32, y: u32) -> bool {
        self.red.get_pixel(x, y)[0] != 0
    }

    pub fn is_yellow(&self, x: u32, y: u32) -> bool {
        self.yellow.get_pixel(x, y)[0] != 0
    }
}

/// A raw connected component of the cleaned hot mask.
#[derive(Debug, Clone)]
pub struct BlobCandidate {
    pub bbox: BBox,
    /// Polygon area enclosed by the outer contour.
    pub area: f64,
    /// Filled interior of the outer contour.
    pub mask: RegionMask,
    /// Outer contour in image coordinates.
    pub contour: Vec<Point<i32>>,
}

/// Output of [`segment`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub masks: HotMasks,
    pub candidates: Vec<BlobCandidate>,
}

/// Build the red, yellow and combined hot masks with the legend strip blanked.
pub fn hot_masks(image: &RgbImage, config: &SegmentConfig) -> HotMasks {
    let (w, h) = image.dimensions();
    let mut red = GrayImage::new(w, h);
    let mut yellow = GrayImage::new(w, h);
    let mut hot = GrayImage::new(w, h);
    let mut value = GrayImage::new(w, h);

    for (x, y, px) in image.enumerate_pixels() {
        let hsv = hsv::rgb_to_hsv(*px);
        value.put_pixel(x, y, Luma([hsv[2]]));
        let is_red = config.red_band.contains(hsv);
        let is_yellow = config.yellow_band.contains(hsv);
        if is_red {
            red.put_pixel(x, y, ON);
        }
        if is_yellow {
            yellow.put_pixel(x, y, ON);
        }
        if is_red || is_yellow {
            hot.put_pixel(x, y, ON);
        }
    }

    if let Some(cut) = legend_cut(w, config.ignore_right_ratio) {
        for m in [&mut red, &mut yellow, &mut hot] {
            for y in 0..h {
                for x in cut..w {
                    m.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }

    HotMasks {
        red,
        yellow,
        hot,
        value,
    }
}

/// First excluded column for the legend strip, if any.
fn legend_cut(width: u32, ratio: f32) -> Option<u32> {
    if ratio.is_nan() || ratio <= 0.0 {
        return None;
    }
    let cut = (width as f64 * (1.0 - ratio.min(1.0) as f64)) as u32;
    (cut < width).then_some(cut)
}

/// Clean the combined hot mask: open to drop speckle, close to bridge gaps,
/// then grow slightly.
pub fn clean_mask(hot: &GrayImage, config: &SegmentConfig) -> GrayImage {
    let opened = open(hot, Norm::LInf, config.open_radius);
    let closed = close(&opened, Norm::LInf, config.close_radius);
    dilate(&closed, Norm::LInf, config.grow_radius)
}

/// Extract external contours of `mask` as candidates, dropping those whose
/// polygon area is below `min_area_px`.
///
/// Contours are traced on a copy padded with one zero pixel so that regions
/// touching the left edge still get an outer border.
pub fn extract_candidates(mask: &GrayImage, min_area_px: f64) -> Vec<BlobCandidate> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    find_contours::<i32>(&pad_zeros(mask, 1))
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let points: Vec<Point<i32>> =
                c.points.iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect();
            let area = contour_area(&points);
            if area < min_area_px {
                return None;
            }
            let bbox = points_bbox(&points)?;
            let first = points[0];
            let label = labels.get_pixel(first.x as u32, first.y as u32)[0];
            Some(BlobCandidate {
                bbox,
                area,
                mask: fill_component(&labels, label, bbox),
                contour: points,
            })
        })
        .collect()
}

/// Pixels of component `label` inside `bbox` plus every hole it encloses.
///
/// Background reachable from the box border (4-connected, since the
/// foreground is 8-connected) stays unset; everything else is filled.
fn fill_component(labels: &ImageBuffer<Luma<u32>, Vec<u32>>, label: u32, bbox: BBox) -> RegionMask {
    let (w, h) = (bbox.w as usize, bbox.h as usize);
    let is_member = |lx: usize, ly: usize| {
        labels.get_pixel(bbox.x + lx as u32, bbox.y + ly as u32)[0] == label
    };

    let mut outside = vec![false; w * h];
    let mut stack = Vec::new();
    let seed = |lx: usize, ly: usize, outside: &mut [bool], stack: &mut Vec<(usize, usize)>| {
        let idx = ly * w + lx;
        if !outside[idx] && !is_member(lx, ly) {
            outside[idx] = true;
            stack.push((lx, ly));
        }
    };

    for lx in 0..w {
        seed(lx, 0, &mut outside, &mut stack);
        seed(lx, h - 1, &mut outside, &mut stack);
    }
    for ly in 0..h {
        seed(0, ly, &mut outside, &mut stack);
        seed(w - 1, ly, &mut outside, &mut stack);
    }
    while let Some((lx, ly)) = stack.pop() {
        if lx > 0 {
            seed(lx - 1, ly, &mut outside, &mut stack);
        }
        if lx + 1 < w {
            seed(lx + 1, ly, &mut outside, &mut stack);
        }
        if ly > 0 {
            seed(lx, ly - 1, &mut outside, &mut stack);
        }
        if ly + 1 < h {
            seed(lx, ly + 1, &mut outside, &mut stack);
        }
    }

    RegionMask::from_fn(bbox, |x, y| {
        !outside[(y - bbox.y) as usize * w + (x - bbox.x) as usize]
    })
}

/// Full segmentation stage: hot masks, cleanup, candidate extraction.
pub fn segment(image: &RgbImage, config: &SegmentConfig) -> Segmentation {
    let masks = hot_masks(image, config);
    let cleaned = clean_mask(&masks.hot, config);
    let candidates = extract_candidates(&cleaned, config.min_area_px);
    tracing::debug!(
        "segmentation: {} candidates >= {} px²",
        candidates.len(),
        config.min_area_px
    );
    Segmentation { masks, candidates }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{paint_rect, thermal_scene, RED_HOT, YELLOW_HOT};

    #[test]
    fn bands_split_red_and_yellow() {
        let mut img = thermal_scene(60, 40);
        paint_rect(&mut img, BBox::new(5, 5, 10, 10), RED_HOT);
        paint_rect(&mut img, BBox::new(25, 5, 10, 10), YELLOW_HOT);
        let cfg = SegmentConfig {
            ignore_right_ratio: 0.0,
            ..Default::default()
        };
        let m = hot_masks(&img, &cfg);
        assert!(m.is_red(8, 8) && !m.is_yellow(8, 8));
        assert!(m.is_yellow(28, 8) && !m.is_red(28, 8));
        assert!(m.is_hot(8, 8) && m.is_hot(28, 8));
        assert!(!m.is_hot(50, 30));
        assert_eq!(m.value.get_pixel(8, 8)[0], 255);
    }

    #[test]
    fn legend_strip_is_blanked_in_every_mask() {
        let mut img = thermal_scene(100, 40);
        paint_rect(&mut img, BBox::new(0, 0, 100, 40), RED_HOT);
        let cfg = SegmentConfig {
            ignore_right_ratio: 0.1,
            ..Default::default()
        };
        let m = hot_masks(&img, &cfg);
        assert!(m.is_hot(89, 10));
        for mask in [&m.red, &m.hot] {
            assert_eq!(mask.get_pixel(90, 10)[0], 0);
            assert_eq!(mask.get_pixel(99, 39)[0], 0);
        }
        // Brightness is untouched.
        assert_eq!(m.value.get_pixel(95, 10)[0], 255);
    }

    #[test]
    fn separated_regions_become_separate_candidates() {
        let mut img = thermal_scene(120, 60);
        paint_rect(&mut img, BBox::new(10, 10, 20, 12), RED_HOT);
        paint_rect(&mut img, BBox::new(60, 30, 15, 15), YELLOW_HOT);
        let seg = segment(&img, &SegmentConfig::default());
        assert_eq!(seg.candidates.len(), 2);
        for c in &seg.candidates {
            assert!(c.area >= 60.0);
            assert_eq!(c.mask.bbox(), c.bbox);
        }
    }

    #[test]
    fn speckle_below_min_area_is_dropped() {
        let mut img = thermal_scene(80, 60);
        paint_rect(&mut img, BBox::new(10, 10, 6, 6), RED_HOT);
        let seg = segment(&img, &SegmentConfig::default());
        assert!(seg.candidates.is_empty());
    }

    #[test]
    fn candidate_mask_fills_holes() {
        let mut mask = GrayImage::new(30, 30);
        for y in 5..25 {
            for x in 5..25 {
                let border = !(8..22).contains(&x) || !(8..22).contains(&y);
                if border {
                    mask.put_pixel(x, y, ON);
                }
            }
        }
        let cands = extract_candidates(&mask, 10.0);
        assert_eq!(cands.len(), 1);
        let c = &cands[0];
        assert_eq!(c.bbox, BBox::new(5, 5, 20, 20));
        assert_eq!(c.mask.count(), 400);
        assert!(c.mask.contains(15, 15));
    }

    #[test]
    fn regions_touching_the_image_border_are_kept() {
        let mut mask = GrayImage::new(40, 30);
        for y in 10..16 {
            for x in 0..25 {
                mask.put_pixel(x, y, ON);
            }
        }
        for y in 20..30 {
            for x in 30..40 {
                mask.put_pixel(x, y, ON);
            }
        }
        let mut cands = extract_candidates(&mask, 10.0);
        cands.sort_by_key(|c| c.bbox.x);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].bbox, BBox::new(0, 10, 25, 6));
        assert_eq!(cands[0].mask.count(), 150);
        assert!(cands[0].contour.iter().all(|p| p.x >= 0 && p.y >= 0));
        assert_eq!(cands[1].bbox, BBox::new(30, 20, 10, 10));
        assert_eq!(cands[1].mask.count(), 100);
    }

    #[test]
    fn fully_hot_frame_is_one_candidate() {
        let mut img = thermal_scene(120, 80);
        paint_rect(&mut img, BBox::new(0, 0, 120, 80), RED_HOT);
        let cfg = SegmentConfig {
            ignore_right_ratio: 0.0,
            ..Default::default()
        };
        let seg = segment(&img, &cfg);
        assert_eq!(seg.candidates.len(), 1);
        let c = &seg.candidates[0];
        assert_eq!(c.bbox, BBox::new(0, 0, 120, 80));
        assert_eq!(c.mask.count(), 9600);
        assert!(c.area > 9000.0);
    }

    #[test]
    fn wire_running_out_of_frame_on_the_left_is_detected() {
        let mut img = thermal_scene(400, 60);
        paint_rect(&mut img, BBox::new(0, 20, 300, 6), RED_HOT);
        let cfg = SegmentConfig {
            ignore_right_ratio: 0.0,
            ..Default::default()
        };
        let seg = segment(&img, &cfg);
        assert_eq!(seg.candidates.len(), 1);
        assert_eq!(seg.candidates[0].bbox.x, 0);
    }
}
