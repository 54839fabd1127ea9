//! Binary masks cropped to their bounding box.

use image::{GrayImage, Luma};

use crate::bbox::BBox;

const ON: Luma<u8> = Luma([255]);

/// Binary raster covering `bbox` of the source image.
///
/// Pixels are stored in crop-local coordinates; accessors take image
/// coordinates. Non-zero means set.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    bbox: BBox,
    pixels: GrayImage,
}

impl RegionMask {
    /// Empty mask covering `bbox`.
    pub fn empty(bbox: BBox) -> Self {
        Self {
            bbox,
            pixels: GrayImage::new(bbox.w, bbox.h),
        }
    }

    /// Mask covering `bbox` where `f(x, y)` (image coordinates) decides each pixel.
    pub fn from_fn(bbox: BBox, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let pixels = GrayImage::from_fn(bbox.w, bbox.h, |lx, ly| {
            if f(bbox.x + lx, bbox.y + ly) {
                ON
            } else {
                Luma([0])
            }
        });
        Self { bbox, pixels }
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    /// Crop-local raster.
    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    /// Whether image pixel `(x, y)` is set.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.bbox.contains(x, y) && self.pixels.get_pixel(x - self.bbox.x, y - self.bbox.y)[0] != 0
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if self.bbox.contains(x, y) {
            self.pixels.put_pixel(x - self.bbox.x, y - self.bbox.y, ON);
        }
    }

    /// Number of set pixels.
    pub fn count(&self) -> u32 {
        count_nonzero(&self.pixels)
    }

    /// Image coordinates of every set pixel, in raster order.
    pub fn iter_set(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let (ox, oy) = (self.bbox.x, self.bbox.y);
        self.pixels
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0)
            .map(move |(x, y, _)| (ox + x, oy + y))
    }

    /// Bitwise union; the result covers the union of both boxes.
    pub fn union(&self, other: &RegionMask) -> RegionMask {
        let mut out = RegionMask::empty(self.bbox.union(&other.bbox));
        for (x, y) in self.iter_set().chain(other.iter_set()) {
            out.set(x, y);
        }
        out
    }

    /// Crop-local raster surrounded by `pad` zero pixels on every side.
    pub fn padded(&self, pad: u32) -> GrayImage {
        pad_zeros(&self.pixels, pad)
    }
}

pub(crate) fn count_nonzero(img: &GrayImage) -> u32 {
    img.as_raw().iter().filter(|&&v| v != 0).count() as u32
}

pub(crate) fn pad_zeros(img: &GrayImage, pad: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w + 2 * pad, h + 2 * pad);
    for (x, y, p) in img.enumerate_pixels() {
        if p[0] != 0 {
            out.put_pixel(x + pad, y + pad, ON);
        }
    }
    out
}
