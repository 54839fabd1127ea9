//! Morphological skeleton of binary region masks.
//!
//! Lantuéjoul's construction with a 3×3 cross: at each step the part of the
//! current image removed by an opening is added to the skeleton, then the
//! image is eroded. The loop ends once the image is empty.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{erode, open};

use crate::mask::{count_nonzero, pad_zeros, RegionMask};

/// Skeleton of a crop-local binary raster, same dimensions as the input.
///
/// The raster is padded by one zero pixel before processing so that regions
/// touching the crop border erode the same way as interior ones.
pub fn skeletonize(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    if count_nonzero(mask) == 0 {
        return GrayImage::new(w, h);
    }

    let mut current = pad_zeros(mask, 1);
    let mut skel = GrayImage::new(w + 2, h + 2);
    // Every erosion strips at least the outer ring, so this bound is never reached
    // for well-formed input.
    let max_iters = w + h + 1;
    for _ in 0..max_iters {
        if count_nonzero(&current) == 0 {
            break;
        }
        let opened = open(&current, Norm::L1, 1);
        for ((s, c), o) in skel
            .iter_mut()
            .zip(current.as_raw())
            .zip(opened.as_raw())
        {
            if *c != 0 && *o == 0 {
                *s = 255;
            }
        }
        current = erode(&current, Norm::L1, 1);
    }

    GrayImage::from_fn(w, h, |x, y| Luma([skel.get_pixel(x + 1, y + 1)[0]]))
}

/// Skeleton of a region mask, sharing its bounding box.
pub fn skeletonize_region(mask: &RegionMask) -> RegionMask {
    let skel = skeletonize(mask.pixels());
    let bbox = mask.bbox();
    RegionMask::from_fn(bbox, |x, y| skel.get_pixel(x - bbox.x, y - bbox.y)[0] != 0)
}
