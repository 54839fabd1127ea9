//! 8-bit HSV conversion on the OpenCV scale.
//!
//! Hue is halved to fit a byte (`H ∈ [0, 180)`), saturation and value span
//! `[0, 255]`.

use image::Rgb;

/// Convert one RGB pixel to `[h, s, v]`.
pub fn rgb_to_hsv(Rgb([r, g, b]): Rgb<u8>) -> [u8; 3] {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = (v - min) as f32;
    if v == 0 || diff == 0.0 {
        return [0, 0, v];
    }

    let s = (255.0 * diff / v as f32).round() as u8;
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let mut h_deg = if v == r {
        60.0 * (gf - bf) / diff
    } else if v == g {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h_deg < 0.0 {
        h_deg += 360.0;
    }
    let mut h = (h_deg / 2.0).round() as u32;
    if h >= 180 {
        h -= 180;
    }
    [h as u8, s, v]
}
