//! Contour and region geometry helpers.

use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use nalgebra::{Matrix2, SymmetricEigen, Vector2};

use crate::bbox::BBox;
use crate::mask::RegionMask;

/// Eccentricity reported when the minor principal variance vanishes.
pub const DEGENERATE_ECCENTRICITY: f64 = 1e6;

const MIN_EIGENVALUE: f64 = 1e-6;

/// Pixel bounding box of a point set.
pub fn points_bbox(points: &[Point<i32>]) -> Option<BBox> {
    let first = points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    if x0 < 0 || y0 < 0 {
        return None;
    }
    Some(BBox::new(
        x0 as u32,
        y0 as u32,
        (x1 - x0 + 1) as u32,
        (y1 - y0 + 1) as u32,
    ))
}

/// Side lengths `(width, height)` of the minimum-area enclosing rectangle.
///
/// Rotating calipers over the convex hull: one rectangle side is flush with
/// each hull edge in turn. Point sets whose hull has fewer than two distinct
/// points yield `(0, 0)`; `None` for an empty set.
pub fn min_area_rect_sides(points: &[Point<i32>]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let hull: Vec<Vector2<f64>> = convex_hull(points)
        .iter()
        .map(|p| Vector2::new(p.x as f64, p.y as f64))
        .collect();
    if hull.len() < 2 {
        return Some((0.0, 0.0));
    }

    let mut best: Option<(f64, f64, f64)> = None;
    for i in 0..hull.len() {
        let edge = hull[(i + 1) % hull.len()] - hull[i];
        let len = edge.norm();
        if len < 1e-12 {
            continue;
        }
        let u = edge / len;
        let n = Vector2::new(-u.y, u.x);
        let (mut u_min, mut u_max, mut n_min, mut n_max) =
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let pu = p.dot(&u);
            let pn = p.dot(&n);
            u_min = u_min.min(pu);
            u_max = u_max.max(pu);
            n_min = n_min.min(pn);
            n_max = n_max.max(pn);
        }
        let (w, h) = (u_max - u_min, n_max - n_min);
        if best.map_or(true, |(area, _, _)| w * h < area) {
            best = Some((w * h, w, h));
        }
    }
    Some(best.map_or((0.0, 0.0), |(_, w, h)| (w, h)))
}

/// Principal-axis ratio `sqrt(λ_max / λ_min)` of the set pixels' covariance.
///
/// `None` for an empty mask; [`DEGENERATE_ECCENTRICITY`] when the minor
/// variance is (near) zero, e.g. a one-pixel-thick straight line.
pub fn pixel_eccentricity(mask: &RegionMask) -> Option<f64> {
    let mut n = 0.0;
    let (mut sx, mut sy) = (0.0, 0.0);
    for (x, y) in mask.iter_set() {
        n += 1.0;
        sx += x as f64;
        sy += y as f64;
    }
    if n == 0.0 {
        return None;
    }
    let (mx, my) = (sx / n, sy / n);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in mask.iter_set() {
        let dx = x as f64 - mx;
        let dy = y as f64 - my;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let cov = Matrix2::new(sxx / n, sxy / n, sxy / n, syy / n);
    let eig = SymmetricEigen::new(cov).eigenvalues;
    let l_max = eig[0].max(eig[1]);
    let l_min = eig[0].min(eig[1]);
    if l_min <= MIN_EIGENVALUE {
        return Some(DEGENERATE_ECCENTRICITY);
    }
    Some((l_max / l_min).sqrt())
}
