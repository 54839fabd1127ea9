//! Fixed-point grouping of fragmented hot regions into anomaly blobs.
//!
//! A group starts from one candidate and keeps absorbing any remaining
//! candidate whose box overlaps the group box (IoU) or lies within the gap
//! distance of it. Since the group box only grows, a candidate rejected early
//! in a scan can still join later in the same group. Whole groups are then
//! re-grouped until their number stops shrinking.

use imageproc::point::Point;

use crate::bbox::BBox;
use crate::mask::RegionMask;
use crate::segment::BlobCandidate;

/// Grouping parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Boxes with IoU at or above this merge.
    pub iou_threshold: f64,
    /// Floor for the gap distance, in pixels.
    pub min_gap_px: u32,
    /// Gap distance as a fraction of the larger image dimension.
    pub gap_frac: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.15,
            min_gap_px: 8,
            gap_frac: 0.004,
        }
    }
}

impl MergeConfig {
    /// Gap distance for a `width × height` image:
    /// `max(min_gap_px, ⌊max(width, height) · gap_frac⌋)`.
    pub fn gap_px(&self, width: u32, height: u32) -> u32 {
        let scaled = (width.max(height) as f64 * self.gap_frac.max(0.0)).floor() as u32;
        self.min_gap_px.max(scaled)
    }

    fn joins(&self, group: &BBox, other: &BBox, gap_px: u32) -> bool {
        group.iou(other) >= self.iou_threshold || group.gap(other) <= gap_px
    }
}

/// A merged group of one or more candidates.
#[derive(Debug, Clone)]
pub struct AnomalyBlob {
    /// Minimal box enclosing every member.
    pub bbox: BBox,
    /// Center of `bbox`.
    pub centroid: [u32; 2],
    /// Bitwise union of the member masks.
    pub mask: RegionMask,
    /// Outer contours of the members.
    pub contours: Vec<Vec<Point<i32>>>,
    /// Set pixels in `mask`.
    pub area_px: u32,
    /// Contrast/area severity in `[0, 1]`; filled in by the detection pipeline.
    pub severity: f64,
    /// Number of raw candidates merged into this blob.
    pub members: usize,
}

impl AnomalyBlob {
    /// Every contour point of the blob.
    pub fn contour_points(&self) -> Vec<Point<i32>> {
        self.contours.iter().flatten().copied().collect()
    }
}

struct Group {
    bbox: BBox,
    mask: RegionMask,
    contours: Vec<Vec<Point<i32>>>,
    members: usize,
}

impl Group {
    fn absorb(&mut self, other: Group) {
        self.bbox = self.bbox.union(&other.bbox);
        self.mask = self.mask.union(&other.mask);
        self.contours.extend(other.contours);
        self.members += other.members;
    }
}

impl From<BlobCandidate> for Group {
    fn from(c: BlobCandidate) -> Self {
        Self {
            bbox: c.bbox,
            mask: c.mask,
            contours: vec![c.contour],
            members: 1,
        }
    }
}

impl From<AnomalyBlob> for Group {
    fn from(b: AnomalyBlob) -> Self {
        Self {
            bbox: b.bbox,
            mask: b.mask,
            contours: b.contours,
            members: b.members,
        }
    }
}

impl From<Group> for AnomalyBlob {
    fn from(g: Group) -> Self {
        let area_px = g.mask.count();
        Self {
            bbox: g.bbox,
            centroid: g.bbox.centroid(),
            mask: g.mask,
            contours: g.contours,
            area_px,
            severity: 0.0,
            members: g.members,
        }
    }
}

/// One fixed-point grouping pass in input order.
fn merge_pass(groups: Vec<Group>, config: &MergeConfig, gap_px: u32) -> Vec<Group> {
    let mut slots: Vec<Option<Group>> = groups.into_iter().map(Some).collect();
    let mut out = Vec::new();
    for i in 0..slots.len() {
        let Some(mut acc) = slots[i].take() else {
            continue;
        };
        loop {
            let mut changed = false;
            for j in (i + 1)..slots.len() {
                if slots[j]
                    .as_ref()
                    .is_some_and(|g| config.joins(&acc.bbox, &g.bbox, gap_px))
                {
                    if let Some(g) = slots[j].take() {
                        acc.absorb(g);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        out.push(acc);
    }
    out
}

fn merge_groups(groups: Vec<Group>, config: &MergeConfig, gap_px: u32) -> Vec<AnomalyBlob> {
    let mut groups = merge_pass(groups, config, gap_px);
    loop {
        let before = groups.len();
        groups = merge_pass(groups, config, gap_px);
        if groups.len() >= before {
            break;
        }
    }
    groups.into_iter().map(AnomalyBlob::from).collect()
}

/// Group raw candidates of a `width × height` image into anomaly blobs.
///
/// Every candidate ends up in exactly one blob. Blob severities are left at 0.
pub fn merge_candidates(
    candidates: Vec<BlobCandidate>,
    width: u32,
    height: u32,
    config: &MergeConfig,
) -> Vec<AnomalyBlob> {
    let gap_px = config.gap_px(width, height);
    let n = candidates.len();
    let blobs = merge_groups(
        candidates.into_iter().map(Group::from).collect(),
        config,
        gap_px,
    );
    tracing::debug!("merge: {} candidates -> {} blobs (gap {} px)", n, blobs.len(), gap_px);
    blobs
}

/// Re-group already merged blobs; a no-op on [`merge_candidates`] output.
pub fn merge_blobs(
    blobs: Vec<AnomalyBlob>,
    width: u32,
    height: u32,
    config: &MergeConfig,
) -> Vec<AnomalyBlob> {
    let gap_px = config.gap_px(width, height);
    merge_groups(blobs.into_iter().map(Group::from).collect(), config, gap_px)
}
