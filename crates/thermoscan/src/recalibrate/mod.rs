//! Threshold recalibration from reviewer feedback.
//!
//! Edits are replayed onto the detections the reviewer saw, the surviving
//! detections are re-measured from the image, and each threshold is moved to a
//! fixed quantile of the matching feature over its bucket (wire-like or
//! joint-like label). Buckets with fewer than three samples leave their
//! thresholds alone.

use image::{GrayImage, RgbImage};

use crate::features::FeatureVector;
use crate::pipeline::features_for_bbox;
use crate::records::{Detection, DetectionStatus, FeedbackEdit};
use crate::segment::{hot_masks, HotMasks, SegmentConfig};
use crate::severity::bbox_severity;
use crate::stats::{hazen_quantile, median};
use crate::thresholds::ThresholdSet;

/// Samples a bucket needs before any of its thresholds move.
pub const MIN_BUCKET_SAMPLES: usize = 3;

/// Detections after the edits were applied.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ReplayOutcome {
    pub detections: Vec<Detection>,
    /// Edits that matched (or, for additions, created) a detection.
    pub applied: usize,
    /// Edits whose box matched nothing.
    pub ignored: usize,
}

/// Apply `edits` in order to a copy of `detections`.
///
/// Matching is exact box equality and affects every matching detection.
/// Edited and added detections get their severity recomputed from `value`.
pub fn replay_edits(
    detections: &[Detection],
    edits: &[FeedbackEdit],
    value: &GrayImage,
) -> ReplayOutcome {
    let mut work = detections.to_vec();
    let (mut applied, mut ignored) = (0, 0);

    for edit in edits {
        let hit = match edit {
            FeedbackEdit::Deleted { bbox } => {
                let mut hit = false;
                for d in work.iter_mut().filter(|d| d.bbox == *bbox) {
                    d.status = DetectionStatus::Deleted;
                    hit = true;
                }
                hit
            }
            FeedbackEdit::Edited {
                old_bbox,
                bbox,
                label,
            } => {
                let mut hit = false;
                for d in work.iter_mut().filter(|d| d.bbox == *old_bbox) {
                    d.bbox = *bbox;
                    if let Some(label) = label {
                        d.label.clone_from(label);
                    }
                    d.severity = bbox_severity(value, *bbox);
                    hit = true;
                }
                hit
            }
            FeedbackEdit::Added { bbox, label } => {
                work.push(Detection {
                    bbox: *bbox,
                    label: label.clone(),
                    severity: bbox_severity(value, *bbox),
                    status: DetectionStatus::Kept,
                });
                true
            }
        };
        if hit {
            applied += 1;
        } else {
            tracing::debug!("{} edit matched no detection: {:?}", edit.kind(), edit);
            ignored += 1;
        }
    }

    ReplayOutcome {
        detections: work,
        applied,
        ignored,
    }
}

/// Measured features of one reviewed detection.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    /// Label mentions an overload.
    pub wire_like: bool,
    /// Label mentions "Faulty".
    pub faulty: bool,
}

/// Re-measure every kept detection; detections without hot pixels are skipped.
pub fn collect_samples(masks: &HotMasks, detections: &[Detection]) -> Vec<LabeledSample> {
    detections
        .iter()
        .filter(|d| d.is_kept())
        .filter_map(|d| {
            let features = features_for_bbox(masks, d.bbox)?;
            Some(LabeledSample {
                features,
                wire_like: d.is_wire_like(),
                faulty: d.is_faulty(),
            })
        })
        .collect()
}

/// Result of one recalibration.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Recalibration {
    /// New, clamped threshold set.
    pub thresholds: ThresholdSet,
    /// Thresholds whose value changed.
    pub updated: Vec<&'static str>,
    pub wire_samples: usize,
    pub joint_samples: usize,
    pub faulty_samples: usize,
    pub potential_samples: usize,
}

/// Quantile of the usable values, or `previous` with fewer than three of them.
fn quantile_or(values: impl IntoIterator<Item = f64>, q: f64, previous: f64) -> f64 {
    let usable: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if usable.len() < MIN_BUCKET_SAMPLES {
        return previous;
    }
    hazen_quantile(&usable, q).unwrap_or(previous)
}

/// Derive a new threshold set from measured samples.
pub fn recalibrate_from_samples(current: &ThresholdSet, samples: &[LabeledSample]) -> Recalibration {
    let wires: Vec<&FeatureVector> = samples
        .iter()
        .filter(|s| s.wire_like)
        .map(|s| &s.features)
        .collect();
    let joints: Vec<&FeatureVector> = samples
        .iter()
        .filter(|s| !s.wire_like)
        .map(|s| &s.features)
        .collect();
    let faulty_red: Vec<f64> = samples
        .iter()
        .filter(|s| s.faulty)
        .map(|s| s.features.red_ratio)
        .collect();
    let potential_red: Vec<f64> = samples
        .iter()
        .filter(|s| !s.faulty)
        .map(|s| s.features.red_ratio)
        .collect();

    let mut next = current.clone();

    if wires.len() >= MIN_BUCKET_SAMPLES {
        let w = &wires;
        next.wire_ar_min = quantile_or(w.iter().map(|f| f.aspect_ratio), 0.25, next.wire_ar_min);
        next.ecc_thr = quantile_or(w.iter().filter_map(|f| f.eccentricity), 0.25, next.ecc_thr);
        next.circularity_thr =
            quantile_or(w.iter().map(|f| f.circularity), 0.75, next.circularity_thr);
        next.wire_extent_max = quantile_or(w.iter().map(|f| f.extent), 0.75, next.wire_extent_max);
        next.wire_sk_norm_min =
            quantile_or(w.iter().map(|f| f.skeleton_norm), 0.25, next.wire_sk_norm_min);
        next.max_wire_thickness_frac = quantile_or(
            w.iter().map(|f| f.thickness_frac()),
            0.50,
            next.max_wire_thickness_frac,
        );
        next.wire_len_frac = quantile_or(w.iter().map(|f| f.length_frac()), 0.25, next.wire_len_frac);
        next.full_wire_cov = quantile_or(
            w.iter().filter_map(|f| f.skeleton_coverage),
            0.60,
            next.full_wire_cov,
        );
        next.point_max_frac =
            quantile_or(w.iter().map(|f| f.hot_patch_frac), 0.35, next.point_max_frac);
    }

    if joints.len() >= MIN_BUCKET_SAMPLES {
        let j = &joints;
        next.joint_extent_min = quantile_or(j.iter().map(|f| f.extent), 0.50, next.joint_extent_min);
        next.joint_circularity_min =
            quantile_or(j.iter().map(|f| f.circularity), 0.50, next.joint_circularity_min);
        next.joint_sk_norm_max =
            quantile_or(j.iter().map(|f| f.skeleton_norm), 0.75, next.joint_sk_norm_max);
        next.joint_area_frac_max =
            quantile_or(j.iter().map(|f| f.area_frac()), 0.75, next.joint_area_frac_max);
        next.joint_thick_len_min = quantile_or(
            j.iter().map(|f| f.thickness_to_length()),
            0.25,
            next.joint_thick_len_min,
        );
    }

    if let (Some(rf), Some(rp)) = (median(&faulty_red), median(&potential_red)) {
        next.red_ratio_faulty = (0.5 * (rf + rp)).clamp(0.20, 0.80);
    }

    let thresholds = next.clamped();
    let updated = thresholds.changed_keys(current);
    Recalibration {
        thresholds,
        updated,
        wire_samples: wires.len(),
        joint_samples: joints.len(),
        faulty_samples: faulty_red.len(),
        potential_samples: potential_red.len(),
    }
}

/// Replay plus recalibration for one reviewed image.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct FeedbackRun {
    pub replay: ReplayOutcome,
    /// `None` when no edit applied; the thresholds then stay as they were.
    pub recalibration: Option<Recalibration>,
}

/// Replay `edits` onto `detections` and recalibrate from the result.
pub fn recalibrate(
    image: &RgbImage,
    segment: &SegmentConfig,
    current: &ThresholdSet,
    detections: &[Detection],
    edits: &[FeedbackEdit],
) -> FeedbackRun {
    let masks = hot_masks(image, segment);
    let replay = replay_edits(detections, edits, &masks.value);
    if replay.applied == 0 {
        tracing::info!("no feedback edit applied, thresholds unchanged");
        return FeedbackRun {
            replay,
            recalibration: None,
        };
    }

    let samples = collect_samples(&masks, &replay.detections);
    let recalibration = recalibrate_from_samples(current, &samples);
    tracing::info!(
        "recalibrated from {} wire / {} joint samples, {} thresholds changed",
        recalibration.wire_samples,
        recalibration.joint_samples,
        recalibration.updated.len()
    );
    FeedbackRun {
        replay,
        recalibration: Some(recalibration),
    }
}
