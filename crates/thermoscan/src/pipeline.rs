//! Detection pipeline: segment → merge → features → classify.

use std::path::Path;

use image::imageops;
use image::RgbImage;
use imageproc::point::Point;

use crate::bbox::BBox;
use crate::classify::{classify, Classification};
use crate::error::{Error, Result};
use crate::features::{extract_features, FeatureVector};
use crate::mask::RegionMask;
use crate::merge::{merge_candidates, AnomalyBlob, MergeConfig};
use crate::records::{AnomalyRecord, DetectionReport};
use crate::segment::{extract_candidates, segment, HotMasks, SegmentConfig};
use crate::severity::blob_severity;
use crate::thresholds::{ThresholdSet, ThresholdSnapshot};

/// Every detection parameter that recalibration does not touch.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub segment: SegmentConfig,
    pub merge: MergeConfig,
}

impl DetectConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Storage {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A blob together with its descriptors and verdict.
#[derive(Debug, Clone)]
pub struct AnalyzedBlob {
    pub blob: AnomalyBlob,
    /// `None` when the blob holds no hot pixel.
    pub features: Option<FeatureVector>,
    pub classification: Classification,
}

impl AnalyzedBlob {
    pub fn to_record(&self) -> AnomalyRecord {
        AnomalyRecord {
            bbox: self.blob.bbox,
            centroid: self.blob.centroid,
            area_px: self.blob.area_px,
            severity: self.blob.severity,
            fault_type: self.classification.category,
            hotspot_xy: self.classification.hotspot,
        }
    }
}

/// Full per-image analysis, including the intermediate masks.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub masks: HotMasks,
    pub blobs: Vec<AnalyzedBlob>,
}

/// Run every stage on `image` with a fixed threshold set.
pub fn analyze(image: &RgbImage, config: &DetectConfig, thresholds: &ThresholdSet) -> Analysis {
    let (w, h) = image.dimensions();
    let seg = segment(image, &config.segment);
    let masks = seg.masks;
    let merged = merge_candidates(seg.candidates, w, h, &config.merge);

    let blobs = merged
        .into_iter()
        .map(|mut blob| {
            blob.severity = blob_severity(&blob, &masks.value);
            let features = extract_features(&blob, &masks);
            let classification = classify(features.as_ref(), blob.severity, thresholds);
            tracing::debug!(
                "blob {:?}: {} (severity {:.4}, {:?})",
                blob.bbox,
                classification.category,
                blob.severity,
                classification.lean
            );
            AnalyzedBlob {
                blob,
                features,
                classification,
            }
        })
        .collect();

    Analysis { masks, blobs }
}

/// Detect and classify anomalies against one threshold snapshot.
pub fn detect_anomalies(
    image: &RgbImage,
    config: &DetectConfig,
    snapshot: &ThresholdSnapshot,
) -> DetectionReport {
    let (w, h) = image.dimensions();
    let analysis = analyze(image, config, &snapshot.thresholds);
    let anomalies: Vec<AnomalyRecord> = analysis.blobs.iter().map(AnalyzedBlob::to_record).collect();
    tracing::info!(
        "{}x{}: {} anomalies (thresholds v{})",
        w,
        h,
        anomalies.len(),
        snapshot.version
    );
    DetectionReport {
        anomalies,
        image_size: [w, h],
        thresholds_version: snapshot.version,
    }
}

/// Blob made of the hot pixels inside `bbox` (clamped to the image).
///
/// Every external contour of the cropped hot mask is filled; `None` when the
/// box holds no hot pixel.
pub fn bbox_blob(masks: &HotMasks, bbox: BBox) -> Option<AnomalyBlob> {
    let (w, h) = masks.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let roi = bbox.clamped_to(w, h);
    let crop = imageops::crop_imm(&masks.hot, roi.x, roi.y, roi.w, roi.h).to_image();
    let parts = extract_candidates(&crop, 0.0);
    if parts.is_empty() {
        return None;
    }

    let (ox, oy) = (roi.x as i32, roi.y as i32);
    let contours: Vec<Vec<Point<i32>>> = parts
        .iter()
        .map(|c| {
            c.contour
                .iter()
                .map(|p| Point::new(p.x + ox, p.y + oy))
                .collect()
        })
        .collect();
    let mask = RegionMask::from_fn(roi, |x, y| {
        parts
            .iter()
            .any(|c| c.mask.contains(x - roi.x, y - roi.y))
    });
    let area_px = mask.count();
    Some(AnomalyBlob {
        bbox: roi,
        centroid: roi.centroid(),
        mask,
        contours,
        area_px,
        severity: 0.0,
        members: parts.len(),
    })
}

/// Descriptors of the hot pixels inside `bbox`.
pub fn features_for_bbox(masks: &HotMasks, bbox: BBox) -> Option<FeatureVector> {
    bbox_blob(masks, bbox).and_then(|blob| extract_features(&blob, masks))
}

/// Classify a reviewer-drawn box as the engine would.
pub fn suggest_label(
    masks: &HotMasks,
    bbox: BBox,
    severity: f64,
    thresholds: &ThresholdSet,
) -> Classification {
    classify(features_for_bbox(masks, bbox).as_ref(), severity, thresholds)
}
