//! High-level inspection API.
//!
//! [`Inspector`] is the primary entry point. It owns a [`DetectConfig`] and a
//! [`ThresholdStore`]; detection reads one threshold snapshot per call and
//! feedback publishes a new one.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;

use crate::classify::Classification;
use crate::error::{Error, Result};
use crate::pipeline::{self, DetectConfig};
use crate::recalibrate::{self, FeedbackRun, Recalibration, ReplayOutcome};
use crate::records::{Detection, DetectionReport, FeedbackEdit};
use crate::segment::hot_masks;
use crate::thresholds::{ThresholdSnapshot, ThresholdStore};

/// Load an image file as RGB.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path)
        .map_err(|source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::EmptyImage {
            path: path.to_path_buf(),
        });
    }
    Ok(image)
}

/// What one feedback submission did.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeedbackOutcome {
    pub replay: ReplayOutcome,
    /// `None` when no edit applied.
    pub recalibration: Option<Recalibration>,
    /// Threshold version in effect after the submission.
    pub thresholds_version: u64,
}

/// Primary inspection interface.
///
/// Create once, inspect many images. Safe to share between threads.
///
/// # Examples
///
/// ```no_run
/// use thermoscan::Inspector;
/// use image::RgbImage;
///
/// let inspector = Inspector::default();
/// let image = RgbImage::new(640, 480);
/// let report = inspector.detect(&image);
/// println!("Found {} anomalies", report.anomalies.len());
/// ```
#[derive(Debug, Default)]
pub struct Inspector {
    config: DetectConfig,
    store: ThresholdStore,
}

impl Inspector {
    pub fn new(config: DetectConfig, store: ThresholdStore) -> Self {
        Self { config, store }
    }

    /// Default thresholds kept in memory only.
    pub fn with_config(config: DetectConfig) -> Self {
        Self::new(config, ThresholdStore::default())
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut DetectConfig {
        &mut self.config
    }

    /// Threshold snapshot currently in effect.
    pub fn thresholds(&self) -> Arc<ThresholdSnapshot> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &ThresholdStore {
        &self.store
    }

    /// Detect and classify anomalies in an RGB thermal image.
    pub fn detect(&self, image: &RgbImage) -> DetectionReport {
        let snapshot = self.store.snapshot();
        pipeline::detect_anomalies(image, &self.config, &snapshot)
    }

    /// Load `path` and detect.
    pub fn detect_file(&self, path: &Path) -> Result<DetectionReport> {
        tracing::info!("Loading image: {}", path.display());
        Ok(self.detect(&load_image(path)?))
    }

    /// Apply reviewer edits to the detections shown for `image` and
    /// recalibrate.
    ///
    /// When at least one edit applied, the recalibrated set is persisted and
    /// published as a new version. Concurrent submissions are serialized.
    pub fn submit_feedback(
        &self,
        image: &RgbImage,
        detections: &[Detection],
        edits: &[FeedbackEdit],
    ) -> Result<FeedbackOutcome> {
        let mut run = FeedbackRun::default();
        let snapshot = self.store.update(|current| {
            run = recalibrate::recalibrate(
                image,
                &self.config.segment,
                &current.thresholds,
                detections,
                edits,
            );
            Ok(run.recalibration.as_ref().map(|r| r.thresholds.clone()))
        })?;
        Ok(FeedbackOutcome {
            replay: run.replay,
            recalibration: run.recalibration,
            thresholds_version: snapshot.version,
        })
    }

    /// Classify each kept detection's box as the engine would, without
    /// touching the thresholds.
    pub fn suggest_labels(
        &self,
        image: &RgbImage,
        detections: &[Detection],
    ) -> Vec<(Detection, Classification)> {
        let snapshot = self.store.snapshot();
        let masks = hot_masks(image, &self.config.segment);
        detections
            .iter()
            .filter(|d| d.is_kept())
            .map(|d| {
                let c = pipeline::suggest_label(&masks, d.bbox, d.severity, &snapshot.thresholds);
                (d.clone(), c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::classify::FaultCategory;
    use crate::test_utils::{paint_disk, paint_rect, thermal_scene, RED_HOT, YELLOW_HOT};
    use crate::thresholds::ThresholdSet;

    fn inspector() -> Inspector {
        let mut config = DetectConfig::default();
        config.segment.ignore_right_ratio = 0.0;
        Inspector::with_config(config)
    }

    #[test]
    fn detect_on_blank_image() {
        let report = inspector().detect(&RgbImage::new(200, 200));
        assert!(report.is_empty());
        assert_eq!(report.thresholds_version, 0);
    }

    #[test]
    fn config_mut() {
        let mut i = inspector();
        i.config_mut().merge.min_gap_px = 20;
        assert_eq!(i.config().merge.min_gap_px, 20);
    }

    #[test]
    fn feedback_bumps_version_only_when_applied() {
        let i = inspector();
        let mut img = thermal_scene(320, 240);
        paint_disk(&mut img, [100.0, 100.0], 12.0, YELLOW_HOT);
        let dets = i.detect(&img).detections();
        assert_eq!(dets.len(), 1);

        let missed = FeedbackEdit::Deleted {
            bbox: BBox::new(0, 0, 3, 3),
        };
        let out = i.submit_feedback(&img, &dets, &[missed]).unwrap();
        assert!(out.recalibration.is_none());
        assert_eq!(out.thresholds_version, 0);

        let relabel = FeedbackEdit::Edited {
            old_bbox: dets[0].bbox,
            bbox: dets[0].bbox,
            label: Some(FaultCategory::LooseJointFaulty.label().into()),
        };
        let out = i.submit_feedback(&img, &dets, &[relabel]).unwrap();
        assert_eq!(out.replay.applied, 1);
        assert!(out.recalibration.is_some());
        assert_eq!(out.thresholds_version, 1);
        assert_eq!(i.thresholds().version, 1);
        assert!(i.thresholds().thresholds.is_within_bounds());
    }

    #[test]
    fn suggestions_follow_hot_pixels() {
        let i = inspector();
        let mut img = thermal_scene(320, 240);
        paint_rect(&mut img, BBox::new(40, 40, 24, 24), RED_HOT);
        let dets = vec![
            Detection {
                bbox: BBox::new(36, 36, 32, 32),
                label: "Point Overload (Potential)".into(),
                severity: 0.4,
                status: Default::default(),
            },
            Detection {
                bbox: BBox::new(200, 150, 20, 20),
                label: "Loose Joint (Faulty)".into(),
                severity: 0.1,
                status: crate::records::DetectionStatus::Deleted,
            },
        ];
        let out = i.suggest_labels(&img, &dets);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.category, FaultCategory::LooseJointFaulty);
        assert_eq!(i.thresholds().thresholds, ThresholdSet::default());
    }

    #[test]
    fn missing_image_is_a_load_error() {
        let err = load_image(Path::new("/nonexistent/thermal.png")).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
