//! thermoscan: anomaly detection in false-colour thermal images of
//! electrical equipment.
//!
//! The pipeline stages are:
//!
//! 1. **Segment** – HSV banding into red-hot and yellow-hot masks, morphology
//!    cleanup, external contours filtered by area.
//! 2. **Merge** – transitive union of candidates that overlap or sit within a
//!    small gap.
//! 3. **Features** – shape, skeleton and colour descriptors per merged blob.
//! 4. **Classify** – wire/joint vote with a margin, then colour and skeleton
//!    coverage refine into one of five fault categories.
//! 5. **Recalibrate** – reviewer edits are replayed and thresholds move to
//!    per-label feature quantiles.
//!
//! # Public API
//! - [`Inspector`] as the primary entry point
//! - [`DetectConfig`] for segmentation and merge tuning
//! - [`ThresholdSet`] and [`ThresholdStore`] for the versioned classifier
//!   thresholds
//! - the JSON record types in [`records`]

mod api;
pub mod bbox;
pub mod classify;
mod error;
pub mod features;
pub mod mask;
pub mod merge;
pub mod pipeline;
pub mod recalibrate;
pub mod records;
pub mod segment;
pub mod severity;
pub mod skeleton;
pub mod stats;
pub mod thresholds;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{load_image, FeedbackOutcome, Inspector};
pub use bbox::BBox;
pub use classify::{Classification, DecisionColor, FaultCategory, Lean};
pub use error::{Error, Result, ValidationError};
pub use features::FeatureVector;
pub use merge::{AnomalyBlob, MergeConfig};
pub use pipeline::{detect_anomalies, DetectConfig};
pub use recalibrate::Recalibration;
pub use records::{
    parse_detections, parse_edits, AnomalyRecord, Detection, DetectionReport, DetectionStatus,
    FeedbackEdit,
};
pub use segment::{HsvBand, SegmentConfig};
pub use thresholds::{JsonFileStorage, ThresholdSet, ThresholdSnapshot, ThresholdStorage, ThresholdStore};
