//! JSON records exchanged with reviewers and callers.

use crate::bbox::BBox;
use crate::classify::FaultCategory;
use crate::error::{Result, ValidationError};

/// Review state of a detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    #[default]
    Kept,
    Deleted,
}

/// A detection as shown to a reviewer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    /// Fault label, usually a [`FaultCategory`] label but free text is accepted.
    pub label: String,
    #[serde(default)]
    pub severity: f64,
    #[serde(default)]
    pub status: DetectionStatus,
}

impl Detection {
    pub fn is_kept(&self) -> bool {
        self.status == DetectionStatus::Kept
    }

    /// Wire-like labels mention an overload.
    pub fn is_wire_like(&self) -> bool {
        self.label.contains("Overload")
    }

    pub fn is_faulty(&self) -> bool {
        self.label.contains("Faulty")
    }
}

/// One reviewer correction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawFeedbackEdit", into = "RawFeedbackEdit")]
pub enum FeedbackEdit {
    /// A detection the engine missed.
    Added { bbox: BBox, label: String },
    /// A detection moved and/or relabelled; `old_bbox` identifies it.
    /// Without a label the previous one is kept.
    Edited {
        old_bbox: BBox,
        bbox: BBox,
        label: Option<String>,
    },
    /// A false detection.
    Deleted { bbox: BBox },
}

impl FeedbackEdit {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedbackEdit::Added { .. } => "added",
            FeedbackEdit::Edited { .. } => "edited",
            FeedbackEdit::Deleted { .. } => "deleted",
        }
    }
}

/// Wire form: `{bbox, label?, status, old_bbox?}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RawFeedbackEdit {
    bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_bbox: Option<BBox>,
}

impl TryFrom<RawFeedbackEdit> for FeedbackEdit {
    type Error = ValidationError;

    fn try_from(raw: RawFeedbackEdit) -> std::result::Result<Self, Self::Error> {
        match raw.status.as_str() {
            "added" => {
                let label = raw
                    .label
                    .ok_or_else(|| ValidationError::new("added edit requires a label"))?;
                Ok(FeedbackEdit::Added {
                    bbox: raw.bbox,
                    label,
                })
            }
            "edited" => {
                let old_bbox = raw
                    .old_bbox
                    .ok_or_else(|| ValidationError::new("edited edit requires old_bbox"))?;
                Ok(FeedbackEdit::Edited {
                    old_bbox,
                    bbox: raw.bbox,
                    label: raw.label,
                })
            }
            "deleted" => {
                if raw.old_bbox.is_some() {
                    return Err(ValidationError::new("old_bbox is only valid for edited edits"));
                }
                Ok(FeedbackEdit::Deleted { bbox: raw.bbox })
            }
            other => Err(ValidationError::new(format!(
                "unknown edit status {other:?}, expected added, edited or deleted"
            ))),
        }
    }
}

impl From<FeedbackEdit> for RawFeedbackEdit {
    fn from(edit: FeedbackEdit) -> Self {
        let status = edit.kind().to_string();
        match edit {
            FeedbackEdit::Added { bbox, label } => Self {
                bbox,
                label: Some(label),
                status,
                old_bbox: None,
            },
            FeedbackEdit::Edited {
                old_bbox,
                bbox,
                label,
            } => Self {
                bbox,
                label,
                status,
                old_bbox: Some(old_bbox),
            },
            FeedbackEdit::Deleted { bbox } => Self {
                bbox,
                label: None,
                status,
                old_bbox: None,
            },
        }
    }
}

/// One flagged region in a detection report.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnomalyRecord {
    pub bbox: BBox,
    pub centroid: [u32; 2],
    pub area_px: u32,
    pub severity: f64,
    pub fault_type: FaultCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotspot_xy: Option<[u32; 2]>,
}

impl AnomalyRecord {
    /// Reviewer-facing form of this record.
    pub fn to_detection(&self) -> Detection {
        Detection {
            bbox: self.bbox,
            label: self.fault_type.label().to_string(),
            severity: self.severity,
            status: DetectionStatus::Kept,
        }
    }
}

/// Everything detected in one image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionReport {
    pub anomalies: Vec<AnomalyRecord>,
    /// `[width, height]`.
    pub image_size: [u32; 2],
    /// Threshold snapshot version used for classification.
    pub thresholds_version: u64,
}

impl DetectionReport {
    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn detections(&self) -> Vec<Detection> {
        self.anomalies.iter().map(AnomalyRecord::to_detection).collect()
    }
}

fn validation(e: serde_json::Error) -> crate::error::Error {
    ValidationError::new(e.to_string()).into()
}

/// Parse a JSON array of detections.
pub fn parse_detections(json: &str) -> Result<Vec<Detection>> {
    serde_json::from_str(json).map_err(validation)
}

/// Parse a JSON array of feedback edits.
pub fn parse_edits(json: &str) -> Result<Vec<FeedbackEdit>> {
    serde_json::from_str(json).map_err(validation)
}
