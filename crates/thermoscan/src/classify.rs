//! Vote-based wire/joint decision and fault sub-typing.
//!
//! Seven predicates vote for "wire" (an elongated conductor), five for
//! "joint" (compact hardware). A family wins when its votes exceed the other's
//! by `vote_margin`; otherwise a fixed tie-break decides. Within the wire
//! family, skeleton hot-coverage separates a full wire overload from a point
//! overload; everywhere else the red ratio decides faulty vs potential.

use std::fmt;

use crate::features::FeatureVector;
use crate::thresholds::ThresholdSet;

/// Max extent accepted by the eccentricity branch of the tie-break.
const TIE_BREAK_EXTENT_MAX: f64 = 0.45;
/// Min skeleton-normalized length for a tie-break wire call.
const TIE_BREAK_SK_NORM_MIN: f64 = 0.7;

/// Fault category reported per anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaultCategory {
    #[serde(rename = "Point Overload (Faulty)")]
    PointOverloadFaulty,
    #[serde(rename = "Point Overload (Potential)")]
    PointOverloadPotential,
    #[serde(rename = "Loose Joint (Faulty)")]
    LooseJointFaulty,
    #[serde(rename = "Loose Joint (Potential)")]
    LooseJointPotential,
    #[serde(rename = "Full Wire Overload (Potential)")]
    FullWireOverloadPotential,
}

impl FaultCategory {
    pub const ALL: [FaultCategory; 5] = [
        FaultCategory::PointOverloadFaulty,
        FaultCategory::PointOverloadPotential,
        FaultCategory::LooseJointFaulty,
        FaultCategory::LooseJointPotential,
        FaultCategory::FullWireOverloadPotential,
    ];

    /// Human-readable label, as shown to reviewers.
    pub fn label(self) -> &'static str {
        match self {
            FaultCategory::PointOverloadFaulty => "Point Overload (Faulty)",
            FaultCategory::PointOverloadPotential => "Point Overload (Potential)",
            FaultCategory::LooseJointFaulty => "Loose Joint (Faulty)",
            FaultCategory::LooseJointPotential => "Loose Joint (Potential)",
            FaultCategory::FullWireOverloadPotential => "Full Wire Overload (Potential)",
        }
    }

    pub fn from_label(label: &str) -> Option<FaultCategory> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Wire-family (overload) category.
    pub fn is_wire(self) -> bool {
        matches!(
            self,
            FaultCategory::PointOverloadFaulty
                | FaultCategory::PointOverloadPotential
                | FaultCategory::FullWireOverloadPotential
        )
    }

    pub fn is_faulty(self) -> bool {
        matches!(
            self,
            FaultCategory::PointOverloadFaulty | FaultCategory::LooseJointFaulty
        )
    }

    pub fn color(self) -> DecisionColor {
        if self.is_faulty() {
            DecisionColor::Red
        } else {
            DecisionColor::Yellow
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rendering tag: red for faulty, yellow for potential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionColor {
    Red,
    Yellow,
}

/// Which family the vote favoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lean {
    Wire,
    Joint,
    /// Neither family reached the margin; the tie-break decided.
    Tied,
}

/// Outcome of the seven wire predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WirePredicates {
    pub aspect_ratio: bool,
    pub eccentricity: bool,
    pub circularity: bool,
    pub extent: bool,
    pub skeleton: bool,
    pub thin: bool,
    pub long: bool,
}

impl WirePredicates {
    pub fn evaluate(f: &FeatureVector, th: &ThresholdSet) -> Self {
        let min_side = f.image_size[0].min(f.image_size[1]) as f64;
        Self {
            aspect_ratio: f.aspect_ratio >= th.wire_ar_min,
            // Undefined eccentricity never votes.
            eccentricity: f.eccentricity.is_some_and(|e| e >= th.ecc_thr),
            circularity: f.circularity <= th.circularity_thr,
            extent: f.extent <= th.wire_extent_max,
            skeleton: f.skeleton_norm >= th.wire_sk_norm_min,
            thin: f.thickness <= th.max_wire_thickness_frac * min_side,
            long: f.length >= th.wire_len_frac * f.image_diagonal(),
        }
    }

    pub fn count(&self) -> u32 {
        [
            self.aspect_ratio,
            self.eccentricity,
            self.circularity,
            self.extent,
            self.skeleton,
            self.thin,
            self.long,
        ]
        .into_iter()
        .filter(|&v| v)
        .count() as u32
    }
}

/// Outcome of the five joint predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct JointPredicates {
    pub extent: bool,
    pub thickness: bool,
    pub skeleton: bool,
    pub small_area: bool,
    pub circularity: bool,
}

impl JointPredicates {
    pub fn evaluate(f: &FeatureVector, th: &ThresholdSet) -> Self {
        Self {
            extent: f.extent >= th.joint_extent_min,
            thickness: f.thickness_to_length() >= th.joint_thick_len_min,
            skeleton: f.skeleton_norm <= th.joint_sk_norm_max,
            small_area: f.area_frac() <= th.joint_area_frac_max,
            circularity: f.circularity >= th.joint_circularity_min,
        }
    }

    pub fn count(&self) -> u32 {
        [
            self.extent,
            self.thickness,
            self.skeleton,
            self.small_area,
            self.circularity,
        ]
        .into_iter()
        .filter(|&v| v)
        .count() as u32
    }
}

/// Classifier verdict for one blob.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Classification {
    pub category: FaultCategory,
    /// Brightest pixel of the dominant hot patch; wire family only.
    pub hotspot: Option<[u32; 2]>,
    pub severity: f64,
    pub color: DecisionColor,
    pub lean: Lean,
}

impl Classification {
    fn new(category: FaultCategory, hotspot: Option<[u32; 2]>, severity: f64, lean: Lean) -> Self {
        Self {
            category,
            hotspot,
            severity,
            color: category.color(),
            lean,
        }
    }
}

fn joint_category(red_ratio: f64, th: &ThresholdSet) -> FaultCategory {
    if red_ratio >= th.red_ratio_faulty {
        FaultCategory::LooseJointFaulty
    } else {
        FaultCategory::LooseJointPotential
    }
}

fn wire_category(f: &FeatureVector, th: &ThresholdSet) -> FaultCategory {
    if f.skeleton_coverage.unwrap_or(0.0) >= th.full_wire_cov {
        return FaultCategory::FullWireOverloadPotential;
    }
    let red_needed = if f.hot_patch_frac <= th.point_max_frac {
        th.red_ratio_faulty
    } else {
        th.red_ratio_faulty + th.dispersed_red_offset
    };
    if f.red_ratio >= red_needed {
        FaultCategory::PointOverloadFaulty
    } else {
        FaultCategory::PointOverloadPotential
    }
}

/// Classify one blob.
///
/// `features` is `None` for a blob without hot pixels, which always yields
/// "Loose Joint (Potential)" without a hotspot.
pub fn classify(
    features: Option<&FeatureVector>,
    severity: f64,
    th: &ThresholdSet,
) -> Classification {
    let Some(f) = features else {
        return Classification::new(FaultCategory::LooseJointPotential, None, severity, Lean::Tied);
    };

    let wire = WirePredicates::evaluate(f, th);
    let joint = JointPredicates::evaluate(f, th);
    let (wv, jv) = (wire.count(), joint.count());
    let margin = th.vote_margin;
    tracing::debug!("votes: wire={} joint={} margin={}", wv, jv, margin);

    if wv >= jv + margin {
        return Classification::new(wire_category(f, th), Some(f.hotspot), severity, Lean::Wire);
    }
    if jv >= wv + margin {
        return Classification::new(joint_category(f.red_ratio, th), None, severity, Lean::Joint);
    }

    let primary = wire.aspect_ratio && wire.long;
    let backup = (wire.eccentricity && f.extent <= TIE_BREAK_EXTENT_MAX) || wire.circularity;
    if (primary || backup) && wire.thin && f.skeleton_norm >= TIE_BREAK_SK_NORM_MIN {
        return Classification::new(FaultCategory::PointOverloadPotential, None, severity, Lean::Tied);
    }
    Classification::new(joint_category(f.red_ratio, th), None, severity, Lean::Tied)
}
