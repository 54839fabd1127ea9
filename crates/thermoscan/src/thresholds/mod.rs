//! Decision thresholds for the classifier and their bounds.
//!
//! The set is persisted as a flat `name → number` JSON object. Unknown keys
//! are ignored and missing keys take their defaults, so documents written by
//! older or newer builds still load.

pub mod store;

pub use store::{JsonFileStorage, ThresholdSnapshot, ThresholdStorage, ThresholdStore};

/// Every tunable cutoff of the wire/joint vote.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    /// Min rectangle aspect ratio for a wire vote.
    pub wire_ar_min: f64,
    /// Min eccentricity for a wire vote.
    pub ecc_thr: f64,
    /// Max circularity for a wire vote.
    pub circularity_thr: f64,
    /// Max extent for a wire vote.
    pub wire_extent_max: f64,
    /// Min skeleton-normalized length for a wire vote.
    pub wire_sk_norm_min: f64,
    /// "Thin": thickness at most this fraction of the smaller image side.
    pub max_wire_thickness_frac: f64,
    /// "Long": length at least this fraction of the image diagonal.
    pub wire_len_frac: f64,
    /// Skeleton hot coverage for a full wire overload.
    pub full_wire_cov: f64,
    /// Hot-patch fraction above which a point overload counts as dispersed.
    pub point_max_frac: f64,
    /// Red ratio at which a fault is called faulty rather than potential.
    pub red_ratio_faulty: f64,
    /// Extra red ratio required for a dispersed point overload.
    pub dispersed_red_offset: f64,
    /// Min extent for a joint vote.
    pub joint_extent_min: f64,
    /// Min thickness/length for a joint vote.
    pub joint_thick_len_min: f64,
    /// Max skeleton-normalized length for a joint vote.
    pub joint_sk_norm_max: f64,
    /// Max blob area over image area for a joint vote.
    pub joint_area_frac_max: f64,
    /// Min circularity for a joint vote.
    pub joint_circularity_min: f64,
    /// Vote surplus one family needs over the other.
    pub vote_margin: u32,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            wire_ar_min: 6.0,
            ecc_thr: 3.0,
            circularity_thr: 0.30,
            wire_extent_max: 0.50,
            wire_sk_norm_min: 0.80,
            max_wire_thickness_frac: 0.035,
            wire_len_frac: 0.12,
            full_wire_cov: 0.60,
            point_max_frac: 0.25,
            red_ratio_faulty: 0.40,
            dispersed_red_offset: 0.10,
            joint_extent_min: 0.55,
            joint_thick_len_min: 0.18,
            joint_sk_norm_max: 0.65,
            joint_area_frac_max: 0.015,
            joint_circularity_min: 0.55,
            vote_margin: 1,
        }
    }
}

/// Inclusive `[min, max]` range of every real-valued threshold.
pub const BOUNDS: [(&str, f64, f64); 16] = [
    ("wire_ar_min", 1.0, 1000.0),
    ("ecc_thr", 1.0, 1e6),
    ("circularity_thr", 0.0, 1.0),
    ("wire_extent_max", 0.0, 1.0),
    ("wire_sk_norm_min", 0.0, 100.0),
    ("max_wire_thickness_frac", 0.0, 1.0),
    ("wire_len_frac", 0.0, 1.0),
    ("full_wire_cov", 0.0, 1.0),
    ("point_max_frac", 0.0, 1.0),
    ("red_ratio_faulty", 0.20, 0.80),
    ("dispersed_red_offset", 0.0, 0.5),
    ("joint_extent_min", 0.0, 1.0),
    ("joint_thick_len_min", 0.0, 100.0),
    ("joint_sk_norm_max", 0.0, 100.0),
    ("joint_area_frac_max", 0.0, 1.0),
    ("joint_circularity_min", 0.0, 1.0),
];

/// Inclusive range of `vote_margin`.
pub const VOTE_MARGIN_BOUNDS: (u32, u32) = (1, 7);

impl ThresholdSet {
    fn fields_mut(&mut self) -> [(&'static str, &mut f64); 16] {
        [
            ("wire_ar_min", &mut self.wire_ar_min),
            ("ecc_thr", &mut self.ecc_thr),
            ("circularity_thr", &mut self.circularity_thr),
            ("wire_extent_max", &mut self.wire_extent_max),
            ("wire_sk_norm_min", &mut self.wire_sk_norm_min),
            ("max_wire_thickness_frac", &mut self.max_wire_thickness_frac),
            ("wire_len_frac", &mut self.wire_len_frac),
            ("full_wire_cov", &mut self.full_wire_cov),
            ("point_max_frac", &mut self.point_max_frac),
            ("red_ratio_faulty", &mut self.red_ratio_faulty),
            ("dispersed_red_offset", &mut self.dispersed_red_offset),
            ("joint_extent_min", &mut self.joint_extent_min),
            ("joint_thick_len_min", &mut self.joint_thick_len_min),
            ("joint_sk_norm_max", &mut self.joint_sk_norm_max),
            ("joint_area_frac_max", &mut self.joint_area_frac_max),
            ("joint_circularity_min", &mut self.joint_circularity_min),
        ]
    }

    /// `(name, value)` of every threshold, in declaration order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("wire_ar_min", self.wire_ar_min),
            ("ecc_thr", self.ecc_thr),
            ("circularity_thr", self.circularity_thr),
            ("wire_extent_max", self.wire_extent_max),
            ("wire_sk_norm_min", self.wire_sk_norm_min),
            ("max_wire_thickness_frac", self.max_wire_thickness_frac),
            ("wire_len_frac", self.wire_len_frac),
            ("full_wire_cov", self.full_wire_cov),
            ("point_max_frac", self.point_max_frac),
            ("red_ratio_faulty", self.red_ratio_faulty),
            ("dispersed_red_offset", self.dispersed_red_offset),
            ("joint_extent_min", self.joint_extent_min),
            ("joint_thick_len_min", self.joint_thick_len_min),
            ("joint_sk_norm_max", self.joint_sk_norm_max),
            ("joint_area_frac_max", self.joint_area_frac_max),
            ("joint_circularity_min", self.joint_circularity_min),
            ("vote_margin", self.vote_margin as f64),
        ]
    }

    /// Value of the threshold called `key`.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Copy with every value forced into its bounds.
    ///
    /// Non-finite values fall back to the default.
    pub fn clamped(&self) -> ThresholdSet {
        let defaults = ThresholdSet::default();
        let mut out = self.clone();
        for ((key, value), (_, lo, hi)) in out.fields_mut().into_iter().zip(BOUNDS) {
            if !value.is_finite() {
                *value = defaults.get(key).unwrap_or(lo);
            }
            *value = (*value).clamp(lo, hi);
        }
        out.vote_margin = out
            .vote_margin
            .clamp(VOTE_MARGIN_BOUNDS.0, VOTE_MARGIN_BOUNDS.1);
        out
    }

    /// Whether every value is inside its bounds.
    pub fn is_within_bounds(&self) -> bool {
        self.clamped() == *self
    }

    /// Names of the thresholds whose values differ from `other`.
    pub fn changed_keys(&self, other: &ThresholdSet) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .zip(other.entries())
            .filter(|((_, a), (_, b))| a != b)
            .map(|((k, _), _)| k)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_within_bounds() {
        assert!(ThresholdSet::default().is_within_bounds());
    }

    #[test]
    fn bounds_table_matches_field_order() {
        let names: Vec<&str> = ThresholdSet::default()
            .entries()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let bound_names: Vec<&str> = BOUNDS.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(&names[..16], &bound_names[..]);
        assert_eq!(names[16], "vote_margin");
    }

    #[test]
    fn clamping_enforces_ranges() {
        let t = ThresholdSet {
            red_ratio_faulty: 0.95,
            circularity_thr: -0.2,
            wire_ar_min: f64::NAN,
            vote_margin: 0,
            ..Default::default()
        };
        assert!(!t.is_within_bounds());
        let c = t.clamped();
        assert_eq!(c.red_ratio_faulty, 0.80);
        assert_eq!(c.circularity_thr, 0.0);
        assert_eq!(c.wire_ar_min, 6.0);
        assert_eq!(c.vote_margin, 1);
        assert!(c.is_within_bounds());
    }

    #[test]
    fn serde_is_flat_and_lenient() {
        let t: ThresholdSet =
            serde_json::from_value(json!({"wire_ar_min": 8.5, "vote_margin": 2, "legacy_key": 3}))
                .unwrap();
        assert_eq!(t.wire_ar_min, 8.5);
        assert_eq!(t.vote_margin, 2);
        assert_eq!(t.ecc_thr, 3.0);

        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["wire_ar_min"], json!(8.5));
        assert_eq!(v.as_object().unwrap().len(), 17);
    }

    #[test]
    fn changed_keys_lists_differences() {
        let a = ThresholdSet::default();
        let b = ThresholdSet {
            ecc_thr: 4.0,
            vote_margin: 2,
            ..Default::default()
        };
        assert_eq!(a.changed_keys(&b), vec!["ecc_thr", "vote_margin"]);
        assert!(a.changed_keys(&a).is_empty());
        assert_eq!(b.get("ecc_thr"), Some(4.0));
        assert_eq!(b.get("nope"), None);
    }
}
