//! Order statistics over small sample sets.

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Quantile `q ∈ [0, 1]` with the Hazen plotting position.
///
/// The `i`-th order statistic (1-based) sits at `(i - 0.5) / n`; values in
/// between are interpolated linearly and values outside are clamped to the
/// sample range. Non-finite values are ignored; `None` when nothing remains.
pub fn hazen_quantile(values: &[f64], q: f64) -> Option<f64> {
    let v = sorted_finite(values);
    let n = v.len();
    if n == 0 {
        return None;
    }
    let h = n as f64 * q.clamp(0.0, 1.0) + 0.5;
    if h <= 1.0 {
        return Some(v[0]);
    }
    if h >= n as f64 {
        return Some(v[n - 1]);
    }
    let lo = h.floor() as usize;
    let t = h - lo as f64;
    Some(v[lo - 1] + t * (v[lo] - v[lo - 1]))
}

/// Percentile `p ∈ [0, 100]` interpolated between closest ranks
/// (position `(n - 1) · p / 100`).
pub fn linear_percentile(values: &[f64], p: f64) -> Option<f64> {
    let v = sorted_finite(values);
    let n = v.len();
    if n == 0 {
        return None;
    }
    let pos = (n - 1) as f64 * (p.clamp(0.0, 100.0) / 100.0);
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    Some(v[lo] + (pos - lo as f64) * (v[hi] - v[lo]))
}

pub fn median(values: &[f64]) -> Option<f64> {
    hazen_quantile(values, 0.5)
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hazen_quartiles_of_three() {
        let v = [12.0, 8.0, 10.0];
        assert_relative_eq!(hazen_quantile(&v, 0.25).unwrap(), 8.5);
        assert_relative_eq!(hazen_quantile(&v, 0.5).unwrap(), 10.0);
        assert_relative_eq!(hazen_quantile(&v, 0.75).unwrap(), 11.5);
    }

    #[test]
    fn hazen_clamps_to_sample_range() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(hazen_quantile(&v, 0.0), Some(1.0));
        assert_eq!(hazen_quantile(&v, 0.1), Some(1.0));
        assert_eq!(hazen_quantile(&v, 1.0), Some(4.0));
        assert_relative_eq!(median(&v).unwrap(), 2.5);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let v = [f64::NAN, 5.0, f64::INFINITY, 7.0];
        assert_relative_eq!(median(&v).unwrap(), 6.0);
        assert!(hazen_quantile(&[f64::NAN], 0.5).is_none());
        assert!(median(&[]).is_none());
    }

    #[test]
    fn linear_percentile_matches_closest_rank_interpolation() {
        let v: Vec<f64> = (0..=10).map(|i| i as f64 * 10.0).collect();
        assert_relative_eq!(linear_percentile(&v, 85.0).unwrap(), 85.0);
        assert_relative_eq!(linear_percentile(&[3.0, 1.0], 50.0).unwrap(), 2.0);
        assert_eq!(linear_percentile(&[9.0], 85.0), Some(9.0));
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert!(mean(std::iter::empty()).is_none());
        assert_relative_eq!(mean([1.0, 2.0, 6.0]).unwrap(), 3.0);
    }
}
