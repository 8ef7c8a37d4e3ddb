//! Descriptive statistics and confidence intervals.
//!
//! All functions are total: empty input produces zero-valued results instead
//! of errors, and non-finite inputs are the caller's problem.
//!
//! # Critical values
//!
//! For `n >= 30` the critical value comes from the inverse normal CDF
//! (Acklam's rational approximation, relative error about 1.15e-9). For smaller
//! samples a t critical value is looked up in [`tables::T_TABLE`] by nearest
//! degrees of freedom; confidence levels without a table column fall back to
//! the normal approximation.

pub mod tables;

use serde::{Deserialize, Serialize};

pub use tables::t_critical_value;

/// Sample size from which the normal approximation is used.
pub const LARGE_SAMPLE: usize = 30;

/// Arithmetic mean; 0 for empty input.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (N-1 denominator); 0 for N <= 1.
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation; 0 for N <= 1.
#[must_use]
pub fn standard_deviation(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Standard error of the mean; 0 for N <= 1.
#[must_use]
pub fn standard_error(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    standard_deviation(values) / (values.len() as f64).sqrt()
}

/// Copy and sort ascending.
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Percentile of already-sorted data with linear interpolation.
///
/// Rank is `p / 100 * (n - 1)`; `p` is clamped to `[0, 100]`.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Median (50th percentile).
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    percentile_sorted(&sorted(values), 50.0)
}

/// One requested percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentilePoint {
    /// Requested percentile in `[0, 100]`.
    pub p: f64,
    /// Interpolated value.
    pub value: f64,
}

/// Percentiles in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles(pub Vec<PercentilePoint>);

impl Percentiles {
    /// Value for a requested percentile.
    #[must_use]
    pub fn get(&self, p: f64) -> Option<f64> {
        self.0
            .iter()
            .find(|point| (point.p - p).abs() < 1e-9)
            .map(|point| point.value)
    }

    /// Iterate over the points.
    pub fn iter(&self) -> impl Iterator<Item = &PercentilePoint> {
        self.0.iter()
    }
}

/// Interpolated percentiles for each requested `p`.
#[must_use]
pub fn percentiles(values: &[f64], requested: &[f64]) -> Percentiles {
    let data = sorted(values);
    Percentiles(
        requested
            .iter()
            .map(|&p| PercentilePoint {
                p,
                value: percentile_sorted(&data, p),
            })
            .collect(),
    )
}

/// Inverse of the standard normal CDF.
///
/// Returns `-inf`/`+inf` at or beyond 0 and 1.
#[must_use]
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Two-sided critical value for a sample of size `n`.
#[must_use]
pub fn critical_value(n: usize, confidence: f64) -> f64 {
    let z = inverse_normal_cdf(1.0 - (1.0 - confidence) / 2.0);
    if n >= LARGE_SAMPLE {
        return z;
    }
    u32::try_from(n.saturating_sub(1))
        .ok()
        .and_then(|df| t_critical_value(df, confidence))
        .unwrap_or(z)
}

/// Confidence interval for the mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Confidence level, e.g. 0.95.
    pub confidence: f64,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Half-width.
    pub margin: f64,
}

impl ConfidenceInterval {
    /// Check if value is within the interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Full width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// `mean ± critical * SE`. Empty input gives a zero interval.
#[must_use]
pub fn confidence_interval(values: &[f64], confidence: f64) -> ConfidenceInterval {
    if values.is_empty() {
        return ConfidenceInterval {
            confidence,
            ..ConfidenceInterval::default()
        };
    }
    let m = mean(values);
    let se = standard_error(values);
    let margin = if se > 0.0 {
        critical_value(values.len(), confidence) * se
    } else {
        0.0
    };
    ConfidenceInterval {
        confidence,
        lower: m - margin,
        upper: m + margin,
        margin,
    }
}

/// Full distributional summary of a sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    /// Sample size.
    pub count: usize,
    /// Mean.
    pub mean: f64,
    /// Median.
    pub median: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Minimum.
    pub min: f64,
    /// Maximum.
    pub max: f64,
    /// Requested percentiles.
    pub percentiles: Percentiles,
    /// Confidence interval for the mean.
    pub confidence_interval: ConfidenceInterval,
}

impl DistributionSummary {
    /// Coefficient of variation (std / mean), 0 when the mean is 0.
    #[must_use]
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean.abs() < f64::EPSILON {
            0.0
        } else {
            self.std_dev / self.mean.abs()
        }
    }
}

/// Summarize a sample in one pass over a sorted copy.
#[must_use]
pub fn summarize(values: &[f64], requested: &[f64], confidence: f64) -> DistributionSummary {
    let data = sorted(values);
    DistributionSummary {
        count: data.len(),
        mean: mean(&data),
        median: percentile_sorted(&data, 50.0),
        std_dev: standard_deviation(&data),
        min: data.first().copied().unwrap_or(0.0),
        max: data.last().copied().unwrap_or(0.0),
        percentiles: Percentiles(
            requested
                .iter()
                .map(|&p| PercentilePoint {
                    p,
                    value: percentile_sorted(&data, p),
                })
                .collect(),
        ),
        confidence_interval: confidence_interval(&data, confidence),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: percentiles are monotone in p and bounded by the data.
        #[test]
        fn prop_percentiles_monotone(values in prop::collection::vec(-1000.0f64..1000.0, 1..50)) {
            let p = percentiles(&values, &[0.0, 10.0, 50.0, 90.0, 100.0]);
            let v: Vec<f64> = p.iter().map(|pt| pt.value).collect();
            for pair in v.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            let data = sorted(&values);
            prop_assert!((v[0] - data[0]).abs() < 1e-9);
            prop_assert!((v[4] - data[data.len() - 1]).abs() < 1e-9);
        }

        /// Falsification: the interval always contains the sample mean.
        #[test]
        fn prop_ci_contains_mean(values in prop::collection::vec(0.0f64..100.0, 0..80)) {
            let ci = confidence_interval(&values, 0.95);
            prop_assert!(ci.contains(mean(&values)));
            prop_assert!(ci.margin >= 0.0);
        }

        /// Falsification: inverse normal CDF is increasing.
        #[test]
        fn prop_inverse_normal_increasing(p in 0.001f64..0.998) {
            prop_assert!(inverse_normal_cdf(p + 0.001) > inverse_normal_cdf(p));
        }
    }
}
