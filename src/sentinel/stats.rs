//! Rate-population statistics for Ring 2.
//!
//! Two backends compute the same numbers: ndarray (preferred, behind the
//! `ndarray-stats` feature) and a hand-written two-pass loop (always built).
//! Both use the sample standard deviation (n − 1 denominator).

use super::traits::StatisticsBackend;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
}

/// Two-pass mean / sample stddev. No dependencies.
pub struct ManualStatistics;

impl StatisticsBackend for ManualStatistics {
    fn name(&self) -> &'static str {
        "manual_zscore"
    }

    fn summarize(&self, values: &[f64]) -> Option<Summary> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let n = finite.len();
        if n < 2 {
            return None;
        }
        let mean = finite.iter().sum::<f64>() / n as f64;
        let sum_sq: f64 = finite.iter().map(|v| (v - mean) * (v - mean)).sum();
        let stddev = (sum_sq / (n - 1) as f64).sqrt();
        Some(Summary {
            count: n,
            mean,
            stddev,
        })
    }
}

/// ndarray-backed mean / sample stddev (`ddof = 1`).
#[cfg(feature = "ndarray-stats")]
pub struct NdarrayStatistics;

#[cfg(feature = "ndarray-stats")]
impl StatisticsBackend for NdarrayStatistics {
    fn name(&self) -> &'static str {
        "ndarray_zscore"
    }

    fn summarize(&self, values: &[f64]) -> Option<Summary> {
        let population: ndarray::Array1<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        // std(1.0) is NaN below two elements
        if population.len() < 2 {
            return None;
        }
        let mean = population.mean()?;
        let stddev = population.std(1.0);
        Some(Summary {
            count: population.len(),
            mean,
            stddev,
        })
    }
}

/// Pick the statistics backend. The flag is true when the preferred library
/// was bound.
pub fn select_backend(statistics_library: bool) -> (Box<dyn StatisticsBackend>, bool) {
    #[cfg(feature = "ndarray-stats")]
    {
        if statistics_library {
            return (Box::new(NdarrayStatistics), true);
        }
    }
    #[cfg(not(feature = "ndarray-stats"))]
    let _ = statistics_library;
    (Box::new(ManualStatistics), false)
}

/// Signed Z-score. Zero spread: 0 when the value equals the mean, otherwise
/// an infinite score carrying the direction of the deviation.
pub fn z_score(value: f64, summary: &Summary) -> f64 {
    let delta = value - summary.mean;
    if summary.stddev > 0.0 {
        delta / summary.stddev
    } else if delta.abs() <= f64::EPSILON * summary.mean.abs().max(1.0) {
        0.0
    } else {
        f64::INFINITY.copysign(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATES: [f64; 5] = [100.0, 102.0, 98.0, 101.0, 99.0];

    #[test]
    fn manual_uses_sample_stddev() {
        let s = ManualStatistics.summarize(&RATES).unwrap();
        assert_eq!(s.count, 5);
        assert!((s.mean - 100.0).abs() < 1e-12);
        // sum of squares = 10, / (n-1) = 2.5
        assert!((s.stddev - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn too_few_values_has_no_summary() {
        assert!(ManualStatistics.summarize(&[42.0]).is_none());
        assert!(ManualStatistics.summarize(&[]).is_none());
        assert!(ManualStatistics.summarize(&[1.0, f64::NAN]).is_none());
    }

    #[cfg(feature = "ndarray-stats")]
    #[test]
    fn backends_agree() {
        let a = ManualStatistics.summarize(&RATES).unwrap();
        let b = NdarrayStatistics.summarize(&RATES).unwrap();
        assert_eq!(a.count, b.count);
        assert!((a.mean - b.mean).abs() < 1e-9);
        assert!((a.stddev - b.stddev).abs() < 1e-9);
        assert!(NdarrayStatistics.summarize(&[1.0]).is_none());
    }

    #[test]
    fn select_backend_honours_switch() {
        let (backend, preferred) = select_backend(false);
        assert_eq!(backend.name(), "manual_zscore");
        assert!(!preferred);

        let (backend, preferred) = select_backend(true);
        assert_eq!(preferred, cfg!(feature = "ndarray-stats"));
        if preferred {
            assert_eq!(backend.name(), "ndarray_zscore");
        }
    }

    #[test]
    fn z_score_handles_zero_spread() {
        let flat = Summary {
            count: 5,
            mean: 100.0,
            stddev: 0.0,
        };
        assert_eq!(z_score(100.0, &flat), 0.0);
        assert_eq!(z_score(101.0, &flat), f64::INFINITY);
        assert_eq!(z_score(99.0, &flat), f64::NEG_INFINITY);
    }

    #[test]
    fn z_score_is_signed() {
        let s = ManualStatistics.summarize(&RATES).unwrap();
        assert!(z_score(110.0, &s) > 6.0);
        assert!(z_score(90.0, &s) < -6.0);
    }
}
