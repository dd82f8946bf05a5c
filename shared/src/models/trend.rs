//! Linear demand trend analysis

use serde::{Deserialize, Serialize};

/// Fewer monthly buckets than this are not analysed
pub const MIN_TREND_BUCKETS: usize = 3;

/// Correlation strength above which a trend is called
pub const TREND_STRENGTH_THRESHOLD: f64 = 0.5;

/// Months covered by `projected_change`
pub const PROJECTION_MONTHS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Ordinary least squares fit with Pearson correlation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub correlation: f64,
}

impl LinearFit {
    pub fn strength(&self) -> f64 {
        self.correlation.abs()
    }

    pub fn direction(&self) -> TrendDirection {
        if self.strength() > TREND_STRENGTH_THRESHOLD {
            if self.slope > 0.0 {
                return TrendDirection::Increasing;
            }
            if self.slope < 0.0 {
                return TrendDirection::Decreasing;
            }
        }
        TrendDirection::Stable
    }

    pub fn projected_change(&self) -> f64 {
        self.slope * PROJECTION_MONTHS
    }
}

/// Fits `y = slope·x + intercept`. Returns `None` for fewer than two points
/// or when every x is identical. Correlation is zero when y is constant.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let correlation = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };

    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        correlation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_increasing_line() {
        let fit = linear_fit(&[(0.0, 10.0), (1.0, 20.0), (2.0, 30.0)]).unwrap();
        assert!((fit.slope - 10.0).abs() < 1e-12);
        assert!((fit.intercept - 10.0).abs() < 1e-12);
        assert!((fit.correlation - 1.0).abs() < 1e-12);
        assert_eq!(fit.direction(), TrendDirection::Increasing);
        assert!((fit.projected_change() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_decreasing_line() {
        let fit = linear_fit(&[(0.0, 9.0), (1.0, 6.0), (2.0, 2.0), (3.0, 1.0)]).unwrap();
        assert!(fit.slope < 0.0);
        assert_eq!(fit.direction(), TrendDirection::Decreasing);
    }

    #[test]
    fn test_noisy_series_is_stable() {
        let fit = linear_fit(&[(0.0, 5.0), (1.0, 9.0), (2.0, 1.0), (3.0, 8.0), (4.0, 4.0)]).unwrap();
        assert!(fit.strength() <= TREND_STRENGTH_THRESHOLD);
        assert_eq!(fit.direction(), TrendDirection::Stable);
    }

    #[test]
    fn test_flat_series_has_zero_correlation() {
        let fit = linear_fit(&[(0.0, 4.0), (1.0, 4.0), (2.0, 4.0)]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.correlation, 0.0);
        assert_eq!(fit.direction(), TrendDirection::Stable);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(linear_fit(&[(1.0, 1.0)]).is_none());
        assert!(linear_fit(&[(1.0, 1.0), (1.0, 5.0)]).is_none());
    }
}
