use statrs::distribution::{ContinuousCDF, Normal};

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation (denominator `n`).
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let mean = mean(data)?;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

/// Quantile of sorted values with linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let rank = q * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    let frac = rank - low as f64;
    Some(sorted[low] + frac * (sorted[high] - sorted[low]))
}

/// Probability of drawing `value` or more from N(mean, std_dev).
///
/// Undefined (`None`) when the distribution is degenerate.
pub fn normal_upper_tail(value: f64, mean: f64, std_dev: f64) -> Option<f64> {
    if std_dev.is_nan() || std_dev <= 0.0 || !mean.is_finite() {
        return None;
    }
    let normal = Normal::new(mean, std_dev).ok()?;
    Some(1.0 - normal.cdf(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn std_dev_is_population() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&data).unwrap(), 5.0);
        assert_relative_eq!(std_dev(&data).unwrap(), 2.0);
    }

    #[test]
    fn quantile_interpolates_between_ranks() {
        let sorted = [0.1, 0.2, 0.3, 0.4, 0.5];
        assert_relative_eq!(quantile(&sorted, 0.0).unwrap(), 0.1);
        assert_relative_eq!(quantile(&sorted, 1.0).unwrap(), 0.5);
        assert_relative_eq!(quantile(&sorted, 0.5).unwrap(), 0.3);
        assert_relative_eq!(quantile(&sorted, 0.95).unwrap(), 0.48, epsilon = 1e-12);
    }

    #[test]
    fn quantile_of_single_value() {
        assert_relative_eq!(quantile(&[0.25], 0.95).unwrap(), 0.25);
        assert_eq!(quantile(&[], 0.95), None);
        assert_eq!(quantile(&[0.25], 1.5), None);
    }

    #[test]
    fn normal_upper_tail_at_mean_is_half() {
        assert_relative_eq!(normal_upper_tail(1.0, 1.0, 0.5).unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn normal_upper_tail_two_sigma() {
        // 1 - Phi(4) for x = 3, mean = 1, sd = 0.5
        let tail = normal_upper_tail(3.0, 1.0, 0.5).unwrap();
        assert_relative_eq!(tail, 3.167124183e-5, epsilon = 1e-9);
    }

    #[test]
    fn normal_upper_tail_degenerate_is_none() {
        assert_eq!(normal_upper_tail(3.0, 1.0, 0.0), None);
        assert_eq!(normal_upper_tail(3.0, f64::NAN, 1.0), None);
    }
}
