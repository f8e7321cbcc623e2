//! Value-resolution helpers used to tell flat runs from genuine spans.

/// Significant digits kept when a derived threshold is stabilised.
pub const STABLE_DIGITS: usize = 12;

/// Smallest nonzero gap between any two distinct values.
///
/// Returns `None` when fewer than two distinct finite values are present.
pub fn min_resolution<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|gap| *gap > 0.0)
        .min_by(f64::total_cmp)
}

/// Rounds to [`STABLE_DIGITS`] significant digits so thresholds derived from
/// differences of floats don't carry representation drift (e.g. `0.1 - 0.05`).
pub fn round_stable(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    format!("{:.*e}", STABLE_DIGITS - 1, value)
        .parse()
        .unwrap_or(value)
}

/// Picks whichever candidate has the shorter decimal representation.
///
/// Two values closer than the flat-run threshold are usually the same reading
/// with float noise attached (`0.3` vs `0.30000000000000004`). Ties keep `first`.
pub fn shortest_decimal(first: f64, second: f64) -> f64 {
    if second.to_string().len() < first.to_string().len() {
        second
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn min_resolution_ignores_duplicates() {
        let res = min_resolution([5.0, 5.0, 7.0, 6.0, 7.0]).unwrap();
        assert_relative_eq!(res, 1.0);
    }

    #[test]
    fn min_resolution_needs_two_distinct_values() {
        assert_eq!(min_resolution([3.0, 3.0, 3.0]), None);
        assert_eq!(min_resolution(std::iter::empty()), None);
    }

    #[test]
    fn min_resolution_skips_non_finite() {
        let res = min_resolution([1.0, f64::NAN, 1.25, f64::INFINITY]).unwrap();
        assert_relative_eq!(res, 0.25);
    }

    #[test]
    fn round_stable_removes_drift() {
        let drifted = 0.30000000000000004 - 0.2;
        assert_eq!(round_stable(drifted / 2.0), 0.05);
        assert_eq!(round_stable(0.0), 0.0);
    }

    #[test]
    fn shortest_decimal_prefers_clean_value() {
        assert_eq!(shortest_decimal(0.30000000000000004, 0.3), 0.3);
        assert_eq!(shortest_decimal(0.3, 0.30000000000000004), 0.3);
        assert_eq!(shortest_decimal(1.5, 2.5), 1.5);
    }
}
