use crate::ir::AxisScale;

/// Map data values into drawing space. Log axes drop non-positive values (NaN).
pub fn project(values: &[f64], scale: AxisScale) -> Vec<f64> {
    match scale {
        AxisScale::Linear | AxisScale::Time => values.to_vec(),
        AxisScale::Log => values
            .iter()
            .map(|&v| if v > 0.0 { v.log10() } else { f64::NAN })
            .collect(),
    }
}

/// Padded domain covering every finite value; `(0, 1)` when there are none
pub fn fit_domain<I>(values: I, include_zero: bool) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        if v < min { min = v; }
        if v > max { max = v; }
    }

    if min == f64::INFINITY {
        return (0.0, 1.0);
    }

    if include_zero {
        if min > 0.0 { min = 0.0; }
        if max < 0.0 { max = 0.0; }
    }

    pad_range(min, max)
}

pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

/// Linear map of `value` from one domain onto another
pub fn rescale(value: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    let span = from.1 - from.0;
    if span == 0.0 {
        return to.0;
    }
    to.0 + (value - from.0) / span * (to.1 - to.0)
}

/// Pairs where both coordinates are finite
pub fn finite_pairs(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_domain_padding() {
        let (min, max) = fit_domain(vec![0.0, 10.0], false);
        assert!(min < 0.0);
        assert!(max > 10.0);
        assert!((min + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fit_domain_single_point() {
        assert_eq!(fit_domain(vec![5.0], false), (4.0, 6.0));
    }

    #[test]
    fn test_fit_domain_ignores_nan_and_empty() {
        assert_eq!(fit_domain(vec![f64::NAN, 5.0], false), (4.0, 6.0));
        assert_eq!(fit_domain(Vec::new(), false), (0.0, 1.0));
    }

    #[test]
    fn test_fit_domain_include_zero() {
        let (min, _) = fit_domain(vec![5.0, 10.0], true);
        assert!(min < 0.0);
    }

    #[test]
    fn test_project_log_drops_non_positive() {
        let out = project(&[100.0, 0.0, -1.0, 1.0], AxisScale::Log);
        assert_eq!(out[0], 2.0);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_rescale() {
        assert_eq!(rescale(5.0, (0.0, 10.0), (100.0, 200.0)), 150.0);
        assert_eq!(rescale(5.0, (1.0, 1.0), (100.0, 200.0)), 100.0);
    }

    #[test]
    fn test_finite_pairs() {
        let pairs = finite_pairs(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, f64::INFINITY]);
        assert_eq!(pairs, vec![(1.0, 1.0)]);
    }
}
