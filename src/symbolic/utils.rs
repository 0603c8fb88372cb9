// numerical helpers shared by the calculus modules

/// `num_values` evenly spaced points from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, num_values: usize) -> Vec<f64> {
    if num_values == 1 {
        return vec![start];
    }
    let step = (end - start) / (num_values as f64 - 1.0);
    (0..num_values).map(|i| start + (i as f64 * step)).collect()
}

/// Cleans up a value produced by an iterative solver: values within `tol` of an
/// integer become that integer, everything else is rounded to 12 significant digits.
pub fn snap_value(value: f64, tol: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let nearest = value.round();
    if (value - nearest).abs() <= tol * nearest.abs().max(1.0) {
        // no negative zero in results
        return nearest + 0.0;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let scale = 10f64.powi(11 - magnitude);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linspace() {
        let values = linspace(-3.0, 3.0, 7);
        assert_eq!(values, vec![-3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
    }

    #[test]
    fn test_snap_value() {
        assert_eq!(snap_value(0.9999999999999, 1e-9), 1.0);
        assert_eq!(snap_value(-1e-13, 1e-9), 0.0);
        assert!(snap_value(-1e-13, 1e-9).is_sign_positive());
        assert_relative_eq!(snap_value(0.7071067811865476, 1e-9), 0.707106781187, epsilon = 1e-15);
    }
}
