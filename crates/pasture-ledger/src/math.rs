//! Guarded arithmetic and the response functions used throughout the
//! growth model.

/// Scale factor placing the 5% and 95% points of [`sig`] at its two
/// parameters: `2 * (ln 0.95 - ln 0.05)`.
pub const SIG_SCALE: f64 = 5.888_78;

/// Divide `x` by `y`, returning zero when either is zero.
pub fn div0(x: f64, y: f64) -> f64 {
    if x == 0.0 || y == 0.0 { 0.0 } else { x / y }
}

/// Linear ramp from 0 at `x0` to 1 at `x1`.
///
/// When `x0 > x1` the ramp descends instead: 1 at `x1`, 0 at `x0`.
pub fn ramp(x: f64, x0: f64, x1: f64) -> f64 {
    if x0 > x1 {
        1.0 - ramp(x, x1, x0)
    } else if x <= x0 {
        0.0
    } else if x >= x1 {
        1.0
    } else {
        (x - x0) / (x1 - x0)
    }
}

/// Logistic curve passing through 0.05 at `x05` and 0.95 at `x95`.
pub fn sig(x: f64, x05: f64, x95: f64) -> f64 {
    let scaled = SIG_SCALE * (x - 0.5 * (x95 + x05)) / (x95 - x05);
    if scaled < -30.0 {
        0.0
    } else if scaled < 30.0 {
        1.0 / (1.0 + (-scaled).exp())
    } else {
        1.0
    }
}

/// Q10 temperature response with value `y_10` at 10 oC.
pub fn q10(temperature: f64, y_10: f64, q10: f64) -> f64 {
    y_10 * q10.powf((temperature - 10.0) / 10.0)
}

/// Mean of `x1` and `x2` weighted by `w1` and `w2`.
///
/// A zero weight selects the other value outright; with both weights zero
/// the result is `x2`.
pub fn weight_average(x1: f64, w1: f64, x2: f64, w2: f64) -> f64 {
    if w1 != 0.0 && w2 != 0.0 {
        (x1 * w1 + x2 * w2) / (w1 + w2)
    } else if w1 != 0.0 {
        x1
    } else {
        x2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn div0_guards_both_zeroes() {
        assert!(close(div0(0.0, 0.0), 0.0));
        assert!(close(div0(3.0, 0.0), 0.0));
        assert!(close(div0(3.0, 2.0), 1.5));
    }

    #[test]
    fn ramp_clamps_and_interpolates() {
        assert!(close(ramp(-1.0, 0.0, 10.0), 0.0));
        assert!(close(ramp(2.5, 0.0, 10.0), 0.25));
        assert!(close(ramp(12.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn reversed_ramp_descends() {
        assert!(close(ramp(0.0, 10.0, 0.0), 1.0));
        assert!(close(ramp(7.5, 10.0, 0.0), 0.25));
        assert!(close(ramp(11.0, 10.0, 0.0), 0.0));
    }

    #[test]
    fn sig_hits_its_named_points() {
        assert!((sig(5.0, 5.0, 15.0) - 0.05).abs() < 1e-3);
        assert!((sig(15.0, 5.0, 15.0) - 0.95).abs() < 1e-3);
        assert!(close(sig(10.0, 5.0, 15.0), 0.5));
        assert!(close(sig(1.0e3, 5.0, 15.0), 1.0));
        assert!(close(sig(-1.0e3, 5.0, 15.0), 0.0));
    }

    #[test]
    fn q10_doubles_per_ten_degrees() {
        assert!(close(q10(10.0, 0.02, 2.0), 0.02));
        assert!(close(q10(20.0, 0.02, 2.0), 0.04));
    }

    #[test]
    fn weight_average_skips_zero_weights() {
        assert!(close(weight_average(1.0, 3.0, 0.0, 1.0), 0.75));
        assert!(close(weight_average(0.4, 2.0, 0.9, 0.0), 0.4));
        assert!(close(weight_average(0.4, 0.0, 0.9, 0.0), 0.9));
    }
}
