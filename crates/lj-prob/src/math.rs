//! Small numerically-stable math utilities used across probability code.

/// `ln(sqrt(2*pi))`.
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Log-density of the standard normal at `z`.
#[inline]
pub fn standard_normal_logpdf(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

/// Stable `log(sum(exp(values)))`.
///
/// Online accumulation: keeps `(m, s)` so that the result is `m + ln(s)`
/// without ever exponentiating an unshifted term. All-`-inf` input yields
/// `-inf`.
pub fn logsumexp(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut m = f64::NEG_INFINITY;
    let mut s = 0.0f64;
    for t in values {
        if t == f64::NEG_INFINITY {
            continue;
        }
        if t > m {
            if m.is_finite() {
                s = s * (m - t).exp() + 1.0;
            } else {
                s = 1.0;
            }
            m = t;
        } else {
            s += (t - m).exp();
        }
    }
    if !m.is_finite() {
        return f64::NEG_INFINITY;
    }
    m + s.ln()
}

/// Weighted mean and (biased) variance of `values`.
///
/// `None` weights means uniform. A non-positive weight total returns
/// `(0.0, 1.0)` so downstream scale estimates stay usable.
pub fn weighted_mean_var(
    values: impl Iterator<Item = f64>,
    weights: Option<&[f64]>,
) -> (f64, f64) {
    let mut sum_w = 0.0f64;
    let mut sum_wx = 0.0f64;
    let mut sum_wx2 = 0.0f64;

    for (i, x) in values.enumerate() {
        let w = weights.map(|ws| ws[i]).unwrap_or(1.0);
        sum_w += w;
        sum_wx += w * x;
        sum_wx2 += w * x * x;
    }

    if sum_w <= 0.0 {
        return (0.0, 1.0);
    }

    let mean = sum_wx / sum_w;
    let var = (sum_wx2 / sum_w - mean * mean).max(0.0);
    (mean, var)
}
