//! Scalar streaming versions of the indicator math: one bar in, one updated
//! value out. No vector recompute over history.

/// One step of the standard recursive EMA. `prev` is `None` before the
/// first seed value exists.
pub fn ema_step(prev: Option<f64>, value: f64, period: usize) -> f64 {
    let alpha = 2.0 / (period as f64 + 1.0);
    match prev {
        Some(p) => (value - p) * alpha + p,
        None => value,
    }
}

/// Population mean and sample standard deviation of a slice.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n;
    if n < 2.0 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Average true range over a window of (high, low, close) triples,
/// `close` being the *previous* bar's close for the first triple's true
/// range computation.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64]) -> f64 {
    if highs.is_empty() {
        return 0.0;
    }
    let mut trs = Vec::with_capacity(highs.len());
    for i in 0..highs.len() {
        let prev_close = if i == 0 { closes[0] } else { closes[i - 1] };
        let tr = (highs[i] - lows[i])
            .max((highs[i] - prev_close).abs())
            .max((lows[i] - prev_close).abs());
        trs.push(tr);
    }
    trs.iter().sum::<f64>() / trs.len() as f64
}

/// Slope of the least-squares line fit to `values` against bar index,
/// used as the momentum histogram proxy.
pub fn linreg_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = values.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(values.iter()) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }
    if den.abs() < 1e-12 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_step_seeds_on_first_value() {
        assert_eq!(ema_step(None, 10.0, 8), 10.0);
    }

    #[test]
    fn ema_step_smooths_toward_new_value() {
        let next = ema_step(Some(10.0), 12.0, 8);
        assert!(next > 10.0 && next < 12.0);
    }

    #[test]
    fn linreg_slope_detects_uptrend() {
        let vals = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(linreg_slope(&vals) > 0.0);
    }

    #[test]
    fn linreg_slope_detects_downtrend() {
        let vals = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        assert!(linreg_slope(&vals) < 0.0);
    }
}
