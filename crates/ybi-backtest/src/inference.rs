//! Statistical inference over the daily P&L series: point metrics, HAC
//! standard errors, and a block bootstrap, each scoped to the eligible
//! trading-day denominator.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub n_days: usize,
    pub n_trades: usize,
    pub total_pnl: f64,
    pub win_count: usize,
    pub loss_count: usize,
    pub breakeven_count: usize,
    pub expectancy: f64,
    pub kelly_fraction: f64,
    pub sqn: f64,
    pub mean_daily_pnl: f64,
    pub std_daily_pnl: f64,
    pub sharpe_annualized: f64,
    pub max_drawdown: f64,
    pub max_drawdown_peak: Option<NaiveDate>,
    pub max_drawdown_trough: Option<NaiveDate>,
}

/// `daily_pnl` must already be restricted to eligible days, in date order,
/// zero-filled for no-trade days. `trade_pnls` is every round trip's
/// `pnl_total`, used for trade-level expectancy/Kelly/SQN.
pub fn compute_metrics(dates: &[NaiveDate], daily_pnl: &[f64], trade_pnls: &[f64]) -> Metrics {
    let n_days = daily_pnl.len();
    let total_pnl: f64 = daily_pnl.iter().sum();

    let win_count = trade_pnls.iter().filter(|p| **p > 0.0).count();
    let loss_count = trade_pnls.iter().filter(|p| **p < 0.0).count();
    let breakeven_count = trade_pnls.len() - win_count - loss_count;

    let (expectancy, kelly_fraction, sqn) = trade_expectancy(trade_pnls);

    let mean_daily_pnl = if n_days > 0 { total_pnl / n_days as f64 } else { 0.0 };
    let std_daily_pnl = sample_std(daily_pnl, mean_daily_pnl);
    let sharpe_annualized = if std_daily_pnl > 1e-9 {
        (mean_daily_pnl / std_daily_pnl) * (252.0_f64).sqrt()
    } else {
        0.0
    };

    let (max_drawdown, peak, trough) = max_drawdown(dates, daily_pnl);

    Metrics {
        n_days,
        n_trades: trade_pnls.len(),
        total_pnl,
        win_count,
        loss_count,
        breakeven_count,
        expectancy,
        kelly_fraction,
        sqn,
        mean_daily_pnl,
        std_daily_pnl,
        sharpe_annualized,
        max_drawdown,
        max_drawdown_peak: peak,
        max_drawdown_trough: trough,
    }
}

fn trade_expectancy(trade_pnls: &[f64]) -> (f64, f64, f64) {
    if trade_pnls.len() < 2 {
        return (0.0, 0.0, 0.0);
    }
    let n = trade_pnls.len() as f64;
    let wins: Vec<f64> = trade_pnls.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = trade_pnls.iter().copied().filter(|p| *p < 0.0).collect();
    let win_rate = wins.len() as f64 / n;
    let loss_rate = losses.len() as f64 / n;
    let avg_win = if wins.is_empty() { 0.0 } else { wins.iter().sum::<f64>() / wins.len() as f64 };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        losses.iter().map(|l| l.abs()).sum::<f64>() / losses.len() as f64
    };

    let expectancy = win_rate * avg_win - loss_rate * avg_loss;
    let kelly_fraction = if avg_loss > 0.0 {
        let payoff_ratio = avg_win / avg_loss;
        (win_rate - (1.0 - win_rate) / payoff_ratio.max(1e-9)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mean = trade_pnls.iter().sum::<f64>() / n;
    let std = sample_std(trade_pnls, mean);
    let sqn = if std > 1e-9 { n.sqrt() * mean / std } else { 0.0 };

    (expectancy, kelly_fraction, sqn)
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    var.sqrt()
}

fn max_drawdown(dates: &[NaiveDate], daily_pnl: &[f64]) -> (f64, Option<NaiveDate>, Option<NaiveDate>) {
    let mut equity = 0.0;
    let mut peak = 0.0;
    let mut peak_date = dates.first().copied();
    let mut worst_dd = 0.0;
    let mut worst_peak_date = None;
    let mut worst_trough_date = None;

    for (date, pnl) in dates.iter().zip(daily_pnl.iter()) {
        equity += pnl;
        if equity > peak {
            peak = equity;
            peak_date = Some(*date);
        }
        let dd = peak - equity;
        if dd > worst_dd {
            worst_dd = dd;
            worst_peak_date = peak_date;
            worst_trough_date = Some(*date);
        }
    }

    (worst_dd, worst_peak_date, worst_trough_date)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HacInference {
    pub mean_daily_pnl: f64,
    pub se: f64,
    pub lag: usize,
    pub t_stat: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub description: String,
}

/// Newey-West HAC standard error of the sample mean, with the automatic
/// lag `L = floor(4*(N/100)^(2/9))`.
pub fn hac_inference(daily_pnl: &[f64]) -> HacInference {
    let n = daily_pnl.len();
    let mean = if n > 0 { daily_pnl.iter().sum::<f64>() / n as f64 } else { 0.0 };

    if n < 2 {
        return HacInference {
            mean_daily_pnl: mean,
            se: 0.0,
            lag: 0,
            t_stat: 0.0,
            p_value: 1.0,
            ci_low: mean,
            ci_high: mean,
            description: "Insufficient eligible days for HAC inference.".to_string(),
        };
    }

    let lag = (4.0 * (n as f64 / 100.0).powf(2.0 / 9.0)).floor().max(0.0) as usize;
    let deviations: Vec<f64> = daily_pnl.iter().map(|p| p - mean).collect();

    let gamma0 = deviations.iter().map(|d| d * d).sum::<f64>() / n as f64;
    let mut long_run_var = gamma0;
    for l in 1..=lag.min(n.saturating_sub(1)) {
        let cov: f64 = (l..n).map(|t| deviations[t] * deviations[t - l]).sum::<f64>() / n as f64;
        let weight = 1.0 - (l as f64 / (lag as f64 + 1.0));
        long_run_var += 2.0 * weight * cov;
    }
    long_run_var = long_run_var.max(0.0);

    let se = (long_run_var / n as f64).sqrt();
    let t_stat = if se > 1e-12 { mean / se } else { 0.0 };

    let normal = Normal::new(0.0, 1.0).unwrap();
    let p_value = if se > 1e-12 {
        2.0 * (1.0 - normal.cdf(t_stat.abs()))
    } else {
        1.0
    };

    HacInference {
        mean_daily_pnl: mean,
        se,
        lag,
        t_stat,
        p_value: p_value.clamp(0.0, 1.0),
        ci_low: mean - 1.96 * se,
        ci_high: mean + 1.96 * se,
        description: "Newey-West HAC standard error of mean daily P&L, two-sided test against zero.".to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapInference {
    pub observed_mean_daily_pnl: f64,
    pub bootstrap_mean: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub p_value: f64,
    pub n_bootstrap: u32,
    pub block_len: usize,
    pub description: String,
}

/// Moving-block bootstrap over `daily_pnl` (must be exactly
/// `all_trading_days` long, in order) to preserve serial correlation.
pub fn block_bootstrap(
    daily_pnl: &[f64],
    block_len: usize,
    n_bootstrap: u32,
    seed: u64,
) -> BootstrapInference {
    let n = daily_pnl.len();
    let observed_mean = if n > 0 { daily_pnl.iter().sum::<f64>() / n as f64 } else { 0.0 };

    if n < 2 || block_len == 0 {
        return BootstrapInference {
            observed_mean_daily_pnl: observed_mean,
            bootstrap_mean: observed_mean,
            ci_low: observed_mean,
            ci_high: observed_mean,
            p_value: 1.0,
            n_bootstrap,
            block_len,
            description: "Insufficient eligible days for block bootstrap.".to_string(),
        };
    }

    let block_len = block_len.min(n);
    let means: Vec<f64> = (0..n_bootstrap)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let mut resample = Vec::with_capacity(n);
            while resample.len() < n {
                let start = rng.gen_range(0..n);
                for offset in 0..block_len {
                    if resample.len() == n {
                        break;
                    }
                    resample.push(daily_pnl[(start + offset) % n]);
                }
            }
            resample.iter().sum::<f64>() / n as f64
        })
        .collect();

    let mut sorted = means.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let ci_low = percentile(&sorted, 2.5);
    let ci_high = percentile(&sorted, 97.5);

    let bootstrap_mean = means.iter().sum::<f64>() / means.len() as f64;
    let below_or_equal_zero = means.iter().filter(|m| observed_mean >= 0.0 && **m <= 0.0).count()
        + means.iter().filter(|m| observed_mean < 0.0 && **m >= 0.0).count();
    let p_value = (2.0 * below_or_equal_zero as f64 / means.len() as f64).clamp(0.0, 1.0);

    BootstrapInference {
        observed_mean_daily_pnl: observed_mean,
        bootstrap_mean,
        ci_low,
        ci_high,
        p_value,
        n_bootstrap,
        block_len,
        description:
            "Moving-block bootstrap of mean daily P&L; a sensitivity probe, not a leakage control."
                .to_string(),
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
