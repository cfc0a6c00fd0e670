//! Risk snapshot over daily net PnL.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::aggregate::PerfRow;

/// Summary statistics of the daily net PnL series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub num_days: usize,
    pub mean_daily: f64,
    /// Mean daily PnL times the annualization days.
    pub ann_mean: f64,
    /// Sample std of daily PnL times sqrt(annualization days).
    pub ann_vol: f64,
    pub sharpe: f64,
    /// Sum of winning days over the absolute sum of losing days.
    pub profit_factor: f64,
    /// Share of days with positive net PnL.
    pub hit_ratio: f64,
    /// Largest peak-to-trough fall of cumulative net PnL (non-negative).
    pub max_drawdown: f64,
    /// Day the largest drawdown bottomed out.
    pub max_drawdown_date: Option<NaiveDate>,
    /// 5% quantile of daily net PnL.
    pub var95: f64,
}

impl RiskSnapshot {
    /// Compute from daily rows in date order.
    pub fn from_daily(daily: &[PerfRow], annualize_days: u32) -> Self {
        if daily.is_empty() {
            return Self::default();
        }

        let nets: Vec<f64> = daily.iter().map(|r| r.net.to_f64().unwrap_or(0.0)).collect();
        let n = nets.len();
        let ann = f64::from(annualize_days);

        let mean_daily = nets.iter().mean();
        let std = if n > 1 { nets.iter().std_dev() } else { 0.0 };
        let ann_mean = mean_daily * ann;
        let ann_vol = std * ann.sqrt();
        let sharpe = if ann_vol > 0.0 { ann_mean / ann_vol } else { 0.0 };

        let wins: f64 = nets.iter().filter(|&&x| x > 0.0).sum();
        let losses: f64 = nets.iter().filter(|&&x| x < 0.0).map(|x| x.abs()).sum();
        let profit_factor = if losses > 0.0 {
            wins / losses
        } else if wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let hit_ratio = nets.iter().filter(|&&x| x > 0.0).count() as f64 / n as f64;

        let (max_drawdown, max_drawdown_date) = max_drawdown(daily, &nets);
        let var95 = Data::new(nets).quantile(0.05);

        Self {
            num_days: n,
            mean_daily,
            ann_mean,
            ann_vol,
            sharpe,
            profit_factor,
            hit_ratio,
            max_drawdown,
            max_drawdown_date,
            var95,
        }
    }
}

/// Deepest fall of the cumulative curve below its running peak (starting
/// at zero) and the day it happened.
fn max_drawdown(daily: &[PerfRow], nets: &[f64]) -> (f64, Option<NaiveDate>) {
    let mut equity = 0.0;
    let mut peak = 0.0_f64;
    let mut worst = 0.0;
    let mut worst_date = None;
    for (row, net) in daily.iter().zip(nets) {
        equity += net;
        peak = peak.max(equity);
        let drawdown = peak - equity;
        if drawdown > worst {
            worst = drawdown;
            worst_date = Some(row.period_start);
        }
    }
    (worst, worst_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal::Decimal;

    fn rows(nets: &[f64]) -> Vec<PerfRow> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        nets.iter()
            .enumerate()
            .map(|(i, net)| PerfRow {
                period_start: start + chrono::Duration::days(i as i64),
                gross: Decimal::ZERO,
                cost: Decimal::ZERO,
                net: Decimal::try_from(*net).unwrap(),
                bars: 1,
                hit_ratio: 0.0,
                turnover: Decimal::ZERO,
            })
            .collect()
    }

    #[test]
    fn test_basic_snapshot() {
        let daily = rows(&[1.0, -2.0, 3.0, -1.0]);
        let risk = RiskSnapshot::from_daily(&daily, 252);

        assert_eq!(risk.num_days, 4);
        assert_relative_eq!(risk.mean_daily, 0.25);
        assert_relative_eq!(risk.ann_mean, 63.0);
        // Sample variance: (0.5625 + 5.0625 + 7.5625 + 1.5625) / 3.
        let std = (14.75_f64 / 3.0).sqrt();
        assert_relative_eq!(risk.ann_vol, std * 252f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(risk.sharpe, 63.0 / (std * 252f64.sqrt()), epsilon = 1e-12);
        assert_relative_eq!(risk.profit_factor, 4.0 / 3.0);
        assert_relative_eq!(risk.hit_ratio, 0.5);
    }

    #[test]
    fn test_max_drawdown_and_date() {
        // Curve: 1, -1, 2, 1 -> deepest fall 2 on day 2.
        let daily = rows(&[1.0, -2.0, 3.0, -1.0]);
        let risk = RiskSnapshot::from_daily(&daily, 252);
        assert_relative_eq!(risk.max_drawdown, 2.0);
        assert_eq!(risk.max_drawdown_date, NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_var95_is_low_tail() {
        let nets: Vec<f64> = (1..=100).map(|i| i as f64 - 50.0).collect();
        let risk = RiskSnapshot::from_daily(&rows(&nets), 252);
        assert!(risk.var95 < -40.0 && risk.var95 > -47.0);
    }

    #[test]
    fn test_degenerate_series() {
        assert_eq!(RiskSnapshot::from_daily(&[], 252), RiskSnapshot::default());

        let single = RiskSnapshot::from_daily(&rows(&[0.5]), 252);
        assert_eq!(single.ann_vol, 0.0);
        assert_eq!(single.sharpe, 0.0);
        assert!(single.profit_factor.is_infinite());
        assert_eq!(single.max_drawdown_date, None);
    }
}
