//! Model performance report assembly.

use std::collections::BTreeMap;

use intraday_core::config::ReportConfig;
use intraday_core::{NettedWeight, PricePoint, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{aggregate, aggregate_by_pair, PairLabels, PairPerfRow, PerfRow, Period};
use crate::pnl::{BarPnl, PnlEngine, PnlStats};
use crate::risk::RiskSnapshot;

/// Cumulative net PnL of one pair over the report window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairContribution {
    pub pair: String,
    pub net: Decimal,
    /// Percentage of the total net PnL (0 when the total is zero).
    pub share_pct: Decimal,
}

/// Performance tables of one model run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub daily: Vec<PerfRow>,
    pub weekly: Vec<PerfRow>,
    pub monthly: Vec<PerfRow>,
    pub daily_by_pair: Vec<PairPerfRow>,
    pub weekly_by_pair: Vec<PairPerfRow>,
    pub monthly_by_pair: Vec<PairPerfRow>,
    pub risk: RiskSnapshot,
    /// Best pairs first.
    pub top_pairs: Vec<PairContribution>,
    /// Worst pairs first.
    pub bottom_pairs: Vec<PairContribution>,
    pub stats: PnlStats,
}

/// Builds a [`ModelReport`] from netted weights and prices.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    config: ReportConfig,
    labels: PairLabels,
}

impl ReportBuilder {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            labels: PairLabels::new(),
        }
    }

    pub fn with_labels(mut self, labels: PairLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn build(&self, weights: &[NettedWeight], prices: &[PricePoint]) -> Result<ModelReport> {
        self.config.validate()?;
        let (pnl, stats) = PnlEngine::from_config(&self.config).compute(weights, prices)?;

        let daily = aggregate(&pnl, Period::Day);
        let risk = RiskSnapshot::from_daily(&daily, self.config.annualize_days);
        let daily_by_pair = aggregate_by_pair(&pnl, Period::Day, &self.labels);
        let (top_pairs, bottom_pairs) = top_bottom(&daily_by_pair, self.config.top_n_pairs);

        let report = ModelReport {
            weekly: aggregate(&pnl, Period::Week),
            monthly: aggregate(&pnl, Period::Month),
            weekly_by_pair: aggregate_by_pair(&pnl, Period::Week, &self.labels),
            monthly_by_pair: aggregate_by_pair(&pnl, Period::Month, &self.labels),
            daily,
            daily_by_pair,
            risk,
            top_pairs,
            bottom_pairs,
            stats,
        };

        info!(
            instruments = report.stats.instruments,
            bars = report.stats.bars,
            days = report.risk.num_days,
            net = %total_net(&pnl),
            sharpe = report.risk.sharpe,
            max_drawdown = report.risk.max_drawdown,
            "model report built"
        );
        Ok(report)
    }
}

fn total_net(pnl: &[BarPnl]) -> Decimal {
    pnl.iter().map(|b| b.net).sum()
}

/// Best and worst `n` pairs by cumulative net PnL.
fn top_bottom(rows: &[PairPerfRow], n: usize) -> (Vec<PairContribution>, Vec<PairContribution>) {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for r in rows {
        *totals.entry(r.pair.as_str()).or_insert(Decimal::ZERO) += r.row.net;
    }
    let total: Decimal = totals.values().copied().sum();

    let mut ranked: Vec<PairContribution> = totals
        .into_iter()
        .map(|(pair, net)| PairContribution {
            pair: pair.to_string(),
            net,
            share_pct: (net * Decimal::ONE_HUNDRED)
                .checked_div(total)
                .unwrap_or(Decimal::ZERO),
        })
        .collect();
    // Ascending by net; ties keep pair order.
    ranked.sort_by(|a, b| a.net.cmp(&b.net));

    let bottom: Vec<PairContribution> = ranked.iter().take(n).cloned().collect();
    let top: Vec<PairContribution> = ranked.iter().rev().take(n).cloned().collect();
    (top, bottom)
}

/// Build the report for `weights` priced on `prices`.
pub fn build_report(
    weights: &[NettedWeight],
    prices: &[PricePoint],
    labels: &PairLabels,
    config: &ReportConfig,
) -> Result<ModelReport> {
    ReportBuilder::new(config.clone())
        .with_labels(labels.clone())
        .build(weights, prices)
}
