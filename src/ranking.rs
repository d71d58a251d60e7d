//! Ranking and variance engine: largest balances per section, and largest
//! deltas of matching line items between the first and last period.

use std::collections::{HashMap, HashSet};

use crate::schema::{BalanceEntry, NormalizedRow, Section, VarianceEntry};
use crate::utils::round2;

/// Caps and thresholds for the ranking views, explicit so tests can
/// override them.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub top_balances: usize,
    pub top_variances: usize,

    /// Deltas below this absolute value are formatting noise, not movement.
    pub min_delta: f64,

    pub near_zero: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_balances: 10,
            top_variances: 15,
            min_delta: 0.01,
            near_zero: 1e-9,
        }
    }
}

/// Stable descending sort by `score`, truncated to the `n` best. Ties keep
/// their original encounter order.
pub(crate) fn sort_top_n<T>(items: &mut Vec<T>, n: usize, score: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));
    items.truncate(n);
}

/// Composite matching key for a line item: the numeric code when present,
/// else the uppercased description.
pub fn composite_key(code: Option<&str>, description: Option<&str>) -> String {
    let code = code.unwrap_or("").trim();
    let desc = description.unwrap_or("").trim().to_uppercase();

    if code.is_empty() {
        format!("D:{desc}")
    } else {
        format!("C:{code}|D:{desc}")
    }
}

/// The `top_balances` largest effective values of one section, across all
/// periods of the ledger.
pub fn top_balances(
    ledger: &[NormalizedRow],
    section: Section,
    cfg: &RankingConfig,
) -> Vec<BalanceEntry> {
    let mut entries: Vec<BalanceEntry> = ledger
        .iter()
        .filter(|row| row.section == section)
        .filter_map(|row| {
            let value = row.effective_value(cfg.near_zero);
            if value == 0.0 {
                return None;
            }
            Some(BalanceEntry {
                code: row.code.clone(),
                description: row.description.clone(),
                value: round2(value),
                period: row.period.clone(),
            })
        })
        .collect();

    sort_top_n(&mut entries, cfg.top_balances, |e| e.value);
    entries
}

struct KeyAggregate {
    code: Option<String>,
    description: Option<String>,
    values: HashMap<String, f64>,
}

/// The `top_variances` largest absolute deltas between the first-processed
/// and last-processed period. A key missing from one endpoint counts as zero
/// there; keys absent from both are dropped. Skipped entirely when the
/// ledger spans fewer than two distinct periods or the endpoint periods are
/// identical.
pub fn top_variances(ledger: &[NormalizedRow], cfg: &RankingConfig) -> Vec<VarianceEntry> {
    let (Some(first), Some(last)) = (
        ledger.first().map(|r| r.period.clone()),
        ledger.last().map(|r| r.period.clone()),
    ) else {
        return Vec::new();
    };

    let distinct: HashSet<&str> = ledger.iter().map(|r| r.period.as_str()).collect();
    if distinct.len() < 2 || first == last {
        return Vec::new();
    }

    let mut order: Vec<String> = Vec::new();
    let mut aggregates: HashMap<String, KeyAggregate> = HashMap::new();

    for row in ledger {
        let value = row.effective_value(cfg.near_zero);
        let key = composite_key(row.code.as_deref(), row.description.as_deref());

        if !aggregates.contains_key(&key) {
            order.push(key.clone());
        }
        let agg = aggregates.entry(key).or_insert_with(|| KeyAggregate {
            code: row.code.clone(),
            description: row.description.clone(),
            values: HashMap::new(),
        });
        agg.values.insert(row.period.clone(), round2(value));
    }

    let mut variances = Vec::new();
    for key in order {
        let Some(agg) = aggregates.get(&key) else {
            continue;
        };

        let a = agg.values.get(&first).copied().unwrap_or(0.0);
        let b = agg.values.get(&last).copied().unwrap_or(0.0);
        if a == 0.0 && b == 0.0 {
            continue;
        }

        let delta = round2(b - a);
        let delta_pct = if a != 0.0 {
            Some(round2((b - a) / a.abs() * 100.0))
        } else {
            None
        };

        if delta.abs() < cfg.min_delta {
            continue;
        }

        variances.push(VarianceEntry {
            key,
            code: agg.code.clone(),
            description: agg.description.clone(),
            from: first.clone(),
            to: last.clone(),
            delta,
            delta_pct,
        });
    }

    sort_top_n(&mut variances, cfg.top_variances, |v| v.delta.abs());
    variances
}
