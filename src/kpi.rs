//! Profit-and-loss KPI engine.
//!
//! Line descriptions and classification codes are each independently
//! unreliable (free-text spelling variance, compact vs dotted code notation),
//! so every waterfall field is resolved through an ordered list of matching
//! tiers evaluated until one yields a non-zero total: explicit keyword match,
//! then coarse bucket, then literal classification prefix.

use std::collections::HashMap;

use crate::classification::{bucket_key, normalize_classification};
use crate::schema::{BucketTotal, KpiReport, NormalizedRow, PeriodKpi, Section};
use crate::utils::{normalize_text, round2};

/// Vocabulary and threshold configuration for the KPI engine. Kept explicit
/// instead of embedded literals so callers and tests can override it.
#[derive(Debug, Clone)]
pub struct KpiConfig {
    /// Values with absolute magnitude at or below this are treated as zero.
    pub near_zero: f64,

    pub gross_revenue_terms: Vec<String>,
    pub net_revenue_terms: Vec<String>,
    pub deduction_terms: Vec<String>,
    pub cost_terms: Vec<String>,
    pub admin_expense_terms: Vec<String>,
    pub commercial_expense_terms: Vec<String>,
    pub other_expense_terms: Vec<String>,

    /// Profit vocabularies participate in the relevance filter only; the
    /// profit figures themselves are derived, never summed from rows.
    pub gross_profit_terms: Vec<String>,
    pub operating_result_terms: Vec<String>,
    pub net_profit_terms: Vec<String>,

    pub gross_revenue_buckets: Vec<String>,
    pub deduction_buckets: Vec<String>,
    pub cost_buckets: Vec<String>,
    pub admin_expense_buckets: Vec<String>,

    /// Literal prefixes matched against both the raw and the normalized
    /// classification, covering ledgers whose codes were never normalized
    /// upstream (compact 371.1 next to dotted 3.7.1.1).
    pub admin_expense_prefixes: Vec<String>,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            near_zero: 1e-9,
            gross_revenue_terms: terms(&[
                "RECEITA BRUTA",
                "RECEITA OPERACIONAL BRUTA",
                "VENDAS BRUTAS",
                "FATURAMENTO BRUTO",
            ]),
            net_revenue_terms: terms(&[
                "RECEITA LIQUIDA",
                "RECEITA LIQ",
                "RECEITAS LIQUIDAS",
                "RECEITA OPERACIONAL LIQUIDA",
                "ROL",
            ]),
            deduction_terms: terms(&[
                "DEDUCOES",
                "DEDUCAO",
                "DEVOLUCOES",
                "ABATIMENTOS",
                "CANCELAMENTOS",
                "ICMS",
                "ISS",
                "PIS",
                "COFINS",
            ]),
            cost_terms: terms(&[
                "CMV",
                "CPV",
                "CUSTO",
                "CUSTOS",
                "CUSTO DAS MERCADORIAS",
                "CUSTO DOS PRODUTOS",
                "CUSTO DOS SERVICOS",
                "CUSTO DOS SERVICOS PRESTADOS",
                "CSP",
            ]),
            admin_expense_terms: terms(&[
                "DESPESAS ADMIN",
                "DESPESAS ADMINISTRATIVAS",
                "DESPESA ADMIN",
                "ADMINISTRATIVAS",
            ]),
            commercial_expense_terms: terms(&[
                "DESPESAS COMERC",
                "DESPESAS COMERCIAIS",
                "DESPESAS DE VENDAS",
                "MARKETING",
                "PROPAGANDA",
                "PUBLICIDADE",
            ]),
            other_expense_terms: terms(&[
                "OUTRAS DESPESAS",
                "DESPESAS GERAIS",
                "DESPESAS OPERACIONAIS",
                "DESPESAS FINANCEIRAS",
                "CUSTOS FINANCEIROS",
                "DESPESAS",
            ]),
            gross_profit_terms: terms(&["LUCRO BRUTO", "RESULTADO BRUTO"]),
            operating_result_terms: terms(&[
                "RESULTADO OPERACIONAL",
                "LUCRO OPERACIONAL",
                "EBIT",
            ]),
            net_profit_terms: terms(&[
                "LUCRO LIQUIDO",
                "RESULTADO LIQUIDO",
                "RESULTADO DO EXERCICIO",
                "LUCRO/PREJUIZO DO EXERCICIO",
                "LUCRO OU PREJUIZO",
            ]),
            gross_revenue_buckets: terms(&["3.1"]),
            deduction_buckets: terms(&["3.2"]),
            cost_buckets: terms(&["3.3", "3.4", "3.5"]),
            admin_expense_buckets: terms(&["3.7", "3.8"]),
            admin_expense_prefixes: terms(&["3.7", "3.8", "371.1", "381.1", "3.7.1", "3.8.1"]),
        }
    }
}

/// One tier of the layered matching strategy, evaluated in order until a
/// tier yields a non-zero result.
enum MatchTier<'a> {
    Keywords(&'a [String]),
    Buckets(&'a [String]),
    ClassificationPrefixes(&'a [String]),
}

fn matches_any(desc: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| desc.contains(p.as_str()))
}

fn sum_by_keywords_abs(rows: &[&NormalizedRow], patterns: &[String], near_zero: f64) -> f64 {
    let mut sum = 0.0;
    for row in rows {
        let desc = normalize_text(row.description.as_deref().unwrap_or(""));
        if !desc.is_empty() && matches_any(&desc, patterns) {
            sum += row.effective_value(near_zero).abs();
        }
    }
    round2(sum)
}

fn sum_by_buckets_abs(rows: &[&NormalizedRow], keys: &[String], near_zero: f64) -> f64 {
    let mut sum = 0.0;
    for row in rows {
        if let Some(key) = bucket_key(row.classification.as_deref()) {
            if keys.contains(&key) {
                sum += row.effective_value(near_zero).abs();
            }
        }
    }
    round2(sum)
}

fn sum_by_prefixes_abs(rows: &[&NormalizedRow], prefixes: &[String], near_zero: f64) -> f64 {
    let mut sum = 0.0;
    for row in rows {
        let raw = row.classification.as_deref().unwrap_or("").trim();
        let normalized = normalize_classification(raw);

        let hit = prefixes.iter().any(|p| {
            let p = p.trim();
            !p.is_empty() && (raw.starts_with(p) || normalized.starts_with(p))
        });

        if hit {
            sum += row.effective_value(near_zero).abs();
        }
    }
    round2(sum)
}

fn resolve_tiers(rows: &[&NormalizedRow], tiers: &[MatchTier<'_>], near_zero: f64) -> f64 {
    for tier in tiers {
        let total = match tier {
            MatchTier::Keywords(patterns) => sum_by_keywords_abs(rows, patterns, near_zero),
            MatchTier::Buckets(keys) => sum_by_buckets_abs(rows, keys, near_zero),
            MatchTier::ClassificationPrefixes(prefixes) => {
                sum_by_prefixes_abs(rows, prefixes, near_zero)
            }
        };
        if total != 0.0 {
            return total;
        }
    }
    0.0
}

/// Everything under classification 3 is income-statement material, even when
/// the section context labeled it OUTROS.
fn is_profit_loss_relevant(row: &NormalizedRow, cfg: &KpiConfig) -> bool {
    let cls = normalize_classification(row.classification.as_deref().unwrap_or(""));

    if row.section == Section::Dre {
        return true;
    }
    if cls.starts_with('3') {
        return true;
    }
    if row.section == Section::Ativo || row.section == Section::Passivo {
        return false;
    }

    let desc = normalize_text(row.description.as_deref().unwrap_or(""));
    if desc.is_empty() {
        return false;
    }

    matches_any(&desc, &cfg.net_revenue_terms)
        || matches_any(&desc, &cfg.gross_revenue_terms)
        || matches_any(&desc, &cfg.deduction_terms)
        || matches_any(&desc, &cfg.cost_terms)
        || matches_any(&desc, &cfg.admin_expense_terms)
        || matches_any(&desc, &cfg.commercial_expense_terms)
        || matches_any(&desc, &cfg.other_expense_terms)
        || matches_any(&desc, &cfg.gross_profit_terms)
        || matches_any(&desc, &cfg.operating_result_terms)
        || matches_any(&desc, &cfg.net_profit_terms)
}

fn compute_buckets(rows: &[&NormalizedRow], near_zero: f64) -> Vec<BucketTotal> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (f64, usize)> = HashMap::new();

    for row in rows {
        let Some(key) = bucket_key(row.classification.as_deref()) else {
            continue;
        };

        if !totals.contains_key(&key) {
            order.push(key.clone());
        }
        let entry = totals.entry(key).or_insert((0.0, 0));
        entry.0 += row.effective_value(near_zero);
        entry.1 += 1;
    }

    let mut buckets: Vec<BucketTotal> = order
        .into_iter()
        .filter_map(|key| {
            totals.remove(&key).map(|(total, line_count)| BucketTotal {
                bucket_key: key,
                total: round2(total),
                line_count,
            })
        })
        .collect();

    buckets.sort_by(|a, b| b.total.abs().total_cmp(&a.total.abs()));
    buckets
}

fn pct(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    Some(round2(num / den * 100.0))
}

fn compute_one_period(period: &str, rows: &[&NormalizedRow], cfg: &KpiConfig) -> PeriodKpi {
    let eps = cfg.near_zero;
    let year = rows.iter().find_map(|r| r.year);
    let buckets = compute_buckets(rows, eps);

    let gross_revenue = resolve_tiers(
        rows,
        &[
            MatchTier::Keywords(&cfg.gross_revenue_terms),
            MatchTier::Buckets(&cfg.gross_revenue_buckets),
        ],
        eps,
    );
    let deductions = resolve_tiers(
        rows,
        &[
            MatchTier::Keywords(&cfg.deduction_terms),
            MatchTier::Buckets(&cfg.deduction_buckets),
        ],
        eps,
    );

    let mut net_revenue = resolve_tiers(rows, &[MatchTier::Keywords(&cfg.net_revenue_terms)], eps);
    if net_revenue == 0.0 && gross_revenue != 0.0 {
        net_revenue = round2(gross_revenue - deductions);
    }

    let cost_of_goods_or_services = resolve_tiers(
        rows,
        &[
            MatchTier::Keywords(&cfg.cost_terms),
            MatchTier::Buckets(&cfg.cost_buckets),
        ],
        eps,
    );
    let admin_expenses = resolve_tiers(
        rows,
        &[
            MatchTier::Keywords(&cfg.admin_expense_terms),
            MatchTier::Buckets(&cfg.admin_expense_buckets),
            MatchTier::ClassificationPrefixes(&cfg.admin_expense_prefixes),
        ],
        eps,
    );
    let commercial_expenses = resolve_tiers(
        rows,
        &[MatchTier::Keywords(&cfg.commercial_expense_terms)],
        eps,
    );
    let other_expenses =
        resolve_tiers(rows, &[MatchTier::Keywords(&cfg.other_expense_terms)], eps);

    let gross_profit = if net_revenue != 0.0 {
        Some(round2(net_revenue - cost_of_goods_or_services))
    } else {
        None
    };
    let operating_result = gross_profit
        .map(|gp| round2(gp - admin_expenses - commercial_expenses - other_expenses));
    let net_profit = operating_result;

    let gross_margin_pct = gross_profit.and_then(|gp| pct(gp, net_revenue));
    let net_margin_pct = operating_result.and_then(|op| pct(op, net_revenue));

    PeriodKpi {
        period: period.to_string(),
        year,
        gross_revenue,
        net_revenue,
        deductions,
        cost_of_goods_or_services,
        admin_expenses,
        commercial_expenses,
        other_expenses,
        gross_profit,
        operating_result,
        net_profit,
        gross_margin_pct,
        net_margin_pct,
        buckets,
    }
}

/// Computes one [`PeriodKpi`] per distinct period present in the ledger, in
/// first-seen order, from the profit-and-loss-relevant rows only.
pub fn compute_period_kpis(ledger: &[NormalizedRow], cfg: &KpiConfig) -> KpiReport {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<&NormalizedRow>> = HashMap::new();

    for row in ledger {
        if row.period.is_empty() || !is_profit_loss_relevant(row, cfg) {
            continue;
        }
        if !grouped.contains_key(&row.period) {
            order.push(row.period.clone());
        }
        grouped.entry(row.period.clone()).or_default().push(row);
    }

    let by_period = order
        .iter()
        .filter_map(|period| {
            grouped
                .get(period)
                .map(|rows| compute_one_period(period, rows, cfg))
        })
        .collect();

    KpiReport {
        by_period,
        notes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        period: &str,
        section: Section,
        classification: Option<&str>,
        description: Option<&str>,
        current_balance: Option<f64>,
    ) -> NormalizedRow {
        NormalizedRow {
            period: period.to_string(),
            year: Some(2024),
            section,
            code: None,
            classification: classification.map(str::to_string),
            description: description.map(str::to_string),
            current_balance,
            prior_balance: None,
            debit: None,
            credit: None,
        }
    }

    #[test]
    fn test_keyword_tier_wins_over_buckets() {
        let ledger = vec![row(
            "T1/2024",
            Section::Dre,
            Some("3.1"),
            Some("Receita Bruta"),
            Some(500_000.0),
        )];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let kpi = &report.by_period[0];

        assert_eq!(kpi.gross_revenue, 500_000.0);
        assert_eq!(kpi.deductions, 0.0);
        assert_eq!(kpi.net_revenue, 500_000.0);
        assert_eq!(kpi.gross_profit, Some(500_000.0));
        assert_eq!(kpi.operating_result, Some(500_000.0));
        assert_eq!(kpi.net_profit, Some(500_000.0));
        assert_eq!(kpi.gross_margin_pct, Some(100.0));
        assert_eq!(kpi.net_margin_pct, Some(100.0));
    }

    #[test]
    fn test_bucket_fallback_when_no_keyword_matches() {
        let ledger = vec![
            row(
                "2024",
                Section::Dre,
                Some("3.1.01"),
                Some("Vendas de Produtos"),
                Some(300_000.0),
            ),
            row(
                "2024",
                Section::Dre,
                Some("3.2.01"),
                Some("Impostos sobre Vendas"),
                Some(-30_000.0),
            ),
        ];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let kpi = &report.by_period[0];

        assert_eq!(kpi.gross_revenue, 300_000.0);
        assert_eq!(kpi.deductions, 30_000.0);
        assert_eq!(kpi.net_revenue, 270_000.0);
    }

    #[test]
    fn test_compact_classification_reaches_admin_bucket() {
        let ledger = vec![row(
            "2024",
            Section::Outros,
            Some("371.1"),
            Some("Gastos com Pessoal"),
            Some(-42_000.0),
        )];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        assert_eq!(report.by_period[0].admin_expenses, 42_000.0);
    }

    #[test]
    fn test_prefix_tier_catches_unbucketed_classification() {
        let ledger = vec![row(
            "2024",
            Section::Dre,
            Some("3.71"),
            Some("Gastos com Pessoal"),
            Some(-10_000.0),
        )];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        assert_eq!(report.by_period[0].admin_expenses, 10_000.0);
    }

    #[test]
    fn test_ativo_and_passivo_rows_never_contribute() {
        let ledger = vec![
            row(
                "2024",
                Section::Ativo,
                None,
                Some("Receita Bruta"),
                Some(999_999.0),
            ),
            row(
                "2024",
                Section::Passivo,
                None,
                Some("Despesas Administrativas"),
                Some(888_888.0),
            ),
        ];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        assert!(report.by_period.is_empty());
    }

    #[test]
    fn test_description_match_without_section_or_classification() {
        let ledger = vec![
            row(
                "2024",
                Section::Outros,
                None,
                Some("ICMS sobre Vendas"),
                Some(-5_000.0),
            ),
            row(
                "2024",
                Section::Outros,
                None,
                Some("Material de Escritorio"),
                Some(-1_000.0),
            ),
        ];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let kpi = &report.by_period[0];

        // only the ICMS row is relevant, and it lands in deductions
        assert_eq!(kpi.deductions, 5_000.0);
        assert_eq!(kpi.buckets.len(), 0);
    }

    #[test]
    fn test_catch_all_expense_vocabulary_overlaps_named_groups() {
        let ledger = vec![
            row(
                "2024",
                Section::Dre,
                Some("3.1"),
                Some("Receita Bruta"),
                Some(100_000.0),
            ),
            row(
                "2024",
                Section::Dre,
                Some("3.7.1"),
                Some("Despesas Administrativas"),
                Some(-20_000.0),
            ),
            row(
                "2024",
                Section::Dre,
                Some("3.6.1"),
                Some("Despesas Comerciais"),
                Some(-10_000.0),
            ),
        ];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let kpi = &report.by_period[0];

        assert_eq!(kpi.admin_expenses, 20_000.0);
        assert_eq!(kpi.commercial_expenses, 10_000.0);
        // the bare DESPESAS pattern re-captures both named expense groups
        assert_eq!(kpi.other_expenses, 30_000.0);
        assert_eq!(kpi.operating_result, Some(40_000.0));
    }

    #[test]
    fn test_margins_null_without_revenue() {
        let ledger = vec![row(
            "2024",
            Section::Dre,
            Some("3.3.01"),
            Some("Custo das Mercadorias"),
            Some(-50_000.0),
        )];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let kpi = &report.by_period[0];

        assert_eq!(kpi.cost_of_goods_or_services, 50_000.0);
        assert_eq!(kpi.gross_profit, None);
        assert_eq!(kpi.operating_result, None);
        assert_eq!(kpi.net_profit, None);
        assert_eq!(kpi.gross_margin_pct, None);
        assert_eq!(kpi.net_margin_pct, None);
    }

    #[test]
    fn test_buckets_signed_totals_sorted_by_magnitude() {
        let ledger = vec![
            row("2024", Section::Dre, Some("3.1.01"), Some("Vendas"), Some(100.0)),
            row("2024", Section::Dre, Some("3.1.02"), Some("Servicos"), Some(50.0)),
            row("2024", Section::Dre, Some("3.3.01"), Some("CMV"), Some(-400.0)),
        ];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let buckets = &report.by_period[0].buckets;

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].bucket_key, "3.3");
        assert_eq!(buckets[0].total, -400.0);
        assert_eq!(buckets[0].line_count, 1);
        assert_eq!(buckets[1].bucket_key, "3.1");
        assert_eq!(buckets[1].total, 150.0);
        assert_eq!(buckets[1].line_count, 2);
    }

    #[test]
    fn test_periods_keep_first_seen_order() {
        let ledger = vec![
            row("T2/2024", Section::Dre, Some("3.1"), Some("Vendas"), Some(10.0)),
            row("T1/2024", Section::Dre, Some("3.1"), Some("Vendas"), Some(20.0)),
            row("T2/2024", Section::Dre, Some("3.2"), Some("ICMS"), Some(-1.0)),
        ];

        let report = compute_period_kpis(&ledger, &KpiConfig::default());
        let periods: Vec<&str> = report
            .by_period
            .iter()
            .map(|p| p.period.as_str())
            .collect();
        assert_eq!(periods, vec!["T2/2024", "T1/2024"]);
    }

    #[test]
    fn test_custom_vocabulary_override() {
        let cfg = KpiConfig {
            gross_revenue_terms: terms(&["ENTRADAS"]),
            ..KpiConfig::default()
        };
        let ledger = vec![row(
            "2024",
            Section::Dre,
            None,
            Some("Entradas do Mes"),
            Some(700.0),
        )];

        let report = compute_period_kpis(&ledger, &cfg);
        assert_eq!(report.by_period[0].gross_revenue, 700.0);
    }
}
