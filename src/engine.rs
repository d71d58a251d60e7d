//! Orchestrator: drives per-file classification and normalization, builds
//! the ledger, and assembles the combined analysis report.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::classifier::classify_statement_text;
use crate::error::{AnalysisError, Result};
use crate::kpi::{compute_period_kpis, KpiConfig};
use crate::normalize::build_normalized_rows;
use crate::period::{detect_year, resolve_period_label};
use crate::ranking::{sort_top_n, top_balances, top_variances, RankingConfig};
use crate::schema::{
    Alert, AlertLevel, AnalysisReport, FileInfo, LabeledValue, NormalizedRow, PeriodMode,
    PeriodSectionKpis, PeriodSnapshot, Rankings, Section, SectionKpiBlock, SectionKpis,
    SeriesBlock, SeriesPoint, StatementDocument, Summary,
};
use crate::utils::round2;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub kpi: KpiConfig,
    pub ranking: RankingConfig,

    /// Characters of each file's text echoed into the report.
    pub sample_len: usize,

    /// Variance percentage at or above which the top-variance alert is a
    /// warning instead of informational.
    pub variance_alert_pct: f64,

    pub top_expenses: usize,

    /// Aggregated expense values below this are dropped from the ranking.
    pub min_expense_value: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            kpi: KpiConfig::default(),
            ranking: RankingConfig::default(),
            sample_len: 1200,
            variance_alert_pct: 50.0,
            top_expenses: 10,
            min_expense_value: 0.01,
        }
    }
}

struct FileWork {
    period: String,
    year: Option<i32>,
    line_count: usize,
    sums: SectionSums,
}

#[derive(Debug, Clone, Copy, Default)]
struct SectionSums {
    ativo: f64,
    passivo: f64,
    dre: f64,
}

pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline over the given documents: classification and
    /// normalization per file, then section sums, KPI and ranking engines
    /// over the concatenated ledger, and report assembly.
    pub fn analyze(
        &self,
        documents: &[StatementDocument],
        mode: PeriodMode,
    ) -> Result<AnalysisReport> {
        if documents.is_empty() {
            return Err(AnalysisError::NoDocuments);
        }

        info!(
            "Analyzing {} statement document(s) in {} mode",
            documents.len(),
            mode
        );

        let files: Vec<FileInfo> = documents
            .iter()
            .map(|doc| FileInfo {
                file_name: doc.file_name.clone(),
                pages: doc.pages,
                detected_year: doc.detected_year,
                sample: self.sample_of(&doc.text),
            })
            .collect();

        let mut warnings: Vec<String> = Vec::new();
        let mut per_file: Vec<FileWork> = Vec::new();
        let mut ledger: Vec<NormalizedRow> = Vec::new();

        for doc in documents {
            let period = resolve_period_label(doc, mode);
            let year = detect_year(doc);

            let classified = classify_statement_text(&doc.text);
            for w in &classified.warnings {
                warnings.push(format!("[{}] {}", doc.file_name, w));
            }

            let rows = build_normalized_rows(&classified, &period, year);
            let sums = section_sums(&rows, self.config.ranking.near_zero);

            per_file.push(FileWork {
                period,
                year,
                line_count: classified.lines.len(),
                sums,
            });
            ledger.extend(rows);
        }

        debug!(
            "Ledger carries {} rows from {} file(s)",
            ledger.len(),
            per_file.len()
        );

        let profit_kpis = compute_period_kpis(&ledger, &self.config.kpi);

        let rankings = Rankings {
            top_saldos_ativo: top_balances(&ledger, Section::Ativo, &self.config.ranking),
            top_saldos_passivo: top_balances(&ledger, Section::Passivo, &self.config.ranking),
            top_variacoes: top_variances(&ledger, &self.config.ranking),
        };

        let mut alerts: Vec<Alert> = Vec::new();

        let distinct_periods = {
            let mut seen: Vec<&str> = Vec::new();
            for f in &per_file {
                if !seen.contains(&f.period.as_str()) {
                    seen.push(&f.period);
                }
            }
            seen.len()
        };
        if distinct_periods < 2 {
            alerts.push(Alert {
                level: AlertLevel::Info,
                message: "At least two distinct periods are required for cross-period comparison"
                    .to_string(),
            });
        }

        if let Some(top) = rankings.top_variacoes.first() {
            let subject = top
                .description
                .clone()
                .or_else(|| top.code.clone())
                .unwrap_or_else(|| "Conta".to_string());

            match top.delta_pct {
                Some(pct) if pct.abs() >= self.config.variance_alert_pct => {
                    alerts.push(Alert {
                        level: AlertLevel::Warning,
                        message: format!(
                            "Large variance detected: {} changed {}% ({} -> {})",
                            subject, pct, top.from, top.to
                        ),
                    });
                }
                _ => {
                    alerts.push(Alert {
                        level: AlertLevel::Info,
                        message: format!(
                            "Largest variance in the period: {} ({} -> {})",
                            subject, top.from, top.to
                        ),
                    });
                }
            }
        }

        for note in &profit_kpis.notes {
            alerts.push(Alert {
                level: AlertLevel::Info,
                message: note.clone(),
            });
        }

        let mut years_detected: Vec<i32> = per_file.iter().filter_map(|f| f.year).collect();
        years_detected.sort_unstable();
        years_detected.dedup();

        let rows_detected = per_file.iter().map(|f| f.line_count).sum();

        let kpis = SectionKpis {
            by_period: per_file
                .iter()
                .map(|f| PeriodSectionKpis {
                    period: f.period.clone(),
                    kpis: SectionKpiBlock {
                        ativo_total: f.sums.ativo,
                        passivo_total: f.sums.passivo,
                        dre_total: f.sums.dre,
                        linhas_detectadas: f.line_count,
                    },
                })
                .collect(),
        };

        let series = SeriesBlock {
            ativo_total: series_of(&per_file, |s| s.ativo),
            passivo_total: series_of(&per_file, |s| s.passivo),
            dre_total: series_of(&per_file, |s| s.dre),
        };

        let periods: Vec<String> = per_file.iter().map(|f| f.period.clone()).collect();

        let mut period_kpi_map: BTreeMap<String, PeriodSnapshot> = BTreeMap::new();
        for kpi in &profit_kpis.by_period {
            period_kpi_map.insert(
                kpi.period.clone(),
                PeriodSnapshot {
                    receita_liquida: kpi.net_revenue,
                    desp_admin: kpi.admin_expenses,
                    lucro_liquido: kpi.net_profit.unwrap_or(0.0),
                },
            );
        }

        let mut section_distribution: BTreeMap<String, f64> = BTreeMap::new();
        if let Some(last) = per_file.last() {
            section_distribution.insert("ATIVO".to_string(), last.sums.ativo);
            section_distribution.insert("PASSIVO".to_string(), last.sums.passivo);
            section_distribution.insert("DRE".to_string(), last.sums.dre);
        }

        let last_period = ledger.last().map(|r| r.period.clone());
        let top_expenses = self.top_expense_list(&ledger, last_period.as_deref());

        Ok(AnalysisReport {
            summary: Summary {
                total_files: documents.len(),
                years_detected,
                warnings,
                rows_detected,
            },
            files,
            ledger,
            profit_kpis,
            kpis,
            series,
            rankings,
            alerts,
            periods,
            period_kpi_map,
            section_distribution,
            top_expenses,
        })
    }

    fn sample_of(&self, text: &str) -> String {
        let sample: String = text.chars().take(self.config.sample_len).collect();
        if sample.is_empty() {
            "(no text extracted)".to_string()
        } else {
            sample
        }
    }

    /// Last-period rows that look like expenses, aggregated by
    /// classification/description and ranked by absolute magnitude.
    fn top_expense_list(
        &self,
        ledger: &[NormalizedRow],
        last_period: Option<&str>,
    ) -> Vec<LabeledValue> {
        let Some(last_period) = last_period else {
            return Vec::new();
        };

        let mut order: Vec<String> = Vec::new();
        let mut totals: std::collections::HashMap<String, LabeledValue> =
            std::collections::HashMap::new();

        for row in ledger.iter().filter(|r| r.period == last_period) {
            let raw = row
                .debit
                .or(row.current_balance)
                .or(row.credit)
                .or(row.prior_balance)
                .unwrap_or(0.0);

            let value = raw.abs();
            if value < self.config.min_expense_value {
                continue;
            }
            if !likely_expense(row.description.as_deref()) {
                continue;
            }

            let key = format!(
                "{}|{}",
                row.classification.as_deref().unwrap_or(""),
                row.description.as_deref().unwrap_or("")
            )
            .to_uppercase();

            if !totals.contains_key(&key) {
                order.push(key.clone());
            }
            let entry = totals.entry(key).or_insert_with(|| LabeledValue {
                label: expense_label(row),
                value: 0.0,
            });
            entry.value = round2(entry.value + value);
        }

        let mut list: Vec<LabeledValue> = order
            .into_iter()
            .filter_map(|key| totals.remove(&key))
            .collect();
        sort_top_n(&mut list, self.config.top_expenses, |e| e.value);
        list
    }
}

fn section_sums(rows: &[NormalizedRow], near_zero: f64) -> SectionSums {
    let mut sums = SectionSums::default();
    for row in rows {
        let value = row.effective_value(near_zero);
        match row.section {
            Section::Ativo => sums.ativo += value,
            Section::Passivo => sums.passivo += value,
            Section::Dre => sums.dre += value,
            Section::Outros => {}
        }
    }

    SectionSums {
        ativo: round2(sums.ativo),
        passivo: round2(sums.passivo),
        dre: round2(sums.dre),
    }
}

fn series_of(per_file: &[FileWork], pick: impl Fn(&SectionSums) -> f64) -> Vec<SeriesPoint> {
    per_file
        .iter()
        .map(|f| SeriesPoint {
            period: f.period.clone(),
            value: pick(&f.sums),
        })
        .collect()
}

/// Everything in the last period counts as a candidate expense unless the
/// description is empty or revenue-shaped.
fn likely_expense(description: Option<&str>) -> bool {
    let desc = description.unwrap_or("").to_uppercase();
    if desc.trim().is_empty() {
        return false;
    }
    !(desc.contains("RECEITA") || desc.contains("FATUR"))
}

fn expense_label(row: &NormalizedRow) -> String {
    let classification = row.classification.as_deref().map(str::trim).unwrap_or("");
    let description = row.description.as_deref().map(str::trim).unwrap_or("");

    match (classification.is_empty(), description.is_empty()) {
        (false, false) => format!("{classification} — {description}"),
        (true, false) => description.to_string(),
        (false, true) => classification.to_string(),
        (true, true) => "Conta".to_string(),
    }
}
