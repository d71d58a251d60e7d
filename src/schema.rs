use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AnalysisError;

/// Statement section a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    #[schemars(description = "Assets")]
    Ativo,

    #[schemars(description = "Liabilities and equity")]
    Passivo,

    #[schemars(description = "Income statement (revenue, costs, expenses, profit)")]
    Dre,

    #[schemars(description = "Unclassified lines with no resolved section")]
    Outros,
}

/// How period labels are resolved from each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PeriodMode {
    Mensal,
    Trimestral,
    Anual,
}

impl FromStr for PeriodMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mensal" => Ok(PeriodMode::Mensal),
            "trimestral" => Ok(PeriodMode::Trimestral),
            "anual" => Ok(PeriodMode::Anual),
            other => Err(AnalysisError::InvalidPeriodMode(other.to_string())),
        }
    }
}

impl fmt::Display for PeriodMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodMode::Mensal => write!(f, "mensal"),
            PeriodMode::Trimestral => write!(f, "trimestral"),
            PeriodMode::Anual => write!(f, "anual"),
        }
    }
}

/// One uploaded statement, already decoded to plain text by the upstream
/// extractor. The core never touches document bytes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementDocument {
    pub file_name: String,

    pub text: String,

    /// Page count reported by the extractor, echoed into the report.
    #[serde(default)]
    pub pages: u32,

    /// Year guessed upstream (usually from the file name).
    #[serde(default)]
    pub detected_year: Option<i32>,
}

impl StatementDocument {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
            pages: 0,
            detected_year: None,
        }
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_detected_year(mut self, year: i32) -> Self {
        self.detected_year = Some(year);
        self
    }
}

/// One classified accounting line. Immutable once produced; ownership moves
/// to the base normalizer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub raw_line: String,
    pub section: Section,
    pub code: Option<String>,
    pub classification: Option<String>,
    pub description: Option<String>,
    pub current_balance: Option<f64>,
    pub prior_balance: Option<f64>,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
}

/// Classifier output for one document's text.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedText {
    pub lines: Vec<StatementLine>,
    pub warnings: Vec<String>,
}

/// One canonical ledger row, tagged with the resolving file's period/year.
/// The concatenation of rows across files, in file-submission order, forms
/// the ledger: append-only, never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub period: String,
    pub year: Option<i32>,
    pub section: Section,
    pub code: Option<String>,
    pub classification: Option<String>,
    pub description: Option<String>,
    pub current_balance: Option<f64>,
    pub prior_balance: Option<f64>,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
}

impl NormalizedRow {
    /// The first non-negligible figure among current balance, prior balance
    /// and debit minus credit. Source documents are inconsistent about which
    /// column carries the meaningful amount.
    pub fn effective_value(&self, near_zero: f64) -> f64 {
        let current = self.current_balance.unwrap_or(0.0);
        if current.abs() > near_zero {
            return current;
        }

        let prior = self.prior_balance.unwrap_or(0.0);
        if prior.abs() > near_zero {
            return prior;
        }

        let debit = self.debit.unwrap_or(0.0);
        let credit = self.credit.unwrap_or(0.0);
        if debit.abs() > near_zero || credit.abs() > near_zero {
            return debit - credit;
        }

        0.0
    }
}

/// Signed total of one coarse classification bucket within a period.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketTotal {
    pub bucket_key: String,
    pub total: f64,
    pub line_count: usize,
}

/// Profit-and-loss waterfall for one period. All monetary fields are derived,
/// never input; optional fields are `None` when their preconditions make the
/// computation undefined.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodKpi {
    pub period: String,
    pub year: Option<i32>,
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub deductions: f64,
    pub cost_of_goods_or_services: f64,
    pub admin_expenses: f64,
    pub commercial_expenses: f64,
    pub other_expenses: f64,
    pub gross_profit: Option<f64>,
    pub operating_result: Option<f64>,
    pub net_profit: Option<f64>,
    pub gross_margin_pct: Option<f64>,
    pub net_margin_pct: Option<f64>,
    pub buckets: Vec<BucketTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiReport {
    pub by_period: Vec<PeriodKpi>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_files: usize,
    pub years_detected: Vec<i32>,
    pub warnings: Vec<String>,
    pub rows_detected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub pages: u32,
    pub detected_year: Option<i32>,
    pub sample: String,
}

/// Per-section totals of one file, for the simple KPI/series views.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionKpiBlock {
    pub ativo_total: f64,
    pub passivo_total: f64,
    pub dre_total: f64,
    pub linhas_detectadas: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSectionKpis {
    pub period: String,
    pub kpis: SectionKpiBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionKpis {
    pub by_period: Vec<PeriodSectionKpis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub period: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesBlock {
    pub ativo_total: Vec<SeriesPoint>,
    pub passivo_total: Vec<SeriesPoint>,
    pub dre_total: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub code: Option<String>,
    pub description: Option<String>,
    pub value: f64,
    pub period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VarianceEntry {
    pub key: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub from: String,
    pub to: String,
    pub delta: f64,
    pub delta_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rankings {
    pub top_saldos_ativo: Vec<BalanceEntry>,
    pub top_saldos_passivo: Vec<BalanceEntry>,
    pub top_variacoes: Vec<VarianceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

/// Compact per-period P&L snapshot for chart consumers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSnapshot {
    pub receita_liquida: f64,
    pub desp_admin: f64,
    pub lucro_liquido: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LabeledValue {
    pub label: String,
    pub value: f64,
}

/// The combined result of one analysis run. JSON field names follow the
/// external contract consumed by the report renderer and chart views.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub summary: Summary,

    pub files: Vec<FileInfo>,

    #[serde(rename = "baseNormalizada")]
    pub ledger: Vec<NormalizedRow>,

    #[serde(rename = "tccKpis")]
    pub profit_kpis: KpiReport,

    pub kpis: SectionKpis,

    pub series: SeriesBlock,

    pub rankings: Rankings,

    pub alerts: Vec<Alert>,

    #[serde(rename = "periodos")]
    pub periods: Vec<String>,

    #[serde(rename = "kpisPorPeriodo")]
    pub period_kpi_map: BTreeMap<String, PeriodSnapshot>,

    #[serde(rename = "distribuicaoGrupos")]
    pub section_distribution: BTreeMap<String, f64>,

    #[serde(rename = "topGastos")]
    pub top_expenses: Vec<LabeledValue>,
}

/// The P&L-only projection of a full report, for consumers that chart the
/// waterfall and the expense ranking without the rest of the payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProfitKpiView {
    #[serde(rename = "tccKpis")]
    pub profit_kpis: KpiReport,

    #[serde(rename = "periodos")]
    pub periods: Vec<String>,

    #[serde(rename = "kpisPorPeriodo")]
    pub period_kpi_map: BTreeMap<String, PeriodSnapshot>,

    #[serde(rename = "distribuicaoGrupos")]
    pub section_distribution: BTreeMap<String, f64>,

    #[serde(rename = "topGastos")]
    pub top_expenses: Vec<LabeledValue>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn profit_view(&self) -> ProfitKpiView {
        ProfitKpiView {
            profit_kpis: self.profit_kpis.clone(),
            periods: self.periods.clone(),
            period_kpi_map: self.period_kpi_map.clone(),
            section_distribution: self.section_distribution.clone(),
            top_expenses: self.top_expenses.clone(),
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisReport)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
