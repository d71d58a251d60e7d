//! # Balancete Analyzer
//!
//! Converts unstructured plain text extracted from balancete statements
//! (periodic trial balances) into a structured, period-indexed ledger, then
//! derives profit-and-loss indicators, cross-period variances, and ranked
//! exposures from that ledger.
//!
//! ## Core Concepts
//!
//! - **Statement document**: one uploaded file, already decoded to plain
//!   text by an upstream extractor
//! - **Ledger**: the ordered concatenation of every file's normalized rows,
//!   never mutated after construction
//! - **Section**: ATIVO (assets), PASSIVO (liabilities and equity), DRE
//!   (income statement), OUTROS (unclassified)
//! - **Effective value**: the first meaningful figure among a row's current
//!   balance, prior balance, or debit minus credit
//! - **Layered matching**: every P&L figure is resolved by keyword match
//!   first, then coarse classification bucket, then literal prefix
//!
//! The pipeline is pure and synchronous: identical inputs produce
//! byte-identical output, and no I/O happens inside any component.
//!
//! ## Example
//!
//! ```rust
//! use balancete_analyzer::{analyze_statements, PeriodMode, StatementDocument};
//!
//! let documents = vec![StatementDocument::new(
//!     "balancete_2024.txt",
//!     "ATIVO\n11 1.1 Caixa Geral 1.000,00 900,00\n",
//! )
//! .with_detected_year(2024)];
//!
//! let report = analyze_statements(&documents, PeriodMode::Anual).unwrap();
//! assert_eq!(report.summary.total_files, 1);
//! assert_eq!(report.periods, vec!["2024".to_string()]);
//! ```

pub mod classification;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod kpi;
pub mod normalize;
pub mod period;
pub mod ranking;
pub mod schema;
pub mod utils;

pub use classification::{bucket_key, normalize_classification};
pub use classifier::classify_statement_text;
pub use engine::{Analyzer, AnalyzerConfig};
pub use error::{AnalysisError, Result};
pub use kpi::{compute_period_kpis, KpiConfig};
pub use normalize::build_normalized_rows;
pub use period::{detect_year, resolve_period_label};
pub use ranking::{composite_key, top_balances, top_variances, RankingConfig};
pub use schema::*;

/// Runs the full analysis pipeline with the default configuration.
pub fn analyze_statements(
    documents: &[StatementDocument],
    mode: PeriodMode,
) -> Result<AnalysisReport> {
    Analyzer::default().analyze(documents, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarterly_doc(name: &str, revenue: &str, admin: &str) -> StatementDocument {
        let text = format!(
            "EMPRESA MODELO LTDA\nDRE\n31 3.1 Receita Bruta de Vendas {revenue} 0,00\n37 3.7.1 Despesas Administrativas ({admin}) 0,00\n"
        );
        StatementDocument::new(name, text).with_detected_year(2024)
    }

    #[test]
    fn test_end_to_end_two_quarters() {
        let documents = vec![
            quarterly_doc("balancete-T1-2024.pdf", "100.000,00", "20.000,00"),
            quarterly_doc("balancete-T4-2024.pdf", "90.000,00", "23.000,00"),
        ];

        let report = analyze_statements(&documents, PeriodMode::Trimestral).unwrap();

        assert_eq!(report.summary.total_files, 2);
        assert_eq!(report.summary.rows_detected, 4);
        assert_eq!(report.summary.years_detected, vec![2024]);
        assert_eq!(report.periods, vec!["T1/2024", "T4/2024"]);

        let t1 = &report.profit_kpis.by_period[0];
        assert_eq!(t1.period, "T1/2024");
        assert_eq!(t1.gross_revenue, 100_000.0);
        assert_eq!(t1.admin_expenses, 20_000.0);

        let revenue_delta = report
            .rankings
            .top_variacoes
            .iter()
            .find(|v| v.key == "C:31|D:RECEITA BRUTA DE VENDAS")
            .unwrap();
        assert_eq!(revenue_delta.delta, -10_000.0);
        assert_eq!(revenue_delta.delta_pct, Some(-10.0));
    }

    #[test]
    fn test_deterministic_output() {
        let documents = vec![
            quarterly_doc("balancete-T1-2024.pdf", "100.000,00", "20.000,00"),
            quarterly_doc("balancete-T4-2024.pdf", "90.000,00", "23.000,00"),
        ];

        let first = analyze_statements(&documents, PeriodMode::Trimestral)
            .unwrap()
            .to_json()
            .unwrap();
        let second = analyze_statements(&documents, PeriodMode::Trimestral)
            .unwrap()
            .to_json()
            .unwrap();

        assert_eq!(first, second);
    }
}
