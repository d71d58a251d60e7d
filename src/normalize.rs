//! Base normalizer: statement lines plus their file's resolved period/year
//! become canonical ledger rows.

use crate::schema::{ClassifiedText, NormalizedRow};

fn clean_opt(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Pure mapping from classified lines to period-tagged ledger rows. Rows
/// carrying neither an identifying field nor any numeric value are dropped;
/// numeric values pass through unrounded (rounding happens at consumption).
pub fn build_normalized_rows(
    parsed: &ClassifiedText,
    period: &str,
    year: Option<i32>,
) -> Vec<NormalizedRow> {
    parsed
        .lines
        .iter()
        .filter_map(|line| {
            let code = clean_opt(line.code.as_deref());
            let classification = clean_opt(line.classification.as_deref());
            let description = clean_opt(line.description.as_deref());

            let has_id = code.is_some() || classification.is_some() || description.is_some();
            let has_value = line.current_balance.is_some()
                || line.prior_balance.is_some()
                || line.debit.is_some()
                || line.credit.is_some();

            if !has_id && !has_value {
                return None;
            }

            Some(NormalizedRow {
                period: period.to_string(),
                year,
                section: line.section,
                code,
                classification,
                description,
                current_balance: line.current_balance,
                prior_balance: line.prior_balance,
                debit: line.debit,
                credit: line.credit,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Section, StatementLine};

    fn line(
        code: Option<&str>,
        description: Option<&str>,
        current_balance: Option<f64>,
    ) -> StatementLine {
        StatementLine {
            raw_line: String::new(),
            section: Section::Outros,
            code: code.map(str::to_string),
            classification: None,
            description: description.map(str::to_string),
            current_balance,
            prior_balance: None,
            debit: None,
            credit: None,
        }
    }

    #[test]
    fn test_rows_are_tagged_with_period_and_year() {
        let parsed = ClassifiedText {
            lines: vec![line(Some("11"), Some("Caixa"), Some(100.0))],
            warnings: Vec::new(),
        };

        let rows = build_normalized_rows(&parsed, "T1/2024", Some(2024));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, "T1/2024");
        assert_eq!(rows[0].year, Some(2024));
        assert_eq!(rows[0].current_balance, Some(100.0));
    }

    #[test]
    fn test_rows_without_id_and_values_are_dropped() {
        let parsed = ClassifiedText {
            lines: vec![
                line(None, None, None),
                line(None, Some("   "), None),
                line(None, None, Some(0.0)),
                line(None, Some("Caixa"), None),
            ],
            warnings: Vec::new(),
        };

        let rows = build_normalized_rows(&parsed, "2024", None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].current_balance, Some(0.0));
        assert_eq!(rows[1].description.as_deref(), Some("Caixa"));
    }

    #[test]
    fn test_blank_identifiers_become_none() {
        let parsed = ClassifiedText {
            lines: vec![line(Some("  11  "), Some(""), Some(5.0))],
            warnings: Vec::new(),
        };

        let rows = build_normalized_rows(&parsed, "2024", None);
        assert_eq!(rows[0].code.as_deref(), Some("11"));
        assert_eq!(rows[0].description, None);
    }
}
