//! Period-label resolution.
//!
//! Each file resolves to one opaque period label ("T1/2024", "2024-05",
//! "2024", or the file name as a last resort). Labels are only ever compared
//! for identity; no calendar arithmetic happens downstream.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{PeriodMode, StatementDocument};

static YEAR_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

static PERIOD_RANGE_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)PER[IÍ]ODO[:\s]*([0-3]\d/[01]\d/\d{4})\s*[-–]\s*([0-3]\d/[01]\d/\d{4})")
        .unwrap()
});

static RANGE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})\.\.(\d{2})/(\d{2})/(\d{4})$").unwrap());

/// Month numbers hiding in file names: `_05`, `-05`, `M05`, `MES 05`.
static MONTH_TOKEN_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\bM(?:ES)?\s*|[_-])([01]\d)\b").unwrap());

static QUARTER_TRIM_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d)\s*TRIM").unwrap());

static QUARTER_T_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bT([1-4])\b").unwrap());

const MONTH_NAMES: [(&str, &str); 12] = [
    ("JAN", "01"),
    ("FEV", "02"),
    ("MAR", "03"),
    ("ABR", "04"),
    ("MAI", "05"),
    ("JUN", "06"),
    ("JUL", "07"),
    ("AGO", "08"),
    ("SET", "09"),
    ("OUT", "10"),
    ("NOV", "11"),
    ("DEZ", "12"),
];

pub(crate) fn year_from_text(text: &str) -> Option<i32> {
    YEAR_IN_TEXT.find(text).and_then(|m| m.as_str().parse().ok())
}

/// The year for a document: the extractor's guess when present, else the
/// first plausible year token in the text.
pub fn detect_year(doc: &StatementDocument) -> Option<i32> {
    doc.detected_year.or_else(|| year_from_text(&doc.text))
}

fn range_from_text(text: &str) -> Option<String> {
    PERIOD_RANGE_IN_TEXT
        .captures(text)
        .map(|c| format!("{}..{}", &c[1], &c[2]))
}

/// A `dd/mm/yyyy..dd/mm/yyyy` range becomes a monthly label only when it
/// starts and ends in the same month of the same year.
fn monthly_label_from_range(range: &str) -> Option<String> {
    let c = RANGE_LABEL.captures(range)?;
    if c[2] == c[5] && c[3] == c[6] {
        Some(format!("{}-{}", &c[3], &c[2]))
    } else {
        None
    }
}

fn month_from_file_name(name_upper: &str) -> Option<String> {
    for (token, number) in MONTH_NAMES {
        if name_upper.contains(token) {
            return Some(number.to_string());
        }
    }

    let c = MONTH_TOKEN_IN_NAME.captures(name_upper)?;
    let month: u32 = c[1].parse().ok()?;
    if (1..=12).contains(&month) {
        Some(format!("{month:02}"))
    } else {
        None
    }
}

/// Resolves the period label for one document under the requested mode,
/// falling back to the file name when nothing else resolves.
pub fn resolve_period_label(doc: &StatementDocument, mode: PeriodMode) -> String {
    let name_upper = doc.file_name.to_uppercase();
    let year = detect_year(doc);

    match mode {
        PeriodMode::Anual => year
            .map(|y| y.to_string())
            .unwrap_or_else(|| doc.file_name.clone()),

        PeriodMode::Mensal => {
            if let Some(range) = range_from_text(&doc.text) {
                if let Some(label) = monthly_label_from_range(&range) {
                    return label;
                }
            }

            if let (Some(month), Some(y)) = (month_from_file_name(&name_upper), year) {
                return format!("{y}-{month}");
            }

            year.map(|y| y.to_string())
                .unwrap_or_else(|| doc.file_name.clone())
        }

        PeriodMode::Trimestral => {
            if let Some(y) = year {
                if let Some(c) = QUARTER_TRIM_IN_NAME.captures(&name_upper) {
                    return format!("T{}/{}", &c[1], y);
                }
                if let Some(c) = QUARTER_T_IN_NAME.captures(&name_upper) {
                    return format!("T{}/{}", &c[1], y);
                }
            }

            if let Some(range) = range_from_text(&doc.text) {
                return range;
            }

            year.map(|y| y.to_string())
                .unwrap_or_else(|| doc.file_name.clone())
        }
    }
}
