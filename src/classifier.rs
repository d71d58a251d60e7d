//! Line classifier: turns one document's free text into statement lines.
//!
//! Balancete layouts vary wildly between accounting systems, so the
//! classifier works from weak textual cues: a line is a data row only when it
//! carries at least two monetary tokens, and its section comes from the last
//! section header seen above it, falling back to the classification code's
//! first digit.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{ClassifiedText, Section, StatementLine};
use crate::utils::clean_spaces;

/// Accepts `1.234,56`, `-1.234,56`, `(1.234,56)` and `1.234,56-`.
static MONEY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(?-?\d{1,3}(?:\.\d{3})*,\d{2}\)?-?").unwrap());

static LEADING_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,6})\s+(.*)$").unwrap());

static CLASSIFICATION_AT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}(?:\.\d{1,3})+)\s+(.*)$").unwrap());

static CLASSIFICATION_ANYWHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:\.\d{1,3})+)\b").unwrap());

pub(crate) fn parse_money(token: &str) -> Option<f64> {
    let raw = clean_spaces(token);
    if raw.is_empty() {
        return None;
    }

    let mut sign = 1.0;
    if raw.starts_with('(') && raw.ends_with(')') {
        sign = -1.0;
    }
    if raw.ends_with('-') {
        sign = -1.0;
    }
    if raw.starts_with('-') {
        sign = -1.0;
    }

    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '-'))
        .collect();
    let normalized = digits.trim().replace('.', "").replace(',', ".");

    normalized.parse::<f64>().ok().map(|v| v * sign)
}

fn detect_section_header(line: &str) -> Option<Section> {
    let up = clean_spaces(line).to_uppercase();

    if up == "ATIVO" || up.starts_with("ATIVO ") {
        return Some(Section::Ativo);
    }
    if up == "PASSIVO" || up.starts_with("PASSIVO ") {
        return Some(Section::Passivo);
    }
    if up == "DRE" || up.contains("DEMONSTRA") || up.contains("RESULTADO") || up.contains("D.R.E") {
        return Some(Section::Dre);
    }

    None
}

/// Column headers and letterhead lines carry no accounting data.
fn is_letterhead_line(line: &str) -> bool {
    let up = clean_spaces(line).to_uppercase();

    if up.contains("CÓDIGO") && up.contains("DESCRI") && up.contains("SALDO") {
        return true;
    }
    if up.contains("CODIGO") && up.contains("DESCRI") && up.contains("SALDO") {
        return true;
    }

    up.starts_with("EMPRESA") || up.starts_with("BALANCETE") || up.contains("PÁGINA")
}

fn extract_leading_code(s: &str) -> (Option<String>, String) {
    match LEADING_CODE.captures(s) {
        Some(c) => (Some(c[1].to_string()), c[2].trim().to_string()),
        None => (None, s.trim().to_string()),
    }
}

fn extract_classification(s: &str) -> (Option<String>, String) {
    let txt = clean_spaces(s);

    if let Some(c) = CLASSIFICATION_AT_START.captures(&txt) {
        return (Some(c[1].to_string()), c[2].trim().to_string());
    }

    if let Some(m) = CLASSIFICATION_ANYWHERE.find(&txt) {
        let cls = m.as_str().to_string();
        let rest = clean_spaces(&txt.replacen(&cls, "", 1));
        return (Some(cls), rest);
    }

    (None, txt)
}

fn infer_section(classification: Option<&str>) -> Option<Section> {
    match classification?.trim().chars().next()? {
        '1' => Some(Section::Ativo),
        '2' => Some(Section::Passivo),
        '3' => Some(Section::Dre),
        _ => None,
    }
}

/// Last 2 to 4 monetary tokens map positionally onto the statement columns;
/// anything before them is extraneous text that happened to look numeric.
fn map_money_tokens(values: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
    let tail = &values[values.len().saturating_sub(4)..];
    let get = |i: usize| tail.get(i).copied();

    match tail.len() {
        4 => (get(0), get(1), get(2), get(3)),
        3 => (get(0), get(1), get(2), None),
        2 => (get(0), get(1), None, None),
        _ => (get(0), None, None, None),
    }
}

enum LineOutcome {
    SectionHeader(Section),
    Skipped,
    Data(Box<StatementLine>),
}

fn classify_line(raw: &str, current: Section) -> LineOutcome {
    let line = clean_spaces(raw);

    if let Some(section) = detect_section_header(&line) {
        return LineOutcome::SectionHeader(section);
    }
    if is_letterhead_line(&line) {
        return LineOutcome::Skipped;
    }

    let matches: Vec<regex::Match<'_>> = MONEY_TOKEN.find_iter(&line).collect();
    if matches.len() < 2 {
        return LineOutcome::Skipped;
    }

    let values: Vec<f64> = matches.iter().filter_map(|m| parse_money(m.as_str())).collect();
    let (current_balance, prior_balance, debit, credit) = map_money_tokens(&values);

    // The head text ends at the first monetary token, otherwise a large
    // amount like 3.518.993,00 would be mistaken for a classification code.
    let head = clean_spaces(&line[..matches[0].start()]);
    let (code, rest) = extract_leading_code(&head);
    let (classification, desc_rest) = extract_classification(&rest);
    let description = clean_spaces(&desc_rest);

    let section = if current != Section::Outros {
        current
    } else {
        infer_section(classification.as_deref()).unwrap_or(current)
    };

    LineOutcome::Data(Box::new(StatementLine {
        raw_line: line,
        section,
        code,
        classification,
        description: if description.is_empty() {
            None
        } else {
            Some(description)
        },
        current_balance,
        prior_balance,
        debit,
        credit,
    }))
}

/// Classifies every line of one document's text, threading the sticky
/// section context through a single pass as an explicit accumulator.
pub fn classify_statement_text(text: &str) -> ClassifiedText {
    let mut warnings = Vec::new();

    if text.trim().is_empty() {
        warnings.push("Empty text extracted from document".to_string());
        return ClassifiedText {
            lines: Vec::new(),
            warnings,
        };
    }

    let (lines, _) = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .fold(
            (Vec::new(), Section::Outros),
            |(mut acc, current), raw| match classify_line(raw, current) {
                LineOutcome::SectionHeader(section) => (acc, section),
                LineOutcome::Skipped => (acc, current),
                LineOutcome::Data(line) => {
                    acc.push(*line);
                    (acc, current)
                }
            },
        );

    if lines.is_empty() {
        warnings.push("No accounting line with values detected in the text".to_string());
    }

    ClassifiedText { lines, warnings }
}
