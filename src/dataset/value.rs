//! Stringification of attribute values.
//!
//! Every cell is normalized exactly once, when a row is decoded, so the rest of
//! the pipeline only ever sees `String` values.

use chrono::NaiveDate;
use std::fmt;

/// dBASE column type, as declared in the field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Memo,
    Other(u8),
}

impl FieldKind {
    pub(crate) fn from_code(code: u8) -> Self {
        match code.to_ascii_uppercase() {
            b'C' => Self::Character,
            b'N' => Self::Numeric,
            b'F' => Self::Float,
            b'D' => Self::Date,
            b'L' => Self::Logical,
            b'M' => Self::Memo,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character => write!(f, "Character"),
            Self::Numeric => write!(f, "Numeric"),
            Self::Float => write!(f, "Float"),
            Self::Date => write!(f, "Date"),
            Self::Logical => write!(f, "Logical"),
            Self::Memo => write!(f, "Memo"),
            Self::Other(code) => write!(f, "Unknown({})", *code as char),
        }
    }
}

/// Human-readable declared type, e.g. `Character(50)` or `Numeric(10,2)`.
pub(crate) fn describe_type(kind: FieldKind, length: u8, decimals: u8) -> String {
    match kind {
        FieldKind::Character => format!("{kind}({length})"),
        FieldKind::Numeric | FieldKind::Float => format!("{kind}({length},{decimals})"),
        _ => kind.to_string(),
    }
}

/// Convert a decoded cell into its record value. Nulls become `""`.
pub(crate) fn normalize_value(kind: FieldKind, decimals: u8, raw: &str) -> String {
    let text = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    match kind {
        FieldKind::Numeric | FieldKind::Float => normalize_number(text, decimals),
        FieldKind::Date => normalize_date(text),
        FieldKind::Logical => normalize_logical(text),
        _ => text.to_string(),
    }
}

fn normalize_number(text: &str, decimals: u8) -> String {
    // dBASE writes overflowed or unset numerics as a run of asterisks.
    if text.is_empty() || text.chars().all(|c| c == '*') {
        return String::new();
    }

    if decimals == 0 {
        if let Ok(value) = text.parse::<i64>() {
            return value.to_string();
        }
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_nan() => String::new(),
        Ok(value) if value.is_finite() => value.to_string(),
        _ => text.to_string(),
    }
}

fn normalize_date(text: &str) -> String {
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn normalize_logical(text: &str) -> String {
    match text.chars().next() {
        Some('T' | 't' | 'Y' | 'y') => "True".to_string(),
        Some('F' | 'f' | 'N' | 'n') => "False".to_string(),
        _ => String::new(),
    }
}
