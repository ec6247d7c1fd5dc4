use chrono::Datelike;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use regex::Regex;
use serde::Serialize;
use std::fmt::Display;
use std::sync::LazyLock;

/// Thousands-grouped or plain decimal, optional sign, currency symbol and exponent.
static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-])?[$€£¥]?\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap()
});

const DATETIME_FORMATS: [&str; 12] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%d-%b-%Y %H:%M:%S%.f",
    "%d-%b-%Y %H:%M",
];

const DATE_FORMATS: [&str; 7] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%b-%Y", "%b %d, %Y", "%B %d, %Y"];

/// One cell exactly as the loader decoded it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RawCell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Boolean(bool),
}

impl RawCell {
    /// True for empty cells, blank text, and text matching one of
    /// `null_literals` (compared after trimming, ignoring ASCII case).
    pub fn is_blank(&self, null_literals: &[String]) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(text) => {
                let text = text.trim();
                text.is_empty() || null_literals.iter().any(|literal| literal.trim().eq_ignore_ascii_case(text))
            }
            RawCell::Number(_) | RawCell::Date(_) | RawCell::Boolean(_) => false,
        }
    }

    /// Display text of the cell, used for headers and text columns.
    pub fn display_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(text) => text.clone(),
            RawCell::Number(number) => format_number(*number),
            RawCell::Date(datetime) => format_datetime(datetime),
            RawCell::Boolean(flag) => flag.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawCell::Number(number) if number.is_finite() => Some(*number),
            RawCell::Text(text) => parse_number(text),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            RawCell::Date(datetime) => Some(*datetime),
            RawCell::Text(text) => parse_date(text),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            RawCell::Boolean(flag) => Some(*flag),
            RawCell::Text(text) => parse_boolean(text),
            _ => None,
        }
    }
}

impl From<&str> for RawCell {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(text.to_owned())
        }
    }
}

/// A typed cell of a normalized table. Serializes as the bare value, with
/// `Missing` as `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
    Boolean(bool),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(datetime) => Some(*datetime),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Number(number) => f.write_str(&format_number(*number)),
            Value::Date(datetime) => f.write_str(&format_datetime(datetime)),
            Value::Boolean(flag) => write!(f, "{flag}"),
        }
    }
}

/// Integral values print without a fractional part.
pub(crate) fn format_number(number: f64) -> String {
    if number == 0.0 {
        "0".to_owned()
    } else if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{number:.0}")
    } else {
        number.to_string()
    }
}

/// Midnight timestamps print as plain dates.
pub(crate) fn format_datetime(datetime: &NaiveDateTime) -> String {
    if datetime.time() == NaiveTime::MIN {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Parses numeric text such as `1,250.00`, `$1,200`, `(450)` or `12%`.
pub fn parse_number(text: &str) -> Option<f64> {
    let mut text = text.trim();
    let mut negate = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        text = inner.trim();
        negate = true;
    }
    let mut percent = false;
    if let Some(rest) = text.strip_suffix('%') {
        text = rest.trim_end();
        percent = true;
    }

    let captures = NUMBER_PATTERN.captures(text)?;
    let mut digits = captures.get(2)?.as_str().replace(',', "");
    if let Some(exponent) = captures.get(3) {
        digits.push_str(exponent.as_str());
    }
    let mut number = digits.parse::<f64>().ok()?;
    if percent {
        number /= 100.0;
    }
    if captures.get(1).is_some_and(|sign| sign.as_str() == "-") {
        number = -number;
    }
    if negate {
        number = -number;
    }
    number.is_finite().then_some(number)
}

/// Parses date or date-time text in the common spreadsheet layouts.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() || !text.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .filter(|datetime| (1000..=9999).contains(&datetime.year()))
}

pub fn parse_boolean(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" => Some(true),
        "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("100"), Some(100.0));
        assert_eq!(parse_number(" -3.5 "), Some(-3.5));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("1,250.00"), Some(1250.0));
        assert_eq!(parse_number("$1,200"), Some(1200.0));
        assert_eq!(parse_number("-$40"), Some(-40.0));
        assert_eq!(parse_number("(450)"), Some(-450.0));
        assert_eq!(parse_number("12%"), Some(0.12));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("bad"), None);
        assert_eq!(parse_number("12,34"), None);
        assert_eq!(parse_number("2024-01-01"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("1e999"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("$"), None);
    }

    #[test]
    fn test_parse_date() {
        let midnight = |y, m, d| datetime(y, m, d, 0, 0, 0);
        assert_eq!(parse_date("2024-01-01"), Some(midnight(2024, 1, 1)));
        assert_eq!(parse_date("2024/02/29"), Some(midnight(2024, 2, 29)));
        assert_eq!(parse_date("3/15/2024"), Some(midnight(2024, 3, 15)));
        assert_eq!(parse_date("15.03.2024"), Some(midnight(2024, 3, 15)));
        assert_eq!(parse_date("05-Jan-2024"), Some(midnight(2024, 1, 5)));
        assert_eq!(parse_date("Jan 5, 2024"), Some(midnight(2024, 1, 5)));
        assert_eq!(parse_date("January 5, 2024"), Some(midnight(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-01T08:30:00"), Some(datetime(2024, 1, 1, 8, 30, 0)));
        assert_eq!(parse_date("2024-01-01 17:45"), Some(datetime(2024, 1, 1, 17, 45, 0)));
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date("100"), None);
        assert_eq!(parse_date("1/2/3"), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_parse_boolean() {
        assert_eq!(parse_boolean("TRUE"), Some(true));
        assert_eq!(parse_boolean(" no "), Some(false));
        assert_eq!(parse_boolean("Y"), Some(true));
        assert_eq!(parse_boolean("1"), None);
        assert_eq!(parse_boolean("maybe"), None);
    }

    #[test]
    fn test_raw_cell_blank() {
        let nulls = vec!["N/A".to_owned(), "-".to_owned()];
        assert!(RawCell::Empty.is_blank(&nulls));
        assert!(RawCell::Text("   ".into()).is_blank(&nulls));
        assert!(RawCell::Text(" n/a ".into()).is_blank(&nulls));
        assert!(RawCell::Text("-".into()).is_blank(&nulls));
        assert!(!RawCell::Text("-".into()).is_blank(&[]));
        assert!(!RawCell::Number(0.0).is_blank(&nulls));
    }

    #[test]
    fn test_raw_cell_conversions() {
        assert_eq!(RawCell::Number(100.0).as_number(), Some(100.0));
        assert_eq!(RawCell::Number(f64::NAN).as_number(), None);
        assert_eq!(RawCell::Number(45292.0).as_date(), None);
        assert_eq!(RawCell::Number(1.0).as_boolean(), None);
        assert_eq!(RawCell::Boolean(true).as_number(), None);
        assert_eq!(RawCell::Date(datetime(2024, 1, 1, 0, 0, 0)).display_text(), "2024-01-01");
        assert_eq!(RawCell::Date(datetime(2024, 1, 1, 9, 5, 0)).display_text(), "2024-01-01 09:05:00");
        assert_eq!(RawCell::Number(100.0).display_text(), "100");
        assert_eq!(RawCell::Number(2.5).display_text(), "2.5");
        assert_eq!(RawCell::Boolean(false).display_text(), "false");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Missing.to_string(), "");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(1250.0).to_string(), "1250");
        assert_eq!(Value::Text("Site A".into()).to_string(), "Site A");
    }

    #[test]
    fn test_value_serialization() {
        let values = vec![
            Value::Missing,
            Value::Number(1.5),
            Value::Text("a".into()),
            Value::Boolean(true),
            Value::Date(datetime(2024, 1, 1, 0, 0, 0)),
        ];
        assert_eq!(
            serde_json::to_string(&values).unwrap(),
            r#"[null,1.5,"a",true,"2024-01-01T00:00:00"]"#
        );
    }
}
