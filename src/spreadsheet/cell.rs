use crate::error::ReadError;
use crate::spreadsheet::SpreadsheetError;
use crate::table::RawCell;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use regex::Regex;
use std::sync::LazyLock;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:[.,]\d+)?)S)?$").unwrap()
});

/// How the stored text of a cell is to be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    Boolean,
    Number,
    /// Serial day number counted from the 1900 epoch (with the Lotus leap-year bug).
    SerialDate1900,
    /// Serial day number counted from the 1904 epoch.
    SerialDate1904,
    /// Fraction of a day with a time-only display format.
    SerialTime,
    IsoDateTime,
    IsoDuration,
    InlineString,
    /// Index into the workbook's shared-string table.
    SharedString,
    Error,
}

impl CellType {
    /// Date or time kind implied by a built-in number format id.
    pub(crate) fn from_builtin_format(id: u32, is_1904: bool) -> Option<Self> {
        match id {
            14..=17 | 22 => Some(Self::serial_date(is_1904)),
            18..=21 | 45..=47 => Some(Self::SerialTime),
            _ => None,
        }
    }

    /// Scans a custom format code for date and time placeholders, skipping
    /// quoted literals, escaped characters and bracketed sections.
    pub(crate) fn from_custom_format(code: &str, is_1904: bool) -> Self {
        let mut escaped = false;
        let mut quoted = false;
        let mut bracketed = false;
        let mut has_date = false;
        let mut has_time = false;
        for character in code.chars() {
            match character {
                _ if escaped => escaped = false,
                '_' | '\\' => escaped = true,
                '"' if !bracketed => quoted = !quoted,
                '[' if !quoted => bracketed = true,
                ']' if bracketed => bracketed = false,
                _ if quoted || bracketed => (),
                'Y' | 'y' | 'D' | 'd' => has_date = true,
                'H' | 'h' | 'S' | 's' => has_time = true,
                _ => (),
            }
        }

        match (has_date, has_time) {
            (true, _) => Self::serial_date(is_1904),
            (false, true) => Self::SerialTime,
            (false, false) => Self::Number,
        }
    }

    fn serial_date(is_1904: bool) -> Self {
        if is_1904 {
            Self::SerialDate1904
        } else {
            Self::SerialDate1900
        }
    }

    /// Builds the raw cell for a stored value. Values that do not fit the
    /// declared kind are kept as text so nothing is lost before inference.
    pub(crate) fn to_raw_cell(self, value: &str, shared_strings: &[String]) -> Result<RawCell, ReadError> {
        let cell = match self {
            CellType::Empty => RawCell::Empty,
            CellType::Boolean => {
                let value = value.trim();
                RawCell::Boolean(value == "1" || value.eq_ignore_ascii_case("true"))
            }
            CellType::Number => match value.trim().parse::<f64>() {
                Ok(number) if number.is_finite() => RawCell::Number(number),
                _ => RawCell::Text(value.to_owned()),
            },
            CellType::SerialDate1900 | CellType::SerialDate1904 => value
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|serial| serial_to_datetime(serial, self == CellType::SerialDate1904))
                .map_or_else(|| RawCell::Text(value.to_owned()), RawCell::Date),
            CellType::SerialTime => match value.trim().parse::<f64>() {
                Ok(fraction) if fraction.is_finite() && fraction >= 0.0 => {
                    RawCell::Text(time_of_day((fraction * 86_400_000f64).round() as i64))
                }
                _ => RawCell::Text(value.to_owned()),
            },
            CellType::IsoDateTime => {
                parse_iso_datetime(value).map_or_else(|| RawCell::Text(value.to_owned()), RawCell::Date)
            }
            CellType::IsoDuration => {
                RawCell::Text(parse_iso_duration(value).map_or_else(|| value.to_owned(), time_of_day))
            }
            CellType::SharedString => {
                let index = value.trim().parse::<usize>()?;
                let text = shared_strings
                    .get(index)
                    .ok_or(SpreadsheetError::SharedStringIndex(index))?;
                RawCell::Text(text.clone())
            }
            CellType::InlineString | CellType::Error => RawCell::Text(value.to_owned()),
        };
        Ok(cell)
    }
}

/// Converts a serial day number to a timestamp. The 1900 system counts the
/// nonexistent 1900-02-29, so serials before it are shifted by one day.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let millis = (serial.fract() * 86_400_000f64).round() as i64;
    NaiveDate::from_ymd_opt(1899, 12, 30)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_days(days.checked_add(offset)?)?)?
        .checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

pub(crate) fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Milliseconds of an ISO 8601 duration such as `PT08H30M00S`.
fn parse_iso_duration(value: &str) -> Option<i64> {
    let captures = ISO_DURATION.captures(value.trim())?;
    let part = |index: usize| -> f64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let seconds = part(1) * 86_400.0 + part(2) * 3_600.0 + part(3) * 60.0 + part(4);
    Some((seconds * 1_000.0).round() as i64)
}

fn time_of_day(millis: i64) -> String {
    let (seconds, millis) = (millis / 1_000, millis % 1_000);
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if millis > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_builtin_formats() {
        assert_eq!(CellType::from_builtin_format(14, false), Some(CellType::SerialDate1900));
        assert_eq!(CellType::from_builtin_format(22, true), Some(CellType::SerialDate1904));
        assert_eq!(CellType::from_builtin_format(20, false), Some(CellType::SerialTime));
        assert_eq!(CellType::from_builtin_format(4, false), None);
    }

    #[test]
    fn test_custom_formats() {
        assert_eq!(CellType::from_custom_format("yyyy-mm-dd", false), CellType::SerialDate1900);
        assert_eq!(CellType::from_custom_format("dd/mm/yyyy hh:mm", true), CellType::SerialDate1904);
        assert_eq!(CellType::from_custom_format("[h]:mm:ss", false), CellType::SerialTime);
        assert_eq!(CellType::from_custom_format("#,##0.00\" days\"", false), CellType::Number);
        assert_eq!(CellType::from_custom_format("[Red]#,##0", false), CellType::Number);
        assert_eq!(CellType::from_custom_format("0.0_)", false), CellType::Number);
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_to_datetime(1.0, false), Some(date(1900, 1, 1)));
        assert_eq!(serial_to_datetime(59.0, false), Some(date(1900, 2, 28)));
        assert_eq!(serial_to_datetime(61.0, false), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_datetime(45292.0, false), Some(date(2024, 1, 1)));
        assert_eq!(serial_to_datetime(0.0, true), Some(date(1904, 1, 1)));
        assert_eq!(
            serial_to_datetime(45292.5, false),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0)
        );
        assert_eq!(serial_to_datetime(-1.0, false), None);
        assert_eq!(serial_to_datetime(1e300, true), None);
        assert_eq!(serial_to_datetime(f64::MAX, false), None);
    }

    #[test]
    fn test_out_of_range_serial_stays_text() {
        assert_eq!(CellType::SerialDate1904.to_raw_cell("1e300", &[]).unwrap(), RawCell::Text("1e300".into()));
        assert_eq!(CellType::SerialDate1900.to_raw_cell("9e18", &[]).unwrap(), RawCell::Text("9e18".into()));
    }

    #[test]
    fn test_to_raw_cell() {
        let shared = vec!["Site A".to_owned()];
        assert_eq!(CellType::SharedString.to_raw_cell("0", &shared).unwrap(), RawCell::Text("Site A".into()));
        assert!(CellType::SharedString.to_raw_cell("3", &shared).is_err());
        assert_eq!(CellType::Number.to_raw_cell("12.5", &shared).unwrap(), RawCell::Number(12.5));
        assert_eq!(CellType::Boolean.to_raw_cell("1", &shared).unwrap(), RawCell::Boolean(true));
        assert_eq!(CellType::SerialDate1900.to_raw_cell("45292", &shared).unwrap(), RawCell::Date(date(2024, 1, 1)));
        assert_eq!(CellType::SerialTime.to_raw_cell("0.5", &shared).unwrap(), RawCell::Text("12:00:00".into()));
        assert_eq!(CellType::IsoDateTime.to_raw_cell("2024-03-05", &shared).unwrap(), RawCell::Date(date(2024, 3, 5)));
        assert_eq!(CellType::IsoDuration.to_raw_cell("PT08H30M00S", &shared).unwrap(), RawCell::Text("08:30:00".into()));
        assert_eq!(CellType::Error.to_raw_cell("#DIV/0!", &shared).unwrap(), RawCell::Text("#DIV/0!".into()));
    }
}
