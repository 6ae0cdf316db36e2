//! Java-style date/time patterns (`yyyy-MM-dd'T'HH:mm:ss.SSSXXX`) translated to
//! chrono format strings.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";
pub const DEFAULT_TIME_FORMAT: &str = "HH:mm:ss";
pub const DEFAULT_DATETIME_FORMAT: &str = "yyyy-MM-dd'T'HH:mm:ss";

/// Translate a Java pattern into a chrono format string.
pub fn to_chrono_format(pattern: &str) -> Result<String, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // '' is a literal quote, otherwise read up to the closing quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            let mut j = i + 1;
            loop {
                match chars.get(j) {
                    None => return Err(format!("unterminated quote in '{pattern}'")),
                    Some('\'') if chars.get(j + 1) == Some(&'\'') => {
                        out.push('\'');
                        j += 2;
                    }
                    Some('\'') => break,
                    Some(&other) => {
                        push_literal(&mut out, other);
                        j += 1;
                    }
                }
            }
            i = j + 1;
            continue;
        }
        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        let directive = match (c, run) {
            ('y' | 'u', 2) => "%y",
            ('y' | 'u', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('D', _) => "%j",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 4..=6) => "%6f",
            ('S', _) => "%9f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('X' | 'x', 3) => "%:z",
            ('X' | 'x' | 'Z', _) => "%z",
            ('z', _) => "%Z",
            _ => return Err(format!("unsupported pattern letter '{c}' in '{pattern}'")),
        };
        out.push_str(directive);
        i += run;
    }
    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Translate a pattern and reject anything chrono cannot render.
pub fn checked_format(pattern: &str) -> Result<String, String> {
    let format = to_chrono_format(pattern)?;
    if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid format '{pattern}'"));
    }
    Ok(format)
}

fn has_zone(format: &str) -> bool {
    format.contains("%z") || format.contains("%:z")
}

pub fn parse_date(value: &str, pattern: &str) -> Result<(), String> {
    let pattern = if pattern.is_empty() { DEFAULT_DATE_FORMAT } else { pattern };
    let format = checked_format(pattern)?;
    NaiveDate::parse_from_str(value, &format)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub fn parse_time(value: &str, pattern: &str) -> Result<(), String> {
    let pattern = if pattern.is_empty() { DEFAULT_TIME_FORMAT } else { pattern };
    let format = checked_format(pattern)?;
    NaiveTime::parse_from_str(value, &format)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Timestamps with no pattern accept RFC 3339.
pub fn parse_datetime(value: &str, pattern: &str) -> Result<(), String> {
    if pattern.is_empty() {
        return DateTime::parse_from_rfc3339(value)
            .map(|_| ())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|_| ())
            })
            .map_err(|e| e.to_string());
    }
    let format = checked_format(pattern)?;
    if has_zone(&format) {
        DateTime::parse_from_str(value, &format)
            .map(|_| ())
            .map_err(|e| e.to_string())
    } else {
        NaiveDateTime::parse_from_str(value, &format)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Render a point in time with a Java pattern.
pub fn format_datetime(at: &DateTime<FixedOffset>, pattern: &str) -> Result<String, String> {
    let format = checked_format(pattern)?;
    Ok(at.format(&format).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_common_patterns() {
        assert_eq!(to_chrono_format("yyyy-MM-dd").unwrap(), "%Y-%m-%d");
        assert_eq!(
            to_chrono_format("yyyy-MM-dd'T'HH:mm:ss.SSSXXX").unwrap(),
            "%Y-%m-%dT%H:%M:%S.%3f%:z"
        );
        assert_eq!(to_chrono_format("EEE, d MMM yyyy").unwrap(), "%a, %-d %b %Y");
        assert_eq!(to_chrono_format("HH 'o''clock'").unwrap(), "%H o'clock");
        assert_eq!(to_chrono_format("100%").unwrap(), "100%%");
    }

    #[test]
    fn test_unsupported_letter() {
        assert!(to_chrono_format("yyyy-QQ").is_err());
        assert!(to_chrono_format("'open").is_err());
    }

    #[test]
    fn test_parse_values() {
        assert!(parse_date("2024-02-29", "yyyy-MM-dd").is_ok());
        assert!(parse_date("2023-02-29", "yyyy-MM-dd").is_err());
        assert!(parse_time("23:59:01", "HH:mm:ss").is_ok());
        assert!(parse_time("24:00", "HH:mm").is_err());
        assert!(parse_datetime("2024-01-02T03:04:05.678+01:00", "yyyy-MM-dd'T'HH:mm:ss.SSSXXX").is_ok());
        assert!(parse_datetime("2024-01-02T03:04:05", "").is_ok());
        assert!(parse_datetime("2024-01-02 03:04:05", "yyyy-MM-dd HH:mm:ss").is_ok());
        assert!(parse_datetime("yesterday", "").is_err());
    }

    #[test]
    fn test_format_datetime() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T07:08:09+00:00").unwrap();
        assert_eq!(format_datetime(&at, "dd/MM/yyyy HH:mm").unwrap(), "05/03/2024 07:08");
    }
}
