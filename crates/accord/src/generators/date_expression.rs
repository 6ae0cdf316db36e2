//! Relative date expressions such as `tomorrow`, `+2 days` or `now - 3 hours + 5 minutes`.
//!
//! Grammar: an optional base (`now`, `today`, `tomorrow`, `yesterday`,
//! `midnight`, `noon`) followed by any number of `(+|-) N unit` adjustments.

use chrono::{DateTime, FixedOffset, Months, NaiveTime, TimeDelta};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(i64),
    Plus,
    Minus,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|e| format!("bad number '{text}': {e}"))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token::Word(word.to_ascii_lowercase()));
            }
            other => return Err(format!("unexpected character '{other}' at {i}")),
        }
    }
    Ok(tokens)
}

fn at_time(base: DateTime<FixedOffset>, time: NaiveTime) -> Result<DateTime<FixedOffset>, String> {
    base.date_naive()
        .and_time(time)
        .and_local_timezone(*base.offset())
        .single()
        .ok_or_else(|| "time does not exist in the base offset".to_string())
}

fn apply_base(word: &str, base: DateTime<FixedOffset>) -> Result<Option<DateTime<FixedOffset>>, String> {
    let at = match word {
        "now" | "today" => base,
        "tomorrow" => shift(base, TimeDelta::try_days(1))?,
        "yesterday" => shift(base, TimeDelta::try_days(-1))?,
        "midnight" => at_time(base, NaiveTime::MIN)?,
        "noon" => at_time(base, NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN))?,
        _ => return Ok(None),
    };
    Ok(Some(at))
}

fn shift(at: DateTime<FixedOffset>, delta: Option<TimeDelta>) -> Result<DateTime<FixedOffset>, String> {
    delta
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(|| "date is out of range".to_string())
}

fn adjust(
    at: DateTime<FixedOffset>,
    amount: i64,
    unit: &str,
) -> Result<DateTime<FixedOffset>, String> {
    let unit = unit.strip_suffix('s').unwrap_or(unit);
    let out_of_range = || format!("adjustment of {amount} {unit}s is out of range");
    let delta = match unit {
        "millisecond" => TimeDelta::try_milliseconds(amount),
        "second" => TimeDelta::try_seconds(amount),
        "minute" => TimeDelta::try_minutes(amount),
        "hour" => TimeDelta::try_hours(amount),
        "day" => TimeDelta::try_days(amount),
        "week" => TimeDelta::try_weeks(amount),
        "month" | "year" => {
            let months = if unit == "year" {
                amount.checked_mul(12).ok_or_else(out_of_range)?
            } else {
                amount
            };
            let magnitude = u32::try_from(months.unsigned_abs()).map_err(|_| out_of_range())?;
            let shifted = if months >= 0 {
                at.checked_add_months(Months::new(magnitude))
            } else {
                at.checked_sub_months(Months::new(magnitude))
            };
            return shifted.ok_or_else(out_of_range);
        }
        other => return Err(format!("unknown unit '{other}'")),
    };
    shift(at, delta).map_err(|_| out_of_range())
}

/// Evaluate `expression` relative to `base`. An empty expression yields `base`.
pub fn evaluate(expression: &str, base: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>, String> {
    let tokens = tokenize(expression)?;
    let mut iter = tokens.into_iter().peekable();
    let mut at = base;

    if let Some(Token::Word(word)) = iter.peek() {
        match apply_base(word, base)? {
            Some(resolved) => {
                at = resolved;
                iter.next();
            }
            None => return Err(format!("unknown base '{word}'")),
        }
    }

    while let Some(token) = iter.next() {
        let sign = match token {
            Token::Plus => 1,
            Token::Minus => -1,
            other => return Err(format!("expected '+' or '-' but found {other:?}")),
        };
        let amount = match iter.next() {
            Some(Token::Number(n)) => n,
            other => return Err(format!("expected a number but found {other:?}")),
        };
        let unit = match iter.next() {
            Some(Token::Word(unit)) => unit,
            other => return Err(format!("expected a unit but found {other:?}")),
        };
        at = adjust(at, sign * amount, &unit)?;
    }
    Ok(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-31T10:30:00+02:00").unwrap()
    }

    fn eval(expression: &str) -> String {
        evaluate(expression, base()).unwrap().to_rfc3339()
    }

    #[test]
    fn test_bases() {
        assert_eq!(eval(""), "2024-01-31T10:30:00+02:00");
        assert_eq!(eval("now"), "2024-01-31T10:30:00+02:00");
        assert_eq!(eval("tomorrow"), "2024-02-01T10:30:00+02:00");
        assert_eq!(eval("yesterday"), "2024-01-30T10:30:00+02:00");
        assert_eq!(eval("midnight"), "2024-01-31T00:00:00+02:00");
        assert_eq!(eval("Noon"), "2024-01-31T12:00:00+02:00");
    }

    #[test]
    fn test_adjustments() {
        assert_eq!(eval("+1 day"), "2024-02-01T10:30:00+02:00");
        assert_eq!(eval("now - 2 hours + 15 minutes"), "2024-01-31T08:45:00+02:00");
        assert_eq!(eval("+1 month"), "2024-02-29T10:30:00+02:00");
        assert_eq!(eval("tomorrow -1 year"), "2023-02-01T10:30:00+02:00");
        assert_eq!(eval("midnight + 2 weeks"), "2024-02-14T00:00:00+02:00");
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(evaluate("someday", base()).is_err());
        assert!(evaluate("+ day", base()).is_err());
        assert!(evaluate("+1 fortnight", base()).is_err());
        assert!(evaluate("now 1 day", base()).is_err());
        assert!(evaluate("+1 day *", base()).is_err());
    }

    #[test]
    fn test_huge_adjustments_are_errors() {
        let err = evaluate("now + 1000000000 days", base()).unwrap_err();
        assert!(err.contains("out of range"), "{err}");
        assert!(evaluate("now + 9223372036854775807 seconds", base()).is_err());
        assert!(evaluate("now - 9223372036854775807 years", base()).is_err());
        assert!(evaluate("+ 4000000000 months", base()).is_err());
    }
}
