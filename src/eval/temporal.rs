//! Temporal builtins: construction, parsing, and duration arithmetic.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::model::{IsoDuration, Value};
use crate::{Error, Result};

/// Dispatch a temporal builtin by lowercased name.
pub fn call(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "timestamp" => Ok(Value::Int(Utc::now().timestamp_millis())),
        "datetime" => match args.first() {
            None => Ok(Value::DateTime(Utc::now())),
            Some(Value::String(s)) => parse_datetime(s),
            Some(Value::Int(millis)) => DateTime::<Utc>::from_timestamp_millis(*millis)
                .map(Value::DateTime)
                .ok_or_else(|| type_error("a valid epoch-millisecond timestamp", s_of(args))),
            Some(Value::Null) => Ok(Value::Null),
            _ => Err(type_error("an ISO-8601 string", s_of(args))),
        },
        "localdatetime" => match args.first() {
            None => Ok(Value::LocalDateTime(Utc::now().naive_utc())),
            Some(Value::String(s)) => parse_local_datetime(s),
            Some(Value::Null) => Ok(Value::Null),
            _ => Err(type_error("an ISO-8601 string", s_of(args))),
        },
        "date" => match args.first() {
            None => Ok(Value::Date(Utc::now().date_naive())),
            Some(Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| type_error("a yyyy-mm-dd date", s_of(args))),
            Some(Value::Null) => Ok(Value::Null),
            _ => Err(type_error("a yyyy-mm-dd date string", s_of(args))),
        },
        "time" | "localtime" => match args.first() {
            None => {
                let now = Utc::now().time();
                Ok(if name == "time" { Value::Time(now) } else { Value::LocalTime(now) })
            }
            Some(Value::String(s)) => {
                let parsed = NaiveTime::parse_from_str(s, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S%.f"))
                    .map_err(|_| type_error("an hh:mm[:ss] time", s_of(args)))?;
                Ok(if name == "time" { Value::Time(parsed) } else { Value::LocalTime(parsed) })
            }
            Some(Value::Null) => Ok(Value::Null),
            _ => Err(type_error("an hh:mm[:ss] time string", s_of(args))),
        },
        "duration" => match args.first() {
            Some(Value::String(s)) => parse_iso_duration(s).map(Value::Duration),
            Some(Value::Map(map)) => {
                let get = |key: &str| map.get(key).and_then(Value::as_int).unwrap_or(0);
                let nanos = get("nanoseconds") + get("milliseconds") * 1_000_000;
                Ok(Value::Duration(IsoDuration::from_parts(
                    get("years"),
                    get("months"),
                    get("days"),
                    get("hours"),
                    get("minutes"),
                    get("seconds"),
                    nanos as i32,
                )))
            }
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(type_error("an ISO-8601 duration or component map", s_of(args))),
        },
        "duration.between" => {
            let (Some(a), Some(b)) = (args.first(), args.get(1)) else {
                return Err(type_error("two temporal values", s_of(args)));
            };
            duration_between(a, b)
        }
        _ => Ok(Value::Null),
    }
}

fn s_of(args: &[Value]) -> String {
    args.first().map(|v| v.to_string()).unwrap_or_default()
}

fn type_error(expected: &str, got: String) -> Error {
    Error::TypeError { expected: expected.into(), got }
}

fn parse_datetime(s: &str) -> Result<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Value::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = parse_naive(s) {
        return Ok(Value::DateTime(DateTime::from_naive_utc_and_offset(naive, Utc)));
    }
    Err(type_error("an ISO-8601 datetime", s.to_string()))
}

fn parse_local_datetime(s: &str) -> Result<Value> {
    parse_naive(s)
        .map(Value::LocalDateTime)
        .map_err(|_| type_error("an ISO-8601 local datetime", s.to_string()))
}

fn parse_naive(s: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default()))
}

/// Parse `P[nY][nM][nW][nD][T[nH][nM][n[.fff]S]]`.
pub fn parse_iso_duration(s: &str) -> Result<IsoDuration> {
    let bad = || type_error("an ISO-8601 duration", s.to_string());
    let body = s.strip_prefix('P').ok_or_else(bad)?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) => (d, t),
        None => (body, ""),
    };

    let mut duration = IsoDuration::default();
    let mut parse_fields = |part: &str, is_time: bool| -> Result<()> {
        let mut number = String::new();
        for ch in part.chars() {
            if ch.is_ascii_digit() || ch == '.' || ch == '-' {
                number.push(ch);
                continue;
            }
            let whole: f64 = number.parse().map_err(|_| bad())?;
            number.clear();
            match (is_time, ch.to_ascii_uppercase()) {
                (false, 'Y') => duration.months += (whole as i64) * 12,
                (false, 'M') => duration.months += whole as i64,
                (false, 'W') => duration.days += (whole as i64) * 7,
                (false, 'D') => duration.days += whole as i64,
                (true, 'H') => duration.seconds += (whole as i64) * 3600,
                (true, 'M') => duration.seconds += (whole as i64) * 60,
                (true, 'S') => {
                    duration.seconds += whole.trunc() as i64;
                    duration.nanos += (whole.fract() * 1_000_000_000.0).round() as i32;
                }
                _ => return Err(bad()),
            }
        }
        if !number.is_empty() {
            return Err(bad());
        }
        Ok(())
    };
    parse_fields(date_part, false)?;
    parse_fields(time_part, true)?;
    Ok(duration)
}

/// Difference between two temporal values as a duration. Calendar months
/// are extracted for date-bearing values; the remainder lands in days and
/// seconds.
fn duration_between(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Date(d1), Value::Date(d2)) => {
            let months = whole_months_between(*d1, *d2);
            let anchored = add_months(*d1, months);
            let days = (*d2 - anchored).num_days();
            Ok(Value::Duration(IsoDuration { months, days, seconds: 0, nanos: 0 }))
        }
        (Value::DateTime(t1), Value::DateTime(t2)) => {
            let delta = *t2 - *t1;
            Ok(Value::Duration(IsoDuration {
                months: 0,
                days: delta.num_days(),
                seconds: delta.num_seconds() - delta.num_days() * 86_400,
                nanos: 0,
            }))
        }
        (Value::LocalDateTime(t1), Value::LocalDateTime(t2)) => {
            let delta = *t2 - *t1;
            Ok(Value::Duration(IsoDuration {
                months: 0,
                days: delta.num_days(),
                seconds: delta.num_seconds() - delta.num_days() * 86_400,
                nanos: 0,
            }))
        }
        _ => Err(type_error(
            "two comparable temporal values",
            format!("{}, {}", a.type_name(), b.type_name()),
        )),
    }
}

fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64);
    if months > 0 && add_months(from, months) > to {
        months -= 1;
    }
    if months < 0 && add_months(from, months) < to {
        months += 1;
    }
    months
}

fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let total = date.year() as i64 * 12 + date.month() as i64 - 1 + months;
    let year = (total.div_euclid(12)) as i32;
    let month = (total.rem_euclid(12) + 1) as u32;
    let day = date.day();
    // Clamp to the last valid day of the target month
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .unwrap_or(date)
}
