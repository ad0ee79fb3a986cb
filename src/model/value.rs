//! Universal value type matching Neo4j's type system.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::{Node, Path, Relationship};

/// Neo4j-compatible value type.
///
/// Covers the full runtime type system the query pipeline operates on:
/// - Scalars: Bool, Int, Float, String
/// - Containers: List, Map
/// - Graph: Node, Relationship, Path
/// - Temporal: Date, Time, DateTime, LocalDateTime, LocalTime, Duration
/// - Spatial: Point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),

    // Graph types
    Node(Box<Node>),
    Relationship(Box<Relationship>),
    Path(Box<Path>),

    // Temporal types
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    LocalDateTime(NaiveDateTime),
    LocalTime(NaiveTime),
    Duration(IsoDuration),

    // Spatial
    Point(Point),
}

/// ISO 8601 duration. Calendar years are normalized into `months`
/// (`months = years * 12 + months`); the clock part is seconds + nanos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IsoDuration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

impl IsoDuration {
    pub fn from_parts(
        years: i64,
        months: i64,
        days: i64,
        hours: i64,
        minutes: i64,
        seconds: i64,
        nanos: i32,
    ) -> Self {
        Self {
            months: years * 12 + months,
            days,
            seconds: hours * 3600 + minutes * 60 + seconds,
            nanos,
        }
    }

    /// Total seconds ignoring the calendar part (months/days are not
    /// convertible without an anchor date).
    pub fn clock_seconds(&self) -> f64 {
        self.seconds as f64 + self.nanos as f64 / 1_000_000_000.0
    }
}

/// Spatial point: cartesian (x, y[, z]) or WGS-84 (lon, lat).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// 7203 = cartesian, 4326 = WGS-84 (Neo4j SRIDs).
    pub srid: i32,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub const SRID_CARTESIAN: i32 = 7203;
    pub const SRID_WGS84: i32 = 4326;

    pub fn cartesian(x: f64, y: f64) -> Self {
        Self { srid: Self::SRID_CARTESIAN, x, y, z: None }
    }

    pub fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self { srid: Self::SRID_WGS84, x: longitude, y: latitude, z: None }
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
            Value::List(_) => "LIST",
            Value::Map(_) => "MAP",
            Value::Node(_) => "NODE",
            Value::Relationship(_) => "RELATIONSHIP",
            Value::Path(_) => "PATH",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::DateTime(_) => "ZONED DATETIME",
            Value::LocalDateTime(_) => "LOCAL DATETIME",
            Value::LocalTime(_) => "LOCAL TIME",
            Value::Duration(_) => "DURATION",
            Value::Point(_) => "POINT",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Neo4j-compatible truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Numeric list extraction for vector functions. Accepts Int/Float
    /// elements, rejects everything else.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::List(items) => items.iter().map(|v| v.as_float()).collect(),
            _ => None,
        }
    }
}

// ============================================================================
// Equality and ordering (Neo4j rules)
// ============================================================================

impl Value {
    /// Value equality with Int/Float cross-promotion. All other
    /// cross-type comparisons are unequal rather than errors.
    pub fn cypher_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
            (a, b) => a == b,
        }
    }

    /// Neo4j comparison. Returns None for incomparable types (NULL-like
    /// behavior: the caller treats it as false).
    pub fn neo4j_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
            (Value::LocalTime(a), Value::LocalTime(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::LocalDateTime(a), Value::LocalDateTime(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Ordering key for ORDER BY and MIN/MAX: numeric comparison when
    /// both sides are numeric, otherwise stringified comparison.
    /// Total — NULL sorts last.
    pub fn sort_cmp(&self, other: &Value) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        if let (Some(a), Some(b)) = (self.as_float(), other.as_float()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        self.to_string().cmp(&other.to_string())
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// JSON bridging (parameter maps, procedure results)
// ============================================================================

impl Value {
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::json!(i),
            Value::Float(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                // Sorted keys keep Display deterministic — DISTINCT and
                // cache keys rely on the stringified form.
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {}", m[*k])?;
                }
                write!(f, "}}")
            }
            Value::Node(n) => write!(f, "(:{} id={})", n.labels.join(":"), n.id),
            Value::Relationship(r) => write!(f, "[:{} id={}]", r.rel_type, r.id),
            Value::Path(p) => write!(f, "<path len={}>", p.len()),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::LocalDateTime(dt) => write!(f, "{dt}"),
            Value::LocalTime(t) => write!(f, "{t}"),
            Value::Duration(d) => {
                let hours = d.seconds / 3600;
                let minutes = (d.seconds % 3600) / 60;
                let secs = d.seconds % 60;
                write!(f, "P{}M{}DT{}H{}M{}S", d.months, d.days, hours, minutes, secs)
            }
            Value::Point(p) => match p.z {
                Some(z) => write!(f, "point({{srid: {}, x: {}, y: {}, z: {z}}})", p.srid, p.x, p.y),
                None => write!(f, "point({{srid: {}, x: {}, y: {}}})", p.srid, p.x, p.y),
            },
        }
    }
}

// ============================================================================
// Temporal component access (date.year etc.)
// ============================================================================

impl Value {
    /// Extract a named temporal component, or None when the value has no
    /// such component.
    pub fn temporal_component(&self, name: &str) -> Option<Value> {
        let (date, time): (Option<NaiveDate>, Option<NaiveTime>) = match self {
            Value::Date(d) => (Some(*d), None),
            Value::Time(t) | Value::LocalTime(t) => (None, Some(*t)),
            Value::DateTime(dt) => (Some(dt.date_naive()), Some(dt.time())),
            Value::LocalDateTime(dt) => (Some(dt.date()), Some(dt.time())),
            _ => return None,
        };
        match name {
            "year" => date.map(|d| Value::Int(d.year() as i64)),
            "month" => date.map(|d| Value::Int(d.month() as i64)),
            "day" => date.map(|d| Value::Int(d.day() as i64)),
            "hour" => time.map(|t| Value::Int(t.hour() as i64)),
            "minute" => time.map(|t| Value::Int(t.minute() as i64)),
            "second" => time.map(|t| Value::Int(t.second() as i64)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(3.14), Value::Float(3.14));
        assert_eq!(Value::from(true), Value::Bool(true));
    }

    #[test]
    fn test_null_comparison() {
        assert_eq!(Value::Null.neo4j_cmp(&Value::Null), None);
        assert_eq!(Value::Null.neo4j_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(
            Value::Int(1).neo4j_cmp(&Value::Float(1.5)),
            Some(std::cmp::Ordering::Less)
        );
    }

    #[test]
    fn test_cross_type_equality_promotes_numeric() {
        assert!(Value::Int(2).cypher_eq(&Value::Float(2.0)));
        assert!(!Value::Int(2).cypher_eq(&Value::String("2".into())));
    }

    #[test]
    fn test_sort_cmp_numeric_then_string() {
        assert_eq!(
            Value::Int(2).sort_cmp(&Value::Float(10.0)),
            std::cmp::Ordering::Less
        );
        assert_eq!(
            Value::String("b".into()).sort_cmp(&Value::String("a".into())),
            std::cmp::Ordering::Greater
        );
        // NULL sorts last
        assert_eq!(Value::Null.sort_cmp(&Value::Int(0)), std::cmp::Ordering::Greater);
    }

    #[test]
    fn test_json_roundtrip() {
        let json = serde_json::json!({"name": "Ada", "age": 30, "tags": ["a", "b"]});
        let value = Value::from_json(&json);
        match &value {
            Value::Map(m) => {
                assert_eq!(m.get("name"), Some(&Value::String("Ada".into())));
                assert_eq!(m.get("age"), Some(&Value::Int(30)));
            }
            other => panic!("expected map, got {other:?}"),
        }
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_temporal_components() {
        let d = Value::Date(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap());
        assert_eq!(d.temporal_component("year"), Some(Value::Int(2024)));
        assert_eq!(d.temporal_component("month"), Some(Value::Int(5)));
        assert_eq!(d.temporal_component("day"), Some(Value::Int(17)));
        assert_eq!(d.temporal_component("hour"), None);
    }

    #[test]
    fn test_duration_from_parts() {
        let d = IsoDuration::from_parts(1, 2, 3, 4, 5, 6, 0);
        assert_eq!(d.months, 14);
        assert_eq!(d.days, 3);
        assert_eq!(d.seconds, 4 * 3600 + 5 * 60 + 6);
    }
}
