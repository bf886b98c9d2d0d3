//! The type coercion engine.
//!
//! Two pure, total functions map raw scalars to and from the canonical
//! typed representation a field descriptor demands. All tables share
//! this one code path; there are no per-field-name special cases
//! beyond the declarative slot flag.
//!
//! The write-side rules are product decisions, not accidents:
//! numeric blanks become `0` (never NULL, to avoid null-arithmetic
//! surprises downstream), dates are the one type that may be NULL even
//! when the form layer calls the column required, and slot-family
//! values of zero or blank mean "not used" and become NULL.

use chrono::NaiveDate;
use serde_json::Value as Json;

use trellis_common::Value;
use trellis_schema::{FieldDescriptor, LogicalType};

/// Tokens the boolean write path treats as true.
const TRUTHY_TOKENS: &[&str] = &["true", "1", "yes", "y", "on"];

/// Date formats accepted on the write path, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Coerces a raw scalar into the typed value a field demands.
///
/// Total: every input produces a value, never an error.
#[must_use]
pub fn coerce_for_write(field: &FieldDescriptor, raw: &Json) -> Value {
    if field.slot && is_unused_slot(raw) {
        return Value::Null;
    }
    match field.logical_type {
        LogicalType::Boolean => Value::Bool(truthy(raw)),
        LogicalType::Integer => Value::Integer(parse_integer(raw)),
        LogicalType::Float => Value::Float(parse_float(raw)),
        LogicalType::Date => parse_date(raw).map_or(Value::Null, Value::Date),
        LogicalType::String | LogicalType::Text => Value::String(text_form(raw)),
    }
}

/// Converts a typed value to its CSV export scalar.
///
/// NULL becomes the empty string; everything else its string form.
#[must_use]
pub fn coerce_for_read(_field: &FieldDescriptor, value: &Value) -> String {
    value.to_text().unwrap_or_default()
}

/// Slot convention: zero or blank means "not used".
fn is_unused_slot(raw: &Json) -> bool {
    match raw {
        Json::Null => true,
        Json::String(s) => {
            let s = s.trim();
            s.is_empty() || s == "0"
        }
        Json::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn truthy(raw: &Json) -> bool {
    match raw {
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64() == Some(1.0),
        Json::String(s) => TRUTHY_TOKENS.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

fn parse_integer(raw: &Json) -> i64 {
    match raw {
        Json::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Json::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn parse_float(raw: &Json) -> f64 {
    match raw {
        Json::Number(n) => n.as_f64().unwrap_or(0.0),
        Json::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_date(raw: &Json) -> Option<NaiveDate> {
    let Json::String(s) = raw else { return None };
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }
    // ISO datetimes: keep the calendar part.
    if s.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }
    None
}

fn text_form(raw: &Json) -> String {
    match raw {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_schema::FieldDescriptor as F;

    fn field(ty: LogicalType) -> F {
        F::nullable("f", ty)
    }

    #[test]
    fn test_boolean_truthy_tokens() {
        let f = field(LogicalType::Boolean);
        for token in ["true", "1", "yes", "y", "on"] {
            assert_eq!(coerce_for_write(&f, &json!(token)), Value::Bool(true));
        }
        assert_eq!(coerce_for_write(&f, &json!(true)), Value::Bool(true));
        assert_eq!(coerce_for_write(&f, &json!(1)), Value::Bool(true));
        // Everything else, including blank, is false
        for raw in [json!("false"), json!(""), json!("no"), json!(0), Json::Null] {
            assert_eq!(coerce_for_write(&f, &raw), Value::Bool(false));
        }
    }

    #[test]
    fn test_numeric_blank_defaults_to_zero() {
        let int = field(LogicalType::Integer);
        assert_eq!(coerce_for_write(&int, &Json::Null), Value::Integer(0));
        assert_eq!(coerce_for_write(&int, &json!("")), Value::Integer(0));
        assert_eq!(coerce_for_write(&int, &json!("garbage")), Value::Integer(0));
        assert_eq!(coerce_for_write(&int, &json!("42")), Value::Integer(42));
        assert_eq!(coerce_for_write(&int, &json!("3.7")), Value::Integer(3));

        let float = field(LogicalType::Float);
        assert_eq!(coerce_for_write(&float, &json!("")), Value::Float(0.0));
        assert_eq!(coerce_for_write(&float, &json!("2.5")), Value::Float(2.5));
    }

    #[test]
    fn test_date_blank_or_unparseable_is_null() {
        let f = field(LogicalType::Date);
        assert!(coerce_for_write(&f, &Json::Null).is_null());
        assert!(coerce_for_write(&f, &json!("")).is_null());
        assert!(coerce_for_write(&f, &json!("not a date")).is_null());

        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(coerce_for_write(&f, &json!("2024-03-09")), Value::Date(d));
        assert_eq!(coerce_for_write(&f, &json!("09/03/2024")), Value::Date(d));
        assert_eq!(
            coerce_for_write(&f, &json!("2024-03-09T14:00:00Z")),
            Value::Date(d)
        );
    }

    #[test]
    fn test_string_blank_is_empty_not_null() {
        let f = field(LogicalType::String);
        assert_eq!(coerce_for_write(&f, &Json::Null), Value::String(String::new()));
        assert_eq!(coerce_for_write(&f, &json!(12)), Value::String("12".into()));
    }

    #[test]
    fn test_slot_zero_forces_null() {
        let f = F::nullable("ink_1", LogicalType::String).with_slot();
        for raw in [json!("0"), json!(0), json!(""), Json::Null] {
            assert!(coerce_for_write(&f, &raw).is_null(), "{raw:?}");
        }
        assert_eq!(
            coerce_for_write(&f, &json!("INK-7")),
            Value::String("INK-7".into())
        );

        // Numeric slots too: 0 means "not used", never a quantity
        let f = F::nullable("complex_1", LogicalType::Integer).with_slot();
        assert!(coerce_for_write(&f, &json!("0")).is_null());
        assert_eq!(coerce_for_write(&f, &json!("3")), Value::Integer(3));
    }

    #[test]
    fn test_read_side() {
        let f = field(LogicalType::Float);
        assert_eq!(coerce_for_read(&f, &Value::Null), "");
        assert_eq!(coerce_for_read(&f, &Value::Float(2.5)), "2.5");
        assert_eq!(coerce_for_read(&f, &Value::Bool(true)), "true");
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        // export → import → export must be stable for every type
        let cases = [
            (field(LogicalType::Integer), json!("42")),
            (field(LogicalType::Float), json!("2.5")),
            (field(LogicalType::Boolean), json!("yes")),
            (field(LogicalType::Date), json!("2024-03-09")),
            (field(LogicalType::String), json!("hello")),
            (field(LogicalType::Date), json!("bogus")),
        ];
        for (f, raw) in cases {
            let first = coerce_for_write(&f, &raw);
            let exported = coerce_for_read(&f, &first);
            let second = coerce_for_write(&f, &json!(exported));
            assert_eq!(first, second, "field {:?} raw {raw:?}", f.logical_type);
        }
    }
}
