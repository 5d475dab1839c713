//! Scalar coercion from untyped JSON values

use crate::core::error::BindError;
use crate::core::field::{FieldValue, ScalarType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;

/// Convert a JSON value into the declared scalar type of `field`
///
/// A value that already has the target shape passes through. Numbers
/// narrow and widen, strings are parsed, and anything that cannot be read
/// as the target type is a [`BindError::Format`].
///
/// Booleans are lenient: any string other than a case-insensitive `"true"`
/// reads as `false`.
///
/// ```
/// use entity_rest::binding::coerce;
/// use entity_rest::core::field::{FieldValue, ScalarType};
/// use serde_json::json;
///
/// assert_eq!(coerce("quantity", &json!("5"), ScalarType::Integer).unwrap(), FieldValue::Integer(5));
/// assert_eq!(coerce("active", &json!("yes"), ScalarType::Boolean).unwrap(), FieldValue::Boolean(false));
/// assert!(coerce("quantity", &json!("five"), ScalarType::Integer).is_err());
/// ```
pub fn coerce(field: &str, value: &Value, target: ScalarType) -> Result<FieldValue, BindError> {
    if value.is_null() {
        return Ok(FieldValue::Null);
    }
    let invalid = || BindError::format(field, target.name(), value);

    match target {
        ScalarType::Text => Ok(FieldValue::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ScalarType::Integer => match value {
            // 32-bit narrowing wraps
            Value::Number(n) => Ok(FieldValue::Integer(truncate(n) as i32)),
            Value::String(s) => s.parse::<i32>().map(FieldValue::Integer).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ScalarType::Long => match value {
            Value::Number(n) => Ok(FieldValue::Long(truncate(n))),
            Value::String(s) => s.parse::<i64>().map(FieldValue::Long).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ScalarType::Boolean => Ok(FieldValue::Boolean(match value {
            Value::Bool(b) => *b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            other => other.to_string().eq_ignore_ascii_case("true"),
        })),
        ScalarType::Decimal => match value {
            Value::Number(n) => decimal_from_number(n).map(FieldValue::Decimal).ok_or_else(invalid),
            Value::String(s) => parse_decimal(s).map(FieldValue::Decimal).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        ScalarType::Timestamp => match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        ScalarType::Json => Ok(FieldValue::Json(value.clone())),
    }
}

/// Integral part of a JSON number as an i64
///
/// Fractions truncate toward zero; out-of-range values saturate.
pub(crate) fn truncate(n: &Number) -> i64 {
    if let Some(i) = n.as_i64() {
        i
    } else if let Some(u) = n.as_u64() {
        i64::try_from(u).unwrap_or(i64::MAX)
    } else {
        // float-to-int `as` saturates
        n.as_f64().map(|f| f as i64).unwrap_or_default()
    }
}

/// Integers convert exactly, floats through their shortest decimal form
fn decimal_from_number(n: &Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    n.as_f64().and_then(|f| parse_decimal(&f.to_string()))
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_from_any_value() {
        assert_eq!(
            coerce("name", &json!("abc"), ScalarType::Text).unwrap(),
            FieldValue::Text("abc".to_string())
        );
        assert_eq!(
            coerce("name", &json!(12), ScalarType::Text).unwrap(),
            FieldValue::Text("12".to_string())
        );
        assert_eq!(
            coerce("name", &json!(true), ScalarType::Text).unwrap(),
            FieldValue::Text("true".to_string())
        );
        assert_eq!(
            coerce("name", &json!({"a": [1, 2]}), ScalarType::Text).unwrap(),
            FieldValue::Text(r#"{"a":[1,2]}"#.to_string())
        );
    }

    #[test]
    fn test_integer_narrowing() {
        assert_eq!(
            coerce("q", &json!(5), ScalarType::Integer).unwrap(),
            FieldValue::Integer(5)
        );
        assert_eq!(
            coerce("q", &json!(5.9), ScalarType::Integer).unwrap(),
            FieldValue::Integer(5)
        );
        assert_eq!(
            coerce("q", &json!(-5.9), ScalarType::Integer).unwrap(),
            FieldValue::Integer(-5)
        );
        assert_eq!(
            coerce("q", &json!(4_294_967_297_i64), ScalarType::Integer).unwrap(),
            FieldValue::Integer(1)
        );
        assert_eq!(
            coerce("q", &json!("42"), ScalarType::Integer).unwrap(),
            FieldValue::Integer(42)
        );
    }

    #[test]
    fn test_integer_rejects_garbage() {
        let err = coerce("quantity", &json!("abc"), ScalarType::Integer).unwrap_err();
        match err {
            BindError::Format {
                field, expected, ..
            } => {
                assert_eq!(field, "quantity");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(coerce("q", &json!([1]), ScalarType::Integer).is_err());
        assert!(coerce("q", &json!("99999999999"), ScalarType::Integer).is_err());
    }

    #[test]
    fn test_long() {
        assert_eq!(
            coerce("n", &json!(7_000_000_000_i64), ScalarType::Long).unwrap(),
            FieldValue::Long(7_000_000_000)
        );
        assert_eq!(
            coerce("n", &json!("-3"), ScalarType::Long).unwrap(),
            FieldValue::Long(-3)
        );
        assert!(coerce("n", &json!(false), ScalarType::Long).is_err());
    }

    #[test]
    fn test_boolean_is_lenient() {
        assert_eq!(
            coerce("b", &json!(true), ScalarType::Boolean).unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            coerce("b", &json!("TRUE"), ScalarType::Boolean).unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            coerce("b", &json!("yes"), ScalarType::Boolean).unwrap(),
            FieldValue::Boolean(false)
        );
        assert_eq!(
            coerce("b", &json!(1), ScalarType::Boolean).unwrap(),
            FieldValue::Boolean(false)
        );
    }

    #[test]
    fn test_decimal() {
        assert_eq!(
            coerce("price", &json!(100.5), ScalarType::Decimal).unwrap(),
            FieldValue::Decimal(Decimal::from_str("100.5").unwrap())
        );
        assert_eq!(
            coerce("price", &json!(0.1), ScalarType::Decimal).unwrap(),
            FieldValue::Decimal(Decimal::from_str("0.1").unwrap())
        );
        assert_eq!(
            coerce("price", &json!(100), ScalarType::Decimal).unwrap(),
            FieldValue::Decimal(Decimal::from(100))
        );
        assert_eq!(
            coerce("price", &json!("19.99"), ScalarType::Decimal).unwrap(),
            FieldValue::Decimal(Decimal::from_str("19.99").unwrap())
        );
        assert_eq!(
            coerce("price", &json!("1.5e2"), ScalarType::Decimal).unwrap(),
            FieldValue::Decimal(Decimal::from(150))
        );
        assert!(coerce("price", &json!("cheap"), ScalarType::Decimal).is_err());
    }

    #[test]
    fn test_timestamp() {
        let value = coerce("date", &json!("2024-01-15T10:30:00Z"), ScalarType::Timestamp).unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(value, FieldValue::Timestamp(expected));

        let offset = coerce("date", &json!("2024-01-15T12:30:00+02:00"), ScalarType::Timestamp).unwrap();
        assert_eq!(offset, FieldValue::Timestamp(expected));

        assert!(coerce("date", &json!("yesterday"), ScalarType::Timestamp).is_err());
        assert!(coerce("date", &json!(1705314600), ScalarType::Timestamp).is_err());
    }

    #[test]
    fn test_json_passes_through() {
        let value = json!({"nested": [1, "two"]});
        assert_eq!(
            coerce("extra", &value, ScalarType::Json).unwrap(),
            FieldValue::Json(value)
        );
    }

    #[test]
    fn test_out_of_range_numbers_saturate() {
        assert_eq!(
            coerce("count", &json!(u64::MAX), ScalarType::Long).unwrap(),
            FieldValue::Long(i64::MAX)
        );
        assert_eq!(
            coerce("count", &json!(1e300), ScalarType::Long).unwrap(),
            FieldValue::Long(i64::MAX)
        );
        assert_eq!(
            coerce("count", &json!(-1e300), ScalarType::Long).unwrap(),
            FieldValue::Long(i64::MIN)
        );
        assert_eq!(truncate(&Number::from(u64::MAX)), i64::MAX);
    }
}
