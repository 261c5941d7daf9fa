//! Request validation with a structured error envelope.
//!
//! Request bodies are checked against a small declarative schema before they
//! are deserialized, so that every problem in a payload is reported at once:
//!
//! ```json
//! {
//!   "detail": [
//!     {
//!       "type": "missing",
//!       "loc": ["body", 2, "count"],
//!       "msg": "Field required",
//!       "input": {"name": "kiwi", "price": 0.19}
//!     }
//!   ]
//! }
//! ```
//!
//! `loc` walks from the request part (`body`, `path`) down to the offending
//! field, mixing object keys and list indices. `input` is the value that was
//! submitted at the failing location; for a missing field that is the
//! enclosing object.

use crate::types::{AppError, Decimal, Result};
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

/// One segment of an error location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LocItem {
    Key(String),
    Index(usize),
}

impl From<&str> for LocItem {
    fn from(key: &str) -> Self {
        LocItem::Key(key.to_string())
    }
}

impl From<usize> for LocItem {
    fn from(index: usize) -> Self {
        LocItem::Index(index)
    }
}

/// One entry of the `detail` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationErrorItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub loc: Vec<LocItem>,
    pub msg: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Value>,
}

impl ValidationErrorItem {
    pub fn new(
        kind: impl Into<String>,
        loc: Vec<LocItem>,
        msg: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            loc,
            msg: msg.into(),
            input,
            ctx: None,
        }
    }

    pub fn missing(loc: Vec<LocItem>, input: Value) -> Self {
        Self::new("missing", loc, "Field required", input)
    }

    pub fn with_ctx(mut self, ctx: Value) -> Self {
        self.ctx = Some(ctx);
        self
    }
}

// ============= Schemas =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Int,
    Float,
    Decimal,
    Bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    /// Optional fields may be absent or `null`.
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Top-level shape of a request body.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Object(&'static [Field]),
    ListOf(&'static [Field]),
}

/// A request body type with a declared schema.
pub trait BodySchema: DeserializeOwned {
    const SHAPE: Shape;

    /// Value used when the request carries no body at all. `None` makes the
    /// body itself required.
    fn empty_body() -> Option<Self> {
        None
    }
}

/// JSON body extractor that answers with the validation envelope on failure.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: BodySchema,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;
        parse_body::<T>(&bytes).map(ValidatedJson)
    }
}

/// Parse and validate a raw request body.
pub fn parse_body<T: BodySchema>(bytes: &[u8]) -> Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return T::empty_body().ok_or_else(|| {
            AppError::Validation(vec![ValidationErrorItem::missing(
                vec!["body".into()],
                Value::Null,
            )])
        });
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::Validation(vec![json_invalid(bytes, &e)]))?;

    let normalized = validate_shape(T::SHAPE, &value).map_err(AppError::Validation)?;

    serde_json::from_value(normalized).map_err(|e| {
        AppError::Validation(vec![ValidationErrorItem::new(
            "value_error",
            vec!["body".into()],
            format!("Value error, {e}"),
            value,
        )])
    })
}

/// Parse an integer path parameter.
pub fn parse_path_int(name: &str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        AppError::Validation(vec![ValidationErrorItem::new(
            "int_parsing",
            vec!["path".into(), name.into()],
            "Input should be a valid integer, unable to parse string as an integer",
            Value::String(raw.to_string()),
        )])
    })
}

/// Check `value` against `shape`, returning the coerced value or every error found.
pub fn validate_shape(
    shape: Shape,
    value: &Value,
) -> std::result::Result<Value, Vec<ValidationErrorItem>> {
    let mut errors = Vec::new();
    let root = vec![LocItem::from("body")];

    let normalized = match shape {
        Shape::Object(fields) => validate_object(fields, value, &root, &mut errors),
        Shape::ListOf(fields) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let mut loc = root.clone();
                    loc.push(LocItem::Index(i));
                    if let Some(v) = validate_object(fields, item, &loc, &mut errors) {
                        out.push(v);
                    }
                }
                Some(Value::Array(out))
            }
            other => {
                errors.push(ValidationErrorItem::new(
                    "list_type",
                    root.clone(),
                    "Input should be a valid list",
                    other.clone(),
                ));
                None
            }
        },
    };

    match normalized {
        Some(v) if errors.is_empty() => Ok(v),
        _ => Err(errors),
    }
}

fn validate_object(
    fields: &[Field],
    value: &Value,
    loc: &[LocItem],
    errors: &mut Vec<ValidationErrorItem>,
) -> Option<Value> {
    let Value::Object(obj) = value else {
        errors.push(ValidationErrorItem::new(
            "model_attributes_type",
            loc.to_vec(),
            "Input should be a valid dictionary or object to extract fields from",
            value.clone(),
        ));
        return None;
    };

    let mut out = obj.clone();
    for field in fields {
        let mut field_loc = loc.to_vec();
        field_loc.push(LocItem::from(field.name));

        match obj.get(field.name) {
            None if field.required => {
                errors.push(ValidationErrorItem::missing(field_loc, value.clone()));
            }
            None => {}
            Some(Value::Null) if !field.required => {}
            Some(raw) => match coerce(field.ty, raw) {
                Ok(v) => {
                    out.insert(field.name.to_string(), v);
                }
                Err((kind, msg)) => {
                    errors.push(ValidationErrorItem::new(kind, field_loc, msg, raw.clone()));
                }
            },
        }
    }

    Some(Value::Object(out))
}

type CoerceError = (&'static str, &'static str);

fn coerce(ty: FieldType, raw: &Value) -> std::result::Result<Value, CoerceError> {
    match ty {
        FieldType::Str => match raw {
            Value::String(_) => Ok(raw.clone()),
            _ => Err(("string_type", "Input should be a valid string")),
        },
        FieldType::Int => coerce_int(raw),
        FieldType::Float => coerce_float(raw),
        FieldType::Decimal => coerce_decimal(raw),
        FieldType::Bool => coerce_bool(raw),
    }
}

fn coerce_int(raw: &Value) -> std::result::Result<Value, CoerceError> {
    const FRACTIONAL: CoerceError = (
        "int_from_float",
        "Input should be a valid integer, got a number with a fractional part",
    );
    match raw {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(raw.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(Value::from(f as i64))
            }
            _ => Err(FRACTIONAL),
        },
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
            (
                "int_parsing",
                "Input should be a valid integer, unable to parse string as an integer",
            )
        }),
        _ => Err(("int_type", "Input should be a valid integer")),
    }
}

fn coerce_float(raw: &Value) -> std::result::Result<Value, CoerceError> {
    match raw {
        Value::Number(_) => Ok(raw.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or((
                "float_parsing",
                "Input should be a valid number, unable to parse string as a number",
            )),
        _ => Err(("float_type", "Input should be a valid number")),
    }
}

fn coerce_decimal(raw: &Value) -> std::result::Result<Value, CoerceError> {
    match raw {
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::String(s) => s
            .parse::<Decimal>()
            .map(|_| Value::String(s.trim().to_string()))
            .map_err(|_| ("decimal_parsing", "Input should be a valid decimal")),
        _ => Err((
            "decimal_type",
            "Decimal input should be an integer, float, string or Decimal object",
        )),
    }
}

fn coerce_bool(raw: &Value) -> std::result::Result<Value, CoerceError> {
    const UNINTERPRETABLE: CoerceError = (
        "bool_parsing",
        "Input should be a valid boolean, unable to interpret input",
    );
    match raw {
        Value::Bool(_) => Ok(raw.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(UNINTERPRETABLE),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(UNINTERPRETABLE),
        },
        _ => Err(("bool_type", "Input should be a valid boolean")),
    }
}

fn json_invalid(bytes: &[u8], err: &serde_json::Error) -> ValidationErrorItem {
    let position = byte_offset(bytes, err.line(), err.column());
    let message = err.to_string();
    let reason = message
        .split(" at line ")
        .next()
        .unwrap_or(message.as_str())
        .to_string();

    ValidationErrorItem::new(
        "json_invalid",
        vec!["body".into(), LocItem::Index(position)],
        "JSON decode error",
        Value::Object(Default::default()),
    )
    .with_ctx(serde_json::json!({ "error": reason }))
}

/// Convert serde_json's 1-based line/column into a byte offset.
fn byte_offset(bytes: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = bytes
        .split(|b| *b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column.saturating_sub(1)).min(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Cart {
        name: String,
        price: Decimal,
        count: i64,
    }

    #[derive(Debug, Deserialize)]
    #[serde(transparent)]
    struct Carts(Vec<Cart>);

    impl BodySchema for Carts {
        const SHAPE: Shape = Shape::ListOf(&[
            Field::required("name", FieldType::Str),
            Field::required("price", FieldType::Decimal),
            Field::required("count", FieldType::Int),
        ]);
    }

    #[derive(Debug, Deserialize)]
    struct Toggle {
        #[serde(default)]
        enabled: Option<bool>,
    }

    impl BodySchema for Toggle {
        const SHAPE: Shape = Shape::Object(&[Field::optional("enabled", FieldType::Bool)]);

        fn empty_body() -> Option<Self> {
            Some(Toggle { enabled: None })
        }
    }

    fn validation_errors(err: AppError) -> Vec<ValidationErrorItem> {
        match err {
            AppError::Validation(items) => items,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_in_list_item() {
        let body = json!([
            {"name": "apple", "price": 1.5, "count": 2},
            {"name": "pear", "price": "0.5", "count": 1},
            {"name": "kiwi", "price": 0.19}
        ]);
        let err = parse_body::<Carts>(body.to_string().as_bytes()).unwrap_err();
        let errors = validation_errors(err);

        assert_eq!(errors.len(), 1);
        let rendered = serde_json::to_value(&errors[0]).unwrap();
        assert_eq!(
            rendered,
            json!({
                "type": "missing",
                "loc": ["body", 2, "count"],
                "msg": "Field required",
                "input": {"name": "kiwi", "price": 0.19}
            })
        );
    }

    #[test]
    fn test_all_errors_are_reported() {
        let body = json!([{"price": "abc", "count": 1.5}, "oops"]);
        let errors = validation_errors(parse_body::<Carts>(body.to_string().as_bytes()).unwrap_err());

        let kinds: Vec<&str> = errors.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["missing", "decimal_parsing", "int_from_float", "model_attributes_type"]
        );
        assert_eq!(errors[3].loc, vec![LocItem::from("body"), LocItem::Index(1)]);
    }

    #[test]
    fn test_lax_coercion() {
        let body = json!([{"name": "fig", "price": 2, "count": "3"}]);
        let carts = parse_body::<Carts>(body.to_string().as_bytes()).unwrap();
        assert_eq!(carts.0[0].name, "fig");
        assert_eq!(carts.0[0].count, 3);
        assert_eq!(carts.0[0].price.to_string(), "2");
    }

    #[test]
    fn test_non_list_body() {
        let errors = validation_errors(parse_body::<Carts>(b"{}").unwrap_err());
        assert_eq!(errors[0].kind, "list_type");
        assert_eq!(errors[0].loc, vec![LocItem::from("body")]);
    }

    #[test]
    fn test_invalid_json_reports_position() {
        let errors = validation_errors(parse_body::<Carts>(b"[{\"name\": }]").unwrap_err());
        assert_eq!(errors[0].kind, "json_invalid");
        assert_eq!(errors[0].msg, "JSON decode error");
        assert_eq!(errors[0].loc[0], LocItem::from("body"));
        assert!(matches!(errors[0].loc[1], LocItem::Index(_)));
        assert!(errors[0].ctx.is_some());
    }

    #[test]
    fn test_empty_body() {
        let errors = validation_errors(parse_body::<Carts>(b"").unwrap_err());
        assert_eq!(errors[0].kind, "missing");
        assert_eq!(errors[0].input, Value::Null);

        let toggle = parse_body::<Toggle>(b"  ").unwrap();
        assert!(toggle.enabled.is_none());
    }

    #[test]
    fn test_bool_coercion() {
        assert!(parse_body::<Toggle>(br#"{"enabled": "yes"}"#).unwrap().enabled.unwrap());
        assert!(!parse_body::<Toggle>(br#"{"enabled": 0}"#).unwrap().enabled.unwrap());
        assert!(parse_body::<Toggle>(br#"{"enabled": null}"#).unwrap().enabled.is_none());

        let errors = validation_errors(parse_body::<Toggle>(br#"{"enabled": "maybe"}"#).unwrap_err());
        assert_eq!(errors[0].kind, "bool_parsing");
        assert_eq!(errors[0].loc, vec![LocItem::from("body"), LocItem::from("enabled")]);
    }

    #[test]
    fn test_path_int() {
        assert_eq!(parse_path_int("item_id", "42").unwrap(), 42);
        let errors = validation_errors(parse_path_int("item_id", "abc").unwrap_err());
        assert_eq!(errors[0].kind, "int_parsing");
        assert_eq!(errors[0].loc, vec![LocItem::from("path"), LocItem::from("item_id")]);
        assert_eq!(errors[0].input, json!("abc"));
    }

    #[test]
    fn test_byte_offset() {
        assert_eq!(byte_offset(b"abc", 1, 2), 1);
        assert_eq!(byte_offset(b"ab\ncd", 2, 1), 3);
    }
}
