//! Schema validation of JSON values
//!
//! Responses are validated leniently: unknown fields are tolerated and left
//! in place. Request bodies are validated strictly: unknown fields are
//! rejected before anything is sent.

use super::registry::{FieldType, SchemaDefinition, SchemaRegistry, StringFormat};
use crate::error::Mismatch;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `user@domain.tld`, with Campus user-id and domain character sets
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]{1,64}@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("invalid email regex")
});

/// Validate a response body against a schema; extra fields are allowed
pub fn validate_response(
    registry: &SchemaRegistry,
    schema: &str,
    value: &Value,
) -> Result<(), Mismatch> {
    Validator {
        registry,
        root: schema,
        strict: false,
    }
    .check_named(schema, value, "")
}

/// Validate a request body against a schema; extra fields are rejected
pub fn validate_request(
    registry: &SchemaRegistry,
    schema: &str,
    value: &Value,
) -> Result<(), Mismatch> {
    Validator {
        registry,
        root: schema,
        strict: true,
    }
    .check_named(schema, value, "")
}

struct Validator<'a> {
    registry: &'a SchemaRegistry,
    root: &'a str,
    strict: bool,
}

impl Validator<'_> {
    fn mismatch(&self, path: &str, reason: impl Into<String>) -> Mismatch {
        Mismatch {
            schema: self.root.to_string(),
            field_path: if path.is_empty() {
                "$".to_string()
            } else {
                path.to_string()
            },
            reason: reason.into(),
        }
    }

    fn check_named(&self, name: &str, value: &Value, path: &str) -> Result<(), Mismatch> {
        let schema = self
            .registry
            .resolve(name)
            .map_err(|_| self.mismatch(path, format!("schema `{}` is not defined", name)))?;
        self.check_object(schema, value, path)
    }

    fn check_object(
        &self,
        schema: &SchemaDefinition,
        value: &Value,
        path: &str,
    ) -> Result<(), Mismatch> {
        let Some(map) = value.as_object() else {
            return Err(self.mismatch(
                path,
                format!("expected object `{}`, found {}", schema.name, type_name(value)),
            ));
        };

        for (name, field) in &schema.fields {
            let field_path = join(path, name);
            match map.get(name) {
                None if field.required => {
                    return Err(self.mismatch(&field_path, "required field is missing"));
                }
                None => {}
                Some(Value::Null) if field.required && !field.nullable => {
                    return Err(self.mismatch(&field_path, "required field is null"));
                }
                Some(Value::Null) => {}
                Some(v) => self.check_type(&field.ty, v, &field_path)?,
            }
        }

        if self.strict {
            if let Some(unknown) = map.keys().find(|k| schema.field(k).is_none()) {
                return Err(self.mismatch(
                    &join(path, unknown),
                    format!("field is not part of `{}`", schema.name),
                ));
            }
        }

        Ok(())
    }

    fn check_type(&self, ty: &FieldType, value: &Value, path: &str) -> Result<(), Mismatch> {
        let wrong = || {
            self.mismatch(
                path,
                format!("expected {}, found {}", ty.describe(), type_name(value)),
            )
        };

        match ty {
            FieldType::Any => Ok(()),
            FieldType::Boolean => value.is_boolean().then_some(()).ok_or_else(wrong),
            FieldType::Number => value.is_number().then_some(()).ok_or_else(wrong),
            FieldType::Integer => (value.is_i64() || value.is_u64())
                .then_some(())
                .ok_or_else(wrong),
            FieldType::String { format, pattern } => {
                let s = value.as_str().ok_or_else(wrong)?;
                if let Some(format) = format {
                    if !matches_format(*format, s) {
                        return Err(self.mismatch(
                            path,
                            format!("`{}` is not a valid {}", s, format.as_str()),
                        ));
                    }
                }
                if let Some(re) = pattern {
                    if !re.is_match(s) {
                        return Err(self.mismatch(
                            path,
                            format!("`{}` does not match pattern `{}`", s, re.as_str()),
                        ));
                    }
                }
                Ok(())
            }
            FieldType::Array(items) => {
                let arr = value.as_array().ok_or_else(wrong)?;
                for (i, item) in arr.iter().enumerate() {
                    self.check_type(items, item, &format!("{}[{}]", path, i))?;
                }
                Ok(())
            }
            FieldType::Map(values) => {
                let map = value.as_object().ok_or_else(wrong)?;
                for (key, item) in map {
                    self.check_type(values, item, &join(path, key))?;
                }
                Ok(())
            }
            FieldType::Object(name) => self.check_named(name, value, path),
        }
    }
}

fn matches_format(format: StringFormat, s: &str) -> bool {
    match format {
        StringFormat::Email => EMAIL_RE.is_match(s),
        StringFormat::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        StringFormat::Time => chrono::NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok(),
        StringFormat::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
        StringFormat::Uri => url::Url::parse(s).is_ok(),
    }
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMAS: &str = r#"
User:
  fields:
    name: { type: string, required: true }
    email: { type: string, format: email }
    activated_at: { type: string, format: date-time, nullable: true, required: true }
Circle:
  recursive: true
  fields:
    id: { type: string, required: true, pattern: "^uid-circle-[a-z0-9]{8}$" }
    members: { type: map, values: { type: integer } }
    owner: { type: object, ref: User }
    children: { type: array, items: { type: object, ref: Circle } }
"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::load(SCHEMAS).unwrap()
    }

    fn user() -> Value {
        json!({"name": "alice", "email": "alice@example.com", "activated_at": null})
    }

    #[test]
    fn test_valid_user() {
        assert_eq!(validate_response(&registry(), "User", &user()), Ok(()));
    }

    #[test]
    fn test_missing_required_field_named() {
        let err = validate_response(&registry(), "User", &json!({"activated_at": null})).unwrap_err();
        assert_eq!(err.field_path, "name");
        assert_eq!(err.schema, "User");
    }

    #[test]
    fn test_extra_fields_tolerated_in_responses() {
        let mut value = user();
        value["nickname"] = json!("al");
        assert_eq!(validate_response(&registry(), "User", &value), Ok(()));
    }

    #[test]
    fn test_extra_fields_rejected_in_requests() {
        let mut value = user();
        value["nickname"] = json!("al");
        let err = validate_request(&registry(), "User", &value).unwrap_err();
        assert_eq!(err.field_path, "nickname");
    }

    #[test]
    fn test_wrong_type() {
        let mut value = user();
        value["name"] = json!(42);
        let err = validate_response(&registry(), "User", &value).unwrap_err();
        assert_eq!(err.field_path, "name");
        assert!(err.reason.contains("expected string, found number"));
    }

    #[test]
    fn test_nullable_and_optional_nulls() {
        let mut value = user();
        value["email"] = Value::Null;
        assert_eq!(validate_response(&registry(), "User", &value), Ok(()));

        value["name"] = Value::Null;
        let err = validate_response(&registry(), "User", &value).unwrap_err();
        assert_eq!(err.field_path, "name");
    }

    #[test]
    fn test_formats() {
        let mut value = user();
        value["email"] = json!("not-an-email");
        assert_eq!(
            validate_response(&registry(), "User", &value).unwrap_err().field_path,
            "email"
        );

        let mut value = user();
        value["activated_at"] = json!("2024-13-01T00:00:00Z");
        assert!(validate_response(&registry(), "User", &value).is_err());

        value["activated_at"] = json!("2024-01-31T08:30:00Z");
        assert!(validate_response(&registry(), "User", &value).is_ok());
    }

    #[test]
    fn test_other_formats() {
        assert!(matches_format(StringFormat::Date, "2023-10-01"));
        assert!(!matches_format(StringFormat::Date, "2023-02-30"));
        assert!(matches_format(StringFormat::Time, "12:00:00"));
        assert!(!matches_format(StringFormat::Time, "24:00:00"));
        assert!(matches_format(StringFormat::Uri, "https://example.com/x"));
        assert!(!matches_format(StringFormat::Uri, "not a uri"));
    }

    #[test]
    fn test_nested_paths() {
        let value = json!({
            "id": "uid-circle-abcd1234",
            "members": {"uid-user-aaaaaaaa": 1, "uid-user-bbbbbbbb": "x"},
        });
        let err = validate_response(&registry(), "Circle", &value).unwrap_err();
        assert_eq!(err.field_path, "members.uid-user-bbbbbbbb");
        assert_eq!(err.schema, "Circle");

        let value = json!({
            "id": "uid-circle-abcd1234",
            "owner": {"activated_at": null},
        });
        let err = validate_response(&registry(), "Circle", &value).unwrap_err();
        assert_eq!(err.field_path, "owner.name");
    }

    #[test]
    fn test_recursive_schema_validates_finite_data() {
        let value = json!({
            "id": "uid-circle-aaaaaaaa",
            "children": [
                {"id": "uid-circle-bbbbbbbb", "children": []},
                {"id": "bad", "children": []}
            ]
        });
        let err = validate_response(&registry(), "Circle", &value).unwrap_err();
        assert_eq!(err.field_path, "children[1].id");
    }

    #[test]
    fn test_non_object_root() {
        let err = validate_response(&registry(), "User", &json!([1, 2])).unwrap_err();
        assert_eq!(err.field_path, "$");
        assert!(err.reason.contains("found array"));
    }

    #[test]
    fn test_integer_rejects_float() {
        let value = json!({"id": "uid-circle-aaaaaaaa", "members": {"a": 1.5}});
        assert!(validate_response(&registry(), "Circle", &value).is_err());
    }
}
