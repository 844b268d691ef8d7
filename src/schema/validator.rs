//! Row validation against table definitions
//!
//! Validation semantics:
//! - No undeclared fields exist
//! - Required fields are present and non-null
//! - Required text is not blank
//! - Lengths are counted in characters, never bytes
//! - Values match the column type exactly; no coercion
//!
//! Referential integrity and uniqueness need the stored rows and are
//! checked by the store, after this validator has accepted the row.

use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::{Map, Value};

use super::catalog::SchemaCatalog;
use super::errors::{SchemaError, SchemaResult, ValidationDetails};
use super::types::{FieldDef, FieldType, TableDef, ID_FIELD};

static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn url_pattern() -> &'static Regex {
    URL_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:https?|ftps?)://(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)*[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.?(?::\d{1,5})?(?:[/?#]\S*)?$",
        )
        .expect("URL pattern is a valid regex")
    })
}

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s.]+(?:\.[^@\s.]+)+$").expect("email pattern is a valid regex")
    })
}

/// Validator that enforces column constraints on rows.
///
/// The validator never mutates rows and is deterministic.
pub struct RowValidator<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> RowValidator<'a> {
    /// Creates a new validator backed by the given catalog.
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Checks a caller-supplied row before the store fills in generated values.
    ///
    /// The row must be a JSON object and must not carry `id` or any field the
    /// store assigns on insert.
    pub fn validate_draft(&self, table: &str, row: &Value) -> SchemaResult<()> {
        let def = self.catalog.table(table)?;
        let obj = as_row(def, row)?;

        if obj.contains_key(ID_FIELD) {
            return Err(SchemaError::validation_failed(
                table,
                ValidationDetails::store_assigned(ID_FIELD),
            ));
        }

        if let Some(auto) = def.fields.iter().find(|f| f.is_auto() && obj.contains_key(&f.name)) {
            return Err(SchemaError::validation_failed(
                table,
                ValidationDetails::store_assigned(&auto.name),
            ));
        }

        Ok(())
    }

    /// Validates a complete row. The `id` column must not be present.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if:
    /// - The table is not registered (COURSE_UNKNOWN_TABLE)
    /// - Any column constraint is violated (COURSE_SCHEMA_VALIDATION_FAILED)
    pub fn validate_row(&self, table: &str, row: &Map<String, Value>) -> SchemaResult<()> {
        let def = self.catalog.table(table)?;

        for key in row.keys() {
            if def.field(key).is_none() {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::extra_field(key),
                ));
            }
        }

        for field in &def.fields {
            match row.get(&field.name) {
                None | Some(Value::Null) if field.nullable => {}
                None => {
                    return Err(SchemaError::validation_failed(
                        table,
                        ValidationDetails::missing_field(&field.name),
                    ));
                }
                Some(Value::Null) => {
                    return Err(SchemaError::validation_failed(
                        table,
                        ValidationDetails::null_value(&field.name),
                    ));
                }
                Some(value) => validate_value(table, field, value)?,
            }
        }

        Ok(())
    }
}

fn as_row<'v>(def: &TableDef, row: &'v Value) -> SchemaResult<&'v Map<String, Value>> {
    row.as_object().ok_or_else(|| {
        SchemaError::validation_failed(
            &def.name,
            ValidationDetails::type_mismatch("$row", "object", json_type_name(row)),
        )
    })
}

/// Validates a non-null value against its column.
fn validate_value(table: &str, field: &FieldDef, value: &Value) -> SchemaResult<()> {
    let name = field.name.as_str();

    if let FieldType::Integer { min, max } = field.field_type {
        let n = match value.as_i64() {
            Some(n) => n,
            None if value.is_u64() => {
                return Err(range_error(table, name, min, max, value));
            }
            None => return Err(type_error(table, name, "integer", value)),
        };
        if n < min || n > max {
            return Err(range_error(table, name, min, max, value));
        }
        return Ok(());
    }

    if let FieldType::ForeignKey { .. } = field.field_type {
        return match value.as_i64() {
            Some(id) if id >= 1 => Ok(()),
            _ => Err(SchemaError::validation_failed(
                table,
                ValidationDetails::type_mismatch(name, "positive row id", value.to_string()),
            )),
        };
    }

    // Every remaining column type is stored as a string.
    let s = value
        .as_str()
        .ok_or_else(|| type_error(table, name, field.field_type.type_name(), value))?;

    if let Some(max_length) = field.field_type.max_length() {
        let length = s.chars().count();
        if length > max_length {
            return Err(SchemaError::validation_failed(
                table,
                ValidationDetails::too_long(name, max_length, length),
            ));
        }
    }

    match &field.field_type {
        FieldType::Text { .. } => {
            if !field.nullable && s.trim().is_empty() {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::blank_value(name),
                ));
            }
        }
        FieldType::Timestamp { .. } => {
            if DateTime::parse_from_rfc3339(s).is_err() {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::type_mismatch(name, "RFC 3339 timestamp", s),
                ));
            }
        }
        FieldType::Email { .. } => {
            if !email_pattern().is_match(s) {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::type_mismatch(name, "email address", s),
                ));
            }
        }
        FieldType::Url { .. } => {
            if !url_pattern().is_match(s) {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::type_mismatch(name, "absolute http(s) or ftp(s) URL", s),
                ));
            }
        }
        FieldType::Image { upload_to, .. } => {
            if !is_upload_path(upload_to, s) {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::type_mismatch(
                        name,
                        format!("file path under '{}/'", upload_to),
                        s,
                    ),
                ));
            }
        }
        FieldType::Choice { choices, .. } => {
            if !choices.iter().any(|c| c == s) {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::invalid_choice(name, choices, s),
                ));
            }
        }
        FieldType::Integer { .. } | FieldType::ForeignKey { .. } => {}
    }

    Ok(())
}

/// A stored upload path: `<upload_to>/<file>` with no traversal segments.
fn is_upload_path(upload_to: &str, path: &str) -> bool {
    let Some(rest) = path
        .strip_prefix(upload_to)
        .and_then(|r| r.strip_prefix('/'))
    else {
        return false;
    };

    !rest.is_empty()
        && !path.contains('\\')
        && rest
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Returns the JSON type name for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(table: &str, field: &str, expected: &str, actual: &Value) -> SchemaError {
    SchemaError::validation_failed(
        table,
        ValidationDetails::type_mismatch(field, expected, json_type_name(actual)),
    )
}

fn range_error(table: &str, field: &str, min: i64, max: i64, actual: &Value) -> SchemaError {
    SchemaError::validation_failed(
        table,
        ValidationDetails::out_of_range(field, min, max, actual.to_string()),
    )
}
