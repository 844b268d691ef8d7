//! Table and field definitions
//!
//! A table is an ordered list of fields plus table-level uniqueness groups.
//! Every table carries an implicit `id` column assigned by the store, so
//! `id` may never be declared as a field.
//!
//! Supported field types:
//! - text: UTF-8 string, optionally bounded in characters
//! - integer: 64-bit signed integer within an inclusive range
//! - timestamp: RFC 3339 instant, optionally assigned once at creation
//! - email: mailbox address `local@domain.tld`
//! - url: absolute http(s)/ftp(s) URL
//! - image: relative path under an upload directory
//! - choice: one of a fixed set of string values
//! - foreign_key: integer id of a row in another table

use serde::{Deserialize, Serialize};

/// Name of the implicit surrogate key column.
pub const ID_FIELD: &str = "id";

/// Largest value a positive integer column may hold.
pub const POSITIVE_INTEGER_MAX: i64 = 2_147_483_647;

/// Default bound for URL columns.
pub const URL_DEFAULT_MAX_LENGTH: usize = 200;

/// Default bound for image path columns.
pub const IMAGE_DEFAULT_MAX_LENGTH: usize = 100;

/// What happens to a referencing row when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// Delete the referencing row as well
    Cascade,
    /// Clear the referencing field
    SetNull,
}

impl OnDelete {
    /// SQL spelling of the referential action
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

/// Column types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 string; unbounded when `max_length` is absent
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    /// Integer within `min..=max`
    Integer { min: i64, max: i64 },
    /// RFC 3339 timestamp
    Timestamp {
        /// Assigned by the store on insert and never changed afterwards
        #[serde(default)]
        auto_now_add: bool,
    },
    /// Mailbox address
    Email { max_length: usize },
    /// Absolute URL
    Url { max_length: usize },
    /// Relative image path stored under `upload_to`
    Image { upload_to: String, max_length: usize },
    /// Enumerated string value
    Choice { choices: Vec<String>, max_length: usize },
    /// Reference to the `id` of a row in table `to`
    ForeignKey {
        to: String,
        on_delete: OnDelete,
        related_name: String,
    },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text { .. } => "text",
            FieldType::Integer { .. } => "integer",
            FieldType::Timestamp { .. } => "timestamp",
            FieldType::Email { .. } => "email",
            FieldType::Url { .. } => "url",
            FieldType::Image { .. } => "image",
            FieldType::Choice { .. } => "choice",
            FieldType::ForeignKey { .. } => "foreign_key",
        }
    }

    /// Upper bound on string length in characters, if any
    pub fn max_length(&self) -> Option<usize> {
        match self {
            FieldType::Text { max_length } => *max_length,
            FieldType::Email { max_length }
            | FieldType::Url { max_length }
            | FieldType::Image { max_length, .. }
            | FieldType::Choice { max_length, .. } => Some(*max_length),
            FieldType::Integer { .. }
            | FieldType::Timestamp { .. }
            | FieldType::ForeignKey { .. } => None,
        }
    }
}

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name as it appears in rows
    pub name: String,
    /// Column type and its type-specific constraints
    #[serde(flatten)]
    pub field_type: FieldType,
    /// Whether the column accepts null (and blank text)
    #[serde(default)]
    pub nullable: bool,
    /// Whether non-null values must be unique across the table
    #[serde(default)]
    pub unique: bool,
    /// Human-readable label
    pub verbose_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl FieldDef {
    fn new(name: &str, field_type: FieldType, verbose_name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: false,
            unique: false,
            verbose_name: verbose_name.to_string(),
            help_text: None,
        }
    }

    /// Bounded text column
    pub fn char(name: &str, max_length: usize, verbose_name: &str) -> Self {
        Self::new(
            name,
            FieldType::Text {
                max_length: Some(max_length),
            },
            verbose_name,
        )
    }

    /// Unbounded text column
    pub fn text(name: &str, verbose_name: &str) -> Self {
        Self::new(name, FieldType::Text { max_length: None }, verbose_name)
    }

    /// Integer column accepting `0..=2147483647`
    pub fn positive_integer(name: &str, verbose_name: &str) -> Self {
        Self::new(
            name,
            FieldType::Integer {
                min: 0,
                max: POSITIVE_INTEGER_MAX,
            },
            verbose_name,
        )
    }

    /// Timestamp assigned once when the row is created
    pub fn created_timestamp(name: &str, verbose_name: &str) -> Self {
        Self::new(
            name,
            FieldType::Timestamp { auto_now_add: true },
            verbose_name,
        )
    }

    pub fn email(name: &str, max_length: usize, verbose_name: &str) -> Self {
        Self::new(name, FieldType::Email { max_length }, verbose_name)
    }

    pub fn url(name: &str, max_length: usize, verbose_name: &str) -> Self {
        Self::new(name, FieldType::Url { max_length }, verbose_name)
    }

    pub fn image(name: &str, upload_to: &str, verbose_name: &str) -> Self {
        Self::new(
            name,
            FieldType::Image {
                upload_to: upload_to.to_string(),
                max_length: IMAGE_DEFAULT_MAX_LENGTH,
            },
            verbose_name,
        )
    }

    pub fn choice(name: &str, choices: &[&str], max_length: usize, verbose_name: &str) -> Self {
        Self::new(
            name,
            FieldType::Choice {
                choices: choices.iter().map(|c| c.to_string()).collect(),
                max_length,
            },
            verbose_name,
        )
    }

    pub fn foreign_key(
        name: &str,
        to: &str,
        on_delete: OnDelete,
        related_name: &str,
        verbose_name: &str,
    ) -> Self {
        Self::new(
            name,
            FieldType::ForeignKey {
                to: to.to_string(),
                on_delete,
                related_name: related_name.to_string(),
            },
            verbose_name,
        )
    }

    /// Marks the field as accepting null and blank values
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the field as unique across the table
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn help(mut self, help_text: &str) -> Self {
        self.help_text = Some(help_text.to_string());
        self
    }

    /// Whether the store assigns this field on insert
    pub fn is_auto(&self) -> bool {
        matches!(self.field_type, FieldType::Timestamp { auto_now_add: true })
    }

    /// Foreign key target, referential action and related name, if this is a reference
    pub fn reference(&self) -> Option<(&str, OnDelete, &str)> {
        match &self.field_type {
            FieldType::ForeignKey {
                to,
                on_delete,
                related_name,
            } => Some((to.as_str(), *on_delete, related_name.as_str())),
            _ => None,
        }
    }

    /// Physical column name; references are stored as `<name>_id`
    pub fn column_name(&self) -> String {
        match self.field_type {
            FieldType::ForeignKey { .. } => format!("{}_id", self.name),
            _ => self.name.clone(),
        }
    }
}

/// Complete table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Unique table name
    pub name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    /// Columns in declaration order, excluding the implicit `id`
    pub fields: Vec<FieldDef>,
    /// Groups of fields whose combined non-null values must be unique
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_together: Vec<Vec<String>>,
}

impl TableDef {
    /// Create a new table definition
    pub fn new(
        name: impl Into<String>,
        verbose_name: impl Into<String>,
        verbose_name_plural: impl Into<String>,
        fields: Vec<FieldDef>,
    ) -> Self {
        Self {
            name: name.into(),
            verbose_name: verbose_name.into(),
            verbose_name_plural: verbose_name_plural.into(),
            fields,
            unique_together: Vec::new(),
        }
    }

    /// Adds a uniqueness group
    pub fn unique_together(mut self, fields: &[&str]) -> Self {
        self.unique_together
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All uniqueness groups, single-field `unique` flags included
    pub fn unique_groups(&self) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<String>> = self
            .fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| vec![f.name.clone()])
            .collect();
        groups.extend(self.unique_together.iter().cloned());
        groups
    }

    /// Validates the table definition itself (not a row)
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Table name must not be empty".into());
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name == ID_FIELD {
                return Err(format!("'{}' is reserved for the surrogate key", ID_FIELD));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(format!("Field '{}' declared twice", field.name));
            }
            if field.field_type.max_length() == Some(0) {
                return Err(format!("Field '{}' has zero max_length", field.name));
            }

            match &field.field_type {
                FieldType::Integer { min, max } if min > max => {
                    return Err(format!("Field '{}' has empty integer range", field.name));
                }
                FieldType::Choice { choices, max_length } => {
                    if choices.is_empty() {
                        return Err(format!("Field '{}' declares no choices", field.name));
                    }
                    if let Some(c) = choices.iter().find(|c| c.chars().count() > *max_length) {
                        return Err(format!(
                            "Choice '{}' of field '{}' exceeds max_length {}",
                            c, field.name, max_length
                        ));
                    }
                }
                FieldType::ForeignKey { on_delete, .. } => {
                    if *on_delete == OnDelete::SetNull && !field.nullable {
                        return Err(format!(
                            "Field '{}' uses SET NULL but is not nullable",
                            field.name
                        ));
                    }
                }
                _ => {}
            }
        }

        for group in &self.unique_together {
            if group.is_empty() {
                return Err("unique_together group must not be empty".into());
            }
            if let Some(missing) = group.iter().find(|f| self.field(f).is_none()) {
                return Err(format!(
                    "unique_together names undeclared field '{}'",
                    missing
                ));
            }
        }

        Ok(())
    }
}
