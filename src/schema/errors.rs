//! Schema error types
//!
//! Error codes:
//! - COURSE_UNKNOWN_TABLE (REJECT)
//! - COURSE_UNKNOWN_RELATION (REJECT)
//! - COURSE_SCHEMA_VALIDATION_FAILED (REJECT)
//! - COURSE_SCHEMA_IMMUTABLE (REJECT)
//! - COURSE_SCHEMA_MALFORMED (FATAL)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The write or request is rejected; the store is unchanged
    Reject,
    /// The table catalog itself is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Table name not registered
    CourseUnknownTable,
    /// Related name not declared by any reference to the table
    CourseUnknownRelation,
    /// Row violates the table definition
    CourseSchemaValidationFailed,
    /// Attempt to redefine a registered table
    CourseSchemaImmutable,
    /// Table definition is structurally invalid or unreadable
    CourseSchemaMalformed,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::CourseUnknownTable => "COURSE_UNKNOWN_TABLE",
            SchemaErrorCode::CourseUnknownRelation => "COURSE_UNKNOWN_RELATION",
            SchemaErrorCode::CourseSchemaValidationFailed => "COURSE_SCHEMA_VALIDATION_FAILED",
            SchemaErrorCode::CourseSchemaImmutable => "COURSE_SCHEMA_IMMUTABLE",
            SchemaErrorCode::CourseSchemaMalformed => "COURSE_SCHEMA_MALFORMED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::CourseSchemaMalformed => Severity::Fatal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Validation failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field name
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(field, "field to be present", "missing")
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self::new(field, "no undeclared fields", "extra field present")
    }

    pub fn store_assigned(field: impl Into<String>) -> Self {
        Self::new(field, "value assigned by the store", "value supplied")
    }

    pub fn type_mismatch(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(field, expected, actual)
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, "non-null value", "null")
    }

    pub fn blank_value(field: impl Into<String>) -> Self {
        Self::new(field, "non-blank text", "blank")
    }

    pub fn too_long(field: impl Into<String>, max_length: usize, actual_length: usize) -> Self {
        Self::new(
            field,
            format!("at most {} characters", max_length),
            format!("{} characters", actual_length),
        )
    }

    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: impl Into<String>) -> Self {
        Self::new(field, format!("integer in {}..={}", min, max), actual)
    }

    pub fn invalid_choice(field: impl Into<String>, choices: &[String], actual: impl Into<String>) -> Self {
        Self::new(field, format!("one of [{}]", choices.join(", ")), actual)
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': expected {}, got {}", self.field, self.expected, self.actual)
    }
}

/// Schema error type with full context
#[derive(Debug, Clone)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    table: Option<String>,
    details: Option<ValidationDetails>,
}

impl SchemaError {
    /// Create an unknown table error
    pub fn unknown_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            code: SchemaErrorCode::CourseUnknownTable,
            message: format!("Table '{}' not found", table),
            table: Some(table),
            details: None,
        }
    }

    /// Create an unknown relation error
    pub fn unknown_relation(table: impl Into<String>, relation: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            code: SchemaErrorCode::CourseUnknownRelation,
            message: format!("Table '{}' has no relation '{}'", table, relation.into()),
            table: Some(table),
            details: None,
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(table: impl Into<String>, details: ValidationDetails) -> Self {
        Self {
            code: SchemaErrorCode::CourseSchemaValidationFailed,
            message: format!("Row validation failed: {}", details),
            table: Some(table.into()),
            details: Some(details),
        }
    }

    /// Create a schema immutable error
    pub fn schema_immutable(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            code: SchemaErrorCode::CourseSchemaImmutable,
            message: format!("Table '{}' is already defined", table),
            table: Some(table),
            details: None,
        }
    }

    /// Create an error for a malformed table definition or definition file
    pub fn malformed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::CourseSchemaMalformed,
            message: format!("Malformed table definition '{}': {}", source.into(), reason.into()),
            table: None,
            details: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the table name if applicable
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Returns validation details if applicable
    pub fn details(&self) -> Option<&ValidationDetails> {
        self.details.as_ref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
