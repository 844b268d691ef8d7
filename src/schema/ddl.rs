//! SQL DDL rendering (SQLite dialect)
//!
//! Each table becomes one `CREATE TABLE` statement with:
//! - `id INTEGER PRIMARY KEY AUTOINCREMENT`
//! - `NOT NULL` on every non-nullable column
//! - `CHECK` constraints for integer ranges and enumerations
//! - `REFERENCES ... ON DELETE CASCADE | SET NULL` for foreign keys
//! - table-level `UNIQUE (...)` for each uniqueness group
//!
//! Statements are emitted in catalog order, so referenced tables come first.

use super::catalog::SchemaCatalog;
use super::types::{FieldDef, FieldType, TableDef, ID_FIELD};

/// Renders the whole catalog, one statement per table.
pub fn render_catalog(catalog: &SchemaCatalog) -> String {
    catalog
        .tables()
        .map(render_table)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders a single `CREATE TABLE` statement.
pub fn render_table(table: &TableDef) -> String {
    let mut lines = vec![format!(
        "    {} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote(ID_FIELD)
    )];

    lines.extend(table.fields.iter().map(render_column));

    for group in table.unique_groups() {
        let columns: Vec<String> = group
            .iter()
            .filter_map(|name| table.field(name))
            .map(|f| quote(&f.column_name()))
            .collect();
        lines.push(format!("    UNIQUE ({})", columns.join(", ")));
    }

    format!(
        "CREATE TABLE {} (\n{}\n);",
        quote(&table.name),
        lines.join(",\n")
    )
}

fn render_column(field: &FieldDef) -> String {
    let column = quote(&field.column_name());

    let sql_type = match &field.field_type {
        FieldType::Text { max_length: None } => "TEXT".to_string(),
        FieldType::Integer { .. } | FieldType::ForeignKey { .. } => "INTEGER".to_string(),
        FieldType::Timestamp { .. } => "DATETIME".to_string(),
        other => match other.max_length() {
            Some(n) => format!("VARCHAR({})", n),
            None => "TEXT".to_string(),
        },
    };

    let mut parts = vec![column.clone(), sql_type];
    parts.push(if field.nullable { "NULL" } else { "NOT NULL" }.to_string());

    match &field.field_type {
        FieldType::Integer { min, max } => {
            parts.push(format!("CHECK ({} BETWEEN {} AND {})", column, min, max));
        }
        FieldType::Choice { choices, .. } => {
            let values: Vec<String> = choices.iter().map(|c| literal(c)).collect();
            parts.push(format!("CHECK ({} IN ({}))", column, values.join(", ")));
        }
        FieldType::ForeignKey { to, on_delete, .. } => {
            parts.push(format!(
                "REFERENCES {} ({}) ON DELETE {}",
                quote(to),
                quote(ID_FIELD),
                on_delete.sql()
            ));
        }
        _ => {}
    }

    format!("    {}", parts.join(" "))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::models::course_platform_catalog;

    #[test]
    fn test_subscription_statement() {
        let catalog = course_platform_catalog().unwrap();
        let sql = render_table(catalog.table("subscription").unwrap());

        assert!(sql.starts_with("CREATE TABLE \"subscription\" ("));
        assert!(sql.contains(
            "\"user_id\" INTEGER NOT NULL REFERENCES \"user\" (\"id\") ON DELETE CASCADE"
        ));
        assert!(sql.contains(
            "\"course_id\" INTEGER NOT NULL REFERENCES \"course\" (\"id\") ON DELETE CASCADE"
        ));
        assert!(sql.contains("\"created_at\" DATETIME NOT NULL"));
        assert!(sql.contains("UNIQUE (\"user_id\", \"course_id\")"));
        assert!(sql.ends_with(");"));
    }

    #[test]
    fn test_payment_statement() {
        let catalog = course_platform_catalog().unwrap();
        let sql = render_table(catalog.table("payment").unwrap());

        assert!(sql.contains("\"payment_type\" VARCHAR(16) NOT NULL CHECK (\"payment_type\" IN ('cash', 'transfer'))"));
        assert!(sql.contains("\"price\" INTEGER NULL CHECK (\"price\" BETWEEN 0 AND 2147483647)"));
        assert!(sql.contains(
            "\"paid_lesson_id\" INTEGER NULL REFERENCES \"lesson\" (\"id\") ON DELETE SET NULL"
        ));
        assert!(sql.contains("\"link\" VARCHAR(400) NULL"));
    }

    #[test]
    fn test_course_statement() {
        let catalog = course_platform_catalog().unwrap();
        let sql = render_table(catalog.table("course").unwrap());

        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"name\" VARCHAR(255) NOT NULL"));
        assert!(sql.contains("\"preview\" VARCHAR(100) NULL"));
        assert!(sql.contains("\"description\" TEXT NULL"));
    }

    #[test]
    fn test_catalog_order() {
        let catalog = course_platform_catalog().unwrap();
        let sql = render_catalog(&catalog);

        let position = |table: &str| sql.find(&format!("CREATE TABLE \"{}\"", table)).unwrap();
        assert!(position("user") < position("course"));
        assert!(position("course") < position("lesson"));
        assert!(position("lesson") < position("payment"));
        assert_eq!(sql.matches("CREATE TABLE").count(), 5);
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(literal("it's"), "'it''s'");
    }
}
