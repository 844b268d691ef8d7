//! Table catalog
//!
//! Holds every table definition in registration order. A table may only
//! reference tables registered before it (or itself), so registration order
//! is also a valid creation order for DDL.
//!
//! On disk the catalog is one JSON file per table:
//! `<schema_dir>/<NN>_<table>.json`, where `NN` is the registration index.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{SchemaError, SchemaResult};
use super::types::{FieldDef, TableDef};

/// Registry of table definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableDef>,
}

impl SchemaCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table definition.
    ///
    /// Fails if the definition is structurally invalid, references an
    /// unregistered table, reuses a related name on the same target, or
    /// redefines an existing table.
    pub fn register(&mut self, table: TableDef) -> SchemaResult<()> {
        table
            .validate_structure()
            .map_err(|e| SchemaError::malformed(table.name.clone(), e))?;

        if self.get(&table.name).is_some() {
            return Err(SchemaError::schema_immutable(&table.name));
        }

        for field in &table.fields {
            let Some((to, _, related_name)) = field.reference() else {
                continue;
            };

            if to != table.name && self.get(to).is_none() {
                return Err(SchemaError::malformed(
                    table.name.clone(),
                    format!("field '{}' references unknown table '{}'", field.name, to),
                ));
            }

            let repeated_here = table
                .fields
                .iter()
                .filter_map(|f| f.reference())
                .filter(|(t, _, r)| *t == to && *r == related_name)
                .count()
                > 1;
            if repeated_here || self.related(to, related_name).is_some() {
                return Err(SchemaError::malformed(
                    table.name.clone(),
                    format!(
                        "related name '{}' is already used on table '{}'",
                        related_name, to
                    ),
                ));
            }
        }

        self.tables.push(table);
        Ok(())
    }

    /// Gets a table by name.
    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Gets a table by name, failing with `COURSE_UNKNOWN_TABLE`.
    pub fn table(&self, name: &str) -> SchemaResult<&TableDef> {
        self.get(name).ok_or_else(|| SchemaError::unknown_table(name))
    }

    /// Returns all tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.iter()
    }

    /// Returns the number of registered tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Every (table, field) pair whose foreign key points at `target`.
    pub fn referencing(&self, target: &str) -> Vec<(&TableDef, &FieldDef)> {
        self.tables
            .iter()
            .flat_map(|t| t.fields.iter().map(move |f| (t, f)))
            .filter(|(_, f)| matches!(f.reference(), Some((to, _, _)) if to == target))
            .collect()
    }

    /// Resolves a reverse relation of `target` by its related name.
    pub fn related(&self, target: &str, related_name: &str) -> Option<(&TableDef, &FieldDef)> {
        self.referencing(target)
            .into_iter()
            .find(|(_, f)| matches!(f.reference(), Some((_, _, r)) if r == related_name))
    }

    /// Writes every table definition to `dir`, one file per table.
    pub fn save_to_dir(&self, dir: &Path) -> SchemaResult<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| {
            SchemaError::malformed(
                dir.display().to_string(),
                format!("Failed to create schema directory: {}", e),
            )
        })?;

        let mut written = Vec::with_capacity(self.tables.len());
        for (index, table) in self.tables.iter().enumerate() {
            let path = dir.join(format!("{:02}_{}.json", index, table.name));

            let content = serde_json::to_string_pretty(table).map_err(|e| {
                SchemaError::malformed(
                    path.display().to_string(),
                    format!("Failed to serialize table: {}", e),
                )
            })?;

            fs::write(&path, content).map_err(|e| {
                SchemaError::malformed(
                    path.display().to_string(),
                    format!("Failed to write file: {}", e),
                )
            })?;

            written.push(path);
        }

        Ok(written)
    }

    /// Loads a catalog previously written by [`SchemaCatalog::save_to_dir`].
    ///
    /// Files are registered in name order, which restores registration order.
    pub fn load_from_dir(dir: &Path) -> SchemaResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            SchemaError::malformed(
                dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let content = fs::read_to_string(&path).map_err(|e| {
                SchemaError::malformed(
                    path.display().to_string(),
                    format!("Failed to read file: {}", e),
                )
            })?;

            let table: TableDef = serde_json::from_str(&content).map_err(|e| {
                SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
            })?;

            catalog.register(table)?;
        }

        Ok(catalog)
    }
}
