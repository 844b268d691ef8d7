//! In-memory relational store driven by the table catalog
//!
//! Write path:
//! 1. Column validation (RowValidator)
//! 2. Referential integrity: every non-null reference points at a live row
//! 3. Uniqueness groups, ignoring groups that contain a null
//! 4. Row becomes visible
//!
//! Every check runs before the first mutation, so a rejected write leaves
//! the store unchanged. Deletes compute the whole cascade plan first and
//! then apply it in one step.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::observability::{log_event_with_fields, Event};
use crate::schema::{
    course_platform_catalog, json_type_name, Draft, Model, OnDelete, RowValidator, SchemaCatalog,
    SchemaError, Subscription, SubscriptionView, User, ValidationDetails, ID_FIELD,
};

use super::errors::{StoreError, StoreResult};
use super::snapshot::{self, SnapshotBody};

/// A row as stored: column name to value, without the `id` column.
pub type Row = Map<String, Value>;

/// A row identified by table and id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RowRef {
    pub table: String,
    pub id: i64,
}

impl RowRef {
    fn new(table: &str, id: i64) -> Self {
        Self {
            table: table.to_string(),
            id,
        }
    }
}

/// A reference cleared by a SET NULL action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NulledField {
    pub table: String,
    pub id: i64,
    pub field: String,
}

/// Everything a delete removed or changed, the requested row included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub deleted: Vec<RowRef>,
    pub nulled: Vec<NulledField>,
}

impl DeleteSummary {
    /// Number of deleted rows in `table`
    pub fn deleted_in(&self, table: &str) -> usize {
        self.deleted.iter().filter(|r| r.table == table).count()
    }

    /// Number of cleared references in `table`
    pub fn nulled_in(&self, table: &str) -> usize {
        self.nulled.iter().filter(|n| n.table == table).count()
    }
}

/// The store.
#[derive(Debug, Clone)]
pub struct Database {
    catalog: SchemaCatalog,
    tables: BTreeMap<String, BTreeMap<i64, Row>>,
    /// Last id handed out per table; ids are never reused
    sequences: BTreeMap<String, i64>,
}

impl Database {
    /// Creates an empty store for the given catalog.
    pub fn new(catalog: SchemaCatalog) -> Self {
        let tables = catalog
            .tables()
            .map(|t| (t.name.clone(), BTreeMap::new()))
            .collect();
        let sequences = catalog.tables().map(|t| (t.name.clone(), 0)).collect();

        Self {
            catalog,
            tables,
            sequences,
        }
    }

    /// Creates an empty store with the course platform tables.
    pub fn course_platform() -> StoreResult<Self> {
        Ok(Self::new(course_platform_catalog()?))
    }

    /// Opens a store from a snapshot file.
    pub fn open(catalog: SchemaCatalog, path: &Path) -> StoreResult<Self> {
        let body = snapshot::read_snapshot(path)?;
        let db = Self::from_snapshot(catalog, body)?;

        log_event_with_fields(
            Event::SnapshotLoaded,
            &[
                ("path", &path.display().to_string()),
                ("rows", &db.total_rows().to_string()),
            ],
        );
        Ok(db)
    }

    /// Writes the store to a snapshot file, replacing it atomically.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        snapshot::write_snapshot(path, &self.to_snapshot())?;

        log_event_with_fields(
            Event::SnapshotSaved,
            &[
                ("path", &path.display().to_string()),
                ("rows", &self.total_rows().to_string()),
            ],
        );
        Ok(())
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> StoreResult<usize> {
        Ok(self.rows(table)?.len())
    }

    fn total_rows(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    // ==================
    // Row API
    // ==================

    /// Inserts a row and returns it with its assigned `id`.
    ///
    /// The row must not carry `id` or creation timestamps; absent nullable
    /// fields are stored as null.
    pub fn insert_row(&mut self, table: &str, row: Value) -> StoreResult<Row> {
        let result = self.try_insert(table, row);
        match &result {
            Ok(row) => log_write(Event::RowInserted, table, row_id(row)),
            Err(e) => log_rejected(table, "insert", e),
        }
        result
    }

    fn try_insert(&mut self, table: &str, row: Value) -> StoreResult<Row> {
        let validator = RowValidator::new(&self.catalog);
        validator.validate_draft(table, &row)?;

        let def = self.catalog.table(table)?;
        let mut row = match row {
            Value::Object(row) => row,
            other => {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::type_mismatch("$row", "object", json_type_name(&other)),
                )
                .into())
            }
        };

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        for field in &def.fields {
            if field.is_auto() {
                row.insert(field.name.clone(), Value::String(now.clone()));
            } else if field.nullable && !row.contains_key(&field.name) {
                row.insert(field.name.clone(), Value::Null);
            }
        }

        validator.validate_row(table, &row)?;
        self.check_references(table, &row)?;
        self.check_unique(table, None, &row)?;

        let sequence = self.sequences.entry(table.to_string()).or_insert(0);
        *sequence += 1;
        let id = *sequence;

        self.rows_mut(table)?.insert(id, row.clone());
        Ok(with_id(id, row))
    }

    /// Applies a partial update and returns the updated row.
    ///
    /// `id` and creation timestamps cannot be changed.
    pub fn update_row(&mut self, table: &str, id: i64, patch: Value) -> StoreResult<Row> {
        let result = self.try_update(table, id, patch);
        match &result {
            Ok(_) => log_write(Event::RowUpdated, table, id),
            Err(e) => log_rejected(table, "update", e),
        }
        result
    }

    fn try_update(&mut self, table: &str, id: i64, patch: Value) -> StoreResult<Row> {
        let def = self.catalog.table(table)?;
        let patch = match patch {
            Value::Object(patch) => patch,
            other => {
                return Err(SchemaError::validation_failed(
                    table,
                    ValidationDetails::type_mismatch("$row", "object", json_type_name(&other)),
                )
                .into())
            }
        };

        for key in patch.keys() {
            let immutable = key == ID_FIELD || def.field(key).is_some_and(|f| f.is_auto());
            if immutable {
                return Err(StoreError::ImmutableField {
                    table: table.to_string(),
                    field: key.clone(),
                });
            }
        }

        let mut row = self.stored(table, id)?.clone();
        row.extend(patch);

        RowValidator::new(&self.catalog).validate_row(table, &row)?;
        self.check_references(table, &row)?;
        self.check_unique(table, Some(id), &row)?;

        self.rows_mut(table)?.insert(id, row.clone());
        Ok(with_id(id, row))
    }

    /// Deletes a row and applies every referential action it triggers.
    pub fn delete(&mut self, table: &str, id: i64) -> StoreResult<DeleteSummary> {
        let summary = match self.plan_delete(table, id) {
            Ok(summary) => summary,
            Err(e) => {
                log_rejected(table, "delete", &e);
                return Err(e);
            }
        };

        for target in &summary.deleted {
            if let Some(rows) = self.tables.get_mut(&target.table) {
                rows.remove(&target.id);
            }
        }
        for nulled in &summary.nulled {
            if let Some(row) = self
                .tables
                .get_mut(&nulled.table)
                .and_then(|rows| rows.get_mut(&nulled.id))
            {
                row.insert(nulled.field.clone(), Value::Null);
            }
        }

        log_write(Event::RowDeleted, table, id);
        if summary.deleted.len() > 1 || !summary.nulled.is_empty() {
            log_event_with_fields(
                Event::CascadeApplied,
                &[
                    ("table", table),
                    ("id", &id.to_string()),
                    ("deleted", &(summary.deleted.len() - 1).to_string()),
                    ("nulled", &summary.nulled.len().to_string()),
                ],
            );
        }

        Ok(summary)
    }

    /// Walks CASCADE references transitively from the requested row and
    /// collects SET NULL references of rows that survive.
    fn plan_delete(&self, table: &str, id: i64) -> StoreResult<DeleteSummary> {
        self.stored(table, id)?;

        let root = RowRef::new(table, id);
        let mut deleted = BTreeSet::from([root.clone()]);
        let mut queue = VecDeque::from([root]);
        let mut nulled = BTreeSet::new();

        while let Some(target) = queue.pop_front() {
            for (referencing, field) in self.catalog.referencing(&target.table) {
                let Some((_, on_delete, _)) = field.reference() else {
                    continue;
                };

                for (row_id, row) in self.rows(&referencing.name)? {
                    if row.get(&field.name).and_then(Value::as_i64) != Some(target.id) {
                        continue;
                    }

                    let dependent = RowRef::new(&referencing.name, *row_id);
                    match on_delete {
                        OnDelete::Cascade => {
                            if deleted.insert(dependent.clone()) {
                                queue.push_back(dependent);
                            }
                        }
                        OnDelete::SetNull => {
                            nulled.insert(NulledField {
                                table: dependent.table,
                                id: dependent.id,
                                field: field.name.clone(),
                            });
                        }
                    }
                }
            }
        }

        nulled.retain(|n| !deleted.contains(&RowRef::new(&n.table, n.id)));

        Ok(DeleteSummary {
            deleted: deleted.into_iter().collect(),
            nulled: nulled.into_iter().collect(),
        })
    }

    /// Returns a row with its `id`.
    pub fn get_row(&self, table: &str, id: i64) -> StoreResult<Row> {
        Ok(with_id(id, self.stored(table, id)?.clone()))
    }

    /// Returns every row of `table` in id order.
    pub fn list_rows(&self, table: &str) -> StoreResult<Vec<Row>> {
        Ok(self
            .rows(table)?
            .iter()
            .map(|(id, row)| with_id(*id, row.clone()))
            .collect())
    }

    /// Rows of another table that reference `table`/`id` through `relation`.
    ///
    /// `relation` is the related name declared on the referencing field,
    /// e.g. `lessons` for a course or `subscriptions` for a user.
    pub fn related_rows(&self, table: &str, id: i64, relation: &str) -> StoreResult<Vec<Row>> {
        self.stored(table, id)?;

        let (referencing, field) = self
            .catalog
            .related(table, relation)
            .ok_or_else(|| SchemaError::unknown_relation(table, relation))?;

        Ok(self
            .rows(&referencing.name)?
            .iter()
            .filter(|(_, row)| row.get(&field.name).and_then(Value::as_i64) == Some(id))
            .map(|(row_id, row)| with_id(*row_id, row.clone()))
            .collect())
    }

    // ==================
    // Typed API
    // ==================

    /// Inserts a typed draft.
    pub fn insert<D: Draft>(&mut self, draft: &D) -> StoreResult<D::Model> {
        let table = <D::Model as Model>::TABLE;
        let row = serde_json::to_value(draft).map_err(|e| StoreError::Decode {
            table: table.to_string(),
            reason: e.to_string(),
        })?;
        let row = self.insert_row(table, row)?;
        decode(table, row)
    }

    /// Applies a partial update given as JSON and returns the typed row.
    pub fn update<M: Model>(&mut self, id: i64, patch: Value) -> StoreResult<M> {
        let row = self.update_row(M::TABLE, id, patch)?;
        decode(M::TABLE, row)
    }

    pub fn get<M: Model>(&self, id: i64) -> StoreResult<M> {
        decode(M::TABLE, self.get_row(M::TABLE, id)?)
    }

    /// Like [`Database::get`], but a missing row is `None`.
    pub fn find<M: Model>(&self, id: i64) -> StoreResult<Option<M>> {
        match self.get::<M>(id) {
            Ok(model) => Ok(Some(model)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn all<M: Model>(&self) -> StoreResult<Vec<M>> {
        self.list_rows(M::TABLE)?
            .into_iter()
            .map(|row| decode(M::TABLE, row))
            .collect()
    }

    /// Typed form of [`Database::related_rows`].
    pub fn related<M: Model>(&self, table: &str, id: i64, relation: &str) -> StoreResult<Vec<M>> {
        self.related_rows(table, id, relation)?
            .into_iter()
            .map(|row| decode(M::TABLE, row))
            .collect()
    }

    /// Deletes the row behind a typed model.
    pub fn delete_model<M: Model>(&mut self, model: &M) -> StoreResult<DeleteSummary> {
        self.delete(M::TABLE, model.id())
    }

    pub fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let found = self
            .rows(User::TABLE)?
            .iter()
            .find(|(_, row)| row.get("email").and_then(Value::as_str) == Some(email))
            .map(|(id, row)| with_id(*id, row.clone()));

        found.map(|row| decode(User::TABLE, row)).transpose()
    }

    /// Resolves a subscription's user and course.
    pub fn subscription_view(&self, id: i64) -> StoreResult<SubscriptionView> {
        let subscription: Subscription = self.get(id)?;
        let user = self.find(subscription.user_id)?;
        let course = self.find(subscription.course_id)?;

        Ok(SubscriptionView {
            subscription,
            user,
            course,
        })
    }

    // ==================
    // Constraint checks
    // ==================

    fn check_references(&self, table: &str, row: &Row) -> StoreResult<()> {
        let def = self.catalog.table(table)?;

        for field in &def.fields {
            let Some((target, _, _)) = field.reference() else {
                continue;
            };
            let Some(target_id) = row.get(&field.name).and_then(Value::as_i64) else {
                continue;
            };

            if !self.rows(target)?.contains_key(&target_id) {
                return Err(StoreError::DanglingReference {
                    table: table.to_string(),
                    field: field.name.clone(),
                    target: target.to_string(),
                    id: target_id,
                });
            }
        }

        Ok(())
    }

    /// Rejects `row` if another row (other than `exclude`) holds the same
    /// non-null values for any uniqueness group.
    fn check_unique(&self, table: &str, exclude: Option<i64>, row: &Row) -> StoreResult<()> {
        let def = self.catalog.table(table)?;

        for group in def.unique_groups() {
            let values: Vec<&Value> = group
                .iter()
                .map(|f| row.get(f).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }

            let conflict = self.rows(table)?.iter().find(|(other_id, other)| {
                Some(**other_id) != exclude
                    && group
                        .iter()
                        .zip(&values)
                        .all(|(f, v)| other.get(f) == Some(*v))
            });

            if let Some((existing_id, _)) = conflict {
                return Err(StoreError::UniqueViolation {
                    table: table.to_string(),
                    fields: group,
                    existing_id: *existing_id,
                });
            }
        }

        Ok(())
    }

    // ==================
    // Snapshot conversion
    // ==================

    pub(crate) fn to_snapshot(&self) -> SnapshotBody {
        let tables = self
            .tables
            .iter()
            .map(|(name, rows)| {
                let rows = rows
                    .iter()
                    .map(|(id, row)| with_id(*id, row.clone()))
                    .collect();
                (name.clone(), rows)
            })
            .collect();

        SnapshotBody {
            tables,
            sequences: self.sequences.clone(),
        }
    }

    /// Rebuilds a store from a snapshot body, re-checking every constraint.
    pub(crate) fn from_snapshot(catalog: SchemaCatalog, body: SnapshotBody) -> StoreResult<Self> {
        let mut db = Self::new(catalog);

        for (table, rows) in body.tables {
            if db.catalog.get(&table).is_none() {
                return Err(StoreError::Corrupted(format!("unknown table '{}'", table)));
            }

            for mut row in rows {
                let id = row
                    .remove(ID_FIELD)
                    .and_then(|v| v.as_i64())
                    .filter(|id| *id >= 1)
                    .ok_or_else(|| StoreError::Corrupted(format!("{} row without valid id", table)))?;

                RowValidator::new(&db.catalog)
                    .validate_row(&table, &row)
                    .map_err(|e| StoreError::Corrupted(format!("{} row {}: {}", table, id, e)))?;

                if db.rows_mut(&table)?.insert(id, row).is_some() {
                    return Err(StoreError::Corrupted(format!("{} row {} stored twice", table, id)));
                }
            }
        }

        for (table, rows) in &db.tables {
            let last = body.sequences.get(table).copied().unwrap_or(0);
            let max_id = rows.keys().next_back().copied().unwrap_or(0);
            if last < max_id {
                return Err(StoreError::Corrupted(format!(
                    "sequence for {} is {} but row {} exists",
                    table, last, max_id
                )));
            }
        }
        for (table, last) in body.sequences {
            if db.catalog.get(&table).is_some() {
                db.sequences.insert(table, last);
            }
        }

        for (table, rows) in &db.tables {
            for (id, row) in rows {
                db.check_references(table, row)
                    .and_then(|_| db.check_unique(table, Some(*id), row))
                    .map_err(|e| StoreError::Corrupted(format!("{} row {}: {}", table, id, e)))?;
            }
        }

        Ok(db)
    }

    // ==================
    // Internals
    // ==================

    fn rows(&self, table: &str) -> StoreResult<&BTreeMap<i64, Row>> {
        self.tables
            .get(table)
            .ok_or_else(|| SchemaError::unknown_table(table).into())
    }

    fn rows_mut(&mut self, table: &str) -> StoreResult<&mut BTreeMap<i64, Row>> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| SchemaError::unknown_table(table).into())
    }

    fn stored(&self, table: &str, id: i64) -> StoreResult<&Row> {
        self.rows(table)?
            .get(&id)
            .ok_or_else(|| StoreError::not_found(table, id))
    }
}

fn with_id(id: i64, row: Row) -> Row {
    let mut out = Map::with_capacity(row.len() + 1);
    out.insert(ID_FIELD.to_string(), Value::from(id));
    out.extend(row);
    out
}

fn row_id(row: &Row) -> i64 {
    row.get(ID_FIELD).and_then(Value::as_i64).unwrap_or_default()
}

fn decode<M: Model>(table: &str, row: Row) -> StoreResult<M> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode {
        table: table.to_string(),
        reason: e.to_string(),
    })
}

fn log_write(event: Event, table: &str, id: i64) {
    log_event_with_fields(event, &[("table", table), ("id", &id.to_string())]);
}

fn log_rejected(table: &str, operation: &str, error: &StoreError) {
    log_event_with_fields(
        Event::WriteRejected,
        &[
            ("table", table),
            ("operation", operation),
            ("code", error.code()),
            ("reason", &error.to_string()),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Course, Lesson, NewCourse, NewLesson, NewPayment, NewSubscription, NewUser, Payment,
        PaymentType,
    };
    use serde_json::json;

    fn db() -> Database {
        Database::course_platform().unwrap()
    }

    #[test]
    fn test_ids_are_sequential_per_table() {
        let mut db = db();
        let a = db.insert(&NewUser::new("a@x.com")).unwrap();
        let b = db.insert(&NewUser::new("b@x.com")).unwrap();
        let c = db.insert(&NewCourse::new("C1")).unwrap();

        assert_eq!((a.id, b.id, c.id), (1, 2, 1));
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let mut db = db();
        let a = db.insert(&NewUser::new("a@x.com")).unwrap();
        db.delete_model(&a).unwrap();
        let b = db.insert(&NewUser::new("b@x.com")).unwrap();
        assert_eq!(b.id, 2);
    }

    #[test]
    fn test_absent_optional_fields_are_null() {
        let mut db = db();
        let row = db.insert_row("course", json!({"name": "C1"})).unwrap();
        assert_eq!(row["id"], 1);
        assert_eq!(row["description"], Value::Null);
        assert_eq!(row["owner"], Value::Null);
        assert_eq!(row["preview"], Value::Null);
    }

    #[test]
    fn test_created_at_is_assigned() {
        let mut db = db();
        let user = db.insert(&NewUser::new("a@x.com")).unwrap();
        let course = db.insert(&NewCourse::new("C1")).unwrap();
        let before = Utc::now();
        let sub = db.insert(&NewSubscription::new(user.id, course.id)).unwrap();
        assert!(sub.created_at >= before - chrono::Duration::seconds(1));
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let mut db = db();
        db.insert(&NewUser::new("a@x.com")).unwrap();
        let err = db.insert(&NewUser::new("a@x.com")).unwrap_err();
        assert_eq!(err.code(), "COURSE_UNIQUE_VIOLATION");
    }

    #[test]
    fn test_dangling_reference_rejected_and_store_unchanged() {
        let mut db = db();
        let err = db.insert(&NewCourse::new("C1").owned_by(42)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DanglingReference { ref field, id: 42, .. } if field == "owner"
        ));
        assert_eq!(db.row_count("course").unwrap(), 0);

        // The failed insert did not consume an id.
        let course = db.insert(&NewCourse::new("C1")).unwrap();
        assert_eq!(course.id, 1);
    }

    #[test]
    fn test_update_changes_fields() {
        let mut db = db();
        let owner = db.insert(&NewUser::new("a@x.com")).unwrap();
        let course = db.insert(&NewCourse::new("C1")).unwrap();

        let updated: Course = db
            .update(course.id, json!({"description": "Intro", "owner": owner.id}))
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Intro"));
        assert_eq!(updated.owner_id, Some(owner.id));
        assert_eq!(updated.name, "C1");
    }

    #[test]
    fn test_update_rejects_invalid_values_without_change() {
        let mut db = db();
        let course = db.insert(&NewCourse::new("C1")).unwrap();

        let err = db.update_row("course", course.id, json!({"name": ""})).unwrap_err();
        assert_eq!(err.code(), "COURSE_SCHEMA_VALIDATION_FAILED");
        assert_eq!(db.get::<Course>(course.id).unwrap().name, "C1");
    }

    #[test]
    fn test_update_rejects_immutable_fields() {
        let mut db = db();
        let user = db.insert(&NewUser::new("a@x.com")).unwrap();
        let course = db.insert(&NewCourse::new("C1")).unwrap();
        let sub = db.insert(&NewSubscription::new(user.id, course.id)).unwrap();

        let err = db
            .update_row("subscription", sub.id, json!({"created_at": "2020-01-01T00:00:00Z"}))
            .unwrap_err();
        assert!(matches!(err, StoreError::ImmutableField { ref field, .. } if field == "created_at"));

        let err = db.update_row("subscription", sub.id, json!({"id": 9})).unwrap_err();
        assert_eq!(err.code(), "COURSE_IMMUTABLE_FIELD");
    }

    #[test]
    fn test_update_to_duplicate_pair_rejected() {
        let mut db = db();
        let user = db.insert(&NewUser::new("a@x.com")).unwrap();
        let c1 = db.insert(&NewCourse::new("C1")).unwrap();
        let c2 = db.insert(&NewCourse::new("C2")).unwrap();
        db.insert(&NewSubscription::new(user.id, c1.id)).unwrap();
        let second = db.insert(&NewSubscription::new(user.id, c2.id)).unwrap();

        let err = db
            .update_row("subscription", second.id, json!({"course": c1.id}))
            .unwrap_err();
        assert_eq!(err.code(), "COURSE_UNIQUE_VIOLATION");

        // Re-saving the same values is not a conflict with itself.
        db.update_row("subscription", second.id, json!({"course": c2.id}))
            .unwrap();
    }

    #[test]
    fn test_update_missing_row() {
        let mut db = db();
        let err = db.update_row("course", 5, json!({"name": "X"})).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 5, .. }));
    }

    #[test]
    fn test_delete_lesson_nulls_paid_lesson() {
        let mut db = db();
        let lesson = db.insert(&NewLesson::new("L1")).unwrap();
        let mut draft = NewPayment::new(PaymentType::Cash);
        draft.paid_lesson_id = Some(lesson.id);
        let payment = db.insert(&draft).unwrap();

        let summary = db.delete_model(&lesson).unwrap();
        assert_eq!(summary.deleted_in("lesson"), 1);
        assert_eq!(summary.nulled_in("payment"), 1);
        assert_eq!(db.get::<Payment>(payment.id).unwrap().paid_lesson_id, None);
    }

    #[test]
    fn test_delete_missing_row() {
        let mut db = db();
        assert!(matches!(
            db.delete("course", 1),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_related_rows() {
        let mut db = db();
        let course = db.insert(&NewCourse::new("C1")).unwrap();
        let other = db.insert(&NewCourse::new("C2")).unwrap();
        db.insert(&NewLesson::new("L1").in_course(course.id)).unwrap();
        db.insert(&NewLesson::new("L2").in_course(course.id)).unwrap();
        db.insert(&NewLesson::new("L3").in_course(other.id)).unwrap();

        let lessons: Vec<Lesson> = db.related("course", course.id, "lessons").unwrap();
        let names: Vec<_> = lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["L1", "L2"]);

        let err = db.related_rows("course", course.id, "chapters").unwrap_err();
        assert_eq!(err.code(), "COURSE_UNKNOWN_RELATION");
    }

    #[test]
    fn test_user_by_email() {
        let mut db = db();
        let user = db.insert(&NewUser::new("a@x.com")).unwrap();
        assert_eq!(db.user_by_email("a@x.com").unwrap(), Some(user));
        assert_eq!(db.user_by_email("b@x.com").unwrap(), None);
    }

    #[test]
    fn test_unknown_table() {
        let mut db = db();
        let err = db.insert_row("quiz", json!({})).unwrap_err();
        assert_eq!(err.code(), "COURSE_UNKNOWN_TABLE");
    }

    #[test]
    fn test_snapshot_conversion_round_trip() {
        let mut db = db();
        let user = db.insert(&NewUser::new("a@x.com")).unwrap();
        let course = db.insert(&NewCourse::new("C1").owned_by(user.id)).unwrap();
        db.insert(&NewSubscription::new(user.id, course.id)).unwrap();

        let restored =
            Database::from_snapshot(course_platform_catalog().unwrap(), db.to_snapshot()).unwrap();
        assert_eq!(restored.list_rows("course").unwrap(), db.list_rows("course").unwrap());
        assert_eq!(restored.sequences, db.sequences);
    }

    #[test]
    fn test_snapshot_with_dangling_reference_rejected() {
        let mut db = db();
        let user = db.insert(&NewUser::new("a@x.com")).unwrap();
        db.insert(&NewCourse::new("C1").owned_by(user.id)).unwrap();

        let mut body = db.to_snapshot();
        body.tables.insert("user".into(), Vec::new());

        let err = Database::from_snapshot(course_platform_catalog().unwrap(), body).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }
}
