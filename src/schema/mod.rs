//! Course platform schema
//!
//! Declares the tables of the course platform (users, courses, lessons,
//! subscriptions, payments), their column constraints and the referential
//! actions between them.
//!
//! # Design Principles
//!
//! - Nullability is an explicit per-field flag
//! - Surrogate `id` keys are assigned by the store, never by callers
//! - Every constraint violation is rejected before a row is persisted
//! - No coercion: values must already have the column's type

mod catalog;
pub mod ddl;
mod errors;
pub mod models;
mod types;
mod validator;

pub use catalog::SchemaCatalog;
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity, ValidationDetails};
pub use models::{
    course_platform_catalog, Course, Draft, Lesson, Model, NewCourse, NewLesson, NewPayment,
    NewSubscription, NewUser, Payment, PaymentType, Subscription, SubscriptionView, User,
};
pub use types::{FieldDef, FieldType, OnDelete, TableDef, ID_FIELD};
pub use validator::RowValidator;

pub(crate) use validator::json_type_name;
