//! Course platform tables and their typed rows
//!
//! Tables, in creation order: `user`, `course`, `lesson`, `subscription`,
//! `payment`.
//!
//! Referential actions:
//! - owner / course / lesson references on course, lesson and payment are
//!   SET NULL, so content and payment history survive their owner
//! - subscription references are CASCADE, so a subscription never outlives
//!   its user or course

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::catalog::SchemaCatalog;
use super::errors::SchemaResult;
use super::types::{FieldDef, OnDelete, TableDef, URL_DEFAULT_MAX_LENGTH};

pub const USER_TABLE: &str = "user";
pub const COURSE_TABLE: &str = "course";
pub const LESSON_TABLE: &str = "lesson";
pub const SUBSCRIPTION_TABLE: &str = "subscription";
pub const PAYMENT_TABLE: &str = "payment";

/// A typed row of a catalog table.
pub trait Model: Serialize + DeserializeOwned {
    /// Table the model is stored in
    const TABLE: &'static str;

    /// Store-assigned surrogate key
    fn id(&self) -> i64;
}

/// Values for a new row; everything except store-assigned fields.
pub trait Draft: Serialize {
    type Model: Model;
}

/// Builds the catalog of all course platform tables.
pub fn course_platform_catalog() -> SchemaResult<SchemaCatalog> {
    let mut catalog = SchemaCatalog::new();
    for table in course_platform_tables() {
        catalog.register(table)?;
    }
    Ok(catalog)
}

/// Course platform table definitions in creation order.
pub fn course_platform_tables() -> Vec<TableDef> {
    vec![
        user_table(),
        course_table(),
        lesson_table(),
        subscription_table(),
        payment_table(),
    ]
}

fn user_table() -> TableDef {
    TableDef::new(
        USER_TABLE,
        "Пользователь",
        "Пользователи",
        vec![FieldDef::email("email", 254, "Почта").unique()],
    )
}

fn course_table() -> TableDef {
    TableDef::new(
        COURSE_TABLE,
        "Курс",
        "Курсы",
        vec![
            FieldDef::char("name", 255, "Название курса").help("Укажите название курса"),
            FieldDef::image("preview", "courses/photo", "Превью курса")
                .nullable()
                .help("Загрузите картинку для превью курса"),
            FieldDef::text("description", "Описание курса")
                .nullable()
                .help("Укажите описание курса"),
            FieldDef::foreign_key(
                "owner",
                USER_TABLE,
                OnDelete::SetNull,
                "course_owner",
                "Владелец курса",
            )
            .nullable()
            .help("Выберите владельца курса"),
        ],
    )
}

fn lesson_table() -> TableDef {
    TableDef::new(
        LESSON_TABLE,
        "Урок",
        "Уроки",
        vec![
            FieldDef::char("name", 255, "Название урока").help("Укажите название урока"),
            FieldDef::foreign_key("course", COURSE_TABLE, OnDelete::SetNull, "lessons", "Курс")
                .nullable(),
            FieldDef::text("description", "Описание урока")
                .nullable()
                .help("Укажите описание урока"),
            FieldDef::image("preview", "lessons/photo", "Превью урока")
                .nullable()
                .help("Загрузите картинку для превью урока"),
            FieldDef::url("video_link", URL_DEFAULT_MAX_LENGTH, "Ссылка на видео")
                .nullable()
                .help("Укажите ссылку на видео урока"),
            FieldDef::foreign_key(
                "owner",
                USER_TABLE,
                OnDelete::SetNull,
                "lessons_owner",
                "Владелец урока",
            )
            .nullable()
            .help("Выберите владельца урока"),
        ],
    )
}

fn subscription_table() -> TableDef {
    TableDef::new(
        SUBSCRIPTION_TABLE,
        "Подписка",
        "Подписки",
        vec![
            FieldDef::foreign_key(
                "user",
                USER_TABLE,
                OnDelete::Cascade,
                "subscriptions",
                "Пользователь",
            ),
            FieldDef::foreign_key(
                "course",
                COURSE_TABLE,
                OnDelete::Cascade,
                "subscribers",
                "Курс",
            ),
            FieldDef::created_timestamp("created_at", "Дата подписки"),
        ],
    )
    .unique_together(&["user", "course"])
}

fn payment_table() -> TableDef {
    let choices: Vec<&str> = PaymentType::ALL.iter().map(|t| t.as_str()).collect();

    TableDef::new(
        PAYMENT_TABLE,
        "Оплата",
        "Оплаты",
        vec![
            FieldDef::foreign_key("owner", USER_TABLE, OnDelete::SetNull, "payment", "пользователь")
                .nullable(),
            FieldDef::created_timestamp("datetime_payment", "дата оплаты"),
            FieldDef::positive_integer("price", "сумма оплаты").nullable(),
            FieldDef::foreign_key("paid_course", COURSE_TABLE, OnDelete::SetNull, "payment", "оплаченный курс")
                .nullable(),
            FieldDef::foreign_key("paid_lesson", LESSON_TABLE, OnDelete::SetNull, "payment", "оплаченный урок")
                .nullable(),
            FieldDef::choice("payment_type", &choices, 16, "способ оплаты"),
            FieldDef::char("session_id", 300, "id сессии").nullable(),
            FieldDef::url("link", 400, "Ссылка на оплату").nullable(),
        ],
    )
}

/// Platform user; only the columns this schema depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
}

impl Model for User {
    const TABLE: &'static str = USER_TABLE;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: String,
}

impl NewUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

impl Draft for NewUser {
    type Model = User;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub preview: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "owner")]
    pub owner_id: Option<i64>,
}

impl Model for Course {
    const TABLE: &'static str = COURSE_TABLE;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewCourse {
    pub name: String,
    pub preview: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "owner")]
    pub owner_id: Option<i64>,
}

impl NewCourse {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn owned_by(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

impl Draft for NewCourse {
    type Model = Course;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub name: String,
    #[serde(rename = "course")]
    pub course_id: Option<i64>,
    pub description: Option<String>,
    pub preview: Option<String>,
    pub video_link: Option<String>,
    #[serde(rename = "owner")]
    pub owner_id: Option<i64>,
}

impl Model for Lesson {
    const TABLE: &'static str = LESSON_TABLE;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewLesson {
    pub name: String,
    #[serde(rename = "course")]
    pub course_id: Option<i64>,
    pub description: Option<String>,
    pub preview: Option<String>,
    pub video_link: Option<String>,
    #[serde(rename = "owner")]
    pub owner_id: Option<i64>,
}

impl NewLesson {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn in_course(mut self, course_id: i64) -> Self {
        self.course_id = Some(course_id);
        self
    }

    pub fn owned_by(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

impl Draft for NewLesson {
    type Model = Lesson;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Model for Subscription {
    const TABLE: &'static str = SUBSCRIPTION_TABLE;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSubscription {
    #[serde(rename = "user")]
    pub user_id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
}

impl NewSubscription {
    pub fn new(user_id: i64, course_id: i64) -> Self {
        Self { user_id, course_id }
    }
}

impl Draft for NewSubscription {
    type Model = Subscription;
}

/// A subscription with its references resolved.
///
/// Either side may be absent when the view was built from rows that no
/// longer exist; accessors report that instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionView {
    pub subscription: Subscription,
    pub user: Option<User>,
    pub course: Option<Course>,
}

impl SubscriptionView {
    /// Email of the subscribed user, `None` when the user is absent.
    pub fn get_user_email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }

    /// Name of the subscribed course, `None` when the course is absent.
    pub fn course_name(&self) -> Option<&str> {
        self.course.as_ref().map(|c| c.name.as_str())
    }

    /// Human-readable form: `Подписка {email} на курс {name}`.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SubscriptionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Подписка {} на курс {}",
            self.get_user_email().unwrap_or("<нет>"),
            self.course_name().unwrap_or("<нет>")
        )
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Transfer,
}

impl PaymentType {
    pub const ALL: [PaymentType; 2] = [PaymentType::Cash, PaymentType::Transfer];

    /// Stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Transfer => "transfer",
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            PaymentType::Cash => "Наличные",
            PaymentType::Transfer => "Переводом",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    #[serde(rename = "owner")]
    pub owner_id: Option<i64>,
    pub datetime_payment: DateTime<Utc>,
    pub price: Option<u32>,
    #[serde(rename = "paid_course")]
    pub paid_course_id: Option<i64>,
    #[serde(rename = "paid_lesson")]
    pub paid_lesson_id: Option<i64>,
    pub payment_type: PaymentType,
    pub session_id: Option<String>,
    pub link: Option<String>,
}

impl Model for Payment {
    const TABLE: &'static str = PAYMENT_TABLE;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPayment {
    #[serde(rename = "owner")]
    pub owner_id: Option<i64>,
    pub price: Option<u32>,
    #[serde(rename = "paid_course")]
    pub paid_course_id: Option<i64>,
    #[serde(rename = "paid_lesson")]
    pub paid_lesson_id: Option<i64>,
    pub payment_type: PaymentType,
    pub session_id: Option<String>,
    pub link: Option<String>,
}

impl NewPayment {
    pub fn new(payment_type: PaymentType) -> Self {
        Self {
            owner_id: None,
            price: None,
            paid_course_id: None,
            paid_lesson_id: None,
            payment_type,
            session_id: None,
            link: None,
        }
    }
}

impl Draft for NewPayment {
    type Model = Payment;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldType;

    #[test]
    fn test_catalog_builds() {
        let catalog = course_platform_catalog().unwrap();
        let names: Vec<_> = catalog.tables().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["user", "course", "lesson", "subscription", "payment"]);
    }

    #[test]
    fn test_referential_actions() {
        let catalog = course_platform_catalog().unwrap();

        let action = |table: &str, field: &str| {
            catalog
                .table(table)
                .unwrap()
                .field(field)
                .unwrap()
                .reference()
                .unwrap()
                .1
        };

        assert_eq!(action("course", "owner"), OnDelete::SetNull);
        assert_eq!(action("lesson", "course"), OnDelete::SetNull);
        assert_eq!(action("lesson", "owner"), OnDelete::SetNull);
        assert_eq!(action("subscription", "user"), OnDelete::Cascade);
        assert_eq!(action("subscription", "course"), OnDelete::Cascade);
        assert_eq!(action("payment", "owner"), OnDelete::SetNull);
        assert_eq!(action("payment", "paid_course"), OnDelete::SetNull);
        assert_eq!(action("payment", "paid_lesson"), OnDelete::SetNull);
    }

    #[test]
    fn test_nullability_matches_model() {
        let catalog = course_platform_catalog().unwrap();
        let nullable = |table: &str| -> Vec<String> {
            catalog
                .table(table)
                .unwrap()
                .fields
                .iter()
                .filter(|f| f.nullable)
                .map(|f| f.name.clone())
                .collect()
        };

        assert_eq!(nullable("course"), vec!["preview", "description", "owner"]);
        assert_eq!(
            nullable("lesson"),
            vec!["course", "description", "preview", "video_link", "owner"]
        );
        assert!(nullable("subscription").is_empty());
        assert_eq!(
            nullable("payment"),
            vec!["owner", "price", "paid_course", "paid_lesson", "session_id", "link"]
        );
    }

    #[test]
    fn test_subscription_unique_together() {
        let catalog = course_platform_catalog().unwrap();
        let subscription = catalog.table("subscription").unwrap();
        assert_eq!(
            subscription.unique_together,
            vec![vec!["user".to_string(), "course".to_string()]]
        );
    }

    #[test]
    fn test_payment_type_choices() {
        let catalog = course_platform_catalog().unwrap();
        let field = catalog.table("payment").unwrap().field("payment_type").unwrap();
        match &field.field_type {
            FieldType::Choice { choices, max_length } => {
                assert_eq!(choices, &vec!["cash".to_string(), "transfer".to_string()]);
                assert_eq!(*max_length, 16);
            }
            other => panic!("unexpected type {:?}", other),
        }
    }

    #[test]
    fn test_payment_type_serde_and_labels() {
        assert_eq!(serde_json::to_value(PaymentType::Cash).unwrap(), "cash");
        assert_eq!(
            serde_json::from_value::<PaymentType>("transfer".into()).unwrap(),
            PaymentType::Transfer
        );
        assert!(serde_json::from_value::<PaymentType>("card".into()).is_err());
        assert_eq!(PaymentType::Cash.to_string(), "Наличные");
        assert_eq!(PaymentType::Transfer.label(), "Переводом");
    }

    #[test]
    fn test_draft_serializes_reference_names() {
        let draft = NewLesson::new("Intro").in_course(2).owned_by(1);
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["course"], 2);
        assert_eq!(json["owner"], 1);
        assert!(json.get("course_id").is_none());
    }

    fn view(user: Option<&str>, course: Option<&str>) -> SubscriptionView {
        SubscriptionView {
            subscription: Subscription {
                id: 1,
                user_id: 1,
                course_id: 1,
                created_at: Utc::now(),
            },
            user: user.map(|email| User {
                id: 1,
                email: email.to_string(),
            }),
            course: course.map(|name| Course {
                id: 1,
                name: name.to_string(),
                preview: None,
                description: None,
                owner_id: None,
            }),
        }
    }

    #[test]
    fn test_subscription_describe() {
        let v = view(Some("a@x.com"), Some("C1"));
        assert_eq!(v.get_user_email(), Some("a@x.com"));
        assert_eq!(v.describe(), "Подписка a@x.com на курс C1");
    }

    #[test]
    fn test_missing_user_is_explicit() {
        let v = view(None, Some("C1"));
        assert_eq!(v.get_user_email(), None);
        assert_eq!(v.describe(), "Подписка <нет> на курс C1");
    }
}
