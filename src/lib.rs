//! coursebase - persistence schema and embedded store for an online course platform
//!
//! Users own courses and lessons, subscribe to courses, and pay for courses
//! or individual lessons.

pub mod cli;
pub mod config;
pub mod observability;
pub mod schema;
pub mod store;
