//! Storage layer for Compliance Core.
//!
//! Uses SQLite via SQLx. All entity queries live on [`ComplianceRepository`],
//! split across files by resource.

mod assignments;
mod dashboard;
mod incidents;
mod models;
mod policies;
mod repository;
mod training;

pub use repository::ComplianceRepository;
