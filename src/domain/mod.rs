//! Domain types for Compliance Core.
//!
//! This module contains the core business entities and value objects.

mod assignment;
mod audit;
mod bundle;
mod department;
mod employee;
mod incident;
mod metrics;
mod organization;
mod policy;
mod training;
mod user;

pub use assignment::*;
pub use audit::*;
pub use bundle::*;
pub use department::*;
pub use employee::*;
pub use incident::*;
pub use metrics::*;
pub use organization::*;
pub use policy::*;
pub use training::*;
pub use user::*;
