//! Authentication module for Compliance Core.
//!
//! - Passwords: Argon2id hashes for user accounts
//! - JWT: bearer tokens for every authenticated route
//! - Invitations: one-time tokens that link a new employee to a user
//! - Organization scoping: the `X-Organization-Id` extractor

mod invite;
mod jwt;
mod middleware;
mod org;
mod password;

pub use invite::*;
pub use jwt::*;
pub use middleware::*;
pub use org::*;
pub use password::*;
