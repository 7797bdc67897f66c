//! HTTP handlers, grouped by the resource they serve.
//!
//! Handlers stay thin: extract, authorize via the `AuthUser` family of
//! extractors, delegate to the repository or `accounts`, and map the outcome
//! onto `ApiError`.

pub mod auth;
pub mod entities;
pub mod stats;
pub mod users;
