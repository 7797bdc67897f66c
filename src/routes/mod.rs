/// Router Module Index
///
/// Splits the API into access tiers, each guarded by its own layer in
/// `create_router`:
///
/// - `public`: no bearer token (still behind the API key).
/// - `authenticated`: any admin or super-admin session.
/// - `root`: super-admin sessions issued by the root login.

/// Health, registration and both logins.
pub mod public;

/// Profile endpoints and ACL-scoped CRUD over every shareable collection.
pub mod authenticated;

/// Unfiltered listings, ACL toggles, user administration and stats.
pub mod root;
