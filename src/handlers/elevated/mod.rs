// handlers/elevated/mod.rs - Admin-restricted handlers
//
// Everything here goes through the authorization guard: the JSON API via the
// `AdminUser` extractor (401 on denial), the dashboard page via redirects.

pub mod admin;
pub mod dashboard;
