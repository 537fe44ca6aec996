//! Console core: everything the pages do between a request and the backend.
//!
//! ARCHITECTURE
//! ============
//! Each submodule owns one concern of the admin console and is written
//! against the backend traits only, so every piece runs unchanged against
//! Postgres in production and the memory stores in tests.
//!
//! - `session`: route surface and the session gate
//! - `policy`: who may do what
//! - `settings`: per-user branding and theme variables
//! - `list`: loaded list views and live (change-driven) lists
//! - `forms`: create/edit dialogs with validation and a single mutation
//! - `detail`: read-only views of a single record
//! - `users`: account provisioning across auth, profiles, and roles
//! - `summary`: figures derived from loaded lists
//! - `validate`, `notice`, `inflight`: shared helpers

pub mod detail;
pub mod forms;
pub mod inflight;
pub mod list;
pub mod notice;
pub mod policy;
pub mod session;
pub mod settings;
pub mod summary;
pub mod users;
pub mod validate;
