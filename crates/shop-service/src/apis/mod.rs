//! Route groups of the shop HTTP API.
//!
//! Each module exposes a `router()` with its endpoints. Handlers resolve the
//! caller with [`crate::auth::Identity`], delegate to the engine and convert
//! core errors into [`shop_types::APIError`].

pub mod admin;
pub mod categories;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reimbursements;
pub mod reports;
pub mod settings;
