//! Common types module for the campus shop back-office.
//!
//! This module defines the core data types shared by every shop crate: the
//! catalog and order model, the settings singleton, the inter-service event
//! types and the HTTP request/response shapes. Keeping them in one crate
//! lets storage, notification, engine and API layers agree on a single
//! serialized form.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Caller identity as supplied by the fronting auth provider.
pub mod caller;
/// Event types for inter-service communication.
pub mod events;
/// Notification inbox records and push token registrations.
pub mod notification;
/// Order aggregate, line-item snapshots and financial normalisation.
pub mod order;
/// Product catalog entries and the stock ledger rules.
pub mod product;
/// Registry trait implemented by pluggable backends.
pub mod registry;
/// Settings singleton and its partial updates.
pub mod settings;
/// Storage namespaces used by the persistence layer.
pub mod storage;
/// Money rounding, id shortening and display helpers.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use caller::*;
pub use events::*;
pub use notification::*;
pub use order::*;
pub use product::*;
pub use registry::ImplementationRegistry;
pub use settings::*;
pub use storage::*;
pub use utils::{format_price, generate_guest_token, generate_id, round_to_minor_units, truncate_id};
pub use validation::*;

pub use rust_decimal::Decimal;
