//! Core engine for the campus shop back-office.
//!
//! This crate holds the order financial lifecycle: the stock ledger, checkout
//! pricing, the delivery state machine, reimbursement, settings, dashboard
//! reporting and the notification listener. Handlers are reached through a
//! [`ShopEngine`] composed by the [`ShopBuilder`].

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod reporting;
pub mod state;

#[cfg(test)]
mod test_support;

pub use builder::{BuilderError, ShopBuilder, ShopFactories};
pub use engine::{event_bus::EventBus, EngineError, ShopEngine};
pub use handlers::checkout::Pricing;
pub use handlers::OrderError;
pub use reporting::TimeRange;
