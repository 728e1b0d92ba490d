//! Persistent state management.
//!
//! The order state machine guards delivery-status transitions and the stock
//! ledger keeps product quantities consistent with placed and cancelled
//! orders. Both write through [`StorageService`](shop_storage::StorageService)'s
//! atomic read-modify-write so concurrent requests resolve to one winner.

pub mod order;
pub mod stock;

pub use order::OrderStateMachine;
pub use stock::StockLedger;
