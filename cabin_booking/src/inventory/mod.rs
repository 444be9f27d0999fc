//! Per-day inventory rows and the queries that lock and mutate them.
//!
//! Inventory is the only mutable shared state of the booking core. Each row is the
//! unit of locking:
//! - `room_inventory`: one row per (room, day) with `held`/`booked` flags
//! - `property_inventory`: one row per (property, day) with per-guest counters and
//!   buyout flags
//!
//! Rows are only changed inside a transaction holding their row lock; nothing in
//! memory is authoritative.

pub mod models;
pub mod store;

pub use models::{LockPolicy, PropertyInventory, RoomInventory, RowLock};
