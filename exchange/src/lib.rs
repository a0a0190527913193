//! Slot exchange coordinator.
//!
//! Two users trade ownership of calendar slots. A proposal reserves both
//! slots (SWAPPABLE -> SWAP_PENDING) and records a PENDING request; the
//! target then accepts (ownership exchanged, both BUSY) or rejects (both back
//! to SWAPPABLE).
//!
//! There is no cross-table transaction. Consistency comes from:
//! - per-row compare-and-set on every slot write,
//! - the request id stored on reserved slots, which keys every resolve write
//!   so a retried resolve re-applies the same final state instead of swapping
//!   twice,
//! - a one-shot PENDING -> terminal transition on the request row.
//!
//! A crash between the reservations and the request insert leaves slots
//! SWAP_PENDING with no request. Those are reported by
//! [`ExchangeCoordinator::stuck_slots`] and repaired with
//! [`ExchangeCoordinator::force_release`]; nothing heals them automatically.

pub mod admin;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod query;

pub use admin::{ReleaseOutcome, StuckReason, StuckSlot};
pub use catalog::SlotCatalog;
pub use coordinator::{ExchangeCoordinator, Resolution};
pub use error::ExchangeError;
