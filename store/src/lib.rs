//! Persistence for slots, swap requests and user profiles.
//!
//! Every trait here is single-entity: a method reads or writes one table and
//! never coordinates with another store. Cross-entity consistency is the
//! exchange coordinator's job.

pub mod db;
pub mod slot;
pub mod swap;
pub mod user;

mod row;

pub use db::Db;
pub use slot::sqlite_store::SqliteSlotStore;
pub use slot::{LinkCondition, SlotStore, SlotTransition};
pub use swap::sqlite_store::SqliteSwapStore;
pub use swap::{SwapRequestStore, UserRequests};
pub use user::UserDirectory;
pub use user::sqlite_store::SqliteUserDirectory;
