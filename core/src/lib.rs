pub mod models;

pub use models::slot::{NewSlot, Slot, SlotDetails, SlotId, SlotStatus};
pub use models::swap::{Decision, NewSwapRequest, RequestId, SwapRequest, SwapStatus};
pub use models::user::{UserId, UserProfile};
pub use models::view::{RequestBoard, SlotListing, SwapRequestView};
