//! Read-only projections handed to callers. Joins that cannot be resolved
//! (a deleted user, a slot removed by the CRUD layer) are `None`.

use serde::{Deserialize, Serialize};

use super::slot::Slot;
use super::swap::SwapRequest;
use super::user::UserProfile;

/// A swappable slot together with its owner's public identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotListing {
    pub slot: Slot,
    pub owner: Option<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequestView {
    pub request: SwapRequest,
    pub requester_slot: Option<Slot>,
    pub target_slot: Option<Slot>,
    /// Requester for incoming requests, target for outgoing ones.
    pub counterpart: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBoard {
    pub incoming: Vec<SwapRequestView>,
    pub outgoing: Vec<SwapRequestView>,
}
