pub mod sqlite_store;

use anyhow::Result;
use async_trait::async_trait;

use corelib::{RequestId, Slot, SlotDetails, SlotId, SlotStatus, UserId};

/// Precondition on a slot's reservation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCondition {
    /// Slot must not be linked to any request.
    Unlinked,
    /// Slot must be linked to exactly this request.
    Held(RequestId),
}

/// One conditioned write on a single slot row.
///
/// The write applies only while the row still has `expect_status`, the
/// expected owner (if any) and a link matching `expect_link`. The new owner is
/// optional; `None` keeps the current one. Build it with the constructors so
/// status and link stay consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTransition {
    pub expect_status: SlotStatus,
    pub expect_owner: Option<UserId>,
    pub expect_link: LinkCondition,

    pub status: SlotStatus,
    pub owner: Option<UserId>,
    pub link: Option<RequestId>,
}

impl SlotTransition {
    /// SWAPPABLE -> SWAP_PENDING, reserved for `request_id`.
    pub fn reserve(owner: UserId, request_id: RequestId) -> Self {
        Self {
            expect_status: SlotStatus::Swappable,
            expect_owner: Some(owner),
            expect_link: LinkCondition::Unlinked,
            status: SlotStatus::SwapPending,
            owner: None,
            link: Some(request_id),
        }
    }

    /// SWAP_PENDING -> SWAPPABLE for a reservation held by `request_id`.
    pub fn release(request_id: RequestId) -> Self {
        Self {
            expect_status: SlotStatus::SwapPending,
            expect_owner: None,
            expect_link: LinkCondition::Held(request_id),
            status: SlotStatus::Swappable,
            owner: None,
            link: None,
        }
    }

    /// SWAP_PENDING -> BUSY with ownership moving `from` -> `to`.
    pub fn transfer(request_id: RequestId, from: UserId, to: UserId) -> Self {
        Self {
            expect_status: SlotStatus::SwapPending,
            expect_owner: Some(from),
            expect_link: LinkCondition::Held(request_id),
            status: SlotStatus::Busy,
            owner: Some(to),
            link: None,
        }
    }

    /// Owner-driven BUSY <-> SWAPPABLE flip.
    pub fn toggle(owner: UserId, from: SlotStatus, to: SlotStatus) -> Self {
        Self {
            expect_status: from,
            expect_owner: Some(owner),
            expect_link: LinkCondition::Unlinked,
            status: to,
            owner: None,
            link: None,
        }
    }

    /// SWAP_PENDING without any link -> SWAPPABLE. The SQLite schema refuses
    /// such rows; this repairs stores that do not enforce the pairing.
    pub fn release_orphan() -> Self {
        Self {
            expect_status: SlotStatus::SwapPending,
            expect_owner: None,
            expect_link: LinkCondition::Unlinked,
            status: SlotStatus::Swappable,
            owner: None,
            link: None,
        }
    }

    /// Resulting status and link agree (SWAP_PENDING iff linked).
    pub fn is_well_formed(&self) -> bool {
        (self.status == SlotStatus::SwapPending) == self.link.is_some()
    }

    /// Whether `slot` currently satisfies every precondition.
    pub fn matches(&self, slot: &Slot) -> bool {
        let link_ok = match self.expect_link {
            LinkCondition::Unlinked => slot.swap_request_id.is_none(),
            LinkCondition::Held(r) => slot.swap_request_id == Some(r),
        };
        slot.status == self.expect_status
            && self.expect_owner.is_none_or(|o| o == slot.owner_id)
            && link_ok
    }

    /// Applies the write to an in-memory copy. Callers check `matches` first.
    pub fn apply_to(&self, slot: &mut Slot, now_ms: i64) {
        slot.status = self.status;
        if let Some(owner) = self.owner {
            slot.owner_id = owner;
        }
        slot.swap_request_id = self.link;
        slot.updated_at_ms = now_ms;
    }
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn insert(&self, slot: &Slot) -> Result<()>;

    async fn get(&self, slot_id: SlotId) -> Result<Option<Slot>>;

    /// Slots among `slot_ids` that exist; order is unspecified.
    async fn get_many(&self, slot_ids: &[SlotId]) -> Result<Vec<Slot>>;

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<Slot>>;

    async fn list_by_status(&self, status: SlotStatus) -> Result<Vec<Slot>>;

    /// All SWAPPABLE slots not owned by `user_id`.
    async fn swappable_excluding(&self, user_id: UserId) -> Result<Vec<Slot>>;

    /// The slot iff it exists, belongs to `owner_id` and has `status`.
    async fn find_owned(
        &self,
        slot_id: SlotId,
        owner_id: UserId,
        status: SlotStatus,
    ) -> Result<Option<Slot>>;

    /// Atomic compare-and-set on one row. `Ok(false)` means the slot does not
    /// exist or no longer satisfies the preconditions; nothing was written.
    async fn transition(&self, slot_id: SlotId, t: &SlotTransition) -> Result<bool>;

    /// Owner edit; refused (`Ok(false)`) for foreign or SWAP_PENDING slots.
    async fn update_details(
        &self,
        slot_id: SlotId,
        owner_id: UserId,
        details: &SlotDetails,
    ) -> Result<bool>;

    /// Owner delete; refused (`Ok(false)`) for foreign or SWAP_PENDING slots.
    async fn delete(&self, slot_id: SlotId, owner_id: UserId) -> Result<bool>;
}
