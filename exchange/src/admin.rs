//! Repair surface for reservations no request will ever resolve.
//!
//! A slot gets stuck when a proposal crashes between reserving its slots and
//! inserting the request, or when a resolve crashes between the request
//! transition and the slot writes. Nothing here runs on its own; an operator
//! lists stuck slots and releases them one by one.

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

use corelib::{RequestId, Slot, SlotId, SlotStatus, SwapStatus, UserId};
use store::SlotTransition;

use crate::coordinator::ExchangeCoordinator;
use crate::error::ExchangeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StuckReason {
    /// SWAP_PENDING but not linked to any request. Only seen on stores that
    /// do not enforce the status/link pairing; SQLite's CHECK forbids it.
    MissingLink,
    /// Linked request does not exist.
    RequestMissing { request_id: RequestId },
    /// Linked request is already ACCEPTED or REJECTED.
    RequestResolved {
        request_id: RequestId,
        status: SwapStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StuckSlot {
    pub slot: Slot,
    pub reason: StuckReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Slot went back to SWAPPABLE with its owner unchanged.
    Released,
    /// The accepted swap's ownership change was finished; slot is BUSY.
    Completed { new_owner: UserId },
}

impl ExchangeCoordinator {
    /// SWAP_PENDING slots whose reservation cannot be resolved through
    /// [`ExchangeCoordinator::resolve`].
    #[instrument(skip(self), target = "exchange")]
    pub async fn stuck_slots(&self) -> Result<Vec<StuckSlot>, ExchangeError> {
        let pending = self.slots.list_by_status(SlotStatus::SwapPending).await?;

        let checks = pending.into_iter().map(|slot| async move {
            let reason = self.stuck_reason(&slot).await?;
            Ok::<_, ExchangeError>(reason.map(|reason| StuckSlot { slot, reason }))
        });
        let stuck: Vec<StuckSlot> = try_join_all(checks).await?.into_iter().flatten().collect();

        if !stuck.is_empty() {
            warn!(count = stuck.len(), "found stuck slots");
        }
        Ok(stuck)
    }

    /// Clears a stuck reservation on `slot_id`.
    ///
    /// Refuses slots that are not SWAP_PENDING and slots still held by a
    /// PENDING request. A slot of an ACCEPTED request is handed to its new
    /// owner; every other stuck slot returns to SWAPPABLE.
    #[instrument(skip(self), target = "exchange")]
    pub async fn force_release(&self, slot_id: SlotId) -> Result<ReleaseOutcome, ExchangeError> {
        let slot = self
            .slots
            .get(slot_id)
            .await?
            .ok_or_else(|| ExchangeError::InvalidSlotState(format!("slot {slot_id} not found")))?;

        if slot.status != SlotStatus::SwapPending {
            return Err(ExchangeError::InvalidSlotState(format!(
                "slot {slot_id} is {}, not SWAP_PENDING",
                slot.status
            )));
        }

        let (write, outcome) = match slot.swap_request_id {
            None => (SlotTransition::release_orphan(), ReleaseOutcome::Released),
            Some(request_id) => match self.swaps.get(request_id).await? {
                Some(r) if r.status == SwapStatus::Pending => {
                    return Err(ExchangeError::InvalidSlotState(format!(
                        "slot {slot_id} is held by pending request {request_id}"
                    )));
                }
                Some(r) if r.status == SwapStatus::Accepted => {
                    match (r.original_owner_of(slot_id), r.accepted_owner_of(slot_id)) {
                        (Some(from), Some(to)) => (
                            SlotTransition::transfer(request_id, from, to),
                            ReleaseOutcome::Completed { new_owner: to },
                        ),
                        _ => (
                            SlotTransition::release(request_id),
                            ReleaseOutcome::Released,
                        ),
                    }
                }
                _ => (
                    SlotTransition::release(request_id),
                    ReleaseOutcome::Released,
                ),
            },
        };

        if !self.slots.transition(slot_id, &write).await? {
            return Err(ExchangeError::InvalidSlotState(format!(
                "slot {slot_id} changed while being released"
            )));
        }

        info!(?outcome, "force-released slot");
        Ok(outcome)
    }

    async fn stuck_reason(&self, slot: &Slot) -> Result<Option<StuckReason>, ExchangeError> {
        let Some(request_id) = slot.swap_request_id else {
            return Ok(Some(StuckReason::MissingLink));
        };

        Ok(match self.swaps.get(request_id).await? {
            None => Some(StuckReason::RequestMissing { request_id }),
            Some(r) if r.status.is_terminal() => Some(StuckReason::RequestResolved {
                request_id,
                status: r.status,
            }),
            Some(_) => None,
        })
    }
}
