use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{Span, debug, error, field, info, instrument, warn};
use uuid::Uuid;

use common::logger::warn_if_slow;
use corelib::{
    Decision, NewSwapRequest, RequestId, SlotId, SlotStatus, SwapRequest, SwapStatus, UserId,
};
use store::{SlotStore, SlotTransition, SwapRequestStore, UserDirectory};

use crate::error::ExchangeError;

const SLOW_STORE_CALL: Duration = Duration::from_millis(250);

/// Orchestrates the slot and swap-request stores.
///
/// Holds no locks and no in-memory state: every decision is re-derived from
/// the stores, and every write is a conditioned single-row operation, so any
/// number of handlers may call into one coordinator concurrently.
pub struct ExchangeCoordinator {
    pub(crate) slots: Arc<dyn SlotStore>,
    pub(crate) swaps: Arc<dyn SwapRequestStore>,
    pub(crate) users: Arc<dyn UserDirectory>,
}

/// Result of a successful resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub request: SwapRequest,

    /// The request was already resolved the same way; only the idempotent
    /// slot writes were re-applied.
    pub replayed: bool,
}

impl ExchangeCoordinator {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        swaps: Arc<dyn SwapRequestStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self { slots, swaps, users }
    }

    /// Offers `offered_slot_id` (the caller's) in exchange for
    /// `requested_slot_id` (someone else's).
    ///
    /// Both slots are reserved before the request row is written. The target
    /// user is taken from the requested slot's row, never from the caller.
    #[instrument(skip(self), target = "exchange", fields(request_id = field::Empty))]
    pub async fn propose(
        &self,
        caller: UserId,
        offered_slot_id: SlotId,
        requested_slot_id: SlotId,
    ) -> Result<SwapRequest, ExchangeError> {
        if offered_slot_id == requested_slot_id {
            return Err(ExchangeError::InvalidSlotState(
                "a slot cannot be traded for itself".into(),
            ));
        }

        let (offered, requested) = warn_if_slow("propose.read_slots", SLOW_STORE_CALL, async {
            tokio::try_join!(
                self.slots
                    .find_owned(offered_slot_id, caller, SlotStatus::Swappable),
                self.slots.get(requested_slot_id),
            )
        })
        .await?;

        let Some(offered) = offered else {
            debug!("offered slot is not owned by caller or not swappable");
            return Err(ExchangeError::InvalidSlotState(format!(
                "slot {offered_slot_id} is not yours or not swappable"
            )));
        };

        let requested = match requested {
            Some(s) if s.status == SlotStatus::Swappable && !s.is_owned_by(caller) => s,
            other => {
                debug!(
                    found = other.is_some(),
                    "requested slot is not available for swapping"
                );
                return Err(ExchangeError::InvalidSlotState(format!(
                    "slot {requested_slot_id} is not available for swapping"
                )));
            }
        };

        let new_request = NewSwapRequest {
            id: Uuid::new_v4(),
            requester_id: caller,
            target_id: requested.owner_id,
            requester_slot_id: offered.id,
            target_slot_id: requested.id,
        };
        Span::current().record("request_id", field::display(new_request.id));

        self.reserve_pair(&new_request).await?;

        match self.swaps.create(&new_request).await {
            Ok(created) => {
                info!(target_id = %created.target_id, "swap proposed");
                Ok(created)
            }
            Err(e) => {
                error!(error = ?e, "swap request insert failed; unwinding reservations");
                self.unwind_proposal(&new_request).await;
                Err(e.into())
            }
        }
    }

    /// Accepts or rejects a request addressed to `caller`.
    ///
    /// Resolving an already-resolved request the same way is a success that
    /// re-applies the slot writes; they are keyed by the request id, so a
    /// slot that already moved is left alone.
    #[instrument(skip(self), target = "exchange")]
    pub async fn resolve(
        &self,
        caller: UserId,
        request_id: RequestId,
        decision: Decision,
    ) -> Result<Resolution, ExchangeError> {
        let Some(request) = self.swaps.find_for_target(request_id, caller).await? else {
            debug!("no request with this id addressed to caller");
            return Err(ExchangeError::RequestNotFound);
        };
        let outcome = decision.outcome();

        let replayed = match request.status {
            SwapStatus::Pending => self.settle(&request, decision).await?,
            status => replay_or_not_found(status, outcome)?,
        };

        self.apply_outcome(&request, decision, replayed).await?;

        let settled = match self.swaps.get(request_id).await? {
            Some(r) => r,
            None => SwapRequest {
                status: outcome,
                ..request
            },
        };

        info!(status = %settled.status, replayed, "swap resolved");
        Ok(Resolution {
            request: settled,
            replayed,
        })
    }

    /// Moves a PENDING request to `decision`'s outcome. `Ok(true)` when a
    /// concurrent resolve got there first with the same decision.
    async fn settle(&self, request: &SwapRequest, decision: Decision) -> Result<bool, ExchangeError> {
        let outcome = decision.outcome();

        if decision == Decision::Accept {
            match self.ensure_reserved(request).await {
                Ok(()) => {}
                Err(refused @ ExchangeError::InvalidSlotState(_)) => {
                    // Reservations are consumed only after the request row is
                    // terminal; a terminal row here is a concurrent winner.
                    return match self.swaps.get(request.id).await? {
                        Some(current) if current.status.is_terminal() => {
                            replay_or_not_found(current.status, outcome)
                        }
                        _ => Err(refused),
                    };
                }
                Err(e) => return Err(e),
            }
        }

        if self.swaps.set_status(request.id, outcome).await? {
            return Ok(false);
        }

        debug!("lost to a concurrent resolve");
        let current = self
            .swaps
            .get(request.id)
            .await?
            .ok_or(ExchangeError::RequestNotFound)?;
        replay_or_not_found(current.status, outcome)
    }

    /// Reserves the offered slot, then the requested one. A lost race on the
    /// second releases the first.
    async fn reserve_pair(&self, req: &NewSwapRequest) -> Result<(), ExchangeError> {
        let offered = self
            .slots
            .transition(
                req.requester_slot_id,
                &SlotTransition::reserve(req.requester_id, req.id),
            )
            .await;

        match offered {
            Ok(true) => {}
            Ok(false) => {
                debug!(slot_id = %req.requester_slot_id, "offered slot changed before reservation");
                return Err(ExchangeError::InvalidSlotState(format!(
                    "slot {} is no longer available",
                    req.requester_slot_id
                )));
            }
            Err(e) => {
                self.release_quietly(req.requester_slot_id, req.id).await;
                return Err(e.into());
            }
        }

        let requested = self
            .slots
            .transition(
                req.target_slot_id,
                &SlotTransition::reserve(req.target_id, req.id),
            )
            .await;

        match requested {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(slot_id = %req.target_slot_id, "lost the race for the requested slot");
                self.release_quietly(req.requester_slot_id, req.id).await;
                Err(ExchangeError::InvalidSlotState(format!(
                    "slot {} is no longer available",
                    req.target_slot_id
                )))
            }
            Err(e) => {
                self.release_quietly(req.target_slot_id, req.id).await;
                self.release_quietly(req.requester_slot_id, req.id).await;
                Err(e.into())
            }
        }
    }

    /// Best-effort undo after an unconfirmed insert. The row may have landed,
    /// so it is closed before the slots are released.
    async fn unwind_proposal(&self, req: &NewSwapRequest) {
        if let Err(e) = self.swaps.set_status(req.id, SwapStatus::Rejected).await {
            error!(request_id = %req.id, error = ?e, "could not close unconfirmed swap request");
        }
        self.release_quietly(req.requester_slot_id, req.id).await;
        self.release_quietly(req.target_slot_id, req.id).await;
    }

    async fn release_quietly(&self, slot_id: SlotId, request_id: RequestId) {
        if let Err(e) = self
            .slots
            .transition(slot_id, &SlotTransition::release(request_id))
            .await
        {
            error!(
                %slot_id,
                %request_id,
                error = ?e,
                "failed to release reservation; slot needs force-release"
            );
        }
    }

    /// Both slots must still be reserved by `request` before it may be accepted.
    async fn ensure_reserved(&self, request: &SwapRequest) -> Result<(), ExchangeError> {
        let slots = self
            .slots
            .get_many(&[request.requester_slot_id, request.target_slot_id])
            .await?;

        let held = |slot_id: SlotId| {
            slots
                .iter()
                .any(|s| s.id == slot_id && s.is_reserved_by(request.id))
        };

        if held(request.requester_slot_id) && held(request.target_slot_id) {
            Ok(())
        } else {
            warn!("accept refused: slots are no longer reserved by this request");
            Err(ExchangeError::InvalidSlotState(format!(
                "slots of request {} are no longer reserved for it",
                request.id
            )))
        }
    }

    async fn apply_outcome(
        &self,
        request: &SwapRequest,
        decision: Decision,
        replayed: bool,
    ) -> Result<(), ExchangeError> {
        let (requester_write, target_write) = match decision {
            Decision::Accept => (
                SlotTransition::transfer(request.id, request.requester_id, request.target_id),
                SlotTransition::transfer(request.id, request.target_id, request.requester_id),
            ),
            Decision::Reject => (
                SlotTransition::release(request.id),
                SlotTransition::release(request.id),
            ),
        };

        let (requester_applied, target_applied) =
            warn_if_slow("resolve.slot_writes", SLOW_STORE_CALL, async {
                tokio::try_join!(
                    self.slots
                        .transition(request.requester_slot_id, &requester_write),
                    self.slots.transition(request.target_slot_id, &target_write),
                )
            })
            .await?;

        if replayed {
            debug!(requester_applied, target_applied, "re-applied slot writes");
        } else if !(requester_applied && target_applied) {
            warn!(
                requester_applied,
                target_applied, "slot no longer reserved by this request; left untouched"
            );
        }

        Ok(())
    }
}

fn replay_or_not_found(current: SwapStatus, outcome: SwapStatus) -> Result<bool, ExchangeError> {
    if current == outcome {
        Ok(true)
    } else {
        debug!(%current, "request resolved the other way");
        Err(ExchangeError::RequestNotFound)
    }
}
