use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use corelib::{
    RequestBoard, Slot, SlotId, SlotListing, SwapRequest, SwapRequestView, UserId, UserProfile,
};
use store::UserRequests;

use crate::coordinator::ExchangeCoordinator;
use crate::error::ExchangeError;

impl ExchangeCoordinator {
    /// Every SWAPPABLE slot not owned by `caller`, with its owner's profile.
    #[instrument(skip(self), target = "exchange")]
    pub async fn discover(&self, caller: UserId) -> Result<Vec<SlotListing>, ExchangeError> {
        let slots = self.slots.swappable_excluding(caller).await?;

        let owners: Vec<UserId> = slots
            .iter()
            .map(|s| s.owner_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles = self.users.profiles(&owners).await?;

        debug!(count = slots.len(), "discovered swappable slots");
        Ok(slots
            .into_iter()
            .map(|slot| SlotListing {
                owner: profiles.get(&slot.owner_id).cloned(),
                slot,
            })
            .collect())
    }

    /// Incoming and outgoing requests of `user_id`, each joined with both
    /// slots and the counterpart's profile.
    #[instrument(skip(self), target = "exchange")]
    pub async fn list_requests(&self, user_id: UserId) -> Result<RequestBoard, ExchangeError> {
        let UserRequests { incoming, outgoing } = self.swaps.list_for_user(user_id).await?;

        let all: Vec<&SwapRequest> = incoming.iter().chain(&outgoing).collect();
        let slot_ids: Vec<SlotId> = all
            .iter()
            .flat_map(|r| [r.requester_slot_id, r.target_slot_id])
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let user_ids: Vec<UserId> = all
            .iter()
            .filter_map(|r| r.counterpart_of(user_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let (slots, profiles) = tokio::try_join!(
            self.slots.get_many(&slot_ids),
            self.users.profiles(&user_ids),
        )?;
        let slots: HashMap<SlotId, Slot> = slots.into_iter().map(|s| (s.id, s)).collect();

        Ok(RequestBoard {
            incoming: incoming
                .into_iter()
                .map(|r| {
                    let who = r.requester_id;
                    view(r, who, &slots, &profiles)
                })
                .collect(),
            outgoing: outgoing
                .into_iter()
                .map(|r| {
                    let who = r.target_id;
                    view(r, who, &slots, &profiles)
                })
                .collect(),
        })
    }
}

fn view(
    request: SwapRequest,
    counterpart: UserId,
    slots: &HashMap<SlotId, Slot>,
    profiles: &HashMap<UserId, UserProfile>,
) -> SwapRequestView {
    SwapRequestView {
        requester_slot: slots.get(&request.requester_slot_id).cloned(),
        target_slot: slots.get(&request.target_slot_id).cloned(),
        counterpart: profiles.get(&counterpart).cloned(),
        request,
    }
}
