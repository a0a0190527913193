use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use common::time::now_ms;
use corelib::{NewSlot, Slot, SlotDetails, SlotId, SlotStatus, UserId, UserProfile};
use store::{SlotStore, SlotTransition, UserDirectory};

use crate::error::ExchangeError;

/// Owner-facing slot CRUD and user registration.
///
/// Never touches a SWAP_PENDING slot: those belong to the coordinator until
/// their request is resolved.
pub struct SlotCatalog {
    slots: Arc<dyn SlotStore>,
    users: Arc<dyn UserDirectory>,
}

impl SlotCatalog {
    pub fn new(slots: Arc<dyn SlotStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { slots, users }
    }

    #[instrument(skip(self), target = "catalog")]
    pub async fn register_user(&self, name: &str, email: &str) -> Result<UserProfile, ExchangeError> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() {
            return Err(ExchangeError::InvalidInput("name must not be blank".into()));
        }
        if !email.contains('@') {
            return Err(ExchangeError::InvalidInput(format!(
                "{email:?} is not an email address"
            )));
        }

        let profile = UserProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
        };
        self.users.upsert(&profile).await?;

        info!(user_id = %profile.id, "user registered");
        Ok(profile)
    }

    /// New slots start BUSY.
    #[instrument(skip(self), target = "catalog")]
    pub async fn create_slot(
        &self,
        owner_id: UserId,
        details: SlotDetails,
    ) -> Result<Slot, ExchangeError> {
        details.validate().map_err(ExchangeError::InvalidInput)?;

        let slot = Slot::create(Uuid::new_v4(), NewSlot { owner_id, details }, now_ms());
        self.slots.insert(&slot).await?;

        info!(slot_id = %slot.id, "slot created");
        Ok(slot)
    }

    pub async fn my_slots(&self, owner_id: UserId) -> Result<Vec<Slot>, ExchangeError> {
        Ok(self.slots.list_for_owner(owner_id).await?)
    }

    /// Flips BUSY <-> SWAPPABLE. Already being in the wanted status is a
    /// success.
    #[instrument(skip(self), target = "catalog")]
    pub async fn set_swappable(
        &self,
        owner_id: UserId,
        slot_id: SlotId,
        swappable: bool,
    ) -> Result<Slot, ExchangeError> {
        let (from, to) = if swappable {
            (SlotStatus::Busy, SlotStatus::Swappable)
        } else {
            (SlotStatus::Swappable, SlotStatus::Busy)
        };

        let applied = self
            .slots
            .transition(slot_id, &SlotTransition::toggle(owner_id, from, to))
            .await?;

        let current = self
            .slots
            .find_owned(slot_id, owner_id, to)
            .await?;

        match current {
            Some(slot) => {
                if applied {
                    info!(status = %to, "slot status changed");
                }
                Ok(slot)
            }
            None => {
                debug!(applied, "toggle refused");
                Err(ExchangeError::InvalidSlotState(format!(
                    "slot {slot_id} is not yours or cannot become {to}"
                )))
            }
        }
    }

    #[instrument(skip(self), target = "catalog")]
    pub async fn update_slot(
        &self,
        owner_id: UserId,
        slot_id: SlotId,
        details: SlotDetails,
    ) -> Result<Slot, ExchangeError> {
        details.validate().map_err(ExchangeError::InvalidInput)?;

        if !self.slots.update_details(slot_id, owner_id, &details).await? {
            return Err(locked(slot_id));
        }

        self.slots
            .get(slot_id)
            .await?
            .ok_or_else(|| locked(slot_id))
    }

    #[instrument(skip(self), target = "catalog")]
    pub async fn delete_slot(&self, owner_id: UserId, slot_id: SlotId) -> Result<(), ExchangeError> {
        if !self.slots.delete(slot_id, owner_id).await? {
            return Err(locked(slot_id));
        }
        info!("slot deleted");
        Ok(())
    }
}

fn locked(slot_id: SlotId) -> ExchangeError {
    ExchangeError::InvalidSlotState(format!(
        "slot {slot_id} is missing, not yours, or locked by a pending swap"
    ))
}
