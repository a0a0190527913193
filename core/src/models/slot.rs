use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::swap::RequestId;
use super::user::UserId;

pub type SlotId = uuid::Uuid;

/// Tradability of a slot.
///
/// `Busy` and `Swappable` are toggled by the owner; `SwapPending` is entered
/// and left only by the exchange coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Busy,
    Swappable,
    SwapPending,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Busy => "BUSY",
            SlotStatus::Swappable => "SWAPPABLE",
            SlotStatus::SwapPending => "SWAP_PENDING",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUSY" => Ok(SlotStatus::Busy),
            "SWAPPABLE" => Ok(SlotStatus::Swappable),
            "SWAP_PENDING" => Ok(SlotStatus::SwapPending),
            other => Err(anyhow::anyhow!("Invalid SlotStatus value: {}", other)),
        }
    }
}

/// A bookable calendar interval with exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub owner_id: UserId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,

    /// Request holding the reservation. Set iff `status == SwapPending`.
    pub swap_request_id: Option<RequestId>,

    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Slot {
    /// Builds a fresh BUSY slot from owner input.
    pub fn create(id: SlotId, input: NewSlot, now_ms: i64) -> Self {
        Self {
            id,
            owner_id: input.owner_id,
            title: input.details.title,
            start_time: input.details.start_time,
            end_time: input.details.end_time,
            status: SlotStatus::Busy,
            swap_request_id: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// True when the slot is reserved by exactly `request_id`.
    pub fn is_reserved_by(&self, request_id: RequestId) -> bool {
        self.status == SlotStatus::SwapPending && self.swap_request_id == Some(request_id)
    }

    /// Status and reservation link agree with each other.
    pub fn link_is_consistent(&self) -> bool {
        (self.status == SlotStatus::SwapPending) == self.swap_request_id.is_some()
    }
}

/// Owner-editable fields of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDetails {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SlotDetails {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be blank".into());
        }
        if self.end_time <= self.start_time {
            return Err(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSlot {
    pub owner_id: UserId,
    #[serde(flatten)]
    pub details: SlotDetails,
}
