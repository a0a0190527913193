use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::slot::SlotId;
use super::user::UserId;

pub type RequestId = uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "PENDING",
            SwapStatus::Accepted => "ACCEPTED",
            SwapStatus::Rejected => "REJECTED",
        }
    }

    /// Accepted and rejected requests never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapStatus::Pending)
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SwapStatus::Pending),
            "ACCEPTED" => Ok(SwapStatus::Accepted),
            "REJECTED" => Ok(SwapStatus::Rejected),
            other => Err(anyhow::anyhow!("Invalid SwapStatus value: {}", other)),
        }
    }
}

/// The target user's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    /// Terminal status the request moves to under this decision.
    pub fn outcome(&self) -> SwapStatus {
        match self {
            Decision::Accept => SwapStatus::Accepted,
            Decision::Reject => SwapStatus::Rejected,
        }
    }
}

/// A proposed trade of two specific slots between two specific users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: RequestId,
    pub requester_id: UserId,
    pub target_id: UserId,
    pub requester_slot_id: SlotId,
    pub target_slot_id: SlotId,
    pub status: SwapStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl SwapRequest {
    /// The user `user_id` is trading with, if they take part at all.
    pub fn counterpart_of(&self, user_id: UserId) -> Option<UserId> {
        if user_id == self.requester_id {
            Some(self.target_id)
        } else if user_id == self.target_id {
            Some(self.requester_id)
        } else {
            None
        }
    }

    /// Owner `slot_id` ends up with once this request is accepted.
    pub fn accepted_owner_of(&self, slot_id: SlotId) -> Option<UserId> {
        if slot_id == self.requester_slot_id {
            Some(self.target_id)
        } else if slot_id == self.target_slot_id {
            Some(self.requester_id)
        } else {
            None
        }
    }

    /// Owner `slot_id` had when this request was created.
    pub fn original_owner_of(&self, slot_id: SlotId) -> Option<UserId> {
        if slot_id == self.requester_slot_id {
            Some(self.requester_id)
        } else if slot_id == self.target_slot_id {
            Some(self.target_id)
        } else {
            None
        }
    }
}

/// Insert payload. The id is allocated by the caller so slot reservations
/// can name the request before the row exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSwapRequest {
    pub id: RequestId,
    pub requester_id: UserId,
    pub target_id: UserId,
    pub requester_slot_id: SlotId,
    pub target_slot_id: SlotId,
}

impl NewSwapRequest {
    pub fn into_pending(self, now_ms: i64) -> SwapRequest {
        SwapRequest {
            id: self.id,
            requester_id: self.requester_id,
            target_id: self.target_id,
            requester_slot_id: self.requester_slot_id,
            target_slot_id: self.target_slot_id,
            status: SwapStatus::Pending,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}
