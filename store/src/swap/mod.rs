pub mod sqlite_store;

use anyhow::Result;
use async_trait::async_trait;

use corelib::{NewSwapRequest, RequestId, SwapRequest, SwapStatus, UserId};

/// Raw requests touching one user, split by the user's role in them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRequests {
    pub incoming: Vec<SwapRequest>,
    pub outgoing: Vec<SwapRequest>,
}

#[async_trait]
pub trait SwapRequestStore: Send + Sync {
    /// Inserts a PENDING request and returns the stored record.
    async fn create(&self, request: &NewSwapRequest) -> Result<SwapRequest>;

    async fn get(&self, request_id: RequestId) -> Result<Option<SwapRequest>>;

    /// The request iff it exists and `target_id` is its target, any status.
    async fn find_for_target(
        &self,
        request_id: RequestId,
        target_id: UserId,
    ) -> Result<Option<SwapRequest>>;

    /// The request iff it exists, is PENDING and `target_id` is its target.
    async fn find_pending_for_target(
        &self,
        request_id: RequestId,
        target_id: UserId,
    ) -> Result<Option<SwapRequest>>;

    /// One-shot PENDING -> `status`. `Ok(false)` when the request is missing or
    /// already resolved; nothing is written in that case.
    async fn set_status(&self, request_id: RequestId, status: SwapStatus) -> Result<bool>;

    /// Requests where `user_id` is the target (incoming) or the requester
    /// (outgoing), newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<UserRequests>;
}
