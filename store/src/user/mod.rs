pub mod sqlite_store;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use corelib::{UserId, UserProfile};

/// Public identities of users. Stands in for the identity provider; holds no
/// credentials.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn upsert(&self, profile: &UserProfile) -> Result<()>;

    async fn get(&self, user_id: UserId) -> Result<Option<UserProfile>>;

    /// Profiles for the ids that exist; unknown ids are simply absent.
    async fn profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>>;
}
