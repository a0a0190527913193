use serde::{Deserialize, Serialize};

pub type UserId = uuid::Uuid;

/// Public identity of a user, shown next to slots and requests.
/// Credentials live with the identity provider, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
}
