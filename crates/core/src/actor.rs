//! Actor identity consumed by workflow commands.
//!
//! Authentication and session handling happen outside this workspace; commands
//! receive the already-resolved identity and role and only enforce role
//! requirements at the workflow boundary.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Role granted to an actor by the external authorization layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    StoreOwner,
    Supplier,
    Customer,
}

/// Authenticated caller of a workflow command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(user_id: UserId, role: ActorRole) -> Self {
        Self { user_id, role }
    }

    /// Fails with [`DomainError::Unauthorized`] unless the actor holds `role`.
    pub fn require_role(&self, role: ActorRole) -> DomainResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }

    /// Fails with [`DomainError::Unauthorized`] unless the actor holds one of `roles`.
    pub fn require_any(&self, roles: &[ActorRole]) -> DomainResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(DomainError::Unauthorized)
        }
    }
}
