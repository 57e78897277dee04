//! Acting identity
//!
//! Identity verification happens outside this service; callers arrive with
//! a verified user id and role from the identity layer.

use serde::{Deserialize, Serialize};

/// Role attached to a verified identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Organizer,
    Admin,
}

/// A verified caller, as produced by the external identity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
