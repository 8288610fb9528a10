//! Caller identity as handed over by the authentication layer.

use crate::error::AuthError;
use crate::model::{Role, UserId};

/// The authenticated principal behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user: UserId, role: Role) -> Self {
        Self { user, role }
    }

    pub fn player(user: UserId) -> Self {
        Self::new(user, Role::User)
    }

    pub fn admin(user: UserId) -> Self {
        Self::new(user, Role::Admin)
    }

    pub fn require_active(&self) -> Result<(), AuthError> {
        if self.role.can_play() {
            Ok(())
        } else {
            Err(AuthError::Inactive)
        }
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        self.require_active()?;
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AuthError::AdminRequired)
        }
    }

    /// Self-service operations may only touch the caller's own data.
    pub fn require_self(&self, user: UserId) -> Result<(), AuthError> {
        self.require_active()?;
        if self.user == user {
            Ok(())
        } else {
            Err(AuthError::NotOwner)
        }
    }
}
