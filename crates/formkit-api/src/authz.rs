use formkit_core::Template;
use serde::{Deserialize, Serialize};

use crate::ports::EditAuthorizer;

/// Caller identity as established upstream. Credentials are never checked here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), is_admin: false }
    }

    #[must_use]
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), is_admin: true }
    }
}

/// Admins edit anything; everyone else only templates they authored.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerOrAdmin;

impl EditAuthorizer for OwnerOrAdmin {
    fn is_authorized_to_edit(&self, actor: &Actor, template: &Template) -> bool {
        actor.is_admin || (!actor.user_id.is_empty() && actor.user_id == template.author_id)
    }
}
