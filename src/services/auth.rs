//! Authorization service
//!
//! Role checks for bot operations. Telegram ids listed in `bot.admin_ids`
//! always act as admins, whatever role is stored for them.

use crate::config::settings::Settings;
use crate::models::{Event, User, UserRole};
use crate::utils::errors::{EventDeskError, Result};

#[derive(Clone, Debug)]
pub struct AuthService {
    admin_ids: Vec<i64>,
    admin_panel_enabled: bool,
}

impl AuthService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            admin_ids: settings.bot.admin_ids.clone(),
            admin_panel_enabled: settings.features.admin_panel,
        }
    }

    /// Check if a Telegram id is a configured bot admin
    pub fn is_bot_admin(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }

    /// Role the user acts with
    pub fn effective_role(&self, user: &User) -> UserRole {
        if self.is_bot_admin(user.telegram_id) {
            UserRole::Admin
        } else {
            user.role
        }
    }

    pub fn is_admin(&self, user: &User) -> bool {
        self.effective_role(user) == UserRole::Admin
    }

    pub fn can_organize(&self, user: &User) -> bool {
        self.effective_role(user).can_organize()
    }

    /// Owners and admins may manage an event
    pub fn can_manage_event(&self, user: &User, event: &Event) -> bool {
        event.created_by == user.id || self.is_admin(user)
    }

    pub fn require_active(&self, user: &User) -> Result<()> {
        if user.is_banned && !self.is_bot_admin(user.telegram_id) {
            return Err(EventDeskError::UserBanned { user_id: user.id });
        }
        Ok(())
    }

    pub fn require_admin(&self, user: &User) -> Result<()> {
        if !self.is_admin(user) {
            return Err(EventDeskError::PermissionDenied(format!(
                "User {} is not an admin",
                user.id
            )));
        }
        Ok(())
    }

    /// Statistics and job views; moderation commands only need `require_admin`
    pub fn require_admin_panel(&self, user: &User) -> Result<()> {
        self.require_admin(user)?;
        if !self.admin_panel_enabled {
            return Err(EventDeskError::PermissionDenied("Admin panel is disabled".to_string()));
        }
        Ok(())
    }

    pub fn require_organizer(&self, user: &User) -> Result<()> {
        self.require_active(user)?;
        if !self.can_organize(user) {
            return Err(EventDeskError::PermissionDenied(format!(
                "User {} cannot organize events",
                user.id
            )));
        }
        Ok(())
    }

    pub fn require_event_manager(&self, user: &User, event: &Event) -> Result<()> {
        self.require_active(user)?;
        if !self.can_manage_event(user, event) {
            return Err(EventDeskError::PermissionDenied(format!(
                "User {} does not manage event {}",
                user.id, event.id
            )));
        }
        Ok(())
    }
}
