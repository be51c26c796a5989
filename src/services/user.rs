//! User service implementation
//!
//! Registration on first contact, profile and language preferences, and the
//! admin operations on accounts (ban, role assignment).

use tracing::{info, warn, debug};
use crate::config::settings::Settings;
use crate::database::repositories::UserRepository;
use crate::models::user::{User, UserRole, CreateUserRequest, UpdateUserRequest};
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::normalize_whitespace;
use crate::utils::logging::log_admin_action;

const MIN_FULL_NAME_CHARS: usize = 2;
const MAX_FULL_NAME_CHARS: usize = 100;

/// User service for managing user operations
#[derive(Clone)]
pub struct UserService {
    user_repository: UserRepository,
    settings: Settings,
}

impl UserService {
    pub fn new(user_repository: UserRepository, settings: Settings) -> Self {
        Self {
            user_repository,
            settings,
        }
    }

    /// Register a new user or refresh an existing one from their Telegram profile
    pub async fn register_or_update(
        &self,
        telegram_id: i64,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        language_code: Option<String>,
    ) -> Result<User> {
        debug!(telegram_id = telegram_id, "Registering or refreshing user");

        let language_code = language_code
            .and_then(|code| code.split('-').next().map(str::to_string))
            .filter(|code| self.settings.i18n.supported_languages.contains(code))
            .unwrap_or_else(|| self.settings.i18n.default_language.clone());

        let user = self
            .user_repository
            .upsert(CreateUserRequest {
                telegram_id,
                username,
                first_name,
                last_name,
                language_code: Some(language_code),
            })
            .await?;

        Ok(user)
    }

    /// Set user language preference
    pub async fn set_language_preference(&self, user_id: i64, language_code: &str) -> Result<User> {
        if !self.settings.i18n.supported_languages.iter().any(|l| l == language_code) {
            warn!(user_id = user_id, language_code = %language_code, "Unsupported language code");
            return Err(EventDeskError::InvalidInput(format!("Unsupported language: {}", language_code)));
        }

        let user = self
            .user_repository
            .update(user_id, UpdateUserRequest {
                language_code: Some(language_code.to_string()),
                ..Default::default()
            })
            .await?;

        info!(user_id = user_id, language_code = %language_code, "User language preference updated");
        Ok(user)
    }

    /// Store the name printed on certificates
    pub async fn set_full_name(&self, user_id: i64, full_name: &str) -> Result<User> {
        let full_name = validate_full_name(full_name)?;

        let user = self
            .user_repository
            .update(user_id, UpdateUserRequest {
                full_name: Some(full_name),
                ..Default::default()
            })
            .await?;

        info!(user_id = user_id, "User full name updated");
        Ok(user)
    }

    /// Ban or unban a user by Telegram id
    pub async fn set_ban_status(&self, admin: &User, target_telegram_id: i64, banned: bool) -> Result<User> {
        if banned && self.settings.bot.admin_ids.contains(&target_telegram_id) {
            return Err(EventDeskError::PermissionDenied(
                "Configured admins cannot be banned".to_string(),
            ));
        }

        let target = self
            .user_repository
            .find_by_telegram_id(target_telegram_id)
            .await?
            .ok_or(EventDeskError::UserNotFound { user_id: target_telegram_id })?;

        let user = self.user_repository.set_ban_status(target.id, banned).await?;
        log_admin_action(
            admin.id,
            if banned { "ban_user" } else { "unban_user" },
            Some(&target_telegram_id.to_string()),
            None,
        );
        Ok(user)
    }

    /// Assign a role by Telegram id
    pub async fn set_role(&self, admin: &User, target_telegram_id: i64, role: UserRole) -> Result<User> {
        let target = self
            .user_repository
            .find_by_telegram_id(target_telegram_id)
            .await?
            .ok_or(EventDeskError::UserNotFound { user_id: target_telegram_id })?;

        let user = self.user_repository.set_role(target.id, role).await?;
        log_admin_action(
            admin.id,
            "set_role",
            Some(&target_telegram_id.to_string()),
            Some(role.as_str()),
        );
        Ok(user)
    }

    pub async fn banned_users(&self) -> Result<Vec<User>> {
        self.user_repository.get_banned_users().await
    }
}

/// Normalize and check a certificate name
pub fn validate_full_name(input: &str) -> Result<String> {
    let name = normalize_whitespace(input);
    let length = name.chars().count();

    if length < MIN_FULL_NAME_CHARS || length > MAX_FULL_NAME_CHARS {
        return Err(EventDeskError::InvalidInput(format!(
            "Name must be between {} and {} characters",
            MIN_FULL_NAME_CHARS, MAX_FULL_NAME_CHARS
        )));
    }
    if name.chars().any(|c| c.is_control() || c.is_ascii_digit()) {
        return Err(EventDeskError::InvalidInput("Name contains invalid characters".to_string()));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_full_name() {
        assert_eq!(validate_full_name("  Ada   Lovelace ").unwrap(), "Ada Lovelace");
        assert_eq!(validate_full_name("Анна Иванова").unwrap(), "Анна Иванова");
        assert!(validate_full_name("A").is_err());
        assert!(validate_full_name("R2D2").is_err());
        assert!(validate_full_name(&"x".repeat(101)).is_err());
    }
}
