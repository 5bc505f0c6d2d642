// User management use cases: admin CRUD plus credential authentication

use crate::application::user_repository::{NewUserRecord, UserRecordUpdate, UserRepository};
use crate::domain::user::{Role, UserView};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Matches the legacy bcrypt salt rounds.
const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("missing required fields")]
    MissingFields,
    #[error("this {0} is already in use")]
    Duplicate(&'static str),
    #[error("user not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is inactive")]
    Inactive,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Omitted means "leave active", as the legacy endpoint did.
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_users(&self) -> Result<Vec<UserView>, UserError> {
        let users = self.repository.list().await?;
        Ok(users.iter().map(|u| u.view()).collect())
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<UserView, UserError> {
        if new_user.username.trim().is_empty()
            || new_user.password.is_empty()
            || new_user.email.trim().is_empty()
        {
            return Err(UserError::MissingFields);
        }

        if self
            .repository
            .find_by_username(&new_user.username)
            .await?
            .is_some()
        {
            return Err(UserError::Duplicate("username"));
        }
        if self
            .repository
            .find_by_email(&new_user.email)
            .await?
            .is_some()
        {
            return Err(UserError::Duplicate("email"));
        }

        let password_hash = bcrypt::hash(&new_user.password, BCRYPT_COST)
            .map_err(|e| UserError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;

        let user = self
            .repository
            .insert(NewUserRecord {
                username: new_user.username,
                password_hash,
                email: new_user.email,
                role: new_user.role,
            })
            .await?;

        Ok(user.view())
    }

    pub async fn update_user(&self, update: UserUpdate) -> Result<(), UserError> {
        if update.username.trim().is_empty() || update.email.trim().is_empty() {
            return Err(UserError::MissingFields);
        }

        let updated = self
            .repository
            .update(
                update.id,
                UserRecordUpdate {
                    username: update.username,
                    email: update.email,
                    role: update.role,
                    is_active: update.is_active.unwrap_or(true),
                },
            )
            .await?;

        if updated {
            Ok(())
        } else {
            Err(UserError::NotFound)
        }
    }

    /// Deleting a missing id succeeds, as the legacy endpoint did.
    pub async fn delete_user(&self, id: i64) -> Result<(), UserError> {
        self.repository.delete(id).await?;
        Ok(())
    }

    /// Verify credentials against the stored bcrypt hash and record the
    /// login time. Inactive accounts are rejected after verification.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserView, UserError> {
        let mut user = self
            .repository
            .find_by_username(username)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| UserError::Internal(anyhow::anyhow!("password verification failed: {e}")))?;
        if !valid {
            return Err(UserError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(UserError::Inactive);
        }

        let now = Utc::now();
        self.repository.record_login(user.id, now).await?;
        // Reflect the login we just recorded; the fetched copy predates it.
        user.last_login = Some(now);
        Ok(user.view())
    }
}
