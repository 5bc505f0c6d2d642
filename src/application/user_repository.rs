// Repository trait for user account access
//
// The relational database behind the admin API is an external
// collaborator; this trait is the integration seam. The bundled
// implementation lives in `infrastructure::user_store`.

use crate::domain::user::{Role, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Fields for a new account; the password is already hashed by the service.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
}

/// Mutable fields of an existing account.
#[derive(Debug, Clone)]
pub struct UserRecordUpdate {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<User>>;

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn insert(&self, record: NewUserRecord) -> anyhow::Result<User>;

    /// Returns false when no account with that id exists.
    async fn update(&self, id: i64, update: UserRecordUpdate) -> anyhow::Result<bool>;

    async fn delete(&self, id: i64) -> anyhow::Result<()>;

    async fn record_login(&self, id: i64, when: DateTime<Utc>) -> anyhow::Result<()>;
}
