// File-backed user repository
//
// The admin API's relational database is an external collaborator; this
// implementation keeps accounts as a JSON document in the key-value store
// so the service runs self-contained. Swap in a SQL-backed implementation
// of `UserRepository` to integrate the real `users` table.

use crate::application::user_repository::{NewUserRecord, UserRecordUpdate, UserRepository};
use crate::domain::user::User;
use crate::infrastructure::store::{get_value, set_value, KvStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

const USERS_KEY: &str = "users";

pub struct JsonUserRepository {
    store: Arc<dyn KvStore>,
    users: Mutex<Vec<User>>,
}

impl JsonUserRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let users: Vec<User> = get_value(store.as_ref(), USERS_KEY).unwrap_or_default();
        Self {
            store,
            users: Mutex::new(users),
        }
    }

    fn persist(&self, users: &[User]) {
        if !set_value(self.store.as_ref(), USERS_KEY, &users).is_persisted() {
            tracing::error!("user accounts not persisted; in-memory state kept");
        }
    }
}

#[async_trait]
impl UserRepository for JsonUserRepository {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.lock().await.clone())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, record: NewUserRecord) -> anyhow::Result<User> {
        let mut users = self.users.lock().await;
        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = User {
            id,
            username: record.username,
            password_hash: record.password_hash,
            email: record.email,
            role: record.role,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        };
        users.push(user.clone());
        self.persist(&users);
        Ok(user)
    }

    async fn update(&self, id: i64, update: UserRecordUpdate) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        user.username = update.username;
        user.email = update.email;
        user.role = update.role;
        user.is_active = update.is_active;
        self.persist(&users);
        Ok(true)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        let mut users = self.users.lock().await;
        users.retain(|u| u.id != id);
        self.persist(&users);
        Ok(())
    }

    async fn record_login(&self, id: i64, when: DateTime<Utc>) -> anyhow::Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.last_login = Some(when);
            self.persist(&users);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use crate::infrastructure::store::testutil::MemStore;

    fn record(username: &str, email: &str) -> NewUserRecord {
        NewUserRecord {
            username: username.into(),
            password_hash: "$2b$10$hash".into(),
            email: email.into(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn ids_are_monotonic_across_deletes() {
        let repository = JsonUserRepository::new(Arc::new(MemStore::default()));
        let a = repository.insert(record("a", "a@x")).await.unwrap();
        let b = repository.insert(record("b", "b@x")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        repository.delete(1).await.unwrap();
        let c = repository.insert(record("c", "c@x")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn state_survives_a_reload_from_the_same_store() {
        let store = Arc::new(MemStore::default());
        {
            let repository = JsonUserRepository::new(store.clone());
            repository.insert(record("ops", "ops@x")).await.unwrap();
        }
        let reloaded = JsonUserRepository::new(store);
        let users = reloaded.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "ops");
    }

    #[tokio::test]
    async fn update_returns_false_for_missing_users() {
        let repository = JsonUserRepository::new(Arc::new(MemStore::default()));
        let updated = repository
            .update(
                7,
                UserRecordUpdate {
                    username: "x".into(),
                    email: "x@x".into(),
                    role: Role::User,
                    is_active: true,
                },
            )
            .await
            .unwrap();
        assert!(!updated);
    }
}
