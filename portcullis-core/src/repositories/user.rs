use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{Error, User, UserId};

/// Repository for user records.
///
/// The user store belongs to the surrounding application; this trait is the
/// full surface this crate needs from it. Lookups by email expect the
/// normalized (trimmed, lower-cased) form.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Find a user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Find a user by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Insert or update a user record, returning the stored record
    async fn save(&self, user: &User) -> Result<User, Error>;
}

/// User store held in process memory. Reference implementation for tests and
/// examples; real deployments wire their own store.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save(&self, user: &User) -> Result<User, Error> {
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }
}
