//! In-process storage backed by concurrent maps.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::models::{Movie, NewMovie, NewUser, Permissions, User};
use super::{Storage, StorageError};
use crate::security::token::{Token, TokenHash, TokenScope};

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: i64,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

#[derive(Default)]
struct Tables {
    users: DashMap<i64, User>,
    /// email -> user id; enforces uniqueness.
    emails: DashMap<String, i64>,
    tokens: DashMap<TokenHash, TokenRecord>,
    permissions: DashMap<i64, Permissions>,
    movies: DashMap<i64, Movie>,
    next_user_id: AtomicI64,
    next_movie_id: AtomicI64,
    offline: AtomicBool,
}

/// A thread-safe, cloneable in-memory [`Storage`].
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a backend error, as if the database were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Store a token row with an explicit expiry, bypassing generation.
    pub fn insert_token_record(
        &self,
        hash: TokenHash,
        user_id: i64,
        expiry: DateTime<Utc>,
        scope: TokenScope,
    ) {
        self.inner.tokens.insert(
            hash,
            TokenRecord {
                user_id,
                expiry,
                scope,
            },
        );
    }

    pub fn token_count(&self) -> usize {
        self.inner.tokens.len()
    }

    fn online(&self) -> Result<(), StorageError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user_for_token(
        &self,
        hash: &TokenHash,
        scope: TokenScope,
    ) -> Result<User, StorageError> {
        self.online()?;
        let record = self
            .inner
            .tokens
            .get(hash)
            .map(|r| r.value().clone())
            .ok_or(StorageError::NotFound)?;

        if record.scope != scope || Utc::now() >= record.expiry {
            return Err(StorageError::NotFound);
        }

        self.inner
            .users
            .get(&record.user_id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::NotFound)
    }

    async fn get_permissions(&self, user_id: i64) -> Result<Permissions, StorageError> {
        self.online()?;
        Ok(self
            .inner
            .permissions
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    async fn add_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StorageError> {
        self.online()?;
        if !self.inner.users.contains_key(&user_id) {
            return Err(StorageError::NotFound);
        }
        let mut perms = self.inner.permissions.entry(user_id).or_default();
        for code in codes {
            perms.insert(*code);
        }
        Ok(())
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StorageError> {
        self.online()?;
        self.insert_token_record(token.hash, token.user_id, token.expiry, token.scope);
        Ok(())
    }

    async fn delete_tokens(&self, scope: TokenScope, user_id: i64) -> Result<(), StorageError> {
        self.online()?;
        self.inner
            .tokens
            .retain(|_, record| !(record.user_id == user_id && record.scope == scope));
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StorageError> {
        self.online()?;
        if self.inner.emails.contains_key(&user.email) {
            return Err(StorageError::DuplicateEmail);
        }

        let id = self.inner.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = User {
            id,
            created_at: Utc::now(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            activated: user.activated,
            version: 1,
        };
        // The row exists before the email resolves to it.
        self.inner.users.insert(id, stored.clone());

        match self.inner.emails.entry(stored.email.clone()) {
            Entry::Occupied(_) => {
                self.inner.users.remove(&id);
                Err(StorageError::DuplicateEmail)
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(stored)
            }
        }
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), StorageError> {
        self.online()?;
        let (_, user) = self
            .inner
            .users
            .remove(&user_id)
            .ok_or(StorageError::NotFound)?;
        self.inner
            .emails
            .remove_if(&user.email, |_, owner| *owner == user_id);
        self.inner.permissions.remove(&user_id);
        self.inner.tokens.retain(|_, record| record.user_id != user_id);
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StorageError> {
        self.online()?;
        let id = self
            .inner
            .emails
            .get(email)
            .map(|r| *r.value())
            .ok_or(StorageError::NotFound)?;
        self.inner
            .users
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<User, StorageError> {
        self.online()?;
        let mut stored = self
            .inner
            .users
            .get_mut(&user.id)
            .ok_or(StorageError::EditConflict)?;
        if stored.version != user.version {
            return Err(StorageError::EditConflict);
        }

        if stored.email != user.email {
            match self.inner.emails.entry(user.email.clone()) {
                Entry::Occupied(_) => return Err(StorageError::DuplicateEmail),
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }
            self.inner.emails.remove(&stored.email);
        }

        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.activated = user.activated;
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, StorageError> {
        self.online()?;
        let mut movies: Vec<Movie> = self
            .inner
            .movies
            .iter()
            .map(|r| r.value().clone())
            .collect();
        movies.sort_by_key(|m| m.id);
        Ok(movies)
    }

    async fn get_movie(&self, id: i64) -> Result<Movie, StorageError> {
        self.online()?;
        self.inner
            .movies
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StorageError::NotFound)
    }

    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie, StorageError> {
        self.online()?;
        let id = self.inner.next_movie_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = Movie {
            id,
            title: movie.title,
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres,
            version: 1,
        };
        self.inner.movies.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete_movie(&self, id: i64) -> Result<(), StorageError> {
        self.online()?;
        self.inner
            .movies
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}
