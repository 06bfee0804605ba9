//! Persisted reactive session state: the logged-in user id and the auth
//! token, each mirrored to a storage key.

use std::{fmt, sync::Arc};

use api_types::user::UserId;
use tokio::sync::watch;

use crate::storage::{Result, Storage};

pub const USER_ID_KEY: &str = "userId";
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Opaque bearer credential issued by the backend at login.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Conversion between a session value and its stored string form.
pub trait StoredValue: Clone + PartialEq + Send + Sync + 'static {
    /// `None` means the key must be removed instead of written.
    fn to_stored(&self) -> Option<String>;
    fn from_stored(raw: &str) -> Option<Self>;
}

impl StoredValue for UserId {
    fn to_stored(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn from_stored(raw: &str) -> Option<Self> {
        (!raw.is_empty()).then(|| UserId::parse(raw))
    }
}

impl StoredValue for AuthToken {
    fn to_stored(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| self.0.clone())
    }

    fn from_stored(raw: &str) -> Option<Self> {
        (!raw.is_empty()).then(|| AuthToken::new(raw))
    }
}

/// A value mirrored to a single storage key.
///
/// Every clone shares the same current value and subscribers. Writes go to
/// storage first and are published only once storage accepted them.
#[derive(Clone)]
pub struct Persisted<T> {
    key: &'static str,
    storage: Arc<dyn Storage>,
    value: Arc<watch::Sender<Option<T>>>,
}

impl<T: StoredValue> Persisted<T> {
    pub fn load(storage: Arc<dyn Storage>, key: &'static str) -> Result<Self> {
        let initial = read(&*storage, key)?;
        let (value, _) = watch::channel(initial);
        Ok(Self {
            key,
            storage,
            value: Arc::new(value),
        })
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn get(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: Option<T>) -> Result<()> {
        let stored = value.as_ref().and_then(T::to_stored);
        match &stored {
            Some(raw) => self.storage.set_item(self.key, raw)?,
            None => self.storage.remove_item(self.key)?,
        }
        self.publish(value.filter(|_| stored.is_some()));
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.set(None)
    }

    /// Receives every change of the value, whichever clone made it.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.value.subscribe()
    }

    /// Re-reads storage and publishes the stored value if it differs from
    /// the current one. Returns whether a change was published.
    pub fn refresh(&self) -> Result<bool> {
        let stored = read(&*self.storage, self.key)?;
        Ok(self.publish(stored))
    }

    fn publish(&self, next: Option<T>) -> bool {
        self.value.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }
}

impl<T> fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted").field("key", &self.key).finish()
    }
}

fn read<T: StoredValue>(storage: &dyn Storage, key: &str) -> Result<Option<T>> {
    Ok(storage
        .get_item(key)?
        .and_then(|raw| T::from_stored(&raw)))
}

/// The two session variables with their fixed storage keys: the user id in
/// session-scoped storage and the token in durable storage.
#[derive(Clone, Debug)]
pub struct Session {
    user_id: Persisted<UserId>,
    auth_token: Persisted<AuthToken>,
}

impl Session {
    pub fn open(session: Arc<dyn Storage>, durable: Arc<dyn Storage>) -> Result<Self> {
        Ok(Self {
            user_id: Persisted::load(session, USER_ID_KEY)?,
            auth_token: Persisted::load(durable, AUTH_TOKEN_KEY)?,
        })
    }

    pub fn user_id(&self) -> &Persisted<UserId> {
        &self.user_id
    }

    pub fn auth_token(&self) -> &Persisted<AuthToken> {
        &self.auth_token
    }

    /// Stores what the backend handed out at login.
    ///
    /// The token is written first and cleared again if the user id write
    /// fails.
    pub fn establish(&self, user_id: Option<UserId>, token: Option<AuthToken>) -> Result<()> {
        self.auth_token.set(token)?;
        if let Err(err) = self.user_id.set(user_id) {
            if let Err(rollback) = self.auth_token.clear() {
                tracing::warn!("failed to roll back auth token: {rollback}");
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn end(&self) -> Result<()> {
        self.user_id.clear()?;
        self.auth_token.clear()
    }

    pub fn refresh(&self) -> Result<bool> {
        let user_changed = self.user_id.refresh()?;
        let token_changed = self.auth_token.refresh()?;
        Ok(user_changed || token_changed)
    }
}
