use reqwest::StatusCode;

use crate::{session::USER_ID_KEY, storage::Storage};

pub const DEFAULT_PROTECTED_PREFIX: &str = "/dashboard";
pub const LOGIN_LOCATION: &str = "/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Allow,
    Redirect {
        status: StatusCode,
        location: &'static str,
    },
}

impl Navigation {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    fn to_login() -> Self {
        Self::Redirect {
            status: StatusCode::SEE_OTHER,
            location: LOGIN_LOCATION,
        }
    }
}

/// Keeps callers without a stored user id out of every path under a prefix.
#[derive(Clone, Debug)]
pub struct RouteGuard {
    prefix: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_PREFIX)
    }
}

impl RouteGuard {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            prefix: format!("/{}", prefix.trim_start_matches('/')),
        }
    }

    pub fn protects(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn check(&self, path: &str, session_storage: &dyn Storage) -> Navigation {
        if !self.protects(path) {
            return Navigation::Allow;
        }
        require_session(session_storage)
    }
}

/// Redirects to the login page unless session storage holds a user id.
///
/// A storage that cannot be read counts as holding nothing.
pub fn require_session(session_storage: &dyn Storage) -> Navigation {
    match session_storage.get_item(USER_ID_KEY) {
        Ok(Some(user_id)) if !user_id.is_empty() => Navigation::Allow,
        Ok(_) => Navigation::to_login(),
        Err(err) => {
            tracing::warn!("session storage unreadable, redirecting: {err}");
            Navigation::to_login()
        }
    }
}
