//! Authentication state shared by everything that writes on behalf of the user.
//!
//! The session is set by whatever login flow the host runs; the upload
//! pipeline only reads it, once per metadata write.

use std::sync::{Arc, PoisonError, RwLock};

use log::info;

/// Result/status of authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthStatus {
    /// Not authenticated yet.
    #[default]
    NotAuthenticated,
    /// Authentication in progress.
    Authenticating,
    /// Successfully authenticated.
    Authenticated {
        /// Stable identifier of the user, written into every file record.
        user_id: String,
        /// Token presented to the document store.
        token: String,
    },
    /// Authentication failed with an error.
    Failed(String),
}

impl AuthStatus {
    /// Check if the user is authenticated.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Get the user id if authenticated.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated { user_id, .. } => Some(user_id.as_str()),
            _ => None,
        }
    }

    /// Get the token if authenticated.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Authenticated { token, .. } => Some(token.as_str()),
            _ => None,
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match self {
            Self::Authenticated { user_id, token } => Some(Credentials {
                user_id: user_id.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }
}

/// Identity captured for a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub token: String,
}

/// Cloneable handle over the process-wide [`AuthStatus`].
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    status: Arc<RwLock<AuthStatus>>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that is already signed in.
    pub fn authenticated(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(user_id, token);
        session
    }

    pub fn status(&self) -> AuthStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_status(&self, status: AuthStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn sign_in(&self, user_id: impl Into<String>, token: impl Into<String>) {
        let user_id = user_id.into();
        info!("Signed in as {}", user_id);
        self.set_status(AuthStatus::Authenticated {
            user_id,
            token: token.into(),
        });
    }

    pub fn sign_out(&self) {
        info!("Signed out");
        self.set_status(AuthStatus::NotAuthenticated);
    }

    /// Credentials of the signed-in user, if any.
    pub fn credentials(&self) -> Option<Credentials> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .credentials()
    }
}
