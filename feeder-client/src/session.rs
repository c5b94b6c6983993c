//! The logged-in identity.
//!
//! One [`SessionSlot`] holds at most one session. It is restored from disk
//! at startup, replaced on login and emptied on logout. Every dashboard is
//! opened against the slot's current session, so a role switch means a new
//! dashboard.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{DomainError, NotPermitted, Role, UserId};
use crate::error::FeederError;
use crate::services::{IdentityApi, Registration};

/// Who is acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    /// Opaque token from the identity service. Nothing checks it yet.
    pub token: String,
}

impl Session {
    /// Refuse unless this session has `role`.
    pub fn require(&self, role: Role) -> Result<(), NotPermitted> {
        if self.role == role {
            Ok(())
        } else {
            Err(NotPermitted::WrongRole {
                required: role,
                actual: self.role,
            })
        }
    }
}

/// Session persistence failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session file {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to serialize session: {message}")]
    Encode { message: String },
}

/// Session file on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the saved session.
    ///
    /// Returns `None` if there is no file or it cannot be read; a corrupt
    /// file is treated as logged out.
    pub fn load(&self) -> Option<Session> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "ignoring unreadable session file");
                None
            }
        }
    }

    /// Save the session, creating parent directories if needed.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(session).map_err(|e| SessionError::Encode {
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }

    /// Remove the saved session. A missing file is not an error.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

/// The single session slot.
#[derive(Debug)]
pub struct SessionSlot {
    store: SessionStore,
    current: Option<Session>,
}

impl SessionSlot {
    /// Open the slot, restoring whatever session was saved.
    pub fn restore(store: SessionStore) -> Self {
        let current = store.load();
        if let Some(session) = &current {
            info!(user = %session.username, role = %session.role, "restored session");
        }
        Self { store, current }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The current session, or [`NotPermitted::SignedOut`].
    pub fn require(&self) -> Result<&Session, NotPermitted> {
        self.current.as_ref().ok_or(NotPermitted::SignedOut)
    }

    /// Log in, replacing any current session.
    ///
    /// Failing to persist the session is logged but does not fail the
    /// login; the session is still held for this run.
    pub async fn login<I: IdentityApi>(
        &mut self,
        identity: &I,
        username: &str,
        password: &str,
    ) -> Result<&Session, FeederError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::MissingField("username").into());
        }
        if password.is_empty() {
            return Err(DomainError::MissingField("password").into());
        }

        let session = identity.login(username, password).await?;
        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "session not persisted");
        }
        info!(user = %session.username, role = %session.role, "logged in");

        Ok(&*self.current.insert(session))
    }

    /// Create an account and log straight into it.
    pub async fn register_and_login<I: IdentityApi>(
        &mut self,
        identity: &I,
        registration: Registration,
    ) -> Result<&Session, FeederError> {
        for (field, value) in [
            ("username", registration.username.trim()),
            ("email", registration.email.trim()),
            ("password", registration.password.as_str()),
        ] {
            if value.is_empty() {
                return Err(DomainError::MissingField(field).into());
            }
        }

        let user = identity.register(&registration).await?;
        info!(%user, role = %registration.role, "registered");

        self.login(identity, &registration.username, &registration.password)
            .await
    }

    /// Drop the session here and on disk.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        if let Some(session) = self.current.take() {
            info!(user = %session.username, "logged out");
        }
        self.store.clear()
    }
}
