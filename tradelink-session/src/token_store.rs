//! Token storage
//!
//! Persisted holder of the access/refresh pair and the user id. Writers
//! always replace the pair as a unit.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use tradelink_core::{storage_error, Session, TradelinkResult};

/// Persisted session credentials
pub trait TokenStore: Send + Sync {
    /// Current credentials; all fields `None` when nothing is stored or the
    /// storage is unavailable
    fn get(&self) -> Session;

    /// Replace the access/refresh pair in one write
    fn set(&self, access: &str, refresh: &str) -> TradelinkResult<()>;

    fn set_user_id(&self, user_id: &str) -> TradelinkResult<()>;

    /// Remove all three fields in one write
    fn clear(&self) -> TradelinkResult<()>;
}

/// In-process store, used by tests and short-lived CLI invocations
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: RwLock<Session>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a token pair
    pub fn with_tokens(access: &str, refresh: &str) -> Self {
        Self {
            session: RwLock::new(Session {
                access_token: Some(access.to_string()),
                refresh_token: Some(refresh.to_string()),
                user_id: None,
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Session {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, access: &str, refresh: &str) -> TradelinkResult<()> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.access_token = Some(access.to_string());
        session.refresh_token = Some(refresh.to_string());
        Ok(())
    }

    fn set_user_id(&self, user_id: &str) -> TradelinkResult<()> {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.user_id = Some(user_id.to_string());
        Ok(())
    }

    fn clear(&self) -> TradelinkResult<()> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
        Ok(())
    }
}

/// JSON file store surviving restarts
///
/// Every write goes to a fresh temp file in the same directory that is then
/// renamed over the target, so readers see either the old or the new pair,
/// never a mix.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("Token store at: {}", path.display());

        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<Session> {
        let content = std::fs::read_to_string(&self.path).ok()?;

        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable token file"
                );
                None
            }
        }
    }

    fn write(&self, session: &Session) -> TradelinkResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .map_err(|e| storage_error!("Failed to create token directory", "token_store", e))?;

        let json_data = serde_json::to_vec_pretty(session)?;

        // One fresh sibling per write
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| {
            storage_error!("Failed to create temporary token file", "token_store", e)
        })?;
        tmp.write_all(&json_data)
            .map_err(|e| storage_error!("Failed to write token file", "token_store", e))?;
        tmp.persist(&self.path)
            .map_err(|e| storage_error!("Failed to replace token file", "token_store", e.error))?;

        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Session)) -> TradelinkResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = self.read().unwrap_or_default();
        apply(&mut session);
        self.write(&session)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Session {
        self.read().unwrap_or_default()
    }

    fn set(&self, access: &str, refresh: &str) -> TradelinkResult<()> {
        self.update(|session| {
            session.access_token = Some(access.to_string());
            session.refresh_token = Some(refresh.to_string());
        })
    }

    fn set_user_id(&self, user_id: &str) -> TradelinkResult<()> {
        self.update(|session| session.user_id = Some(user_id.to_string()))
    }

    fn clear(&self) -> TradelinkResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed token file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error!("Failed to remove token file", "token_store", e)),
        }
    }
}
