//! Explicit session state, loaded at startup and saved on change.
//!
//! The session remembers the last language a user ran so the next
//! invocation can default to it. It lives as JSON in the runcell home
//! directory and is always passed around as a value, never read from
//! ambient global state.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

const SESSION_FILE: &str = "session.json";

/// Home directory for runner state: `RUNCELL_HOME` when set, otherwise
/// `~/.runcell`.
pub fn runcell_home() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("RUNCELL_HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    dirs::home_dir().map(|home| home.join(".runcell"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    /// Language name used by the most recent run.
    pub last_language: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn remember_language(&mut self, name: &str) {
        self.last_language = Some(name.to_string());
        self.updated_at = Some(Utc::now());
    }
}

/// Reads and writes the session file at a fixed path.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn open_default() -> Result<Self, SessionError> {
        let home = runcell_home().ok_or(SessionError::NoHome)?;
        Ok(Self {
            path: home.join(SESSION_FILE),
        })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// A missing file reads as a fresh session.
    pub async fn load(&self) -> Result<Session, SessionError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Session::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    async fn missing_file_reads_as_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join(SESSION_FILE));
        let session = store.load().await.unwrap();
        assert!(session.last_language.is_none());
        assert!(session.updated_at.is_none());
    }

    #[tokio::test]
    async fn remembers_the_last_language_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("nested").join(SESSION_FILE));

        let mut session = store.load().await.unwrap();
        session.remember_language("python");
        store.save(&session).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.last_language.as_deref(), Some("python"));
        assert!(reloaded.updated_at.is_some());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = SessionStore::at(path);
        assert!(matches!(
            store.load().await,
            Err(SessionError::Parse(_))
        ));
    }

    #[test]
    #[serial]
    fn home_env_var_wins_over_the_home_directory() {
        std::env::set_var("RUNCELL_HOME", "/tmp/runcell-test-home");
        let home = runcell_home();
        std::env::remove_var("RUNCELL_HOME");
        assert_eq!(home, Some(PathBuf::from("/tmp/runcell-test-home")));
    }
}
