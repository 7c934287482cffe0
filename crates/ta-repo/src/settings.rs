use std::path::{Path, PathBuf};

use ta_types::Settings;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::error::Result;

/// Preference store backed by a small JSON document. Without a path the
/// preferences live only in memory.
pub struct SettingsRepository {
    path: Option<PathBuf>,
    state: watch::Sender<Settings>,
    /// Held for a whole read-modify-write so updates do not overwrite each other
    write_lock: Mutex<()>,
}

impl SettingsRepository {
    /// Loads preferences from `path`. A missing file means defaults.
    pub async fn open(path: &Path) -> Result<Self> {
        let settings = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                Settings::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!("Settings loaded from {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            state: watch::Sender::new(settings),
            write_lock: Mutex::new(()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: watch::Sender::new(Settings::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> Settings {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.state.subscribe()
    }

    pub async fn set_use_dynamic_color(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.use_dynamic_color = enabled).await
    }

    pub async fn set_custom_primary_color(&self, color: u32) -> Result<()> {
        self.update(|s| s.custom_primary_color = color).await
    }

    pub async fn set_developer_mode(&self, enabled: bool) -> Result<()> {
        self.update(|s| s.developer_mode = enabled).await
    }

    /// Persists first so a failed write leaves the observed value untouched.
    async fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_lock.lock().await;
        let mut next = self.settings();
        f(&mut next);

        if let Some(path) = &self.path {
            write_atomic(path, &serde_json::to_vec_pretty(&next)?).await?;
        }

        self.state.send_replace(next);
        debug!("Settings updated: {:?}", next);
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SettingsRepository::open(&dir.path().join("settings.json"))
            .await
            .unwrap();

        assert_eq!(repo.settings(), Settings::default());
    }

    #[tokio::test]
    async fn test_settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let repo = SettingsRepository::open(&path).await.unwrap();
        repo.set_developer_mode(true).await.unwrap();
        repo.set_custom_primary_color(0xFF4CAF50).await.unwrap();
        drop(repo);

        let reopened = SettingsRepository::open(&path).await.unwrap();
        let s = reopened.settings();
        assert!(s.developer_mode);
        assert!(!s.use_dynamic_color);
        assert_eq!(s.custom_primary_color, 0xFF4CAF50);
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let repo = SettingsRepository::in_memory();
        let mut rx = repo.subscribe();

        repo.set_use_dynamic_color(true).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().use_dynamic_color);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let repo = SettingsRepository::open(&path).await.unwrap();

        let (a, b) = tokio::join!(
            repo.set_developer_mode(true),
            repo.set_use_dynamic_color(true)
        );
        a.unwrap();
        b.unwrap();

        let s = repo.settings();
        assert!(s.developer_mode && s.use_dynamic_color);

        let reopened = SettingsRepository::open(&path).await.unwrap().settings();
        assert!(reopened.developer_mode && reopened.use_dynamic_color);
    }

    #[tokio::test]
    async fn test_malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = SettingsRepository::open(&path).await.err().unwrap();
        assert!(matches!(err, Error::SettingsFormat(_)));
    }
}
