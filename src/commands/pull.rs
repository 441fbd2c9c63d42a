use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::files::{download, get, list, DriveFile};

pub const SYNC_STATE_FILE: &str = "sync_state.json";

// Remote and local clocks disagree; anything closer than this is treated
// as the same write.
const MTIME_TOLERANCE_SECS: i64 = 60;

/// What was last downloaded for each remote file id.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SyncState {
    #[serde(flatten)]
    entries: HashMap<String, SyncEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SyncEntry {
    pub name: String,
    pub modified: Option<DateTime<Utc>>,
    pub size: Option<String>,
    pub local_path: String,
    pub synced_at: DateTime<Utc>,
}

impl SyncState {
    pub fn record(&mut self, file: &DriveFile, local_path: &Path) {
        self.entries.insert(
            file.id.clone(),
            SyncEntry {
                name: file.name.clone(),
                modified: file.modified_time,
                size: file.size.clone(),
                local_path: local_path.to_string_lossy().into_owned(),
                synced_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub async fn load_state(path: impl AsRef<Path>) -> SyncState {
    match tokio::fs::read(path.as_ref()).await {
        Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable sync state: {}", e);
            SyncState::default()
        }),
        Err(_) => SyncState::default(),
    }
}

pub async fn save_state(path: impl AsRef<Path>, state: &SyncState) -> Result<()> {
    let data = serde_json::to_string_pretty(state)
        .map_err(|e| Error::Sync(format!("cannot serialize sync state: {}", e)))?;
    tokio::fs::write(path.as_ref(), data)
        .await
        .map_err(|e| Error::Sync(format!("cannot write {}: {}", path.as_ref().display(), e)))
}

/// True when the local copy is missing or differs from the remote file by
/// size or by more than the mtime tolerance.
pub(crate) fn needs_download(file: &DriveFile, local_path: &Path) -> bool {
    let meta = match std::fs::metadata(local_path) {
        Ok(meta) => meta,
        Err(_) => return true,
    };

    if let (Some(remote), Ok(local)) = (file.modified_time, meta.modified()) {
        let local: DateTime<Utc> = local.into();
        if (remote - local).num_seconds().abs() > MTIME_TOLERANCE_SECS {
            return true;
        }
    }

    file.size_bytes().unwrap_or(0) != meta.len()
}

/// Mirrors the remote folder `folder_id` into `local_root`, downloading
/// only files whose local copy is missing or stale. Returns the number of
/// files downloaded.
pub async fn pull(
    folder_id: &str,
    local_root: impl AsRef<Path>,
    state: &mut SyncState,
    token: &str,
) -> Result<usize> {
    let folder = get::get_file(folder_id, token).await?;
    if !folder.is_folder() {
        return Err(Error::Sync(format!(
            "{} ({}) is not a folder",
            folder.name, folder_id
        )));
    }

    let mut synced = 0;
    let mut dirs = vec![(folder.id.clone(), local_root.as_ref().to_path_buf())];
    let mut index = 0;

    while index < dirs.len() {
        let (remote_id, local_dir) = dirs[index].clone();
        index += 1;

        tokio::fs::create_dir_all(&local_dir)
            .await
            .map_err(|e| Error::Sync(format!("cannot create {}: {}", local_dir.display(), e)))?;

        for entry in list::list_children(&remote_id, token).await? {
            let local_path = local_dir.join(&entry.name);
            if entry.is_folder() {
                dirs.push((entry.id.clone(), local_path));
            } else if needs_download(&entry, &local_path) {
                println!("Syncing {} ...", local_path.display());
                download::download_to(&entry, &local_path, token).await?;
                state.record(&entry, &local_path);
                synced += 1;
            }
        }
    }

    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn remote_file(size: &str, modified: Option<DateTime<Utc>>) -> DriveFile {
        DriveFile {
            id: "f1".to_owned(),
            name: "data.bin".to_owned(),
            mime_type: "application/octet-stream".to_owned(),
            size: Some(size.to_owned()),
            modified_time: modified,
            parents: vec![],
            trashed: false,
        }
    }

    #[test]
    fn needs_download_missing_file_test() {
        let dir = tempfile::tempdir().unwrap();
        let file = remote_file("5", None);
        assert!(needs_download(&file, &dir.path().join("absent.bin")));
    }

    #[test]
    fn needs_download_unchanged_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello").unwrap();
        let local_mtime: DateTime<Utc> =
            std::fs::metadata(&path).unwrap().modified().unwrap().into();

        // same size, mtime within tolerance
        let file = remote_file("5", Some(local_mtime + Duration::seconds(30)));
        assert!(!needs_download(&file, &path));

        // no remote mtime at all falls back to the size check
        let file = remote_file("5", None);
        assert!(!needs_download(&file, &path));
    }

    #[test]
    fn needs_download_changed_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello").unwrap();
        let local_mtime: DateTime<Utc> =
            std::fs::metadata(&path).unwrap().modified().unwrap().into();

        // size mismatch
        let file = remote_file("9999", Some(local_mtime));
        assert!(needs_download(&file, &path));

        // mtime far in the future, same size
        let file = remote_file("5", Some(local_mtime + Duration::seconds(300)));
        assert!(needs_download(&file, &path));
    }

    #[tokio::test]
    async fn sync_state_roundtrip_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SYNC_STATE_FILE);

        let mut state = SyncState::default();
        state.record(
            &remote_file("5", Some(Utc::now())),
            Path::new("/tmp/data.bin"),
        );
        save_state(&path, &state).await.unwrap();

        let loaded = load_state(&path).await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries["f1"].name, "data.bin");
    }

    #[tokio::test]
    async fn missing_state_test() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_state(dir.path().join("nope.json")).await;
        assert!(state.is_empty());
    }
}
