pub mod create;
pub mod download;
pub mod get;
pub mod list;
pub mod upload;

use serde::Deserialize;

use crate::error::Result;

pub(crate) const API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub(crate) const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
pub(crate) const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
// Metadata fields requested on every call that returns a file resource.
pub(crate) const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,parents,trashed";

/// A file or folder resource as returned by the Drive API.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    // The API serializes sizes as decimal strings.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modified_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Decodes a successful response as JSON; turns a failure status into a
/// readable `status: body` message for the caller to wrap in its stage
/// error.
pub(crate) async fn json_or_status<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, String> {
    let status = response.status();
    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| format!("malformed response: {}", e))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(format!("{}: {}", status, body))
    }
}

/// Looks a folder up by name under `parent` and creates it if absent.
/// Re-running never creates a second folder with the same name, which
/// keeps repeated syncs anchored to a stable identifier.
pub async fn ensure_folder(name: &str, parent: &str, token: &str) -> Result<DriveFile> {
    if let Some(existing) = list::find_folder(name, parent, token).await? {
        log::debug!("reusing folder {} ({})", existing.name, existing.id);
        return Ok(existing);
    }
    create::create_folder(name, parent, token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(mime_type: &str, size: Option<&str>) -> DriveFile {
        DriveFile {
            id: "1".to_owned(),
            name: "x".to_owned(),
            mime_type: mime_type.to_owned(),
            size: size.map(str::to_owned),
            modified_time: None,
            parents: vec![],
            trashed: false,
        }
    }

    #[test]
    fn is_folder_test() {
        assert!(resource(FOLDER_MIME, None).is_folder());
        assert!(!resource("text/plain", Some("12")).is_folder());
    }

    #[test]
    fn size_bytes_test() {
        assert_eq!(resource("text/plain", Some("12345")).size_bytes(), Some(12345));
        assert_eq!(resource(FOLDER_MIME, None).size_bytes(), None);
    }

    #[test]
    fn deserialize_test() {
        let json = r#"{
            "id": "abc",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "size": "2048",
            "modifiedTime": "2024-05-01T12:00:00Z",
            "parents": ["root"]
        }"#;
        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc");
        assert_eq!(file.size_bytes(), Some(2048));
        assert!(!file.trashed);
        assert!(file.modified_time.is_some());
    }
}
