use reqwest::header;
use serde_json::json;

use super::{bearer, json_or_status, DriveFile, API_BASE, FILE_FIELDS, FOLDER_MIME};
use crate::error::{Error, Result};

/// Creates a folder named `name` under `parent` (`"root"` for the storage
/// root). The API happily creates duplicates; callers that need
/// create-or-reuse go through `files::ensure_folder`.
pub async fn create_folder(name: &str, parent: &str, token: &str) -> Result<DriveFile> {
    let metadata = json!({
        "name": name,
        "mimeType": FOLDER_MIME,
        "parents": [parent],
    });

    let response = reqwest::Client::new()
        .post(format!("{}/files", API_BASE))
        .header(header::AUTHORIZATION, bearer(token))
        .query(&[("fields", FILE_FIELDS)])
        .json(&metadata)
        .send()
        .await
        .map_err(|e| Error::Upload(format!("cannot create folder {}: {}", name, e)))?;

    let folder: DriveFile = json_or_status(response)
        .await
        .map_err(|e| Error::Upload(format!("cannot create folder {}: {}", name, e)))?;
    log::info!("created folder {} ({})", folder.name, folder.id);
    Ok(folder)
}
