use reqwest::header;

use super::{bearer, json_or_status, DriveFile, API_BASE, FILE_FIELDS};
use crate::error::{Error, Result};

pub async fn get_file(file_id: &str, token: &str) -> Result<DriveFile> {
    let response = reqwest::Client::new()
        .get(format!("{}/files/{}", API_BASE, file_id))
        .header(header::AUTHORIZATION, bearer(token))
        .query(&[("fields", FILE_FIELDS)])
        .send()
        .await
        .map_err(|e| Error::Sync(format!("cannot fetch metadata for {}: {}", file_id, e)))?;

    json_or_status(response)
        .await
        .map_err(|e| Error::Sync(format!("cannot fetch metadata for {}: {}", file_id, e)))
}
