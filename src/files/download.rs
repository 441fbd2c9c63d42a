use futures::StreamExt;
use reqwest::header;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use super::{bearer, DriveFile, API_BASE};
use crate::error::{Error, Result};

const EXPORT_MIME: &str = "application/pdf";

/// Streams the content of `file` into `local_path`. Workspace documents
/// (docs, sheets, ...) have no byte representation and are exported as
/// PDF instead.
pub async fn download_to(file: &DriveFile, local_path: impl AsRef<Path>, token: &str) -> Result<()> {
    let local_path = local_path.as_ref();
    let client = reqwest::Client::new();

    let request = if file.mime_type.starts_with("application/vnd.google-apps") {
        log::debug!("exporting workspace document {} as PDF", file.name);
        client
            .get(format!("{}/files/{}/export", API_BASE, file.id))
            .query(&[("mimeType", EXPORT_MIME)])
    } else {
        client
            .get(format!("{}/files/{}", API_BASE, file.id))
            .query(&[("alt", "media")])
    };

    let response = request
        .header(header::AUTHORIZATION, bearer(token))
        .send()
        .await
        .map_err(|e| Error::Sync(format!("cannot download {}: {}", file.name, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Sync(format!(
            "cannot download {}: {}: {}",
            file.name, status, body
        )));
    }

    let mut out = tokio::fs::File::create(local_path)
        .await
        .map_err(|e| Error::Sync(format!("cannot create {}: {}", local_path.display(), e)))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| Error::Sync(format!("stream error on {}: {}", file.name, e)))?;
        out.write_all(&chunk)
            .await
            .map_err(|e| Error::Sync(format!("cannot write {}: {}", local_path.display(), e)))?;
    }
    out.flush()
        .await
        .map_err(|e| Error::Sync(format!("cannot write {}: {}", local_path.display(), e)))?;

    Ok(())
}
