use reqwest::{header, StatusCode};
use serde_json::json;
use std::path::Path;
use tokio::io::AsyncReadExt;

use super::{bearer, json_or_status, DriveFile, FILE_FIELDS, UPLOAD_BASE};
use crate::error::{Error, Result};

// Anything below this goes up in one multipart request; larger files use a
// resumable session.
const SIMPLE_UPLOAD_LIMIT: u64 = 5 * 1024 * 1024;
// Resumable chunks must be a multiple of 256 KiB.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

const BOUNDARY: &str = "gdshare_multipart_boundary";

/// Uploads a local file as a new remote file under `parent`. Every call
/// creates a new remote entry; the API does not enforce name uniqueness.
pub async fn upload_file(local_path: impl AsRef<Path>, parent: &str, token: &str) -> Result<DriveFile> {
    let local_path = local_path.as_ref();
    let name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Upload(format!("invalid file name {}", local_path.display())))?;
    let size = tokio::fs::metadata(local_path)
        .await
        .map_err(|e| Error::Upload(format!("cannot stat {}: {}", local_path.display(), e)))?
        .len();

    let uploaded = if size < SIMPLE_UPLOAD_LIMIT {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| Error::Upload(format!("cannot read {}: {}", local_path.display(), e)))?;
        upload_multipart(name, parent, mime_type_for(local_path), data, token).await?
    } else {
        upload_resumable(local_path, name, parent, size, token).await?
    };

    log::info!(
        "uploaded {} as {} ({} bytes)",
        local_path.display(),
        uploaded.id,
        size
    );
    Ok(uploaded)
}

fn multipart_body(name: &str, parent: &str, mime_type: &str, data: &[u8]) -> Vec<u8> {
    let metadata = json!({
        "name": name,
        "parents": [parent],
    })
    .to_string();

    let mut body = Vec::with_capacity(data.len() + metadata.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--", BOUNDARY).as_bytes());
    body
}

async fn upload_multipart(
    name: &str,
    parent: &str,
    mime_type: &str,
    data: Vec<u8>,
    token: &str,
) -> Result<DriveFile> {
    let body = multipart_body(name, parent, mime_type, &data);

    let response = reqwest::Client::new()
        .post(format!("{}/files?uploadType=multipart", UPLOAD_BASE))
        .header(header::AUTHORIZATION, bearer(token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/related; boundary={}", BOUNDARY),
        )
        .query(&[("fields", FILE_FIELDS)])
        .body(body)
        .send()
        .await
        .map_err(|e| Error::Upload(format!("cannot upload {}: {}", name, e)))?;

    json_or_status(response)
        .await
        .map_err(|e| Error::Upload(format!("cannot upload {}: {}", name, e)))
}

async fn start_resumable(name: &str, parent: &str, size: u64, token: &str) -> Result<String> {
    let metadata = json!({
        "name": name,
        "parents": [parent],
    });

    let response = reqwest::Client::new()
        .post(format!("{}/files?uploadType=resumable", UPLOAD_BASE))
        .header(header::AUTHORIZATION, bearer(token))
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Upload-Content-Length", size.to_string())
        .query(&[("fields", FILE_FIELDS)])
        .json(&metadata)
        .send()
        .await
        .map_err(|e| Error::Upload(format!("cannot start resumable upload of {}: {}", name, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Upload(format!(
            "cannot start resumable upload of {}: {}: {}",
            name, status, body
        )));
    }

    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| Error::Upload(format!("no session URI for resumable upload of {}", name)))
}

async fn upload_resumable(
    local_path: &Path,
    name: &str,
    parent: &str,
    size: u64,
    token: &str,
) -> Result<DriveFile> {
    let session_uri = start_resumable(name, parent, size, token).await?;
    let client = reqwest::Client::new();

    let mut file = tokio::fs::File::open(local_path)
        .await
        .map_err(|e| Error::Upload(format!("cannot open {}: {}", local_path.display(), e)))?;
    let mut offset = 0u64;

    loop {
        let mut chunk = vec![0u8; CHUNK_SIZE.min((size - offset) as usize)];
        file.read_exact(&mut chunk)
            .await
            .map_err(|e| Error::Upload(format!("cannot read {}: {}", local_path.display(), e)))?;

        let range = format!(
            "bytes {}-{}/{}",
            offset,
            offset + chunk.len() as u64 - 1,
            size
        );
        let chunk_len = chunk.len() as u64;

        let response = client
            .put(&session_uri)
            .header(header::CONTENT_LENGTH, chunk_len.to_string())
            .header(header::CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("cannot upload chunk of {}: {}", name, e)))?;

        let status = response.status();
        // 308 means the session accepted the chunk and wants more.
        if status == StatusCode::PERMANENT_REDIRECT {
            offset += chunk_len;
            if offset >= size {
                return Err(Error::Upload(format!(
                    "resumable upload of {} did not complete",
                    name
                )));
            }
            continue;
        }
        if status.is_success() {
            return json_or_status(response)
                .await
                .map_err(|e| Error::Upload(format!("cannot upload {}: {}", name, e)));
        }
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Upload(format!(
            "chunk upload of {} failed: {}: {}",
            name, status, body
        )));
    }
}

/// Best-effort MIME guess from the file extension; the Drive API only uses
/// it for previews, so octet-stream is a safe fallback.
pub(crate) fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") | Some("md") | Some("log") => "text/plain",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_test() {
        assert_eq!(mime_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_for(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("archive.tar.gz")), "application/gzip");
        assert_eq!(mime_type_for(Path::new("mystery.bin")), "application/octet-stream");
        assert_eq!(mime_type_for(Path::new("no_extension")), "application/octet-stream");
    }

    #[test]
    fn multipart_body_test() {
        let body = multipart_body("a.txt", "root", "text/plain", b"hello");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(&format!("--{}", BOUNDARY)));
        assert!(text.ends_with(&format!("--{}--", BOUNDARY)));
        assert!(text.contains(r#""name":"a.txt""#));
        assert!(text.contains(r#""parents":["root"]"#));
        assert!(text.contains("Content-Type: text/plain"));
        assert!(text.contains("hello"));
    }
}
