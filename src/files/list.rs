use reqwest::header;
use serde::Deserialize;

use super::{bearer, json_or_status, DriveFile, API_BASE, FILE_FIELDS, FOLDER_MIME};
use crate::error::{Error, Result};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

async fn query(
    q: &str,
    page_token: Option<&str>,
    page_size: u32,
    token: &str,
) -> std::result::Result<FileList, String> {
    let fields = format!("nextPageToken,files({})", FILE_FIELDS);
    let page_size = page_size.to_string();

    let mut request = reqwest::Client::new()
        .get(format!("{}/files", API_BASE))
        .header(header::AUTHORIZATION, bearer(token))
        .query(&[
            ("q", q),
            ("fields", fields.as_str()),
            ("pageSize", page_size.as_str()),
        ]);
    if let Some(page_token) = page_token {
        request = request.query(&[("pageToken", page_token)]);
    }

    let response = request
        .send()
        .await
        .map_err(|e| format!("cannot list files: {}", e))?;
    json_or_status(response)
        .await
        .map_err(|e| format!("cannot list files: {}", e))
}

// Single quotes are the only character with meaning inside a quoted
// query term.
fn escape(name: &str) -> String {
    name.replace('\'', "\\'")
}

/// Looks up a non-trashed folder called `name` directly under `parent`.
pub async fn find_folder(name: &str, parent: &str, token: &str) -> Result<Option<DriveFile>> {
    let q = format!(
        "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
        escape(name),
        parent,
        FOLDER_MIME,
    );
    let list = query(&q, None, 1, token).await.map_err(Error::Upload)?;
    Ok(list.files.into_iter().next())
}

/// Lists every non-trashed child of `folder_id`, following pagination.
pub async fn list_children(folder_id: &str, token: &str) -> Result<Vec<DriveFile>> {
    let q = format!("'{}' in parents and trashed = false", folder_id);
    let mut entries = vec![];
    let mut page_token: Option<String> = None;

    loop {
        let list = query(&q, page_token.as_deref(), 1000, token)
            .await
            .map_err(Error::Sync)?;
        entries.extend(list.files);
        match list.next_page_token {
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    Ok(entries)
}
