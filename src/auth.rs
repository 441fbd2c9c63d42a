//! OAuth2 credential handling: client secrets, persisted session, refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};

const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
// Out-of-band flow: the user pastes the code shown by the consent page.
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// OAuth client registration, the `installed` section of a
/// `credentials.json` downloaded from the Google Cloud console.
#[derive(Deserialize, Debug, Clone)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    AUTH_URI.to_owned()
}

fn default_token_uri() -> String {
    TOKEN_URI.to_owned()
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: ClientSecrets,
}

/// Durable credential state. Written back whenever a token is issued or
/// refreshed, so scheduled runs never prompt.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Treats a token within five minutes of expiry as already expired,
    /// so a long upload does not start on a token about to lapse.
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

pub async fn load_secrets(path: impl AsRef<Path>) -> Result<ClientSecrets> {
    let path = path.as_ref();
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Auth(format!("cannot read {}: {}", path.display(), e)))?;
    let secrets: SecretsFile = serde_json::from_slice(&data)
        .map_err(|e| Error::Auth(format!("malformed client secrets {}: {}", path.display(), e)))?;
    Ok(secrets.installed)
}

pub async fn load_session(path: impl AsRef<Path>) -> Option<Session> {
    let data = tokio::fs::read(path.as_ref()).await.ok()?;
    match serde_json::from_slice(&data) {
        Ok(session) => Some(session),
        Err(e) => {
            log::warn!(
                "ignoring unreadable session file {}: {}",
                path.as_ref().display(),
                e
            );
            None
        }
    }
}

pub async fn save_session(path: impl AsRef<Path>, session: &Session) -> Result<()> {
    let data = serde_json::to_string_pretty(session)
        .map_err(|e| Error::Auth(format!("cannot serialize session: {}", e)))?;
    tokio::fs::write(path.as_ref(), data).await.map_err(|e| {
        Error::Auth(format!(
            "cannot write session file {}: {}",
            path.as_ref().display(),
            e
        ))
    })
}

/// Returns a session with a valid access token, in order of preference:
/// the persisted session as-is, the persisted session refreshed, or a new
/// session from the interactive consent flow. The persisted file is
/// updated whenever a new token is obtained.
pub async fn authenticate(
    secrets_path: impl AsRef<Path>,
    session_path: impl AsRef<Path>,
) -> Result<Session> {
    let secrets = load_secrets(&secrets_path).await?;
    let session_path = session_path.as_ref();

    if let Some(session) = load_session(session_path).await {
        if !session.is_expired() {
            return Ok(session);
        }
        log::info!("access token expired, refreshing");
        let session = refresh(&secrets, &session).await?;
        save_session(session_path, &session).await?;
        return Ok(session);
    }

    let session = consent_flow(&secrets).await?;
    save_session(session_path, &session).await?;
    Ok(session)
}

pub async fn refresh(secrets: &ClientSecrets, session: &Session) -> Result<Session> {
    let form = [
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("refresh_token", session.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];
    let token = request_token(&secrets.token_uri, &form).await?;

    Ok(Session {
        access_token: token.access_token,
        // Google omits the refresh token on refresh responses.
        refresh_token: token
            .refresh_token
            .unwrap_or_else(|| session.refresh_token.clone()),
        expires_at: Utc::now() + Duration::seconds(token.expires_in),
    })
}

async fn exchange_code(secrets: &ClientSecrets, code: &str) -> Result<Session> {
    let form = [
        ("client_id", secrets.client_id.as_str()),
        ("client_secret", secrets.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", REDIRECT_URI),
        ("grant_type", "authorization_code"),
    ];
    let token = request_token(&secrets.token_uri, &form).await?;

    let refresh_token = token.refresh_token.ok_or_else(|| {
        Error::Auth("no refresh token in response; re-run the consent flow".to_owned())
    })?;

    Ok(Session {
        access_token: token.access_token,
        refresh_token,
        expires_at: Utc::now() + Duration::seconds(token.expires_in),
    })
}

async fn request_token(token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = reqwest::Client::new()
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Auth(format!("token endpoint unreachable: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))
}

pub fn consent_url(secrets: &ClientSecrets) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("scope", SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::Auth(format!("invalid auth_uri: {}", e)))?;
    Ok(url.into())
}

async fn consent_flow(secrets: &ClientSecrets) -> Result<Session> {
    let io_err = |e: std::io::Error| Error::Auth(format!("consent prompt failed: {}", e));

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "Open the following URL in a browser and authorize access:\n\n{}\n\nPaste the authorization code here: ",
                consent_url(secrets)?
            )
            .as_bytes(),
        )
        .await
        .map_err(io_err)?;
    stdout.flush().await.map_err(io_err)?;

    let mut code = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut code)
        .await
        .map_err(io_err)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::Auth("empty authorization code".to_owned()));
    }

    exchange_code(secrets, code).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "access".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at,
        }
    }

    #[test]
    fn expired_session_test() {
        assert!(session(Utc::now() - Duration::hours(1)).is_expired());
        assert!(!session(Utc::now() + Duration::hours(1)).is_expired());
        // within the five-minute skew window
        assert!(session(Utc::now() + Duration::minutes(4)).is_expired());
    }

    #[test]
    fn secrets_parse_test() {
        let json = r#"{
            "installed": {
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "shhh",
                "project_id": "some-project",
                "redirect_uris": ["http://localhost"]
            }
        }"#;
        let secrets: SecretsFile = serde_json::from_str(json).unwrap();
        assert_eq!(secrets.installed.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.installed.token_uri, TOKEN_URI);
    }

    #[test]
    fn consent_url_test() {
        let secrets = ClientSecrets {
            client_id: "cid".to_owned(),
            client_secret: "sec".to_owned(),
            auth_uri: AUTH_URI.to_owned(),
            token_uri: TOKEN_URI.to_owned(),
        };
        let url = consent_url(&secrets).unwrap();
        assert!(url.starts_with(AUTH_URI));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[tokio::test]
    async fn session_roundtrip_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let original = session(Utc::now() + Duration::hours(1));
        save_session(&path, &original).await.unwrap();

        let loaded = load_session(&path).await.unwrap();
        assert_eq!(loaded.access_token, original.access_token);
        assert_eq!(loaded.refresh_token, original.refresh_token);
        assert_eq!(loaded.expires_at, original.expires_at);
    }

    #[tokio::test]
    async fn corrupt_session_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        assert!(load_session(&path).await.is_none());
    }
}
