//! Permission grants (the Drive `permissions.create` endpoint).

use reqwest::header;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::files::{bearer, json_or_status, API_BASE};

/// Access level granted to a collaborator. A subject holds exactly one
/// role per file; granting again replaces the previous role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reader,
    Writer,
    Commenter,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Writer => "writer",
            Role::Commenter => "commenter",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reader" => Ok(Role::Reader),
            "writer" => Ok(Role::Writer),
            "commenter" => Ok(Role::Commenter),
            "owner" => Ok(Role::Owner),
            other => Err(Error::Validation(format!(
                "invalid role '{}' (expected reader, writer, commenter or owner)",
                other
            ))),
        }
    }
}

#[derive(Deserialize, Debug)]
struct Permission {
    id: String,
}

/// Grants `role` on `file_id` to the user behind `email`. Returns the
/// permission id issued by the API.
pub async fn grant(file_id: &str, email: &str, role: Role, token: &str) -> Result<String> {
    let body = json!({
        "type": "user",
        "role": role.as_str(),
        "emailAddress": email,
    });

    let mut request = reqwest::Client::new()
        .post(format!("{}/files/{}/permissions", API_BASE, file_id))
        .header(header::AUTHORIZATION, bearer(token))
        .query(&[("fields", "id")]);
    // Ownership cannot change hands without the explicit transfer flag.
    if role == Role::Owner {
        request = request.query(&[("transferOwnership", "true")]);
    }

    let response = request
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Share(format!("cannot share with {}: {}", email, e)))?;

    let permission: Permission = json_or_status(response)
        .await
        .map_err(|e| Error::Share(format!("cannot share with {}: {}", email, e)))?;
    log::info!("granted {} to {} on {}", role, email, file_id);
    Ok(permission.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_test() {
        assert_eq!("reader".parse::<Role>().unwrap(), Role::Reader);
        assert_eq!("writer".parse::<Role>().unwrap(), Role::Writer);
        assert_eq!("commenter".parse::<Role>().unwrap(), Role::Commenter);
        assert_eq!("owner".parse::<Role>().unwrap(), Role::Owner);

        assert!(matches!(
            "admin".parse::<Role>(),
            Err(Error::Validation(_))
        ));
        // case-sensitive, like the API
        assert!("Reader".parse::<Role>().is_err());
    }

    #[test]
    fn role_display_test() {
        for s in ["reader", "writer", "commenter", "owner"] {
            assert_eq!(s.parse::<Role>().unwrap().to_string(), s);
        }
    }
}
