//! Credentials Module
//!
//! Holds the storage and job API secrets a run needs. They are cached between
//! runs by [`CredentialStore`] and restored exactly as they were entered.

pub mod storage;

pub use storage::*;

use serde::{Deserialize, Serialize};

/// Secrets supplied by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Object storage access key id
    #[serde(default)]
    pub access_key_id: String,
    /// Object storage secret key (encrypted at rest)
    #[serde(default)]
    pub secret_access_key: String,
    /// Job API bearer token (encrypted at rest)
    #[serde(default)]
    pub api_key: String,
    /// Model hub token for tasks that download gated weights (encrypted at rest)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Fields given on the command line for a single run
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
}

impl Credentials {
    /// Apply command line values on top of the restored ones.
    pub fn merge(mut self, overrides: CredentialOverrides) -> Self {
        if let Some(value) = overrides.access_key_id {
            self.access_key_id = value;
        }
        if let Some(value) = overrides.secret_access_key {
            self.secret_access_key = value;
        }
        if let Some(value) = overrides.api_key {
            self.api_key = value;
        }
        if overrides.auth_token.is_some() {
            self.auth_token = overrides.auth_token;
        }
        self
    }

    /// Names of the required fields that are still empty.
    pub fn missing_fields(&self, needs_storage: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if needs_storage {
            if self.access_key_id.is_empty() {
                missing.push("access_key_id");
            }
            if self.secret_access_key.is_empty() {
                missing.push("secret_access_key");
            }
        }
        if self.api_key.is_empty() {
            missing.push("api_key");
        }
        missing
    }
}

/// Masked view of stored credentials for display
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
}

fn key_hint(value: &str) -> Option<String> {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => None,
        n if n > 4 => Some(format!("••••{}", chars[n - 4..].iter().collect::<String>())),
        _ => Some("••••".to_string()),
    }
}

impl From<&Credentials> for CredentialStatus {
    fn from(credentials: &Credentials) -> Self {
        Self {
            access_key_id: key_hint(&credentials.access_key_id),
            secret_access_key: key_hint(&credentials.secret_access_key),
            api_key: key_hint(&credentials.api_key),
            auth_token: credentials.auth_token.as_deref().and_then(key_hint),
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());
        writeln!(f, "access_key_id:     {}", show(&self.access_key_id))?;
        writeln!(f, "secret_access_key: {}", show(&self.secret_access_key))?;
        writeln!(f, "api_key:           {}", show(&self.api_key))?;
        write!(f, "auth_token:        {}", show(&self.auth_token))
    }
}
