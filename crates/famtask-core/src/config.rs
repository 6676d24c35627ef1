//! Service configuration
//!
//! Backend settings come from a TOML file, `FAMTASK_*` environment variables,
//! or both; the environment wins. A backend with any missing or placeholder
//! setting is "not configured" and the service refuses to start.
//!
//! ```toml
//! conflict_retry_limit = 5
//! invite_code_attempts = 8
//!
//! [backend]
//! api_key = "..."
//! auth_domain = "family-tasks.example.com"
//! project_id = "family-tasks"
//! storage_bucket = "family-tasks.appspot.com"
//! messaging_sender_id = "1234567890"
//! app_id = "1:1234567890:web:abcdef"
//! ```

use crate::error::{FamilyTaskError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of the environment variables read by [`ServiceConfig::load`]
pub const ENV_PREFIX: &str = "FAMTASK_";

/// Setting names, in the order they are reported
pub const BACKEND_KEYS: [&str; 6] = [
    "api_key",
    "auth_domain",
    "project_id",
    "storage_bucket",
    "messaging_sender_id",
    "app_id",
];

/// Connection settings of the hosted backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API key
    pub api_key: String,
    /// Auth domain
    pub auth_domain: String,
    /// Project id
    pub project_id: String,
    /// Storage bucket
    pub storage_bucket: String,
    /// Messaging sender id
    pub messaging_sender_id: String,
    /// App id
    pub app_id: String,
}

impl BackendConfig {
    /// Settings that let the in-memory backends start
    #[must_use]
    pub fn local() -> Self {
        Self {
            api_key: "local-api-key".into(),
            auth_domain: "localhost".into(),
            project_id: "famtask-local".into(),
            storage_bucket: "famtask-local.storage".into(),
            messaging_sender_id: "000000000000".into(),
            app_id: "1:000000000000:local:famtask".into(),
        }
    }

    /// Value of a setting by name
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "api_key" => &self.api_key,
            "auth_domain" => &self.auth_domain,
            "project_id" => &self.project_id,
            "storage_bucket" => &self.storage_bucket,
            "messaging_sender_id" => &self.messaging_sender_id,
            "app_id" => &self.app_id,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Overwrite a setting by name; returns false for unknown names
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "api_key" => &mut self.api_key,
            "auth_domain" => &mut self.auth_domain,
            "project_id" => &mut self.project_id,
            "storage_bucket" => &mut self.storage_bucket,
            "messaging_sender_id" => &mut self.messaging_sender_id,
            "app_id" => &mut self.app_id,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// With project id
    #[inline]
    #[must_use]
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// Names of missing or placeholder settings
    #[must_use]
    pub fn validate(&self) -> Vec<&'static str> {
        BACKEND_KEYS
            .into_iter()
            .filter(|key| self.get(key).map_or(true, is_placeholder))
            .collect()
    }

    /// Whether every setting holds a real value
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.validate().is_empty()
    }

    /// Overlay values found through `lookup` (`FAMTASK_API_KEY`, ...)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in BACKEND_KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_uppercase());
            if let Some(value) = lookup(&var).filter(|v| !v.trim().is_empty()) {
                self.set(key, value);
            }
        }
    }
}

/// Template values shipped in sample configs count as unset
fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return true;
    }
    let upper = v.to_ascii_uppercase();
    upper.contains("XXXXXXXX")
        || upper.starts_with("YOUR_")
        || upper.starts_with("YOUR-")
        || upper.starts_with("CHANGE")
        || (v.starts_with('<') && v.ends_with('>'))
}

/// Top-level service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Backend connection settings
    pub backend: BackendConfig,
    /// Re-read/re-validate rounds allowed when a compare-and-swap loses
    pub conflict_retry_limit: u32,
    /// Fresh codes tried before giving up on an invite-code collision
    pub invite_code_attempts: u32,
}

impl ServiceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for the in-memory backends
    #[must_use]
    pub fn local() -> Self {
        Self::default().with_backend(BackendConfig::local())
    }

    /// With backend settings
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// With conflict retry limit
    #[inline]
    #[must_use]
    pub fn with_conflict_retry_limit(mut self, limit: u32) -> Self {
        self.conflict_retry_limit = limit;
        self
    }

    /// With invite-code attempts
    #[inline]
    #[must_use]
    pub fn with_invite_code_attempts(mut self, attempts: u32) -> Self {
        self.invite_code_attempts = attempts;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// - `FamilyTaskError::Config` if the text is not valid TOML for this shape
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FamilyTaskError::Config(e.to_string()))
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// - `FamilyTaskError::Config` if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FamilyTaskError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Load from an optional file, then overlay the process environment
    ///
    /// # Errors
    /// - `FamilyTaskError::Config` if a given file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |var| std::env::var(var).ok())
    }

    /// Like [`ServiceConfig::load`] with an explicit variable lookup
    ///
    /// # Errors
    /// - `FamilyTaskError::Config` if a given file cannot be read or parsed
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.backend.apply_env(lookup);
        Ok(config)
    }

    /// Fail unless the backend is fully configured
    ///
    /// # Errors
    /// - `FamilyTaskError::NotConfigured` listing the missing settings
    pub fn ensure_configured(&self) -> Result<()> {
        let missing = self.backend.validate();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FamilyTaskError::NotConfigured {
                missing: missing.into_iter().map(str::to_string).collect(),
            })
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            conflict_retry_limit: 5,
            invite_code_attempts: 8,
        }
    }
}
