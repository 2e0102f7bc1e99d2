use std::env;

use crate::error::ConfigError;

pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Connection settings for the fitness backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub page_size: u32,
}

impl BackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Reads `TRACKER_API_BASE_URL`, `TRACKER_API_TOKEN` and `TRACKER_PAGE_SIZE`.
    ///
    /// Returns `Ok(None)` when no base URL is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`BackendConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(base_url) = lookup("TRACKER_API_BASE_URL") else {
            return Ok(None);
        };
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Ok(None);
        }

        let api_token = lookup("TRACKER_API_TOKEN")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let page_size = match lookup("TRACKER_PAGE_SIZE") {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::Invalid {
                    var: "TRACKER_PAGE_SIZE",
                    raw,
                })?,
        };

        Ok(Some(Self {
            base_url,
            api_token,
            page_size,
        }))
    }
}
