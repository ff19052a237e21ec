//! Credentials and generation parameters.
//!
//! Everything here is an immutable snapshot.  Switching model tiers derives a new
//! [`GenerationSettings`] value instead of editing the existing one.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Base URL used when [`BASE_URL_ENV`] is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Request timeout used for every completion call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Default response token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Response token budget of the smaller model tier.
pub const GPT35_MAX_TOKENS: u32 = 3000;

const MAX_TEMPERATURE: f32 = 2.0;

///////////////////////////////////////// GenerationSettings ////////////////////////////////////////

/// Sampling parameters sent with every completion request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationSettings {
    temperature: f32,
    max_tokens: u32,
}

impl GenerationSettings {
    /// Validates and creates a settings snapshot.
    ///
    /// `temperature` must be finite and within `[0, 2]`; `max_tokens` must be positive.
    pub fn new(temperature: f32, max_tokens: u32) -> Result<Self> {
        if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(Error::validation(
                format!("temperature must be between 0 and {MAX_TEMPERATURE}, got {temperature}"),
                Some("temperature".to_string()),
            ));
        }
        if max_tokens == 0 {
            return Err(Error::validation(
                "max_tokens must be positive",
                Some("max_tokens".to_string()),
            ));
        }
        Ok(Self {
            temperature,
            max_tokens,
        })
    }

    /// The sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// The maximum number of tokens in a response.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Derives a copy with a different token budget.
    pub fn with_max_tokens(&self, max_tokens: u32) -> Result<Self> {
        Self::new(self.temperature, max_tokens)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

///////////////////////////////////////////// ModelTier /////////////////////////////////////////////

/// The model family a session talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelTier {
    /// `gpt-4`
    #[default]
    Gpt4,
    /// `gpt-3.5-turbo`, which accepts a smaller token budget.
    Gpt35Turbo,
}

impl ModelTier {
    /// The identifier sent to the API.
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelTier::Gpt4 => "gpt-4",
            ModelTier::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    /// The name printed above each reply.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelTier::Gpt4 => "GPT4",
            ModelTier::Gpt35Turbo => "GPT3.5",
        }
    }

    /// Derives the settings this tier runs with from the requested ones.
    ///
    /// The smaller tier caps the token budget at [`GPT35_MAX_TOKENS`].
    pub fn derive_settings(&self, requested: GenerationSettings) -> Result<GenerationSettings> {
        match self {
            ModelTier::Gpt4 => Ok(requested),
            ModelTier::Gpt35Turbo => {
                requested.with_max_tokens(requested.max_tokens().min(GPT35_MAX_TOKENS))
            }
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

/////////////////////////////////////////// ApiCredentials //////////////////////////////////////////

/// Where and how to reach the completion API.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    base_url: Url,
    timeout: Duration,
}

impl ApiCredentials {
    /// Creates credentials for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::configuration(format!("{API_KEY_ENV} is empty")));
        }
        Ok(Self {
            api_key,
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Reads credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads credentials through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_ENV).ok_or_else(|| {
            Error::configuration(format!("{API_KEY_ENV} environment variable not set"))
        })?;
        let credentials = Self::new(api_key)?;
        match lookup(BASE_URL_ENV) {
            Some(base_url) if !base_url.trim().is_empty() => {
                credentials.with_base_url(base_url.trim())
            }
            _ => Ok(credentials),
        }
    }

    /// Points the credentials at a different API root.
    ///
    /// A trailing slash is added when missing so relative endpoints resolve beneath it.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "{BASE_URL_ENV} must be an http(s) URL, got {base_url}"
            )));
        }
        self.base_url = base_url;
        Ok(self)
    }

    /// The bearer token.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The API root, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}
