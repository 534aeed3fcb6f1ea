//! Embed configuration.
//!
//! Built with the `with_*` methods or deserialized from the camelCase JSON
//! an integrator would pass:
//!
//! ```json
//! { "baseUrl": "https://app.example", "container": "#embed",
//!   "size": { "width": 480, "height": "100%" },
//!   "oauthToolUrl": "https://oauth.example", "language": "en" }
//! ```

use std::time::Duration;

use framebridge_shared::BridgeError;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::frame::{Dimension, FrameSize};
use crate::oauth::{route_url, RedirectMode, SavedRoute};
use crate::provider::{WatchSettings, DEFAULT_PROVIDER_KEYS};
use crate::transport;

fn default_watch_interval_ms() -> u64 {
    1000
}

fn default_provider_notify_delay_ms() -> u64 {
    500
}

fn default_provider_keys() -> Vec<String> {
    DEFAULT_PROVIDER_KEYS.iter().map(|k| k.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    /// Guest application URL; its origin is the only one messages are
    /// accepted from
    pub base_url: String,
    /// Selector of the element the frame is mounted in
    pub container: String,
    #[serde(default)]
    pub size: FrameSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_tool_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub redirect_mode: RedirectMode,
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    #[serde(default = "default_provider_notify_delay_ms")]
    pub provider_notify_delay_ms: u64,
    /// Host globals probed for wallet providers
    #[serde(default = "default_provider_keys")]
    pub provider_keys: Vec<String>,
}

impl EmbedConfig {
    pub fn new(base_url: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            container: container.into(),
            size: FrameSize::default(),
            oauth_tool_url: None,
            language: None,
            redirect_mode: RedirectMode::default(),
            watch_interval_ms: default_watch_interval_ms(),
            provider_notify_delay_ms: default_provider_notify_delay_ms(),
            provider_keys: default_provider_keys(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_size(mut self, width: Option<Dimension>, height: Option<Dimension>) -> Self {
        self.size.update(width, height);
        self
    }

    pub fn with_oauth_tool_url(mut self, url: impl Into<String>) -> Self {
        self.oauth_tool_url = Some(url.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_redirect_mode(mut self, mode: RedirectMode) -> Self {
        self.redirect_mode = mode;
        self
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_provider_notify_delay(mut self, delay: Duration) -> Self {
        self.provider_notify_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_provider_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provider_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        self.allowed_origin()?;
        if self.watch_interval_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "watchIntervalMs must be greater than zero".to_string(),
            ));
        }
        if let Some(tool) = &self.oauth_tool_url {
            Url::parse(tool).map_err(|e| BridgeError::InvalidUrl(format!("{tool}: {e}")))?;
        }
        Ok(())
    }

    pub fn allowed_origin(&self) -> Result<String, BridgeError> {
        transport::allowed_origin(&self.base_url)
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            initial_delay: Duration::from_millis(self.provider_notify_delay_ms),
            interval: Duration::from_millis(self.watch_interval_ms),
        }
    }

    /// URL the frame is loaded with.
    ///
    /// A restored route is appended to the base URL. A restored frame URL
    /// replaces it, but only when it is on the guest's origin.
    pub fn frame_src(&self, restored: Option<&SavedRoute>) -> Result<String, BridgeError> {
        let origin = self.allowed_origin()?;
        let src = match restored {
            Some(SavedRoute::Route(route)) => route_url(&self.base_url, route),
            Some(SavedRoute::FrameUrl(url))
                if transport::allowed_origin(url).ok().as_deref() == Some(origin.as_str()) =>
            {
                url.clone()
            }
            Some(SavedRoute::FrameUrl(url)) => {
                crate::log_warn!("Ignoring saved frame URL off the guest origin: {}", url);
                self.base_url.clone()
            }
            None => self.base_url.clone(),
        };

        let Some(language) = &self.language else {
            return Ok(src);
        };
        let mut url = Url::parse(&src).map_err(|e| BridgeError::InvalidUrl(format!("{src}: {e}")))?;
        url.query_pairs_mut().append_pair("lang", language);
        Ok(url.into())
    }
}
