//! Tracker configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Credentials are passed through to the courier untouched.

use crate::error::{TrackError, TrackResult};
use serde::{Deserialize, Serialize};
use url::Url;

pub const UPS_LIVE_URL: &str = "https://onlinetools.ups.com/rest/Track";
pub const UPS_TEST_URL: &str = "https://wwwcie.ups.com/rest/Track";
pub const TRULINE_URL: &str = "http://epod.truline.co.uk/Delivery/Tracking";
pub const YODEL_URL: &str = "http://tracking.yodel.co.uk/wrd/run/wt_xml_gen_pw.getParcelHistory";

/// Top-level configuration for a [`Tracker`](crate::Tracker).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub ups: UpsConfig,
    pub truline: TrulineConfig,
    pub yodel: YodelConfig,
    /// Per-request timeout for courier HTTP calls.
    pub http_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ups: UpsConfig::default(),
            truline: TrulineConfig::default(),
            yodel: YodelConfig::default(),
            http_timeout_ms: 30_000,
        }
    }
}

impl TrackerConfig {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> TrackResult<Self> {
        serde_json::from_str(json).map_err(|e| TrackError::Config(format!("invalid config: {e}")))
    }

    /// Overlay UPS credentials from `UPS_USER`, `UPS_PASS` and `UPS_ACCESS_KEY`.
    pub fn apply_env(&mut self) {
        if let Ok(user) = std::env::var("UPS_USER") {
            self.ups.user = Some(user);
        }
        if let Ok(pass) = std::env::var("UPS_PASS") {
            self.ups.pass = Some(pass);
        }
        if let Ok(access) = std::env::var("UPS_ACCESS_KEY") {
            self.ups.access = Some(access);
        }
    }

    /// Reject settings no adapter can run with.
    pub fn validate(&self) -> TrackResult<()> {
        for (courier, concurrency) in [
            ("ups", self.ups.concurrency),
            ("truline", self.truline.concurrency),
            ("yodel", self.yodel.concurrency),
        ] {
            if concurrency == 0 {
                return Err(TrackError::Config(format!(
                    "{courier}.concurrency must be at least 1"
                )));
            }
        }
        if self.ups.cache_size == 0 {
            return Err(TrackError::Config(
                "ups.cache_size must be at least 1".to_string(),
            ));
        }
        if self.http_timeout_ms == 0 {
            return Err(TrackError::Config(
                "http_timeout_ms must be at least 1".to_string(),
            ));
        }
        for (courier, endpoint) in [
            ("ups", self.ups.endpoint()),
            ("truline", self.truline.base_url.as_str()),
            ("yodel", self.yodel.base_url.as_str()),
        ] {
            check_endpoint(courier, endpoint)?;
        }
        Ok(())
    }
}

/// Endpoints must be absolute http(s) URLs.
fn check_endpoint(courier: &str, endpoint: &str) -> TrackResult<()> {
    let url = Url::parse(endpoint)
        .map_err(|e| TrackError::Config(format!("{courier} endpoint {endpoint:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TrackError::Config(format!(
            "{courier} endpoint must use http or https, not {other}"
        ))),
    }
}

/// UPS JSON API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsConfig {
    pub user: Option<String>,
    pub pass: Option<String>,
    /// Access licence number.
    pub access: Option<String>,
    /// Use the UPS customer integration environment.
    pub test_mode: bool,
    pub concurrency: usize,
    /// Maximum shipments held in the resolution cache.
    pub cache_size: usize,
    /// Seconds a resolved shipment stays fresh.
    pub cache_ttl_secs: u64,
    /// Endpoint override; wins over `test_mode`.
    pub base_url: Option<String>,
}

impl Default for UpsConfig {
    fn default() -> Self {
        Self {
            user: None,
            pass: None,
            access: None,
            test_mode: false,
            concurrency: 5,
            cache_size: 500,
            cache_ttl_secs: 300,
            base_url: None,
        }
    }
}

impl UpsConfig {
    pub fn endpoint(&self) -> &str {
        match &self.base_url {
            Some(url) => url,
            None if self.test_mode => UPS_TEST_URL,
            None => UPS_LIVE_URL,
        }
    }
}

/// Truline ePOD settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrulineConfig {
    pub concurrency: usize,
    pub base_url: String,
}

impl Default for TrulineConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            base_url: TRULINE_URL.to_string(),
        }
    }
}

/// Yodel XML tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YodelConfig {
    pub concurrency: usize,
    pub base_url: String,
}

impl Default for YodelConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            base_url: YODEL_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = TrackerConfig::from_json("{}").unwrap();
        assert_eq!(config.ups.concurrency, 5);
        assert_eq!(config.truline.concurrency, 2);
        assert_eq!(config.yodel.concurrency, 2);
        assert_eq!(config.ups.cache_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section() {
        let config =
            TrackerConfig::from_json(r#"{"ups": {"user": "u", "test_mode": true}}"#).unwrap();
        assert_eq!(config.ups.user.as_deref(), Some("u"));
        assert_eq!(config.ups.concurrency, 5);
        assert_eq!(config.ups.endpoint(), UPS_TEST_URL);
    }

    #[test]
    fn test_base_url_overrides_mode() {
        let ups = UpsConfig {
            base_url: Some("http://localhost:9/track".into()),
            test_mode: true,
            ..Default::default()
        };
        assert_eq!(ups.endpoint(), "http://localhost:9/track");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = TrackerConfig::default();
        config.yodel.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "config");
        assert!(err.to_string().contains("yodel.concurrency"));
    }

    #[test]
    fn test_zero_cache_rejected() {
        let mut config = TrackerConfig::default();
        config.ups.cache_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert_eq!(
            TrackerConfig::from_json("{nope").unwrap_err().kind(),
            "config"
        );
    }

    #[test]
    fn test_endpoint_must_be_http() {
        let mut config = TrackerConfig::default();
        config.truline.base_url = "ftp://epod.truline.co.uk/".into();
        assert!(config.validate().unwrap_err().to_string().contains("truline"));

        config.truline.base_url = "not a url".into();
        assert_eq!(config.validate().unwrap_err().kind(), "config");
    }
}
