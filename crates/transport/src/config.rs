//! Client configuration and endpoint URL building.

use std::time::Duration;

use objects::{ClientInfo, ErrorModel};
use reqwest::Url;
use thiserror::Error;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload watchdog interval applied when none is configured.
pub const DEFAULT_UPLOAD_WATCHDOG: Duration = Duration::from_secs(60);

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The API host is not an absolute URL.
    #[error("invalid API host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    /// The API host uses a scheme other than `http` or `https`.
    #[error("unsupported scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme { scheme: String },

    /// A duration setting is zero.
    #[error("'{setting}' must be greater than zero")]
    ZeroDuration { setting: &'static str },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

impl From<ConfigError> for ErrorModel {
    fn from(error: ConfigError) -> Self {
        ErrorModel::invalid_arg(error.to_string())
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Resolved once at startup and shared by every call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_host: Url,
    lang: Option<String>,
    app_url: Option<String>,
    request_timeout: Duration,
    upload_watchdog: Duration,
}

impl ClientConfig {
    /// Validates `api_host` (absolute `http`/`https` URL) and applies the
    /// default timeouts.
    pub fn new(api_host: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(api_host).map_err(|e| ConfigError::InvalidHost {
            host: api_host.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidHost {
                host: api_host.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Self {
            api_host: url,
            lang: None,
            app_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_watchdog: DEFAULT_UPLOAD_WATCHDOG,
        })
    }

    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    #[must_use]
    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = Some(app_url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                setting: "request_timeout",
            });
        }
        self.request_timeout = timeout;
        Ok(self)
    }

    pub fn with_upload_watchdog(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                setting: "upload_watchdog",
            });
        }
        self.upload_watchdog = interval;
        Ok(self)
    }

    pub fn api_host(&self) -> &Url {
        &self.api_host
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn upload_watchdog(&self) -> Duration {
        self.upload_watchdog
    }

    /// Client metadata forwarded as `x-app-url` / `x-app-lang`.
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            app_url: self.app_url.clone(),
            lang: self.lang.clone(),
        }
    }

    /// `true` when `url` shares the API host's scheme, host and port.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.api_host.origin()
    }

    /// An endpoint URL under the API host without query parameters.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ConfigError> {
        build_url(&self.api_host, segments, std::iter::empty::<(&str, &str)>())
    }

    /// An endpoint URL under the API host.
    pub fn url_with_query<I, K, V>(&self, segments: &[&str], query: I) -> Result<Url, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        build_url(&self.api_host, segments, query)
    }
}

// ---------------------------------------------------------------------------
// URL builder
// ---------------------------------------------------------------------------

/// Appends `segments` to `host`'s path and appends `query`.
///
/// Every segment is percent-encoded as a whole, so a `/` inside one becomes
/// `%2F` and never adds a level to the path. Empty segments are skipped. Any
/// query already on `host` is replaced.
pub fn build_url<I, K, V>(host: &Url, segments: &[&str], query: I) -> Result<Url, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = host.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ConfigError::InvalidHost {
                host: host.to_string(),
                reason: "cannot be a base URL".to_string(),
            })?;
        path.pop_if_empty();
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            path.push(segment);
        }
    }

    let pairs: Vec<(K, V)> = query.into_iter().collect();
    if !pairs.is_empty() {
        let mut serializer = url.query_pairs_mut();
        for (key, value) in &pairs {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_and_non_http_hosts() {
        assert!(matches!(
            ClientConfig::new("/api"),
            Err(ConfigError::InvalidHost { .. })
        ));
        assert!(matches!(
            ClientConfig::new("ftp://files.example"),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
        assert!(ClientConfig::new("https://api.example").is_ok());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = ClientConfig::new("https://api.example").unwrap();
        assert!(config.clone().with_request_timeout(Duration::ZERO).is_err());
        assert!(config.with_upload_watchdog(Duration::ZERO).is_err());
    }

    #[test]
    fn builds_urls_under_a_host_path() {
        let host = Url::parse("https://api.example/v1").unwrap();
        let url = build_url(&host, &["u", "post", "p1"], [("max", "20")]).unwrap();
        assert_eq!(url.as_str(), "https://api.example/v1/u/post/p1?max=20");

        let host = Url::parse("https://api.example/").unwrap();
        let url = build_url(&host, &["u", "user", "a b"], std::iter::empty::<(&str, &str)>())
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example/u/user/a%20b");
    }

    #[test]
    fn slash_inside_a_segment_stays_in_that_segment() {
        let config = ClientConfig::new("https://api.example/").unwrap();
        let url = config.url(&["u", "post", "p1/like"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example/u/post/p1%2Flike");
        assert_eq!(url.path_segments().map(|s| s.count()), Some(3));
    }

    #[test]
    fn same_origin_compares_scheme_host_and_port() {
        let config = ClientConfig::new("https://api.example/v1").unwrap();
        assert!(config.is_same_origin(&Url::parse("https://api.example/other").unwrap()));
        assert!(!config.is_same_origin(&Url::parse("http://api.example/").unwrap()));
        assert!(!config.is_same_origin(&Url::parse("https://cdn.example/").unwrap()));
    }

    #[test]
    fn config_errors_become_invalid_arg() {
        let error: ErrorModel = ConfigError::ZeroDuration { setting: "x" }.into();
        assert!(error.is(objects::codes::INVALID_ARG));
    }
}
