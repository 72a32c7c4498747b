use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::Url;
use tracing::debug;

use crate::error::RegistryError;
use crate::metadata::RegistryMetadata;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmmirror.com";
pub const OFFICIAL_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);
/// Registry setting that selects [`OFFICIAL_REGISTRY_URL`] instead of a URL.
pub const OFFICIAL_REGISTRY_ALIAS: &str = "official";

/// Anything that can answer "which versions of this package exist".
pub trait MetadataSource {
    fn fetch_metadata(&self, package: &str) -> Result<RegistryMetadata, RegistryError>;

    /// Where metadata comes from, for diagnostics.
    fn location(&self) -> &str;
}

/// HTTP client for a registry serving `GET <base>/<package>` JSON documents.
///
/// Every call is a fresh request: no retries and no caching.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    timeout: Duration,
}

impl RegistryClient {
    pub fn new(registry_url: Option<&str>) -> Self {
        let base_url = registry_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_REGISTRY_URL);
        Self {
            base_url: base_url.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Client for a configured registry setting: a base URL, the
    /// [`OFFICIAL_REGISTRY_ALIAS`], or nothing for the default mirror.
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            Some(alias) if alias.eq_ignore_ascii_case(OFFICIAL_REGISTRY_ALIAS) => Self::official(),
            other => Self::new(other),
        }
    }

    pub fn official() -> Self {
        Self::new(Some(OFFICIAL_REGISTRY_URL))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn http_client(&self, url: &Url) -> Result<Client, RegistryError> {
        Client::builder()
            .timeout(self.timeout())
            .user_agent(concat!("kindling/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RegistryError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

impl MetadataSource for RegistryClient {
    fn fetch_metadata(&self, package: &str) -> Result<RegistryMetadata, RegistryError> {
        let url = package_url(self.base_url(), package)?;
        debug!(%url, "fetching registry metadata");

        let client = self.http_client(&url)?;
        let response = client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|err| transport_error(&url, &err, self.timeout()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .map_err(|err| transport_error(&url, &err, self.timeout()))?;
        RegistryMetadata::from_json_slice(&body).map_err(|err| RegistryError::Body {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn location(&self) -> &str {
        self.base_url()
    }
}

/// Fetches metadata for `package` from `registry_url`, or from
/// [`DEFAULT_REGISTRY_URL`] when no override is given.
pub fn fetch_metadata(
    package: &str,
    registry_url: Option<&str>,
) -> Result<RegistryMetadata, RegistryError> {
    RegistryClient::from_setting(registry_url).fetch_metadata(package)
}

/// Appends `package` to `base` as a single path segment.
///
/// A trailing slash on `base` is absorbed, and a `/` inside a scoped package
/// name is percent-encoded so the name stays one segment.
pub fn package_url(base: &str, package: &str) -> Result<Url, RegistryError> {
    let package = package.trim();
    if package.is_empty() {
        return Err(RegistryError::EmptyPackageName);
    }

    let mut url = Url::parse(base.trim()).map_err(|err| RegistryError::InvalidUrl {
        url: base.to_string(),
        message: err.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|()| RegistryError::InvalidUrl {
            url: base.to_string(),
            message: "url cannot carry a path".to_string(),
        })?
        .pop_if_empty()
        .push(package);
    Ok(url)
}

fn transport_error(url: &Url, err: &reqwest::Error, timeout: Duration) -> RegistryError {
    let message = if err.is_timeout() {
        format!("timed out after {}ms", timeout.as_millis())
    } else {
        err.to_string()
    };
    RegistryError::Transport {
        url: url.to_string(),
        message,
    }
}
