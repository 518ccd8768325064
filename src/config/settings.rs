//! Settings structures for library-search configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub search: SearchSettings,
    pub outgoing: OutgoingSettings,
    pub browser: BrowserSettings,
    pub backends: Vec<BackendConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            server: ServerSettings::default(),
            search: SearchSettings::default(),
            outgoing: OutgoingSettings::default(),
            browser: BrowserSettings::default(),
            backends: default_backends(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (LIBSEARCH_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Merge overrides from an arbitrary variable source
    pub fn merge_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = var("LIBSEARCH_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Some(val) = var("LIBSEARCH_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("LIBSEARCH_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Some(val) = var("LIBSEARCH_DEADLINE") {
            self.search.deadline = val.parse().ok().filter(|secs: &f64| *secs > 0.0);
        }
        if let Some(val) = var("LIBSEARCH_DIAGNOSTICS_DIR") {
            self.browser.diagnostics_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
        if let Some(val) = var("LIBSEARCH_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
            }
        }
        if let Some(val) = var("LIBSEARCH_CHROME_EXECUTABLE") {
            self.browser.chrome_executable = Some(PathBuf::from(val));
        }

        for backend in &mut self.backends {
            let prefix = format!(
                "LIBSEARCH_{}",
                backend.name.to_uppercase().replace(['-', ' '], "_")
            );
            if let Some(user) = var(&format!("{prefix}_USERNAME")) {
                backend.username = Some(user);
            }
            if let Some(password) = var(&format!("{prefix}_PASSWORD")) {
                backend.password = Some(password);
            }
        }
    }

    /// Get backend config by name
    pub fn get_backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.name == name)
    }

}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name reported by the health endpoint
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "library-search".to_string(),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// Aggregation behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Overall deadline for one request in seconds (none = unbounded)
    pub deadline: Option<f64>,
}

impl SearchSettings {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| seconds("search.deadline", secs))
    }
}

/// Convert a setting given in seconds.
///
/// Negative, NaN and values too large for a `Duration` are rejected with a
/// warning instead of panicking.
pub fn seconds(name: &str, secs: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => Some(duration),
        Err(e) => {
            warn!("Ignoring {} = {}: {}", name, secs, e);
            None
        }
    }
}

/// Outgoing request settings for plain HTTP backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Fixed user agent (none = rotate realistic ones)
    pub user_agent: Option<String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            user_agent: None,
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Headless browser and interaction protocol settings.
///
/// All durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Client identifier sent by the browser (none = built-in desktop Chrome)
    pub user_agent: Option<String>,
    /// Explicit chrome/chromium binary (none = auto-detect)
    pub chrome_executable: Option<PathBuf>,
    /// Where screenshots and markup dumps go on failure (none = disabled)
    pub diagnostics_dir: Option<PathBuf>,
    /// Timeout for each of the three page-load conditions
    pub page_load_timeout: f64,
    /// Pause before the page-load conditions are checked
    pub load_settle: f64,
    /// Pause after the page-load conditions are met
    pub post_load_settle: f64,
    /// Pause after clicking an overlay or modal
    pub animation_pause: f64,
    /// Pause before each modal handling attempt
    pub modal_retry_delay: f64,
    /// How many times modal handling is attempted
    pub modal_attempts: u32,
    /// Wait for each modal-close selector
    pub modal_probe_timeout: f64,
    /// Wait for each search input selector
    pub input_timeout: f64,
    /// Pause around clearing and typing the query
    pub input_settle: f64,
    /// Wait for a clickable submit button
    pub submit_timeout: f64,
    /// Polling interval for all waits
    pub poll_interval: f64,
    /// Upper bound on result pages followed
    pub max_pages: usize,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
            chrome_executable: None,
            diagnostics_dir: Some(PathBuf::from("diagnostics")),
            page_load_timeout: 20.0,
            load_settle: 2.0,
            post_load_settle: 1.0,
            animation_pause: 0.5,
            modal_retry_delay: 1.0,
            modal_attempts: 3,
            modal_probe_timeout: 5.0,
            input_timeout: 10.0,
            input_settle: 1.0,
            submit_timeout: 5.0,
            poll_interval: 0.25,
            max_pages: 50,
        }
    }
}

/// Individual backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend identifier used in requests
    pub name: String,
    /// Backend implementation to use
    pub backend: String,
    /// Whether backend is disabled
    pub disabled: bool,
    /// Override of the built-in base URL
    pub base_url: Option<String>,
    /// Per-backend timeout in seconds
    pub timeout: Option<f64>,
    /// Login for sources that support authentication
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            backend: String::new(),
            disabled: false,
            base_url: None,
            timeout: None,
            username: None,
            password: None,
        }
    }
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            ..Default::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| seconds(&format!("{}.timeout", self.name), secs))
    }

    /// Credentials, when both halves are present
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

/// Default backend configurations
fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig::new("example_library", "example_library"),
        BackendConfig::new("noworzyn", "noworzyn"),
        BackendConfig::new("onleihe_koeln", "onleihe_koeln"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8000);
        assert!(!settings.general.debug);
        assert!(settings.browser.headless);
        assert_eq!(settings.browser.max_pages, 50);
        assert_eq!(settings.search.deadline(), None);
        assert!(settings.get_backend("noworzyn").is_some());
    }

    #[test]
    fn test_yaml_sections_default_independently() {
        let settings = Settings::from_yaml(
            r#"
search:
  deadline: 45
browser:
  headless: false
backends:
  - name: koeln
    backend: onleihe_koeln
    username: reader
    password: secret
    branch: zentral
  - name: shop
    backend: noworzyn
    disabled: true
"#,
        )
        .unwrap();

        assert_eq!(settings.search.deadline(), Some(Duration::from_secs(45)));
        assert!(!settings.browser.headless);
        assert_eq!(settings.browser.window_width, 1920);
        assert_eq!(settings.server.port, 8000);
        assert!(settings.get_backend("shop").unwrap().disabled);

        let koeln = settings.get_backend("koeln").unwrap();
        assert_eq!(
            koeln.credentials(),
            Some(("reader".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LIBSEARCH_PORT", "9100"),
            ("LIBSEARCH_DEADLINE", "12.5"),
            ("LIBSEARCH_DIAGNOSTICS_DIR", ""),
            ("LIBSEARCH_ONLEIHE_KOELN_USERNAME", "reader"),
            ("LIBSEARCH_ONLEIHE_KOELN_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.server.port, 9100);
        assert_eq!(
            settings.search.deadline(),
            Some(Duration::from_secs_f64(12.5))
        );
        assert_eq!(settings.browser.diagnostics_dir, None);
        assert!(settings
            .get_backend("onleihe_koeln")
            .unwrap()
            .credentials()
            .is_some());
        assert!(settings
            .get_backend("noworzyn")
            .unwrap()
            .credentials()
            .is_none());
    }

    #[test]
    fn test_out_of_range_durations_are_ignored() {
        let mut settings = Settings::from_yaml(
            r#"
backends:
  - name: shop
    backend: noworzyn
    timeout: 1e300
  - name: koeln
    backend: onleihe_koeln
    timeout: .inf
"#,
        )
        .unwrap();
        assert_eq!(settings.backends[0].timeout(), None);
        assert_eq!(settings.backends[1].timeout(), None);

        settings.merge_vars(|key| (key == "LIBSEARCH_DEADLINE").then(|| "inf".to_string()));
        assert_eq!(settings.search.deadline(), None);

        settings.search.deadline = Some(f64::NAN);
        assert_eq!(settings.search.deadline(), None);
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds("x", 2.5), Some(Duration::from_millis(2500)));
        assert_eq!(seconds("x", 0.0), Some(Duration::ZERO));
        assert_eq!(seconds("x", -1.0), None);
        assert_eq!(seconds("x", f64::INFINITY), None);
    }
}
