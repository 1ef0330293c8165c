//! Watch configuration
//!
//! One YAML document describes every target and every collaborator. Values
//! left out fall back to the defaults below; a handful of environment
//! variables override the file so secrets never need to live in it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dropwatch_audit_log::DEFAULT_ROTATE_BYTES;
use dropwatch_core_types::{LayerId, LayerRole, Target};
use dropwatch_fusion_policy::FusionPolicy;
use dropwatch_notifier::{RetryPolicy, WebhookConfig};
use dropwatch_page_fetcher::{AcquireOptions, FetcherConfig, MarkerWait, DEFAULT_MARKER};
use dropwatch_poll_loop::{ContinuationMode, PollConfig, WaitInterval};
use dropwatch_signal_layers::{LayerRegistry, LayerSettings, KNOWN_LAYERS};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub targets: Vec<TargetConfig>,
    pub fetch: FetchSection,
    pub wait: WaitSection,
    /// Stop after this many cycles. Absent means run until cancelled.
    pub max_attempts: Option<u64>,
    pub continuation: ContinuationMode,
    pub realert_cooldown_secs: Option<u64>,
    pub fusion: FusionPolicy,
    pub layers: LayersSection,
    pub notifier: NotifierSection,
    pub audit: AuditSection,
    pub logging: LoggingSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    pub url: String,
}

impl TargetConfig {
    /// Target for a bare URL, keyed by the last path segment.
    pub fn from_url(url: &str) -> Self {
        Self {
            id: target_id_from_url(url),
            url: url.trim().to_string(),
        }
    }

    pub fn to_target(&self) -> Target {
        Target::new(self.id.as_str(), self.url.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_secs: u64,
    /// Selector awaited after every reload. `null` disables the wait.
    pub marker: Option<String>,
    pub marker_timeout_secs: u64,
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub profile_root: PathBuf,
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            marker: Some(DEFAULT_MARKER.to_string()),
            marker_timeout_secs: 10,
            headless: resolve_headless_default(),
            executable: None,
            profile_root: PathBuf::from("./.dropwatch-profiles"),
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSection {
    /// When set, every pause is exactly this long and the range is ignored.
    pub fixed_secs: Option<f64>,
    pub min_secs: f64,
    pub max_secs: f64,
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            fixed_secs: None,
            min_secs: 2.0,
            max_secs: 5.0,
        }
    }
}

impl WaitSection {
    pub fn interval(&self) -> WaitInterval {
        match self.fixed_secs {
            Some(secs) => WaitInterval::Fixed(secs_f64(secs)),
            None => WaitInterval::Range {
                min: secs_f64(self.min_secs),
                max: secs_f64(self.max_secs),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let values = [self.fixed_secs.unwrap_or(0.0), self.min_secs, self.max_secs];
        if values.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(ConfigError::InvalidWait(
                "durations must be finite and non-negative".into(),
            ));
        }
        if self.fixed_secs.is_none() && self.min_secs > self.max_secs {
            return Err(ConfigError::InvalidWait(format!(
                "min_secs ({}) exceeds max_secs ({})",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LayersSection {
    /// Evaluation order. Unknown ids are rejected at startup.
    pub enabled: Vec<LayerId>,
    pub roles: HashMap<LayerId, LayerRole>,
    pub settings: LayerSettings,
}

impl Default for LayersSection {
    fn default() -> Self {
        Self {
            enabled: KNOWN_LAYERS.iter().map(|id| LayerId::from(*id)).collect(),
            roles: HashMap::new(),
            settings: LayerSettings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Webhook,
    #[default]
    Log,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSection {
    pub kind: NotifierKind,
    pub webhook_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub retry: RetrySection,
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            kind: NotifierKind::default(),
            webhook_url: None,
            token: None,
            timeout_secs: 10,
            retry: RetrySection::default(),
        }
    }
}

impl std::fmt::Debug for NotifierSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierSection")
            .field("kind", &self.kind)
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub multiplier: u32,
    pub max_backoff_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_secs: policy.initial_backoff.as_secs(),
            multiplier: policy.multiplier,
            max_backoff_secs: policy.max_backoff.as_secs(),
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            multiplier: self.multiplier,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    pub enabled: bool,
    pub dir: PathBuf,
    pub rotate_bytes: u64,
    /// Keep the markup of every snapshot that produced a positive decision.
    pub archive_found: bool,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./dropwatch-audit"),
            rotate_bytes: DEFAULT_ROTATE_BYTES,
            archive_found: false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Adds a daily-rolling log file in this directory.
    pub dir: Option<PathBuf>,
}

impl WatchConfig {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Applies `DROPWATCH_*` overrides read through `lookup`.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = lookup("DROPWATCH_WEBHOOK_URL") {
            self.notifier.webhook_url = Some(url);
            self.notifier.kind = NotifierKind::Webhook;
        }
        if let Some(token) = lookup("DROPWATCH_WEBHOOK_TOKEN") {
            self.notifier.token = Some(token);
        }
        if let Some(value) = lookup("DROPWATCH_HEADLESS") {
            self.fetch.headless = parse_headless(&value);
        }
        if let Some(path) = lookup("DROPWATCH_CHROME") {
            self.fetch.executable = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("DROPWATCH_TARGET_URL") {
            self.targets = vec![TargetConfig::from_url(&url)];
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !is_valid_target_id(&target.id) {
                return Err(ConfigError::InvalidTargetId(target.id.clone()));
            }
            if !seen.insert(target.id.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.id.clone()));
            }
            Url::parse(&target.url).map_err(|err| ConfigError::InvalidTargetUrl {
                id: target.id.clone(),
                reason: err.to_string(),
            })?;
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch.timeout_secs"));
        }
        if self.fetch.marker.is_some() && self.fetch.marker_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch.marker_timeout_secs"));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Zero("max_attempts"));
        }
        if self.realert_cooldown_secs == Some(0) {
            return Err(ConfigError::Zero("realert_cooldown_secs"));
        }
        self.wait.validate()?;

        self.layer_registry()?;
        self.fusion.validate(&self.layers.enabled)?;

        if self.notifier.kind == NotifierKind::Webhook && self.webhook_config().is_none() {
            return Err(ConfigError::MissingWebhookUrl);
        }
        Ok(())
    }

    pub fn target_list(&self) -> Vec<Target> {
        self.targets.iter().map(TargetConfig::to_target).collect()
    }

    pub fn layer_registry(&self) -> Result<LayerRegistry, ConfigError> {
        Ok(LayerRegistry::from_settings(
            &self.layers.settings,
            &self.layers.enabled,
            &self.layers.roles,
        )?)
    }

    pub fn marker(&self) -> Option<MarkerWait> {
        self.fetch
            .marker
            .as_ref()
            .filter(|selector| !selector.trim().is_empty())
            .map(|selector| {
                MarkerWait::new(
                    selector.trim(),
                    Duration::from_secs(self.fetch.marker_timeout_secs),
                )
            })
    }

    pub fn poll_config(&self) -> PollConfig {
        let mut acquire = AcquireOptions::default();
        acquire.headers = self.fetch.headers.clone();
        acquire.user_agent = self.fetch.user_agent.clone();
        PollConfig {
            fetch_timeout: Duration::from_secs(self.fetch.timeout_secs),
            marker: self.marker(),
            wait: self.wait.interval(),
            max_attempts: self.max_attempts,
            continuation: self.continuation,
            realert_cooldown: self.realert_cooldown_secs.map(Duration::from_secs),
            notify_retry: self.notifier.retry.policy(),
            acquire,
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        let mut config = FetcherConfig::default();
        if let Some(path) = &self.fetch.executable {
            config.executable = Some(path.clone());
        }
        config.headless = self.fetch.headless;
        config.profile_root = self.fetch.profile_root.clone();
        config.request_timeout = Duration::from_secs(self.fetch.timeout_secs);
        config
    }

    pub fn webhook_config(&self) -> Option<WebhookConfig> {
        let url = self
            .notifier
            .webhook_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())?;
        Some(WebhookConfig {
            url: url.clone(),
            token: self.notifier.token.clone(),
            timeout: Duration::from_secs(self.notifier.timeout_secs.max(1)),
        })
    }
}

fn resolve_headless_default() -> bool {
    env::var("DROPWATCH_HEADLESS")
        .map(|value| parse_headless(&value))
        .unwrap_or(true)
}

fn parse_headless(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_default()
}

fn is_valid_target_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

/// Filesystem-safe id for a bare URL: its last path segment, else its host.
pub fn target_id_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return "target".to_string();
    };
    let candidate = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(str::to_string)
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_default();
    let slug: String = candidate
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "target".to_string()
    } else {
        slug
    }
}
