//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TollgateError};
use crate::ratelimit::{BandwidthLimit, TimeUnit};

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitProperties,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Root rate limiting configuration.
///
/// Loaded once at startup and treated as read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitProperties {
    /// Global switch; when false no strategy is enforced
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// AUTH strategy configuration
    #[serde(default)]
    pub auth: AuthLimitProperties,

    /// BUSINESS strategy configuration
    #[serde(default)]
    pub business: BusinessLimitProperties,

    /// Bucket cache housekeeping
    #[serde(default)]
    pub cache: CacheProperties,
}

impl Default for RateLimitProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: AuthLimitProperties::default(),
            business: BusinessLimitProperties::default(),
            cache: CacheProperties::default(),
        }
    }
}

/// Limits applied to authentication endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthLimitProperties {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path prefixes treated as AUTH-strategy endpoints
    #[serde(default = "default_auth_endpoints")]
    pub endpoints: Vec<String>,

    /// Stacked limits shared by every AUTH caller
    #[serde(default = "default_auth_bandwidths")]
    pub bandwidths: Vec<BandwidthLimit>,
}

impl Default for AuthLimitProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoints: default_auth_endpoints(),
            bandwidths: default_auth_bandwidths(),
        }
    }
}

fn default_auth_endpoints() -> Vec<String> {
    vec![
        "/api/auth/login".to_string(),
        "/api/auth/register".to_string(),
        "/api/auth/refresh".to_string(),
    ]
}

fn default_auth_bandwidths() -> Vec<BandwidthLimit> {
    vec![
        BandwidthLimit::per("auth-per-minute", 5, TimeUnit::Minute),
        BandwidthLimit::per("auth-per-hour", 50, TimeUnit::Hour),
    ]
}

/// Limits applied to general API usage, one per pricing plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessLimitProperties {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Plan name (case-insensitive) to its limit
    #[serde(default = "default_plans")]
    pub plans: HashMap<String, BandwidthLimit>,
}

impl Default for BusinessLimitProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            plans: default_plans(),
        }
    }
}

fn default_plans() -> HashMap<String, BandwidthLimit> {
    HashMap::from([
        (
            "free".to_string(),
            BandwidthLimit::per("free", 3, TimeUnit::Minute),
        ),
        (
            "basic".to_string(),
            BandwidthLimit::per("basic", 5, TimeUnit::Minute),
        ),
        (
            "professional".to_string(),
            BandwidthLimit::per("professional", 10, TimeUnit::Minute),
        ),
    ])
}

/// Eviction settings for idle buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheProperties {
    /// Buckets untouched for this long (and fully refilled) are evicted; 0 disables eviction
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// How often the sweeper scans the cache
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheProperties {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheProperties {
    /// The idle TTL, or `None` when eviction is disabled.
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_secs > 0).then(|| Duration::from_secs(self.idle_ttl_secs))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn default_idle_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl RateLimitProperties {
    /// Check every configured bandwidth limit.
    ///
    /// An empty AUTH list is not rejected here; it surfaces as a configuration
    /// error when the AUTH bucket is first built.
    pub fn validate(&self) -> Result<()> {
        for bandwidth in &self.auth.bandwidths {
            bandwidth.validate()?;
        }
        // Plans are looked up case-insensitively.
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for (plan, bandwidth) in &self.business.plans {
            if plan.trim().is_empty() {
                return Err(TollgateError::Config("plan names must not be blank".to_string()));
            }
            if let Some(other) = seen.insert(plan.to_lowercase(), plan) {
                let (first, second) = if other < plan.as_str() {
                    (other, plan.as_str())
                } else {
                    (plan.as_str(), other)
                };
                return Err(TollgateError::Config(format!(
                    "plan names '{first}' and '{second}' differ only by case"
                )));
            }
            bandwidth.validate()?;
        }
        Ok(())
    }
}

impl TollgateConfig {
    /// Load configuration from a YAML file, with `TOLLGATE__*` environment
    /// variables layered on top.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(config::Environment::with_prefix("TOLLGATE").separator("__"))
            .build()
            .map_err(|e| TollgateError::Config(e.to_string()))?;

        let config: TollgateConfig = settings
            .try_deserialize()
            .map_err(|e| TollgateError::Config(e.to_string()))?;
        config.rate_limit.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TollgateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.rate_limit.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_configuration() {
        let config = TollgateConfig::default();
        let rate_limit = &config.rate_limit;

        assert!(rate_limit.enabled);
        assert_eq!(rate_limit.auth.bandwidths[0].capacity, 5);
        assert_eq!(rate_limit.auth.bandwidths[0].refill_unit, TimeUnit::Minute);
        assert_eq!(rate_limit.business.plans["free"].capacity, 3);
        assert_eq!(rate_limit.business.plans["basic"].capacity, 5);
        assert_eq!(rate_limit.business.plans["professional"].capacity, 10);
        assert!(rate_limit.validate().is_ok());
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
server:
  http_addr: "0.0.0.0:9000"
rate_limit:
  enabled: true
  auth:
    enabled: true
    endpoints: ["/login"]
    bandwidths:
      - name: per-minute
        capacity: 2
        refill_tokens: 2
        refill_unit: minute
  business:
    enabled: false
    plans:
      Gold:
        capacity: 100
        refill_tokens: 100
        refill_unit: hour
  cache:
    idle_ttl_secs: 0
"#;
        let config = TollgateConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.rate_limit.auth.endpoints, vec!["/login".to_string()]);
        assert_eq!(config.rate_limit.auth.bandwidths.len(), 1);
        assert!(!config.rate_limit.business.enabled);
        assert_eq!(config.rate_limit.business.plans["Gold"].capacity, 100);
        assert_eq!(config.rate_limit.cache.idle_ttl(), None);
        assert_eq!(config.rate_limit.cache.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = TollgateConfig::from_yaml("server: {}").unwrap();
        assert_eq!(config.server.http_addr, default_http_addr());
        assert_eq!(config.rate_limit.auth.endpoints.len(), 3);
        assert_eq!(config.rate_limit.business.plans.len(), 3);
    }

    #[test]
    fn test_invalid_bandwidth_rejected_on_load() {
        let yaml = r#"
rate_limit:
  auth:
    bandwidths:
      - name: broken
        capacity: 0
        refill_tokens: 1
        refill_unit: second
"#;
        let err = TollgateConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TollgateError::InvalidBandwidth { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = TollgateConfig::from_yaml("rate_limit: [").unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }

    #[test]
    fn test_plan_names_differing_by_case_rejected() {
        let yaml = r#"
rate_limit:
  business:
    plans:
      Free:
        capacity: 3
        refill_tokens: 3
        refill_unit: minute
      free:
        capacity: 300
        refill_tokens: 300
        refill_unit: minute
"#;
        let err = TollgateConfig::from_yaml(yaml).unwrap_err();
        match err {
            TollgateError::Config(message) => {
                assert!(message.contains("'Free'"), "{message}");
                assert!(message.contains("'free'"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_file_layers_environment_over_file() {
        let path = std::env::temp_dir().join(format!("tollgate-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
server:
  http_addr: "127.0.0.1:9100"
rate_limit:
  enabled: true
  business:
    plans:
      Gold:
        capacity: 100
        refill_tokens: 100
        refill_unit: hour
"#,
        )
        .unwrap();

        // Only this test reads TOLLGATE__* variables.
        std::env::set_var("TOLLGATE__RATE_LIMIT__ENABLED", "false");
        let loaded = TollgateConfig::from_file(&path);
        std::env::remove_var("TOLLGATE__RATE_LIMIT__ENABLED");
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.server.http_addr.port(), 9100);
        assert!(!config.rate_limit.enabled);
        // Keys pass through the config crate lower-cased.
        let plans: Vec<_> = config.rate_limit.business.plans.keys().cloned().collect();
        assert_eq!(plans, vec!["gold".to_string()]);
        assert_eq!(config.rate_limit.business.plans["gold"].capacity, 100);
    }

    #[test]
    fn test_from_file_missing_file_is_config_error() {
        let path = std::env::temp_dir().join(format!("tollgate-missing-{}.yaml", uuid::Uuid::new_v4()));
        let err = TollgateConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));
    }
}
