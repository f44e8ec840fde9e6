//! Declarative YAML configuration: cache adapters, routers and their
//! filter pipelines. Field names and `rename` tags mirror the wire
//! contract of the system this gateway replaces, including its kebab-case
//! key typo (see [`RouterConfig::access_token_request_url`]).
use std::collections::HashSet;

use serde::Deserialize;
use validator::Validate;

fn default_port() -> u16 {
    8080
}

fn default_domain() -> String {
    "http://localhost:8080".into()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GoogleSecret {
    #[serde(rename = "client-id")]
    #[validate(length(min = 1))]
    pub client_id: String,
    #[serde(rename = "client-secret")]
    #[validate(length(min = 1))]
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CacheAdapterKind {
    GoCache,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CacheAdapterConfig {
    #[validate(length(min = 1))]
    pub identifier: String,
    #[serde(rename = "type")]
    pub kind: CacheAdapterKind,
    #[serde(rename = "evict-time-hours")]
    pub evict_time_hours: u32,
    #[serde(rename = "evict-schedule-time-hours")]
    pub evict_schedule_time_hours: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RouterKind {
    ReverseProxy,
    GoogleOauth2Authorization,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UserDataSerializerKind {
    JwtUserDataSerializer,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserDataSerializerConfig {
    #[serde(rename = "type")]
    pub kind: UserDataSerializerKind,
    #[validate(length(min = 1))]
    pub secret: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    LogFilter,
    SessionFilter,
    UserAuthenticationFilter,
    CsrfFilter,
    UserDataSenderFilter,
}

/// One stage of a router's filter pipeline. Which fields apply depends on
/// [`FilterKind`]; unused fields are left `None` in the YAML document.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FilterConfig {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    #[validate(length(min = 1))]
    pub name: String,

    // LogFilter
    pub template: Option<String>,

    // SessionFilter / UserAuthenticationFilter / UserDataSenderFilter
    #[serde(rename = "cache-adapter-identifier")]
    pub cache_adapter_identifier: Option<String>,

    // SessionFilter
    #[serde(rename = "cookie-name")]
    pub cookie_name: Option<String>,
    #[serde(rename = "cookie-domain")]
    pub cookie_domain: Option<String>,
    #[serde(rename = "cookie-path")]
    pub cookie_path: Option<String>,
    #[serde(rename = "cookie-ttl-hours")]
    pub cookie_ttl_hours: Option<u32>,
    #[serde(rename = "cookie-renew-before-hours")]
    pub cookie_renew_before_hours: Option<u32>,

    // UserAuthenticationFilter
    /// Whether a missing session/identity fails the request with 401
    /// (`true`) or is logged and allowed to proceed (`false`, default).
    #[serde(default)]
    pub required: bool,
    /// When present, a missing session/identity redirects here (302)
    /// instead of either failing or passing through.
    #[serde(rename = "redirect-page")]
    pub redirect_page: Option<String>,

    // UserDataSenderFilter
    #[serde(rename = "user-data-serializer")]
    pub user_data_serializer: Option<UserDataSerializerConfig>,
    #[serde(rename = "user-data-header")]
    pub user_data_header: Option<String>,

    // CsrfFilter
    pub secret: Option<String>,
    #[serde(rename = "header-name")]
    pub header_name: Option<String>,
    #[serde(rename = "safe-methods", default)]
    pub safe_methods: HashSet<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RouterConfig {
    #[serde(rename = "target-url")]
    pub target_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: RouterKind,
    #[validate(length(min = 1))]
    pub pattern: String,
    #[serde(default)]
    #[validate(nested)]
    pub filters: Vec<FilterConfig>,
    #[serde(rename = "cache-adapter-identifier")]
    pub cache_adapter_identifier: Option<String>,
    #[serde(rename = "success-login-url")]
    pub success_login_url: Option<String>,
    /// Mirrors the upstream's own kebab-case typo ("toke", not "token")
    /// verbatim — this is a wire-format key, not prose.
    #[serde(rename = "access-toke-request-url")]
    pub access_token_request_url: Option<String>,
    #[serde(rename = "user-info-request-url")]
    pub user_info_request_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fixed public base URL this gateway is reachable at, used to build
    /// the OAuth2 `redirect_uri` (domain + router pattern). Not present
    /// in the upstream wire schema, which hardcoded `localhost:8080`;
    /// exposed here as a real setting instead.
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(rename = "google-secret")]
    #[validate(nested)]
    pub google_secret: Option<GoogleSecret>,
    #[serde(rename = "log-level", default = "default_log_level")]
    pub log_level: LogLevel,
    #[serde(default)]
    #[validate(nested)]
    pub routers: Vec<RouterConfig>,
    #[serde(rename = "cache-adapters", default)]
    #[validate(nested)]
    pub cache_adapters: Vec<CacheAdapterConfig>,
}

impl GatewayConfig {
    /// Loads the YAML file at `path`, then applies `GOOGLE_CLIENT_ID` /
    /// `GOOGLE_CLIENT_SECRET` environment overrides on top — mirroring
    /// `loadConfig()`'s `viper.BindEnv` pair rather than a generic
    /// environment-prefix source.
    pub fn load(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;
        let mut config: Self = settings.try_deserialize()?;

        if let Ok(client_id) = std::env::var("GOOGLE_CLIENT_ID") {
            config
                .google_secret
                .get_or_insert_with(|| GoogleSecret {
                    client_id: String::new(),
                    client_secret: String::new(),
                })
                .client_id = client_id;
        }
        if let Ok(client_secret) = std::env::var("GOOGLE_CLIENT_SECRET") {
            config
                .google_secret
                .get_or_insert_with(|| GoogleSecret {
                    client_id: String::new(),
                    client_secret: String::new(),
                })
                .client_secret = client_secret;
        }

        config
            .validate()
            .map_err(|e| crate::Error::ConfigInvalid(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reverse_proxy_router_with_filter_pipeline() {
        let yaml = r#"
port: 9090
log-level: debug
google-secret:
  client-id: id
  client-secret: secret
cache-adapters:
  - identifier: main
    type: go-cache
    evict-time-hours: 24
    evict-schedule-time-hours: 1
routers:
  - type: reverse-proxy
    pattern: /app/
    target-url: http://localhost:9000
    cache-adapter-identifier: main
    filters:
      - type: log-filter
        name: access-log
        template: "{{.Method}} {{.Path}}"
      - type: session-filter
        name: session
        cache-adapter-identifier: main
        cookie-name: SID
        cookie-ttl-hours: 12
        cookie-renew-before-hours: 1
      - type: user-authentication-filter
        name: auth
        cache-adapter-identifier: main
        required: true
"#;
        let config: GatewayConfig = serde_yaml_for_tests(yaml);
        config.validate().unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.routers.len(), 1);
        assert_eq!(config.routers[0].filters.len(), 3);
        assert!(config.routers[0].filters[2].required);
    }

    fn serde_yaml_for_tests(yaml: &str) -> GatewayConfig {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap();
        settings.try_deserialize().unwrap()
    }
}
