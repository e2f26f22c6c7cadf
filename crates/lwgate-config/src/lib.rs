//! Configuration for the lwgate binary.
//!
//! Layers, lowest priority first: built-in defaults, the TOML file,
//! the deployment environment variables (`LWM2M_SERVER_IP`, `COAP_BIND_PORT`,
//! ...), then `LWGATE_`-prefixed variables (`LWGATE_SERVER__HOST`). The
//! result translates into a `lwgate_core::SessionConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lwgate_core::SessionConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,

    #[serde(default)]
    pub device: Device,

    #[serde(default)]
    pub coap: Coap,

    #[serde(default)]
    pub http: Http,
}

/// The LwM2M server to register with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Server {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".into()
}
fn default_server_port() -> u16 {
    5683
}

/// How this device identifies itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Device {
    /// Endpoint client name (`ep=`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Registration lifetime in seconds (`lt=`).
    #[serde(default = "default_lifetime")]
    pub lifetime: u32,

    /// Binding mode (`b=`).
    #[serde(default = "default_binding")]
    pub binding: String,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            lifetime: default_lifetime(),
            binding: default_binding(),
        }
    }
}

fn default_endpoint() -> String {
    "raspi5".into()
}
fn default_lifetime() -> u32 {
    lwgate_core::config::DEFAULT_LIFETIME_SECS
}
fn default_binding() -> String {
    lwgate_core::config::DEFAULT_BINDING.into()
}

/// CoAP transport tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Coap {
    /// Local UDP port. `0` picks an ephemeral port.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    #[serde(default = "default_max_retransmit")]
    pub max_retransmit: u32,

    /// Wait for a separate response after an empty ACK.
    #[serde(default = "default_exchange_lifetime_secs")]
    pub exchange_lifetime_secs: u64,
}

impl Default for Coap {
    fn default() -> Self {
        Self {
            bind_port: default_bind_port(),
            ack_timeout_ms: default_ack_timeout_ms(),
            max_retransmit: default_max_retransmit(),
            exchange_lifetime_secs: default_exchange_lifetime_secs(),
        }
    }
}

fn default_bind_port() -> u16 {
    56830
}
fn default_ack_timeout_ms() -> u64 {
    2000
}
fn default_max_retransmit() -> u32 {
    4
}
fn default_exchange_lifetime_secs() -> u64 {
    247
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Http {
    #[serde(default = "default_http_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Outer deadline for register and command requests. Unset = none.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            request_timeout_secs: None,
        }
    }
}

fn default_http_host() -> String {
    "0.0.0.0".into()
}
fn default_http_port() -> u16 {
    8080
}

// ── Environment ─────────────────────────────────────────────────────

/// Deployment variable names and the config keys they set.
pub const DEPLOYMENT_ENV: &[(&str, &str)] = &[
    ("LWM2M_SERVER_IP", "server.host"),
    ("LWM2M_SERVER_PORT", "server.port"),
    ("DEVICE_EPNAME", "device.endpoint"),
    ("HTTP_SERVER_HOST", "http.host"),
    ("HTTP_SERVER_PORT", "http.port"),
    ("COAP_BIND_PORT", "coap.bind_port"),
];

fn deployment_env() -> Env {
    Env::raw().filter_map(|key| {
        DEPLOYMENT_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
    })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "lwgate", "lwgate").map_or_else(
        || PathBuf::from("lwgate.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered figment, without extracting.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(deployment_env())
        .merge(Env::prefixed("LWGATE_").split("__"))
}

/// Load the full Config. An explicit `path` must exist; the default
/// platform path is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let config: Config = figment(&path).extract()?;
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and translate into the core session configuration.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(validation("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            return Err(validation("server.port", "must be between 1 and 65535"));
        }
        if self.device.endpoint.trim().is_empty() {
            return Err(validation("device.endpoint", "must not be empty"));
        }
        if self.device.endpoint.contains(['&', '=']) {
            return Err(validation("device.endpoint", "must not contain '&' or '='"));
        }
        if self.device.binding.is_empty()
            || !self.device.binding.chars().all(|c| "UQSTN".contains(c))
        {
            return Err(validation(
                "device.binding",
                &format!("expected letters from U, Q, S, T, N, got '{}'", self.device.binding),
            ));
        }
        if self.coap.ack_timeout_ms == 0 {
            return Err(validation("coap.ack_timeout_ms", "must be greater than zero"));
        }

        Ok(SessionConfig {
            server_host: self.server.host.trim().to_owned(),
            server_port: self.server.port,
            endpoint: self.device.endpoint.clone(),
            bind_port: self.coap.bind_port,
            lifetime_secs: self.device.lifetime,
            binding: self.device.binding.clone(),
            ack_timeout: Duration::from_millis(self.coap.ack_timeout_ms),
            max_retransmit: self.coap.max_retransmit,
            exchange_lifetime: Duration::from_secs(self.coap.exchange_lifetime_secs),
        })
    }

    /// `host:port` for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        if self.http.host.contains(':') && !self.http.host.starts_with('[') {
            format!("[{}]:{}", self.http.host, self.http.port)
        } else {
            format!("{}:{}", self.http.host, self.http.port)
        }
    }

    /// Outer deadline for register/command requests.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.http
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn validation(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    fn load(jail: &Jail) -> Result<Config, figment::Error> {
        let path = jail.directory().join("lwgate.toml");
        if !path.exists() {
            jail.create_file("lwgate.toml", "")?;
        }
        load_config(Some(&path)).map_err(|e| e.to_string().into())
    }

    #[test]
    fn defaults() {
        Jail::expect_with(|jail| {
            let config = load(jail)?;
            assert_eq!(config, Config::default());

            let session = config.session_config().unwrap();
            assert_eq!(session.server_host, "127.0.0.1");
            assert_eq!(session.server_port, 5683);
            assert_eq!(session.endpoint, "raspi5");
            assert_eq!(session.bind_port, 56830);
            assert_eq!(session.lifetime_secs, 86_400);
            assert_eq!(session.binding, "U");
            assert_eq!(session.ack_timeout, Duration::from_secs(2));
            assert_eq!(config.listen_addr(), "0.0.0.0:8080");
            assert_eq!(config.request_timeout(), None);
            Ok(())
        });
    }

    #[test]
    fn toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lwgate.toml",
                r#"
                [server]
                host = "lwm2m.example.net"

                [device]
                endpoint = "sensor-12"
                lifetime = 600

                [http]
                port = 9090
                request_timeout_secs = 15
                "#,
            )?;
            let config = load(jail)?;
            assert_eq!(config.server.host, "lwm2m.example.net");
            assert_eq!(config.server.port, 5683);
            assert_eq!(config.device.endpoint, "sensor-12");
            assert_eq!(config.device.lifetime, 600);
            assert_eq!(config.listen_addr(), "0.0.0.0:9090");
            assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
            Ok(())
        });
    }

    #[test]
    fn deployment_variables() {
        Jail::expect_with(|jail| {
            jail.set_env("LWM2M_SERVER_IP", "10.0.0.5");
            jail.set_env("LWM2M_SERVER_PORT", "5684");
            jail.set_env("DEVICE_EPNAME", "pi-kitchen");
            jail.set_env("HTTP_SERVER_HOST", "127.0.0.1");
            jail.set_env("HTTP_SERVER_PORT", "8000");
            jail.set_env("COAP_BIND_PORT", "0");

            let config = load(jail)?;
            assert_eq!(config.server.host, "10.0.0.5");
            assert_eq!(config.server.port, 5684);
            assert_eq!(config.device.endpoint, "pi-kitchen");
            assert_eq!(config.listen_addr(), "127.0.0.1:8000");
            assert_eq!(config.coap.bind_port, 0);
            Ok(())
        });
    }

    #[test]
    fn prefixed_variables_win() {
        Jail::expect_with(|jail| {
            jail.create_file("lwgate.toml", "[device]\nendpoint = \"from-file\"\n")?;
            jail.set_env("DEVICE_EPNAME", "from-deployment");
            jail.set_env("LWGATE_DEVICE__ENDPOINT", "from-prefixed");
            jail.set_env("LWGATE_COAP__MAX_RETRANSMIT", "2");

            let config = load(jail)?;
            assert_eq!(config.device.endpoint, "from-prefixed");
            assert_eq!(config.coap.max_retransmit, 2);
            Ok(())
        });
    }

    #[test]
    fn bad_port_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file("lwgate.toml", "")?;
            jail.set_env("LWM2M_SERVER_PORT", "not-a-port");
            let path = jail.directory().join("lwgate.toml");
            assert!(matches!(
                load_config(Some(&path)),
                Err(ConfigError::Figment(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/lwgate.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.device.binding = "X".into();
        assert!(matches!(
            config.session_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "device.binding"
        ));

        let mut config = Config::default();
        config.device.endpoint = "a&b".into();
        assert!(config.session_config().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.session_config().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[server]"));
        assert!(toml.contains("endpoint = \"raspi5\""));
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
