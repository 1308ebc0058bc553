use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use school::relay::WorkflowConfig;
use school::token::TokenConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct JwtSettings {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            expire_secs: default_expire_secs(),
            issuer: default_issuer(),
        }
    }
}

impl JwtSettings {
    pub fn into_config(self) -> TokenConfig {
        TokenConfig {
            secret: self.secret,
            expire: Duration::from_secs(self.expire_secs),
            issuer: self.issuer,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub workflow_id: String,
    /// Delay between chunks written to the chat client; 0 disables it
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            workflow_id: String::new(),
            pacing_ms: default_pacing_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WorkflowSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn into_config(self) -> WorkflowConfig {
        WorkflowConfig {
            url: self.url,
            token: self.token,
            workflow_id: self.workflow_id,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub jwt: JwtSettings,
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::load()?;
        settings.validate()?;
        Ok(settings)
    }

    fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(
                Environment::with_prefix("SCHOOL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                match &err {
                    config::ConfigError::NotFound(field) => Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    }),
                    _ => Err(ConfigError::Other(err)),
                }
            }
        }
    }

    /// Fields with no sensible default must come from the environment.
    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("jwt.secret", &self.jwt.secret),
            ("workflow.url", &self.workflow.url),
            ("workflow.token", &self.workflow.token),
            ("workflow.workflow_id", &self.workflow.workflow_id),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ConfigError::MissingEnvVar {
                env_var: to_env_var(field),
            }),
            None => Ok(()),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_expire_secs() -> u64 {
    24 * 60 * 60
}

fn default_issuer() -> String {
    "smart-school".to_string()
}

fn default_pacing_ms() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    600
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("SCHOOL_") {
                env::remove_var(&key);
            }
        }
    }

    fn set_required() {
        env::set_var("SCHOOL_JWT__SECRET", "test-secret");
        env::set_var("SCHOOL_WORKFLOW__URL", "http://localhost:9999/run");
        env::set_var("SCHOOL_WORKFLOW__TOKEN", "pat_test");
        env::set_var("SCHOOL_WORKFLOW__WORKFLOW_ID", "7000000000000000001");
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        set_required();

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.jwt.expire_secs, 86400);
        assert_eq!(settings.jwt.issuer, "smart-school");
        assert_eq!(settings.workflow.pacing(), Duration::from_millis(10));

        let workflow = settings.workflow.into_config();
        assert_eq!(workflow.url, "http://localhost:9999/run");
        assert_eq!(workflow.token, "pat_test");
        assert_eq!(workflow.workflow_id, "7000000000000000001");
        assert_eq!(workflow.timeout, Duration::from_secs(600));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        set_required();
        env::set_var("SCHOOL_SERVER__PORT", "8080");
        env::set_var("SCHOOL_JWT__EXPIRE_SECS", "60");
        env::set_var("SCHOOL_WORKFLOW__PACING_MS", "0");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert!(settings.workflow.pacing().is_zero());

        let jwt = settings.jwt.into_config();
        assert_eq!(jwt.secret, "test-secret");
        assert_eq!(jwt.expire, Duration::from_secs(60));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_workflow_token() {
        clean_env();
        set_required();
        env::remove_var("SCHOOL_WORKFLOW__TOKEN");

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "SCHOOL_WORKFLOW__TOKEN")
            }
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_jwt_secret_reported_first() {
        clean_env();

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "SCHOOL_JWT__SECRET")
            }
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");

        let bad = ServerSettings {
            host: "not a host".to_string(),
            port: 3000,
        };
        assert!(bad.socket_addr().is_err());
    }
}
