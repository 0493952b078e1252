use crate::{ConfigError, FromEnv, env_or_default};
use std::net::Ipv4Addr;

/// Bind address for the processor's admin HTTP surface
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromEnv for ServerConfig {
    /// Reads from environment variables:
    /// - ADMIN_HOST: defaults to 0.0.0.0
    /// - ADMIN_PORT: defaults to 8081
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("ADMIN_HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_or_default("ADMIN_PORT", "8081")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "ADMIN_PORT".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self { host, port })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 8081,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_from_env_with_defaults() {
        temp_env::with_vars(
            [("ADMIN_HOST", None::<&str>), ("ADMIN_PORT", None::<&str>)],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.address(), "0.0.0.0:8081");
            },
        );
    }

    #[test]
    fn test_server_config_from_env_with_custom_values() {
        temp_env::with_vars(
            [("ADMIN_HOST", Some("127.0.0.1")), ("ADMIN_PORT", Some("9090"))],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.host, "127.0.0.1");
                assert_eq!(config.port, 9090);
            },
        );
    }

    #[test]
    fn test_server_config_from_env_port_out_of_range() {
        temp_env::with_var("ADMIN_PORT", Some("99999"), || {
            let err = ServerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("ADMIN_PORT"));
        });
    }
}
