//! Configuration validation.

use super::Config;
use crate::error::{AdminError, Result};

/// Keys that name the server in a connection string.
const SERVER_KEYS: &[&str] = &["server", "data source", "address", "addr", "network address"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let conn = &config.connection;

    match &conn.connection_string {
        Some(text) => {
            let parsed = conn.connection_string()?;
            if text.trim().is_empty() || parsed.is_empty() {
                return Err(AdminError::Config(
                    "connection.connection_string must not be empty".into(),
                ));
            }
            if !SERVER_KEYS.iter().any(|k| parsed.get(k).is_some()) {
                return Err(AdminError::Config(
                    "connection.connection_string must name a Server".into(),
                ));
            }
        }
        None => {
            if conn.host.is_empty() {
                return Err(AdminError::Config(
                    "connection.host is required when no connection_string is given".into(),
                ));
            }
            if conn.user.is_empty() {
                return Err(AdminError::Config(
                    "connection.user is required when no connection_string is given".into(),
                ));
            }
            if conn.port == 0 {
                return Err(AdminError::Config("connection.port must not be 0".into()));
            }
        }
    }

    if config.admin.max_rows <= 0 {
        return Err(AdminError::Config(format!(
            "admin.max_rows must be greater than 0, got {}",
            config.admin.max_rows
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdminConfig, ConnectionConfig};
    use crate::router::BackendKind;

    fn valid_config() -> Config {
        Config {
            connection: ConnectionConfig {
                connection_string: None,
                host: "localhost".to_string(),
                port: 1433,
                user: "sa".to_string(),
                password: "password".to_string(),
                encrypt: false,
                trust_server_cert: true,
            },
            admin: AdminConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.connection.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_port() {
        let mut config = valid_config();
        config.connection.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_connection_string_replaces_discrete_fields() {
        let mut config = valid_config();
        config.connection.host = "".to_string();
        config.connection.user = "".to_string();
        config.connection.connection_string =
            Some("Server=tcp:db,1433;User Id=sa;Password=x".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_connection_string_needs_server() {
        let mut config = valid_config();
        config.connection.connection_string = Some("User Id=sa;Password=x".to_string());
        assert!(validate(&config).is_err());

        config.connection.connection_string = Some("   ".to_string());
        assert!(validate(&config).is_err());

        config.connection.connection_string = Some("Server".to_string());
        assert!(matches!(validate(&config), Err(AdminError::Config(_))));
    }

    #[test]
    fn test_max_rows_must_be_positive() {
        let mut config = valid_config();
        config.admin.max_rows = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_from_yaml_defaults() {
        let config = Config::from_yaml(
            "connection:\n  host: localhost\n  user: sa\n  password: secret\nadmin:\n  mode: orm\n",
        )
        .unwrap();
        assert_eq!(config.connection.port, 1433);
        assert!(config.connection.encrypt);
        assert_eq!(config.admin.mode, BackendKind::Mapped);
        assert_eq!(config.admin.max_rows, 100);
    }

    #[test]
    fn test_discrete_fields_build_connection_string() {
        let cs = valid_config().connection.connection_string().unwrap();
        assert_eq!(cs.get("server"), Some("tcp:localhost,1433"));
        assert_eq!(cs.get("encrypt"), Some("false"));
        assert_eq!(cs.get("trustservercertificate"), Some("true"));
    }

    #[test]
    fn test_connection_config_debug_redacts_password() {
        let mut config = valid_config();
        config.connection.password = "super_secret_password_123".to_string();
        config.connection.connection_string =
            Some("Server=.;Password=super_secret_password_456".to_string());
        let debug_output = format!("{:?}", config.connection);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(!debug_output.contains("super_secret_password_123"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }

    #[test]
    fn test_serialized_config_omits_secrets() {
        let mut config = valid_config();
        config.connection.connection_string = Some("Server=.;Password=hidden".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("password"));
        assert!(!yaml.contains("hidden"));
    }
}
