//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdminError;
    use crate::router::BackendKind;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection:").unwrap();
        writeln!(
            file,
            "  connection_string: \"Server=tcp:db,1433;Database=Sales;User Id=sa;Password=x\""
        )
        .unwrap();
        writeln!(file, "admin:").unwrap();
        writeln!(file, "  mode: mapped").unwrap();
        writeln!(file, "  max_rows: 25").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.admin.mode, BackendKind::Mapped);
        assert_eq!(config.admin.max_rows, 25);
        let cs = config.connection.connection_string().unwrap();
        assert_eq!(cs.get("database"), Some("Sales"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, AdminError::Io(_)));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connection:").unwrap();
        writeln!(file, "  host: localhost").unwrap();
        writeln!(file, "  user: sa").unwrap();
        writeln!(file, "admin:").unwrap();
        writeln!(file, "  max_rows: 0").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, AdminError::Config(_)));
    }
}
