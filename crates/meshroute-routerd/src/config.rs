//! Daemon configuration

use std::path::{Path, PathBuf};

use meshroute_common::{RouteMgrError, RouteMgrResult};
use meshroute_types::IpPrefix;
use serde::{Deserialize, Serialize};

/// Default location of the daemon configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/meshroute/routerd.json";

/// Default location of the desired route set
pub const DEFAULT_ROUTES_PATH: &str = "/etc/meshroute/routes.json";

/// routerd configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterdConfig {
    /// Tunnel interface routed traffic arrives on
    pub interface: InterfaceConfig,

    /// JSON file holding the desired route set
    pub routes_file: PathBuf,

    /// Seconds between two reconciliation cycles
    pub poll_interval_secs: u64,

    /// Log firewall commands instead of executing them
    pub dry_run: bool,
}

impl Default for RouterdConfig {
    fn default() -> Self {
        Self {
            interface: InterfaceConfig::default(),
            routes_file: PathBuf::from(DEFAULT_ROUTES_PATH),
            poll_interval_secs: 5,
            dry_run: false,
        }
    }
}

/// Tunnel interface configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub name: String,
    pub address: Option<IpPrefix>,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: "wt0".to_string(),
            address: None,
        }
    }
}

impl RouterdConfig {
    /// Load configuration from file, falling back to defaults when the file
    /// does not exist
    pub fn load(path: &Path) -> RouteMgrResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| RouteMgrError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RouteMgrError::invalid_config(path.display().to_string(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RouteMgrResult<()> {
        if self.interface.name.trim().is_empty() {
            return Err(RouteMgrError::invalid_config(
                "interface.name",
                "must not be empty",
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(RouteMgrError::invalid_config(
                "poll_interval_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RouterdConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, RouterdConfig::default());
        assert_eq!(config.interface.name, "wt0");
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"interface": {{"name": "mesh0", "address": "100.64.0.1/16"}}, "dry_run": true}}"#
        )
        .unwrap();

        let config = RouterdConfig::load(file.path()).unwrap();
        assert_eq!(config.interface.name, "mesh0");
        assert_eq!(
            config.interface.address,
            Some("100.64.0.1/16".parse().unwrap())
        );
        assert!(config.dry_run);
        assert_eq!(config.routes_file, PathBuf::from(DEFAULT_ROUTES_PATH));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"poll_interval_secs": 0}}"#).unwrap();
        let err = RouterdConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"interface": {{"name": " "}}}}"#).unwrap();
        assert!(RouterdConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            RouterdConfig::load(file.path()),
            Err(RouteMgrError::InvalidConfig { .. })
        ));
    }
}
