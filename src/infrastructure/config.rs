use crate::domain::{config::AppConfig, error::{LayoutLinkError, LayoutLinkResult}};
use std::path::{Path, PathBuf};
use std::fs;

const CONFIG_DIR: &str = ".layoutlink";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> LayoutLinkResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Create a configuration manager with explicit file locations
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files
    ///
    /// The global file supplies `[global]` and a fallback `[endpoint]`; a
    /// project file, when present, replaces the endpoint.
    pub fn load_config(&self) -> LayoutLinkResult<AppConfig> {
        let mut config = AppConfig::default();

        if self.global_config_path.exists() {
            config = self.load_config_from_path(&self.global_config_path)?;
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                config.endpoint = project_config.endpoint;
            }
        }

        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> LayoutLinkResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| LayoutLinkError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("layoutlink").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> LayoutLinkResult<AppConfig> {
        let content = fs::read_to_string(path).map_err(|e| LayoutLinkError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| LayoutLinkError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &AppConfig) -> LayoutLinkResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| LayoutLinkError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| LayoutLinkError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration under `path`
    pub fn init_project_config(&self, path: &Path) -> LayoutLinkResult<PathBuf> {
        let config_dir = path.join(CONFIG_DIR);
        let config_file = config_dir.join(CONFIG_FILE);

        if config_file.exists() {
            return Err(LayoutLinkError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| LayoutLinkError::Config {
            message: format!("Failed to create {} directory: {}", CONFIG_DIR, e),
        })?;

        let mut default_config = AppConfig::default();
        default_config.endpoint.host = Some("192.168.1.100".to_string());

        self.save_config_to_path(&config_file, &default_config)?;

        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::AckFlag;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ConfigManager {
        ConfigManager::with_paths(
            dir.path().join("global.toml"),
            Some(dir.path().join(CONFIG_DIR).join(CONFIG_FILE)),
        )
    }

    #[test]
    fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = manager_in(&temp_dir).load_config().unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.endpoint.port, 6464);
        assert!(config.endpoint.host().is_none());
    }

    #[test]
    fn test_init_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        let config_file = manager.init_project_config(temp_dir.path()).unwrap();
        assert!(config_file.exists());

        let config = manager.load_config().unwrap();
        assert_eq!(config.endpoint.host(), Some("192.168.1.100"));

        assert!(manager.init_project_config(temp_dir.path()).is_err());
    }

    #[test]
    fn test_project_endpoint_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        fs::write(
            temp_dir.path().join("global.toml"),
            "[global]\nlog_level = \"debug\"\n\n[endpoint]\nhost = \"10.0.0.1\"\n",
        )
        .unwrap();
        fs::create_dir_all(temp_dir.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_DIR).join(CONFIG_FILE),
            "[endpoint]\nhost = \"10.0.0.5\"\nneed_ack = \"No\"\n",
        )
        .unwrap();

        let config = manager.load_config().unwrap();
        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.endpoint.host(), Some("10.0.0.5"));
        assert_eq!(config.endpoint.need_ack, AckFlag::No);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[endpoint\nhost = ").unwrap();

        let err = manager_in(&temp_dir).load_config_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
