//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::search::engine::DEFAULT_TOLERANCE;
use crate::search::snippet::DEFAULT_SNIPPET_LENGTH;

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    pub database: DatabaseConfig,
    /// Search configuration / 搜索配置
    pub search: SearchConfig,
    /// Paperless-ngx configuration / Paperless配置
    pub paperless: PaperlessConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Main database file path (relative to data_dir) / 主数据库文件路径
    pub db_file: String,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result count / 默认结果数
    pub results_limit: usize,
    /// Hard ceiling for requested limits / 结果数上限
    pub max_results: usize,
    /// Trigram similarity threshold / 相似度阈值
    pub tolerance: f32,
    /// Default suggestion count / 默认联想数
    pub suggest_limit: usize,
    pub max_suggestions: usize,
    /// Snippet length in characters / 摘要长度
    pub snippet_length: usize,
}

/// Paperless-ngx configuration / Paperless配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperlessConfig {
    pub base_url: String,
    pub api_token: String,
    /// Request timeout in seconds / 请求超时（秒）
    pub timeout_secs: u64,
    /// Documents per page during full sync / 同步分页大小
    pub sync_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "abe_portal.db".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_limit: 50,
            max_results: 100,
            tolerance: DEFAULT_TOLERANCE,
            suggest_limit: 10,
            max_suggestions: 20,
            snippet_length: DEFAULT_SNIPPET_LENGTH,
        }
    }
}

impl Default for PaperlessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: String::new(),
            timeout_secs: 30,
            sync_page_size: 100,
        }
    }
}

impl SearchConfig {
    /// Requested result count, defaulted and clamped to `1..=max_results` / 结果数
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.results_limit)
            .clamp(1, self.max_results.max(1))
    }

    /// Requested suggestion count, defaulted and capped / 联想数
    pub fn clamp_suggestions(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.suggest_limit)
            .min(self.max_suggestions)
    }
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Database URL, `DATABASE_URL` wins over the configured file / 环境变量优先
    pub fn database_url_with_env(&self) -> String {
        std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.get_database_url())
    }

    /// Apply environment overrides for secrets / 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("PAPERLESS_API_TOKEN") {
            if !token.is_empty() {
                self.paperless.api_token = token;
            }
        }
        if let Ok(url) = std::env::var("PAPERLESS_BASE_URL") {
            if !url.is_empty() {
                self.paperless.base_url = url;
            }
        }
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    let mut config = load_config_from(&get_config_path())?;
    config.apply_env_overrides();
    Ok(config)
}

/// Load configuration from an explicit path / 从指定路径加载配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.get_bind_address(), "0.0.0.0:8000");
        assert_eq!(config.search.results_limit, 50);
        assert_eq!(config.search.tolerance, 0.8);
        assert_eq!(config.paperless.sync_page_size, 100);
        assert!(config.get_database_url().starts_with("sqlite:data"));
        assert!(config.get_database_url().ends_with("abe_portal.db?mode=rwc"));
    }

    #[test]
    fn test_first_run_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = load_config_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(load_config_from(&path).unwrap(), created);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}, "search": {"tolerance": 0.5}}"#).unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.search.tolerance, 0.5);
        assert_eq!(config.search.max_results, 100);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn test_limits() {
        let search = SearchConfig::default();
        assert_eq!(search.clamp_limit(None), 50);
        assert_eq!(search.clamp_limit(Some(0)), 1);
        assert_eq!(search.clamp_limit(Some(500)), 100);
        assert_eq!(search.clamp_suggestions(None), 10);
        assert_eq!(search.clamp_suggestions(Some(50)), 20);
    }
}
