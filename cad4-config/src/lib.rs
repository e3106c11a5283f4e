use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cad4_core::CoordinateSystem;
use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "CAD4_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `CAD4_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 读取选项：输入编码与目标坐标系。未给出目标时保持文件自身的坐标系，不做转换。
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "ReaderConfig::default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub target: Option<CoordinateSystem>,
}

impl ReaderConfig {
    fn default_encoding() -> String {
        "utf-8".to_string()
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            encoding: Self::default_encoding(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub control_points: Option<PathBuf>,
    #[serde(default = "ProjectionConfig::default_min_span")]
    pub min_span: f64,
}

impl ProjectionConfig {
    fn default_min_span() -> f64 {
        20_000.0
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            control_points: None,
            min_span: Self::default_min_span(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
