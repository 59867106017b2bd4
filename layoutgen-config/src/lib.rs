use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "LAYOUTGEN_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub output: OutputConfig,
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

    /// 自动发现配置文件：优先读取环境变量 `LAYOUTGEN_CONFIG`，否则寻找 `./config/default.toml`。
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

/// 生成阶段的上限与缺省值。
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "GenerationConfig::default_max_entities")]
    pub max_entities: usize,
    #[serde(default = "GenerationConfig::default_max_mesh_vertices")]
    pub max_mesh_vertices: usize,
    #[serde(default = "GenerationConfig::default_streaming_threshold")]
    pub streaming_threshold: u64,
    #[serde(default = "GenerationConfig::default_detail_limit")]
    pub detail_limit: usize,
    #[serde(default = "GenerationConfig::default_layer_color")]
    pub default_layer_color: i16,
}

impl GenerationConfig {
    fn default_max_entities() -> usize {
        10_000
    }

    fn default_max_mesh_vertices() -> usize {
        50_000
    }

    fn default_streaming_threshold() -> u64 {
        1_048_576
    }

    fn default_detail_limit() -> usize {
        50
    }

    fn default_layer_color() -> i16 {
        7
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_entities: Self::default_max_entities(),
            max_mesh_vertices: Self::default_max_mesh_vertices(),
            streaming_threshold: Self::default_streaming_threshold(),
            detail_limit: Self::default_detail_limit(),
            default_layer_color: Self::default_layer_color(),
        }
    }
}

/// 临时产物的目录、命名与分块读取大小。
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
    #[serde(default = "OutputConfig::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "OutputConfig::default_filename_prefix")]
    pub filename_prefix: String,
}

impl OutputConfig {
    fn default_chunk_size() -> usize {
        64 * 1024
    }

    fn default_filename_prefix() -> String {
        "layout".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_dir: None,
            chunk_size: Self::default_chunk_size(),
            filename_prefix: Self::default_filename_prefix(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.generation.max_entities, 10_000);
        assert_eq!(cfg.generation.max_mesh_vertices, 50_000);
        assert_eq!(cfg.generation.streaming_threshold, 1_048_576);
        assert_eq!(cfg.generation.detail_limit, 50);
        assert_eq!(cfg.generation.default_layer_color, 7);
        assert!(cfg.output.artifact_dir.is_none());
        assert_eq!(cfg.output.chunk_size, 65_536);
        assert_eq!(cfg.output.filename_prefix, "layout");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [generation]
            max_entities = 500
            streaming_threshold = 4096

            [output]
            artifact_dir = "/tmp/layoutgen-test"
            chunk_size = 1024
            "#
        )
        .expect("write temp config");

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.generation.max_entities, 500);
        assert_eq!(cfg.generation.streaming_threshold, 4096);
        assert_eq!(cfg.generation.max_mesh_vertices, 50_000);
        assert_eq!(
            cfg.output.artifact_dir.as_deref(),
            Some(Path::new("/tmp/layoutgen-test"))
        );
        assert_eq!(cfg.output.chunk_size, 1024);
        assert_eq!(cfg.output.filename_prefix, "layout");
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[generation]\nmax_entities = \"many\"").expect("write temp config");
        let err = AppConfig::from_file(file.path()).expect_err("parse should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).expect_err("read should fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
