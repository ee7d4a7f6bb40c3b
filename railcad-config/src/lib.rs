use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。取代原工具脚本顶部的"配置区"常量：
/// 所有入口按值接收本结构，不读取任何进程级可变状态。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rails: RailConfig,
    #[serde(default)]
    pub crossing: CrossingConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub connect: ConnectConfig,
    #[serde(default)]
    pub rooms: RoomConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            rails: RailConfig::default(),
            crossing: CrossingConfig::default(),
            annotation: AnnotationConfig::default(),
            connect: ConnectConfig::default(),
            rooms: RoomConfig::default(),
        }
    }
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

    /// 自动发现配置文件：优先读取环境变量 `RAILCAD_CONFIG`，
    /// 否则寻找 `./config/default.toml`。若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("RAILCAD_CONFIG") {
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

/// 铁路中心线设置：图层到里程起点偏置（米）的映射，以及
/// 端点连接容差（图纸单位，默认 1 毫米）。
#[derive(Debug, Clone, Deserialize)]
pub struct RailConfig {
    #[serde(default = "RailConfig::default_layers")]
    pub layers: BTreeMap<String, f64>,
    #[serde(default = "RailConfig::default_epsilon")]
    pub epsilon: f64,
}

impl RailConfig {
    fn default_layers() -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("dl1".to_string(), 56_700.0),
            ("dl2".to_string(), 74_900.0),
            ("dl3".to_string(), 100_000.0),
            ("dl4".to_string(), 125_000.0),
            ("dl5".to_string(), 156_000.0),
            ("dl6".to_string(), 163_300.0),
        ])
    }

    fn default_epsilon() -> f64 {
        0.001
    }
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            layers: Self::default_layers(),
            epsilon: Self::default_epsilon(),
        }
    }
}

/// 电力交叉设置：跨越要素图层前缀与备注分隔符。
#[derive(Debug, Clone, Deserialize)]
pub struct CrossingConfig {
    #[serde(default = "CrossingConfig::default_layer_prefix")]
    pub layer_prefix: String,
    #[serde(default = "CrossingConfig::default_remark_separator")]
    pub remark_separator: String,
}

impl CrossingConfig {
    fn default_layer_prefix() -> String {
        "电力".to_string()
    }

    fn default_remark_separator() -> String {
        "--".to_string()
    }
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self {
            layer_prefix: Self::default_layer_prefix(),
            remark_separator: Self::default_remark_separator(),
        }
    }
}

/// 标注设置：标注线段长度（米）与输出图层。
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    #[serde(default = "AnnotationConfig::default_length")]
    pub length: f64,
    #[serde(default = "AnnotationConfig::default_layer")]
    pub layer: String,
}

impl AnnotationConfig {
    fn default_length() -> f64 {
        1_000.0
    }

    fn default_layer() -> String {
        "标注".to_string()
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            length: Self::default_length(),
            layer: Self::default_layer(),
        }
    }
}

/// 连接线设置：输出图层与固定目标坐标。
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectConfig {
    #[serde(default = "ConnectConfig::default_layer")]
    pub layer: String,
    #[serde(default = "ConnectConfig::default_target")]
    pub target: [f64; 2],
}

impl ConnectConfig {
    fn default_layer() -> String {
        "连接线".to_string()
    }

    fn default_target() -> [f64; 2] {
        [553_263.2769, 3_430_423.5097]
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            layer: Self::default_layer(),
            target: Self::default_target(),
        }
    }
}

/// 房屋拆迁图层设置。
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    #[serde(default = "RoomConfig::default_layer")]
    pub layer: String,
}

impl RoomConfig {
    fn default_layer() -> String {
        "房屋拆迁".to_string()
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            layer: Self::default_layer(),
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
    fn builtin_defaults_are_complete() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.rails.layers.len(), 6);
        assert_eq!(cfg.rails.layers.get("dl1"), Some(&56_700.0));
        assert_eq!(cfg.rails.layers.get("dl6"), Some(&163_300.0));
        assert!((cfg.rails.epsilon - 0.001).abs() < f64::EPSILON);
        assert_eq!(cfg.crossing.layer_prefix, "电力");
        assert_eq!(cfg.crossing.remark_separator, "--");
        assert!((cfg.annotation.length - 1_000.0).abs() < f64::EPSILON);
        assert_eq!(cfg.annotation.layer, "标注");
        assert_eq!(cfg.connect.layer, "连接线");
        assert_eq!(cfg.rooms.layer, "房屋拆迁");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [rails]
            epsilon = 0.01

            [rails.layers]
            k1 = 0.0
            k2 = 12500.0

            [crossing]
            layer_prefix = "PWR"
            remark_separator = "_"

            [annotation]
            length = 250.0
            layer = "ANNOT"

            [connect]
            layer = "LINK"
            target = [100.0, 200.0]

            [rooms]
            layer = "DEMO"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.rails.layers.len(), 2);
        assert_eq!(cfg.rails.layers.get("k2"), Some(&12_500.0));
        assert!((cfg.rails.epsilon - 0.01).abs() < f64::EPSILON);
        assert_eq!(cfg.crossing.layer_prefix, "PWR");
        assert_eq!(cfg.crossing.remark_separator, "_");
        assert!((cfg.annotation.length - 250.0).abs() < f64::EPSILON);
        assert_eq!(cfg.annotation.layer, "ANNOT");
        assert_eq!(cfg.connect.layer, "LINK");
        assert_eq!(cfg.connect.target, [100.0, 200.0]);
        assert_eq!(cfg.rooms.layer, "DEMO");
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "warn"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.rails.layers.len(), 6);
        assert_eq!(cfg.annotation.layer, "标注");
    }
}
