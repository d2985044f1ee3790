//! 配置管理模块
//!
//! 提供引擎配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//! title = "ForgeRender"
//!
//! [graphics]
//! vsync = true
//! clear_color = [0.0, 0.2, 0.4, 1.0]
//! use_warp = false
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 引擎配置
///
/// 包含了引擎运行所需的所有配置项。
/// 可以从配置文件加载，也可以通过代码构建。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    pub window: WindowConfig,

    /// 图形配置
    pub graphics: GraphicsConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,
}

/// 图形配置
///
/// 引擎只支持一个后端（DirectX 12）和双缓冲呈现，
/// 所以这里没有后端选择项。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 帧缓冲清除颜色 (RGBA)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// 是否使用 WARP 软件适配器（调试用）
    #[serde(default)]
    pub use_warp: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_title() -> String { "ForgeRender".to_string() }
fn default_vsync() -> bool { true }
fn default_clear_color() -> [f32; 4] { [0.0, 0.2, 0.4, 1.0] }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_file() -> String { "forge_render.log".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            graphics: GraphicsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: default_vsync(),
            clear_color: default_clear_color(),
            use_warp: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// # 说明
    ///
    /// 支持的参数：
    /// - `--warp`: 使用 WARP 软件适配器
    /// - `--width <value>`: 设置窗口宽度
    /// - `--height <value>`: 设置窗口高度
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--warp") {
            self.graphics.use_warp = true;
        }

        if let Some(idx) = args.iter().position(|a| a == "--width") {
            if let Some(width_str) = args.get(idx + 1) {
                if let Ok(width) = width_str.parse() {
                    self.window.width = width;
                }
            }
        }

        if let Some(idx) = args.iter().position(|a| a == "--height") {
            if let Some(height_str) = args.get(idx + 1) {
                if let Ok(height) = height_str.parse() {
                    self.window.height = height;
                }
            }
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        for component in self.graphics.clear_color {
            if !(0.0..=1.0).contains(&component) {
                return Err(ConfigError::InvalidValue {
                    field: "graphics.clear_color".to_string(),
                    reason: "Color components must be in [0, 1]".to_string(),
                }.into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert!(config.graphics.vsync);
        assert!(!config.graphics.use_warp);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        config.window.width = 800;
        config.graphics.clear_color = [0.0, 0.0, 2.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["--warp", "--width", "1920", "--height", "1080"]);
        assert!(config.graphics.use_warp);
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 1080);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [window]
            width = 640
            height = 480

            [graphics]
            vsync = false

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.window.width, 640);
        assert!(!config.graphics.vsync);
        assert_eq!(config.logging.level, LogLevel::Debug);
        // 未给出的字段使用默认值
        assert_eq!(config.window.title, "ForgeRender");
    }
}
