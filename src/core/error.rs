//! 错误处理模块
//!
//! 定义了引擎中使用的统一错误类型。
//!
//! # 设计原则
//!
//! - 错误分类与底层 API 解耦：`Internal` 变体负责包裹原生 HRESULT
//! - 为每种错误类型提供清晰的上下文信息
//! - 支持错误链（error source）
//! - 不做任何重试：初始化错误视为配置 bug，逐层向上传播

use std::fmt;

/// 引擎统一的 Result 类型
///
/// 所有可能返回错误的函数都应该使用这个类型。
pub type Result<T> = std::result::Result<T, ForgeRenderError>;

/// ForgeRender 引擎的错误类型
///
/// 包含了引擎运行过程中可能遇到的各种错误情况。
/// 任何一个变体都不会被静默吞掉：创建期错误和每帧错误都会
/// 传播到调用链顶层，由顶层排空 D3D12 信息队列并记录日志。
#[derive(Debug)]
pub enum ForgeRenderError {
    /// 操作了无效的上下文或句柄（句柄已销毁、来自其他注册表）
    InvalidContext(String),

    /// 当前状态下不允许的操作（如在堆创建前创建视图）
    InvalidOperation(String),

    /// 参数无效（如根参数中混用采样器和 CBV/SRV 范围）
    InvalidParameter(String),

    /// 描述符堆或资源内存耗尽
    OutOfMemory(String),

    /// 原生后端调用失败，携带 HRESULT 错误码和系统错误文本
    Internal { code: i32, message: String },

    /// 配置错误
    Config(ConfigError),

    /// IO 错误
    Io(std::io::Error),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

impl fmt::Display for ForgeRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeRenderError::InvalidContext(msg) => write!(f, "Invalid context: {}", msg),
            ForgeRenderError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            ForgeRenderError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ForgeRenderError::OutOfMemory(msg) => write!(f, "Out of memory: {}", msg),
            ForgeRenderError::Internal { code, message } => {
                write!(f, "Internal error (HRESULT 0x{:08X}): {}", *code as u32, message)
            }
            ForgeRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            ForgeRenderError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ForgeRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForgeRenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for ForgeRenderError {
    fn from(err: std::io::Error) -> Self {
        ForgeRenderError::Io(err)
    }
}

impl From<ConfigError> for ForgeRenderError {
    fn from(err: ConfigError) -> Self {
        ForgeRenderError::Config(err)
    }
}

/// 原生 D3D12 错误到引擎错误的转换
///
/// HRESULT 错误码保留在 `code` 中，系统错误文本保留在 `message` 中。
#[cfg(target_os = "windows")]
impl From<windows::core::Error> for ForgeRenderError {
    fn from(err: windows::core::Error) -> Self {
        ForgeRenderError::Internal {
            code: err.code().0,
            message: err.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForgeRenderError::InvalidParameter("mixed range types".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: mixed range types");

        let err = ForgeRenderError::Internal {
            code: 0x887A0005u32 as i32, // DXGI_ERROR_DEVICE_REMOVED
            message: "device removed".to_string(),
        };
        assert!(err.to_string().contains("887A0005"));
        assert!(err.to_string().contains("device removed"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ForgeRenderError = ConfigError::FileNotFound("config.toml".to_string()).into();
        assert!(matches!(err, ForgeRenderError::Config(_)));
    }
}
