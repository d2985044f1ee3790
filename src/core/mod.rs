//! 核心功能模块
//!
//! 本模块提供了引擎的基础功能：日志系统、配置管理、错误处理和帧时钟。
//! 这些模块独立于图形 API，可以在任何平台上编译和测试。
//!
//! # 模块组织
//!
//! - `log`：日志系统，提供结构化的日志记录功能
//! - `config`：配置管理，支持从配置文件加载引擎设置
//! - `error`：错误处理，定义统一的错误类型
//! - `clock`：帧时钟，取代全局计时器状态

pub mod clock;
pub mod config;
pub mod error;
pub mod log;

// 重新导出常用类型，方便使用
pub use clock::Clock;
pub use config::Config;
pub use error::{ForgeRenderError, Result};
