//! 图形后端模块
//!
//! 封装 D3D12 的底层实现。纯逻辑（资源记录、堆布局、根签名解析）
//! 在 `crate::renderer` 中，这里只有真正触碰设备的代码，
//! 因此整个模块只在 Windows 上编译。

#[cfg(target_os = "windows")]
pub mod dx12;

#[cfg(target_os = "windows")]
pub use dx12::{Dx12Context, Dx12Renderer};
