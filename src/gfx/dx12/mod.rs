//! DirectX 12 后端实现
//!
//! # 主要组件
//!
//! - `Dx12Context`：设备、命令队列、交换链、命令列表等核心对象
//! - `Dx12Renderer`：面向调用方的渲染器，实现资源创建、
//!   描述符提交、根签名构建和帧录制
//!
//! # 初始化流程
//!
//! 1. 启用调试层（Debug 模式）
//! 2. 创建 DXGI 工厂和 D3D12 设备（可选 WARP 软件适配器）
//! 3. 创建命令队列、交换链、RTV/DSV 堆
//! 4. 创建命令分配器、命令列表和同步对象

pub mod context;
pub mod descriptor;
pub mod pipeline;
pub mod renderer;
pub mod root_signature;
pub mod sync;
pub mod upload;

pub use context::Dx12Context;
pub use descriptor::{DescriptorHeap, HeapKind};
pub use pipeline::ShaderProgram;
pub use renderer::Dx12Renderer;
pub use root_signature::Dx12RootSignature;
pub use sync::GpuFence;
