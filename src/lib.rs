//! ForgeRender - D3D12 资源与描述符绑定引擎
//!
//! 调用方声明缓冲区、纹理、采样器和根签名结构，
//! 描述符堆布局、着色器寄存器编号和 CPU/GPU 同步由引擎接管。
//!
//! # 模块组织
//!
//! - `core`：日志、配置、错误处理、帧时钟
//! - `renderer`：与后端无关的纯逻辑（资源记录、堆布局规划、
//!   根签名解析、帧同步节拍）
//! - `gfx`：D3D12 后端（仅 Windows）
//! - `geometry`：内置几何体与顶点布局

pub mod core;
pub mod geometry;
pub mod gfx;
pub mod renderer;

pub use crate::core::{Clock, Config, ForgeRenderError, Result};
pub use crate::renderer::{
    BufferHandle, DescriptorRange, RangeEntry, RangeKind, ResourceRegistry, RootParameter,
    RootSignatureDesc, SamplerDesc, SamplerHandle, TextureHandle,
};

#[cfg(target_os = "windows")]
pub use crate::gfx::Dx12Renderer;
