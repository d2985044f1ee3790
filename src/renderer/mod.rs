//! 渲染器与后端无关的部分
//!
//! 这些模块只处理纯逻辑：资源记录与句柄、描述符堆布局规划、
//! 根签名解析、帧同步节拍。它们在任何平台上编译和测试，
//! D3D12 后端（`crate::gfx`）在其上实现真正的设备操作。

pub mod binding;
pub mod layout;
pub mod resource;
pub mod sync;

pub use binding::{DescriptorRange, RangeEntry, RangeKind, RootParameter, RootSignatureDesc};
pub use resource::{
    BufferHandle, BufferKind, CpuAccess, ResourceRegistry, SamplerDesc, SamplerHandle,
    TextureFormat, TextureHandle, TextureKind,
};
pub use sync::{FramePacer, FRAME_COUNT};
