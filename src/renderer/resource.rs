//! 资源记录与句柄表模块
//!
//! 定义缓冲区、纹理和采样器的标签变体（tagged-variant）资源记录，
//! 以及基于 generational index 的不透明句柄表。
//!
//! # 设计原则
//!
//! - **标签变体**：`BufferKind`/`TextureKind` 在创建时选定，
//!   取代公有继承链，明确每种资源哪些字段有效
//! - **不透明句柄**：`slotmap` 提供 arena + 世代索引，
//!   句柄失效后再访问会被检测到，而不是解引用悬空指针
//! - **注册顺序稳定**：注册表按资源类别记录注册顺序，
//!   描述符堆偏移在 commit 时按这个顺序分配
//!
//! # 生命周期
//!
//! 资源在初始化阶段创建一次，常量缓冲区可以每帧更新，
//! 全部资源随上下文销毁。

use slotmap::{new_key_type, SlotMap};

use crate::core::error::{ForgeRenderError, Result};

new_key_type! {
    /// 缓冲区句柄
    pub struct BufferHandle;
    /// 纹理句柄
    pub struct TextureHandle;
    /// 采样器句柄
    pub struct SamplerHandle;
}

/// 常量缓冲区要求的对齐边界（字节）
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// 将常量缓冲区大小向上对齐到 256 字节边界
pub fn align_constant_buffer_size(size: u64) -> u64 {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// CPU 访问模式
///
/// 决定资源分配在哪种堆上，以及上传是否需要暂存拷贝。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAccess {
    /// 仅 GPU 可见；数据经由暂存缓冲区拷贝进入
    None,
    /// CPU 可写（常量缓冲区）；可以每帧重新映射写入
    Write,
}

/// 资源状态
///
/// 与后端无关的资源使用模式枚举，镜像 D3D12 的资源状态。
/// 在不兼容的用途之间必须显式转换。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// 初始/通用状态
    Common,
    /// 拷贝目标
    CopyDest,
    /// 拷贝源
    CopySource,
    /// 通用读取（上传堆资源固定在此状态）
    GenericRead,
    /// 顶点/常量缓冲区读取
    VertexAndConstantBuffer,
    /// 索引缓冲区读取
    IndexBuffer,
    /// 着色器资源读取
    ShaderResource,
    /// 渲染目标写入
    RenderTarget,
    /// 深度写入
    DepthWrite,
    /// 呈现
    Present,
}

/// 缓冲区变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// 顶点缓冲区；stride 为顶点结构体大小
    Vertex { stride: u32 },
    /// 索引缓冲区；固定 32 位无符号索引格式
    Index,
    /// 常量缓冲区；大小向上对齐到 256 字节
    Constant,
    /// 结构化缓冲区；以着色器资源方式按元素读取
    Structured { count: u32, stride: u32 },
}

/// 缓冲区记录
#[derive(Debug, Clone)]
pub struct BufferRecord {
    /// 缓冲区变体
    pub kind: BufferKind,
    /// 请求的字节大小
    pub size: u64,
    /// 实际分配大小（常量缓冲区为 256 字节对齐后的值，其余等于 size）
    pub aligned_size: u64,
    /// CPU 访问模式
    pub cpu_access: CpuAccess,
    /// 当前资源状态
    pub state: ResourceState,
    /// commit 时分配的堆槽位偏移（仅常量/结构化缓冲区）
    pub heap_offset: Option<u32>,
    /// 根签名解析时分配的着色器寄存器
    pub shader_register: Option<u32>,
}

/// 纹理像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// RGBA 8位无符号归一化
    Rgba8Unorm,
    /// BGRA 8位无符号归一化
    Bgra8Unorm,
    /// RGBA 32位浮点
    Rgba32Float,
    /// 深度 32位浮点
    Depth32Float,
}

impl TextureFormat {
    /// 每像素字节数
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => 4,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Depth32Float => 4,
        }
    }
}

/// 子资源在紧凑排列的纹理数据中的字节偏移
///
/// 立方体贴图的 6 个面按 +X、-X、+Y、-Y、+Z、-Z 顺序
/// 对应子资源 0..6，每个子资源紧凑无行对齐。
pub fn subresource_offset(
    width: u32,
    height: u32,
    format: TextureFormat,
    subresource: u32,
) -> usize {
    (width as usize) * (height as usize) * format.bytes_per_pixel() as usize * subresource as usize
}

/// 纹理变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// 2D 纹理
    Tex2D,
    /// 立方体贴图（6 个面，一个 6 层纹理数组）
    Cube,
    /// 深度目标（可以同时带 SRV，用于阴影贴图采样）
    DepthTarget,
    /// 颜色渲染目标
    ColorTarget,
}

/// 纹理拥有的视图种类
///
/// 一个纹理可以同时有多种视图，例如深度缓冲区既作为
/// 渲染目标又在之后被采样。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureViews {
    /// 着色器资源视图
    pub srv: bool,
    /// 渲染目标视图
    pub rtv: bool,
    /// 深度模板视图
    pub dsv: bool,
}

/// 纹理记录
#[derive(Debug, Clone)]
pub struct TextureRecord {
    /// 纹理变体
    pub kind: TextureKind,
    /// 宽度（像素）
    pub width: u32,
    /// 高度（像素）
    pub height: u32,
    /// 像素格式
    pub format: TextureFormat,
    /// 拥有的视图种类
    pub views: TextureViews,
    /// 当前资源状态
    pub state: ResourceState,
    /// CBV/SRV 堆中的 SRV 槽位偏移
    pub heap_offset: Option<u32>,
    /// RTV 堆中的槽位偏移
    pub rtv_offset: Option<u32>,
    /// DSV 堆中的槽位偏移
    pub dsv_offset: Option<u32>,
    /// 根签名解析时分配的着色器寄存器
    pub shader_register: Option<u32>,
}

/// 采样器过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    Point,
    Linear,
    Anisotropic,
}

/// 采样器寻址模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Clamp,
    Mirror,
    Border,
}

/// 采样器比较函数（阴影采样用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    LessEqual,
    Always,
}

/// 采样器配置
///
/// 采样器没有后备内存，只占一个描述符。
#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    /// 过滤方式
    pub filter: SamplerFilter,
    /// 寻址模式（三个轴使用同一模式）
    pub address_mode: AddressMode,
    /// 比较函数；Some 时创建比较采样器
    pub comparison: Option<CompareFunc>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: SamplerFilter::Linear,
            address_mode: AddressMode::Wrap,
            comparison: None,
        }
    }
}

/// 采样器记录
#[derive(Debug, Clone)]
pub struct SamplerRecord {
    /// 采样器配置
    pub desc: SamplerDesc,
    /// 采样器堆中的槽位偏移（独立从 0 开始）
    pub heap_offset: Option<u32>,
    /// 着色器寄存器
    pub shader_register: Option<u32>,
}

/// 资源注册表
///
/// 拥有所有资源记录，并按类别保存注册顺序。
/// 堆偏移分配、视图创建都按这里的顺序进行，保证可复现。
#[derive(Default)]
pub struct ResourceRegistry {
    buffers: SlotMap<BufferHandle, BufferRecord>,
    textures: SlotMap<TextureHandle, TextureRecord>,
    samplers: SlotMap<SamplerHandle, SamplerRecord>,

    // 各类别的注册顺序
    constant_order: Vec<BufferHandle>,
    structured_order: Vec<BufferHandle>,
    texture_order: Vec<TextureHandle>,
    cube_order: Vec<TextureHandle>,
    sampler_order: Vec<SamplerHandle>,
    render_target_order: Vec<TextureHandle>,
    depth_target_order: Vec<TextureHandle>,

    /// commit_shader_resources 是否已执行
    committed: bool,
}

impl ResourceRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个缓冲区
    ///
    /// 常量缓冲区大小会对齐到 256 字节。常量/结构化缓冲区在
    /// commit 之后注册会返回 `InvalidOperation`：描述符堆只分配
    /// 一次，不支持事后增长。
    pub fn register_buffer(
        &mut self,
        kind: BufferKind,
        size: u64,
        cpu_access: CpuAccess,
        state: ResourceState,
    ) -> Result<BufferHandle> {
        if size == 0 {
            return Err(ForgeRenderError::InvalidParameter(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let needs_descriptor = matches!(kind, BufferKind::Constant | BufferKind::Structured { .. });
        if self.committed && needs_descriptor {
            return Err(ForgeRenderError::InvalidOperation(
                "Cannot register shader-visible buffers after commit_shader_resources".to_string(),
            ));
        }

        let aligned_size = match kind {
            BufferKind::Constant => align_constant_buffer_size(size),
            _ => size,
        };

        let record = BufferRecord {
            kind,
            size,
            aligned_size,
            cpu_access,
            state,
            heap_offset: None,
            shader_register: None,
        };
        let handle = self.buffers.insert(record);

        match kind {
            BufferKind::Constant => self.constant_order.push(handle),
            BufferKind::Structured { .. } => self.structured_order.push(handle),
            _ => {}
        }

        Ok(handle)
    }

    /// 注册一个纹理
    pub fn register_texture(
        &mut self,
        kind: TextureKind,
        width: u32,
        height: u32,
        format: TextureFormat,
        views: TextureViews,
        state: ResourceState,
    ) -> Result<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(ForgeRenderError::InvalidParameter(
                "Texture dimensions must be greater than 0".to_string(),
            ));
        }

        if self.committed && views.srv {
            return Err(ForgeRenderError::InvalidOperation(
                "Cannot register shader-visible textures after commit_shader_resources".to_string(),
            ));
        }

        let record = TextureRecord {
            kind,
            width,
            height,
            format,
            views,
            state,
            heap_offset: None,
            rtv_offset: None,
            dsv_offset: None,
            shader_register: None,
        };
        let handle = self.textures.insert(record);

        if views.srv {
            match kind {
                TextureKind::Cube => self.cube_order.push(handle),
                _ => self.texture_order.push(handle),
            }
        }
        if views.rtv {
            self.render_target_order.push(handle);
        }
        if views.dsv {
            self.depth_target_order.push(handle);
        }

        Ok(handle)
    }

    /// 注册一个采样器
    pub fn register_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle> {
        if self.committed {
            return Err(ForgeRenderError::InvalidOperation(
                "Cannot register samplers after commit_shader_resources".to_string(),
            ));
        }

        let handle = self.samplers.insert(SamplerRecord {
            desc,
            heap_offset: None,
            shader_register: None,
        });
        self.sampler_order.push(handle);
        Ok(handle)
    }

    /// 查找缓冲区记录；句柄失效返回 `InvalidContext`
    pub fn buffer(&self, handle: BufferHandle) -> Result<&BufferRecord> {
        self.buffers
            .get(handle)
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale buffer handle".to_string()))
    }

    /// 查找缓冲区记录（可变）
    pub fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut BufferRecord> {
        self.buffers
            .get_mut(handle)
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale buffer handle".to_string()))
    }

    /// 查找纹理记录
    pub fn texture(&self, handle: TextureHandle) -> Result<&TextureRecord> {
        self.textures
            .get(handle)
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale texture handle".to_string()))
    }

    /// 查找纹理记录（可变）
    pub fn texture_mut(&mut self, handle: TextureHandle) -> Result<&mut TextureRecord> {
        self.textures
            .get_mut(handle)
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale texture handle".to_string()))
    }

    /// 查找采样器记录
    pub fn sampler(&self, handle: SamplerHandle) -> Result<&SamplerRecord> {
        self.samplers
            .get(handle)
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale sampler handle".to_string()))
    }

    /// 查找采样器记录（可变）
    pub fn sampler_mut(&mut self, handle: SamplerHandle) -> Result<&mut SamplerRecord> {
        self.samplers
            .get_mut(handle)
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale sampler handle".to_string()))
    }

    /// 销毁一个缓冲区；之后的句柄访问会失败
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.buffers
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| ForgeRenderError::InvalidContext("Stale buffer handle".to_string()))
    }

    /// 常量缓冲区的注册顺序
    pub fn constant_order(&self) -> &[BufferHandle] {
        &self.constant_order
    }

    /// 结构化缓冲区的注册顺序
    pub fn structured_order(&self) -> &[BufferHandle] {
        &self.structured_order
    }

    /// 2D 纹理的注册顺序
    pub fn texture_order(&self) -> &[TextureHandle] {
        &self.texture_order
    }

    /// 立方体贴图的注册顺序
    pub fn cube_order(&self) -> &[TextureHandle] {
        &self.cube_order
    }

    /// 采样器的注册顺序
    pub fn sampler_order(&self) -> &[SamplerHandle] {
        &self.sampler_order
    }

    /// 颜色渲染目标的注册顺序
    pub fn render_target_order(&self) -> &[TextureHandle] {
        &self.render_target_order
    }

    /// 深度目标的注册顺序
    pub fn depth_target_order(&self) -> &[TextureHandle] {
        &self.depth_target_order
    }

    /// commit_shader_resources 是否已执行
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// 标记注册表已 commit
    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_buffer_alignment() {
        assert_eq!(align_constant_buffer_size(1), 256);
        assert_eq!(align_constant_buffer_size(256), 256);
        assert_eq!(align_constant_buffer_size(257), 512);
        assert_eq!(align_constant_buffer_size(64), 256);
    }

    #[test]
    fn test_register_buffer_alignment() {
        let mut registry = ResourceRegistry::new();
        let handle = registry
            .register_buffer(BufferKind::Constant, 64, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();

        let record = registry.buffer(handle).unwrap();
        assert_eq!(record.size, 64);
        assert_eq!(record.aligned_size, 256);

        // 顶点缓冲区不对齐
        let handle = registry
            .register_buffer(
                BufferKind::Vertex { stride: 32 },
                100,
                CpuAccess::None,
                ResourceState::VertexAndConstantBuffer,
            )
            .unwrap();
        assert_eq!(registry.buffer(handle).unwrap().aligned_size, 100);
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut registry = ResourceRegistry::new();
        let result = registry.register_buffer(
            BufferKind::Index,
            0,
            CpuAccess::None,
            ResourceState::IndexBuffer,
        );
        assert!(matches!(result, Err(ForgeRenderError::InvalidParameter(_))));
    }

    #[test]
    fn test_stale_handle_detected() {
        let mut registry = ResourceRegistry::new();
        let handle = registry
            .register_buffer(BufferKind::Constant, 64, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();

        registry.destroy_buffer(handle).unwrap();

        // 世代索引使旧句柄失效
        assert!(matches!(
            registry.buffer(handle),
            Err(ForgeRenderError::InvalidContext(_))
        ));
        assert!(registry.destroy_buffer(handle).is_err());
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut registry = ResourceRegistry::new();
        let c0 = registry
            .register_buffer(BufferKind::Constant, 16, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();
        let s0 = registry
            .register_buffer(
                BufferKind::Structured { count: 10, stride: 32 },
                320,
                CpuAccess::None,
                ResourceState::ShaderResource,
            )
            .unwrap();
        let c1 = registry
            .register_buffer(BufferKind::Constant, 16, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();

        assert_eq!(registry.constant_order(), &[c0, c1]);
        assert_eq!(registry.structured_order(), &[s0]);
    }

    #[test]
    fn test_register_after_commit_rejected() {
        let mut registry = ResourceRegistry::new();
        registry.mark_committed();

        let result = registry.register_buffer(
            BufferKind::Constant,
            16,
            CpuAccess::Write,
            ResourceState::GenericRead,
        );
        assert!(matches!(result, Err(ForgeRenderError::InvalidOperation(_))));

        // 顶点缓冲区不占描述符，commit 之后仍可创建
        let result = registry.register_buffer(
            BufferKind::Vertex { stride: 12 },
            36,
            CpuAccess::None,
            ResourceState::VertexAndConstantBuffer,
        );
        assert!(result.is_ok());

        assert!(registry.register_sampler(SamplerDesc::default()).is_err());
    }

    #[test]
    fn test_cube_subresources_in_face_order() {
        // 6 个面按顺序排列为子资源 0..6
        let face_bytes = 4 * 4 * 4;
        for face in 0..6 {
            assert_eq!(
                subresource_offset(4, 4, TextureFormat::Rgba8Unorm, face),
                face as usize * face_bytes
            );
        }
    }

    #[test]
    fn test_texture_views() {
        let mut registry = ResourceRegistry::new();
        // 深度缓冲区同时作为渲染目标和采样源
        let handle = registry
            .register_texture(
                TextureKind::DepthTarget,
                1024,
                1024,
                TextureFormat::Depth32Float,
                TextureViews { srv: true, dsv: true, rtv: false },
                ResourceState::DepthWrite,
            )
            .unwrap();

        assert_eq!(registry.texture_order(), &[handle]);
        assert_eq!(registry.depth_target_order(), &[handle]);
        assert!(registry.render_target_order().is_empty());
    }
}
