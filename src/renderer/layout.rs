//! 描述符堆布局规划模块
//!
//! 把"给每个资源分配哪个堆槽位"从运行中的可变计数器里剥离出来，
//! 变成一个纯函数：输入注册表，输出每个句柄的堆偏移。
//!
//! # 设计原则
//!
//! - **纯分配**：规划器不持有状态；同一注册序列永远产出相同布局，
//!   可以在没有设备的环境里单独测试
//! - **一次成型**：每种堆按当前需求分配一次；commit 之后注册
//!   新的着色器可见资源是错误，不做静默扩容
//! - **空堆跳过**：某类描述符数量为 0 时不创建该堆，
//!   绑定代码必须容忍缺失的堆
//!
//! # 堆类别
//!
//! - CBV、SRV、UAV 共用一个着色器可见堆
//! - 采样器使用独立的着色器可见堆，偏移从 0 开始
//! - RTV、DSV 各自使用 CPU 侧堆；DSV 堆预留固定容量，
//!   以便启动后再分配阴影贴图等深度目标

use crate::core::error::{ForgeRenderError, Result};
use crate::renderer::resource::{
    BufferHandle, ResourceRegistry, SamplerHandle, TextureHandle,
};

/// DSV 堆的固定容量
///
/// 深度目标可能在启动之后才创建（阴影贴图），堆本身却只分配一次。
pub const DSV_HEAP_CAPACITY: u32 = 8;

/// RTV 堆中交换链槽位之后预留给离屏颜色目标的容量
pub const RTV_TARGET_CAPACITY: u32 = 8;

/// 每种堆类型的描述符需求量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapDemand {
    /// CBV/SRV/UAV 共享堆
    pub cbv_srv_uav: u32,
    /// 采样器堆
    pub sampler: u32,
    /// RTV 堆
    pub rtv: u32,
    /// DSV 堆（容量，不是当前占用）
    pub dsv: u32,
}

/// 从当前占用分配一段连续槽位，返回（基偏移，数量）
///
/// 规划器唯一的"分配算法"。保持为纯函数以便单独验证。
pub fn allocate_range(next_free: u32, count: u32) -> (u32, u32) {
    (next_free, count)
}

/// 着色器可见堆的完整布局
///
/// commit 时由 [`plan_shader_visible_layout`] 产出，
/// 之后由后端按这个布局创建堆和视图。
#[derive(Debug, Clone, Default)]
pub struct ShaderVisibleLayout {
    /// 各堆需求量（rtv/dsv 字段在此布局中为 0）
    pub demand: HeapDemand,
    /// 常量/结构化缓冲区 → CBV/SRV 堆偏移，按注册顺序
    pub buffer_offsets: Vec<(BufferHandle, u32)>,
    /// 纹理（2D 在前、立方体在后）→ CBV/SRV 堆偏移
    pub texture_offsets: Vec<(TextureHandle, u32)>,
    /// 采样器 → 采样器堆偏移，独立从 0 开始
    pub sampler_offsets: Vec<(SamplerHandle, u32)>,
}

/// 渲染目标堆（RTV/DSV）的布局
#[derive(Debug, Clone, Default)]
pub struct TargetLayout {
    /// RTV 堆总量（交换链后缓冲 + 注册的颜色目标）
    pub rtv_count: u32,
    /// 颜色目标 → RTV 堆偏移（排在交换链槽位之后）
    pub rtv_offsets: Vec<(TextureHandle, u32)>,
    /// 深度目标 → DSV 堆偏移
    pub dsv_offsets: Vec<(TextureHandle, u32)>,
}

/// 规划着色器可见堆的布局
///
/// 按注册顺序走一遍常量缓冲区、结构化缓冲区、2D 纹理、立方体贴图，
/// 依次分配 CBV/SRV 堆的下一个空闲偏移；采样器独立编号。
///
/// 输入相同的注册序列时输出完全相同——根签名的堆基址
/// 依赖这个确定性。
pub fn plan_shader_visible_layout(registry: &ResourceRegistry) -> ShaderVisibleLayout {
    let mut layout = ShaderVisibleLayout::default();
    let mut next_free = 0u32;

    for &handle in registry.constant_order() {
        let (offset, count) = allocate_range(next_free, 1);
        layout.buffer_offsets.push((handle, offset));
        next_free = offset + count;
    }
    for &handle in registry.structured_order() {
        let (offset, count) = allocate_range(next_free, 1);
        layout.buffer_offsets.push((handle, offset));
        next_free = offset + count;
    }
    for &handle in registry.texture_order() {
        let (offset, count) = allocate_range(next_free, 1);
        layout.texture_offsets.push((handle, offset));
        next_free = offset + count;
    }
    for &handle in registry.cube_order() {
        let (offset, count) = allocate_range(next_free, 1);
        layout.texture_offsets.push((handle, offset));
        next_free = offset + count;
    }
    layout.demand.cbv_srv_uav = next_free;

    let mut next_sampler = 0u32;
    for &handle in registry.sampler_order() {
        let (offset, count) = allocate_range(next_sampler, 1);
        layout.sampler_offsets.push((handle, offset));
        next_sampler = offset + count;
    }
    layout.demand.sampler = next_sampler;

    layout
}

/// 规划 RTV/DSV 堆的布局
///
/// RTV 堆前 `frame_count` 个槽位固定给交换链后缓冲，
/// 注册的颜色目标排在其后，容量为 [`RTV_TARGET_CAPACITY`]。
/// DSV 堆容量固定为 [`DSV_HEAP_CAPACITY`]。超出任一容量
/// 返回 `OutOfMemory`。
pub fn plan_target_layout(registry: &ResourceRegistry, frame_count: u32) -> Result<TargetLayout> {
    let mut layout = TargetLayout::default();

    let mut next_rtv = frame_count;
    for &handle in registry.render_target_order() {
        if next_rtv >= frame_count + RTV_TARGET_CAPACITY {
            return Err(ForgeRenderError::OutOfMemory(format!(
                "RTV heap exhausted: capacity is {} color targets",
                RTV_TARGET_CAPACITY
            )));
        }
        let (offset, count) = allocate_range(next_rtv, 1);
        layout.rtv_offsets.push((handle, offset));
        next_rtv = offset + count;
    }
    layout.rtv_count = next_rtv;

    let mut next_dsv = 0u32;
    for &handle in registry.depth_target_order() {
        if next_dsv >= DSV_HEAP_CAPACITY {
            return Err(ForgeRenderError::OutOfMemory(format!(
                "DSV heap exhausted: capacity is {} depth targets",
                DSV_HEAP_CAPACITY
            )));
        }
        let (offset, count) = allocate_range(next_dsv, 1);
        layout.dsv_offsets.push((handle, offset));
        next_dsv = offset + count;
    }

    Ok(layout)
}

/// 把规划好的布局写回注册表并标记已 commit
///
/// 写回之后每条记录的 `heap_offset` 对根签名和帧录制可见。
pub fn apply_shader_visible_layout(
    registry: &mut ResourceRegistry,
    layout: &ShaderVisibleLayout,
) -> Result<()> {
    if registry.is_committed() {
        return Err(ForgeRenderError::InvalidOperation(
            "Shader resources already committed".to_string(),
        ));
    }

    for &(handle, offset) in &layout.buffer_offsets {
        registry.buffer_mut(handle)?.heap_offset = Some(offset);
    }
    for &(handle, offset) in &layout.texture_offsets {
        registry.texture_mut(handle)?.heap_offset = Some(offset);
    }
    for &(handle, offset) in &layout.sampler_offsets {
        registry.sampler_mut(handle)?.heap_offset = Some(offset);
    }

    registry.mark_committed();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::resource::{
        BufferKind, CpuAccess, ResourceState, SamplerDesc, TextureFormat, TextureKind,
        TextureViews,
    };

    fn sample_registry() -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry
            .register_buffer(BufferKind::Constant, 64, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();
        registry
            .register_buffer(
                BufferKind::Structured { count: 10, stride: 32 },
                320,
                CpuAccess::None,
                ResourceState::ShaderResource,
            )
            .unwrap();
        registry
            .register_texture(
                TextureKind::Tex2D,
                256,
                256,
                TextureFormat::Rgba8Unorm,
                TextureViews { srv: true, rtv: false, dsv: false },
                ResourceState::ShaderResource,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_scenario_three_descriptors() {
        // 1 常量缓冲 + 1 结构化缓冲 + 1 纹理 → 3 个描述符，偏移 {0,1,2}
        let registry = sample_registry();
        let layout = plan_shader_visible_layout(&registry);

        assert_eq!(layout.demand.cbv_srv_uav, 3);
        assert_eq!(layout.buffer_offsets[0].1, 0);
        assert_eq!(layout.buffer_offsets[1].1, 1);
        assert_eq!(layout.texture_offsets[0].1, 2);
        assert_eq!(layout.demand.sampler, 0);
    }

    #[test]
    fn test_layout_deterministic() {
        let registry = sample_registry();
        let first = plan_shader_visible_layout(&registry);
        let second = plan_shader_visible_layout(&registry);

        assert_eq!(first.demand, second.demand);
        assert_eq!(first.buffer_offsets, second.buffer_offsets);
        assert_eq!(first.texture_offsets, second.texture_offsets);
        assert_eq!(first.sampler_offsets, second.sampler_offsets);
    }

    #[test]
    fn test_samplers_independent_from_zero() {
        let mut registry = sample_registry();
        registry.register_sampler(SamplerDesc::default()).unwrap();
        registry.register_sampler(SamplerDesc::default()).unwrap();

        let layout = plan_shader_visible_layout(&registry);
        assert_eq!(layout.demand.sampler, 2);
        assert_eq!(layout.sampler_offsets[0].1, 0);
        assert_eq!(layout.sampler_offsets[1].1, 1);
        // 采样器不占用 CBV/SRV 堆
        assert_eq!(layout.demand.cbv_srv_uav, 3);
    }

    #[test]
    fn test_empty_registry_skips_heaps() {
        let registry = ResourceRegistry::new();
        let layout = plan_shader_visible_layout(&registry);
        assert_eq!(layout.demand.cbv_srv_uav, 0);
        assert_eq!(layout.demand.sampler, 0);
    }

    #[test]
    fn test_apply_layout_writes_offsets() {
        let mut registry = sample_registry();
        let layout = plan_shader_visible_layout(&registry);
        apply_shader_visible_layout(&mut registry, &layout).unwrap();

        assert!(registry.is_committed());
        let constant = registry.constant_order()[0];
        assert_eq!(registry.buffer(constant).unwrap().heap_offset, Some(0));
        let texture = registry.texture_order()[0];
        assert_eq!(registry.texture(texture).unwrap().heap_offset, Some(2));

        // 重复 commit 被拒绝
        assert!(apply_shader_visible_layout(&mut registry, &layout).is_err());
    }

    #[test]
    fn test_target_layout_after_swapchain_slots() {
        let mut registry = ResourceRegistry::new();
        let color = registry
            .register_texture(
                TextureKind::ColorTarget,
                512,
                512,
                TextureFormat::Rgba8Unorm,
                TextureViews { srv: false, rtv: true, dsv: false },
                ResourceState::RenderTarget,
            )
            .unwrap();
        let depth = registry
            .register_texture(
                TextureKind::DepthTarget,
                512,
                512,
                TextureFormat::Depth32Float,
                TextureViews { srv: false, rtv: false, dsv: true },
                ResourceState::DepthWrite,
            )
            .unwrap();

        let layout = plan_target_layout(&registry, 2).unwrap();
        // 交换链占掉偏移 0 和 1
        assert_eq!(layout.rtv_offsets, vec![(color, 2)]);
        assert_eq!(layout.rtv_count, 3);
        assert_eq!(layout.dsv_offsets, vec![(depth, 0)]);
    }

    #[test]
    fn test_rtv_target_capacity_enforced() {
        let mut registry = ResourceRegistry::new();
        for _ in 0..RTV_TARGET_CAPACITY + 1 {
            registry
                .register_texture(
                    TextureKind::ColorTarget,
                    256,
                    256,
                    TextureFormat::Rgba8Unorm,
                    TextureViews { srv: false, rtv: true, dsv: false },
                    ResourceState::RenderTarget,
                )
                .unwrap();
        }

        let result = plan_target_layout(&registry, 2);
        assert!(matches!(result, Err(ForgeRenderError::OutOfMemory(_))));
    }

    #[test]
    fn test_dsv_heap_capacity_enforced() {
        let mut registry = ResourceRegistry::new();
        for _ in 0..DSV_HEAP_CAPACITY + 1 {
            registry
                .register_texture(
                    TextureKind::DepthTarget,
                    256,
                    256,
                    TextureFormat::Depth32Float,
                    TextureViews { srv: false, rtv: false, dsv: true },
                    ResourceState::DepthWrite,
                )
                .unwrap();
        }

        let result = plan_target_layout(&registry, 2);
        assert!(matches!(result, Err(ForgeRenderError::OutOfMemory(_))));
    }
}
