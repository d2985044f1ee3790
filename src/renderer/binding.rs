//! 根签名描述与寄存器解析模块
//!
//! 调用方只声明"哪些资源属于哪个描述符范围、哪些范围构成哪个根参数"，
//! 着色器寄存器编号（b#/t#/s#）由解析过程按类别自动分配，
//! 调用方永远不手写寄存器号。
//!
//! # 设计原则
//!
//! - **声明与解析分离**：`RootSignatureDesc` 是纯数据；
//!   `resolve` 在 commit 之后一次性把寄存器和堆基址算出来
//! - **按类别计数**：CBV、SRV、UAV、采样器各有独立的寄存器计数器，
//!   同类范围跨根参数也拿到连续的寄存器区间
//! - **表基址取最小堆偏移**：描述符表绑定时指向成员中
//!   最小的堆偏移，要求同一个表的成员在堆中连续注册

use crate::core::error::{ForgeRenderError, Result};
use crate::renderer::resource::{
    BufferHandle, ResourceRegistry, SamplerHandle, TextureHandle,
};

/// 描述符范围的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// 常量缓冲区视图（b 寄存器）
    Cbv,
    /// 着色器资源视图（t 寄存器）
    Srv,
    /// 无序访问视图（u 寄存器）
    Uav,
    /// 采样器（s 寄存器）
    Sampler,
}

/// 范围成员
///
/// 句柄在解析时换取堆偏移，并被写回分配到的寄存器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEntry {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    Sampler(SamplerHandle),
}

/// 一个描述符范围：同类别的一组连续描述符
#[derive(Debug, Clone)]
pub struct DescriptorRange {
    /// 类别
    pub kind: RangeKind,
    /// 成员，按堆内顺序
    pub entries: Vec<RangeEntry>,
}

impl DescriptorRange {
    /// 创建空范围
    pub fn new(kind: RangeKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// 追加一个成员
    pub fn push(&mut self, entry: RangeEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }
}

/// 根参数
///
/// 描述符表经堆间接寻址；直接根绑定把缓冲区的 GPU 虚拟地址
/// 直接放进根签名，不占堆槽位。
#[derive(Debug, Clone)]
pub enum RootParameter {
    /// 一张描述符表，包含一个或多个范围
    DescriptorTable(Vec<DescriptorRange>),
    /// 直接根 CBV
    ConstantBuffer(BufferHandle),
    /// 直接根 SRV（结构化缓冲区）
    ShaderResource(BufferHandle),
}

/// 每个寄存器类别的下一个空闲编号
///
/// 解析一个根签名时从零开始，逐范围递增。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterCounters {
    pub cbv: u32,
    pub srv: u32,
    pub uav: u32,
    pub sampler: u32,
}

impl RegisterCounters {
    /// 为一个范围分配 `count` 个连续寄存器，返回基编号
    pub fn commit(&mut self, kind: RangeKind, count: u32) -> u32 {
        let counter = match kind {
            RangeKind::Cbv => &mut self.cbv,
            RangeKind::Srv => &mut self.srv,
            RangeKind::Uav => &mut self.uav,
            RangeKind::Sampler => &mut self.sampler,
        };
        let base = *counter;
        *counter += count;
        base
    }
}

/// 根签名描述：根参数的有序列表
#[derive(Debug, Clone, Default)]
pub struct RootSignatureDesc {
    parameters: Vec<RootParameter>,
}

impl RootSignatureDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个根参数，返回其槽位序号
    pub fn insert(&mut self, parameter: RootParameter) -> u32 {
        self.parameters.push(parameter);
        (self.parameters.len() - 1) as u32
    }

    pub fn parameters(&self) -> &[RootParameter] {
        &self.parameters
    }

    /// 解析为后端可直接翻译的根签名
    ///
    /// 要求 `commit_shader_resources` 已执行（成员需要堆偏移）。
    /// 成功时把分配到的寄存器写回每条资源记录。
    pub fn resolve(&self, registry: &mut ResourceRegistry) -> Result<ResolvedRootSignature> {
        if !registry.is_committed() {
            return Err(ForgeRenderError::InvalidOperation(
                "Root signature resolution requires committed shader resources".to_string(),
            ));
        }

        let mut counters = RegisterCounters::default();
        let mut resolved = Vec::with_capacity(self.parameters.len());

        for parameter in &self.parameters {
            match parameter {
                RootParameter::DescriptorTable(ranges) => {
                    resolved.push(resolve_table(registry, ranges, &mut counters)?);
                }
                RootParameter::ConstantBuffer(handle) => {
                    let register = counters.commit(RangeKind::Cbv, 1);
                    registry.buffer_mut(*handle)?.shader_register = Some(register);
                    resolved.push(ResolvedParameter::ConstantBuffer {
                        buffer: *handle,
                        register,
                    });
                }
                RootParameter::ShaderResource(handle) => {
                    let register = counters.commit(RangeKind::Srv, 1);
                    registry.buffer_mut(*handle)?.shader_register = Some(register);
                    resolved.push(ResolvedParameter::ShaderResource {
                        buffer: *handle,
                        register,
                    });
                }
            }
        }

        Ok(ResolvedRootSignature {
            parameters: resolved,
            counters,
        })
    }
}

fn entry_heap_offset(registry: &ResourceRegistry, entry: RangeEntry) -> Result<u32> {
    let offset = match entry {
        RangeEntry::Buffer(handle) => registry.buffer(handle)?.heap_offset,
        RangeEntry::Texture(handle) => registry.texture(handle)?.heap_offset,
        RangeEntry::Sampler(handle) => registry.sampler(handle)?.heap_offset,
    };
    offset.ok_or_else(|| {
        ForgeRenderError::InvalidOperation(
            "Range member has no descriptor heap slot".to_string(),
        )
    })
}

fn assign_entry_register(
    registry: &mut ResourceRegistry,
    entry: RangeEntry,
    register: u32,
) -> Result<()> {
    match entry {
        RangeEntry::Buffer(handle) => registry.buffer_mut(handle)?.shader_register = Some(register),
        RangeEntry::Texture(handle) => {
            registry.texture_mut(handle)?.shader_register = Some(register)
        }
        RangeEntry::Sampler(handle) => {
            registry.sampler_mut(handle)?.shader_register = Some(register)
        }
    }
    Ok(())
}

fn resolve_table(
    registry: &mut ResourceRegistry,
    ranges: &[DescriptorRange],
    counters: &mut RegisterCounters,
) -> Result<ResolvedParameter> {
    if ranges.is_empty() {
        return Err(ForgeRenderError::InvalidParameter(
            "Descriptor table must contain at least one range".to_string(),
        ));
    }

    // 采样器活在独立的堆里，不能和 CBV/SRV 共用一张表
    let has_sampler = ranges.iter().any(|r| r.kind == RangeKind::Sampler);
    let has_view = ranges.iter().any(|r| r.kind != RangeKind::Sampler);
    if has_sampler && has_view {
        return Err(ForgeRenderError::InvalidParameter(
            "Sampler ranges cannot share a descriptor table with CBV/SRV/UAV ranges".to_string(),
        ));
    }

    let mut resolved_ranges = Vec::with_capacity(ranges.len());
    let mut table_base: Option<u32> = None;

    for range in ranges {
        if range.entries.is_empty() {
            return Err(ForgeRenderError::InvalidParameter(
                "Descriptor range must contain at least one resource".to_string(),
            ));
        }

        let count = range.entries.len() as u32;
        let base_register = counters.commit(range.kind, count);

        let mut heap_base = u32::MAX;
        for (i, &entry) in range.entries.iter().enumerate() {
            let offset = entry_heap_offset(registry, entry)?;
            heap_base = heap_base.min(offset);
            assign_entry_register(registry, entry, base_register + i as u32)?;
        }
        table_base = Some(match table_base {
            Some(base) => base.min(heap_base),
            None => heap_base,
        });

        resolved_ranges.push(ResolvedRange {
            kind: range.kind,
            base_register,
            count,
            heap_base,
        });
    }

    Ok(ResolvedParameter::DescriptorTable {
        ranges: resolved_ranges,
        heap_base: table_base.unwrap_or(0),
        sampler_table: has_sampler,
    })
}

/// 解析后的描述符范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub kind: RangeKind,
    /// 自动分配的基寄存器编号
    pub base_register: u32,
    pub count: u32,
    /// 范围成员中最小的堆偏移
    pub heap_base: u32,
}

/// 解析后的根参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedParameter {
    DescriptorTable {
        ranges: Vec<ResolvedRange>,
        /// 绑定时描述符表指向的堆偏移
        heap_base: u32,
        /// 是否绑定到采样器堆
        sampler_table: bool,
    },
    ConstantBuffer {
        buffer: BufferHandle,
        register: u32,
    },
    ShaderResource {
        buffer: BufferHandle,
        register: u32,
    },
}

/// 解析完成的根签名
#[derive(Debug, Clone)]
pub struct ResolvedRootSignature {
    /// 根参数，槽位序号与声明顺序一致
    pub parameters: Vec<ResolvedParameter>,
    /// 解析结束时的寄存器占用，用于诊断
    pub counters: RegisterCounters,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::layout::{apply_shader_visible_layout, plan_shader_visible_layout};
    use crate::renderer::resource::{
        BufferKind, CpuAccess, ResourceState, SamplerDesc, TextureFormat, TextureKind,
        TextureViews,
    };

    fn committed_registry() -> (
        ResourceRegistry,
        BufferHandle,
        BufferHandle,
        TextureHandle,
        SamplerHandle,
    ) {
        let mut registry = ResourceRegistry::new();
        let cbv = registry
            .register_buffer(BufferKind::Constant, 64, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();
        let srv = registry
            .register_buffer(
                BufferKind::Structured { count: 4, stride: 16 },
                64,
                CpuAccess::None,
                ResourceState::ShaderResource,
            )
            .unwrap();
        let tex = registry
            .register_texture(
                TextureKind::Tex2D,
                64,
                64,
                TextureFormat::Rgba8Unorm,
                TextureViews { srv: true, rtv: false, dsv: false },
                ResourceState::ShaderResource,
            )
            .unwrap();
        let sampler = registry.register_sampler(SamplerDesc::default()).unwrap();

        let layout = plan_shader_visible_layout(&registry);
        apply_shader_visible_layout(&mut registry, &layout).unwrap();
        (registry, cbv, srv, tex, sampler)
    }

    #[test]
    fn test_register_counters_per_class() {
        let mut counters = RegisterCounters::default();
        assert_eq!(counters.commit(RangeKind::Cbv, 2), 0);
        assert_eq!(counters.commit(RangeKind::Srv, 1), 0);
        assert_eq!(counters.commit(RangeKind::Cbv, 1), 2);
        assert_eq!(counters.commit(RangeKind::Sampler, 3), 0);
        assert_eq!(counters.commit(RangeKind::Srv, 1), 1);
    }

    #[test]
    fn test_resolve_assigns_registers_in_order() {
        let (mut registry, cbv, srv, tex, _) = committed_registry();

        let mut desc = RootSignatureDesc::new();
        let mut cbv_range = DescriptorRange::new(RangeKind::Cbv);
        cbv_range.push(RangeEntry::Buffer(cbv));
        let mut srv_range = DescriptorRange::new(RangeKind::Srv);
        srv_range.push(RangeEntry::Buffer(srv));
        srv_range.push(RangeEntry::Texture(tex));
        desc.insert(RootParameter::DescriptorTable(vec![cbv_range, srv_range]));

        let resolved = desc.resolve(&mut registry).unwrap();
        assert_eq!(resolved.parameters.len(), 1);

        // b0 给常量缓冲，t0/t1 给结构化缓冲和纹理
        assert_eq!(registry.buffer(cbv).unwrap().shader_register, Some(0));
        assert_eq!(registry.buffer(srv).unwrap().shader_register, Some(0));
        assert_eq!(registry.texture(tex).unwrap().shader_register, Some(1));

        match &resolved.parameters[0] {
            ResolvedParameter::DescriptorTable { ranges, heap_base, sampler_table } => {
                assert_eq!(ranges[0], ResolvedRange {
                    kind: RangeKind::Cbv,
                    base_register: 0,
                    count: 1,
                    heap_base: 0,
                });
                assert_eq!(ranges[1].base_register, 0);
                assert_eq!(ranges[1].count, 2);
                // 表基址取成员最小堆偏移
                assert_eq!(*heap_base, 0);
                assert!(!sampler_table);
            }
            other => panic!("expected descriptor table, got {:?}", other),
        }
    }

    #[test]
    fn test_same_class_across_tables_consecutive() {
        let (mut registry, cbv, _, tex, sampler) = committed_registry();

        let mut desc = RootSignatureDesc::new();
        let mut r0 = DescriptorRange::new(RangeKind::Cbv);
        r0.push(RangeEntry::Buffer(cbv));
        desc.insert(RootParameter::DescriptorTable(vec![r0]));
        let mut r1 = DescriptorRange::new(RangeKind::Srv);
        r1.push(RangeEntry::Texture(tex));
        desc.insert(RootParameter::DescriptorTable(vec![r1]));
        let mut r2 = DescriptorRange::new(RangeKind::Sampler);
        r2.push(RangeEntry::Sampler(sampler));
        desc.insert(RootParameter::DescriptorTable(vec![r2]));

        let resolved = desc.resolve(&mut registry).unwrap();
        assert_eq!(resolved.counters.cbv, 1);
        assert_eq!(resolved.counters.srv, 1);
        assert_eq!(resolved.counters.sampler, 1);
        assert_eq!(registry.sampler(sampler).unwrap().shader_register, Some(0));

        match &resolved.parameters[2] {
            ResolvedParameter::DescriptorTable { sampler_table, .. } => assert!(sampler_table),
            other => panic!("expected sampler table, got {:?}", other),
        }
    }

    #[test]
    fn test_direct_root_bindings_share_counters() {
        let (mut registry, cbv, srv, _, _) = committed_registry();

        let mut desc = RootSignatureDesc::new();
        desc.insert(RootParameter::ConstantBuffer(cbv));
        desc.insert(RootParameter::ShaderResource(srv));

        let resolved = desc.resolve(&mut registry).unwrap();
        assert_eq!(
            resolved.parameters[0],
            ResolvedParameter::ConstantBuffer { buffer: cbv, register: 0 }
        );
        assert_eq!(
            resolved.parameters[1],
            ResolvedParameter::ShaderResource { buffer: srv, register: 0 }
        );
    }

    #[test]
    fn test_sampler_mixing_rejected() {
        let (mut registry, cbv, _, _, sampler) = committed_registry();

        let mut desc = RootSignatureDesc::new();
        let mut views = DescriptorRange::new(RangeKind::Cbv);
        views.push(RangeEntry::Buffer(cbv));
        let mut samplers = DescriptorRange::new(RangeKind::Sampler);
        samplers.push(RangeEntry::Sampler(sampler));
        desc.insert(RootParameter::DescriptorTable(vec![views, samplers]));

        let result = desc.resolve(&mut registry);
        assert!(matches!(result, Err(ForgeRenderError::InvalidParameter(_))));
    }

    #[test]
    fn test_resolve_before_commit_rejected() {
        let mut registry = ResourceRegistry::new();
        let cbv = registry
            .register_buffer(BufferKind::Constant, 64, CpuAccess::Write, ResourceState::GenericRead)
            .unwrap();

        let mut desc = RootSignatureDesc::new();
        let mut range = DescriptorRange::new(RangeKind::Cbv);
        range.push(RangeEntry::Buffer(cbv));
        desc.insert(RootParameter::DescriptorTable(vec![range]));

        let result = desc.resolve(&mut registry);
        assert!(matches!(result, Err(ForgeRenderError::InvalidOperation(_))));
    }

    #[test]
    fn test_empty_table_rejected() {
        let (mut registry, ..) = committed_registry();
        let mut desc = RootSignatureDesc::new();
        desc.insert(RootParameter::DescriptorTable(vec![]));
        assert!(matches!(
            desc.resolve(&mut registry),
            Err(ForgeRenderError::InvalidParameter(_))
        ));
    }
}
