//! D3D12 渲染器
//!
//! 面向调用方的顶层类型：资源创建、常量更新、描述符提交、
//! 根签名与管线创建，以及帧录制状态机。
//!
//! # 帧录制
//!
//! 一帧的生命周期是 `begin_frame` → 绑定与绘制 → `end_frame`。
//! `begin_frame` 先等上一帧提交时 signal 的栅栏值——命令分配器
//! 只有一个，GPU 越过该值之前不能重置——再重置命令列表、
//! 转换后缓冲状态并清屏；`end_frame` 转换回 Present 状态、
//! 提交命令列表、Present 并 signal 栅栏。逐帧停顿，不做多帧流水。
//!
//! # 延迟绑定
//!
//! `bind_vertex_buffer`/`bind_index_buffer` 只记下句柄，
//! 真正的 `IASet*` 调用发生在下一次 draw。录制外的绑定
//! 和没有顶点缓冲的 draw 都是 `InvalidOperation`。

use slotmap::SecondaryMap;
use tracing::{debug, info};
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::DXGI_PRESENT;
use winit::window::Window;

use crate::core::error::{ForgeRenderError, Result};
use crate::core::Config;
use crate::gfx::dx12::context::Dx12Context;
use crate::gfx::dx12::descriptor::ShaderVisibleHeaps;
use crate::gfx::dx12::pipeline::{self, ShaderProgram};
use crate::gfx::dx12::root_signature::{self, Dx12RootSignature, RootBinding};
use crate::gfx::dx12::upload::{self, to_d3d12_states, to_dxgi_format, transition_barrier};
use crate::renderer::binding::RootSignatureDesc;
use crate::renderer::layout::{
    apply_shader_visible_layout, plan_shader_visible_layout, plan_target_layout,
};
use crate::renderer::resource::{
    AddressMode, BufferHandle, BufferKind, CompareFunc, CpuAccess, ResourceRegistry,
    ResourceState, SamplerDesc, SamplerFilter, SamplerHandle, TextureFormat, TextureHandle,
    TextureKind, TextureViews,
};
use crate::renderer::sync::{FramePacer, FRAME_COUNT};

/// D3D12 渲染器
pub struct Dx12Renderer {
    context: Dx12Context,
    registry: ResourceRegistry,
    pacer: FramePacer,
    heaps: ShaderVisibleHeaps,
    buffer_resources: SecondaryMap<BufferHandle, ID3D12Resource>,
    texture_resources: SecondaryMap<TextureHandle, ID3D12Resource>,
    clear_color: [f32; 4],
    vsync: bool,
    recording: bool,
    pending_vertex: Option<BufferHandle>,
    pending_index: Option<BufferHandle>,
}

impl Dx12Renderer {
    /// 创建渲染器
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let context = Dx12Context::new(window, config)?;
        Ok(Self {
            context,
            registry: ResourceRegistry::new(),
            pacer: FramePacer::new(FRAME_COUNT),
            heaps: ShaderVisibleHeaps::default(),
            buffer_resources: SecondaryMap::new(),
            texture_resources: SecondaryMap::new(),
            clear_color: config.graphics.clear_color,
            vsync: config.graphics.vsync,
            recording: false,
            pending_vertex: None,
            pending_index: None,
        })
    }

    /// 资源注册表（测试和诊断用）
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // 资源创建
    // ------------------------------------------------------------------

    /// 创建顶点缓冲区（两段式上传）
    pub fn create_vertex_buffer(&mut self, data: &[u8], stride: u32) -> Result<BufferHandle> {
        let handle = self.registry.register_buffer(
            BufferKind::Vertex { stride },
            data.len() as u64,
            CpuAccess::None,
            ResourceState::VertexAndConstantBuffer,
        )?;
        let fence_value = self.pacer.allocate_value();
        let resource = self.context.upload_buffer(
            data,
            data.len() as u64,
            CpuAccess::None,
            ResourceState::VertexAndConstantBuffer,
            fence_value,
        )?;
        self.buffer_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 创建索引缓冲区，固定 32 位索引
    pub fn create_index_buffer(&mut self, data: &[u8]) -> Result<BufferHandle> {
        let handle = self.registry.register_buffer(
            BufferKind::Index,
            data.len() as u64,
            CpuAccess::None,
            ResourceState::IndexBuffer,
        )?;
        let fence_value = self.pacer.allocate_value();
        let resource = self.context.upload_buffer(
            data,
            data.len() as u64,
            CpuAccess::None,
            ResourceState::IndexBuffer,
            fence_value,
        )?;
        self.buffer_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 创建常量缓冲区
    ///
    /// 分配在上传堆上，之后可以用 [`update_constant_buffer`]
    /// 每帧重写。大小对齐到 256 字节。
    ///
    /// [`update_constant_buffer`]: Dx12Renderer::update_constant_buffer
    pub fn create_constant_buffer(&mut self, data: &[u8]) -> Result<BufferHandle> {
        let handle = self.registry.register_buffer(
            BufferKind::Constant,
            data.len() as u64,
            CpuAccess::Write,
            ResourceState::GenericRead,
        )?;
        let aligned_size = self.registry.buffer(handle)?.aligned_size;
        let fence_value = self.pacer.allocate_value();
        let resource = self.context.upload_buffer(
            data,
            aligned_size,
            CpuAccess::Write,
            ResourceState::GenericRead,
            fence_value,
        )?;
        self.buffer_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 创建结构化缓冲区
    pub fn create_structured_buffer(
        &mut self,
        data: &[u8],
        count: u32,
        stride: u32,
    ) -> Result<BufferHandle> {
        if data.len() as u64 != count as u64 * stride as u64 {
            return Err(ForgeRenderError::InvalidParameter(format!(
                "Structured buffer data is {} bytes, expected {} x {}",
                data.len(),
                count,
                stride
            )));
        }
        let handle = self.registry.register_buffer(
            BufferKind::Structured { count, stride },
            data.len() as u64,
            CpuAccess::None,
            ResourceState::ShaderResource,
        )?;
        let fence_value = self.pacer.allocate_value();
        let resource = self.context.upload_buffer(
            data,
            data.len() as u64,
            CpuAccess::None,
            ResourceState::ShaderResource,
            fence_value,
        )?;
        self.buffer_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 从 RGBA8 像素数据创建 2D 纹理
    pub fn create_texture_2d(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureHandle> {
        let handle = self.registry.register_texture(
            TextureKind::Tex2D,
            width,
            height,
            format,
            TextureViews { srv: true, rtv: false, dsv: false },
            ResourceState::ShaderResource,
        )?;
        let fence_value = self.pacer.allocate_value();
        let resource = self
            .context
            .upload_texture(data, width, height, format, 1, fence_value)?;
        self.texture_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 从图像文件创建 2D 纹理，解码为 RGBA8
    pub fn create_texture_2d_from_file(&mut self, path: &str) -> Result<TextureHandle> {
        let image = image::open(path).map_err(|e| {
            ForgeRenderError::InvalidParameter(format!("Failed to load image {}: {}", path, e))
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let handle = self.create_texture_2d(rgba.as_raw(), width, height, TextureFormat::Rgba8Unorm)?;
        debug!(path, width, height, "Texture loaded from file");
        Ok(handle)
    }

    /// 创建立方体贴图
    ///
    /// `data` 按 +X、-X、+Y、-Y、+Z、-Z 顺序排列 6 个面。
    pub fn create_texture_cube(
        &mut self,
        data: &[u8],
        face_size: u32,
        format: TextureFormat,
    ) -> Result<TextureHandle> {
        let handle = self.registry.register_texture(
            TextureKind::Cube,
            face_size,
            face_size,
            format,
            TextureViews { srv: true, rtv: false, dsv: false },
            ResourceState::ShaderResource,
        )?;
        let fence_value = self.pacer.allocate_value();
        let resource =
            self.context
                .upload_texture(data, face_size, face_size, format, 6, fence_value)?;
        self.texture_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 创建深度目标并立即建 DSV
    ///
    /// DSV 堆容量固定，深度目标可以在 commit 之后创建。
    pub fn create_depth_target(&mut self, width: u32, height: u32) -> Result<TextureHandle> {
        let handle = self.registry.register_texture(
            TextureKind::DepthTarget,
            width,
            height,
            TextureFormat::Depth32Float,
            TextureViews { srv: false, rtv: false, dsv: true },
            ResourceState::DepthWrite,
        )?;
        let layout = plan_target_layout(&self.registry, FRAME_COUNT as u32)?;
        let (_, offset) = *layout.dsv_offsets.last().ok_or_else(|| {
            ForgeRenderError::InvalidContext("Depth target missing from layout".to_string())
        })?;

        let resource = self.context.create_target_texture(
            TextureKind::DepthTarget,
            width,
            height,
            TextureFormat::Depth32Float,
            self.clear_color,
        )?;
        unsafe {
            self.context.device.CreateDepthStencilView(
                &resource,
                None,
                self.context.dsv_heap.cpu_handle(offset),
            );
        }
        self.registry.texture_mut(handle)?.dsv_offset = Some(offset);
        self.texture_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 创建离屏颜色目标并立即建 RTV
    ///
    /// RTV 堆中交换链槽位之后的区域预留给颜色目标，
    /// 颜色目标可以在 commit 之后创建。
    pub fn create_color_target(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureHandle> {
        let handle = self.registry.register_texture(
            TextureKind::ColorTarget,
            width,
            height,
            format,
            TextureViews { srv: false, rtv: true, dsv: false },
            ResourceState::RenderTarget,
        )?;
        let layout = plan_target_layout(&self.registry, FRAME_COUNT as u32)?;
        let (_, offset) = *layout.rtv_offsets.last().ok_or_else(|| {
            ForgeRenderError::InvalidContext("Color target missing from layout".to_string())
        })?;

        let resource = self.context.create_target_texture(
            TextureKind::ColorTarget,
            width,
            height,
            format,
            self.clear_color,
        )?;
        unsafe {
            self.context.device.CreateRenderTargetView(
                &resource,
                None,
                self.context.rtv_heap.cpu_handle(offset),
            );
        }
        self.registry.texture_mut(handle)?.rtv_offset = Some(offset);
        self.texture_resources.insert(handle, resource);
        Ok(handle)
    }

    /// 创建采样器；描述符在 commit 时写进采样器堆
    pub fn create_sampler(&mut self, desc: SamplerDesc) -> Result<SamplerHandle> {
        self.registry.register_sampler(desc)
    }

    /// 重写常量缓冲区内容
    ///
    /// 只有 `CpuAccess::Write` 的常量缓冲区可以更新。
    pub fn update_constant_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let record = self.registry.buffer(handle)?;
        if !matches!(record.kind, BufferKind::Constant) || record.cpu_access != CpuAccess::Write {
            return Err(ForgeRenderError::InvalidOperation(
                "Only CPU-writable constant buffers can be updated".to_string(),
            ));
        }
        if data.len() as u64 > record.aligned_size {
            return Err(ForgeRenderError::InvalidParameter(format!(
                "Update of {} bytes exceeds buffer size {}",
                data.len(),
                record.aligned_size
            )));
        }
        let resource = self.buffer_resources.get(handle).ok_or_else(|| {
            ForgeRenderError::InvalidContext("Buffer has no device resource".to_string())
        })?;
        upload::write_buffer(resource, data)
    }

    // ------------------------------------------------------------------
    // 描述符提交与根签名
    // ------------------------------------------------------------------

    /// 提交着色器资源
    ///
    /// 规划堆布局、创建着色器可见堆并为每个资源建视图。
    /// 之后注册表冻结，新的着色器可见资源注册会被拒绝。
    pub fn commit_shader_resources(&mut self) -> Result<()> {
        if self.registry.is_committed() {
            return Err(ForgeRenderError::InvalidOperation(
                "Shader resources already committed".to_string(),
            ));
        }

        let layout = plan_shader_visible_layout(&self.registry);
        self.heaps = ShaderVisibleHeaps::from_demand(&self.context.device, &layout.demand)?;

        if let Some(heap) = &self.heaps.cbv_srv {
            for &(handle, offset) in &layout.buffer_offsets {
                let record = self.registry.buffer(handle)?;
                let resource = self.buffer_resources.get(handle).ok_or_else(|| {
                    ForgeRenderError::InvalidContext("Buffer has no device resource".to_string())
                })?;
                unsafe {
                    match record.kind {
                        BufferKind::Constant => {
                            let desc = D3D12_CONSTANT_BUFFER_VIEW_DESC {
                                BufferLocation: resource.GetGPUVirtualAddress(),
                                SizeInBytes: record.aligned_size as u32,
                            };
                            self.context
                                .device
                                .CreateConstantBufferView(Some(&desc), heap.cpu_handle(offset));
                        }
                        BufferKind::Structured { count, stride } => {
                            let desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
                                Format: DXGI_FORMAT_UNKNOWN,
                                ViewDimension: D3D12_SRV_DIMENSION_BUFFER,
                                Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
                                Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                                    Buffer: D3D12_BUFFER_SRV {
                                        FirstElement: 0,
                                        NumElements: count,
                                        StructureByteStride: stride,
                                        Flags: D3D12_BUFFER_SRV_FLAG_NONE,
                                    },
                                },
                            };
                            self.context.device.CreateShaderResourceView(
                                resource,
                                Some(&desc),
                                heap.cpu_handle(offset),
                            );
                        }
                        _ => {
                            return Err(ForgeRenderError::InvalidContext(
                                "Vertex/index buffers do not occupy descriptor slots".to_string(),
                            ))
                        }
                    }
                }
            }

            for &(handle, offset) in &layout.texture_offsets {
                let record = self.registry.texture(handle)?;
                let resource = self.texture_resources.get(handle).ok_or_else(|| {
                    ForgeRenderError::InvalidContext("Texture has no device resource".to_string())
                })?;
                let desc = match record.kind {
                    TextureKind::Cube => D3D12_SHADER_RESOURCE_VIEW_DESC {
                        Format: to_dxgi_format(record.format),
                        ViewDimension: D3D12_SRV_DIMENSION_TEXTURECUBE,
                        Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
                        Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                            TextureCube: D3D12_TEXCUBE_SRV {
                                MostDetailedMip: 0,
                                MipLevels: 1,
                                ResourceMinLODClamp: 0.0,
                            },
                        },
                    },
                    _ => D3D12_SHADER_RESOURCE_VIEW_DESC {
                        Format: to_dxgi_format(record.format),
                        ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
                        Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
                        Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                            Texture2D: D3D12_TEX2D_SRV {
                                MostDetailedMip: 0,
                                MipLevels: 1,
                                PlaneSlice: 0,
                                ResourceMinLODClamp: 0.0,
                            },
                        },
                    },
                };
                unsafe {
                    self.context.device.CreateShaderResourceView(
                        resource,
                        Some(&desc),
                        heap.cpu_handle(offset),
                    );
                }
            }
        }

        if let Some(heap) = &self.heaps.sampler {
            for &(handle, offset) in &layout.sampler_offsets {
                let record = self.registry.sampler(handle)?;
                let desc = to_d3d12_sampler(&record.desc);
                unsafe {
                    self.context.device.CreateSampler(&desc, heap.cpu_handle(offset));
                }
            }
        }

        apply_shader_visible_layout(&mut self.registry, &layout)?;
        info!(
            cbv_srv = layout.demand.cbv_srv_uav,
            samplers = layout.demand.sampler,
            "Shader resources committed"
        );
        Ok(())
    }

    /// 解析并创建根签名
    ///
    /// 需要先 `commit_shader_resources`；寄存器编号在解析时
    /// 写回资源记录。
    pub fn create_root_signature(&mut self, desc: &RootSignatureDesc) -> Result<Dx12RootSignature> {
        let resolved = desc.resolve(&mut self.registry)?;
        root_signature::create_root_signature(&self.context.device, &resolved)
    }

    /// 编译 HLSL 文件为着色器程序
    pub fn create_program(&self, path: &str) -> Result<ShaderProgram> {
        ShaderProgram::from_file(path)
    }

    /// 创建图形管线
    pub fn create_pipeline(
        &self,
        program: &ShaderProgram,
        root_signature: &Dx12RootSignature,
    ) -> Result<ID3D12PipelineState> {
        let depth_enabled = !self.registry.depth_target_order().is_empty();
        pipeline::create_graphics_pipeline(
            &self.context.device,
            program,
            root_signature,
            depth_enabled,
        )
    }

    // ------------------------------------------------------------------
    // 帧录制
    // ------------------------------------------------------------------

    fn require_recording(&self) -> Result<()> {
        if !self.recording {
            return Err(ForgeRenderError::InvalidOperation(
                "No frame is being recorded".to_string(),
            ));
        }
        Ok(())
    }

    /// 开始录制一帧
    ///
    /// 先等待上一帧提交的栅栏值，确认 GPU 不再执行共享分配器里
    /// 录制的命令，再重置命令列表、转换后缓冲并清屏。
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.recording {
            return Err(ForgeRenderError::InvalidOperation(
                "Previous frame is still being recorded".to_string(),
            ));
        }

        if self.pacer.needs_wait(self.context.fence.completed()) {
            self.context.fence.wait_blocking(self.pacer.wait_target())?;
        }

        self.context.reset_command_list()?;
        let frame_index = self.context.frame_index;
        unsafe {
            let back_buffer: ID3D12Resource =
                self.context.swap_chain.GetBuffer(frame_index as u32)?;
            let barrier = transition_barrier(
                &back_buffer,
                to_d3d12_states(ResourceState::Present),
                to_d3d12_states(ResourceState::RenderTarget),
            );
            self.context.command_list.ResourceBarrier(&[barrier]);

            let list = &self.context.command_list;
            list.RSSetViewports(&[self.context.viewport]);
            list.RSSetScissorRects(&[self.context.scissor_rect]);

            let rtv_handle = self.context.rtv_heap.cpu_handle(frame_index as u32);
            let dsv_handle = self
                .registry
                .depth_target_order()
                .first()
                .and_then(|&handle| self.registry.texture(handle).ok())
                .and_then(|record| record.dsv_offset)
                .map(|offset| self.context.dsv_heap.cpu_handle(offset));

            list.OMSetRenderTargets(1, Some(&rtv_handle), false, dsv_handle.as_ref().map(|h| h as *const _));
            list.ClearRenderTargetView(rtv_handle, &self.clear_color, None);
            if let Some(dsv_handle) = dsv_handle {
                list.ClearDepthStencilView(dsv_handle, D3D12_CLEAR_FLAG_DEPTH, 1.0, 0, None);
            }

            let heap_list = self.heaps.bind_list();
            if !heap_list.is_empty() {
                list.SetDescriptorHeaps(&heap_list);
            }
        }

        self.recording = true;
        Ok(())
    }

    /// 绑定根签名并按解析结果设置所有根参数
    pub fn bind_root_signature(&mut self, signature: &Dx12RootSignature) -> Result<()> {
        self.require_recording()?;
        let list = &self.context.command_list;
        unsafe {
            list.SetGraphicsRootSignature(signature.native());
        }

        for (slot, binding) in signature.bindings().iter().enumerate() {
            match binding {
                RootBinding::Table { heap_base, sampler } => {
                    let heap = if *sampler {
                        self.heaps.sampler.as_ref()
                    } else {
                        self.heaps.cbv_srv.as_ref()
                    };
                    let gpu_handle = heap
                        .and_then(|heap| heap.gpu_handle(*heap_base))
                        .ok_or_else(|| {
                            ForgeRenderError::InvalidOperation(
                                "Descriptor table bound before commit_shader_resources".to_string(),
                            )
                        })?;
                    unsafe {
                        list.SetGraphicsRootDescriptorTable(slot as u32, gpu_handle);
                    }
                }
                RootBinding::Cbv(handle) => {
                    let resource = self.buffer_resources.get(*handle).ok_or_else(|| {
                        ForgeRenderError::InvalidContext("Stale buffer handle".to_string())
                    })?;
                    unsafe {
                        list.SetGraphicsRootConstantBufferView(slot as u32, resource.GetGPUVirtualAddress());
                    }
                }
                RootBinding::Srv(handle) => {
                    let resource = self.buffer_resources.get(*handle).ok_or_else(|| {
                        ForgeRenderError::InvalidContext("Stale buffer handle".to_string())
                    })?;
                    unsafe {
                        list.SetGraphicsRootShaderResourceView(slot as u32, resource.GetGPUVirtualAddress());
                    }
                }
            }
        }
        Ok(())
    }

    /// 设置管线状态
    pub fn set_pipeline(&mut self, pso: &ID3D12PipelineState) -> Result<()> {
        self.require_recording()?;
        unsafe {
            self.context.command_list.SetPipelineState(pso);
        }
        Ok(())
    }

    /// 记下顶点缓冲区，下一次 draw 时生效
    pub fn bind_vertex_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.require_recording()?;
        let record = self.registry.buffer(handle)?;
        if !matches!(record.kind, BufferKind::Vertex { .. }) {
            return Err(ForgeRenderError::InvalidParameter(
                "Handle is not a vertex buffer".to_string(),
            ));
        }
        self.pending_vertex = Some(handle);
        Ok(())
    }

    /// 记下索引缓冲区，下一次 draw 时生效
    pub fn bind_index_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.require_recording()?;
        let record = self.registry.buffer(handle)?;
        if !matches!(record.kind, BufferKind::Index) {
            return Err(ForgeRenderError::InvalidParameter(
                "Handle is not an index buffer".to_string(),
            ));
        }
        self.pending_index = Some(handle);
        Ok(())
    }

    /// 把延迟的缓冲区绑定落到命令列表上
    fn flush_input_bindings(&mut self, need_index: bool) -> Result<()> {
        let vertex_handle = self.pending_vertex.ok_or_else(|| {
            ForgeRenderError::InvalidOperation(
                "Draw requires a bound vertex buffer".to_string(),
            )
        })?;
        let record = self.registry.buffer(vertex_handle)?;
        let stride = match record.kind {
            BufferKind::Vertex { stride } => stride,
            _ => unreachable!("bind_vertex_buffer only accepts vertex buffers"),
        };
        let resource = self.buffer_resources.get(vertex_handle).ok_or_else(|| {
            ForgeRenderError::InvalidContext("Stale buffer handle".to_string())
        })?;
        let vertex_view = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { resource.GetGPUVirtualAddress() },
            SizeInBytes: record.size as u32,
            StrideInBytes: stride,
        };

        let index_view = if need_index {
            let index_handle = self.pending_index.ok_or_else(|| {
                ForgeRenderError::InvalidOperation(
                    "Indexed draw requires a bound index buffer".to_string(),
                )
            })?;
            let record = self.registry.buffer(index_handle)?;
            let resource = self.buffer_resources.get(index_handle).ok_or_else(|| {
                ForgeRenderError::InvalidContext("Stale buffer handle".to_string())
            })?;
            Some(D3D12_INDEX_BUFFER_VIEW {
                BufferLocation: unsafe { resource.GetGPUVirtualAddress() },
                SizeInBytes: record.size as u32,
                Format: DXGI_FORMAT_R32_UINT,
            })
        } else {
            None
        };

        let list = &self.context.command_list;
        unsafe {
            list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            list.IASetVertexBuffers(0, Some(&[vertex_view]));
            if let Some(index_view) = &index_view {
                list.IASetIndexBuffer(Some(index_view));
            }
        }
        Ok(())
    }

    /// 非索引绘制
    pub fn draw(&mut self, vertex_count: u32) -> Result<()> {
        self.require_recording()?;
        self.flush_input_bindings(false)?;
        unsafe {
            self.context.command_list.DrawInstanced(vertex_count, 1, 0, 0);
        }
        Ok(())
    }

    /// 索引绘制
    pub fn draw_indexed(&mut self, index_count: u32) -> Result<()> {
        self.require_recording()?;
        self.flush_input_bindings(true)?;
        unsafe {
            self.context
                .command_list
                .DrawIndexedInstanced(index_count, 1, 0, 0, 0);
        }
        Ok(())
    }

    /// 结束录制：提交命令列表、Present 并 signal 栅栏
    pub fn end_frame(&mut self) -> Result<()> {
        self.require_recording()?;

        unsafe {
            let back_buffer: ID3D12Resource = self
                .context
                .swap_chain
                .GetBuffer(self.context.frame_index as u32)?;
            let barrier = transition_barrier(
                &back_buffer,
                to_d3d12_states(ResourceState::RenderTarget),
                to_d3d12_states(ResourceState::Present),
            );
            self.context.command_list.ResourceBarrier(&[barrier]);
        }

        self.context.execute_command_list()?;

        let sync_interval = if self.vsync { 1 } else { 0 };
        unsafe {
            self.context
                .swap_chain
                .Present(sync_interval, DXGI_PRESENT(0))
                .ok()?;
        }

        let next_frame_index =
            unsafe { self.context.swap_chain.GetCurrentBackBufferIndex() } as usize;
        let fence_value = self.pacer.end_frame(next_frame_index);
        self.context
            .fence
            .signal(&self.context.command_queue, fence_value)?;
        self.context.frame_index = next_frame_index;

        self.recording = false;
        self.pending_vertex = None;
        self.pending_index = None;

        #[cfg(debug_assertions)]
        self.context.drain_debug_messages();

        Ok(())
    }

    /// 录制并提交一整帧
    ///
    /// 封装 `begin_frame` → 回调 → `end_frame`；回调出错时
    /// 放弃本帧录制并把错误传回。
    pub fn frame<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.begin_frame()?;
        if let Err(e) = record(self) {
            // 放弃本帧：把命令列表关上，下一帧才能 Reset
            unsafe {
                let _ = self.context.command_list.Close();
            }
            self.recording = false;
            self.pending_vertex = None;
            self.pending_index = None;
            return Err(e);
        }
        self.end_frame()
    }

    /// 阻塞等待 GPU 排空全部在途工作
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        let value = self.pacer.allocate_value();
        self.context.fence.signal(&self.context.command_queue, value)?;
        self.context.fence.wait_blocking(value)
    }
}

impl Drop for Dx12Renderer {
    fn drop(&mut self) {
        // 资源释放前排空 GPU，避免销毁在途资源
        if self.wait_for_gpu().is_err() {
            tracing::warn!("Failed to drain GPU before renderer teardown");
        }
        self.context.drain_debug_messages();
    }
}

fn to_d3d12_sampler(desc: &SamplerDesc) -> D3D12_SAMPLER_DESC {
    let filter = match (desc.filter, desc.comparison.is_some()) {
        (SamplerFilter::Point, false) => D3D12_FILTER_MIN_MAG_MIP_POINT,
        (SamplerFilter::Linear, false) => D3D12_FILTER_MIN_MAG_MIP_LINEAR,
        (SamplerFilter::Anisotropic, false) => D3D12_FILTER_ANISOTROPIC,
        (SamplerFilter::Point, true) => D3D12_FILTER_COMPARISON_MIN_MAG_MIP_POINT,
        (SamplerFilter::Linear, true) => D3D12_FILTER_COMPARISON_MIN_MAG_MIP_LINEAR,
        (SamplerFilter::Anisotropic, true) => D3D12_FILTER_COMPARISON_ANISOTROPIC,
    };
    let address = match desc.address_mode {
        AddressMode::Wrap => D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressMode::Clamp => D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
        AddressMode::Mirror => D3D12_TEXTURE_ADDRESS_MODE_MIRROR,
        AddressMode::Border => D3D12_TEXTURE_ADDRESS_MODE_BORDER,
    };
    let comparison = match desc.comparison {
        Some(CompareFunc::Never) => D3D12_COMPARISON_FUNC_NEVER,
        Some(CompareFunc::Less) => D3D12_COMPARISON_FUNC_LESS,
        Some(CompareFunc::LessEqual) => D3D12_COMPARISON_FUNC_LESS_EQUAL,
        Some(CompareFunc::Always) => D3D12_COMPARISON_FUNC_ALWAYS,
        None => D3D12_COMPARISON_FUNC_NONE,
    };

    D3D12_SAMPLER_DESC {
        Filter: filter,
        AddressU: address,
        AddressV: address,
        AddressW: address,
        MipLODBias: 0.0,
        MaxAnisotropy: 16,
        ComparisonFunc: comparison,
        BorderColor: [0.0, 0.0, 0.0, 0.0],
        MinLOD: 0.0,
        MaxLOD: D3D12_FLOAT32_MAX,
    }
}
