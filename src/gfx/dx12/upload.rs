//! 资源上传管线
//!
//! 两段式上传：数据先写进 CPU 可见的暂存缓冲区，再由命令列表
//! 拷贝进 GPU 专属资源并转换到最终状态。`CpuAccess::Write` 的
//! 缓冲区直接分配在上传堆上，跳过拷贝，可以每帧重新映射写入。
//!
//! 拷贝执行后阻塞等待栅栏：上传都发生在初始化阶段，
//! 简单性优先于吞吐。

use std::mem::ManuallyDrop;
use tracing::debug;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{ForgeRenderError, Result};
use crate::gfx::dx12::context::Dx12Context;
use crate::renderer::resource::{
    subresource_offset, CpuAccess, ResourceState, TextureFormat, TextureKind,
};

/// 资源状态到 D3D12 的映射
pub fn to_d3d12_states(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Common => D3D12_RESOURCE_STATE_COMMON,
        ResourceState::CopyDest => D3D12_RESOURCE_STATE_COPY_DEST,
        ResourceState::CopySource => D3D12_RESOURCE_STATE_COPY_SOURCE,
        ResourceState::GenericRead => D3D12_RESOURCE_STATE_GENERIC_READ,
        ResourceState::VertexAndConstantBuffer => {
            D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER
        }
        ResourceState::IndexBuffer => D3D12_RESOURCE_STATE_INDEX_BUFFER,
        ResourceState::ShaderResource => {
            D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE
                | D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE
        }
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
        ResourceState::DepthWrite => D3D12_RESOURCE_STATE_DEPTH_WRITE,
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
    }
}

/// 纹理格式到 DXGI 的映射
pub fn to_dxgi_format(format: TextureFormat) -> DXGI_FORMAT {
    match format {
        TextureFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        TextureFormat::Bgra8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        TextureFormat::Rgba32Float => DXGI_FORMAT_R32G32B32A32_FLOAT,
        TextureFormat::Depth32Float => DXGI_FORMAT_D32_FLOAT,
    }
}

/// 状态转换屏障
pub fn transition_barrier(
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: ManuallyDrop::new(Some(resource.clone())),
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    }
}

/// 创建缓冲区资源
///
/// `CpuAccess::Write` 分配在上传堆（GENERIC_READ），
/// `None` 分配在默认堆，初始为 COPY_DEST 等待暂存拷贝。
pub fn create_buffer_resource(
    device: &ID3D12Device,
    cpu_access: CpuAccess,
    size: u64,
) -> Result<ID3D12Resource> {
    let (heap_type, initial_state) = match cpu_access {
        CpuAccess::Write => (D3D12_HEAP_TYPE_UPLOAD, D3D12_RESOURCE_STATE_GENERIC_READ),
        CpuAccess::None => (D3D12_HEAP_TYPE_DEFAULT, D3D12_RESOURCE_STATE_COPY_DEST),
    };

    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: heap_type,
        ..Default::default()
    };
    let resource_desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Width: size,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        ..Default::default()
    };

    let mut resource: Option<ID3D12Resource> = None;
    unsafe {
        device.CreateCommittedResource(
            &heap_props,
            D3D12_HEAP_FLAG_NONE,
            &resource_desc,
            initial_state,
            None,
            &mut resource,
        )?;
    }
    resource.ok_or_else(|| {
        ForgeRenderError::OutOfMemory(format!("Failed to allocate {} byte buffer", size))
    })
}

/// 映射上传堆缓冲区并写入数据
pub fn write_buffer(resource: &ID3D12Resource, data: &[u8]) -> Result<()> {
    unsafe {
        let mut mapped = std::ptr::null_mut();
        resource.Map(0, None, Some(&mut mapped))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
        resource.Unmap(0, None);
    }
    Ok(())
}

impl Dx12Context {
    /// 重置命令分配器和命令列表，进入录制状态
    pub fn reset_command_list(&self) -> Result<()> {
        unsafe {
            self.command_allocator.Reset()?;
            self.command_list.Reset(&self.command_allocator, None)?;
        }
        Ok(())
    }

    /// 关闭命令列表并提交到队列
    pub fn execute_command_list(&self) -> Result<()> {
        unsafe {
            self.command_list.Close()?;
            let lists = [Some(ID3D12CommandList::from(self.command_list.clone()))];
            self.command_queue.ExecuteCommandLists(&lists);
        }
        Ok(())
    }

    /// 提交当前命令列表并阻塞到 GPU 执行完
    pub fn execute_and_wait(&self, fence_value: u64) -> Result<()> {
        self.execute_command_list()?;
        self.fence.signal(&self.command_queue, fence_value)?;
        self.fence.wait_blocking(fence_value)
    }

    /// 两段式上传一个缓冲区
    ///
    /// 阻塞等待拷贝完成后暂存缓冲区即可释放。
    pub fn upload_buffer(
        &self,
        data: &[u8],
        size: u64,
        cpu_access: CpuAccess,
        final_state: ResourceState,
        fence_value: u64,
    ) -> Result<ID3D12Resource> {
        let resource = create_buffer_resource(&self.device, cpu_access, size)?;

        match cpu_access {
            CpuAccess::Write => {
                if !data.is_empty() {
                    write_buffer(&resource, data)?;
                }
            }
            CpuAccess::None => {
                let staging =
                    create_buffer_resource(&self.device, CpuAccess::Write, data.len() as u64)?;
                write_buffer(&staging, data)?;

                self.reset_command_list()?;
                unsafe {
                    self.command_list.CopyBufferRegion(
                        &resource,
                        0,
                        &staging,
                        0,
                        data.len() as u64,
                    );
                    let barrier = transition_barrier(
                        &resource,
                        D3D12_RESOURCE_STATE_COPY_DEST,
                        to_d3d12_states(final_state),
                    );
                    self.command_list.ResourceBarrier(&[barrier]);
                }
                self.execute_and_wait(fence_value)?;
            }
        }

        debug!(size, ?cpu_access, "Buffer uploaded");
        Ok(resource)
    }

    /// 上传纹理
    ///
    /// `array_size` 为 1 是普通 2D 纹理，为 6 是立方体贴图；
    /// `data` 按子资源顺序排列，每个子资源紧凑（无行对齐）。
    /// 暂存缓冲区按 `GetCopyableFootprints` 给出的行距重排。
    pub fn upload_texture(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        format: TextureFormat,
        array_size: u16,
        fence_value: u64,
    ) -> Result<ID3D12Resource> {
        let dxgi_format = to_dxgi_format(format);
        let bytes_per_pixel = format.bytes_per_pixel();
        let subresources = array_size as u32;

        let expected = (width as usize) * (height as usize) * bytes_per_pixel as usize
            * subresources as usize;
        if data.len() != expected {
            return Err(ForgeRenderError::InvalidParameter(format!(
                "Texture data is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: array_size,
            MipLevels: 1,
            Format: dxgi_format,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            ..Default::default()
        };

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.device.CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                D3D12_RESOURCE_STATE_COPY_DEST,
                None,
                &mut resource,
            )?;
        }
        let resource = resource.ok_or_else(|| {
            ForgeRenderError::OutOfMemory(format!(
                "Failed to allocate {}x{}x{} texture",
                width, height, array_size
            ))
        })?;

        unsafe {
            let mut layouts =
                vec![D3D12_PLACED_SUBRESOURCE_FOOTPRINT::default(); subresources as usize];
            let mut num_rows = vec![0u32; subresources as usize];
            let mut row_sizes = vec![0u64; subresources as usize];
            let mut total_bytes = 0u64;
            self.device.GetCopyableFootprints(
                &resource_desc,
                0,
                subresources,
                0,
                Some(layouts.as_mut_ptr()),
                Some(num_rows.as_mut_ptr()),
                Some(row_sizes.as_mut_ptr()),
                Some(&mut total_bytes),
            );

            let staging = create_buffer_resource(&self.device, CpuAccess::Write, total_bytes)?;

            // 按行距重排进暂存缓冲区
            let mut mapped = std::ptr::null_mut();
            staging.Map(0, None, Some(&mut mapped))?;
            let src_row_pitch = (width * bytes_per_pixel) as usize;
            for (sub, layout) in layouts.iter().enumerate() {
                let dst_base =
                    (mapped as *mut u8).add(layout.Offset as usize);
                let dst_row_pitch = layout.Footprint.RowPitch as usize;
                let src_base = data
                    .as_ptr()
                    .add(subresource_offset(width, height, format, sub as u32));
                for row in 0..num_rows[sub] as usize {
                    std::ptr::copy_nonoverlapping(
                        src_base.add(row * src_row_pitch),
                        dst_base.add(row * dst_row_pitch),
                        row_sizes[sub] as usize,
                    );
                }
            }
            staging.Unmap(0, None);

            self.reset_command_list()?;
            for (sub, layout) in layouts.iter().enumerate() {
                let dst = D3D12_TEXTURE_COPY_LOCATION {
                    pResource: ManuallyDrop::new(Some(resource.clone())),
                    Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                    Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                        SubresourceIndex: sub as u32,
                    },
                };
                let src = D3D12_TEXTURE_COPY_LOCATION {
                    pResource: ManuallyDrop::new(Some(staging.clone())),
                    Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                    Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                        PlacedFootprint: *layout,
                    },
                };
                self.command_list.CopyTextureRegion(&dst, 0, 0, 0, &src, None);
            }
            let barrier = transition_barrier(
                &resource,
                D3D12_RESOURCE_STATE_COPY_DEST,
                to_d3d12_states(ResourceState::ShaderResource),
            );
            self.command_list.ResourceBarrier(&[barrier]);
            self.execute_and_wait(fence_value)?;
        }

        debug!(width, height, array_size, "Texture uploaded");
        Ok(resource)
    }

    /// 创建渲染目标或深度目标纹理
    ///
    /// 目标纹理不走上传管线，带优化清除值直接创建在默认堆。
    pub fn create_target_texture(
        &self,
        kind: TextureKind,
        width: u32,
        height: u32,
        format: TextureFormat,
        clear_color: [f32; 4],
    ) -> Result<ID3D12Resource> {
        let dxgi_format = to_dxgi_format(format);
        let (flags, initial_state, clear_value) = match kind {
            TextureKind::DepthTarget => (
                D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
                D3D12_RESOURCE_STATE_DEPTH_WRITE,
                D3D12_CLEAR_VALUE {
                    Format: dxgi_format,
                    Anonymous: D3D12_CLEAR_VALUE_0 {
                        DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                            Depth: 1.0,
                            Stencil: 0,
                        },
                    },
                },
            ),
            TextureKind::ColorTarget => (
                D3D12_RESOURCE_FLAG_ALLOW_RENDER_TARGET,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_CLEAR_VALUE {
                    Format: dxgi_format,
                    Anonymous: D3D12_CLEAR_VALUE_0 { Color: clear_color },
                },
            ),
            _ => {
                return Err(ForgeRenderError::InvalidParameter(
                    "Target texture must be a render or depth target".to_string(),
                ))
            }
        };

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: dxgi_format,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: flags,
            ..Default::default()
        };

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.device.CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                initial_state,
                Some(&clear_value),
                &mut resource,
            )?;
        }
        resource.ok_or_else(|| {
            ForgeRenderError::OutOfMemory(format!(
                "Failed to allocate {}x{} target texture",
                width, height
            ))
        })
    }
}
