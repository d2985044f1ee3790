//! 根签名的 D3D12 翻译
//!
//! `crate::renderer::binding` 解析出的根签名在这里翻译成
//! `D3D12_ROOT_SIGNATURE_DESC` 并序列化。翻译结果同时保留
//! 每个根参数的绑定信息（表的堆基址、直接绑定的缓冲区句柄），
//! 帧录制时据此调用 `SetGraphicsRoot*`。

use tracing::debug;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{ForgeRenderError, Result};
use crate::renderer::binding::{RangeKind, ResolvedParameter, ResolvedRootSignature};
use crate::renderer::resource::BufferHandle;

/// 帧录制时一个根参数的绑定方式
#[derive(Debug, Clone, Copy)]
pub enum RootBinding {
    /// 描述符表：绑定堆中 `heap_base` 处的 GPU 句柄
    Table { heap_base: u32, sampler: bool },
    /// 直接根 CBV：绑定缓冲区的 GPU 虚拟地址
    Cbv(BufferHandle),
    /// 直接根 SRV
    Srv(BufferHandle),
}

/// 序列化完成的根签名
pub struct Dx12RootSignature {
    native: ID3D12RootSignature,
    bindings: Vec<RootBinding>,
}

unsafe impl Send for Dx12RootSignature {}

impl Dx12RootSignature {
    pub fn native(&self) -> &ID3D12RootSignature {
        &self.native
    }

    /// 根参数绑定信息，槽位序号与声明顺序一致
    pub fn bindings(&self) -> &[RootBinding] {
        &self.bindings
    }
}

fn range_type(kind: RangeKind) -> D3D12_DESCRIPTOR_RANGE_TYPE {
    match kind {
        RangeKind::Cbv => D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
        RangeKind::Srv => D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
        RangeKind::Uav => D3D12_DESCRIPTOR_RANGE_TYPE_UAV,
        RangeKind::Sampler => D3D12_DESCRIPTOR_RANGE_TYPE_SAMPLER,
    }
}

/// 把解析后的根签名翻译并序列化为 D3D12 根签名
pub fn create_root_signature(
    device: &ID3D12Device,
    resolved: &ResolvedRootSignature,
) -> Result<Dx12RootSignature> {
    // 范围数组要在序列化前保持地址稳定，先收集再建参数
    let mut range_storage: Vec<Vec<D3D12_DESCRIPTOR_RANGE>> = Vec::new();
    let mut bindings = Vec::with_capacity(resolved.parameters.len());

    for parameter in &resolved.parameters {
        match parameter {
            ResolvedParameter::DescriptorTable { ranges, heap_base, sampler_table } => {
                let d3d_ranges: Vec<D3D12_DESCRIPTOR_RANGE> = ranges
                    .iter()
                    .map(|range| D3D12_DESCRIPTOR_RANGE {
                        RangeType: range_type(range.kind),
                        NumDescriptors: range.count,
                        BaseShaderRegister: range.base_register,
                        RegisterSpace: 0,
                        // 表基址指向最小堆偏移，范围内偏移按差值排
                        OffsetInDescriptorsFromTableStart: range.heap_base - heap_base,
                    })
                    .collect();
                range_storage.push(d3d_ranges);
                bindings.push(RootBinding::Table {
                    heap_base: *heap_base,
                    sampler: *sampler_table,
                });
            }
            ResolvedParameter::ConstantBuffer { buffer, .. } => {
                range_storage.push(Vec::new());
                bindings.push(RootBinding::Cbv(*buffer));
            }
            ResolvedParameter::ShaderResource { buffer, .. } => {
                range_storage.push(Vec::new());
                bindings.push(RootBinding::Srv(*buffer));
            }
        }
    }

    let parameters: Vec<D3D12_ROOT_PARAMETER> = resolved
        .parameters
        .iter()
        .zip(range_storage.iter())
        .map(|(parameter, ranges)| match parameter {
            ResolvedParameter::DescriptorTable { .. } => D3D12_ROOT_PARAMETER {
                ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                Anonymous: D3D12_ROOT_PARAMETER_0 {
                    DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                        NumDescriptorRanges: ranges.len() as u32,
                        pDescriptorRanges: ranges.as_ptr(),
                    },
                },
                ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
            },
            ResolvedParameter::ConstantBuffer { register, .. } => D3D12_ROOT_PARAMETER {
                ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
                Anonymous: D3D12_ROOT_PARAMETER_0 {
                    Descriptor: D3D12_ROOT_DESCRIPTOR {
                        ShaderRegister: *register,
                        RegisterSpace: 0,
                    },
                },
                ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
            },
            ResolvedParameter::ShaderResource { register, .. } => D3D12_ROOT_PARAMETER {
                ParameterType: D3D12_ROOT_PARAMETER_TYPE_SRV,
                Anonymous: D3D12_ROOT_PARAMETER_0 {
                    Descriptor: D3D12_ROOT_DESCRIPTOR {
                        ShaderRegister: *register,
                        RegisterSpace: 0,
                    },
                },
                ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
            },
        })
        .collect();

    let root_desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: parameters.len() as u32,
        pParameters: parameters.as_ptr(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        ..Default::default()
    };

    unsafe {
        let mut signature = None;
        let mut error_blob = None;
        let serialize_result = D3D12SerializeRootSignature(
            &root_desc,
            D3D_ROOT_SIGNATURE_VERSION_1,
            &mut signature,
            Some(&mut error_blob),
        );
        if let Err(e) = serialize_result {
            let message = error_blob
                .map(|blob| {
                    String::from_utf8_lossy(std::slice::from_raw_parts(
                        blob.GetBufferPointer() as *const u8,
                        blob.GetBufferSize(),
                    ))
                    .into_owned()
                })
                .unwrap_or_else(|| e.message());
            return Err(ForgeRenderError::Internal {
                code: e.code().0,
                message: format!("Root signature serialization failed: {}", message),
            });
        }
        let signature = signature.ok_or_else(|| {
            ForgeRenderError::InvalidContext(
                "Root signature serialization produced no blob".to_string(),
            )
        })?;

        let native: ID3D12RootSignature = device.CreateRootSignature(
            0,
            std::slice::from_raw_parts(
                signature.GetBufferPointer() as _,
                signature.GetBufferSize(),
            ),
        )?;

        debug!(parameters = bindings.len(), "Root signature created");

        Ok(Dx12RootSignature { native, bindings })
    }
}
