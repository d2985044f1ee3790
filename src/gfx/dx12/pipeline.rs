//! 着色器编译与管线状态对象
//!
//! HLSL 源码用 FXC（`D3DCompile`）编译为 SM 5.0 字节码，
//! 编译错误把错误 blob 的文本带回给调用方。
//! 管线状态固定为：不透明绘制、背面剔除、深度测试开。

use tracing::debug;
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::path::Path;

use crate::core::error::{ForgeRenderError, Result};
use crate::gfx::dx12::context::BACK_BUFFER_FORMAT;
use crate::gfx::dx12::root_signature::Dx12RootSignature;

/// 编译好的顶点/像素着色器对
pub struct ShaderProgram {
    vs: ID3DBlob,
    ps: ID3DBlob,
}

unsafe impl Send for ShaderProgram {}

fn compile_stage(source: &str, entry: &str, target: &str) -> Result<ID3DBlob> {
    let entry_c = CString::new(entry).map_err(|_| {
        ForgeRenderError::InvalidParameter(format!("Invalid entry point name: {}", entry))
    })?;
    let target_c = CString::new(target).map_err(|_| {
        ForgeRenderError::InvalidParameter(format!("Invalid shader target: {}", target))
    })?;

    unsafe {
        let mut blob = None;
        let mut error_blob = None;
        let result = D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            PCSTR(entry_c.as_ptr() as _),
            PCSTR(target_c.as_ptr() as _),
            0,
            0,
            &mut blob,
            Some(&mut error_blob),
        );
        if let Err(e) = result {
            let message = error_blob
                .map(|error| {
                    String::from_utf8_lossy(std::slice::from_raw_parts(
                        error.GetBufferPointer() as *const u8,
                        error.GetBufferSize(),
                    ))
                    .into_owned()
                })
                .unwrap_or_else(|| e.message());
            return Err(ForgeRenderError::InvalidParameter(format!(
                "Shader compilation failed ({}): {}",
                entry, message
            )));
        }
        blob.ok_or_else(|| {
            ForgeRenderError::InvalidContext("Shader compilation produced no bytecode".to_string())
        })
    }
}

impl ShaderProgram {
    /// 从 HLSL 源码编译，入口固定为 `VSMain`/`PSMain`
    pub fn from_source(source: &str) -> Result<Self> {
        let vs = compile_stage(source, "VSMain", "vs_5_0")?;
        let ps = compile_stage(source, "PSMain", "ps_5_0")?;
        Ok(Self { vs, ps })
    }

    /// 从 HLSL 文件编译
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let program = Self::from_source(&source)?;
        debug!(path = %path.as_ref().display(), "Shader program compiled");
        Ok(program)
    }

    fn bytecode(blob: &ID3DBlob) -> D3D12_SHADER_BYTECODE {
        unsafe {
            D3D12_SHADER_BYTECODE {
                pShaderBytecode: blob.GetBufferPointer(),
                BytecodeLength: blob.GetBufferSize(),
            }
        }
    }
}

/// 创建图形管线状态对象
///
/// 输入布局与 `crate::geometry::Vertex` 对应：
/// POSITION(float3) + NORMAL(float3) + TEXCOORD(float2)。
pub fn create_graphics_pipeline(
    device: &ID3D12Device,
    program: &ShaderProgram,
    root_signature: &Dx12RootSignature,
    depth_enabled: bool,
) -> Result<ID3D12PipelineState> {
    let input_element_descs = [
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: windows::core::s!("POSITION"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 0,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: windows::core::s!("NORMAL"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 12,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: windows::core::s!("TEXCOORD"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 24,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
    ];

    let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC::default();
    pso_desc.pRootSignature = ManuallyDrop::new(Some(root_signature.native().clone()));
    pso_desc.VS = ShaderProgram::bytecode(&program.vs);
    pso_desc.PS = ShaderProgram::bytecode(&program.ps);
    pso_desc.BlendState = D3D12_BLEND_DESC {
        AlphaToCoverageEnable: false.into(),
        IndependentBlendEnable: false.into(),
        RenderTarget: [
            D3D12_RENDER_TARGET_BLEND_DESC {
                BlendEnable: false.into(),
                LogicOpEnable: false.into(),
                RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
                ..Default::default()
            },
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
            D3D12_RENDER_TARGET_BLEND_DESC::default(),
        ],
    };
    pso_desc.SampleMask = u32::MAX;
    pso_desc.RasterizerState = D3D12_RASTERIZER_DESC {
        FillMode: D3D12_FILL_MODE_SOLID,
        CullMode: D3D12_CULL_MODE_BACK,
        DepthClipEnable: true.into(),
        ..Default::default()
    };
    if depth_enabled {
        pso_desc.DepthStencilState = D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: true.into(),
            DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
            DepthFunc: D3D12_COMPARISON_FUNC_LESS,
            ..Default::default()
        };
        pso_desc.DSVFormat = DXGI_FORMAT_D32_FLOAT;
    }
    pso_desc.InputLayout = D3D12_INPUT_LAYOUT_DESC {
        pInputElementDescs: input_element_descs.as_ptr(),
        NumElements: input_element_descs.len() as u32,
    };
    pso_desc.PrimitiveTopologyType = D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE;
    pso_desc.NumRenderTargets = 1;
    pso_desc.RTVFormats[0] = BACK_BUFFER_FORMAT;
    pso_desc.SampleDesc.Count = 1;

    let pso: ID3D12PipelineState = unsafe { device.CreateGraphicsPipelineState(&pso_desc)? };
    debug!(depth_enabled, "Graphics pipeline state created");
    Ok(pso)
}
