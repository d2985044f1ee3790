//! DirectX 12 描述符堆封装
//!
//! 包装 `ID3D12DescriptorHeap`，按索引换算 CPU/GPU 句柄。
//! 堆的容量和每个资源的槽位偏移由
//! `crate::renderer::layout` 在 commit 时规划，这里只负责创建
//! 堆对象和句柄运算。

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::Result;
use crate::renderer::layout::HeapDemand;

/// 描述符堆类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapKind {
    /// CBV/SRV/UAV 共享堆
    CbvSrvUav,
    /// 采样器堆
    Sampler,
    /// 渲染目标视图堆
    Rtv,
    /// 深度模板视图堆
    Dsv,
}

impl HeapKind {
    fn to_d3d12(self) -> D3D12_DESCRIPTOR_HEAP_TYPE {
        match self {
            HeapKind::CbvSrvUav => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
            HeapKind::Sampler => D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
            HeapKind::Rtv => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            HeapKind::Dsv => D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        }
    }

    fn name(self) -> &'static str {
        match self {
            HeapKind::CbvSrvUav => "CBV/SRV/UAV",
            HeapKind::Sampler => "Sampler",
            HeapKind::Rtv => "RTV",
            HeapKind::Dsv => "DSV",
        }
    }
}

/// 描述符堆
pub struct DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    kind: HeapKind,
    increment_size: u32,
    cpu_start: usize,
    /// GPU 句柄基址，仅着色器可见堆有
    gpu_start: Option<u64>,
    num_descriptors: u32,
}

unsafe impl Send for DescriptorHeap {}

impl DescriptorHeap {
    /// 创建描述符堆
    pub fn new(
        device: &ID3D12Device,
        kind: HeapKind,
        num_descriptors: u32,
        shader_visible: bool,
    ) -> Result<Self> {
        unsafe {
            let flags = if shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            };

            let heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
                Type: kind.to_d3d12(),
                NumDescriptors: num_descriptors,
                Flags: flags,
                NodeMask: 0,
            };
            let heap: ID3D12DescriptorHeap = device.CreateDescriptorHeap(&heap_desc)?;

            let wide_name: Vec<u16> = format!("{} heap", kind.name())
                .encode_utf16()
                .chain(Some(0))
                .collect();
            let _ = heap.SetName(windows::core::PCWSTR(wide_name.as_ptr()));

            let increment_size = device.GetDescriptorHandleIncrementSize(kind.to_d3d12());
            let cpu_start = heap.GetCPUDescriptorHandleForHeapStart().ptr;
            let gpu_start = if shader_visible {
                Some(heap.GetGPUDescriptorHandleForHeapStart().ptr)
            } else {
                None
            };

            tracing::debug!(
                kind = kind.name(),
                num_descriptors,
                shader_visible,
                "Descriptor heap created"
            );

            Ok(Self {
                heap,
                kind,
                increment_size,
                cpu_start,
                gpu_start,
                num_descriptors,
            })
        }
    }

    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    pub fn kind(&self) -> HeapKind {
        self.kind
    }

    pub fn num_descriptors(&self) -> u32 {
        self.num_descriptors
    }

    /// 指定槽位的 CPU 句柄
    pub fn cpu_handle(&self, index: u32) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: self.cpu_start + (index * self.increment_size) as usize,
        }
    }

    /// 指定槽位的 GPU 句柄（仅着色器可见堆）
    pub fn gpu_handle(&self, index: u32) -> Option<D3D12_GPU_DESCRIPTOR_HANDLE> {
        self.gpu_start.map(|start| D3D12_GPU_DESCRIPTOR_HANDLE {
            ptr: start + (index * self.increment_size) as u64,
        })
    }
}

/// commit 时创建的着色器可见堆
///
/// 某类需求为 0 时对应堆不创建。
#[derive(Default)]
pub struct ShaderVisibleHeaps {
    pub cbv_srv: Option<DescriptorHeap>,
    pub sampler: Option<DescriptorHeap>,
}

impl ShaderVisibleHeaps {
    /// 按布局需求创建堆
    pub fn from_demand(device: &ID3D12Device, demand: &HeapDemand) -> Result<Self> {
        let cbv_srv = if demand.cbv_srv_uav > 0 {
            Some(DescriptorHeap::new(
                device,
                HeapKind::CbvSrvUav,
                demand.cbv_srv_uav,
                true,
            )?)
        } else {
            None
        };
        let sampler = if demand.sampler > 0 {
            Some(DescriptorHeap::new(
                device,
                HeapKind::Sampler,
                demand.sampler,
                true,
            )?)
        } else {
            None
        };
        Ok(Self { cbv_srv, sampler })
    }

    /// SetDescriptorHeaps 用的堆数组
    pub fn bind_list(&self) -> Vec<Option<ID3D12DescriptorHeap>> {
        let mut heaps = Vec::new();
        if let Some(heap) = &self.cbv_srv {
            heaps.push(Some(heap.heap().clone()));
        }
        if let Some(heap) = &self.sampler {
            heaps.push(Some(heap.heap().clone()));
        }
        heaps
    }
}
