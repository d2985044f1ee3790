//! GPU 栅栏封装
//!
//! 包装 `ID3D12Fence` 和等待事件。值的分配和等待判定
//! 在 `crate::renderer::sync::FramePacer` 中，这里只做
//! signal 和阻塞等待两个设备操作。

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};

use crate::core::error::Result;

/// GPU 栅栏
///
/// 等待使用 INFINITE 超时：命令列表都是有限长的一帧工作，
/// 设备移除时 `Signal`/`Present` 会先报错。
pub struct GpuFence {
    fence: ID3D12Fence,
    event: HANDLE,
}

unsafe impl Send for GpuFence {}

impl GpuFence {
    /// 创建初值为 0 的栅栏
    pub fn new(device: &ID3D12Device) -> Result<Self> {
        unsafe {
            let fence: ID3D12Fence = device.CreateFence(0, D3D12_FENCE_FLAG_NONE)?;
            let event = CreateEventA(None, false, false, None)?;
            Ok(Self { fence, event })
        }
    }

    /// 在命令队列上 signal 指定值
    pub fn signal(&self, queue: &ID3D12CommandQueue, value: u64) -> Result<()> {
        unsafe { queue.Signal(&self.fence, value)? };
        Ok(())
    }

    /// GPU 已完成的栅栏值
    pub fn completed(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    /// 阻塞等待 GPU 越过 `value`
    ///
    /// 已完成时直接返回，不触碰事件。
    pub fn wait_blocking(&self, value: u64) -> Result<()> {
        unsafe {
            if self.fence.GetCompletedValue() < value {
                self.fence.SetEventOnCompletion(value, self.event)?;
                WaitForSingleObject(self.event, INFINITE);
            }
        }
        Ok(())
    }
}

impl Drop for GpuFence {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.event);
        }
    }
}
