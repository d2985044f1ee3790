//! DirectX 12 设备上下文
//!
//! 封装设备、命令队列、交换链等核心对象的创建。
//!
//! # 初始化流程
//!
//! 1. 启用调试层（仅 Debug 模式）
//! 2. 创建 DXGI 工厂
//! 3. 创建 D3D12 设备（配置 `use_warp` 时走 WARP 软件适配器）
//! 4. 创建命令队列
//! 5. 创建交换链（双缓冲，FLIP_DISCARD）
//! 6. 创建 RTV/DSV 堆并为后缓冲建 RTV
//! 7. 创建命令分配器、命令列表和栅栏

use tracing::{debug, info, warn};
use windows::{
    core::Interface, Win32::Foundation::RECT, Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D12::*, Win32::Graphics::Dxgi::Common::*, Win32::Graphics::Dxgi::*,
};
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;

use crate::core::error::{ForgeRenderError, Result};
use crate::core::Config;
use crate::gfx::dx12::descriptor::{DescriptorHeap, HeapKind};
use crate::gfx::dx12::sync::GpuFence;
use crate::renderer::layout::{DSV_HEAP_CAPACITY, RTV_TARGET_CAPACITY};
use crate::renderer::sync::FRAME_COUNT;

/// RTV 堆容量：交换链后缓冲 + 离屏颜色目标的预留
pub const RTV_HEAP_CAPACITY: u32 = FRAME_COUNT as u32 + RTV_TARGET_CAPACITY;

/// 交换链像素格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// 枚举硬件适配器，返回第一个支持 D3D12 的非软件适配器
///
/// 全部失败时退回默认适配器会掩盖配置问题，直接报错。
fn select_hardware_adapter(factory: &IDXGIFactory4) -> Result<IDXGIAdapter1> {
    unsafe {
        for index in 0.. {
            let adapter: IDXGIAdapter1 = match factory.EnumAdapters1(index) {
                Ok(adapter) => adapter,
                Err(_) => break,
            };
            let desc = adapter.GetDesc1()?;
            if (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0 {
                continue;
            }
            // 只探测支持情况，不保留探测设备
            let mut candidate: Option<ID3D12Device> = None;
            if D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut candidate).is_ok() {
                let name = String::from_utf16_lossy(
                    &desc.Description[..desc
                        .Description
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(desc.Description.len())],
                );
                debug!(adapter = %name, "Hardware adapter selected");
                return Ok(adapter);
            }
        }
    }
    Err(ForgeRenderError::InvalidContext(
        "No D3D12-capable hardware adapter found".to_string(),
    ))
}

/// DirectX 12 设备上下文
///
/// 持有设备生命周期内不变的核心对象。描述符提交产生的
/// 着色器可见堆和资源归 `Dx12Renderer` 管。
pub struct Dx12Context {
    /// D3D12 设备
    pub device: ID3D12Device,
    /// 命令队列
    pub command_queue: ID3D12CommandQueue,
    /// 交换链
    pub swap_chain: IDXGISwapChain3,
    /// 后缓冲 RTV 和离屏颜色目标共用的 RTV 堆
    pub rtv_heap: DescriptorHeap,
    /// DSV 堆，容量固定
    pub dsv_heap: DescriptorHeap,
    /// 命令分配器
    pub command_allocator: ID3D12CommandAllocator,
    /// 命令列表，录制一帧后 Close，下一帧 Reset
    pub command_list: ID3D12GraphicsCommandList,
    /// CPU-GPU 同步栅栏
    pub fence: GpuFence,
    /// 当前后缓冲索引
    pub frame_index: usize,
    /// 视口
    pub viewport: D3D12_VIEWPORT,
    /// 裁剪矩形
    pub scissor_rect: RECT,
    /// 窗口宽度
    pub width: u32,
    /// 窗口高度
    pub height: u32,
}

unsafe impl Send for Dx12Context {}

impl Dx12Context {
    /// 创建设备上下文
    pub fn new(window: &Window, config: &Config) -> Result<Self> {
        let width = config.window.width;
        let height = config.window.height;

        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug_interface: Option<ID3D12Debug> = None;
                if D3D12GetDebugInterface(&mut debug_interface).is_ok() {
                    if let Some(debug_interface) = debug_interface {
                        debug_interface.EnableDebugLayer();
                        debug!("D3D12 debug layer enabled");
                    }
                } else {
                    warn!("Failed to enable D3D12 debug layer");
                }
            }

            let factory_flags = if cfg!(debug_assertions) {
                DXGI_CREATE_FACTORY_DEBUG
            } else {
                DXGI_CREATE_FACTORY_FLAGS(0)
            };
            let factory: IDXGIFactory4 = CreateDXGIFactory2(factory_flags)?;

            let mut device: Option<ID3D12Device> = None;
            if config.graphics.use_warp {
                let adapter: IDXGIAdapter = factory.EnumWarpAdapter()?;
                D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device)?;
                info!("D3D12 device created on WARP adapter");
            } else {
                let adapter = select_hardware_adapter(&factory)?;
                D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device)?;
                debug!("D3D12 device created on hardware adapter");
            }
            let device = device.ok_or_else(|| {
                ForgeRenderError::InvalidContext("D3D12CreateDevice returned no device".to_string())
            })?;

            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let command_queue: ID3D12CommandQueue = device.CreateCommandQueue(&queue_desc)?;

            let window_handle = window.window_handle().map_err(|e| {
                ForgeRenderError::InvalidContext(format!("Failed to get window handle: {}", e))
            })?;
            let hwnd = match window_handle.as_raw() {
                RawWindowHandle::Win32(win32_handle) => windows::Win32::Foundation::HWND(
                    win32_handle.hwnd.get() as *mut core::ffi::c_void,
                ),
                _ => {
                    return Err(ForgeRenderError::InvalidContext(
                        "Expected Win32 window handle".to_string(),
                    ))
                }
            };

            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    ..Default::default()
                },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: FRAME_COUNT as u32,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                ..Default::default()
            };
            let swap_chain: IDXGISwapChain1 =
                factory.CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)?;
            let swap_chain: IDXGISwapChain3 = swap_chain.cast()?;

            info!(width, height, buffers = FRAME_COUNT, "Swap chain created");

            // RTV 堆前 FRAME_COUNT 个槽位给后缓冲
            let rtv_heap = DescriptorHeap::new(&device, HeapKind::Rtv, RTV_HEAP_CAPACITY, false)?;
            for i in 0..FRAME_COUNT {
                let surface: ID3D12Resource = swap_chain.GetBuffer(i as u32)?;
                device.CreateRenderTargetView(&surface, None, rtv_heap.cpu_handle(i as u32));
            }

            let dsv_heap = DescriptorHeap::new(&device, HeapKind::Dsv, DSV_HEAP_CAPACITY, false)?;

            let command_allocator: ID3D12CommandAllocator =
                device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)?;
            let command_list: ID3D12GraphicsCommandList =
                device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &command_allocator, None)?;
            // 命令列表创建时处于录制状态，先关上让每帧统一 Reset
            command_list.Close()?;

            let fence = GpuFence::new(&device)?;
            let frame_index = swap_chain.GetCurrentBackBufferIndex() as usize;

            let viewport = D3D12_VIEWPORT {
                TopLeftX: 0.0,
                TopLeftY: 0.0,
                Width: width as f32,
                Height: height as f32,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            };
            let scissor_rect = RECT {
                left: 0,
                top: 0,
                right: width as i32,
                bottom: height as i32,
            };

            info!("D3D12 context initialization complete");

            Ok(Self {
                device,
                command_queue,
                swap_chain,
                rtv_heap,
                dsv_heap,
                command_allocator,
                command_list,
                fence,
                frame_index,
                viewport,
                scissor_rect,
                width,
                height,
            })
        }
    }

    /// 把调试层积压的消息转发到日志并清空
    ///
    /// 调试层未启用时信息队列接口不存在，静默跳过。
    pub fn drain_debug_messages(&self) {
        let info_queue: ID3D12InfoQueue = match self.device.cast() {
            Ok(queue) => queue,
            Err(_) => return,
        };

        unsafe {
            let count = info_queue.GetNumStoredMessages();
            for i in 0..count {
                let mut length: usize = 0;
                if info_queue.GetMessage(i, None, &mut length).is_err() || length == 0 {
                    continue;
                }
                let mut buffer = vec![0u8; length];
                let message = buffer.as_mut_ptr() as *mut D3D12_MESSAGE;
                if info_queue.GetMessage(i, Some(message), &mut length).is_ok() {
                    let message = &*message;
                    let description = std::slice::from_raw_parts(
                        message.pDescription.0,
                        message.DescriptionByteLength.saturating_sub(1),
                    );
                    let text = String::from_utf8_lossy(description);
                    match message.Severity {
                        D3D12_MESSAGE_SEVERITY_CORRUPTION | D3D12_MESSAGE_SEVERITY_ERROR => {
                            tracing::error!(target: "forge_render::d3d12", "{}", text)
                        }
                        D3D12_MESSAGE_SEVERITY_WARNING => {
                            tracing::warn!(target: "forge_render::d3d12", "{}", text)
                        }
                        _ => tracing::debug!(target: "forge_render::d3d12", "{}", text),
                    }
                }
            }
            info_queue.ClearStoredMessages();
        }
    }
}
