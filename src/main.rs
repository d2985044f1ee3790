//! ForgeRender 演示程序
//!
//! 加载配置、初始化日志，创建窗口并渲染一个受点光源照亮的
//! 旋转贴图立方体。演示完整的资源声明流程：
//! 顶点/索引/常量/结构化缓冲区、纹理、采样器 →
//! commit → 根签名 → 管线 → 帧循环。

use std::process::ExitCode;

use forge_render::core::{config::Config, log as engine_log};
use forge_render::engine_error;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    engine_log::init_logger(
        config.logging.level,
        config.logging.file_output,
        Some(config.logging.log_file.as_str()),
    );

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            engine_error!("Engine terminated with error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn run(_config: Config) -> forge_render::Result<()> {
    Err(forge_render::ForgeRenderError::InvalidContext(
        "The D3D12 backend requires Windows".to_string(),
    ))
}

#[cfg(target_os = "windows")]
fn run(config: Config) -> forge_render::Result<()> {
    use bytemuck::{Pod, Zeroable};
    use nalgebra::{Matrix4, Perspective3, Point3, Vector3};
    use tracing::info;
    use winit::dpi::LogicalSize;
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::window::WindowBuilder;

    use forge_render::core::Clock;
    use forge_render::geometry::{self, Vertex};
    use forge_render::renderer::resource::SamplerDesc;
    use forge_render::{DescriptorRange, Dx12Renderer, RangeEntry, RangeKind, RootParameter, RootSignatureDesc};

    /// 与 forward.hlsl 的 SceneConstants 对应
    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct SceneConstants {
        mvp: [[f32; 4]; 4],
        model: [[f32; 4]; 4],
        time: f32,
        camera_position: [f32; 3],
    }

    /// 与 forward.hlsl 的 Light 对应
    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct Light {
        position: [f32; 3],
        intensity: f32,
        color: [f32; 3],
        padding: f32,
    }

    /// 程序化棋盘格纹理（RGBA8）
    fn checker_texture(size: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let light = ((x / 32) + (y / 32)) % 2 == 0;
                let value = if light { 220 } else { 60 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        pixels
    }

    let event_loop = EventLoop::new().map_err(|e| {
        forge_render::ForgeRenderError::InvalidContext(format!("Failed to create event loop: {}", e))
    })?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let window = WindowBuilder::new()
        .with_title(&config.window.title)
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .with_resizable(false)
        .build(&event_loop)
        .map_err(|e| {
            forge_render::ForgeRenderError::InvalidContext(format!("Failed to create window: {}", e))
        })?;

    let mut renderer = Dx12Renderer::new(&window, &config)?;

    // 场景资源
    let mesh = geometry::cube();
    let vertex_buffer = renderer.create_vertex_buffer(mesh.vertex_bytes(), Vertex::STRIDE)?;
    let index_buffer = renderer.create_index_buffer(mesh.index_bytes())?;
    let index_count = mesh.index_count();

    let constants = renderer.create_constant_buffer(bytemuck::bytes_of(&SceneConstants::zeroed()))?;

    let lights = [
        Light {
            position: [2.0, 2.0, -2.0],
            intensity: 6.0,
            color: [1.0, 0.9, 0.8],
            padding: 0.0,
        },
        Light {
            position: [-3.0, 1.0, 1.0],
            intensity: 3.0,
            color: [0.3, 0.5, 1.0],
            padding: 0.0,
        },
    ];
    let light_buffer = renderer.create_structured_buffer(
        bytemuck::cast_slice(&lights),
        lights.len() as u32,
        std::mem::size_of::<Light>() as u32,
    )?;

    let texture = renderer.create_texture_2d(
        &checker_texture(256),
        256,
        256,
        forge_render::renderer::TextureFormat::Rgba8Unorm,
    )?;
    let sampler = renderer.create_sampler(SamplerDesc::default())?;
    renderer.create_depth_target(config.window.width, config.window.height)?;

    renderer.commit_shader_resources()?;

    // 根签名：表 0 = CBV + SRV，表 1 = 采样器
    let mut signature_desc = RootSignatureDesc::new();
    let mut cbv_range = DescriptorRange::new(RangeKind::Cbv);
    cbv_range.push(RangeEntry::Buffer(constants));
    let mut srv_range = DescriptorRange::new(RangeKind::Srv);
    srv_range.push(RangeEntry::Buffer(light_buffer));
    srv_range.push(RangeEntry::Texture(texture));
    signature_desc.insert(RootParameter::DescriptorTable(vec![cbv_range, srv_range]));
    let mut sampler_range = DescriptorRange::new(RangeKind::Sampler);
    sampler_range.push(RangeEntry::Sampler(sampler));
    signature_desc.insert(RootParameter::DescriptorTable(vec![sampler_range]));

    let root_signature = renderer.create_root_signature(&signature_desc)?;
    let program = renderer.create_program("shaders/forward.hlsl")?;
    let pipeline = renderer.create_pipeline(&program, &root_signature)?;

    info!("Demo scene ready, entering frame loop");

    let mut clock = Clock::new();
    let aspect = config.window.width as f32 / config.window.height as f32;
    let projection = Perspective3::new(aspect, std::f32::consts::FRAC_PI_4, 0.1, 100.0);
    let eye = Point3::new(0.0, 1.5, -4.0);
    let view = Matrix4::look_at_lh(&eye, &Point3::origin(), &Vector3::y());

    let result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => elwt.exit(),
        Event::WindowEvent {
            event: WindowEvent::RedrawRequested,
            ..
        } => {
            clock.tick();
            let time = clock.elapsed_secs();

            let model = Matrix4::from_euler_angles(0.0, time * 0.6, 0.0);
            let mvp = projection.to_homogeneous() * view * model;
            let scene = SceneConstants {
                mvp: mvp.transpose().into(),
                model: model.transpose().into(),
                time,
                camera_position: [eye.x, eye.y, eye.z],
            };

            // 常量缓冲区在帧回调里重写：begin_frame 已等过上一帧，
            // GPU 不再读取旧内容
            let frame_result = renderer.frame(|r| {
                r.update_constant_buffer(constants, bytemuck::bytes_of(&scene))?;
                r.bind_root_signature(&root_signature)?;
                r.set_pipeline(&pipeline)?;
                r.bind_vertex_buffer(vertex_buffer)?;
                r.bind_index_buffer(index_buffer)?;
                r.draw_indexed(index_count)
            });

            if let Err(e) = frame_result {
                engine_error!("Frame failed: {}", e);
                elwt.exit();
            }
        }
        Event::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    });

    result.map_err(|e| {
        forge_render::ForgeRenderError::InvalidContext(format!("Event loop error: {}", e))
    })
}
