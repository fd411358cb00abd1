// Musical hexagons: NPCs scramble for the safe colour before the rest of the
// floor drops away.
//
// The simulation lives in `game`; this file owns the window, the instanced
// wgpu renderer and the input → camera → HUD loop. `--headless` skips the
// window and just steps the simulation.

mod engine;
mod game;

use std::path::PathBuf;
use std::process::ExitCode;

use bevy_ecs::prelude::*;
use clap::Parser;
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;
use winit::{
    event::{Event as WinitEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::KeyCode,
    window::Window,
};

use engine::camera::OrbitCamera;
use engine::hud::{DebugStats, Hud, RoundHud};
use engine::input::InputState;
use engine::mesh::{self, GpuVertex, RenderMesh};
use engine::{AnimationClip, Animator, Collider, ColliderShape, Material, Transform};
use game::arena::arena_radius;
use game::flag::Flag;
use game::hexagon::HexTile;
use game::npc::{Npc, NpcState};
use game::round::RoundPhase;
use game::{GameConfig, Simulation};

#[derive(Parser, Debug)]
#[command(name = "musical_hexagons", about = "Musical chairs on a collapsing hexagon floor")]
struct Cli {
    /// TOML config file; defaults are used when it does not exist.
    #[arg(long, default_value = "musical_hexagons.toml")]
    config: PathBuf,

    /// Run without a window for this many simulated seconds.
    #[arg(long, value_name = "SECONDS")]
    headless: Option<f32>,
}

// ============================================================================
// INSTANCE DATA (per-entity)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(model: Mat4, color: Material) -> Self {
        let [r, g, b] = color.to_array();
        Self {
            model: model.to_cols_array_2d(),
            color: [r, g, b, 1.0],
        }
    }

    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const VEC4: wgpu::BufferAddress = std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress;
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // Model matrix columns (locations 2-5)
                wgpu::VertexAttribute { offset: 0, shader_location: 2, format: wgpu::VertexFormat::Float32x4 },
                wgpu::VertexAttribute { offset: VEC4, shader_location: 3, format: wgpu::VertexFormat::Float32x4 },
                wgpu::VertexAttribute { offset: VEC4 * 2, shader_location: 4, format: wgpu::VertexFormat::Float32x4 },
                wgpu::VertexAttribute { offset: VEC4 * 3, shader_location: 5, format: wgpu::VertexFormat::Float32x4 },
                // Color (location 6)
                wgpu::VertexAttribute { offset: VEC4 * 4, shader_location: 6, format: wgpu::VertexFormat::Float32x4 },
            ],
        }
    }
}

// ============================================================================
// UNIFORM DATA (camera only)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
}

impl Uniforms {
    fn new(view_proj: Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            light_dir: Vec3::new(-0.4, -1.0, -0.3).normalize().extend(0.0).to_array(),
        }
    }
}

// ============================================================================
// SCENE → INSTANCES
// ============================================================================

const POLE_COLOR: Material = Material::rgb(0.75, 0.75, 0.78);
const POLE_THICKNESS: f32 = 0.12;
const CLOTH_SIZE: Vec3 = Vec3::new(1.4, 0.9, 0.05);
const RUN_BOB_HEIGHT: f32 = 0.08;

/// Per-frame instance lists, one per mesh.
#[derive(Default)]
struct SceneInstances {
    hexes: Vec<InstanceData>,
    boxes: Vec<InstanceData>,
}

/// Model matrix for an NPC body box: the transform sits at the feet, the box
/// is centred, so lift it by half the capsule height and bob while running.
fn npc_model(transform: &Transform, collider: &Collider, animator: Option<&Animator>, elapsed: f32) -> Mat4 {
    let (radius, height) = match collider.shape {
        ColliderShape::Capsule { radius, height } => (radius, height),
        ColliderShape::HexPrism(prism) => (prism.circumradius, prism.height),
    };
    let bob = match animator {
        Some(a) if a.clip == AnimationClip::Run => {
            (elapsed * (6.0 + a.speed * 2.0)).sin().abs() * RUN_BOB_HEIGHT
        }
        _ => 0.0,
    };
    let lift = Vec3::Y * (height * 0.5 + bob);
    Mat4::from_translation(transform.position)
        * Mat4::from_quat(transform.rotation)
        * Mat4::from_translation(lift)
        * Mat4::from_scale(Vec3::new(radius * 2.0, height, radius * 2.0))
}

/// Pole plus cloth. The cloth rides up the pole with `raise`.
fn flag_models(transform: &Transform, raise: f32) -> (Mat4, Option<Mat4>) {
    let height = transform.scale.y;
    let base = transform.position;
    let pole = Mat4::from_translation(base + Vec3::Y * height * 0.5)
        * Mat4::from_scale(Vec3::new(POLE_THICKNESS, height, POLE_THICKNESS));
    if raise <= 0.0 {
        return (pole, None);
    }
    let low = CLOTH_SIZE.y * 0.5;
    let high = height - CLOTH_SIZE.y * 0.5;
    let y = low + (high - low) * raise.clamp(0.0, 1.0);
    let cloth = Mat4::from_translation(base + Vec3::new(CLOTH_SIZE.x * 0.5 + POLE_THICKNESS, y, 0.0))
        * Mat4::from_scale(CLOTH_SIZE);
    (pole, Some(cloth))
}

fn collect_instances(world: &mut World, elapsed: f32) -> SceneInstances {
    let mut scene = SceneInstances::default();

    let mut tiles = world.query_filtered::<(&Transform, &Material), With<HexTile>>();
    for (transform, material) in tiles.iter(world) {
        scene.hexes.push(InstanceData::new(transform.matrix(), *material));
    }

    let mut npcs = world.query_filtered::<(&Transform, &Collider, &Material, Option<&Animator>), With<Npc>>();
    for (transform, collider, material, animator) in npcs.iter(world) {
        let model = npc_model(transform, collider, animator, elapsed);
        scene.boxes.push(InstanceData::new(model, *material));
    }

    let mut flags = world.query::<(&Flag, &Transform, &Material)>();
    for (flag, transform, material) in flags.iter(world) {
        let (pole, cloth) = flag_models(transform, flag.raise());
        scene.boxes.push(InstanceData::new(pole, POLE_COLOR));
        if let Some(cloth) = cloth {
            scene.boxes.push(InstanceData::new(cloth, *material));
        }
    }

    scene
}

fn round_hud(sim: &Simulation) -> RoundHud {
    let round = sim.round();
    let stats = sim.stats();
    let remaining = match round.phase() {
        RoundPhase::WaitingRegeneration => None,
        _ => Some(round.phase_remaining()),
    };
    RoundHud {
        round: round.round(),
        phase: round.phase().label(),
        safe_color: round.safe_color().map(|c| (c.name(), c.rgb().to_array())),
        remaining,
        alive: stats.alive,
        eliminated_total: stats.eliminated_total,
        last_survivors: stats.last_survivors,
        paused: sim.is_paused(),
    }
}

/// Live NPCs that are walking, and how many of those are running for a safe tile.
fn npc_activity(world: &mut World) -> (usize, usize) {
    let mut moving = 0;
    let mut seeking = 0;
    for npc in world.query::<&Npc>().iter(world) {
        if npc.state() == NpcState::Moving {
            moving += 1;
        }
        if npc.is_seeking_safe() {
            seeking += 1;
        }
    }
    (moving, seeking)
}

// ============================================================================
// GPU MESHES
// ============================================================================

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, label: &str, mesh: &RenderMesh) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: mesh.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: mesh.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex_buffer, index_buffer, num_indices: mesh.index_count() }
    }
}

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// FRAME TIMING
// ============================================================================

/// Rolling one-second frame statistics for the F3 panel.
#[derive(Default)]
struct FrameTimer {
    frames: u32,
    window_elapsed: f32,
    sum_ms: f32,
    min_ms: f32,
    max_ms: f32,
    fps: u32,
    avg_ms: f32,
    last_min_ms: f32,
    last_max_ms: f32,
}

impl FrameTimer {
    fn record(&mut self, dt: f32) {
        let ms = dt * 1000.0;
        if self.frames == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        }
        self.frames += 1;
        self.sum_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
        self.window_elapsed += dt;
        if self.window_elapsed >= 1.0 {
            self.fps = self.frames;
            self.avg_ms = self.sum_ms / self.frames as f32;
            self.last_min_ms = self.min_ms;
            self.last_max_ms = self.max_ms;
            self.frames = 0;
            self.sum_ms = 0.0;
            self.window_elapsed = 0.0;
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum SetupError {
    #[error("could not create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("could not open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

struct State {
    window: std::sync::Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    depth_view: wgpu::TextureView,
    hex_mesh: GpuMesh,
    box_mesh: GpuMesh,
    hex_instances: wgpu::Buffer,
    box_instances: wgpu::Buffer,
    max_instances: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    sim: Simulation,
    camera: OrbitCamera,
    input: InputState,
    hud: Hud,
    timer: FrameTimer,
    last_update: std::time::Instant,
    draw_calls: u32,
}

impl State {
    async fn new(window: std::sync::Arc<Window>, game: &GameConfig) -> Result<Self, SetupError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SetupError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_instanced.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms::new(Mat4::IDENTITY)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::desc(), InstanceData::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let hex_mesh = GpuMesh::upload(&device, "Hex", &mesh::triangulate_flat(&mesh::hex_prism()));
        let box_mesh = GpuMesh::upload(&device, "Box", &mesh::triangulate_flat(&mesh::unit_box()));

        let sim = Simulation::new(game);
        let max_instances = (game::arena::tile_count(game.arena.rings) + game.npc.count as usize + 8)
            .max(64);
        let instance_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let hex_instances = instance_buffer("Hex Instance Buffer");
        let box_instances = instance_buffer("Box Instance Buffer");

        let hud = Hud::new(&window, &device, surface_format);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            depth_view,
            hex_mesh,
            box_mesh,
            hex_instances,
            box_instances,
            max_instances,
            uniform_buffer,
            uniform_bind_group,
            sim,
            camera: OrbitCamera::framing(arena_radius(&game.arena)),
            input: InputState::new(),
            hud,
            timer: FrameTimer::default(),
            last_update: std::time::Instant::now(),
            draw_calls: 0,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    fn update(&mut self) {
        let now = std::time::Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;
        self.timer.record(dt);

        if self.input.was_key_pressed(KeyCode::Space) {
            let paused = !self.sim.is_paused();
            self.sim.set_paused(paused);
            log::info!("{}", if paused { "paused" } else { "resumed" });
        }
        if self.input.was_key_pressed(KeyCode::F3) {
            self.hud.toggle_stats();
        }

        self.camera.update(&self.input, dt);
        self.sim.step(dt);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let elapsed = self.sim.elapsed();
        let scene = collect_instances(self.sim.world_mut(), elapsed);
        let hex_count = scene.hexes.len().min(self.max_instances);
        let box_count = scene.boxes.len().min(self.max_instances);
        if hex_count > 0 {
            self.queue.write_buffer(&self.hex_instances, 0, bytemuck::cast_slice(&scene.hexes[..hex_count]));
        }
        if box_count > 0 {
            self.queue.write_buffer(&self.box_instances, 0, bytemuck::cast_slice(&scene.boxes[..box_count]));
        }

        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        let uniforms = Uniforms::new(self.camera.view_projection(aspect));
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let mut draw_calls = 0;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.1,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            // One instanced draw per mesh.
            for (mesh, instances, count) in [
                (&self.hex_mesh, &self.hex_instances, hex_count),
                (&self.box_mesh, &self.box_instances, box_count),
            ] {
                if count == 0 {
                    continue;
                }
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, instances.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.num_indices, 0, 0..count as u32);
                draw_calls += 1;
            }
        }
        self.draw_calls = draw_calls;

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        let round = round_hud(&self.sim);
        let stats = self.hud.stats_visible.then(|| {
            let target = self.camera.target();
            let (npcs_moving, npcs_seeking) = npc_activity(self.sim.world_mut());
            DebugStats {
                fps: self.timer.fps,
                frame_time_avg_ms: self.timer.avg_ms,
                frame_time_min_ms: self.timer.last_min_ms,
                frame_time_max_ms: self.timer.last_max_ms,
                entity_count: self.sim.world().entities().len() as usize,
                npcs_moving,
                npcs_seeking,
                draw_calls: self.draw_calls,
                resolution: (self.size.width, self.size.height),
                camera_target: (target.x, target.y),
                camera_distance: self.camera.distance(),
                sim_time: elapsed,
            }
        });
        self.hud.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            &round,
            stats.as_ref(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

// ============================================================================
// MAIN
// ============================================================================

fn run_headless(config: &GameConfig, seconds: f32) {
    const STEP: f32 = 1.0 / 60.0;
    let mut sim = Simulation::new(config);
    let steps = (seconds.max(0.0) / STEP).ceil() as usize;
    for _ in 0..steps {
        sim.step(STEP);
    }
    let stats = sim.stats();
    log::info!(
        "headless run finished after {:.1}s: round {}, {} alive, {} eliminated",
        sim.elapsed(),
        sim.round().round(),
        stats.alive,
        stats.eliminated_total
    );
}

fn run_windowed(config: &GameConfig) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Musical Hexagons")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = std::sync::Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), config))?;

    #[allow(deprecated)]
    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let response = state.hud.handle_window_event(&window, event);
                if !response.consumed {
                    state.input.process_event(event);
                }
                match event {
                    WindowEvent::CloseRequested => control_flow.exit(),
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        if state.input.was_key_pressed(KeyCode::Escape) {
                            control_flow.exit();
                            return;
                        }
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                log::error!("GPU out of memory");
                                control_flow.exit();
                            }
                            Err(e) => log::warn!("{:?}", e),
                        }
                        // Pressed keys are consumed even when the frame was dropped.
                        state.input.end_frame();
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match GameConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.headless {
        Some(seconds) => run_headless(&config, seconds),
        None => {
            if let Err(e) = run_windowed(&config) {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cli_parses_headless_and_config() {
        let cli = Cli::parse_from(["musical_hexagons", "--config", "x.toml", "--headless", "12.5"]);
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert_eq!(cli.headless, Some(12.5));

        let cli = Cli::parse_from(["musical_hexagons"]);
        assert_eq!(cli.config, PathBuf::from("musical_hexagons.toml"));
        assert!(cli.headless.is_none());
    }

    #[test]
    fn npc_box_stands_on_its_feet_and_bobs_only_when_running() {
        let transform = Transform::from_position(Vec3::new(1.0, 0.0, 2.0));
        let collider = Collider::capsule(0.3, 1.2);
        let idle = npc_model(&transform, &collider, Some(&Animator::default()), 0.3);
        let centre = idle.transform_point3(Vec3::ZERO);
        assert_relative_eq!(centre.y, 0.6, epsilon = 1e-5);
        assert_relative_eq!(idle.transform_point3(Vec3::new(0.0, -0.5, 0.0)).y, 0.0, epsilon = 1e-5);

        let running = Animator { clip: AnimationClip::Run, speed: 3.0 };
        let bobbed = npc_model(&transform, &collider, Some(&running), 0.3).transform_point3(Vec3::ZERO);
        assert!(bobbed.y >= centre.y);
        assert!(bobbed.y <= centre.y + RUN_BOB_HEIGHT + 1e-5);
    }

    #[test]
    fn cloth_rides_the_pole_with_raise() {
        let transform = Transform::from_position(Vec3::ZERO).with_scale(Vec3::new(1.0, 4.0, 1.0));
        let (_, lowered) = flag_models(&transform, 0.0);
        assert!(lowered.is_none());
        let (pole, half) = flag_models(&transform, 0.5);
        let (_, full) = flag_models(&transform, 1.0);
        let half_y = half.unwrap().transform_point3(Vec3::ZERO).y;
        let full_y = full.unwrap().transform_point3(Vec3::ZERO).y;
        assert!(full_y > half_y);
        assert_relative_eq!(full_y, 4.0 - CLOTH_SIZE.y * 0.5, epsilon = 1e-5);
        assert_relative_eq!(pole.transform_point3(Vec3::new(0.0, 0.5, 0.0)).y, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn scene_has_a_hex_per_tile_and_boxes_for_npcs_and_flag() {
        let mut config = GameConfig::default();
        config.seed = Some(11);
        config.arena.rings = 2;
        config.npc.count = 5;
        let mut sim = Simulation::new(&config);
        let scene = collect_instances(sim.world_mut(), 0.0);
        assert_eq!(scene.hexes.len(), game::arena::tile_count(2));
        // 5 NPCs + the pole; the cloth is down before the first round.
        assert_eq!(scene.boxes.len(), 6);
    }

    #[test]
    fn frame_timer_reports_once_per_second() {
        let mut timer = FrameTimer::default();
        for _ in 0..59 {
            timer.record(1.0 / 60.0);
        }
        assert_eq!(timer.fps, 0);
        timer.record(1.0 / 60.0 + 0.001);
        assert_eq!(timer.fps, 60);
        assert_relative_eq!(timer.last_max_ms, 1000.0 / 60.0 + 1.0, epsilon = 1e-3);
    }

    #[test]
    fn hud_hides_countdown_while_regenerating() {
        let mut config = GameConfig::default();
        config.seed = Some(3);
        config.arena.rings = 1;
        config.round.start_delay = 0.5;
        let mut sim = Simulation::new(&config);
        assert!(round_hud(&sim).remaining.is_some());

        let mut steps = 0;
        while sim.round().phase() != RoundPhase::WaitingRegeneration {
            sim.step(1.0 / 60.0);
            steps += 1;
            assert!(steps < 60 * 20, "never reached regeneration");
        }
        let hud = round_hud(&sim);
        assert_eq!(hud.round, 1);
        assert_eq!(hud.phase, RoundPhase::WaitingRegeneration.label());
        assert!(hud.safe_color.is_some());
        assert!(hud.remaining.is_none());
    }

    #[test]
    fn npc_activity_counts_walkers_and_seekers() {
        let mut config = GameConfig::default();
        config.seed = Some(5);
        config.arena.rings = 2;
        config.npc.count = 4;
        let mut sim = Simulation::new(&config);
        for _ in 0..30 {
            sim.step(1.0 / 60.0);
        }
        let (moving, seeking) = npc_activity(sim.world_mut());
        assert!(moving > 0);
        // No warning has run yet.
        assert_eq!(seeking, 0);
    }
}
