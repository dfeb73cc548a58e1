use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use parking_lot::Mutex;
use vello::wgpu;

use crate::{
    foundation::error::{ShadowError, ShadowResult},
    gpu::{
        backend::GpuBackend,
        command::{BatchTiming, Command, CommandBatch, Completion, KernelKind},
        image::{GpuImage, ImageDesc, ImageStorage, to_rgba_bytes},
        queue::{DeviceQueue, Executor},
        raster::DrawList,
    },
};

const WORKGROUP: u32 = 8;

const KERNELS_WGSL: &str = r#"
@group(0) @binding(0) var t_a: texture_2d<f32>;
@group(0) @binding(1) var t_b: texture_2d<f32>;
@group(0) @binding(2) var t_out: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(3) var<uniform> params: vec4<f32>;

fn luma(c: vec4<f32>) -> f32 {
  return dot(c.rgb, vec3<f32>(77.0, 150.0, 29.0) / 256.0);
}

fn in_bounds(id: vec3<u32>) -> bool {
  let dims = textureDimensions(t_out);
  return id.x < dims.x && id.y < dims.y;
}

@compute @workgroup_size(8, 8)
fn add_sat(@builtin(global_invocation_id) id: vec3<u32>) {
  if (!in_bounds(id)) { return; }
  let p = vec2<i32>(id.xy);
  let c = textureLoad(t_a, p, 0) + textureLoad(t_b, p, 0);
  textureStore(t_out, p, min(c, vec4<f32>(1.0)));
}

@compute @workgroup_size(8, 8)
fn threshold_binary(@builtin(global_invocation_id) id: vec3<u32>) {
  if (!in_bounds(id)) { return; }
  let p = vec2<i32>(id.xy);
  let c = textureLoad(t_a, p, 0);
  let v = select(0.0, params.y, luma(c) > params.x);
  textureStore(t_out, p, vec4<f32>(v, v, v, c.a));
}

@compute @workgroup_size(8, 8)
fn threshold_to_zero(@builtin(global_invocation_id) id: vec3<u32>) {
  if (!in_bounds(id)) { return; }
  let p = vec2<i32>(id.xy);
  let c = textureLoad(t_a, p, 0);
  let l = luma(c);
  let v = select(0.0, l, l > params.x);
  textureStore(t_out, p, vec4<f32>(v, v, v, c.a));
}

@compute @workgroup_size(8, 8)
fn gray_mix_red(@builtin(global_invocation_id) id: vec3<u32>) {
  if (!in_bounds(id)) { return; }
  let p = vec2<i32>(id.xy);
  let g = luma(textureLoad(t_a, p, 0));
  let m = luma(textureLoad(t_b, p, 0));
  let rest = g * (1.0 - m);
  textureStore(t_out, p, vec4<f32>(mix(g, 1.0, m), rest, rest, 1.0));
}
"#;

/// Texture backing a [`GpuImage`] created by [`WgpuBackend`].
///
/// Physically always `Rgba8Unorm`; BGRA images are swizzled on upload and readback.
pub(crate) struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    device_id: u64,
}

struct Kernels {
    layout: wgpu::BindGroupLayout,
    add: wgpu::ComputePipeline,
    threshold_binary: wgpu::ComputePipeline,
    threshold_to_zero: wgpu::ComputePipeline,
    gray_mix_red: wgpu::ComputePipeline,
}

struct WgpuShared {
    device_id: u64,
    device: wgpu::Device,
    queue: wgpu::Queue,
    renderer: Mutex<vello::Renderer>,
    kernels: Kernels,
}

/// wgpu device backend: compute kernels for blending, vello for rasterization.
pub struct WgpuBackend {
    shared: Arc<WgpuShared>,
    queue: DeviceQueue,
}

impl WgpuBackend {
    /// Acquire an adapter and device. Fails with "no gpu adapter available" on headless hosts.
    #[tracing::instrument(level = "debug")]
    pub fn new() -> ShadowResult<Self> {
        static NEXT_DEVICE: AtomicU64 = AtomicU64::new(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                ShadowError::setup("no gpu adapter available")
            }
            other => ShadowError::setup(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("shadowmix_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| ShadowError::setup(format!("wgpu request_device failed: {e:?}")))?;

        let renderer = vello::Renderer::new(&device, vello::RendererOptions::default())
            .map_err(|e| ShadowError::setup(format!("vello renderer init failed: {e:?}")))?;
        let kernels = build_kernels(&device);

        let shared = Arc::new(WgpuShared {
            device_id: NEXT_DEVICE.fetch_add(1, Ordering::Relaxed),
            device,
            queue,
            renderer: Mutex::new(renderer),
            kernels,
        });
        let run = Arc::clone(&shared);
        let executor: Executor = Arc::new(move |batch: &CommandBatch| run.execute_batch(batch));
        let queue = DeviceQueue::spawn("shadowmix-wgpu-queue", executor)?;
        tracing::info!(adapter = ?adapter.get_info().name, "wgpu backend ready");
        Ok(Self { shared, queue })
    }
}

fn build_kernels(device: &wgpu::Device) -> Kernels {
    let sampled = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    };
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("shadowmix_kernel_bgl"),
        entries: &[
            sampled(0),
            sampled(1),
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(16),
                },
                count: None,
            },
        ],
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shadowmix_kernels"),
        source: wgpu::ShaderSource::Wgsl(KERNELS_WGSL.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("shadowmix_kernel_pl"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });
    let pipeline = |entry: &str| {
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some(entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        })
    };
    Kernels {
        add: pipeline("add_sat"),
        threshold_binary: pipeline("threshold_binary"),
        threshold_to_zero: pipeline("threshold_to_zero"),
        gray_mix_red: pipeline("gray_mix_red"),
        layout,
    }
}

impl WgpuShared {
    fn texture<'a>(&self, image: &'a GpuImage) -> ShadowResult<&'a WgpuTexture> {
        match image.storage() {
            ImageStorage::Wgpu(t) if t.device_id == self.device_id => Ok(t),
            ImageStorage::Wgpu(_) => Err(ShadowError::render(
                "image belongs to a different wgpu device",
            )),
            ImageStorage::Cpu(_) => Err(ShadowError::render(
                "image is owned by the cpu backend, not the gpu backend",
            )),
        }
    }

    fn execute_batch(&self, batch: &CommandBatch) -> ShadowResult<BatchTiming> {
        let start = Instant::now();
        let mut encoder = self.encoder(batch.label());
        for cmd in batch.commands() {
            match cmd {
                Command::Rasterize {
                    target,
                    clear,
                    draw,
                } => {
                    // vello submits its own work; flush what precedes it first.
                    self.queue.submit(Some(encoder.finish()));
                    encoder = self.encoder(batch.label());
                    self.rasterize(target, *clear, draw)?;
                }
                Command::Copy { src, dst } => {
                    let (s, d) = (self.texture(src)?, self.texture(dst)?);
                    encoder.copy_texture_to_texture(
                        s.texture.as_image_copy(),
                        d.texture.as_image_copy(),
                        extent(dst),
                    );
                }
                Command::Add { a, b, dst } => {
                    self.dispatch(&mut encoder, &self.kernels.add, a, b, dst, [0.0; 4])?;
                }
                Command::ThresholdBinary {
                    src,
                    dst,
                    threshold,
                    max,
                } => {
                    let params = [*threshold, *max, 0.0, 0.0];
                    self.dispatch(
                        &mut encoder,
                        &self.kernels.threshold_binary,
                        src,
                        src,
                        dst,
                        params,
                    )?;
                }
                Command::ThresholdToZero {
                    src,
                    dst,
                    threshold,
                } => {
                    let params = [*threshold, 0.0, 0.0, 0.0];
                    self.dispatch(
                        &mut encoder,
                        &self.kernels.threshold_to_zero,
                        src,
                        src,
                        dst,
                        params,
                    )?;
                }
                Command::Kernel { kind, a, b, dst } => match kind {
                    KernelKind::GrayMixRed => {
                        self.dispatch(
                            &mut encoder,
                            &self.kernels.gray_mix_red,
                            a,
                            b,
                            dst,
                            [0.0; 4],
                        )?;
                    }
                },
            }
        }
        self.queue.submit(Some(encoder.finish()));
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ShadowError::render(format!("wgpu poll failed: {e:?}")))?;
        Ok(BatchTiming {
            start,
            end: Instant::now(),
        })
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn rasterize(
        &self,
        target: &GpuImage,
        clear: crate::foundation::core::Rgba8,
        draw: &DrawList,
    ) -> ShadowResult<()> {
        use vello::peniko::{Color, Fill};

        let t = self.texture(target)?;
        let mut scene = vello::Scene::new();
        for item in draw.items() {
            let c = item.color;
            scene.fill(
                Fill::NonZero,
                kurbo::Affine::IDENTITY,
                Color::from_rgba8(c.r, c.g, c.b, c.a),
                None,
                &item.shape.to_path(),
            );
        }
        self.renderer
            .lock()
            .render_to_texture(
                &self.device,
                &self.queue,
                &scene,
                &t.view,
                &vello::RenderParams {
                    base_color: Color::from_rgba8(clear.r, clear.g, clear.b, clear.a),
                    width: target.width(),
                    height: target.height(),
                    antialiasing_method: vello::AaConfig::Area,
                },
            )
            .map_err(|e| ShadowError::render(format!("vello render failed: {e:?}")))
    }

    fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        a: &GpuImage,
        b: &GpuImage,
        dst: &GpuImage,
        params: [f32; 4],
    ) -> ShadowResult<()> {
        let (ta, tb, tdst) = (self.texture(a)?, self.texture(b)?, self.texture(dst)?);
        let mut bytes = [0u8; 16];
        for (chunk, v) in bytes.chunks_exact_mut(4).zip(params) {
            chunk.copy_from_slice(&v.to_le_bytes());
        }
        let params_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadowmix_dispatch_params"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&params_buf, 0, &bytes);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadowmix_kernel_bg"),
            layout: &self.kernels.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&ta.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&tb.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&tdst.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("shadowmix_kernel_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            dst.width().div_ceil(WORKGROUP),
            dst.height().div_ceil(WORKGROUP),
            1,
        );
        Ok(())
    }
}

fn extent(image: &GpuImage) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: image.width(),
        height: image.height(),
        depth_or_array_layers: 1,
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_image(&self, desc: ImageDesc) -> ShadowResult<GpuImage> {
        desc.validate()?;
        let texture = self.shared.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadowmix_image"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.array_length(),
            },
            mip_level_count: desc.mip_level_count(),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuImage::from_storage(
            desc,
            ImageStorage::Wgpu(WgpuTexture {
                texture,
                view,
                device_id: self.shared.device_id,
            }),
        )
    }

    fn supports_kernel(&self, kind: KernelKind) -> bool {
        match kind {
            KernelKind::GrayMixRed => true,
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(batch = batch.label(), commands = batch.len()))]
    fn submit(&self, batch: CommandBatch, done: Completion) -> ShadowResult<()> {
        batch.validate()?;
        for cmd in batch.commands() {
            let images: Vec<&GpuImage> = match cmd {
                Command::Rasterize { target, .. } => vec![target],
                Command::Copy { src, dst }
                | Command::ThresholdBinary { src, dst, .. }
                | Command::ThresholdToZero { src, dst, .. } => vec![src, dst],
                Command::Add { a, b, dst } | Command::Kernel { a, b, dst, .. } => vec![a, b, dst],
            };
            for img in images {
                self.shared.texture(img)?;
            }
        }
        self.queue.enqueue(batch, done)
    }

    fn upload(&self, image: &GpuImage, bytes: &[u8]) -> ShadowResult<()> {
        let t = self.shared.texture(image)?;
        let desc = image.desc();
        if bytes.len() != desc.byte_len() {
            return Err(ShadowError::render(format!(
                "upload expects {} bytes, got {}",
                desc.byte_len(),
                bytes.len()
            )));
        }
        let rgba = to_rgba_bytes(desc.format, bytes);
        self.shared.queue.write_texture(
            t.texture.as_image_copy(),
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * 4),
                rows_per_image: Some(desc.height),
            },
            extent(image),
        );
        self.shared.queue.submit(None);
        Ok(())
    }

    fn read_rgba8(&self, image: &GpuImage) -> ShadowResult<Vec<u8>> {
        let t = self.shared.texture(image)?;
        let device = &self.shared.device;
        let (w, h) = (image.width(), image.height());
        let bytes_per_row = align_to(w * 4, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadowmix_readback"),
            size: u64::from(bytes_per_row) * u64::from(h),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.shared.encoder("shadowmix_readback");
        encoder.copy_texture_to_buffer(
            t.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(h),
                },
            },
            extent(image),
        );
        self.shared.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ShadowError::render(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| ShadowError::render("readback channel closed"))?
            .map_err(|e| ShadowError::render(format!("readback map failed: {e:?}")))?;

        let mapped = slice.get_mapped_range();
        let row_bytes = w as usize * 4;
        let mut out = Vec::with_capacity(row_bytes * h as usize);
        for row in 0..h as usize {
            let start = row * bytes_per_row as usize;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.unmap();
        Ok(out)
    }
}
