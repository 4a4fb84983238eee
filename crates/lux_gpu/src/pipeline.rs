//! Kernel dispatch and the two fullscreen passes around it.
//!
//! Per frame:
//! 1. `dispatch` runs `raytrace.wgsl` over the write target in 8x8 tiles.
//! 2. `composite` blends the write target into the accumulation target with
//!    a constant alpha chosen by the [`Accumulator`](crate::Accumulator).
//! 3. `present` copies the accumulation target to the surface.

use lux_core::{BufferName, SceneBuffers, Skybox};

use crate::targets::Target;
use crate::uniforms::{FrameUniforms, FRAME_UNIFORMS_SIZE};

const RAYTRACE_WGSL: &str = include_str!("shaders/raytrace.wgsl");
const COMPOSITE_WGSL: &str = include_str!("shaders/composite.wgsl");

/// Tile edge in pixels (must match @workgroup_size in the kernel).
pub const WORKGROUP_SIZE: u32 = 8;

/// Bound in place of a scene buffer that holds no data.
const PLACEHOLDER_SIZE: u64 = 128;

const UNIFORM_BINDING: u32 = 0;
const SKYBOX_TEXTURE_BINDING: u32 = 5;
const SKYBOX_SAMPLER_BINDING: u32 = 6;
const OUTPUT_BINDING: u32 = 7;

/// Workgroups needed to cover `width` x `height` with `tile` x `tile` tiles.
pub fn tile_groups(width: u32, height: u32, tile: u32) -> (u32, u32) {
    let tile = tile.max(1);
    (width.div_ceil(tile), height.div_ceil(tile))
}

pub struct TracePipeline {
    compute_pipeline: wgpu::ComputePipeline,
    compute_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    placeholder: wgpu::Buffer,
    skybox_view: wgpu::TextureView,
    skybox_sampler: wgpu::Sampler,

    blit_layout: wgpu::BindGroupLayout,
    composite_pipeline: wgpu::RenderPipeline,
    present_pipeline: wgpu::RenderPipeline,
}

impl TracePipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        skybox: &Skybox,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("raytrace_shader"),
            source: wgpu::ShaderSource::Wgsl(RAYTRACE_WGSL.into()),
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("raytrace_bind_group_layout"),
            entries: &[
                // @binding(0) Frame uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // @binding(1..=4) Scene buffers
                storage_entry(BufferName::Spheres.binding_index()),
                storage_entry(BufferName::MeshObjects.binding_index()),
                storage_entry(BufferName::Vertices.binding_index()),
                storage_entry(BufferName::Indices.binding_index()),
                // @binding(5) Skybox texture
                wgpu::BindGroupLayoutEntry {
                    binding: SKYBOX_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                // @binding(6) Skybox sampler
                wgpu::BindGroupLayoutEntry {
                    binding: SKYBOX_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // @binding(7) Write target
                wgpu::BindGroupLayoutEntry {
                    binding: OUTPUT_BINDING,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: crate::targets::TARGET_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let compute_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("raytrace_pipeline_layout"),
                bind_group_layouts: &[&compute_layout],
                push_constant_ranges: &[],
            });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("raytrace_pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: &shader,
            entry_point: "main",
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: FRAME_UNIFORMS_SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // wgpu rejects zero-sized bindings; absent buffers get this instead
        let placeholder = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("empty_scene_buffer"),
            size: PLACEHOLDER_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let skybox_view = upload_skybox(device, queue, skybox);
        let skybox_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // Fullscreen passes
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite_shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_WGSL.into()),
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            }],
        });

        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pipeline_layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });

        // out = src * alpha + dst * (1 - alpha), alpha set per frame as the blend constant
        let constant_blend = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Constant,
            dst_factor: wgpu::BlendFactor::OneMinusConstant,
            operation: wgpu::BlendOperation::Add,
        };
        let composite_pipeline = blit_pipeline(
            device,
            &blit_pipeline_layout,
            &blit_shader,
            crate::targets::TARGET_FORMAT,
            wgpu::BlendState {
                color: constant_blend,
                alpha: constant_blend,
            },
            "composite_pipeline",
        );
        let present_pipeline = blit_pipeline(
            device,
            &blit_pipeline_layout,
            &blit_shader,
            surface_format,
            wgpu::BlendState::REPLACE,
            "present_pipeline",
        );

        log::info!("Ray tracing pipeline created");

        Self {
            compute_pipeline,
            compute_layout,
            uniform_buffer,
            placeholder,
            skybox_view,
            skybox_sampler,
            blit_layout,
            composite_pipeline,
            present_pipeline,
        }
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Trace one frame into `target`.
    ///
    /// Scene buffers are borrowed for this call only. Absent ones are
    /// replaced by the placeholder; the counts in the uniforms keep the
    /// kernel from reading it.
    pub fn dispatch(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        buffers: &SceneBuffers<wgpu::Buffer>,
        target: &Target,
        size: (u32, u32),
    ) {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: UNIFORM_BINDING,
            resource: self.uniform_buffer.as_entire_binding(),
        }];

        for name in BufferName::ALL {
            let buffer = match buffers.buffer(name) {
                Some(buffer) => buffer,
                None => {
                    log::trace!("No {} data, binding placeholder", name);
                    &self.placeholder
                }
            };
            entries.push(wgpu::BindGroupEntry {
                binding: name.binding_index(),
                resource: buffer.as_entire_binding(),
            });
        }

        entries.extend([
            wgpu::BindGroupEntry {
                binding: SKYBOX_TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(&self.skybox_view),
            },
            wgpu::BindGroupEntry {
                binding: SKYBOX_SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(&self.skybox_sampler),
            },
            wgpu::BindGroupEntry {
                binding: OUTPUT_BINDING,
                resource: wgpu::BindingResource::TextureView(&target.view),
            },
        ]);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("raytrace_bind_group"),
            layout: &self.compute_layout,
            entries: &entries,
        });

        let (groups_x, groups_y) = tile_groups(size.0, size.1, WORKGROUP_SIZE);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("raytrace_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.compute_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }

    /// Blend `source` into `accumulation` with weight `alpha`.
    pub fn composite(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &Target,
        accumulation: &Target,
        alpha: f32,
    ) {
        let bind_group = self.blit_bind_group(device, &source.view);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &accumulation.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let alpha = alpha as f64;
        pass.set_blend_constant(wgpu::Color {
            r: alpha,
            g: alpha,
            b: alpha,
            a: alpha,
        });
        pass.set_pipeline(&self.composite_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1); // fullscreen triangle
    }

    /// Copy the accumulation target to the surface.
    pub fn present(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        accumulation: &Target,
        surface_view: &wgpu::TextureView,
    ) {
        let bind_group = self.blit_bind_group(device, &accumulation.view);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.present_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn blit_bind_group(&self, device: &wgpu::Device, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind_group"),
            layout: &self.blit_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        })
    }
}

fn blit_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn upload_skybox(device: &wgpu::Device, queue: &wgpu::Queue, skybox: &Skybox) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: skybox.width,
        height: skybox.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("skybox"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        skybox.as_bytes(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * skybox.width),
            rows_per_image: Some(skybox.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
