use super::{blend_for, depth_state};
use crate::data::types::QuadInstance;
use crate::renderer::targets::COLOR_FORMAT;
use scatter_core::scene::SpriteSheet;
use wgpu::util::DeviceExt;

/// Instanced camera-facing quads: points, sprites and solid text.
pub struct QuadPipeline {
    picking: wgpu::RenderPipeline,
    display: wgpu::RenderPipeline,
    sheet_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad_vb: wgpu::Buffer,
    /// 1x1 white texture bound when no sprite sheet is in use.
    _blank_tex: wgpu::Texture,
    pub blank: wgpu::BindGroup,
}

/// A sprite sheet uploaded to the GPU.
pub struct SheetTexture {
    _tex: wgpu::Texture,
    pub bind: wgpu::BindGroup,
}

impl QuadPipeline {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let sheet_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Sheet Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Nearest filtering keeps mask edges identical to the sheet's alpha.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sheet Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/quads.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/quads.wgsl").into()),
        });

        let quad_corners: [[f32; 2]; 6] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Corners VB"),
            contents: bytemuck::cast_slice(&quad_corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vbuf_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<QuadInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[
                    // position
                    wgpu::VertexAttribute {
                        shader_location: 1,
                        offset: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                    // mode
                    wgpu::VertexAttribute {
                        shader_location: 2,
                        offset: 12,
                        format: wgpu::VertexFormat::Uint32,
                    },
                    // extent_px
                    wgpu::VertexAttribute {
                        shader_location: 3,
                        offset: 16,
                        format: wgpu::VertexFormat::Float32x2,
                    },
                    // color
                    wgpu::VertexAttribute {
                        shader_location: 4,
                        offset: 32,
                        format: wgpu::VertexFormat::Float32x4,
                    },
                    // uv_rect
                    wgpu::VertexAttribute {
                        shader_location: 5,
                        offset: 48,
                        format: wgpu::VertexFormat::Float32x4,
                    },
                ],
            },
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad PipelineLayout"),
            bind_group_layouts: &[frame_layout, &sheet_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |label: &str, blended: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &vbuf_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: Some(depth_state()),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: blend_for(blended),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };
        let picking = make_pipeline("Quad Picking Pipeline", false);
        let display = make_pipeline("Quad Display Pipeline", true);

        let (blank_tex, blank) = upload_rgba(device, queue, &sheet_layout, &sampler, &[0xFF; 4], 1, 1);

        Self {
            picking,
            display,
            sheet_layout,
            sampler,
            quad_vb,
            _blank_tex: blank_tex,
            blank,
        }
    }

    pub fn upload_sheet(&self, device: &wgpu::Device, queue: &wgpu::Queue, sheet: &SpriteSheet) -> SheetTexture {
        let (tex, bind) = upload_rgba(
            device,
            queue,
            &self.sheet_layout,
            &self.sampler,
            &sheet.rgba,
            sheet.width,
            sheet.height,
        );
        SheetTexture { _tex: tex, bind }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        picking: bool,
        frame_bind: &'a wgpu::BindGroup,
        sheet_bind: &'a wgpu::BindGroup,
        instances: &'a wgpu::Buffer,
        count: u32,
    ) {
        rpass.set_pipeline(if picking { &self.picking } else { &self.display });
        rpass.set_bind_group(0, frame_bind, &[]);
        rpass.set_bind_group(1, sheet_bind, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.set_vertex_buffer(1, instances.slice(..));
        rpass.draw(0..6, 0..count);
    }
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::BindGroup) {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Sprite Sheet"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &tex,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
    let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Sprite Sheet BindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    (tex, bind)
}
