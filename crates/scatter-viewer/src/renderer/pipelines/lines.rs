use super::{blend_for, depth_state};
use crate::data::types::LineInstance;
use crate::renderer::targets::COLOR_FORMAT;
use wgpu::util::DeviceExt;

/// Line segments with a fixed pixel width, one instance per segment.
pub struct LinePipeline {
    picking: wgpu::RenderPipeline,
    display: wgpu::RenderPipeline,
    corner_vb: wgpu::Buffer,
}

impl LinePipeline {
    pub fn new(device: &wgpu::Device, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/lines.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/lines.wgsl").into()),
        });

        // (endpoint, side) pairs for two triangles.
        let corners: [[f32; 2]; 6] = [
            [0.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [0.0, -1.0],
            [1.0, 1.0],
            [0.0, 1.0],
        ];
        let corner_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Line Corners VB"),
            contents: bytemuck::cast_slice(&corners),
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
                array_stride: std::mem::size_of::<LineInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[
                    // a
                    wgpu::VertexAttribute {
                        shader_location: 1,
                        offset: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                    // width_px
                    wgpu::VertexAttribute {
                        shader_location: 2,
                        offset: 12,
                        format: wgpu::VertexFormat::Float32,
                    },
                    // b
                    wgpu::VertexAttribute {
                        shader_location: 3,
                        offset: 16,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                    // color
                    wgpu::VertexAttribute {
                        shader_location: 4,
                        offset: 32,
                        format: wgpu::VertexFormat::Float32x4,
                    },
                ],
            },
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Line PipelineLayout"),
            bind_group_layouts: &[frame_layout],
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

        Self {
            picking: make_pipeline("Line Picking Pipeline", false),
            display: make_pipeline("Line Display Pipeline", true),
            corner_vb,
        }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        picking: bool,
        frame_bind: &'a wgpu::BindGroup,
        instances: &'a wgpu::Buffer,
        count: u32,
    ) {
        rpass.set_pipeline(if picking { &self.picking } else { &self.display });
        rpass.set_bind_group(0, frame_bind, &[]);
        rpass.set_vertex_buffer(0, self.corner_vb.slice(..));
        rpass.set_vertex_buffer(1, instances.slice(..));
        rpass.draw(0..6, 0..count);
    }
}
