pub mod blit;
pub mod lines;
pub mod quads;

use crate::data::types::FrameUniformStd140;

/// Bind group layout of the per-pass frame uniform, shared by the scene
/// pipelines.
pub fn frame_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Frame UBO Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<FrameUniformStd140>() as u64),
            },
            count: None,
        }],
    })
}

/// Blending for a pass: the picking pass writes ids untouched.
pub fn blend_for(blended: bool) -> Option<wgpu::BlendState> {
    blended.then_some(wgpu::BlendState::ALPHA_BLENDING)
}

pub fn depth_state() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: crate::renderer::targets::DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}
