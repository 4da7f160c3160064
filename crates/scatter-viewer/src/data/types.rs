//! GPU-side data layouts for the viewer's pipelines.

/// Quad drawing modes understood by `quads.wgsl`.
pub const QUAD_MODE_SQUARE: u32 = 0;
pub const QUAD_MODE_CIRCLE: u32 = 1;
pub const QUAD_MODE_SPRITE: u32 = 2;
pub const QUAD_MODE_SPRITE_MASK: u32 = 3;

/// One camera-facing quad. Must match the instance inputs in `quads.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct QuadInstance {
    /// World-space center.
    pub position: [f32; 3],
    pub mode: u32,
    /// Full width and height in device pixels.
    pub extent_px: [f32; 2],
    pub _pad: [f32; 2],
    pub color: [f32; 4],
    /// `[u0, v0, u1, v1]` in the bound sprite sheet.
    pub uv_rect: [f32; 4],
}

/// One line segment. Must match the instance inputs in `lines.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct LineInstance {
    pub a: [f32; 3],
    pub width_px: f32,
    pub b: [f32; 3],
    pub _pad: f32,
    pub color: [f32; 4],
}

/// Per-pass uniform shared by both pipelines, std140.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniformStd140 {
    pub view_proj: [[f32; 4]; 4],
    /// Viewport in device pixels.
    pub viewport_px: [f32; 2],
    pub _pad: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_the_shaders() {
        assert_eq!(std::mem::size_of::<QuadInstance>(), 64);
        assert_eq!(std::mem::size_of::<LineInstance>(), 48);
        assert_eq!(std::mem::size_of::<FrameUniformStd140>(), 80);
    }
}
