//! Offscreen render targets for the picking and display passes.

use scatter_core::backend::PixelRect;

pub struct Targets {
    // Keep the textures alive for the lifetime of the views.
    _display_tex: wgpu::Texture,
    _depth_tex: wgpu::Texture,
    picking_tex: wgpu::Texture,

    pub display: wgpu::TextureView,
    pub picking: wgpu::TextureView,
    pub depth: wgpu::TextureView,

    pub width: u32,
    pub height: u32,
}

/// Both color targets store gamma-space bytes; picking ids must round-trip
/// exactly, so neither is sRGB.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

impl Targets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let tex_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let create_tex = |label: &str, format, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: tex_size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let display_tex = create_tex(
            "Display Color Target",
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let picking_tex = create_tex(
            "Picking Color Target",
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth_tex = create_tex("Scene Depth Target", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);

        Self {
            display: display_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            picking: picking_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            depth: depth_tex.create_view(&wgpu::TextureViewDescriptor::default()),
            _display_tex: display_tex,
            _depth_tex: depth_tex,
            picking_tex,
            width,
            height,
        }
    }

    /// Copies `rect` of the picking target back to the CPU and blocks until
    /// the copy lands. Pixels outside the target read as background.
    pub fn read_picking(&self, device: &wgpu::Device, queue: &wgpu::Queue, rect: PixelRect) -> Option<Vec<u8>> {
        let mut out = vec![0xFF; rect.area() as usize * 4];
        let Some(copy) = rect.clamp_to(self.width, self.height) else {
            return Some(out);
        };
        let (x0, y0) = (copy.x, copy.y);
        let (copy_w, copy_h) = (copy.width, copy.height);
        let row_bytes = copy_w * 4;
        let padded_row_bytes = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Picking Readback"),
            size: (padded_row_bytes * copy_h) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Picking Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.picking_tex,
                mip_level: 0,
                origin: wgpu::Origin3d { x: x0, y: y0, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(copy_h),
                },
            },
            wgpu::Extent3d {
                width: copy_w,
                height: copy_h,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::warn!("Picking readback failed: {err}");
                return None;
            }
            Err(_) => return None,
        }

        {
            let data = slice.get_mapped_range();
            for row in 0..copy_h {
                let src = &data[(row * padded_row_bytes) as usize..][..row_bytes as usize];
                let dst_row = (y0 - rect.y + row) as usize;
                let dst = (dst_row * rect.width as usize + (x0 - rect.x) as usize) * 4;
                out[dst..dst + src.len()].copy_from_slice(src);
            }
        }
        buffer.unmap();
        Some(out)
    }
}
