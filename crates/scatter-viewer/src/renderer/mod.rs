//! GPU rendering backend. Owns the device, the offscreen picking and display
//! targets, the scene pipelines and the egui renderer.

pub mod batches;
pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    batches::{build_batches, Batch},
    context::GfxContext,
    pipelines::{blit::BlitPass, frame_layout, lines::LinePipeline, quads::QuadPipeline, quads::SheetTexture},
    targets::Targets,
};
use crate::data::types::FrameUniformStd140;
use scatter_core::backend::{FrameParams, PixelRect, RenderBackend, RenderTarget};
use scatter_core::picking::BACKGROUND_RGBA;
use scatter_core::scene::{Scene, SpriteSheet};
use scatter_core::ScatterError;
use std::rc::Rc;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

pub struct Renderer {
    pub gfx: GfxContext,
    /// Allocated on the first resize from the plot.
    targets: Option<Targets>,
    frame_ubo: wgpu::Buffer,
    frame_bind: wgpu::BindGroup,
    quads: QuadPipeline,
    lines: LinePipeline,
    blit: BlitPass,
    /// The most recently drawn sprite sheet, uploaded once.
    sheet: Option<(Rc<SpriteSheet>, SheetTexture)>,
    pub egui_renderer: egui_wgpu::Renderer,
}

fn to_wgpu_color([r, g, b, a]: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: r as f64,
        g: g as f64,
        b: b as f64,
        a: a as f64,
    }
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;

        let frame_layout = frame_layout(&gfx.device);
        let frame_ubo = gfx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame UBO"),
            size: std::mem::size_of::<FrameUniformStd140>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind = gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame BindGroup"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_ubo.as_entire_binding(),
            }],
        });

        let quads = QuadPipeline::new(&gfx.device, &gfx.queue, &frame_layout);
        let lines = LinePipeline::new(&gfx.device, &frame_layout);
        let blit = BlitPass::new(&gfx.device, gfx.config.format);
        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            targets: None,
            frame_ubo,
            frame_bind,
            quads,
            lines,
            blit,
            sheet: None,
            egui_renderer,
        })
    }

    /// Reconfigures the swapchain. The offscreen targets follow the plot's
    /// own resize through [`RenderBackend::resize`].
    pub fn resize_surface(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gfx.resize(new_size);
    }

    fn ensure_sheet(&mut self, sheet: &Rc<SpriteSheet>) {
        if matches!(&self.sheet, Some((cached, _)) if Rc::ptr_eq(cached, sheet)) {
            return;
        }
        log::debug!(
            "Uploading {}x{} sprite sheet ({} sprites)",
            sheet.width,
            sheet.height,
            sheet.sprite_count()
        );
        let texture = self.quads.upload_sheet(&self.gfx.device, &self.gfx.queue, sheet);
        self.sheet = Some((sheet.clone(), texture));
    }

    /// Blits the display target to the swapchain, draws the egui overlay on
    /// top and presents.
    pub fn present(
        &mut self,
        paint_jobs: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        pixels_per_point: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.gfx.surface.get_current_texture()?;
        let swap_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gfx.config.width, self.gfx.config.height],
            pixels_per_point,
        };

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });

        let load = match &self.targets {
            Some(targets) => {
                self.blit.draw(&self.gfx.device, &mut encoder, &swap_view, &targets.display);
                wgpu::LoadOp::Load
            }
            None => wgpu::LoadOp::Clear(wgpu::Color::WHITE),
        };

        for (id, delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }
        self.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer
                .render(&mut render_pass, paint_jobs, &screen_descriptor);
        }

        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl RenderBackend for Renderer {
    fn resize(&mut self, width_px: u32, height_px: u32) {
        let (width, height) = self.gfx.clamp_extent(width_px, height_px);
        self.targets = Some(Targets::new(&self.gfx.device, width, height));
    }

    fn render(&mut self, scene: &Scene, frame: &FrameParams, target: RenderTarget) -> scatter_core::Result<()> {
        if self.targets.is_none() {
            return Ok(());
        }
        let picking = target == RenderTarget::Picking;
        let batches = build_batches(scene, frame);
        for batch in &batches {
            if let Batch::Quads { sheet: Some(sheet), .. } = batch {
                self.ensure_sheet(sheet);
            }
        }
        let Some(targets) = &self.targets else {
            return Ok(());
        };

        let uniform = FrameUniformStd140 {
            view_proj: frame.view_proj.to_cols_array_2d(),
            viewport_px: [frame.width_px as f32, frame.height_px as f32],
            _pad: [0.0; 2],
        };
        self.gfx
            .queue
            .write_buffer(&self.frame_ubo, 0, bytemuck::bytes_of(&uniform));

        let device = &self.gfx.device;
        let buffers: Vec<(wgpu::Buffer, u32)> = batches
            .iter()
            .map(|batch| {
                let (contents, count): (&[u8], usize) = match batch {
                    Batch::Quads { instances, .. } => (bytemuck::cast_slice(instances), instances.len()),
                    Batch::Lines(lines) => (bytemuck::cast_slice(lines), lines.len()),
                };
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Instance VB"),
                    contents,
                    usage: wgpu::BufferUsages::VERTEX,
                });
                (buffer, count as u32)
            })
            .collect();

        let (view, clear, label) = if picking {
            (&targets.picking, BACKGROUND_RGBA, "Picking Pass")
        } else {
            (&targets.display, scene.background, "Display Pass")
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(clear)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (batch, (buffer, count)) in batches.iter().zip(&buffers) {
                match batch {
                    Batch::Quads { sheet, .. } => {
                        let sheet_bind = match (sheet, &self.sheet) {
                            (Some(_), Some((_, texture))) => &texture.bind,
                            _ => &self.quads.blank,
                        };
                        self.quads
                            .draw(&mut rpass, picking, &self.frame_bind, sheet_bind, buffer, *count);
                    }
                    Batch::Lines(_) => {
                        self.lines
                            .draw(&mut rpass, picking, &self.frame_bind, buffer, *count);
                    }
                }
            }
        }
        self.gfx.queue.submit(std::iter::once(encoder.finish()));

        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(ScatterError::Backend(err.to_string())),
            None => Ok(()),
        }
    }

    fn read_pixels(&mut self, rect: PixelRect) -> Option<Vec<u8>> {
        self.targets
            .as_ref()?
            .read_picking(&self.gfx.device, &self.gfx.queue, rect)
    }
}
