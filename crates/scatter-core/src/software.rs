//! CPU rasterizer implementing [`RenderBackend`].
//!
//! Draws points, sprites and text billboards as screen-aligned squares and
//! rectangles with a depth test, which is all the picking pass needs. Used for
//! headless hosts and for exercising the core without a GPU.

use crate::backend::{point_size_px, FrameParams, PixelRect, RenderBackend, RenderTarget};
use crate::error::Result;
use crate::picking::BACKGROUND_RGBA;
use crate::scene::{Drawable, PointShape, Scene, SpriteMode, SpriteSheet};
use glam::{Vec2, Vec3, Vec4Swizzles};

#[derive(Debug, Clone)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    depth: Vec<f32>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> Self {
        let len = (width * height) as usize;
        Self {
            width,
            height,
            rgba: vec![0xFF; len * 4],
            depth: vec![f32::INFINITY; len],
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        let bytes = to_bytes(color);
        for px in self.rgba.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
        self.depth.fill(f32::INFINITY);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    fn write(&mut self, x: i64, y: i64, depth: f32, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = (y as u32 * self.width + x as u32) as usize;
        if depth <= self.depth[i] {
            self.depth[i] = depth;
            self.rgba[i * 4..i * 4 + 4].copy_from_slice(&color);
        }
    }
}

fn to_bytes(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Projected screen position (device px) and NDC depth.
struct Projected {
    screen: Vec2,
    depth: f32,
    distance: f32,
}

#[derive(Debug, Default)]
pub struct SoftwareBackend {
    picking: Option<Framebuffer>,
    display: Option<Framebuffer>,
    /// Number of completed passes per target, for inspection.
    pub picking_passes: usize,
    pub display_passes: usize,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picking_surface(&self) -> Option<&Framebuffer> {
        self.picking.as_ref()
    }

    pub fn display_surface(&self) -> Option<&Framebuffer> {
        self.display.as_ref()
    }

    fn project(frame: &FrameParams, point: Vec3) -> Option<Projected> {
        let clip = frame.view_proj * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        if !(0.0..=1.0).contains(&ndc.z) {
            return None;
        }
        Some(Projected {
            screen: Vec2::new(
                (ndc.x + 1.0) * 0.5 * frame.width_px as f32,
                (1.0 - ndc.y) * 0.5 * frame.height_px as f32,
            ),
            depth: ndc.z,
            distance: (point - frame.camera_position).length(),
        })
    }

    /// Fills the pixels whose centers fall inside the rectangle, calling
    /// `shade` with normalized coordinates inside it.
    fn fill_rect(
        fb: &mut Framebuffer,
        center: Vec2,
        extent: Vec2,
        depth: f32,
        mut shade: impl FnMut(f32, f32) -> Option<[u8; 4]>,
    ) {
        let lo = center - extent * 0.5;
        let hi = center + extent * 0.5;
        let x0 = (lo.x - 0.5).ceil() as i64;
        let x1 = (hi.x - 0.5).floor() as i64;
        let y0 = (lo.y - 0.5).ceil() as i64;
        let y1 = (hi.y - 0.5).floor() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let u = (x as f32 + 0.5 - lo.x) / extent.x.max(f32::EPSILON);
                let v = (y as f32 + 0.5 - lo.y) / extent.y.max(f32::EPSILON);
                if let Some(color) = shade(u, v) {
                    fb.write(x, y, depth, color);
                }
            }
        }
    }

    fn draw_line(fb: &mut Framebuffer, a: &Projected, b: &Projected, color: [u8; 4]) {
        let steps = (b.screen - a.screen).abs().max_element().ceil().max(1.0) as i64;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let p = a.screen.lerp(b.screen, t);
            let depth = a.depth + (b.depth - a.depth) * t;
            fb.write(p.x.floor() as i64, p.y.floor() as i64, depth, color);
        }
    }

    fn sample(sheet: &SpriteSheet, sprite: u32, u: f32, v: f32) -> [u8; 4] {
        let [u0, v0, u1, v1] = sheet.uv_rect(sprite);
        let x = (((u0 + (u1 - u0) * u) * sheet.width as f32) as u32).min(sheet.width - 1);
        let y = (((v0 + (v1 - v0) * v) * sheet.height as f32) as u32).min(sheet.height - 1);
        let i = ((y * sheet.width + x) * 4) as usize;
        [sheet.rgba[i], sheet.rgba[i + 1], sheet.rgba[i + 2], sheet.rgba[i + 3]]
    }

    fn rasterize(fb: &mut Framebuffer, scene: &Scene, frame: &FrameParams) {
        let dpr = frame.device_pixel_ratio;
        for object in scene.visible() {
            match &object.drawable {
                Drawable::Points(points) => {
                    for (i, position) in points.positions.iter().enumerate() {
                        let Some(p) = Self::project(frame, *position) else { continue };
                        let size = point_size_px(points.sizes[i], points.size_attenuation, p.distance, dpr);
                        let mut color = points.colors[i];
                        if let Some(fog) = points.fog {
                            let f = fog.factor(p.distance);
                            for c in 0..3 {
                                color[c] += (fog.color[c] - color[c]) * f;
                            }
                        }
                        let bytes = to_bytes(color);
                        let circle = points.shape == PointShape::Circle;
                        Self::fill_rect(fb, p.screen, Vec2::splat(size), p.depth, |u, v| {
                            let inside = !circle || (u - 0.5).powi(2) + (v - 0.5).powi(2) <= 0.25;
                            inside.then_some(bytes)
                        });
                    }
                }
                Drawable::Sprites(sprites) => {
                    for (i, position) in sprites.positions.iter().enumerate() {
                        let Some(p) = Self::project(frame, *position) else { continue };
                        let size = point_size_px(sprites.sizes[i], sprites.size_attenuation, p.distance, dpr);
                        let sprite = sprites.sprite_indices[i];
                        let tint = sprites.colors[i];
                        let sheet = &sprites.sheet;
                        Self::fill_rect(fb, p.screen, Vec2::splat(size), p.depth, |u, v| {
                            match sprites.mode {
                                SpriteMode::Mask => {
                                    (sheet.alpha_at(sprite, u, v) > 0).then(|| to_bytes(tint))
                                }
                                SpriteMode::Textured => {
                                    let texel = Self::sample(sheet, sprite, u, v);
                                    (texel[3] > 0).then(|| {
                                        to_bytes([
                                            texel[0] as f32 / 255.0 * tint[0],
                                            texel[1] as f32 / 255.0 * tint[1],
                                            texel[2] as f32 / 255.0 * tint[2],
                                            tint[3],
                                        ])
                                    })
                                }
                            }
                        });
                    }
                }
                Drawable::Text(text) if text.solid => {
                    for billboard in &text.billboards {
                        let Some(p) = Self::project(frame, billboard.anchor) else { continue };
                        let bytes = to_bytes(billboard.color);
                        Self::fill_rect(fb, p.screen, billboard.extent_px * dpr, p.depth, |_, _| Some(bytes));
                    }
                }
                // Glyph rendering needs a font rasterizer; this backend only
                // draws the solid picking form.
                Drawable::Text(_) => {}
                Drawable::Lines(lines) => {
                    let bytes = to_bytes(lines.color);
                    for [a, b] in &lines.segments {
                        if let (Some(a), Some(b)) = (Self::project(frame, *a), Self::project(frame, *b)) {
                            Self::draw_line(fb, &a, &b, bytes);
                        }
                    }
                }
                Drawable::ScreenLabels(_) => {}
            }
        }
    }
}

impl RenderBackend for SoftwareBackend {
    fn resize(&mut self, width_px: u32, height_px: u32) {
        let (w, h) = (width_px.max(1), height_px.max(1));
        self.picking = Some(Framebuffer::new(w, h));
        self.display = Some(Framebuffer::new(w, h));
    }

    fn render(&mut self, scene: &Scene, frame: &FrameParams, target: RenderTarget) -> Result<()> {
        let (fb, clear) = match target {
            RenderTarget::Picking => (self.picking.as_mut(), BACKGROUND_RGBA),
            RenderTarget::Display => (self.display.as_mut(), scene.background),
        };
        let Some(fb) = fb else {
            return Ok(());
        };
        fb.clear(clear);
        Self::rasterize(fb, scene, frame);
        match target {
            RenderTarget::Picking => self.picking_passes += 1,
            RenderTarget::Display => self.display_passes += 1,
        }
        Ok(())
    }

    fn read_pixels(&mut self, rect: PixelRect) -> Option<Vec<u8>> {
        let fb = self.picking.as_ref()?;
        let mut out = Vec::with_capacity(rect.area() as usize * 4);
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                if x < fb.width && y < fb.height {
                    out.extend_from_slice(&fb.pixel(x, y));
                } else {
                    out.extend_from_slice(&[0xFF; 4]);
                }
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::{decode_pixel, index_to_rgba};
    use crate::scene::{PointsObject, SceneObject};
    use glam::Mat4;

    fn frame() -> FrameParams {
        FrameParams {
            view_proj: Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, -10.0, 10.0),
            camera_position: Vec3::new(0.0, 0.0, 5.0),
            width_px: 20,
            height_px: 20,
            device_pixel_ratio: 1.0,
        }
    }

    fn points(positions: Vec<Vec3>) -> Drawable {
        let n = positions.len();
        Drawable::Points(PointsObject {
            colors: (0..n).map(index_to_rgba).collect(),
            sizes: vec![4.0; n],
            positions,
            size_attenuation: false,
            shape: PointShape::Square,
            fog: None,
            transparent: false,
        })
    }

    #[test]
    fn nothing_to_read_before_resize() {
        let mut backend = SoftwareBackend::new();
        let rect = PixelRect { x: 0, y: 0, width: 1, height: 1 };
        assert!(backend.read_pixels(rect).is_none());
    }

    #[test]
    fn nearer_point_wins_the_depth_test() {
        let mut backend = SoftwareBackend::new();
        backend.resize(20, 20);
        let mut scene = Scene::new([0.0, 0.0, 0.0, 1.0]);
        scene.add(SceneObject::new(points(vec![Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0)])));
        backend.render(&scene, &frame(), RenderTarget::Picking).unwrap();
        let px = backend.picking_surface().unwrap().pixel(10, 10);
        assert_eq!(decode_pixel(&px), Some(1));
        assert_eq!(decode_pixel(&backend.picking_surface().unwrap().pixel(0, 0)), None);
    }

    #[test]
    fn out_of_surface_pixels_read_as_background() {
        let mut backend = SoftwareBackend::new();
        backend.resize(4, 4);
        let px = backend
            .read_pixels(PixelRect { x: 3, y: 3, width: 2, height: 1 })
            .unwrap();
        assert_eq!(px.len(), 8);
        assert_eq!(&px[4..], &[0xFF; 4]);
    }
}
