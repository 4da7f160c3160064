//! Seam between the scatter plot core and a rasterizer.

use crate::error::Result;
use crate::scene::Scene;
use glam::{Mat4, Vec3};

/// Which of the two per-frame passes is being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Offscreen ID-encoding surface, read back for hit testing.
    Picking,
    /// The visible surface.
    Display,
}

/// Camera and viewport data a backend needs to rasterize the scene.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    /// Viewport size in device pixels.
    pub width_px: u32,
    pub height_px: u32,
    pub device_pixel_ratio: f32,
}

/// Rectangle in device pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Exclusive right edge, saturating at `u32::MAX`.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `u32::MAX`.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// The part of this rectangle inside a `width` x `height` surface.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let (x0, y0) = (self.x.min(width), self.y.min(height));
        let (x1, y1) = (self.right().min(width), self.bottom().min(height));
        (x1 > x0 && y1 > y0).then_some(PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

pub trait RenderBackend {
    /// Reallocates every render target, the picking surface included.
    fn resize(&mut self, width_px: u32, height_px: u32);

    /// Rasterizes the visible scene objects into `target`. The picking pass
    /// must complete before this returns.
    fn render(&mut self, scene: &Scene, frame: &FrameParams, target: RenderTarget) -> Result<()>;

    /// Reads RGBA bytes of the picking surface, row-major. Pixels outside
    /// the surface read as background. `None` while no surface is allocated.
    fn read_pixels(&mut self, rect: PixelRect) -> Option<Vec<u8>>;
}

/// Smallest on-screen point diameter, device pixels.
pub const MIN_POINT_SIZE_PX: f32 = 1.0;

/// On-screen diameter in device pixels of a point or sprite.
pub fn point_size_px(size: f32, size_attenuation: bool, depth: f32, device_pixel_ratio: f32) -> f32 {
    let size = if size_attenuation && depth > f32::EPSILON {
        size / depth
    } else {
        size
    };
    (size * device_pixel_ratio).max(MIN_POINT_SIZE_PX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_divides_by_depth() {
        assert_eq!(point_size_px(10.0, false, 4.0, 2.0), 20.0);
        assert_eq!(point_size_px(10.0, true, 4.0, 2.0), 5.0);
        assert_eq!(point_size_px(0.1, true, 4.0, 1.0), MIN_POINT_SIZE_PX);
    }

    #[test]
    fn huge_rect_area_and_edges_do_not_overflow() {
        let rect = PixelRect {
            x: u32::MAX - 10,
            y: 5,
            width: 100_000,
            height: 100_000,
        };
        assert_eq!(rect.area(), 10_000_000_000);
        assert_eq!(rect.right(), u32::MAX);
        assert_eq!(rect.bottom(), 100_005);
        assert_eq!(rect.clamp_to(640, 480), None);

        let inside = PixelRect {
            x: 600,
            y: 0,
            width: 100_000,
            height: 100_000,
        };
        assert_eq!(
            inside.clamp_to(640, 480),
            Some(PixelRect {
                x: 600,
                y: 0,
                width: 40,
                height: 480,
            })
        );
    }
}
