//! Window surface and device setup.
//!
//! Picking reads ids back from an offscreen color target, so the adapter
//! must be able to render into [`COLOR_FORMAT`] and copy out of it. The
//! swapchain itself must be non-sRGB: point colors and egui output are
//! already gamma encoded and are blitted through untouched.

use super::targets::COLOR_FORMAT;
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Swapchain formats tried first, in order.
const PREFERRED_SURFACE_FORMATS: [wgpu::TextureFormat; 2] =
    [wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Rgba8Unorm];

pub struct GfxContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    /// Largest texture side the device accepts; offscreen targets are clamped to it.
    pub max_texture_dimension: u32,
}

/// Non-sRGB swapchain format, favoring 8-bit unorm formats.
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Result<wgpu::TextureFormat> {
    PREFERRED_SURFACE_FORMATS
        .iter()
        .copied()
        .find(|f| formats.contains(f))
        .or_else(|| formats.iter().copied().find(|f| !f.is_srgb()))
        .ok_or_else(|| anyhow!("surface offers no non-sRGB format (available: {formats:?})"))
}

fn pick_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    modes
        .iter()
        .copied()
        .find(|m| *m == wgpu::CompositeAlphaMode::Opaque)
        .or_else(|| modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Fails unless the picking target can be drawn into and read back.
fn check_picking_support(adapter: &wgpu::Adapter) -> Result<()> {
    let needed = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
    let features = adapter.get_texture_format_features(COLOR_FORMAT);
    if !features.allowed_usages.contains(needed) {
        bail!(
            "adapter cannot render to and read back {COLOR_FORMAT:?} (allowed: {:?})",
            features.allowed_usages
        );
    }
    Ok(())
}

impl GfxContext {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("creating window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no GPU adapter compatible with the window surface"))?;
        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);
        check_picking_support(&adapter)?;

        // Ask for the adapter's real texture size so large or HiDPI windows
        // keep full-resolution picking targets.
        let limits = wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits());
        let max_texture_dimension = limits.max_texture_dimension_2d;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Scatter Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                },
                None,
            )
            .await
            .context("requesting GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats)?;
        log::debug!("Surface format {format:?}, max texture side {max_texture_dimension}");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.clamp(1, max_texture_dimension),
            height: size.height.clamp(1, max_texture_dimension),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: pick_alpha_mode(&caps.alpha_modes),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            max_texture_dimension,
        })
    }

    /// Clamps a requested texture size into what the device can allocate.
    pub fn clamp_extent(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.clamp(1, self.max_texture_dimension),
            height.clamp(1, self.max_texture_dimension),
        )
    }

    /// Reconfigures the swapchain; a minimized window (zero size) keeps the old one.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        let (width, height) = self.clamp_extent(new_size.width, new_size.height);
        self.size = new_size;
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn surface_format_prefers_linear_8bit() {
        let formats = [F::Bgra8UnormSrgb, F::Rgba16Float, F::Rgba8Unorm];
        assert_eq!(pick_surface_format(&formats).unwrap(), F::Rgba8Unorm);
        assert_eq!(pick_surface_format(&[F::Rgba8UnormSrgb, F::Rgba16Float]).unwrap(), F::Rgba16Float);
    }

    #[test]
    fn srgb_only_surfaces_are_rejected() {
        let err = pick_surface_format(&[F::Bgra8UnormSrgb]).unwrap_err();
        assert!(err.to_string().contains("non-sRGB"));
    }

    #[test]
    fn opaque_alpha_is_preferred() {
        use wgpu::CompositeAlphaMode as A;
        assert_eq!(pick_alpha_mode(&[A::PreMultiplied, A::Opaque]), A::Opaque);
        assert_eq!(pick_alpha_mode(&[A::PostMultiplied]), A::PostMultiplied);
        assert_eq!(pick_alpha_mode(&[]), A::Auto);
    }
}
