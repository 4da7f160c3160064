//! The scatter plot core: camera, interaction state machine, active
//! visualizers, the dual-pass render loop and point picking.

use crate::animation::{FrameLoop, RepeatingTask};
use crate::backend::{FrameParams, PixelRect, RenderBackend, RenderTarget};
use crate::camera::{Camera, CameraDef, DragAction, OrbitControls, PointerButton, Projection};
use crate::error::{check_len, Result, ScatterError};
use crate::picking::{check_point_count, decode_region, first_hit};
use crate::render_context::{near_far_points, LabelRenderParams, RenderContext};
use crate::scene::{Drawable, LinesObject, ObjectId, Scene, SceneHandle, SceneObject};
use crate::selection::{
    indices_in_polygon, indices_in_rect, ScreenRect, SelectionOverlay, SelectionRegion, SelectionShape,
    SelectionSurface,
};
use crate::style::Style;
use crate::visualizers::{
    DefaultVisualizerFactory, ScatterVisualizer, Sequence, VisualizerFactory, VisualizerKind,
};
use glam::{Vec2, Vec3};
use std::collections::{BTreeMap, BTreeSet};

/// Seconds per full auto-rotate revolution at 60 frames per second.
const ORBIT_ANIMATION_ROTATION_CYCLE_IN_SECONDS: f32 = 7.0;
/// Regions up to this many device pixels resolve to a single point.
const SMALL_REGION_MAX_AREA: u64 = 4;
const AXES_LENGTH: f32 = 1.0;
const AXES_WIDTH_PX: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Pan,
    Select,
}

/// Modifier keys the core reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    /// Held to select.
    Shift,
    /// Held to pan instead of orbit in 3D.
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: ModifierKey,
    pub pressed: bool,
}

/// Pointer input in logical pixels relative to the surface's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Vec2,
    pub button: PointerButton,
}

/// Explicit camera settings applied on top of the per-dimension defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraOverrides {
    pub position: Option<Vec3>,
    pub target: Option<Vec3>,
    pub zoom: Option<f32>,
}

impl CameraOverrides {
    fn apply(&self, mut def: CameraDef) -> CameraDef {
        if let Some(position) = self.position {
            def.position = position;
        }
        if let Some(target) = self.target {
            def.target = target;
        }
        if let Some(zoom) = self.zoom {
            def.zoom = zoom;
        }
        def
    }
}

#[derive(Debug, Clone)]
pub struct ScatterPlotParams {
    pub camera: CameraOverrides,
    /// Whether the Shift key may enter selection mode.
    pub select_enabled: bool,
    pub show_axes: bool,
    pub dimensions: u8,
    pub style: Style,
}

impl Default for ScatterPlotParams {
    fn default() -> Self {
        Self {
            camera: CameraOverrides::default(),
            select_enabled: true,
            show_axes: true,
            dimensions: 3,
            style: Style::default(),
        }
    }
}

#[derive(Default)]
struct Callbacks {
    hover: Option<Box<dyn FnMut(Option<usize>)>>,
    click: Option<Box<dyn FnMut(Option<usize>)>>,
    select: Option<Box<dyn FnMut(&[usize])>>,
    camera_move: Option<Box<dyn FnMut(Vec3, Vec3)>>,
}

/// A pressed pointer button, from down to up.
#[derive(Debug, Clone, Copy)]
struct PointerGesture {
    last: Vec2,
    dragged: bool,
    selecting: bool,
}

pub struct ScatterPlot<B: RenderBackend> {
    backend: B,
    scene: SceneHandle,
    style: Style,

    dimensions: u8,
    camera: Camera,
    controls: OrbitControls,
    camera_overrides: CameraOverrides,
    pending_camera: Option<(CameraOverrides, bool)>,

    frame_loop: FrameLoop,
    orbit: Option<RepeatingTask>,

    factory: Box<dyn VisualizerFactory>,
    visualizers: BTreeMap<VisualizerKind, Box<dyn ScatterVisualizer>>,

    has_dataset: bool,
    positions: Vec<Vec3>,
    point_colors: Vec<[f32; 4]>,
    point_scale_factors: Vec<f32>,
    label_strings: Vec<String>,
    sequences: Vec<Sequence>,
    labels: Option<LabelRenderParams>,
    polyline_colors: Vec<[f32; 3]>,
    polyline_opacities: Vec<f32>,
    polyline_widths: Vec<f32>,

    width: u32,
    height: u32,
    device_pixel_ratio: f32,

    mode: InteractionMode,
    select_enabled: bool,
    /// Mode to restore when the selection modifier is released.
    mode_before_modifier: Option<InteractionMode>,
    selection: SelectionSurface,
    gesture: Option<PointerGesture>,
    hover: Option<usize>,

    show_axes: bool,
    axes: Vec<ObjectId>,

    picking_dirty: bool,
    needs_render: bool,
    callbacks: Callbacks,
}

impl<B: RenderBackend> ScatterPlot<B> {
    pub fn new(backend: B, params: ScatterPlotParams) -> Result<Self> {
        let factory = Box::new(DefaultVisualizerFactory::new(params.style.clone()));
        Self::with_factory(backend, params, factory)
    }

    pub fn with_factory(
        backend: B,
        params: ScatterPlotParams,
        factory: Box<dyn VisualizerFactory>,
    ) -> Result<Self> {
        check_dimensions(params.dimensions)?;
        let projection = Projection::for_dimensions(params.dimensions);
        let def = params.camera.apply(CameraDef::default_for(projection));
        let mut plot = Self {
            backend,
            scene: Scene::new_handle(params.style.background_rgba()),
            style: params.style,
            dimensions: params.dimensions,
            camera: Camera::new(&def, 1.0),
            controls: OrbitControls::new(projection),
            camera_overrides: params.camera,
            pending_camera: None,
            frame_loop: FrameLoop::new(),
            orbit: None,
            factory,
            visualizers: BTreeMap::new(),
            has_dataset: false,
            positions: Vec::new(),
            point_colors: Vec::new(),
            point_scale_factors: Vec::new(),
            label_strings: Vec::new(),
            sequences: Vec::new(),
            labels: None,
            polyline_colors: Vec::new(),
            polyline_opacities: Vec::new(),
            polyline_widths: Vec::new(),
            width: 0,
            height: 0,
            device_pixel_ratio: 1.0,
            mode: InteractionMode::Pan,
            select_enabled: params.select_enabled,
            mode_before_modifier: None,
            selection: SelectionSurface::default(),
            gesture: None,
            hover: None,
            show_axes: params.show_axes,
            axes: Vec::new(),
            picking_dirty: true,
            needs_render: true,
            callbacks: Callbacks::default(),
        };
        plot.rebuild_axes();
        Ok(plot)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn dimensions(&self) -> u8 {
        self.dimensions
    }

    pub fn is_3d(&self) -> bool {
        self.dimensions == 3
    }

    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn hover(&self) -> Option<usize> {
        self.hover
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn active_visualizers(&self) -> Vec<VisualizerKind> {
        self.visualizers.keys().copied().collect()
    }

    /// True when something changed since the last [`render`](Self::render).
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn is_orbit_animating(&self) -> bool {
        self.orbit.is_some()
    }

    /// Overlay the host draws for the selection gesture in progress.
    pub fn selection_overlay(&self) -> Option<SelectionOverlay> {
        self.selection.overlay()
    }

    fn mark_dirty(&mut self) {
        self.picking_dirty = true;
        self.needs_render = true;
    }

    // ---- callbacks ----

    pub fn on_hover(&mut self, callback: impl FnMut(Option<usize>) + 'static) {
        self.callbacks.hover = Some(Box::new(callback));
    }

    pub fn on_click(&mut self, callback: impl FnMut(Option<usize>) + 'static) {
        self.callbacks.click = Some(Box::new(callback));
    }

    pub fn on_select(&mut self, callback: impl FnMut(&[usize]) + 'static) {
        self.callbacks.select = Some(Box::new(callback));
    }

    pub fn on_camera_move(&mut self, callback: impl FnMut(Vec3, Vec3) + 'static) {
        self.callbacks.camera_move = Some(Box::new(callback));
    }

    fn notify_hover(&mut self) {
        if let Some(callback) = self.callbacks.hover.as_mut() {
            callback(self.hover);
        }
    }

    fn notify_select(&mut self, indices: &[usize]) {
        log::debug!("selected {} points", indices.len());
        if let Some(callback) = self.callbacks.select.as_mut() {
            callback(indices);
        }
    }

    fn notify_camera_move(&mut self) {
        let (position, target) = (self.camera.position, self.camera.target);
        if let Some(callback) = self.callbacks.camera_move.as_mut() {
            callback(position, target);
        }
    }

    /// Reports a click on `index` as if the user had clicked it.
    pub fn click_on_point(&mut self, index: Option<usize>) {
        if let Some(callback) = self.callbacks.click.as_mut() {
            callback(index);
        }
    }

    // ---- data ----

    /// Replaces the point set. Every active visualizer rebuilds, and attribute
    /// buffers, label strings and sequences that no longer fit are dropped.
    pub fn set_point_positions(&mut self, positions: Vec<Vec3>) -> Result<()> {
        check_point_count(positions.len())?;
        let n = positions.len();
        if self.point_colors.len() != n && !self.point_colors.is_empty() {
            self.point_colors.clear();
        }
        if self.point_scale_factors.len() != n && !self.point_scale_factors.is_empty() {
            self.point_scale_factors.clear();
        }
        if self.labels.as_ref().is_some_and(|l| l.validate(n).is_err()) {
            self.labels = None;
        }
        if !self.label_strings.is_empty() && self.label_strings.len() != n {
            self.label_strings.clear();
            for visualizer in self.visualizers.values_mut() {
                visualizer.on_label_strings_changed(&[]);
            }
        }
        if self.sequences.iter().flat_map(|s| &s.indices).any(|&i| i >= n) {
            self.sequences.clear();
            self.polyline_colors.clear();
            self.polyline_opacities.clear();
            self.polyline_widths.clear();
            for visualizer in self.visualizers.values_mut() {
                visualizer.on_sequences_changed(&[]);
            }
        }
        self.positions = positions;
        self.has_dataset = true;
        self.selection.cancel();
        if self.hover.take().is_some() {
            self.notify_hover();
        }
        for visualizer in self.visualizers.values_mut() {
            visualizer.on_point_positions_changed(&self.positions);
        }
        log::info!("loaded {n} points");
        self.mark_dirty();
        Ok(())
    }

    /// Per-point RGBA; empty clears back to the style default.
    pub fn set_point_colors(&mut self, colors: Vec<[f32; 4]>) -> Result<()> {
        if !colors.is_empty() {
            check_len("point colors", self.positions.len(), colors.len())?;
        }
        self.point_colors = colors;
        self.needs_render = true;
        Ok(())
    }

    /// Per-point size multipliers; empty clears back to 1.
    pub fn set_point_scale_factors(&mut self, scale_factors: Vec<f32>) -> Result<()> {
        if !scale_factors.is_empty() {
            check_len("point scale factors", self.positions.len(), scale_factors.len())?;
        }
        self.point_scale_factors = scale_factors;
        self.mark_dirty();
        Ok(())
    }

    /// Per-point text used by the 3D text visualizer.
    pub fn set_label_strings(&mut self, labels: Vec<String>) -> Result<()> {
        if self.has_dataset && !labels.is_empty() {
            check_len("label strings", self.positions.len(), labels.len())?;
        }
        self.label_strings = labels;
        for visualizer in self.visualizers.values_mut() {
            visualizer.on_label_strings_changed(&self.label_strings);
        }
        self.mark_dirty();
        Ok(())
    }

    pub fn set_sequences(&mut self, sequences: Vec<Sequence>) -> Result<()> {
        if self.has_dataset {
            let len = self.positions.len();
            for (sequence, s) in sequences.iter().enumerate() {
                if let Some(&index) = s.indices.iter().find(|&&i| i >= len) {
                    return Err(ScatterError::SequenceIndexOutOfRange {
                        sequence,
                        index,
                        len,
                    });
                }
            }
        }
        self.sequences = sequences;
        self.polyline_colors.clear();
        self.polyline_opacities.clear();
        self.polyline_widths.clear();
        for visualizer in self.visualizers.values_mut() {
            visualizer.on_sequences_changed(&self.sequences);
        }
        self.needs_render = true;
        Ok(())
    }

    /// Labels to draw this frame, hover first then the selection.
    pub fn set_labels(&mut self, labels: Option<LabelRenderParams>) -> Result<()> {
        if let Some(labels) = &labels {
            labels.validate(self.positions.len())?;
        }
        self.labels = labels;
        self.needs_render = true;
        Ok(())
    }

    pub fn set_polyline_colors(&mut self, colors: Vec<[f32; 3]>) -> Result<()> {
        if !colors.is_empty() {
            check_len("polyline colors", self.sequences.len(), colors.len())?;
        }
        self.polyline_colors = colors;
        self.needs_render = true;
        Ok(())
    }

    pub fn set_polyline_opacities(&mut self, opacities: Vec<f32>) -> Result<()> {
        if !opacities.is_empty() {
            check_len("polyline opacities", self.sequences.len(), opacities.len())?;
        }
        self.polyline_opacities = opacities;
        self.needs_render = true;
        Ok(())
    }

    pub fn set_polyline_widths(&mut self, widths: Vec<f32>) -> Result<()> {
        if !widths.is_empty() {
            check_len("polyline widths", self.sequences.len(), widths.len())?;
        }
        self.polyline_widths = widths;
        self.needs_render = true;
        Ok(())
    }

    /// Makes exactly `kinds` active. Visualizers that stay are untouched;
    /// removed ones are disposed; new ones receive the current surface size,
    /// labels, sequences and positions before their first frame.
    pub fn set_active_visualizers(&mut self, kinds: &[VisualizerKind]) {
        let desired: BTreeSet<VisualizerKind> = kinds.iter().copied().collect();
        self.visualizers.retain(|kind, visualizer| {
            let keep = desired.contains(kind);
            if !keep {
                log::debug!("disposing {kind:?} visualizer");
                visualizer.dispose();
            }
            keep
        });
        for kind in desired {
            if self.visualizers.contains_key(&kind) {
                continue;
            }
            log::debug!("creating {kind:?} visualizer");
            let mut visualizer = self.factory.create(kind);
            visualizer.set_scene(self.scene.clone());
            visualizer.on_resize(self.width, self.height);
            visualizer.on_label_strings_changed(&self.label_strings);
            visualizer.on_sequences_changed(&self.sequences);
            if self.has_dataset {
                visualizer.on_point_positions_changed(&self.positions);
            }
            self.visualizers.insert(kind, visualizer);
        }
        self.mark_dirty();
    }

    // ---- camera ----

    /// Switches between a 2D and a 3D scene, rebuilding camera and controls.
    pub fn set_dimensions(&mut self, dimensions: u8) -> Result<()> {
        check_dimensions(dimensions)?;
        if dimensions == self.dimensions {
            return Ok(());
        }
        log::info!("switching to {dimensions}D");
        self.dimensions = dimensions;
        self.recreate_camera();
        self.rebuild_axes();
        Ok(())
    }

    /// Camera settings consumed by the next camera rebuild, and whether the
    /// orbit animation starts with it.
    pub fn set_camera_parameters_for_next_creation(&mut self, overrides: CameraOverrides, orbit: bool) {
        self.pending_camera = Some((overrides, orbit));
    }

    /// Restores the default framing for the current dimensionality.
    pub fn reset_zoom(&mut self) {
        self.recreate_camera();
    }

    pub fn camera_position(&self) -> Vec3 {
        self.camera.position
    }

    pub fn camera_target(&self) -> Vec3 {
        self.camera.target
    }

    pub fn set_camera_position_and_target(&mut self, position: Vec3, target: Vec3) {
        self.stop_orbit_animation();
        self.camera.position = position;
        self.camera.target = target;
        self.notify_camera_move();
        self.mark_dirty();
    }

    fn recreate_camera(&mut self) {
        let projection = Projection::for_dimensions(self.dimensions);
        let mut def = self.camera_overrides.apply(CameraDef::default_for(projection));
        let mut orbit = self.orbit.take().is_some();
        if let Some((overrides, start_orbit)) = self.pending_camera.take() {
            def = overrides.apply(def);
            orbit |= start_orbit;
        }
        let aspect = self.camera.aspect;
        self.camera = Camera::new(&def, aspect);
        self.controls = OrbitControls::new(projection);
        self.gesture = None;
        self.selection.cancel();
        if orbit {
            self.start_orbit_animation();
        }
        self.notify_camera_move();
        self.mark_dirty();
    }

    fn rebuild_axes(&mut self) {
        {
            let mut scene = self.scene.borrow_mut();
            for id in self.axes.drain(..) {
                scene.remove(id);
            }
        }
        if !self.show_axes || !self.is_3d() {
            return;
        }
        let mut scene = self.scene.borrow_mut();
        for (axis, color) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().zip(self.style.axes_colors) {
            let lines = LinesObject {
                segments: vec![[Vec3::ZERO, axis * AXES_LENGTH]],
                color,
                width_px: AXES_WIDTH_PX,
            };
            self.axes.push(scene.add(SceneObject::new(Drawable::Lines(lines))));
        }
    }

    fn set_axes_visible(&self, visible: bool) {
        let mut scene = self.scene.borrow_mut();
        for id in &self.axes {
            scene.set_visible(*id, visible);
        }
    }

    // ---- orbit animation ----

    /// Starts rotating the camera around its target, one step per frame.
    /// Has no effect in 2D, where rotation is not allowed.
    pub fn start_orbit_animation(&mut self) {
        if !self.controls.enable_rotate {
            log::debug!("orbit animation needs a 3D scene");
            return;
        }
        if self.orbit.is_none() {
            self.orbit = Some(self.frame_loop.schedule_repeating());
            self.needs_render = true;
        }
    }

    pub fn stop_orbit_animation(&mut self) {
        if let Some(task) = self.orbit.take() {
            task.cancel();
        }
    }

    /// Runs the tasks due this frame. The host calls this once per
    /// animation frame, before rendering.
    pub fn on_animation_frame(&mut self) {
        for id in self.frame_loop.take_due() {
            let Some(task) = self.orbit.as_ref().filter(|task| task.id() == id) else {
                continue;
            };
            task.reschedule();
            let angle = std::f32::consts::TAU / 60.0 / 60.0 * ORBIT_ANIMATION_ROTATION_CYCLE_IN_SECONDS;
            self.controls.rotate_left(angle, &mut self.camera);
            self.notify_camera_move();
            self.mark_dirty();
        }
    }

    /// Whether the host should keep requesting animation frames.
    pub fn has_pending_frame_tasks(&self) -> bool {
        self.frame_loop.has_pending()
    }

    // ---- surface ----

    /// New logical surface size. Reallocates the picking surface.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.width = width;
        self.height = height;
        self.device_pixel_ratio = device_pixel_ratio.max(f32::EPSILON);
        let (width_px, height_px) = self.device_size();
        self.backend.resize(width_px, height_px);
        self.camera.aspect = width.max(1) as f32 / height.max(1) as f32;
        for visualizer in self.visualizers.values_mut() {
            visualizer.on_resize(width, height);
        }
        self.mark_dirty();
    }

    fn device_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.device_pixel_ratio).round() as u32,
            (self.height as f32 * self.device_pixel_ratio).round() as u32,
        )
    }

    fn frame_params(&self) -> FrameParams {
        let (width_px, height_px) = self.device_size();
        FrameParams {
            view_proj: self.camera.view_proj(),
            camera_position: self.camera.position,
            width_px,
            height_px,
            device_pixel_ratio: self.device_pixel_ratio,
        }
    }

    // ---- rendering ----

    /// Renders the picking pass, then the display pass.
    pub fn render(&mut self) -> Result<()> {
        self.render_passes(true)
    }

    fn render_passes(&mut self, display: bool) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Ok(());
        }
        let frame = self.frame_params();
        let (nearest, farthest) = near_far_points(&self.positions, self.camera.position, self.camera.target);
        let ctx = RenderContext {
            camera: &self.camera,
            view_proj: frame.view_proj,
            camera_target: self.camera.target,
            screen_width: self.width,
            screen_height: self.height,
            device_pixel_ratio: self.device_pixel_ratio,
            nearest_camera_space_point_z: nearest,
            farthest_camera_space_point_z: farthest,
            background_color: self.style.background_color,
            point_colors: &self.point_colors,
            point_scale_factors: &self.point_scale_factors,
            labels: self.labels.as_ref(),
            polyline_colors: &self.polyline_colors,
            polyline_opacities: &self.polyline_opacities,
            polyline_widths: &self.polyline_widths,
        };

        self.set_axes_visible(false);
        for visualizer in self.visualizers.values_mut() {
            visualizer.on_picking_render(&ctx);
        }
        self.backend
            .render(&self.scene.borrow(), &frame, RenderTarget::Picking)?;
        self.picking_dirty = false;
        if !display {
            return Ok(());
        }

        self.set_axes_visible(true);
        for visualizer in self.visualizers.values_mut() {
            visualizer.on_render(&ctx);
        }
        self.backend
            .render(&self.scene.borrow(), &frame, RenderTarget::Display)?;
        self.needs_render = false;
        Ok(())
    }

    /// Brings the picking surface up to date with the current state.
    fn refresh_picking(&mut self) -> Result<()> {
        if self.picking_dirty {
            self.render_passes(false)?;
        }
        Ok(())
    }

    // ---- picking ----

    /// Point under a logical pixel position, read from the picking surface.
    /// `None` over the background, before any dataset, or while no picking
    /// surface exists.
    pub fn pick_point(&mut self, position: Vec2) -> Option<usize> {
        if !self.has_dataset || position.x < 0.0 || position.y < 0.0 {
            return None;
        }
        if let Err(err) = self.refresh_picking() {
            log::warn!("picking pass failed: {err}");
            return None;
        }
        let dpr = self.device_pixel_ratio;
        let rect = PixelRect {
            x: (position.x * dpr).floor() as u32,
            y: (position.y * dpr).floor() as u32,
            width: 1,
            height: 1,
        };
        let pixels = self.backend.read_pixels(rect)?;
        first_hit(&pixels, self.positions.len())
    }

    /// Points visible in the rectangle according to the picking surface.
    /// Regions of at most 2x2 device pixels yield the first hit only.
    pub fn select_in_rect_gpu(&mut self, rect: ScreenRect) -> Result<Vec<usize>> {
        if !self.has_dataset {
            return Err(ScatterError::NoDataset);
        }
        self.refresh_picking()?;
        let pixel_rect = rect.to_pixel_rect(self.device_pixel_ratio);
        let (width_px, height_px) = self.device_size();
        let Some(visible) = pixel_rect.clamp_to(width_px, height_px) else {
            return Ok(Vec::new());
        };
        let Some(pixels) = self.backend.read_pixels(visible) else {
            return Ok(Vec::new());
        };
        let n = self.positions.len();
        if pixel_rect.area() <= SMALL_REGION_MAX_AREA {
            return Ok(first_hit(&pixels, n).into_iter().collect());
        }
        Ok(decode_region(&pixels, n))
    }

    /// Logical screen position of every point, `None` behind the camera.
    fn project_points(&self) -> Vec<Option<Vec2>> {
        let view_proj = self.camera.view_proj();
        let (w, h) = (self.width as f32, self.height as f32);
        self.positions
            .iter()
            .map(|p| self.camera.world_to_screen(&view_proj, *p, w, h))
            .collect()
    }

    /// Every point whose projection falls inside the rectangle, occluded or
    /// not. Runs over all points without rendering.
    pub fn select_in_rect_cpu(&self, rect: ScreenRect) -> Result<Vec<usize>> {
        if !self.has_dataset {
            return Err(ScatterError::NoDataset);
        }
        Ok(indices_in_rect(&self.project_points(), &rect))
    }

    /// Every point whose projection falls inside the closed lasso path.
    pub fn select_in_lasso(&self, path: &[Vec2]) -> Result<Vec<usize>> {
        if !self.has_dataset {
            return Err(ScatterError::NoDataset);
        }
        Ok(indices_in_polygon(&self.project_points(), path))
    }

    /// Resolves a rectangle by size: small ones through the picking surface,
    /// drawn ones through CPU projection.
    pub fn select_in_rect(&mut self, rect: ScreenRect) -> Result<Vec<usize>> {
        if rect.to_pixel_rect(self.device_pixel_ratio).area() <= SMALL_REGION_MAX_AREA {
            self.select_in_rect_gpu(rect)
        } else {
            self.select_in_rect_cpu(rect)
        }
    }

    // ---- interaction ----

    /// Enters or leaves selection mode explicitly.
    pub fn set_interaction_mode(&mut self, mode: InteractionMode) {
        if self.mode != mode {
            log::info!("interaction mode {mode:?}");
        }
        self.mode = mode;
        self.mode_before_modifier = None;
    }

    /// Whether holding Shift may enter selection mode.
    pub fn set_select_enabled(&mut self, enabled: bool) {
        self.select_enabled = enabled;
    }

    pub fn set_selection_shape(&mut self, shape: SelectionShape) {
        self.selection.cancel();
        self.selection.shape = shape;
    }

    pub fn selection_shape(&self) -> SelectionShape {
        self.selection.shape
    }

    pub fn handle_key(&mut self, event: KeyEvent) {
        match (event.key, event.pressed) {
            (ModifierKey::Shift, true) => {
                if self.select_enabled && self.mode == InteractionMode::Pan {
                    self.mode_before_modifier = Some(self.mode);
                    self.mode = InteractionMode::Select;
                }
            }
            (ModifierKey::Shift, false) => {
                if let Some(mode) = self.mode_before_modifier.take() {
                    self.mode = mode;
                }
            }
            (ModifierKey::Control, pressed) => {
                if self.is_3d() {
                    self.controls.primary_action = if pressed {
                        DragAction::Pan
                    } else {
                        DragAction::Orbit
                    };
                }
            }
        }
    }

    pub fn pointer_down(&mut self, event: PointerEvent) {
        let selecting = self.mode == InteractionMode::Select && event.button == PointerButton::Primary;
        if selecting {
            self.controls.enabled = false;
            self.selection.pointer_down(event.position);
            self.needs_render = true;
        } else if self.mode == InteractionMode::Select {
            // Camera stays put in selection mode, whatever the button.
        } else if self.controls.pointer_down(event.position, event.button) {
            self.stop_orbit_animation();
        }
        self.gesture = Some(PointerGesture {
            last: event.position,
            dragged: false,
            selecting,
        });
        self.update_hover(event.position);
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        if self.gesture.is_none() {
            self.update_hover(position);
            return;
        }
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if position == gesture.last {
            return;
        }
        gesture.last = position;
        gesture.dragged = true;
        if gesture.selecting {
            self.selection.pointer_move(position);
            self.needs_render = true;
        } else {
            let viewport = Vec2::new(self.width as f32, self.height as f32);
            if self.controls.pointer_move(position, &mut self.camera, viewport) {
                self.notify_camera_move();
                self.mark_dirty();
            }
        }
    }

    /// Ends a gesture. A release with no matching press does nothing.
    pub fn pointer_up(&mut self, _position: Vec2) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        if gesture.selecting {
            self.controls.enabled = true;
            self.needs_render = true;
            let Some(region) = self.selection.pointer_up() else {
                return;
            };
            if !self.has_dataset {
                log::debug!("selection ignored, no dataset loaded");
                return;
            }
            let selected = match region {
                SelectionRegion::Rectangle(rect) => self.select_in_rect(rect),
                SelectionRegion::Lasso(path) => self.select_in_lasso(&path),
            };
            match selected {
                Ok(indices) => self.notify_select(&indices),
                Err(err) => log::warn!("selection failed: {err}"),
            }
        } else {
            self.controls.pointer_up();
            if !gesture.dragged {
                let hover = self.hover;
                self.click_on_point(hover);
            }
        }
    }

    pub fn wheel(&mut self, delta: f32) {
        if self.controls.wheel(delta, &mut self.camera) {
            self.stop_orbit_animation();
            self.notify_camera_move();
            self.mark_dirty();
        }
    }

    /// Cursor left the surface.
    pub fn pointer_leave(&mut self) {
        if self.gesture.is_none() && self.hover.take().is_some() {
            self.notify_hover();
            self.needs_render = true;
        }
    }

    fn update_hover(&mut self, position: Vec2) {
        let hover = self.pick_point(position);
        if hover != self.hover {
            self.hover = hover;
            self.notify_hover();
            self.needs_render = true;
        }
    }

    /// Disposes every visualizer and detaches the axes.
    pub fn dispose(&mut self) {
        self.stop_orbit_animation();
        for (_, mut visualizer) in std::mem::take(&mut self.visualizers) {
            visualizer.dispose();
        }
        self.show_axes = false;
        self.rebuild_axes();
    }
}

fn check_dimensions(dimensions: u8) -> Result<()> {
    match dimensions {
        2 | 3 => Ok(()),
        other => Err(ScatterError::InvalidDimensions(other)),
    }
}

/// Unpacks a flat coordinate buffer of 2 or 3 components per point. 2D
/// points get `z = 0`.
pub fn positions_from_flat(buffer: &[f32], components: usize) -> Result<Vec<Vec3>> {
    if components != 2 && components != 3 {
        return Err(ScatterError::InvalidDimensions(components.min(u8::MAX as usize) as u8));
    }
    if buffer.len() % components != 0 {
        return Err(ScatterError::BufferLengthMismatch {
            buffer: "positions",
            expected: buffer.len().next_multiple_of(components),
            actual: buffer.len(),
        });
    }
    Ok(buffer
        .chunks_exact(components)
        .map(|c| Vec3::new(c[0], c[1], c.get(2).copied().unwrap_or(0.0)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn plot(dimensions: u8) -> ScatterPlot<SoftwareBackend> {
        let params = ScatterPlotParams {
            dimensions,
            ..Default::default()
        };
        let mut plot = ScatterPlot::new(SoftwareBackend::new(), params).unwrap();
        plot.resize(200, 100, 1.0);
        plot
    }

    #[test]
    fn rejects_bad_dimensions_and_buffers() {
        let params = ScatterPlotParams {
            dimensions: 4,
            ..Default::default()
        };
        assert_eq!(
            ScatterPlot::new(SoftwareBackend::new(), params).err(),
            Some(ScatterError::InvalidDimensions(4))
        );

        let mut p = plot(3);
        assert_eq!(p.set_dimensions(1), Err(ScatterError::InvalidDimensions(1)));
        p.set_point_positions(vec![Vec3::ZERO; 3]).unwrap();
        assert!(matches!(
            p.set_point_colors(vec![[0.0; 4]; 2]),
            Err(ScatterError::BufferLengthMismatch { expected: 3, actual: 2, .. })
        ));
        assert!(matches!(
            p.set_sequences(vec![Sequence { indices: vec![0, 7] }]),
            Err(ScatterError::SequenceIndexOutOfRange { index: 7, .. })
        ));
        assert!(p.set_polyline_widths(vec![1.0]).is_err());
    }

    #[test]
    fn selecting_without_dataset_is_a_contract_violation() {
        let mut p = plot(2);
        let rect = ScreenRect {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
        };
        assert_eq!(p.select_in_rect_cpu(rect), Err(ScatterError::NoDataset));
        assert_eq!(p.select_in_rect_gpu(rect), Err(ScatterError::NoDataset));
        assert_eq!(p.pick_point(Vec2::new(10.0, 10.0)), None);
    }

    #[test]
    fn shrinking_the_point_set_drops_labels_and_sequences_that_no_longer_fit() {
        let mut p = plot(2);
        p.set_point_positions(vec![Vec3::ZERO, Vec3::X, Vec3::Y]).unwrap();
        p.set_label_strings(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        p.set_sequences(vec![Sequence { indices: vec![0, 2] }]).unwrap();
        p.set_polyline_widths(vec![2.0]).unwrap();

        p.set_point_positions(vec![Vec3::ZERO, Vec3::X, Vec3::Y]).unwrap();
        assert_eq!(p.label_strings.len(), 3);
        assert_eq!(p.sequences.len(), 1);

        p.set_point_positions(vec![Vec3::ZERO, Vec3::X]).unwrap();
        assert!(p.label_strings.is_empty());
        assert!(p.sequences.is_empty());
        assert!(p.polyline_widths.is_empty());
        assert!(p.set_label_strings(vec!["a".into(), "b".into()]).is_ok());
        assert!(p.set_sequences(vec![Sequence { indices: vec![1, 0] }]).is_ok());
    }

    #[test]
    fn flat_buffers_unpack_with_zero_z() {
        assert_eq!(
            positions_from_flat(&[1.0, 2.0, 3.0, 4.0], 2).unwrap(),
            vec![Vec3::new(1.0, 2.0, 0.0), Vec3::new(3.0, 4.0, 0.0)]
        );
        assert!(positions_from_flat(&[1.0, 2.0], 3).is_err());
        assert!(positions_from_flat(&[1.0], 1).is_err());
    }

    #[test]
    fn visualizer_diff_keeps_survivors() {
        let mut p = plot(3);
        p.set_point_positions(vec![Vec3::ZERO, Vec3::X]).unwrap();
        p.set_active_visualizers(&[VisualizerKind::Points, VisualizerKind::CanvasLabels]);
        let objects_before = p.scene().borrow().len();
        p.set_active_visualizers(&[VisualizerKind::Points]);
        assert_eq!(p.active_visualizers(), vec![VisualizerKind::Points]);
        assert_eq!(p.scene().borrow().len(), objects_before - 1);
        p.set_active_visualizers(&[]);
        // Only the axes remain.
        assert_eq!(p.scene().borrow().len(), 3);
    }

    #[test]
    fn shift_enters_select_only_when_enabled() {
        let mut p = plot(3);
        p.handle_key(KeyEvent {
            key: ModifierKey::Shift,
            pressed: true,
        });
        assert_eq!(p.interaction_mode(), InteractionMode::Select);
        p.handle_key(KeyEvent {
            key: ModifierKey::Shift,
            pressed: false,
        });
        assert_eq!(p.interaction_mode(), InteractionMode::Pan);

        p.set_select_enabled(false);
        p.handle_key(KeyEvent {
            key: ModifierKey::Shift,
            pressed: true,
        });
        assert_eq!(p.interaction_mode(), InteractionMode::Pan);
    }

    #[test]
    fn control_swaps_orbit_for_pan_in_3d() {
        let mut p = plot(3);
        let key = |pressed| KeyEvent {
            key: ModifierKey::Control,
            pressed,
        };
        p.handle_key(key(true));
        assert_eq!(p.controls().primary_action, DragAction::Pan);
        p.handle_key(key(false));
        assert_eq!(p.controls().primary_action, DragAction::Orbit);
    }

    #[test]
    fn orbit_ticks_until_user_interacts() {
        let mut p = plot(3);
        let moves = Rc::new(RefCell::new(0));
        let m = moves.clone();
        p.on_camera_move(move |_, _| *m.borrow_mut() += 1);

        p.start_orbit_animation();
        let start = p.camera_position();
        p.on_animation_frame();
        p.on_animation_frame();
        assert_ne!(p.camera_position(), start);
        assert_eq!(*moves.borrow(), 2);

        p.pointer_down(PointerEvent {
            position: Vec2::new(10.0, 10.0),
            button: PointerButton::Primary,
        });
        assert!(!p.is_orbit_animating());
        let stopped = p.camera_position();
        p.on_animation_frame();
        assert_eq!(p.camera_position(), stopped);
        assert!(!p.has_pending_frame_tasks());
    }

    #[test]
    fn orbit_is_unavailable_in_2d() {
        let mut p = plot(2);
        p.start_orbit_animation();
        assert!(!p.is_orbit_animating());
    }

    #[test]
    fn orbit_survives_camera_recreation() {
        let mut p = plot(3);
        p.start_orbit_animation();
        p.reset_zoom();
        assert!(p.is_orbit_animating());
        p.set_dimensions(2).unwrap();
        assert!(!p.is_orbit_animating());
    }

    #[test]
    fn pending_camera_parameters_apply_once() {
        let mut p = plot(3);
        let position = Vec3::new(0.0, 0.0, 3.0);
        p.set_camera_parameters_for_next_creation(
            CameraOverrides {
                position: Some(position),
                ..Default::default()
            },
            true,
        );
        p.reset_zoom();
        assert_eq!(p.camera_position(), position);
        assert!(p.is_orbit_animating());
        p.stop_orbit_animation();
        p.reset_zoom();
        assert_eq!(p.camera_position(), crate::camera::START_CAMERA_POS_3D);
    }

    #[test]
    fn unmatched_pointer_up_is_ignored() {
        let mut p = plot(2);
        let clicks = Rc::new(RefCell::new(0));
        let c = clicks.clone();
        p.on_click(move |_| *c.borrow_mut() += 1);
        p.pointer_up(Vec2::ZERO);
        assert_eq!(*clicks.borrow(), 0);
    }

    #[test]
    fn secondary_drag_in_select_mode_leaves_camera_alone() {
        let mut p = plot(3);
        p.set_point_positions(vec![Vec3::ZERO, Vec3::X]).unwrap();
        p.set_interaction_mode(InteractionMode::Select);
        let moves = Rc::new(RefCell::new(0));
        let m = moves.clone();
        p.on_camera_move(move |_, _| *m.borrow_mut() += 1);

        let before = p.camera_position();
        p.pointer_down(PointerEvent {
            position: Vec2::new(50.0, 50.0),
            button: PointerButton::Secondary,
        });
        assert!(!p.controls().is_dragging());
        p.pointer_move(Vec2::new(120.0, 80.0));
        p.pointer_up(Vec2::new(120.0, 80.0));
        assert_eq!(p.camera_position(), before);
        assert_eq!(*moves.borrow(), 0);
    }

    #[test]
    fn wheel_zoom_stops_orbit_and_moves_camera() {
        let mut p = plot(3);
        p.start_orbit_animation();
        let before = p.camera_position();
        p.wheel(1.0);
        assert!(!p.is_orbit_animating());
        assert!(p.camera_position().length() < before.length());
    }
}
