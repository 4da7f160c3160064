use crate::{
    config::{Config, RenderMode},
    data::{demo, sprites},
    renderer::Renderer,
    ui::{self, EguiTextMeasure, HudState},
};
use anyhow::Result;
use glam::Vec2;
use scatter_core::camera::PointerButton;
use scatter_core::render_context::LabelRenderParams;
use scatter_core::style::Style;
use scatter_core::visualizers::{DefaultVisualizerFactory, SpriteSheetSlot};
use scatter_core::{
    positions_from_flat, InteractionMode, KeyEvent, ModifierKey, PointerEvent, ScatterPlot, ScatterPlotParams,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use winit::{
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

const HOVER_LABEL_SCALE: f32 = 1.2;
const SELECTED_LABEL_SCALE: f32 = 1.0;
/// Unselected points fade this far toward the background while a selection
/// exists.
const UNSELECTED_FADE: f32 = 0.75;
/// Pixel scroll deltas per wheel notch.
const PIXELS_PER_WHEEL_LINE: f32 = 50.0;

/// Plot callbacks land here and are applied once per event.
#[derive(Default)]
struct PlotEvents {
    hover_changed: bool,
    click: Option<Option<usize>>,
    selected: Option<Vec<usize>>,
    sheet_loaded: bool,
}

/// Hover label first, then one label per selected point.
pub fn label_params(
    hover: Option<usize>,
    selected: &[usize],
    labels: &[String],
    style: &Style,
) -> Option<LabelRenderParams> {
    let mut params = LabelRenderParams {
        default_font_size: style.label_font_size,
        ..Default::default()
    };
    let mut push = |index: usize, scale: f32, use_scene_opacity: bool| {
        let Some(text) = labels.get(index) else { return };
        params.point_indices.push(index);
        params.label_strings.push(text.clone());
        params.scale_factors.push(scale);
        params.use_scene_opacity_flags.push(use_scene_opacity);
        params.fill_colors.push(style.label_fill_color);
        params.stroke_colors.push(style.label_stroke_color);
    };
    if let Some(index) = hover {
        push(index, HOVER_LABEL_SCALE, false);
    }
    for &index in selected.iter().filter(|&&i| Some(i) != hover) {
        push(index, SELECTED_LABEL_SCALE, true);
    }
    (!params.is_empty()).then_some(params)
}

/// Dataset colors with unselected points faded out while a selection exists.
pub fn selection_colors(base: &[[f32; 4]], selected: &[usize], background: [f32; 3]) -> Vec<[f32; 4]> {
    if selected.is_empty() {
        return base.to_vec();
    }
    let mut is_selected = vec![false; base.len()];
    for &i in selected {
        if let Some(flag) = is_selected.get_mut(i) {
            *flag = true;
        }
    }
    base.iter()
        .zip(&is_selected)
        .map(|(color, &keep)| {
            if keep {
                return *color;
            }
            let mut faded = *color;
            for c in 0..3 {
                faded[c] += (background[c] - faded[c]) * UNSELECTED_FADE;
            }
            faded
        })
        .collect()
}

pub struct App {
    pub plot: ScatterPlot<Renderer>,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    config: Config,
    text_measure: Rc<EguiTextMeasure>,
    sprite_sheet: SpriteSheetSlot,
    /// Decoded after the first frame is on screen.
    sprite_sheet_pending: bool,
    events: Rc<RefCell<PlotEvents>>,
    labels: Vec<String>,
    base_colors: Vec<[f32; 4]>,
    selected: Vec<usize>,
    cursor: Vec2,
    scale_factor: f64,
}

impl App {
    pub async fn new(window: Arc<Window>, config: Config) -> Result<Self> {
        let renderer = Renderer::new(window.clone()).await?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(egui_ctx.clone(), egui_ctx.viewport_id(), &*window, None, None);

        let style = Style::default();
        let text_measure = Rc::new(EguiTextMeasure::new(egui_ctx.clone()));
        let sprite_sheet = SpriteSheetSlot::new();
        let factory = DefaultVisualizerFactory {
            style: style.clone(),
            sprite_sheet: sprite_sheet.clone(),
            text_measure: text_measure.clone(),
        };
        let params = ScatterPlotParams {
            dimensions: config.dimensions,
            style,
            ..Default::default()
        };
        let plot = ScatterPlot::with_factory(renderer, params, Box::new(factory))?;

        let mut app = Self {
            plot,
            egui_ctx,
            egui_state,
            sprite_sheet_pending: config.render_mode == RenderMode::Sprites,
            config,
            text_measure,
            sprite_sheet,
            events: Rc::new(RefCell::new(PlotEvents::default())),
            labels: Vec::new(),
            base_colors: Vec::new(),
            selected: Vec::new(),
            cursor: Vec2::ZERO,
            scale_factor: window.scale_factor(),
        };
        app.wire_callbacks();
        app.resize(window.inner_size());
        app.plot.set_active_visualizers(&app.config.visualizers());
        app.load_dataset(app.config.dimensions)?;
        if app.config.orbit {
            app.plot.start_orbit_animation();
        }
        Ok(app)
    }

    fn wire_callbacks(&mut self) {
        let events = self.events.clone();
        self.plot.on_hover(move |_| events.borrow_mut().hover_changed = true);
        let events = self.events.clone();
        self.plot.on_click(move |index| events.borrow_mut().click = Some(index));
        let events = self.events.clone();
        self.plot
            .on_select(move |indices| events.borrow_mut().selected = Some(indices.to_vec()));
        self.plot.on_camera_move(|position, target| {
            log::trace!("camera at {position} looking at {target}");
        });
        let events = self.events.clone();
        self.sprite_sheet
            .on_loaded(move || events.borrow_mut().sheet_loaded = true);
    }

    /// Generates the demo spiral for `dimensions` and hands it to the plot.
    fn load_dataset(&mut self, dimensions: u8) -> Result<()> {
        let data = demo::spiral(self.config.points, dimensions, self.config.seed);
        let positions = positions_from_flat(&data.flat_positions, data.dimensions as usize)?;
        self.plot.set_label_strings(data.labels.clone())?;
        self.plot
            .set_sequences(if self.config.polylines { data.sequences } else { Vec::new() })?;
        self.plot.set_point_positions(positions)?;
        self.plot.set_point_colors(data.colors.clone())?;
        self.labels = data.labels;
        self.base_colors = data.colors;
        self.selected.clear();
        self.refresh_labels()?;
        log::info!("demo spiral: {} points in {dimensions}D", self.labels.len());
        Ok(())
    }

    /// Decodes the sprite sheet, falling back to the generated one.
    fn load_sprite_sheet(&mut self) {
        self.sprite_sheet_pending = false;
        let (w, h) = self.config.sprite_dims;
        let sheet = match &self.config.sprite_sheet {
            Some(path) => match sprites::load_sprite_sheet(path, w, h) {
                Ok(sheet) => sheet,
                Err(err) => {
                    log::warn!("{err:#}; using generated sprites");
                    sprites::procedural_sprite_sheet(w.min(h))
                }
            },
            None => sprites::procedural_sprite_sheet(w.min(h)),
        };
        self.sprite_sheet.fulfill(sheet);
    }

    fn refresh_labels(&mut self) -> scatter_core::Result<()> {
        let params = label_params(self.plot.hover(), &self.selected, &self.labels, self.plot.style());
        self.plot.set_labels(params)
    }

    fn set_selection(&mut self, selected: Vec<usize>) -> scatter_core::Result<()> {
        log::debug!("{} points selected", selected.len());
        self.selected = selected;
        let background = self.plot.style().background_color;
        self.plot
            .set_point_colors(selection_colors(&self.base_colors, &self.selected, background))?;
        self.refresh_labels()
    }

    /// Applies whatever the plot reported during the last call into it.
    fn apply_plot_events(&mut self) {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        let mut result = Ok(());
        if let Some(click) = events.click {
            result = self.set_selection(click.into_iter().collect());
        }
        if let Some(selected) = events.selected {
            result = result.and(self.set_selection(selected));
        }
        if events.hover_changed {
            result = result.and(self.refresh_labels());
        }
        if events.sheet_loaded {
            log::info!("sprite sheet ready");
        }
        if let Err(err) = result {
            log::warn!("failed to apply plot events: {err}");
        }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.plot.backend_mut().resize_surface(new_size);
            let logical = new_size.to_logical::<f64>(self.scale_factor);
            self.plot.resize(
                logical.width.round() as u32,
                logical.height.round() as u32,
                self.scale_factor as f32,
            );
        }
    }

    fn logical(&self, position: winit::dpi::PhysicalPosition<f64>) -> Vec2 {
        let p = position.to_logical::<f64>(self.scale_factor);
        Vec2::new(p.x as f32, p.y as f32)
    }

    /// Returns `true` when the event was consumed by egui or the plot.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        let consumed = match event {
            WindowEvent::Resized(physical_size) => {
                self.resize(*physical_size);
                false
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = *scale_factor;
                self.resize(window.inner_size());
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = self.logical(*position);
                self.plot.pointer_move(self.cursor);
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.plot.pointer_leave();
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Primary,
                    MouseButton::Right => PointerButton::Secondary,
                    MouseButton::Middle => PointerButton::Middle,
                    _ => return false,
                };
                match state {
                    ElementState::Pressed => self.plot.pointer_down(PointerEvent {
                        position: self.cursor,
                        button,
                    }),
                    ElementState::Released => self.plot.pointer_up(self.cursor),
                }
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_WHEEL_LINE,
                };
                self.plot.wheel(lines);
                true
            }
            WindowEvent::KeyboardInput { event, .. } if !event.repeat => {
                let key = match event.physical_key {
                    PhysicalKey::Code(KeyCode::ShiftLeft | KeyCode::ShiftRight) => ModifierKey::Shift,
                    PhysicalKey::Code(KeyCode::ControlLeft | KeyCode::ControlRight) => ModifierKey::Control,
                    _ => return false,
                };
                self.plot.handle_key(KeyEvent {
                    key,
                    pressed: event.state == ElementState::Pressed,
                });
                true
            }
            _ => false,
        };
        self.apply_plot_events();
        consumed
    }

    fn apply_hud_actions(&mut self, actions: ui::HudActions) -> Result<()> {
        if let Some(dimensions) = actions.dimensions {
            self.plot.set_dimensions(dimensions)?;
            self.load_dataset(dimensions)?;
            log::info!("switched to {dimensions}D");
        }
        match actions.orbit {
            Some(true) => self.plot.start_orbit_animation(),
            Some(false) => self.plot.stop_orbit_animation(),
            None => {}
        }
        if let Some(mode) = actions.mode {
            self.plot.set_interaction_mode(mode);
        }
        if let Some(shape) = actions.shape {
            self.plot.set_selection_shape(shape);
        }
        if actions.reset_zoom {
            self.plot.reset_zoom();
        }
        if actions.clear_selection {
            self.set_selection(Vec::new())?;
        }
        Ok(())
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        self.plot.on_animation_frame();
        if let Err(err) = self.plot.render() {
            log::error!("Scene render failed: {err}");
        }

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::paint_scene_overlay(
            &self.egui_ctx,
            &self.plot.scene().borrow(),
            self.plot.camera(),
            self.plot.selection_overlay(),
            self.plot.style(),
        );
        let hud = HudState {
            point_count: self.plot.point_count(),
            dimensions: self.plot.dimensions(),
            mode: self.plot.interaction_mode(),
            shape: self.plot.selection_shape(),
            hover: self.plot.hover().and_then(|i| self.labels.get(i).cloned()),
            selected: self.selected.len(),
            orbiting: self.plot.is_orbit_animating(),
        };
        let actions = ui::draw_hud(&self.egui_ctx, &hud);

        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());
        let pixels_per_point = self.egui_ctx.pixels_per_point();

        self.plot
            .backend_mut()
            .present(&shapes, &egui_output.textures_delta, pixels_per_point)?;

        self.text_measure.mark_ready();
        if self.sprite_sheet_pending {
            self.load_sprite_sheet();
        }
        if let Err(err) = self.apply_hud_actions(actions) {
            log::warn!("HUD action failed: {err:#}");
        }
        self.apply_plot_events();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("point {i}")).collect()
    }

    #[test]
    fn hover_label_comes_first_and_is_not_repeated() {
        let style = Style::default();
        let params = label_params(Some(2), &[0, 2, 3], &labels(4), &style).unwrap();
        assert_eq!(params.point_indices, vec![2, 0, 3]);
        assert_eq!(params.scale_factors, vec![HOVER_LABEL_SCALE, 1.0, 1.0]);
        assert_eq!(params.use_scene_opacity_flags, vec![false, true, true]);
        assert!(params.validate(4).is_ok());
    }

    #[test]
    fn nothing_to_label_clears_labels() {
        assert!(label_params(None, &[], &labels(4), &Style::default()).is_none());
        // Indices without a label string are skipped.
        assert!(label_params(Some(9), &[], &labels(4), &Style::default()).is_none());
    }

    #[test]
    fn unselected_points_fade_toward_the_background() {
        let base = vec![[0.0, 0.0, 0.0, 1.0]; 3];
        assert_eq!(selection_colors(&base, &[], [1.0; 3]), base);
        let colors = selection_colors(&base, &[1], [1.0; 3]);
        assert_eq!(colors[1], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(colors[0], [UNSELECTED_FADE, UNSELECTED_FADE, UNSELECTED_FADE, 1.0]);
    }
}
