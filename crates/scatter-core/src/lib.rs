// src/lib.rs
//! Interactive point cloud scatter plot core.
//!
//! Projects 2D or 3D points through an orthographic or perspective camera,
//! renders them through pluggable visualizers sharing one scene, and resolves
//! hover, click, rectangle and lasso selection. Hit testing renders every
//! identifiable object a second time with its point index encoded as a 24-bit
//! color and reads the pixels back.
//!
//! The crate is backend-agnostic: a [`backend::RenderBackend`] rasterizes the
//! scene. [`software::SoftwareBackend`] is a CPU implementation for headless
//! use and tests.

pub mod animation;
pub mod backend;
pub mod camera;
pub mod collision_grid;
pub mod error;
pub mod picking;
pub mod render_context;
pub mod scatter_plot;
pub mod scene;
pub mod selection;
pub mod software;
pub mod style;
pub mod visualizers;

pub use error::{Result, ScatterError};
pub use scatter_plot::{
    positions_from_flat, CameraOverrides, InteractionMode, KeyEvent, ModifierKey, PointerEvent, ScatterPlot,
    ScatterPlotParams,
};
