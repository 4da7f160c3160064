// src/lib.rs
//! Interactive scatter plot viewer.
//!
//! Renders a [`scatter_core::ScatterPlot`] with wgpu: the picking and display
//! passes go to offscreen targets, the display target is blitted to the
//! window, and egui paints labels, glyph text and the HUD on top.

pub mod app;
pub mod config;
pub mod data;
pub mod renderer;
pub mod ui;
