//! Scene interaction core for a 3D model viewer: hit-testing, tools,
//! selection, scene tree sync and material effects over a retained scene
//! graph.

pub mod app;
pub mod assets;
pub mod engine;
pub mod interaction;
pub mod materials;
pub mod render;
pub mod scene;
pub mod selection;
pub mod ui;

pub use app::{Studio, StudioCommand, StudioConfig, StudioEvent};
