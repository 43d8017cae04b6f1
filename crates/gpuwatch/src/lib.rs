//! gpuwatch binary library - exposes modules for testing.

pub mod app;
pub mod cli;
pub mod logging;
pub mod output;
pub mod tui;
